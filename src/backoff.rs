use crate::config::BackoffConfig;
use crate::error::{CoreError, CoreResult};
use std::future::Future;

/// Outcome of a single attempt at an external call: a transient failure
/// carries an optional HTTP-like status code so the caller can short
/// circuit on the non-retryable set (§5).
#[derive(Debug, Clone)]
pub struct AttemptError {
    pub status: Option<u16>,
    pub message: String,
}

impl AttemptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }
}

/// Runs `op` with exponential backoff (`base^attempt` seconds, floor
/// `min_secs`) up to `max_retries` times. A status code in
/// `non_retryable_statuses` aborts immediately rather than retrying
/// (§5, §7 "External I/O failure").
pub async fn retry<T, F, Fut>(cfg: &BackoffConfig, op: F) -> CoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if let Some(status) = e.status {
                    if cfg.non_retryable_statuses.contains(&status) {
                        return Err(CoreError::ExternalIo(format!(
                            "non-retryable status {status}: {}",
                            e.message
                        )));
                    }
                }
                if attempt >= cfg.max_retries {
                    return Err(CoreError::ExternalIo(format!(
                        "exhausted {} retries: {}",
                        cfg.max_retries, e.message
                    )));
                }
                let wait = cfg.base.powi(attempt as i32).max(cfg.min_secs as f64);
                log::warn!("attempt {attempt} failed ({}), retrying in {wait}s", e.message);
                tokio::time::sleep(std::time::Duration::from_secs_f64(wait)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cfg() -> BackoffConfig {
        BackoffConfig { base: 2.0, min_secs: 0, max_retries: 3, non_retryable_statuses: vec![404] }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&cfg(), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AttemptError::new("not yet"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = retry(&cfg(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::with_status(404, "missing"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = retry(&cfg(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::new("still failing"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
