use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use core::time::Duration;
use mysql_async::{futures::GetConn, Opts, OptsBuilder, PoolConstraints, PoolOpts};

/// Connection-pool helpers shared by every MySQL-backed store. Grounded
/// in the teacher's `MySQLMisc` trait, generalized from a JSON config
/// blob to a plain connection URL since this system has a single typed
/// `Config` rather than per-subsystem dynamic config objects.
#[async_trait]
pub trait MySQLMisc {
    fn pool(&self) -> &mysql_async::Pool;

    fn get_conn(&self) -> GetConn {
        self.pool().get_conn()
    }

    async fn disconnect_db(&self) -> CoreResult<()> {
        self.pool().clone().disconnect().await.map_err(|e| CoreError::ExternalIo(e.to_string()))
    }

    /// Builds a pool against `db_url`, with the teacher's fixed pool
    /// sizing (0..5 connections, 60s inactive TTL).
    fn create_pool(db_url: &str) -> CoreResult<mysql_async::Pool> {
        let pool_opts = PoolOpts::default()
            .with_constraints(PoolConstraints::new(0, 5).expect("pool constraints are valid"))
            .with_inactive_connection_ttl(Duration::from_secs(60));
        let opts = Opts::from_url(db_url).map_err(|e| CoreError::Configuration(format!("bad db_url: {e}")))?;
        Ok(mysql_async::Pool::new(OptsBuilder::from_opts(opts).pool_opts(pool_opts)))
    }

    fn sql_placeholders(num: usize) -> String {
        vec!["?".to_string(); num].join(",")
    }
}
