use crate::backoff::{self, AttemptError};
use crate::config::BackoffConfig;
use crate::error::CoreResult;
use crate::score::CandidateRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

/// The external collections portal (§6): `get_specimen_by_id` returns
/// zero or more candidate records for a specimen number. Specified here
/// only as the interface the resolution engine consumes; the portal's
/// own ranking/search logic is out of scope (§1).
#[async_trait]
pub trait CollectionsPortal: std::fmt::Debug + Send + Sync {
    async fn get_specimen_by_id(&self, spec_num: &str) -> CoreResult<Vec<CandidateRecord>>;
}

#[derive(Debug, Deserialize)]
struct PortalEnvelope {
    response: Option<PortalResponse>,
}

#[derive(Debug, Deserialize)]
struct PortalResponse {
    content: Option<PortalContent>,
}

#[derive(Debug, Deserialize)]
struct PortalContent {
    #[serde(rename = "SimpleDarwinRecordSet", default)]
    simple_darwin_record_set: Vec<PortalRecordEnvelope>,
}

#[derive(Debug, Deserialize)]
struct PortalRecordEnvelope {
    #[serde(rename = "SimpleDarwinRecord")]
    simple_darwin_record: CandidateRecord,
}

/// HTTP-backed `CollectionsPortal`, caching responses by specimen number
/// so repeated lookups (sibling/range re-tries in §4.6) don't re-hit the
/// network (`miners/link.py` `get_specimens`/`_get_specimens`).
#[derive(Debug)]
pub struct HttpPortal {
    client: reqwest::Client,
    base_url: String,
    backoff: BackoffConfig,
    cache: DashMap<String, Vec<CandidateRecord>>,
}

impl HttpPortal {
    pub fn new(base_url: impl Into<String>, backoff: BackoffConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("speciminer/0.1 (+mailto:collections@si.edu)")
                .build()
                .expect("reqwest client builds"),
            base_url: base_url.into(),
            backoff,
            cache: DashMap::new(),
        }
    }

    async fn fetch(&self, spec_num: &str) -> Result<Vec<CandidateRecord>, AttemptError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("dept", "any"),
                ("format", "json"),
                ("schema", "simpledwr"),
                ("limit", "1000"),
                ("sample_id", spec_num),
            ])
            .send()
            .await
            .map_err(|e| AttemptError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::with_status(status.as_u16(), status.to_string()));
        }
        let envelope: PortalEnvelope = response
            .json()
            .await
            .map_err(|e| AttemptError::new(format!("bad portal response: {e}")))?;
        Ok(envelope
            .response
            .and_then(|r| r.content)
            .map(|c| c.simple_darwin_record_set.into_iter().map(|r| r.simple_darwin_record).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CollectionsPortal for HttpPortal {
    async fn get_specimen_by_id(&self, spec_num: &str) -> CoreResult<Vec<CandidateRecord>> {
        if let Some(cached) = self.cache.get(spec_num) {
            return Ok(cached.clone());
        }
        let records = backoff::retry(&self.backoff, || self.fetch(spec_num)).await?;
        self.cache.insert(spec_num.to_string(), records.clone());
        Ok(records)
    }
}

/// In-memory `CollectionsPortal` for tests and dry runs.
#[derive(Debug, Default)]
pub struct FakePortal {
    records: DashMap<String, Vec<CandidateRecord>>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, spec_num: impl Into<String>, records: Vec<CandidateRecord>) {
        self.records.insert(spec_num.into(), records);
    }
}

#[async_trait]
impl CollectionsPortal for FakePortal {
    async fn get_specimen_by_id(&self, spec_num: &str) -> CoreResult<Vec<CandidateRecord>> {
        Ok(self.records.get(spec_num).map(|r| r.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backoff_cfg() -> BackoffConfig {
        BackoffConfig { base: 2.0, min_secs: 0, max_retries: 1, non_retryable_statuses: vec![404] }
    }

    #[tokio::test]
    async fn parses_nested_portal_envelope() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "response": {
                "content": {
                    "SimpleDarwinRecordSet": [
                        {"SimpleDarwinRecord": {"occurrenceID": "urn:1", "catalogNumber": "USNM 123456"}}
                    ]
                }
            }
        });
        Mock::given(method("GET"))
            .and(path("/portal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let portal = HttpPortal::new(format!("{}/portal", server.uri()), backoff_cfg());
        let records = portal.get_specimen_by_id("USNM 123456").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].occurrence_id.as_deref(), Some("urn:1"));
    }

    #[tokio::test]
    async fn non_retryable_status_surfaces_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portal"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let portal = HttpPortal::new(format!("{}/portal", server.uri()), backoff_cfg());
        assert!(portal.get_specimen_by_id("USNM 1").await.is_err());
    }

    #[tokio::test]
    async fn fake_portal_returns_inserted_records() {
        let portal = FakePortal::new();
        portal.insert("USNM 1", vec![CandidateRecord::default()]);
        let records = portal.get_specimen_by_id("USNM 1").await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
