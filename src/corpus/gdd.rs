use crate::corpus::{CorpusAdapter, DocumentMeta, MinedDocument};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Deserialize;

/// Adapter over the GeoDeepDive/xDD snippet-search API
/// (`miners/geodeepdive.py` `GeoDeepDiveMiner.download`, §6). Each hit
/// carries its own highlighted snippet, which this adapter treats as a
/// single-page document.
#[derive(Debug)]
pub struct GddAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl GddAdapter {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("speciminer/0.1")
                .build()
                .expect("reqwest client builds"),
            base_url: api_base.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GddResponse {
    success: GddSuccess,
}

#[derive(Debug, Deserialize, Default)]
struct GddSuccess {
    #[serde(default)]
    data: Vec<GddHit>,
}

#[derive(Debug, Deserialize, Default)]
struct GddHit {
    #[serde(rename = "_gddid")]
    gddid: String,
    title: Option<String>,
    journal: Option<String>,
    publisher: Option<String>,
    #[serde(rename = "pubname")]
    pubname: Option<String>,
    year: Option<String>,
    doi: Option<String>,
    #[serde(default)]
    highlight: Vec<String>,
}

#[async_trait]
impl CorpusAdapter for GddAdapter {
    fn source_tag(&self) -> &'static str {
        "xDD"
    }

    async fn fetch(&self, query: &str) -> CoreResult<Vec<MinedDocument>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("term", query), ("clean", ""), ("full_results", "")])
            .send()
            .await
            .map_err(|e| CoreError::ExternalIo(format!("xDD request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::ExternalIo(format!("xDD returned {}", response.status())));
        }
        let parsed: GddResponse =
            response.json().await.map_err(|e| CoreError::ExternalIo(format!("bad xDD response: {e}")))?;

        Ok(parsed
            .success
            .data
            .into_iter()
            .map(|hit| {
                let text = hit.highlight.join(" ... ");
                MinedDocument {
                    meta: DocumentMeta {
                        url: format!("https://geodeepdive.org/api/articles?docid={}", hit.gddid),
                        kind: Some("article".to_string()),
                        title: hit.title,
                        publication: hit.journal.or(hit.pubname).or(hit.publisher),
                        year: hit.year,
                        doi: hit.doi,
                        ..Default::default()
                    },
                    pages: vec![("1".to_string(), text)],
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_maps_hits_to_single_page_documents() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "success": {
                "data": [{
                    "_gddid": "abc123",
                    "title": "Notes on Foraminifera",
                    "journal": "Journal of Paleontology",
                    "year": "2001",
                    "highlight": ["NMNH 344300 was recovered from the formation"]
                }]
            }
        });
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_json(body)).mount(&server).await;

        let adapter = GddAdapter::new(server.uri());
        let docs = adapter.fetch("Foraminifera").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].pages[0].1.contains("NMNH 344300"));
    }
}
