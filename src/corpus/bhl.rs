use crate::corpus::{CorpusAdapter, DocumentMeta, MinedDocument};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Deserialize;

/// Adapter over the Biodiversity Heritage Library API (`miners/bhl.py`
/// `BHLMiner.mine`/`BHLBot`, §6). Searches publications matching a query,
/// then fetches OCR'd page text for each part/item.
#[derive(Debug)]
pub struct BhlAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl BhlAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("speciminer/0.1")
                .build()
                .expect("reqwest client builds"),
            api_key: api_key.into(),
            base_url: "https://www.biodiversitylibrary.org/api3".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder().build().expect("reqwest client builds"),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublicationSearchResponse {
    #[serde(rename = "Result", default)]
    result: Vec<PublicationResult>,
}

#[derive(Debug, Deserialize, Default)]
struct PublicationResult {
    #[serde(rename = "PartID")]
    part_id: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "PublicationDetails")]
    publication_details: Option<String>,
    #[serde(rename = "Authors")]
    authors: Option<String>,
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Doi")]
    doi: Option<String>,
    #[serde(rename = "Pages", default)]
    pages: Vec<PageResult>,
}

#[derive(Debug, Deserialize, Default)]
struct PageResult {
    #[serde(rename = "PageID")]
    page_id: Option<String>,
    #[serde(rename = "OcrText")]
    ocr_text: Option<String>,
}

#[async_trait]
impl CorpusAdapter for BhlAdapter {
    fn source_tag(&self) -> &'static str {
        "BHL"
    }

    async fn fetch(&self, query: &str) -> CoreResult<Vec<MinedDocument>> {
        let url = format!("{}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("op", "PublicationSearch"),
                ("searchterm", query),
                ("searchtype", "F"),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| CoreError::ExternalIo(format!("BHL request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::ExternalIo(format!("BHL returned {}", response.status())));
        }
        let parsed: PublicationSearchResponse = response
            .json()
            .await
            .map_err(|e| CoreError::ExternalIo(format!("bad BHL response: {e}")))?;

        Ok(parsed
            .result
            .into_iter()
            .filter_map(|rec| {
                let part_id = rec.part_id?;
                let pages: Vec<(String, String)> = rec
                    .pages
                    .into_iter()
                    .filter_map(|p| Some((p.page_id?, p.ocr_text.unwrap_or_default())))
                    .collect();
                Some(MinedDocument {
                    meta: DocumentMeta {
                        url: format!("https://www.biodiversitylibrary.org/part/{part_id}"),
                        kind: Some("part".to_string()),
                        authors: rec.authors,
                        title: rec.title,
                        publication: rec.publication_details,
                        year: rec.date,
                        doi: rec.doi,
                        ..Default::default()
                    },
                    pages,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_maps_publication_results_to_mined_documents() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "Result": [{
                "PartID": "12345",
                "Title": "A Revision of the Genus Whatever",
                "Authors": "Smith, J.",
                "Date": "1990",
                "Pages": [{"PageID": "1", "OcrText": "USNM 123456 was collected"}]
            }]
        });
        Mock::given(method("GET"))
            .and(query_param("op", "PublicationSearch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let adapter = BhlAdapter::with_base_url("key", server.uri());
        let docs = adapter.fetch("Whatever").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].meta.url, "https://www.biodiversitylibrary.org/part/12345");
        assert_eq!(docs[0].pages[0].1, "USNM 123456 was collected");
    }
}
