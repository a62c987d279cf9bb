use crate::corpus::{CorpusAdapter, DocumentMeta, MinedDocument};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

/// Adapter over a local document export (§6): a directory of JSON files,
/// one per document, each holding metadata and page text. Grounded on
/// `documents.py`'s TSV-backed `Document`, generalized to JSON since the
/// export format itself is not specified beyond "stable document
/// identifiers".
#[derive(Debug)]
pub struct LocalExportAdapter {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ExportedDocument {
    url: String,
    kind: Option<String>,
    authors: Option<String>,
    title: Option<String>,
    publication: Option<String>,
    year: Option<String>,
    volume: Option<String>,
    number: Option<String>,
    pages: Option<String>,
    doi: Option<String>,
    #[serde(default)]
    page_text: Vec<ExportedPage>,
}

#[derive(Debug, Deserialize)]
struct ExportedPage {
    page_id: String,
    text: String,
}

impl LocalExportAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CorpusAdapter for LocalExportAdapter {
    fn source_tag(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, query: &str) -> CoreResult<Vec<MinedDocument>> {
        let query_lower = query.to_lowercase();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CoreError::ExternalIo(format!("cannot read local export dir: {e}")))?;

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::ExternalIo(format!("cannot list local export dir: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CoreError::ExternalIo(format!("cannot read {}: {e}", path.display())))?;
            let doc: ExportedDocument = serde_json::from_str(&raw)
                .map_err(|e| CoreError::ExternalIo(format!("bad export file {}: {e}", path.display())))?;
            if !query.is_empty()
                && !doc.title.as_deref().unwrap_or_default().to_lowercase().contains(&query_lower)
            {
                continue;
            }
            out.push(MinedDocument {
                meta: DocumentMeta {
                    url: doc.url,
                    kind: doc.kind,
                    authors: doc.authors,
                    title: doc.title,
                    publication: doc.publication,
                    year: doc.year,
                    volume: doc.volume,
                    number: doc.number,
                    pages: doc.pages,
                    doi: doc.doi,
                },
                pages: doc.page_text.into_iter().map(|p| (p.page_id, p.text)).collect(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_reads_matching_export_files() {
        let dir = tempfile::tempdir().unwrap();
        let doc = serde_json::json!({
            "url": "https://example.org/doc/1",
            "title": "Notes on USNM Specimens",
            "page_text": [{"page_id": "1", "text": "USNM 123456 cited here"}]
        });
        std::fs::write(dir.path().join("doc1.json"), doc.to_string()).unwrap();

        let adapter = LocalExportAdapter::new(dir.path());
        let docs = adapter.fetch("usnm").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].pages[0].1, "USNM 123456 cited here");
    }

    #[tokio::test]
    async fn fetch_filters_by_query_against_title() {
        let dir = tempfile::tempdir().unwrap();
        let doc = serde_json::json!({"url": "https://example.org/doc/2", "title": "Unrelated Report"});
        std::fs::write(dir.path().join("doc2.json"), doc.to_string()).unwrap();

        let adapter = LocalExportAdapter::new(dir.path());
        let docs = adapter.fetch("usnm").await.unwrap();
        assert!(docs.is_empty());
    }
}
