pub mod bhl;
pub mod gdd;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Stable publication metadata a source-corpus adapter surfaces for a
/// mined document (§6). All fields beyond `url` are best-effort; the
/// core never blocks on a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub url: String,
    pub kind: Option<String>,
    pub authors: Option<String>,
    pub title: Option<String>,
    pub publication: Option<String>,
    pub year: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
}

/// One document as the adapter yields it: metadata plus its pages, each
/// a stable `page_id` paired with cleaned text (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinedDocument {
    pub meta: DocumentMeta,
    pub pages: Vec<(String, String)>,
}

/// The source-corpus adapter contract (§6): an opaque iterator the core
/// drives by query string, yielding mined documents. Two external
/// digital-library APIs and a local export implement this; none of
/// their internals are in scope (§1).
#[async_trait]
pub trait CorpusAdapter: std::fmt::Debug + Send + Sync {
    fn source_tag(&self) -> &'static str;
    async fn fetch(&self, query: &str) -> CoreResult<Vec<MinedDocument>>;
}
