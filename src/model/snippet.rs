use serde::{Deserialize, Serialize};

/// An extracted context window around one or more mentions on a page
/// (`snippets` table). Unique on `(doc_url, page_id, snippet)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub doc_url: String,
    pub page_id: Option<String>,
    pub snippet: String,
    pub notes: Option<String>,
}

impl Snippet {
    /// Stable id derived from the uniqueness key, used as the primary
    /// key and as the value write-behind batching dedups on.
    pub fn derive_id(doc_url: &str, page_id: Option<&str>, snippet: &str) -> String {
        format!("{doc_url}|{}|{snippet}", page_id.unwrap_or(""))
    }
}
