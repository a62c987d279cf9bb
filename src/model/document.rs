use serde::{Deserialize, Serialize};

/// A mined publication or document (`documents` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub publication_url: Option<String>,
    pub kind: Option<String>,
    pub authors: Option<String>,
    /// FK to `Journal::title`.
    pub title: Option<String>,
    pub year: Option<String>,
    pub publication: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub topic: Option<String>,
    pub num_specimens: i64,
    pub num_snippets: i64,
}

impl Document {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            publication_url: None,
            kind: None,
            authors: None,
            title: None,
            year: None,
            publication: None,
            volume: None,
            number: None,
            pages: None,
            doi: None,
            topic: None,
            num_specimens: 0,
            num_snippets: 0,
        }
    }
}
