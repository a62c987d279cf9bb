use serde::{Deserialize, Serialize};

/// A catalog-number mention found within a snippet (`specimens` table).
/// Unique on `(snippet_id, verbatim, spec_num)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specimen {
    pub id: String,
    pub snippet_id: String,
    pub verbatim: String,
    /// Canonical stringified form, e.g. `"USNM 123456"`.
    pub spec_num: String,
}

impl Specimen {
    pub fn derive_id(snippet_id: &str, verbatim: &str, spec_num: &str) -> String {
        format!("{snippet_id}|{verbatim}|{spec_num}")
    }
}
