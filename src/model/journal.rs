use serde::{Deserialize, Serialize};

/// A cited journal or serial (`journals` table). `title` is the primary
/// key and is treated case-insensitively by the storage layer, matching
/// `database.py`'s `String(collation='nocase')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub title: String,
    pub topic: Option<String>,
}
