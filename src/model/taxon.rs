use serde::{Deserialize, Serialize};

/// Caches a taxon-name-to-department inference so repeated documents
/// sharing a taxon don't re-invoke the external name-finder (§3,
/// supplemental table grounded in `topic.py`'s `Mapping` rank table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    pub name: String,
    pub rank: Option<String>,
    pub department: Option<String>,
}
