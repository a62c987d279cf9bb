use crate::error::CoreResult;
use crate::model::{Document, Journal, Link, Snippet, Specimen, Taxon};
use async_trait::async_trait;

/// The persistence contract over the seven tables of §3/§6. Every method
/// is an upsert-or-read against a single table; batching and retry live
/// one layer up, in [`crate::batch::WriteBatch`].
#[async_trait]
pub trait Storage: std::fmt::Debug + Send + Sync {
    async fn disconnect(&self) -> CoreResult<()>;

    async fn upsert_journal(&self, journal: &Journal) -> CoreResult<()>;
    async fn get_journal(&self, title: &str) -> CoreResult<Option<Journal>>;

    async fn upsert_document(&self, document: &Document) -> CoreResult<()>;
    async fn get_document(&self, url: &str) -> CoreResult<Option<Document>>;
    async fn documents_by_topic(&self, topic: &str) -> CoreResult<Vec<Document>>;
    async fn all_documents(&self) -> CoreResult<Vec<Document>>;

    async fn upsert_snippet(&self, snippet: &Snippet) -> CoreResult<()>;
    async fn snippets_for_document(&self, doc_url: &str) -> CoreResult<Vec<Snippet>>;

    async fn upsert_specimen(&self, specimen: &Specimen) -> CoreResult<()>;
    async fn specimens_for_snippet(&self, snippet_id: &str) -> CoreResult<Vec<Specimen>>;

    async fn upsert_link(&self, link: &Link) -> CoreResult<()>;
    async fn get_link(&self, id: &str) -> CoreResult<Option<Link>>;
    async fn links_for_document(&self, doc_url: &str) -> CoreResult<Vec<Link>>;
    async fn links_needing_match(&self, limit: usize) -> CoreResult<Vec<Link>>;

    async fn upsert_taxon(&self, taxon: &Taxon) -> CoreResult<()>;
    async fn get_taxon(&self, name: &str) -> CoreResult<Option<Taxon>>;
}
