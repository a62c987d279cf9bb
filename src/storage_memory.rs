use crate::error::CoreResult;
use crate::model::{Document, Journal, Link, Snippet, Specimen, Taxon};
use crate::storage::Storage;
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory `Storage` implementation, used as a test double and for
/// dry runs without a database (§3/§6). Grounded in the teacher's
/// `dashmap`-backed caches (`taxon_matcher.rs`, `portal.rs` here);
/// the teacher itself has no in-memory store since it always targets
/// MySQL directly.
#[derive(Debug, Default)]
pub struct StorageMemory {
    journals: DashMap<String, Journal>,
    documents: DashMap<String, Document>,
    snippets: DashMap<String, Snippet>,
    specimens: DashMap<String, Specimen>,
    links: DashMap<String, Link>,
    taxa: DashMap<String, Taxon>,
}

impl StorageMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for StorageMemory {
    async fn disconnect(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn upsert_journal(&self, journal: &Journal) -> CoreResult<()> {
        self.journals.insert(journal.title.to_lowercase(), journal.clone());
        Ok(())
    }

    async fn get_journal(&self, title: &str) -> CoreResult<Option<Journal>> {
        Ok(self.journals.get(&title.to_lowercase()).map(|j| j.clone()))
    }

    async fn upsert_document(&self, document: &Document) -> CoreResult<()> {
        self.documents.insert(document.url.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, url: &str) -> CoreResult<Option<Document>> {
        Ok(self.documents.get(url).map(|d| d.clone()))
    }

    async fn documents_by_topic(&self, topic: &str) -> CoreResult<Vec<Document>> {
        Ok(self.documents.iter().filter(|d| d.topic.as_deref() == Some(topic)).map(|d| d.clone()).collect())
    }

    async fn all_documents(&self) -> CoreResult<Vec<Document>> {
        Ok(self.documents.iter().map(|d| d.clone()).collect())
    }

    async fn upsert_snippet(&self, snippet: &Snippet) -> CoreResult<()> {
        self.snippets.insert(snippet.id.clone(), snippet.clone());
        Ok(())
    }

    async fn snippets_for_document(&self, doc_url: &str) -> CoreResult<Vec<Snippet>> {
        Ok(self.snippets.iter().filter(|s| s.doc_url == doc_url).map(|s| s.clone()).collect())
    }

    async fn upsert_specimen(&self, specimen: &Specimen) -> CoreResult<()> {
        self.specimens.insert(specimen.id.clone(), specimen.clone());
        Ok(())
    }

    async fn specimens_for_snippet(&self, snippet_id: &str) -> CoreResult<Vec<Specimen>> {
        Ok(self.specimens.iter().filter(|s| s.snippet_id == snippet_id).map(|s| s.clone()).collect())
    }

    async fn upsert_link(&self, link: &Link) -> CoreResult<()> {
        self.links.insert(link.id.clone(), link.clone());
        Ok(())
    }

    async fn get_link(&self, id: &str) -> CoreResult<Option<Link>> {
        Ok(self.links.get(id).map(|l| l.clone()))
    }

    async fn links_for_document(&self, doc_url: &str) -> CoreResult<Vec<Link>> {
        Ok(self.links.iter().filter(|l| l.doc_url == doc_url).map(|l| l.clone()).collect())
    }

    async fn links_needing_match(&self, limit: usize) -> CoreResult<Vec<Link>> {
        Ok(self.links.iter().filter(|l| l.needs_matching()).take(limit).map(|l| l.clone()).collect())
    }

    async fn upsert_taxon(&self, taxon: &Taxon) -> CoreResult<()> {
        self.taxa.insert(taxon.name.to_lowercase(), taxon.clone());
        Ok(())
    }

    async fn get_taxon(&self, name: &str) -> CoreResult<Option<Taxon>> {
        Ok(self.taxa.get(&name.to_lowercase()).map(|t| t.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_link() {
        let storage = StorageMemory::new();
        let link = Link::new("https://doc", "USNM 123456", "USNM 123456");
        storage.upsert_link(&link).await.unwrap();
        let fetched = storage.get_link(&link.id).await.unwrap().unwrap();
        assert_eq!(fetched.verbatim, "USNM 123456");
    }

    #[tokio::test]
    async fn journal_lookup_is_case_insensitive() {
        let storage = StorageMemory::new();
        storage.upsert_journal(&Journal { title: "Nature".into(), topic: None }).await.unwrap();
        assert!(storage.get_journal("nature").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn links_needing_match_excludes_resolved_links() {
        let storage = StorageMemory::new();
        let mut resolved = Link::new("https://doc", "USNM 1", "USNM 1");
        resolved.ezid = Some("urn:1".to_string());
        resolved.match_quality = Some("Matched snippet".to_string());
        let unresolved = Link::new("https://doc", "USNM 2", "USNM 2");
        storage.upsert_link(&resolved).await.unwrap();
        storage.upsert_link(&unresolved).await.unwrap();
        let needing = storage.links_needing_match(10).await.unwrap();
        assert_eq!(needing.len(), 1);
        assert_eq!(needing[0].verbatim, "USNM 2");
    }
}
