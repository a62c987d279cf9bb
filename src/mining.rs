use crate::batch::{PendingRecord, WriteBatch};
use crate::corpus::{CorpusAdapter, MinedDocument};
use crate::department;
use crate::error::CoreResult;
use crate::model::{Document, Journal, Link, Snippet, Specimen};
use crate::parser;
use crate::regex_bank::RegexBank;
use crate::snippet;
use crate::storage::Storage;
use crate::topic::TopicClassifier;
use std::sync::Arc;

/// Phase 0 of §4.6: drives a [`CorpusAdapter`] for a query, extracts
/// snippets and catalog-number mentions from every page, and stages the
/// resulting rows through a [`WriteBatch`].
#[derive(Debug)]
pub struct MiningRun {
    storage: Arc<dyn Storage>,
    bank: Arc<RegexBank>,
    topic: Arc<dyn TopicClassifier>,
    museum_codes: Vec<String>,
    snippet_window: usize,
    batch: WriteBatch,
}

impl MiningRun {
    pub fn new(
        storage: Arc<dyn Storage>,
        bank: Arc<RegexBank>,
        topic: Arc<dyn TopicClassifier>,
        museum_codes: Vec<String>,
        snippet_window: usize,
        batch_flush_size: usize,
    ) -> Self {
        Self { storage, bank, topic, museum_codes, snippet_window, batch: WriteBatch::new(batch_flush_size) }
    }

    /// Fetches every document matching `query` from `adapter` and mines
    /// it. One document's failure is logged and skipped (§7); it never
    /// aborts the run.
    pub async fn run(&self, adapter: &dyn CorpusAdapter, query: &str) -> CoreResult<usize> {
        let documents = adapter.fetch(query).await?;
        let mut mined = 0;
        for doc in &documents {
            match self.mine_document(adapter.source_tag(), doc).await {
                Ok(()) => mined += 1,
                Err(e) => log::error!("mining failed for {}: {e}", doc.meta.url),
            }
        }
        self.batch.flush(self.storage.as_ref()).await?;
        Ok(mined)
    }

    async fn mine_document(&self, source_tag: &str, mined: &MinedDocument) -> CoreResult<()> {
        let meta = &mined.meta;

        if let Some(title) = &meta.title {
            self.stage(format!("journal|{title}"), PendingRecord::Journal(Journal { title: title.clone(), topic: None })).await?;
        }

        let mut document = Document::new(meta.url.clone());
        document.kind = meta.kind.clone().or_else(|| Some(source_tag.to_string()));
        document.authors = meta.authors.clone();
        document.title = meta.title.clone();
        document.year = meta.year.clone();
        document.publication = meta.publication.clone();
        document.volume = meta.volume.clone();
        document.number = meta.number.clone();
        document.pages = meta.pages.clone();
        document.doi = meta.doi.clone();

        if let Some(title) = &document.title {
            document.topic = self.topic.classify(title).await.unwrap_or(None);
        }
        // §4.2: mineral-science mentions don't use the short-range form
        // (`123456-59`), so extrapolating it there would fabricate numbers.
        let expand_short_ranges = document.topic.as_deref().map(department::bare) != Some("ms");

        let mut parsed_verbatims: Vec<String> = Vec::new();

        for (page_id, text) in &mined.pages {
            let found = snippet::snippets(text, &self.bank, self.snippet_window, true);
            for (verbatim, occurrences) in &found {
                let spec_nums = parser::parse(verbatim, &self.bank, &self.museum_codes, expand_short_ranges);
                if spec_nums.is_empty() {
                    continue;
                }
                for occurrence in occurrences {
                    let snippet_id = Snippet::derive_id(&meta.url, Some(page_id), &occurrence.text);
                    let snippet_row = Snippet {
                        id: snippet_id.clone(),
                        doc_url: meta.url.clone(),
                        page_id: Some(page_id.clone()),
                        snippet: occurrence.text.clone(),
                        notes: None,
                    };
                    self.stage(format!("snippet|{snippet_id}"), PendingRecord::Snippet(snippet_row)).await?;

                    for spec_num in &spec_nums {
                        let specimen_id = Specimen::derive_id(&snippet_id, verbatim, spec_num);
                        let specimen = Specimen { id: specimen_id.clone(), snippet_id: snippet_id.clone(), verbatim: verbatim.clone(), spec_num: spec_num.clone() };
                        self.stage(format!("specimen|{specimen_id}"), PendingRecord::Specimen(specimen)).await?;

                        let link = Link::new(meta.url.clone(), verbatim.clone(), spec_num.clone());
                        self.stage(format!("link|{}", link.id), PendingRecord::Link(link)).await?;
                    }
                }
                parsed_verbatims.push(verbatim.clone());
            }
        }

        for (page_id, text) in &mined.pages {
            for start in snippet::likely_missed(text, &self.bank, &parsed_verbatims) {
                log::warn!("{}: possible unparsed catalog number near byte {start} on page {page_id}", meta.url);
            }
        }

        self.stage(format!("document|{}", document.url), PendingRecord::Document(document)).await
    }

    async fn stage(&self, key: String, record: PendingRecord) -> CoreResult<()> {
        if self.batch.stage(key, record) {
            self.batch.flush(self.storage.as_ref()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegexPatterns;
    use crate::corpus::DocumentMeta;
    use crate::storage_memory::StorageMemory;
    use crate::topic::KeywordTopicClassifier;
    use async_trait::async_trait;

    fn bank() -> Arc<RegexBank> {
        let patterns = RegexPatterns {
            code: "(USNM|NMNH)".into(),
            prefix: "([A-Z]{1,3} ?)".into(),
            number: r"(\d[\d ]{2,8}\d|\d)".into(),
            catnum: r"([A-Z]{1,3} ?)?(\d[\d ]{2,8}\d|\d)([A-Za-z]+|[-/]\w+)?".into(),
            suffix: "([A-Za-z]+|[-/]\\w+)".into(),
            suffix2: "([a-zA-Z]{1,4})".into(),
            filler: r"(no\.|#|specimens?|cat\.)".into(),
            join_range: "(-|to|through)".into(),
            join_discrete: "(,|;|&| and )".into(),
            discrete_mask: r"({catnum}({join_discrete}{catnum})+)".into(),
            range_mask: r"({catnum}{join_range}{catnum})".into(),
            mask: "({code} ?{catnum})".into(),
            simple: r"^[A-Z]{3,5} ?\d{4,8}$".into(),
        };
        Arc::new(RegexBank::compile(&patterns).unwrap())
    }

    #[derive(Debug)]
    struct OneDocAdapter;

    #[async_trait]
    impl CorpusAdapter for OneDocAdapter {
        fn source_tag(&self) -> &'static str {
            "test"
        }

        async fn fetch(&self, _query: &str) -> CoreResult<Vec<MinedDocument>> {
            Ok(vec![MinedDocument {
                meta: DocumentMeta { url: "https://doc/1".into(), title: Some("A Test Paper".into()), ..Default::default() },
                pages: vec![("1".into(), "A specimen, USNM 123456, was collected nearby.".into())],
            }])
        }
    }

    #[tokio::test]
    async fn mines_snippets_and_specimens_from_a_document() {
        let storage = Arc::new(StorageMemory::new());
        let topic = Arc::new(KeywordTopicClassifier::default());
        let run = MiningRun::new(storage.clone(), bank(), topic, vec!["USNM".into(), "NMNH".into()], 32, 1000);
        let mined = run.run(&OneDocAdapter, "test query").await.unwrap();
        assert_eq!(mined, 1);

        let doc = storage.get_document("https://doc/1").await.unwrap().unwrap();
        assert_eq!(doc.title.as_deref(), Some("A Test Paper"));

        let links = storage.links_for_document("https://doc/1").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].spec_num, "USNM 123456");

        let snippets = storage.snippets_for_document("https://doc/1").await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].snippet.contains("USNM 123456"));
    }

    #[derive(Debug)]
    struct MineralogyDocAdapter;

    #[async_trait]
    impl CorpusAdapter for MineralogyDocAdapter {
        fn source_tag(&self) -> &'static str {
            "test"
        }

        async fn fetch(&self, _query: &str) -> CoreResult<Vec<MinedDocument>> {
            Ok(vec![MinedDocument {
                meta: DocumentMeta { url: "https://doc/ms".into(), title: Some("Studies in Mineralogy".into()), ..Default::default() },
                pages: vec![("1".into(), "The specimen USNM 123456-59 is catalogued.".into())],
            }])
        }
    }

    #[tokio::test]
    async fn mineral_science_documents_disable_short_range_expansion() {
        let storage = Arc::new(StorageMemory::new());
        let topic = Arc::new(KeywordTopicClassifier::default());
        let run = MiningRun::new(storage.clone(), bank(), topic, vec!["USNM".into()], 32, 1000);
        run.run(&MineralogyDocAdapter, "test query").await.unwrap();

        let doc = storage.get_document("https://doc/ms").await.unwrap().unwrap();
        assert_eq!(doc.topic.as_deref(), Some("ms*"));

        let links = storage.links_for_document("https://doc/ms").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].spec_num, "USNM 123456-59");
    }
}
