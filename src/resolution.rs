use crate::config::Thresholds;
use crate::department;
use crate::model::{Document, Link, Snippet};
use crate::portal::CollectionsPortal;
use crate::regex_bank::RegexBank;
use crate::score::{self, CandidateRecord, KeywordOpts, Score};
use crate::spec_num::SpecNum;
use crate::storage::Storage;
use crate::topic::TopicClassifier;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The iterative matcher of §4.6: Phase 1 per-mention matching, Phase 2
/// department inference from sibling matches, Phase 3 topic-based
/// inference, Phase 4 range inference. Owns the collaborators the
/// resolver needs rather than reaching through a global singleton.
#[derive(Debug)]
pub struct ResolutionEngine {
    storage: Arc<dyn Storage>,
    portal: Arc<dyn CollectionsPortal>,
    topic: Arc<dyn TopicClassifier>,
    bank: Arc<RegexBank>,
    thresholds: Thresholds,
}

impl ResolutionEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        portal: Arc<dyn CollectionsPortal>,
        topic: Arc<dyn TopicClassifier>,
        bank: Arc<RegexBank>,
        thresholds: Thresholds,
    ) -> Self {
        Self { storage, portal, topic, bank, thresholds }
    }

    /// Runs all four phases across every document, returning the number
    /// that completed without error. Parallelism is permitted at document
    /// granularity only (§5): each document's mutations are fully
    /// serialized, and one document's failure never aborts the corpus.
    pub async fn run(&self) -> usize {
        let documents = match self.storage.all_documents().await {
            Ok(docs) => docs,
            Err(e) => {
                log::error!("could not list documents for resolution: {e}");
                return 0;
            }
        };
        let futures = documents.iter().map(|doc| self.match_document(&doc.url));
        let results = futures::future::join_all(futures).await;
        let mut ok = 0;
        for (doc, result) in documents.iter().zip(results) {
            match result {
                Ok(()) => ok += 1,
                Err(e) => log::error!("resolution failed for document {}: {e}", doc.url),
            }
        }
        ok
    }

    pub async fn match_document(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        self.phase1_per_mention(doc_url).await?;
        self.phase2_sibling_department(doc_url).await?;
        self.phase3_topic_department(doc_url).await?;
        self.phase4_range_inference(doc_url).await?;
        self.recount(doc_url).await?;
        Ok(())
    }

    // ---- Phase 1: per-mention matching --------------------------------

    async fn phase1_per_mention(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        let links = self.storage.links_for_document(doc_url).await?;
        let doc = self.storage.get_document(doc_url).await?;
        let snippets = self.storage.snippets_for_document(doc_url).await?;

        for link in links.into_iter().filter(Link::needs_matching) {
            let updated = self.match_one_link(&link, &snippets, doc.as_ref(), None, None, None).await?;
            self.storage.upsert_link(&updated).await?;
        }
        Ok(())
    }

    /// Tries each spec-number variant (full form, suffix stripped, split
    /// on a literal dash) against each evidence source in turn — snippet
    /// text, document title, then any caller-supplied extras — stopping
    /// at the first source with a surviving candidate (§4.6 Phase 1).
    /// `min_score`, when set, raises the bar above `filter_records`'s
    /// baseline `> 1` cutoff — the sibling and range-inference phases use
    /// it since their extra evidence is generic rather than specimen-
    /// specific (§4.6 Phases 2/4).
    async fn match_one_link(
        &self,
        link: &Link,
        snippets: &[Snippet],
        doc: Option<&Document>,
        forced_dept: Option<&str>,
        extra_sources: Option<&[(&str, &str)]>,
        min_score: Option<f64>,
    ) -> crate::error::CoreResult<Link> {
        let variants = Self::spec_num_variants(&link.spec_num);

        let snippet_kw = self.snippet_keywords(snippets, &link.verbatim);
        let mut sources: Vec<(&str, Option<HashSet<String>>)> =
            vec![("Matched snippet", if snippet_kw.is_empty() { None } else { Some(snippet_kw) })];
        if let Some(title) = doc.and_then(|d| d.title.as_deref()) {
            sources.push(("Matched document title", Some(score::get_keywords(title, &KeywordOpts::default_minlen()))));
        }
        for (label, text) in extra_sources.unwrap_or(&[]) {
            sources.push((label, Some(score::get_keywords(text, &KeywordOpts::default_minlen()))));
        }

        for variant in &variants {
            let records = match self.portal.get_specimen_by_id(variant).await {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("portal lookup failed for {variant:?}: {e}");
                    continue;
                }
            };
            if records.is_empty() {
                continue;
            }
            let Some(refnum) = SpecNum::parse_canonical(variant) else { continue };

            for (label, kw) in &sources {
                let scored = score::filter_records(&records, &refnum, kw.as_ref(), forced_dept, &self.bank);
                let clears_bar = min_score.is_none_or(|threshold| scored.first().is_some_and(|(_, s)| s.points() > threshold));
                if !scored.is_empty() && clears_bar {
                    return Ok(self.apply_match(link, scored, forced_dept, label));
                }
            }
        }

        let mut missed = link.clone();
        if missed.match_quality.is_none() {
            missed.match_quality = Some("No match".to_string());
        }
        Ok(missed)
    }

    fn spec_num_variants(spec_num: &str) -> Vec<String> {
        let mut variants = vec![spec_num.to_string()];
        let trimmed: String = spec_num.trim_end_matches(|c: char| c.is_alphabetic()).trim().to_string();
        if trimmed != spec_num && !trimmed.is_empty() {
            variants.push(trimmed);
        }
        if let Some((head, _)) = spec_num.split_once('-') {
            let head = head.trim();
            if head != spec_num && !head.is_empty() {
                variants.push(head.to_string());
            }
        }
        variants
    }

    fn snippet_keywords(&self, snippets: &[Snippet], verbatim: &str) -> HashSet<String> {
        let text: String =
            snippets.iter().filter(|s| s.snippet.contains(verbatim)).map(|s| s.snippet.as_str()).collect::<Vec<_>>().join(" ");
        score::get_keywords(&text, &KeywordOpts::default_minlen())
    }

    /// Builds the updated link from the max-scoring candidate set
    /// returned by [`score::filter_records`]. `forced_dept`, when
    /// present, is recorded verbatim (already carrying its `*` marker or
    /// not, per the calling phase) rather than derived from the matched
    /// records' `collectionCode`.
    fn apply_match(&self, link: &Link, found: Vec<(CandidateRecord, Score)>, forced_dept: Option<&str>, quality_label: &str) -> Link {
        let best_score = found[0].1.clone();
        let records: Vec<CandidateRecord> = found.into_iter().map(|(r, _)| r).collect();

        let mut updated = link.clone();
        let mut ezids: Vec<String> = records.iter().filter_map(|r| r.occurrence_id.clone()).collect();
        ezids.sort();
        ezids.dedup();
        updated.ezid = Some(ezids.join("|"));
        updated.match_quality = Some(best_score.summary(quality_label));
        updated.department = forced_dept.map(str::to_string).or_else(|| records.first().and_then(|r| r.collection_code.clone()));
        updated.has_similar_ref = updated.has_similar_ref
            || records.iter().any(|r| r.associated_references.as_deref().is_some_and(|s| !s.trim().is_empty()));
        updated
    }

    // ---- Phase 2: sibling department inference -------------------------

    /// When one department dominates a document's already-matched links
    /// (§4.6 Phase 2), every unmatched or only-contextually-assigned link
    /// gets a retry forced to that department; a matched link that holds
    /// out under a different, non-forced department is demoted back to
    /// unmatched so it can be retried too.
    async fn phase2_sibling_department(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        let links = self.storage.links_for_document(doc_url).await?;
        let mut tally: HashMap<String, usize> = HashMap::new();
        for link in &links {
            let from_phase1 = link
                .match_quality
                .as_deref()
                .is_some_and(|q| ["Matched snippet", "Matched document title"].iter().any(|p| q.starts_with(p)));
            if from_phase1 && !link.eligible_for_inference() {
                if let Some(dept) = &link.department {
                    *tally.entry(department::bare(dept).to_string()).or_insert(0) += 1;
                }
            }
        }
        let total: usize = tally.values().sum();
        let sole_candidates = tally.values().filter(|c| **c >= self.thresholds.sibling_sole_min_count).count();
        let adopted = tally.iter().find(|(_, count)| {
            let majority = total > 0
                && (**count as f64 / total as f64) > self.thresholds.sibling_majority_pct
                && **count > self.thresholds.sibling_majority_min_count;
            let sole = sole_candidates == 1 && **count >= self.thresholds.sibling_sole_min_count;
            majority || sole
        });
        let Some((adopted_dept, _)) = adopted else { return Ok(()) };
        let adopted_dept = adopted_dept.to_string();
        let forced = format!("{adopted_dept}*");

        let doc = self.storage.get_document(doc_url).await?;
        let snippets = self.storage.snippets_for_document(doc_url).await?;
        for link in links {
            if link.department.as_deref().map(department::bare) == Some(adopted_dept.as_str()) {
                continue;
            }
            let has_authoritative_match = link.ezid.is_some() && !link.eligible_for_inference();
            if has_authoritative_match {
                continue;
            }
            if link.ezid.is_some() {
                // Matched under a different contextual department; demote
                // so it is retried under the adopted one below.
                let mut cleared = link.clone();
                cleared.ezid = None;
                cleared.match_quality = None;
                cleared.department = None;
                self.storage.upsert_link(&cleared).await?;
            }
            let updated =
                self.match_one_link(&link, &snippets, doc.as_ref(), Some(&forced), None, Some(self.thresholds.inferred_score_threshold)).await?;
            self.storage.upsert_link(&updated).await?;
        }
        Ok(())
    }

    // ---- Phase 3: topic-based department inference ---------------------

    async fn phase3_topic_department(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        let Some(doc) = self.storage.get_document(doc_url).await? else { return Ok(()) };
        let topic = match &doc.topic {
            Some(t) => Some(t.clone()),
            None => match &doc.title {
                Some(title) => match self.storage.get_journal(title).await? {
                    Some(journal) if journal.topic.is_some() => journal.topic,
                    _ => self.topic.classify(title).await.unwrap_or(None),
                },
                None => None,
            },
        };
        let Some(topic) = topic else { return Ok(()) };

        let links = self.storage.links_for_document(doc_url).await?;
        let snippets = self.storage.snippets_for_document(doc_url).await?;
        for link in links.into_iter().filter(Link::needs_matching).filter(Link::eligible_for_inference) {
            let updated = self.match_one_link(&link, &snippets, Some(&doc), Some(&topic), None, None).await?;
            self.storage.upsert_link(&updated).await?;
        }
        Ok(())
    }

    // ---- Phase 4: range inference ---------------------------------------

    /// Treats consecutive same-department matched numbers as runs and
    /// assigns still-unmatched numbers that fall within or close to one
    /// run's span the run's department, retrying the match with the
    /// neighboring specimens' catalog numbers as extra evidence text
    /// (§4.6 Phase 4).
    async fn phase4_range_inference(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        let links = self.storage.links_for_document(doc_url).await?;
        let mut matched: Vec<(Link, SpecNum)> = links
            .iter()
            .filter(|l| l.ezid.is_some())
            .filter_map(|l| SpecNum::parse_canonical(&l.spec_num).map(|n| (l.clone(), n)))
            .collect();
        matched.sort_by_key(|(_, n)| n.number);

        let missed: Vec<Link> = links.into_iter().filter(Link::needs_matching).filter(Link::eligible_for_inference).collect();
        if matched.is_empty() || missed.is_empty() {
            return Ok(());
        }

        let runs = Self::contiguous_runs(&matched, self.thresholds.range_inference_max_distance);
        let doc = self.storage.get_document(doc_url).await?;
        let snippets = self.storage.snippets_for_document(doc_url).await?;

        for link in missed {
            let Some(num) = SpecNum::parse_canonical(&link.spec_num) else { continue };
            let Some(run) = Self::nearest_run(&runs, num.number, self.thresholds.range_inference_max_distance) else { continue };
            if run.dept.is_empty() {
                continue;
            }
            let dept = format!("{}*", run.dept);
            let metadata = run.members.iter().map(|m| m.stringify()).join(", ");
            let sources: [(&str, &str); 1] = [("Matched adjacent specimens", metadata.as_str())];
            let updated = self
                .match_one_link(&link, &snippets, doc.as_ref(), Some(&dept), Some(&sources), Some(self.thresholds.inferred_score_threshold))
                .await?;
            self.storage.upsert_link(&updated).await?;
        }
        Ok(())
    }

    fn contiguous_runs(matched: &[(Link, SpecNum)], max_distance: u32) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        for (link, num) in matched {
            let dept = link.department.as_deref().map(department::bare).unwrap_or("").to_string();
            match runs.last_mut() {
                Some(run) if run.dept == dept && num.number.saturating_sub(run.max) <= max_distance => {
                    run.max = num.number;
                    run.members.push(num.clone());
                }
                _ => runs.push(Run { dept, min: num.number, max: num.number, members: vec![num.clone()] }),
            }
        }
        runs
    }

    fn nearest_run<'r>(runs: &'r [Run], number: u32, max_distance: u32) -> Option<&'r Run> {
        runs.iter()
            .filter(|r| {
                (r.min..=r.max).contains(&number)
                    || (number < r.min && r.min - number <= max_distance)
                    || (number > r.max && number - r.max <= max_distance)
            })
            .min_by_key(|r| if (r.min..=r.max).contains(&number) { 0 } else { number.abs_diff(if number < r.min { r.min } else { r.max }) })
    }

    // ---- Post-phase counting --------------------------------------------

    /// Recomputes `Document.num_specimens` and each `Link.num_snippets`
    /// after a full pass, since sibling/range retries can change how many
    /// links end up matched and which snippets they span (§3).
    async fn recount(&self, doc_url: &str) -> crate::error::CoreResult<()> {
        let Some(mut doc) = self.storage.get_document(doc_url).await? else { return Ok(()) };
        let links = self.storage.links_for_document(doc_url).await?;
        doc.num_specimens = links.iter().filter(|l| l.ezid.is_some()).count() as i64;
        self.storage.upsert_document(&doc).await?;

        let snippets = self.storage.snippets_for_document(doc_url).await?;
        for mut link in links {
            let count = snippets.iter().filter(|s| s.snippet.contains(&link.verbatim)).count() as i64;
            if link.num_snippets != count {
                link.num_snippets = count;
                self.storage.upsert_link(&link).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Run {
    dept: String,
    min: u32,
    max: u32,
    members: Vec<SpecNum>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Specimen};
    use crate::portal::FakePortal;
    use crate::regex_bank::RegexBank;
    use crate::storage_memory::StorageMemory;
    use crate::topic::KeywordTopicClassifier;

    fn bank() -> Arc<RegexBank> {
        let patterns = crate::config::RegexPatterns {
            code: "(USNM|NMNH)".into(),
            prefix: "([A-Z]{1,3} ?)".into(),
            number: r"(\d[\d ]{2,8}\d|\d)".into(),
            catnum: r"({prefix}?{number}({suffix})?)".into(),
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

    fn engine(storage: Arc<StorageMemory>, portal: Arc<FakePortal>) -> ResolutionEngine {
        ResolutionEngine::new(storage, portal, Arc::new(KeywordTopicClassifier::default()), bank(), Thresholds::default())
    }

    #[tokio::test]
    async fn phase1_matches_link_using_snippet_keywords() {
        let storage = Arc::new(StorageMemory::new());
        let portal = Arc::new(FakePortal::new());

        storage.upsert_document(&Document::new("https://doc/1")).await.unwrap();
        let snippet = Snippet {
            id: "s1".into(),
            doc_url: "https://doc/1".into(),
            page_id: Some("1".into()),
            snippet: "NMNH 344300 Foraminifera from the core".into(),
            notes: None,
        };
        storage.upsert_snippet(&snippet).await.unwrap();
        storage
            .upsert_specimen(&Specimen {
                id: "sp1".into(),
                snippet_id: "s1".into(),
                verbatim: "NMNH 344300".into(),
                spec_num: "NMNH 344300".into(),
            })
            .await
            .unwrap();
        let link = Link::new("https://doc/1", "NMNH 344300", "NMNH 344300");
        storage.upsert_link(&link).await.unwrap();

        portal.insert(
            "NMNH 344300",
            vec![
                CandidateRecord {
                    occurrence_id: Some("urn:paleo".into()),
                    collection_code: Some("Paleobiology".into()),
                    higher_classification: Some("Foraminifera".into()),
                    ..Default::default()
                },
                CandidateRecord {
                    occurrence_id: Some("urn:mineral".into()),
                    collection_code: Some("Mineral Sciences".into()),
                    ..Default::default()
                },
            ],
        );

        let engine = engine(storage.clone(), portal);
        engine.match_document("https://doc/1").await.unwrap();

        let updated = storage.get_link(&link.id).await.unwrap().unwrap();
        assert_eq!(updated.ezid.as_deref(), Some("urn:paleo"));
        assert!(updated.match_quality.as_deref().unwrap().starts_with("Matched snippet"));
    }

    #[tokio::test]
    async fn phase2_rescues_unmatched_links_with_sibling_department() {
        let storage = Arc::new(StorageMemory::new());
        let portal = Arc::new(FakePortal::new());
        storage.upsert_document(&Document::new("https://doc/2")).await.unwrap();

        for i in 0..25 {
            let verbatim = format!("USNM {}", 100000 + i);
            let mut link = Link::new("https://doc/2", &verbatim, &verbatim);
            link.ezid = Some(format!("urn:{i}"));
            link.match_quality = Some("Matched snippet".to_string());
            link.department = Some("Vertebrate Zoology: Mammals".to_string());
            storage.upsert_link(&link).await.unwrap();
        }
        let unmatched = Link::new("https://doc/2", "USNM 999999", "USNM 999999");
        storage.upsert_link(&unmatched).await.unwrap();
        portal.insert(
            "USNM 999999",
            vec![CandidateRecord {
                occurrence_id: Some("urn:rescued".into()),
                collection_code: Some("Vertebrate Zoology: Mammals".into()),
                ..Default::default()
            }],
        );

        let engine = engine(storage.clone(), portal);
        engine.match_document("https://doc/2").await.unwrap();

        let updated = storage.get_link(&unmatched.id).await.unwrap().unwrap();
        assert_eq!(updated.ezid.as_deref(), Some("urn:rescued"));
        assert_eq!(updated.department.as_deref(), Some("Vertebrate Zoology: Mammals*"));
    }

    #[tokio::test]
    async fn phase4_infers_department_from_adjacent_range() {
        let storage = Arc::new(StorageMemory::new());
        let portal = Arc::new(FakePortal::new());
        storage.upsert_document(&Document::new("https://doc/3")).await.unwrap();

        for n in [100000u32, 100001, 100002] {
            let verbatim = format!("USNM {n}");
            let mut link = Link::new("https://doc/3", &verbatim, &verbatim);
            link.ezid = Some(format!("urn:{n}"));
            link.match_quality = Some("Matched snippet".to_string());
            link.department = Some("Paleobiology".to_string());
            storage.upsert_link(&link).await.unwrap();
        }
        let isolated = Link::new("https://doc/3", "USNM 100005", "USNM 100005");
        storage.upsert_link(&isolated).await.unwrap();
        portal.insert(
            "USNM 100005",
            vec![CandidateRecord {
                occurrence_id: Some("urn:100005".into()),
                collection_code: Some("Paleobiology".into()),
                ..Default::default()
            }],
        );

        let engine = engine(storage.clone(), portal);
        engine.match_document("https://doc/3").await.unwrap();

        let updated = storage.get_link(&isolated.id).await.unwrap().unwrap();
        assert_eq!(updated.ezid.as_deref(), Some("urn:100005"));
        assert_eq!(updated.department.as_deref(), Some("Paleobiology*"));
    }
}
