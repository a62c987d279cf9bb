use crate::error::CoreResult;
use async_trait::async_trait;

/// A department inferred by the external subject classifier, treated as
/// opaque per §1 (it wraps a name-finder and an ITIS-like rank lookup
/// that are out of scope). Assignments produced here always carry the
/// `*` "inferred" marker of the Glossary; only the resolver can upgrade
/// a department to authoritative.
#[async_trait]
pub trait TopicClassifier: std::fmt::Debug + Send + Sync {
    async fn classify(&self, title: &str) -> CoreResult<Option<String>>;
}

/// `rank`/`value`/`dept` triples, checked in order against a
/// lowercased title (`miners/topic.py`'s `Mapping` table, reduced from a
/// full name-finder call to keyword matching since the name-finder
/// itself is an out-of-scope external collaborator, §1).
#[derive(Debug, Clone, Copy)]
pub struct Mapping {
    pub keyword: &'static str,
    pub dept: &'static str,
}

pub const DEFAULT_MAPPINGS: &[Mapping] = &[
    Mapping { keyword: "botan", dept: "bt" },
    Mapping { keyword: "arachnid", dept: "en" },
    Mapping { keyword: "ornitholog", dept: "br" },
    Mapping { keyword: "herpetolog", dept: "hr" },
    Mapping { keyword: "entomolog", dept: "en" },
    Mapping { keyword: "mammal", dept: "mm" },
    Mapping { keyword: "ichthyolog", dept: "fs" },
    Mapping { keyword: "paleontolog", dept: "pl" },
    Mapping { keyword: "palaeontolog", dept: "pl" },
    Mapping { keyword: "mineralog", dept: "ms" },
    Mapping { keyword: "petrolog", dept: "ms" },
    Mapping { keyword: "malacolog", dept: "iz" },
    Mapping { keyword: "anthropolog", dept: "an" },
    Mapping { keyword: "archaeolog", dept: "an" },
];

/// Keyword/rank-mapping implementation of the classifier: the first
/// mapping whose keyword appears in the lowercased title wins.
#[derive(Debug, Clone)]
pub struct KeywordTopicClassifier {
    mappings: Vec<Mapping>,
}

impl KeywordTopicClassifier {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self { mappings }
    }
}

impl Default for KeywordTopicClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAPPINGS.to_vec())
    }
}

#[async_trait]
impl TopicClassifier for KeywordTopicClassifier {
    async fn classify(&self, title: &str) -> CoreResult<Option<String>> {
        let lower = title.to_lowercase();
        Ok(self
            .mappings
            .iter()
            .find(|m| lower.contains(m.keyword))
            .map(|m| format!("{}*", m.dept)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifies_by_keyword_as_inferred() {
        let classifier = KeywordTopicClassifier::default();
        let dept = classifier.classify("Journal of Mammalogy").await.unwrap();
        assert_eq!(dept.as_deref(), Some("mm*"));
    }

    #[tokio::test]
    async fn returns_none_when_no_keyword_matches() {
        let classifier = KeywordTopicClassifier::default();
        assert_eq!(classifier.classify("Proceedings of Nothing in Particular").await.unwrap(), None);
    }
}
