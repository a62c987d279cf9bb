use crate::department;
use crate::parser;
use crate::regex_bank::RegexBank;
use crate::spec_num::SpecNum;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// A `SimpleDarwinRecord` as returned by the collections portal (§6),
/// trimmed to the fields the scorer and persistence layer need.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub occurrence_id: Option<String>,
    pub catalog_number: Option<String>,
    pub record_number: Option<String>,
    pub collection_code: Option<String>,
    pub higher_classification: Option<String>,
    pub vernacular_name: Option<String>,
    pub scientific_name: Option<String>,
    pub group: Option<String>,
    pub formation: Option<String>,
    pub member: Option<String>,
    pub country: Option<String>,
    pub state_province: Option<String>,
    pub municipality: Option<String>,
    pub island: Option<String>,
    pub verbatim_locality: Option<String>,
    pub associated_references: Option<String>,
}

impl CandidateRecord {
    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "higherClassification" => self.higher_classification.as_deref(),
            "vernacularName" => self.vernacular_name.as_deref(),
            "scientificName" => self.scientific_name.as_deref(),
            "group" => self.group.as_deref(),
            "formation" => self.formation.as_deref(),
            "member" => self.member.as_deref(),
            "country" => self.country.as_deref(),
            "stateProvince" => self.state_province.as_deref(),
            "municipality" => self.municipality.as_deref(),
            "island" => self.island.as_deref(),
            "verbatimLocality" => self.verbatim_locality.as_deref(),
            "collectionCode" => self.collection_code.as_deref(),
            _ => None,
        }
    }
}

/// Accumulates named score contributions (§4.5). Uses an explicit
/// `HashMap<String, f64>` of components rather than a dynamic dict so
/// every contribution is traceable by name.
#[derive(Debug, Clone, Default)]
pub struct Score {
    components: HashMap<String, f64>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, keys: &[&str], val: f64) -> &mut Self {
        let key = keys.join("/");
        *self.components.entry(key).or_insert(0.0) += val;
        self
    }

    pub fn get(&self, key: &str) -> f64 {
        *self.components.get(key).unwrap_or(&0.0)
    }

    /// Sum of every component, points and penalties alike.
    pub fn points(&self) -> f64 {
        self.components.values().sum()
    }

    /// §4.5 `Score.summary`: a parenthetical enumerating which grouped
    /// facets contributed, tested in the same order as `link.py`.
    pub fn summary(&self, general: &str) -> String {
        let mut matched = Vec::new();
        if ["higherClassification", "vernacularName", "scientificName/catalogNumber"]
            .iter()
            .any(|k| self.get(k) > 0.0)
        {
            matched.push("taxa");
        }
        if self.get("group/formation/member") > 0.0 {
            matched.push("stratigraphy");
        }
        if ["country", "stateProvince"].iter().any(|k| self.get(k) > 0.0) {
            matched.push("country/state");
        }
        if self.get("municipality/island/verbatimLocality") > 0.0 {
            matched.push("locality");
        }
        if self.get("collectionCode") > 0.0 {
            matched.push("collection");
        }
        if ["prefix", "suffix"].iter().any(|k| self.get(k) > 1.0) {
            matched.push("catalog");
        }
        if matched.is_empty() {
            general.to_string()
        } else {
            format!("{general} (matched {})", matched.join(", "))
        }
    }

    fn score_keywords(
        &mut self,
        rec: &CandidateRecord,
        keys: &[&str],
        refwords: &HashSet<String>,
        multiplier: f64,
        match_all: bool,
        opts: &KeywordOpts,
    ) -> &mut Self {
        let joined: String = keys.iter().filter_map(|k| rec.field(k)).collect::<Vec<_>>().join(" ");
        let keywords = get_keywords(&joined, opts);
        let mut val = 0.0;
        if !keywords.is_empty() {
            let overlap = keywords.intersection(refwords).count();
            if match_all && overlap == keywords.len() {
                val = multiplier;
            } else if !match_all {
                val = multiplier * overlap as f64;
            }
        }
        self.add(keys, val)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordOpts {
    pub minlen: usize,
    pub endings: Vec<String>,
    pub replacements: Vec<(String, String)>,
}

impl KeywordOpts {
    pub fn default_minlen() -> Self {
        Self { minlen: 5, endings: Vec::new(), replacements: Vec::new() }
    }
}

fn blacklist() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static LIST: OnceLock<HashSet<&'static str>> = OnceLock::new();
    LIST.get_or_init(|| {
        [
            "above", "along", "animalia", "beach", "boundary", "coast", "collection", "confluence",
            "county", "creek", "district", "early", "eastern", "family", "formation", "harbor",
            "indet", "island", "late", "locality", "lower", "member", "middle", "mountain",
            "national", "north", "northern", "northeast", "northeastern", "northwest",
            "northwestern", "genus", "group", "present", "province", "ridge", "river", "slide",
            "slope", "south", "southern", "southeast", "southeastern", "southwest", "southwestern",
            "sp", "specimen", "states", "united", "unknown", "upper", "valley", "western", "blue",
            "green", "red", "yellow", "white", "black", "the", "and", "of", "in", "a", "an", "to",
            "for", "with", "on", "at", "by", "from",
        ]
        .into_iter()
        .collect()
    })
}

/// §4.5 `get_keywords`: lowercase, ASCII-fold, strip punctuation, keep
/// alphabetic tokens of at least `minlen`, drop blacklisted/stopword
/// terms, optionally strip a known ending and apply literal
/// replacements.
pub fn get_keywords(text: &str, opts: &KeywordOpts) -> HashSet<String> {
    let folded: String = text.to_lowercase().nfkd().filter(char::is_ascii).collect();
    let mut out = HashSet::new();
    for raw in folded.split_whitespace() {
        let word = raw.trim_matches(|c: char| ".:;,-!?()".contains(c));
        if word.is_empty() || !word.chars().all(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        if word.len() < opts.minlen || blacklist().contains(word) {
            continue;
        }
        let mut word = word.to_string();
        for ending in &opts.endings {
            if word.ends_with(ending.as_str()) {
                word.truncate(word.len() - ending.len());
                break;
            }
        }
        for (find, repl) in &opts.replacements {
            word = word.replace(find.as_str(), repl.as_str());
        }
        if word.len() > 2 {
            out.insert(word);
        }
    }
    out
}

/// §4.5 `filter_records`: scores every candidate against the reference
/// catalog number and optional topic keywords/department, keeping only
/// the maximum-scoring subset among those with `points() > 1`.
pub fn filter_records(
    records: &[CandidateRecord],
    refnum: &SpecNum,
    keywords: Option<&HashSet<String>>,
    dept: Option<&str>,
    bank: &RegexBank,
) -> Vec<(CandidateRecord, Score)> {
    let resolved_dept = match dept.map(department::resolve) {
        Some(None) => {
            log::error!("bad department: {}", dept.unwrap_or_default());
            return Vec::new();
        }
        Some(Some(name)) => Some(name),
        None => None,
    };

    let taxa_endings = ["idae", "ian", "ide", "ine", "ia", "us", "s", "a", "e"].map(String::from).to_vec();
    let taxa_replacements = vec![("aeo".to_string(), "eo".to_string()), ("usc".to_string(), "usk".to_string())];

    let mut scored = Vec::new();
    for rec in records {
        let mut score = Score::new();
        let catnum = candidate_spec_num(rec, refnum, bank);

        if let Some(catnum) = &catnum {
            if refnum.prefix.is_empty() && catnum.prefix.len() == 1 {
                score.add(&["prefix"], -1.0);
            }
            if catnum.prefix != refnum.prefix && catnum.prefix == "SD" {
                score.add(&["prefix"], -1.0);
            }
            if catnum.number != refnum.number {
                score.add(&["number"], -100.0);
            }
            if score.points() >= 0.0 && !refnum.prefix.is_empty() && catnum.prefix == refnum.prefix {
                score.add(&["prefix"], 1.0);
            }
            if score.points() >= 0.0 && !refnum.suffix.is_empty() && catnum.suffix == refnum.suffix {
                score.add(&["suffix"], 1.0);
            }
        }

        if let Some(resolved) = &resolved_dept {
            let bare_dept = department::bare(resolved);
            if rec.collection_code.as_deref() == Some(bare_dept) {
                score.add(&["collectionCode"], 1.0);
                if department::is_contextual(resolved) {
                    score.add(&["collectionCode"], 0.5);
                }
            } else {
                score.add(&["collectionCode"], -100.0);
            }
        }

        if let Some(kw) = keywords {
            let opts_hc = KeywordOpts { minlen: 5, endings: taxa_endings.clone(), replacements: taxa_replacements.clone() };
            let opts_plain = KeywordOpts::default_minlen();
            if rec.collection_code.as_deref() != Some(department::MINERAL_SCIENCES) {
                score.score_keywords(rec, &["higherClassification"], kw, 5.0, false, &opts_hc);
                score.score_keywords(rec, &["vernacularName"], kw, 3.0, true, &opts_plain);
            } else {
                score.score_keywords(rec, &["scientificName", "catalogNumber"], kw, 3.0, true, &opts_plain);
            }
            if matches!(rec.collection_code.as_deref(), Some(department::MINERAL_SCIENCES) | Some(department::PALEOBIOLOGY)) {
                score.score_keywords(rec, &["group", "formation", "member"], kw, 3.0, false, &opts_plain);
            }
            score.score_keywords(rec, &["country"], kw, 0.51, true, &opts_plain);
            score.score_keywords(rec, &["stateProvince"], kw, 0.51, true, &opts_plain);
            score.score_keywords(rec, &["municipality", "island", "verbatimLocality"], kw, 1.0, false, &opts_plain);
        }

        if score.points() > 1.0 {
            scored.push((rec.clone(), score));
        }
    }

    if scored.is_empty() {
        return scored;
    }
    let max_score = scored.iter().map(|(_, s)| s.points()).fold(f64::MIN, f64::max);
    scored.into_iter().filter(|(_, s)| (s.points() - max_score).abs() < f64::EPSILON).collect()
}

fn candidate_spec_num(rec: &CandidateRecord, refnum: &SpecNum, bank: &RegexBank) -> Option<SpecNum> {
    if let Some(catnum) = &rec.catalog_number {
        let last = catnum.to_uppercase();
        let last = last.split('|').next_back().unwrap_or(&last).trim();
        if !last.is_empty() {
            return Some(parser::parse_num(last, &refnum.code, bank));
        }
    }
    if let Some(record_number) = &rec.record_number {
        for candidate in record_number.to_uppercase().split('|') {
            if candidate.trim() == refnum.number.to_string() {
                return Some(parser::parse_num(candidate.trim(), &refnum.code, bank));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_keywords_drops_short_and_blacklisted_words() {
        let kw = get_keywords("the Formation near a Creek", &KeywordOpts::default_minlen());
        assert!(kw.is_empty());
    }

    #[test]
    fn get_keywords_keeps_plausible_taxon_words() {
        let kw = get_keywords("Tyrannosaurus rex specimen", &KeywordOpts::default_minlen());
        assert!(kw.contains("tyrannosaurus"));
    }

    #[test]
    fn summary_lists_matched_facets() {
        let mut score = Score::new();
        score.add(&["country"], 0.51);
        score.add(&["collectionCode"], 1.0);
        assert_eq!(score.summary("Matched snippet"), "Matched snippet (matched country/state, collection)");
    }
}
