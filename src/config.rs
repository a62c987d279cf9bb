use crate::error::CoreError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// The named regular expressions of the Regex Bank (§4.1), loaded as data
/// rather than hardcoded so domain experts can maintain the pattern set
/// without touching code.
#[derive(Debug, Clone, Deserialize)]
pub struct RegexPatterns {
    pub code: String,
    pub prefix: String,
    pub number: String,
    pub catnum: String,
    pub suffix: String,
    pub suffix2: String,
    pub filler: String,
    pub join_range: String,
    pub join_discrete: String,
    pub discrete_mask: String,
    pub range_mask: String,
    pub mask: String,
    pub simple: String,
}

/// Thresholds used by range expansion and the resolution engine's sibling/
/// range-inference phases. Kept as named, documented constants rather than
/// magic numbers buried in the code (§9 open question).
#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_max_range_diff")]
    pub max_range_diff: u32,
    #[serde(default = "default_range_max_distance")]
    pub range_inference_max_distance: u32,
    #[serde(default = "default_sibling_majority_pct")]
    pub sibling_majority_pct: f64,
    #[serde(default = "default_sibling_majority_min_count")]
    pub sibling_majority_min_count: usize,
    #[serde(default = "default_sibling_sole_min_count")]
    pub sibling_sole_min_count: usize,
    #[serde(default = "default_context_score_threshold")]
    pub context_score_threshold: f64,
    #[serde(default = "default_inferred_score_threshold")]
    pub inferred_score_threshold: f64,
}

const fn default_max_range_diff() -> u32 {
    50
}
const fn default_range_max_distance() -> u32 {
    1000
}
const fn default_sibling_majority_pct() -> f64 {
    0.7
}
const fn default_sibling_majority_min_count() -> usize {
    20
}
const fn default_sibling_sole_min_count() -> usize {
    5
}
const fn default_context_score_threshold() -> f64 {
    1.0
}
const fn default_inferred_score_threshold() -> f64 {
    2.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_range_diff: default_max_range_diff(),
            range_inference_max_distance: default_range_max_distance(),
            sibling_majority_pct: default_sibling_majority_pct(),
            sibling_majority_min_count: default_sibling_majority_min_count(),
            sibling_sole_min_count: default_sibling_sole_min_count(),
            context_score_threshold: default_context_score_threshold(),
            inferred_score_threshold: default_inferred_score_threshold(),
        }
    }
}

/// Exponential backoff parameters for external calls (§5).
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_base")]
    pub base: f64,
    #[serde(default = "default_backoff_min_secs")]
    pub min_secs: u64,
    #[serde(default = "default_backoff_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_non_retryable_statuses")]
    pub non_retryable_statuses: Vec<u16>,
}

const fn default_backoff_base() -> f64 {
    2.0
}
const fn default_backoff_min_secs() -> u64 {
    2
}
const fn default_backoff_max_retries() -> u32 {
    8
}
fn default_non_retryable_statuses() -> Vec<u16> {
    vec![400, 401, 402, 403, 404, 500]
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: default_backoff_base(),
            min_secs: default_backoff_min_secs(),
            max_retries: default_backoff_max_retries(),
            non_retryable_statuses: default_non_retryable_statuses(),
        }
    }
}

/// Top-level configuration document (§6): a single YAML file providing the
/// regex bank, museum-code list, debug flags, and the department table,
/// plus the connection details this implementation needs for persistence
/// and the external portal.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub regex: RegexPatterns,
    pub museum_codes: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub troubleshoot: Option<String>,
    pub departments: HashMap<String, String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub backoff: BackoffConfig,
    pub db_url: String,
    pub portal_url: String,
    #[serde(default = "default_snippet_window")]
    pub snippet_window: usize,
    #[serde(default = "default_batch_size")]
    pub batch_flush_size: usize,
    #[serde(default)]
    pub bhl_api_key: Option<String>,
    #[serde(default)]
    pub gdd_api_base: Option<String>,
}

const fn default_snippet_window() -> usize {
    32
}
const fn default_batch_size() -> usize {
    1000
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CoreError::Configuration(format!("cannot open config file {}: {e}", path.display()))
        })?;
        let config: Config = serde_yaml::from_reader(file).map_err(|e| {
            CoreError::Configuration(format!("cannot parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.museum_codes.is_empty() {
            return Err(CoreError::Configuration(
                "museum_codes must name at least one museum code".into(),
            ));
        }
        if self.departments.is_empty() {
            return Err(CoreError::Configuration(
                "departments table must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_yaml() -> &'static str {
        r#"
museum_codes: [USNM, NMNH]
debug: false
departments:
  an: Anthropology
  pl: Paleobiology
db_url: "mysql://localhost/speciminer"
portal_url: "https://geogallery.si.edu/portal"
regex:
  code: "(USNM|NMNH|USNH)"
  prefix: "([A-Z]{1,3} ?)"
  number: "(\\d[\\d ]{2,8}\\d|\\d)"
  catnum: "({prefix}?{number}({suffix})?)"
  suffix: "([A-Za-z]+|[-/]\\w+)"
  suffix2: "([a-zA-Z]{1,4})"
  filler: "(no\\.|#|specimens?|cat\\.)"
  join_range: "(-|–|to|through|—)"
  join_discrete: "(,|;|&| and )"
  discrete_mask: "({catnum}({join_discrete}{catnum})+)"
  range_mask: "({catnum}{join_range}{catnum})"
  mask: "({code} ?{catnum})"
  simple: "^[A-Z]{3,5} ?\\d{4,8}$"
"#
    }

    #[test]
    fn loads_valid_config() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(sample_yaml().as_bytes()).unwrap();
        let config = Config::load(f.path()).unwrap();
        assert_eq!(config.museum_codes, vec!["USNM", "NMNH"]);
        assert_eq!(config.thresholds.max_range_diff, 50);
        assert_eq!(config.backoff.max_retries, 8);
    }

    #[test]
    fn rejects_missing_file() {
        let err = Config::load("/nonexistent/path/config.yaml").unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn rejects_empty_museum_codes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let bad = sample_yaml().replace("museum_codes: [USNM, NMNH]", "museum_codes: []");
        f.write_all(bad.as_bytes()).unwrap();
        let err = Config::load(f.path()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }
}
