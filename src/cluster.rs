use crate::regex_bank::RegexBank;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_SINGLE_NUMBER: Regex = Regex::new(r"^\d+[a-z]?$").expect("static regex");
    static ref RE_BARE_NUM: Regex = Regex::new(r"\b\d+\b").expect("static regex");
    static ref RE_PREFIXED_NUM: Regex = Regex::new(r"\b[A-Z]{1,3} ?\d+\b").expect("static regex");
    static ref RE_SPLIT_NUM: Regex = Regex::new(r"([A-Za-z]*\d+)").expect("static regex");
    static ref RE_WHOLE_OR_PARTIAL: Regex = Regex::new(r"^[A-Z]{1,3} ?\d+").expect("static regex");
    static ref RE_CATNUM_LOOSE: Regex =
        Regex::new(r"^([A-Z]{1,3} ?\d{2,6}|\d{4,6})(-([A-Z]{1,3} ?\d{2,6}|\d{4,6}))?$").expect("static regex");
    static ref RE_SUFFIX: Regex =
        Regex::new(r"^(\d{1,4}|[a-z](-[a-z]|[a-z]+)|[a-z]\d|\d[a-z])$").expect("static regex");
    static ref RE_ALPHA_SUFFIX: Regex =
        Regex::new(r"^([a-z](-[a-z]|[a-z]+)?|[a-z]\d|\d[a-z])$").expect("static regex");
    static ref RE_ENDS_WITH_RANGE: Regex = Regex::new(r"[a-z]-[a-z]$").expect("static regex");
    static ref RE_STRAY_LETTERS: Regex = Regex::new(r"[A-Za-z]{2,}\.?").expect("static regex");
}

/// OCR character-confusable substitution table (§4.3). Applied only to
/// tokens that aren't plain alphabetic words, so real words survive
/// untouched.
pub fn fix_ocr_errors(token: &str) -> String {
    if token.chars().all(|c| c.is_alphabetic()) {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| match c {
            'i' | 'I' | 'l' => '1',
            'O' => '0',
            'S' => '5',
            other => other,
        })
        .collect()
}

fn ends_with_range(val: &str) -> bool {
    RE_ENDS_WITH_RANGE.is_match(val)
}

fn split_on_delim(val: &str) -> Vec<String> {
    Regex::new(r"(,|;|\.|&| and )")
        .expect("static regex")
        .split(val)
        .map(|s| s.to_string())
        .collect()
}

/// letter-range `a-c` -> `[a, b, c]`; discrete list `a,b,d` -> as given.
pub fn expand_alpha_suffixes(val: &str, join_range: &Regex) -> Vec<String> {
    lazy_static! {
        static ref RE_LETTER: Regex = Regex::new(r"(?:^|[^A-Za-z])([A-Za-z])(?:$|[^A-Za-z])").expect("x");
    }
    let suf_range_re = {
        let pat = format!(r"(([A-Za-z]){}([A-Za-z]))", join_range.as_str());
        Regex::new(&pat).unwrap_or_else(|_| Regex::new(r"([A-Za-z])-([A-Za-z])").unwrap())
    };
    if let Some(caps) = suf_range_re.captures(val) {
        let first = caps.get(2).unwrap().as_str().chars().next().unwrap();
        let last = caps.get(3).unwrap().as_str().chars().next().unwrap();
        if first.is_ascii_lowercase() && last.is_ascii_lowercase() && first <= last {
            return (first as u8..=last as u8).map(|b| (b as char).to_string()).collect();
        }
    }
    RE_LETTER
        .captures_iter(val)
        .map(|c| c.get(1).unwrap().as_str().to_string())
        .collect()
}

/// Right-to-left trailing-value validator (§4.3 `validate_last`): is the
/// last fragment in `vals` plausibly a catalog number or suffix, given
/// the delimiter that precedes it?
fn validate_last(vals: &[String], bank: &RegexBank) -> bool {
    let Some(last) = vals.last() else { return false };
    let val = last.trim_matches(|c: char| c == '#' || c == ' ');
    if val.is_empty() {
        return false;
    }
    if Regex::new(r"^[^A-Za-z0-9]").unwrap().is_match(val) {
        return false;
    }
    let is_valid = is_valid_catnum(val, bank, 4);
    let is_digit = val.chars().all(|c| c.is_ascii_digit());
    let is_alpha_suffix = RE_ALPHA_SUFFIX.is_match(val);

    if vals.len() > 2 {
        let delim = vals[vals.len() - 2].trim();
        if delim == "," || delim == ";" {
            if is_alpha_suffix && (val.len() > 1 || val != "lIO") {
                return true;
            } else if is_valid && !is_digit {
                return true;
            } else if is_valid && is_digit && val.len() >= 4 {
                return true;
            }
            return false;
        } else if delim == "." && is_alpha_suffix {
            return false;
        }
    }
    true
}

fn is_valid_catnum(val: &str, _bank: &RegexBank, minlen: usize) -> bool {
    if !RE_CATNUM_LOOSE.is_match(val) {
        return false;
    }
    let head = val.split('-').next().unwrap_or(val);
    head.len() >= minlen
}

/// Drop unlikely trailing fragments: filler words, then trailing
/// fragments the right-to-left validator rejects, then anything past
/// the first stray multi-letter word (§4.3 `trim_bad_values`).
pub fn trim_bad_values(val: &str, bank: &RegexBank) -> String {
    let stripped = bank.filler.replace_all(val, "");
    let mut vals: Vec<String> = split_on_delim(&stripped);
    while vals.len() > 1 && !validate_last(&vals, bank) {
        vals.pop();
    }
    let mut cut = vals.len();
    for (i, v) in vals.iter().enumerate() {
        let t = v.trim();
        if !t.is_empty() && t.chars().all(|c| c.is_alphabetic()) && t.len() > 1 {
            cut = i + 1;
            break;
        }
    }
    vals.truncate(cut);
    join_fragments(&vals).trim_end_matches([' ', ',', ';', '&']).to_string()
}

fn join_fragments(vals: &[String]) -> String {
    vals.join("").trim().to_string()
}

/// Digit-fragment clustering (§4.3 `cluster`/`combine`): reassembles
/// numbers split by OCR noise into catalog-number-shaped fragments.
/// Returns the input unchanged when it recognizes a shape it shouldn't
/// touch (an existing range, a slash suffix, mixed prefixed/unprefixed
/// numbers, or an already-valid single number).
pub fn cluster(val: &str, bank: &RegexBank, minlen: usize, maxlen: Option<usize>) -> String {
    let val = trim_bad_values(val, bank);

    let mut val = val;
    if val.contains(' ') && val.replace(' ', "").len() <= 10 {
        val = val.replace(' ', "");
    }
    if val.matches('-').count() == 1 {
        let parts: Vec<&str> = val.splitn(2, '-').map(|s| s.trim()).collect();
        if parts.len() == 2 && parts[0].len() <= 3 && (2..=4).contains(&parts[1].len()) {
            val = format!("{}{}", parts[0], parts[1]);
        }
    }

    if RE_SINGLE_NUMBER.is_match(&val) {
        return val;
    }
    if RE_BARE_NUM.is_match(&val) && RE_PREFIXED_NUM.is_match(&val) {
        return val;
    }
    if val.matches('/').count() == 1 {
        if let Some(tail) = val.rsplit('/').next() {
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
                return val;
            }
        }
    }
    if bank.join_range.is_match(&val) {
        let suf_range_re_src = format!(r"(([A-Za-z]){}([A-Za-z]))", bank.join_range.as_str());
        let is_suf_range = Regex::new(&suf_range_re_src).map(|r| r.is_match(&val)).unwrap_or(false);
        if !is_suf_range {
            return val;
        }
    }

    let parts: Vec<String> = RE_SPLIT_NUM
        .split(&val)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    if parts.is_empty() {
        return val;
    }
    let cleaned = clean_fragments(&parts);
    let combined = combine(&cleaned, bank, minlen, maxlen);
    combined.join("")
}

fn clean_fragments(vals: &[String]) -> Vec<String> {
    vals.iter().map(|v| RE_STRAY_LETTERS.replace_all(v, "").to_string()).collect()
}

/// Greedily reassembles alphabetic/numeric fragments into catalog
/// numbers, treating whole prefixed tokens as anchors, numeric runs as
/// concatenable, and lone letters as suffixes on the most recent
/// cluster.
fn combine(vals: &[String], bank: &RegexBank, minlen: usize, maxlen: Option<usize>) -> Vec<String> {
    let maxlen = maxlen.unwrap_or_else(|| vals.iter().map(|v| v.len()).max().unwrap_or(6).max(6));
    let mut clustered: Vec<String> = Vec::new();
    let mut fragment = String::new();
    let mut zap_frag = false;

    for orig in vals {
        let val = orig.trim_end_matches([';', '&', ' ']);
        if RE_WHOLE_OR_PARTIAL.is_match(val) {
            if !fragment.is_empty() && !clustered.iter().any(|n| n.starts_with(fragment.as_str())) {
                clustered.push(fragment.clone());
            }
            fragment = val.to_string();
            zap_frag = false;
        } else if !val.is_empty() && val.chars().all(|c| c.is_ascii_digit()) {
            if fragment.len() == maxlen || zap_frag {
                if !fragment.is_empty() && !clustered.iter().any(|n| n.starts_with(fragment.as_str())) {
                    clustered.push(fragment.clone());
                }
                fragment.clear();
                zap_frag = false;
            }
            fragment.push_str(val);
            if fragment.len() > maxlen {
                break;
            }
        } else if val.len() == 1 && val.chars().all(|c| c.is_alphabetic()) {
            clustered.push(format!("{fragment}{val}").trim_end_matches(';').to_string());
            zap_frag = true;
        } else if val != " " && !fragment.is_empty() {
            for sub in split_on_delim(val) {
                for suffix in expand_alpha_suffixes(&sub, &bank.join_range) {
                    clustered.push(format!("{fragment}{suffix}"));
                    zap_frag = true;
                }
            }
        }
    }
    if !fragment.is_empty() && !clustered.iter().any(|n| n.starts_with(fragment.as_str())) {
        if fragment.len() >= minlen {
            clustered.push(fragment);
        } else {
            return vals.to_vec();
        }
    }
    clustered
}

/// A numeric range (`n1`..=`n2`), both sharing an optional `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumRange {
    pub prefix: String,
    pub n1: u32,
    pub n2: u32,
}

impl NumRange {
    /// §4.3 `_is_range`: same prefix, no suffix on either endpoint, a
    /// positive difference under the configured max, with either both
    /// numbers over 100 or the difference itself small.
    pub fn is_valid(n1: u32, n2: u32, max_diff: u32) -> bool {
        if n2 <= n1 {
            return false;
        }
        let diff = n2 - n1;
        (n1 > 100 && n2 > 100 || diff < max_diff) && diff > 0 && diff < max_diff
    }

    /// §4.3 `short_range`: reinterprets a short second endpoint as the
    /// tail digits of a full number sharing `n1`'s higher-order digits
    /// (`123456-59` -> `123456-123459`).
    pub fn expand_short(n1: u32, n2_raw: &str) -> Option<u32> {
        let width = n2_raw.len() as u32;
        let n2_val: u32 = n2_raw.parse().ok()?;
        let scale = 10u32.checked_pow(width)?;
        Some((n1 / scale) * scale + n2_val)
    }

    /// Fully materialized list of catalog-number strings for this range.
    pub fn expand(&self, code: &str) -> Vec<String> {
        (self.n1..=self.n2)
            .map(|n| {
                if self.prefix.is_empty() {
                    format!("{code} {n}")
                } else {
                    format!("{code} {}{}", self.prefix, n)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegexPatterns;

    fn bank() -> RegexBank {
        let patterns = RegexPatterns {
            code: "(USNM|NMNH)".into(),
            prefix: "([A-Z]{1,3} ?)".into(),
            number: r"(\d[\d ]{2,8}\d|\d)".into(),
            catnum: "({prefix}?{number}({suffix})?)".into(),
            suffix: "([A-Za-z]+|[-/]\\w+)".into(),
            suffix2: "([a-zA-Z]{1,4})".into(),
            filler: r"(no\.|#|specimens?|cat\.)".into(),
            join_range: "(-|to|through)".into(),
            join_discrete: "(,|;|&| and )".into(),
            discrete_mask: "({catnum}({join_discrete}{catnum})+)".into(),
            range_mask: "({catnum}{join_range}{catnum})".into(),
            mask: "({code} ?{catnum})".into(),
            simple: r"^[A-Z]{3,5} ?\d{4,8}$".into(),
        };
        RegexBank::compile(&patterns).expect("bank compiles")
    }

    #[test]
    fn ocr_fix_applies_only_to_non_alpha_tokens() {
        assert_eq!(fix_ocr_errors("I23456"), "123456");
        assert_eq!(fix_ocr_errors("Specimen"), "Specimen");
    }

    #[test]
    fn cluster_leaves_single_number_alone() {
        let b = bank();
        assert_eq!(cluster("123456", &b, 4, None), "123456");
    }

    #[test]
    fn range_validity_requires_small_positive_diff_or_large_numbers() {
        assert!(NumRange::is_valid(123456, 123459, 50));
        assert!(!NumRange::is_valid(123456, 123459 + 1000, 50));
        assert!(!NumRange::is_valid(123459, 123456, 50));
    }

    #[test]
    fn short_range_expands_against_first_endpoint() {
        assert_eq!(NumRange::expand_short(123456, "59"), Some(123459));
    }

    #[test]
    fn alpha_suffix_range_expands_inclusive() {
        let join_range = Regex::new("-").unwrap();
        assert_eq!(expand_alpha_suffixes("a-c", &join_range), vec!["a", "b", "c"]);
    }

    #[test]
    fn alpha_suffix_discrete_list_expands_as_given() {
        let join_range = Regex::new("-").unwrap();
        assert_eq!(expand_alpha_suffixes("a,b,d", &join_range), vec!["a", "b", "d"]);
    }
}
