use crate::cluster::{self, NumRange};
use crate::error::CoreError;
use crate::regex_bank::RegexBank;
use crate::spec_num::SpecNum;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref RE_CODE_RUN: Regex = Regex::new(r"[A-Z]{3,} ?").expect("static regex");
    static ref RE_LEADING_PREFIX: Regex = Regex::new(r"^[A-Z ]+").expect("static regex");
    static ref RE_DISCRETE_SPLIT: Regex = Regex::new(r",|;| and | & ").expect("static regex");
}

const SUFFIX_DELIMS: &[&str] = &["--", " - ", "-", ",", "/", "."];

fn split_keep(re: &Regex, s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in re.find_iter(s) {
        if m.start() > last {
            out.push(s[last..m.start()].to_string());
        }
        out.push(m.as_str().to_string());
        last = m.end();
    }
    if last < s.len() {
        out.push(s[last..].to_string());
    }
    out
}

/// §4.2 step 1-2: normalize a raw mention and split it into per-museum-code
/// chunks, moving a trailing `(CODE)` to the front and inserting a space
/// after each code occurrence so word-boundary splitting behaves.
fn normalize_and_split(text: &str, codes: &[String]) -> Vec<String> {
    let mut val = text.to_string();
    for code in codes {
        let trailing = format!("({code})");
        if val.trim_end().ends_with(&trailing) {
            let head = &val[..val.len() - trailing.len()];
            val = format!("{code} {}", head.trim());
        }
        val = val.replace(code.as_str(), &format!("{code} ")).replace("  ", " ");
    }
    let words: Vec<String> = split_keep(&RE_CODE_RUN, &val)
        .into_iter()
        .filter(|w| !w.is_empty() && w != "(" && w != ")")
        .collect();

    let mut code = String::new();
    let mut held: Vec<Vec<String>> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let trimmed = word.trim();
        if codes.iter().any(|c| c == trimmed) {
            code = trimmed.to_string();
            held.push(vec![word.clone()]);
        } else if !trimmed.is_empty()
            && trimmed.chars().all(|c| c.is_alphabetic())
            && i > 0
            && words[i - 1].trim() != code
        {
            code.clear();
        } else if !code.is_empty() && !trimmed.is_empty() {
            if let Some(last) = held.last_mut() {
                last.push(word.clone());
            }
        }
    }
    held.into_iter()
        .filter(|group| group.len() > 1)
        .map(|group| group.concat())
        .collect()
}

/// §4.2: the full catalog-number-mention parsing pipeline. Splits `text`
/// on museum-code boundaries and parses each mention independently; a
/// mention that can't be parsed is logged and dropped rather than
/// failing the whole call. `expand_short_ranges` gates the §4.3.4
/// short-range extrapolation (`123456-59` -> `123456-123459`); callers
/// disable it for mineral-science documents, which don't use the form.
pub fn parse(text: &str, bank: &RegexBank, codes: &[String], expand_short_ranges: bool) -> Vec<String> {
    let mut out = Vec::new();
    for mention in normalize_and_split(text, codes) {
        match parse_mention(&mention, bank, expand_short_ranges) {
            Ok(parsed) => out.extend(parsed),
            Err(e) => log::warn!("could not parse {mention:?} from {text:?}: {e}"),
        }
    }
    out
}

fn parse_mention(val: &str, bank: &RegexBank, expand_short_ranges: bool) -> Result<Vec<String>, CoreError> {
    let val = val.replace("--", "-").replace('^', "").replace(" and ", " & ");
    let val = val.trim_matches(|c: char| "(),;& ".contains(c)).to_string();
    let code = bank
        .code
        .find(&val)
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| CoreError::ParseFailure(val.clone()))?;

    if bank.simple.is_match(&val) {
        return Ok(vec![val]);
    }

    let mut nums: Vec<SpecNum> = Vec::new();
    let masked: Vec<String> = bank.mask.find_iter(&val).map(|m| m.as_str().to_string()).collect();
    for m in &masked {
        let cleaned = remove_museum_code(m, &code, bank);
        nums.extend(parse_discrete(&cleaned, &code, bank, expand_short_ranges));
        nums.extend(parse_ranges(&cleaned, &code, bank, expand_short_ranges));
    }
    if nums.is_empty() {
        if let Some(range) = as_range(&val, &code, bank, expand_short_ranges) {
            nums = range;
        }
    }
    if nums.is_empty() {
        let cleaned = remove_museum_code(&val, &code, bank);
        let clustered = cluster::cluster(&cluster_ocr_fix(&cleaned), bank, 4, None);
        nums.push(parse_num(&clustered, &code, bank));
    }

    if nums.len() > 1 {
        let lengths: Vec<usize> = nums.iter().map(|n| n.number.to_string().len()).collect();
        let minlen = *lengths.iter().min().unwrap_or(&0);
        if minlen < 4 {
            let maxlen = *lengths.iter().max().unwrap_or(&0);
            if maxlen >= 2 {
                let cutoff = 10u32.pow((maxlen - 2) as u32);
                nums.retain(|n| n.number > cutoff);
            }
        }
    }

    let mut strs: Vec<String> = nums.iter().map(|n| n.stringify()).collect();
    let mut seen = HashSet::new();
    strs.retain(|s| seen.insert(s.clone()));

    if val.to_lowercase().contains("type") {
        strs = strs.into_iter().map(|s| s.replacen(' ', " type no. ", 1)).collect();
    }
    Ok(strs)
}

/// Applies the OCR substitution table to each non-alphabetic run of a
/// larger string, preserving real words (`fix_ocr_errors`, non-match mode).
pub fn cluster_ocr_fix(val: &str) -> String {
    lazy_static! {
        static ref RE_RUN: Regex = Regex::new(r"\W+|\w+").expect("static regex");
    }
    RE_RUN
        .find_iter(val)
        .map(|m| cluster::fix_ocr_errors(m.as_str()))
        .collect()
}

fn extract_leading_prefix(val: &str) -> String {
    RE_LEADING_PREFIX
        .find(val)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn is_whole_catnum(val: &str, bank: &RegexBank) -> bool {
    let pat = format!("^{}$", bank.catnum);
    Regex::new(&pat).map(|r| r.is_match(val.trim())).unwrap_or(false)
}

/// §4.2/§4.3 `parse_discrete`: finds a `discrete_mask` match (clustering
/// the value first if none is found directly), then either expands it as
/// a range, treats it as a single whole catalog number, or splits it on
/// `join_discrete` into per-number chunks, inheriting the first prefix
/// onto prefix-less siblings.
fn parse_discrete(val: &str, code: &str, bank: &RegexBank, expand_short_ranges: bool) -> Vec<SpecNum> {
    let cleaned = bank.filler.replace_all(val, "").to_string();
    let prefix = extract_leading_prefix(&cleaned);

    let mut working = cleaned.clone();
    if bank.discrete_mask.find(&working).is_none() {
        working = cluster::cluster(&cluster_ocr_fix(&working), bank, 4, None);
    }
    let Some(m) = bank.discrete_mask.find(&working) else {
        return Vec::new();
    };
    let chunk = cluster::cluster(&cluster_ocr_fix(m.as_str().trim()), bank, 4, None);

    if let Some(range) = as_range(&chunk, code, bank, expand_short_ranges) {
        return range;
    }
    if is_whole_catnum(&chunk, bank) {
        return vec![parse_num(&chunk.replace(' ', ""), code, bank)];
    }

    let mut nums = Vec::new();
    let mut spec_nums: Vec<String> = RE_DISCRETE_SPLIT.split(&chunk).map(|s| s.trim().to_string()).collect();
    if spec_nums.iter().any(|s| !is_whole_catnum(s, bank)) {
        spec_nums = Regex::new(&bank.catnum)
            .map(|r| r.find_iter(&chunk).map(|m| m.as_str().to_string()).collect())
            .unwrap_or_default();
    }
    for piece in RE_DISCRETE_SPLIT.split(&chunk) {
        if let Some(range) = as_range(piece, code, bank, expand_short_ranges) {
            let stringified: Vec<String> = range.iter().map(|n| n.stringify()).collect();
            spec_nums.retain(|n| n != piece);
            spec_nums.extend(stringified);
        }
    }
    spec_nums.sort();
    spec_nums.dedup();

    for spec_num in spec_nums {
        let mut spec_num = remove_museum_code(&spec_num, code, bank);
        if !spec_num.starts_with(prefix.as_str()) {
            spec_num = format!("{prefix}{spec_num}");
        }
        if let Some(range) = as_range(&spec_num, code, bank, expand_short_ranges) {
            nums.extend(range);
        } else if is_whole_catnum(spec_num.trim(), bank) {
            nums.push(parse_num(&spec_num.replace(' ', ""), code, bank));
        } else {
            nums.push(parse_num(&spec_num, code, bank));
        }
    }
    nums
}

/// §4.2/§4.3 `parse_ranges`: finds a `range_mask` match and expands it.
fn parse_ranges(val: &str, code: &str, bank: &RegexBank, expand_short_ranges: bool) -> Vec<SpecNum> {
    let clustered = cluster::cluster(&cluster_ocr_fix(val), bank, 4, None);
    let Some(m) = bank.range_mask.find(&clustered) else {
        return Vec::new();
    };
    let spec_num = m.as_str().trim();
    if let Some(range) = as_range(spec_num, code, bank, expand_short_ranges) {
        return range;
    }
    Vec::new()
}

/// Tries to read `val` as an explicit two-endpoint range (`"123456-459"`)
/// and expand it, applying short-range extrapolation when the literal
/// pair isn't valid on its own (§4.3 `is_range`/`fill_range`/`short_range`).
/// Extrapolation itself is skipped entirely when `expand_short_ranges` is
/// false (§4.2 input flag; disabled for mineral-science documents).
fn as_range(val: &str, code: &str, bank: &RegexBank, expand_short_ranges: bool) -> Option<Vec<SpecNum>> {
    let caps = bank.range_mask.captures(val).or_else(|| {
        let pat = format!("^{}$", bank.range_mask.as_str());
        Regex::new(&pat).ok()?.captures(val)
    });
    let (n1_raw, n2_raw) = if let Some(caps) = caps {
        let whole = caps.get(0)?.as_str();
        split_on_join_range(whole, bank)?
    } else {
        split_on_join_range(val, bank)?
    };
    let n1 = parse_num(n1_raw.trim(), code, bank);
    let n2 = parse_num(n2_raw.trim(), code, bank);
    let prefix = if n1.prefix.is_empty() { n2.prefix.clone() } else { n1.prefix.clone() };

    if NumRange::is_valid(n1.number, n2.number, 50) && n1.suffix.is_empty() && n2.suffix.is_empty() {
        let range = NumRange { prefix, n1: n1.number, n2: n2.number };
        return Some(expand_range(&range, &n1.code));
    }
    if expand_short_ranges && n2.number < n1.number && n2_raw.trim().len() < n1.number.to_string().len() {
        if let Some(expanded) = NumRange::expand_short(n1.number, n2_raw.trim()) {
            if NumRange::is_valid(n1.number, expanded, 50) && n1.suffix.is_empty() && n2.suffix.is_empty() {
                let range = NumRange { prefix, n1: n1.number, n2: expanded };
                return Some(expand_range(&range, &n1.code));
            }
        }
    }
    None
}

fn expand_range(range: &NumRange, code: &str) -> Vec<SpecNum> {
    (range.n1..=range.n2)
        .map(|n| SpecNum::new(code, range.prefix.clone(), n, ""))
        .collect()
}

fn split_on_join_range<'a>(val: &'a str, bank: &RegexBank) -> Option<(String, String)> {
    let m = bank.join_range.find(val)?;
    let head = val[..m.start()].to_string();
    let tail = val[m.end()..].to_string();
    if head.trim().is_empty() || tail.trim().is_empty() {
        return None;
    }
    Some((head, tail))
}

/// §4.2 `remove_museum_code`: strips the museum code from the start of a
/// value.
pub fn remove_museum_code(val: &str, code: &str, bank: &RegexBank) -> String {
    let stripped = if !code.is_empty() && val.contains(code) {
        val.replacen(code, "", 1)
    } else {
        bank.code.replace(val, "").to_string()
    };
    stripped.replace("()", "").trim_matches([' ', '-']).to_string()
}

/// §4.2 `parse_num`: splits a cleaned mention into `(prefix, number,
/// suffix)`. The delimiter search order (`--`, `" - "`, `-`, `,`, `/`,
/// `.`) matters: the first delimiter found from the right wins, and a
/// spaced-out hyphen (`" - "`) never yields a suffix.
pub fn parse_num(val: &str, code: &str, bank: &RegexBank) -> SpecNum {
    let cleaned = remove_museum_code(val.trim(), code, bank);
    let cleaned = bank.filler.replace_all(&cleaned, "").to_string();

    let mut prefix = extract_leading_prefix(&cleaned);
    if prefix.chars().count() == 1 {
        prefix = cluster::fix_ocr_errors(&prefix);
    }
    if prefix.chars().all(|c| c.is_ascii_digit()) {
        prefix.clear();
    }

    let mut number = cleaned[prefix.len().min(cleaned.len())..].trim_matches([' ', '-']).to_string();
    let mut suffix = String::new();
    let mut used_delim = "";
    for delim in SUFFIX_DELIMS {
        if let Some(idx) = number.rfind(delim) {
            let (head, tail) = number.split_at(idx);
            let tail = &tail[delim.len()..];
            if *delim == " - " {
                number = head.trim_matches([' ', '-', ',', '/', '.']).to_string();
                used_delim = delim;
                break;
            }
            number = head.trim_matches([' ', '-', ',', '/', '.']).to_string();
            suffix = tail.trim_matches([' ', '-', ',', '/', '.']).to_string();
            used_delim = delim;
            break;
        }
    }

    let all_digit = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digit(&number) {
        let fallback_ok = number.len() > 6 && all_digit(&number[..number.len() - 1]);
        if !fallback_ok {
            number = number.chars().map(|c| cluster::fix_ocr_errors(&c.to_string())).collect();
        }
    }
    if !all_digit(&number) {
        if let Some(m) = bank.suffix2.find(&number) {
            let trailing = m.as_str();
            suffix = format!("{trailing}{used_delim}{suffix}").trim().to_string();
            number = number.trim_end_matches(|c| trailing.contains(c)).to_string();
        }
    }

    let prefix = prefix.trim().to_string();
    let number = cluster_ocr_fix(&number);
    if number.len() < 6 {
        suffix = cluster::fix_ocr_errors(suffix.trim());
    }
    let number: u32 = number.parse().unwrap_or(0);
    SpecNum::new(code, prefix, number, suffix.to_uppercase())
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
        RegexBank::compile(&patterns).expect("bank compiles")
    }

    #[test]
    fn simple_fast_path_returns_verbatim() {
        let b = bank();
        let result = parse("USNM 123456", &b, &["USNM".to_string(), "NMNH".to_string()], true);
        assert_eq!(result, vec!["USNM 123456".to_string()]);
    }

    #[test]
    fn parse_num_splits_prefix_number_suffix() {
        let b = bank();
        let n = parse_num("PAL 76012a", "USNM", &b);
        assert_eq!(n.prefix, "PAL");
        assert_eq!(n.number, 76012);
        assert_eq!(n.suffix, "A");
    }

    #[test]
    fn remove_museum_code_strips_prefix() {
        let b = bank();
        assert_eq!(remove_museum_code("USNM 123456", "USNM", &b), "123456");
    }

    #[test]
    fn short_number_filter_drops_implausible_fragment() {
        let b = bank();
        let text = "USNM 123456, 12";
        let parsed = parse(text, &b, &["USNM".to_string()], true);
        assert!(parsed.iter().all(|s| !s.ends_with(" 12")));
    }

    #[test]
    fn short_range_expands_by_default() {
        let b = bank();
        let parsed = parse("USNM 123456-59", &b, &["USNM".to_string()], true);
        assert_eq!(
            parsed,
            vec!["USNM 123456", "USNM 123457", "USNM 123458", "USNM 123459"]
        );
    }

    #[test]
    fn short_range_stays_a_single_catnum_when_expansion_disabled() {
        let b = bank();
        let parsed = parse("USNM 123456-59", &b, &["USNM".to_string()], false);
        assert_eq!(parsed, vec!["USNM 123456-59"]);
    }
}
