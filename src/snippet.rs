use crate::regex_bank::RegexBank;
use std::collections::HashMap;

/// A single occurrence of a mention within a page: the surrounding text
/// window plus the byte offsets of the matched substring in the source
/// text (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSnippet {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// §4.4 `snippets`: scans `text` for every `mask` match, building a
/// context-windowed, optionally highlighted excerpt around each. Matches
/// on the same verbatim substring are grouped together.
pub fn snippets(text: &str, bank: &RegexBank, num_chars: usize, highlight: bool) -> HashMap<String, Vec<IndexedSnippet>> {
    let mut out: HashMap<String, Vec<IndexedSnippet>> = HashMap::new();
    for m in bank.mask.find_iter(text) {
        let val = m.as_str();
        let start = m.start();
        let end = m.end();
        let i = start.saturating_sub(num_chars);
        let j = (end + num_chars).min(text.len());

        let mut snippet = String::new();
        if i > 0 {
            snippet.push_str("...");
        }
        snippet.push_str(text[i..j].trim());
        if j < text.len() {
            snippet.push_str("...");
        }
        let snippet = if highlight {
            snippet.replace(val, &format!("**{val}**"))
        } else {
            snippet
        };
        out.entry(val.to_string()).or_default().push(IndexedSnippet { text: snippet, start, end });
    }
    out
}

/// §4.4 second pass: blanks every already-parsed verbatim mention out of
/// `text`, then re-scans the residue with the bare `code` pattern to
/// surface catalog numbers near a museum code that the full mask missed.
pub fn likely_missed(text: &str, bank: &RegexBank, already_parsed: &[String]) -> Vec<usize> {
    let mut residue = text.to_string();
    for verbatim in already_parsed {
        residue = residue.replace(verbatim.as_str(), &" ".repeat(verbatim.chars().count()));
    }
    bank.code.find_iter(&residue).map(|m| m.start()).collect()
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
    fn snippet_window_is_clamped_to_page_bounds() {
        let b = bank();
        let text = "USNM 123456 found near the start of the page.";
        let found = snippets(text, &b, 32, true);
        let (_, occurrences) = found.iter().next().expect("one match");
        assert!(!occurrences[0].text.starts_with("..."));
    }

    #[test]
    fn snippet_highlights_matched_substring() {
        let b = bank();
        let text = "a long passage before USNM 123456 and a long passage after it to pad the window";
        let found = snippets(text, &b, 10, true);
        let (_, occurrences) = found.iter().next().expect("one match");
        assert!(occurrences[0].text.contains("**USNM 123456**"));
    }

    #[test]
    fn likely_missed_finds_code_in_residue() {
        let b = bank();
        let text = "USNM 123456 and also USNM near an unparsed fragment";
        let parsed = vec!["USNM 123456".to_string()];
        let hits = likely_missed(text, &b, &parsed);
        assert_eq!(hits.len(), 1);
    }
}
