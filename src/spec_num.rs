use lazy_static::lazy_static;
use regex::Regex;

/// A canonical specimen number: `(museum_code, collection_prefix, number,
/// suffix)`. Immutable once parsed (§3). `number` is always >= 1; `prefix`
/// and `suffix` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecNum {
    pub code: String,
    pub prefix: String,
    pub number: u32,
    pub suffix: String,
}

lazy_static! {
    static ref RE_EMBEDDED_SUFFIX: Regex =
        Regex::new(r"^[A-Za-z]-\d+$").expect("static regex");
    static ref RE_CANONICAL: Regex =
        Regex::new(r"^([A-Za-z]{1,3})? ?(\d+)(.*)$").expect("static regex");
}

impl SpecNum {
    pub fn new(code: impl Into<String>, prefix: impl Into<String>, number: u32, suffix: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            prefix: prefix.into(),
            number,
            suffix: suffix.into(),
        }
    }

    /// §4.2 step 7: canonical textual form.
    ///
    /// `CODE ` + optional `PREFIX` + number + optional `-SUFFIX`. A
    /// prefix of length 1 is joined directly to the number (no space); a
    /// longer prefix is space-separated. A one-character alpha suffix, or
    /// a suffix that already embeds its own dash (`A-45`), is joined
    /// directly; any other suffix is hyphen-delimited.
    pub fn stringify(&self) -> String {
        let delim_prefix = if self.prefix.is_empty() {
            ""
        } else if self.prefix.len() == 1 {
            ""
        } else {
            " "
        };
        let glued_suffix = (self.suffix.len() == 1 && self.suffix.chars().all(|c| c.is_alphabetic()))
            || RE_EMBEDDED_SUFFIX.is_match(&self.suffix);
        let delim_suffix = if self.suffix.is_empty() || glued_suffix { "" } else { "-" };
        format!(
            "{} {}{}{}{}{}",
            self.code, self.prefix, delim_prefix, self.number, delim_suffix, self.suffix
        )
        .trim_end_matches('-')
        .trim()
        .to_string()
    }

    /// Inverse of [`stringify`](Self::stringify); used by the round-trip
    /// property of §8. Not a general-purpose mention parser — see
    /// `crate::parser` for that.
    pub fn parse_canonical(s: &str) -> Option<Self> {
        let s = s.trim();
        let (code, rest) = s.split_once(' ')?;
        let caps = RE_CANONICAL.captures(rest)?;
        let prefix = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let number: u32 = caps.get(2)?.as_str().parse().ok()?;
        let remainder = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let suffix = remainder.strip_prefix('-').unwrap_or(remainder).to_string();
        Some(Self {
            code: code.to_string(),
            prefix,
            number,
            suffix,
        })
    }
}

impl std::fmt::Display for SpecNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringify_plain() {
        let n = SpecNum::new("USNM", "", 123456, "");
        assert_eq!(n.stringify(), "USNM 123456");
    }

    #[test]
    fn stringify_single_char_prefix_glued() {
        let n = SpecNum::new("USNM", "V", 123456, "");
        assert_eq!(n.stringify(), "USNM V123456");
    }

    #[test]
    fn stringify_multi_char_prefix_spaced() {
        let n = SpecNum::new("USNM", "PAL", 76012, "");
        assert_eq!(n.stringify(), "USNM PAL 76012");
    }

    #[test]
    fn stringify_single_alpha_suffix_glued() {
        let n = SpecNum::new("USNM", "", 201120, "a");
        assert_eq!(n.stringify(), "USNM 201120a");
    }

    #[test]
    fn stringify_multi_char_suffix_hyphenated() {
        let n = SpecNum::new("USNM", "", 201120, "ab");
        assert_eq!(n.stringify(), "USNM 201120-ab");
    }

    #[test]
    fn stringify_numeric_suffix_hyphenated() {
        let n = SpecNum::new("USNM", "", 201120, "2");
        assert_eq!(n.stringify(), "USNM 201120-2");
    }

    #[test]
    fn round_trip_property_holds() {
        let cases = vec![
            SpecNum::new("USNM", "", 123456, ""),
            SpecNum::new("USNM", "V", 123456, ""),
            SpecNum::new("USNM", "PAL", 76012, ""),
            SpecNum::new("USNM", "", 201120, "a"),
            SpecNum::new("USNM", "", 201120, "ab"),
            SpecNum::new("USNM", "", 201120, "2"),
        ];
        for n in cases {
            let once = n.stringify();
            let reparsed = SpecNum::parse_canonical(&once).expect("reparses");
            assert_eq!(reparsed.stringify(), once);
        }
    }
}
