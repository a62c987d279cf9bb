use crate::config::RegexPatterns;
use crate::error::CoreError;
use regex::Regex;

/// Compiled form of the Regex Bank (§4.1). Compiled once at startup from the
/// configuration document; a missing or malformed pattern is a fatal
/// configuration error (§7), not a runtime one.
#[derive(Debug)]
pub struct RegexBank {
    pub code: Regex,
    pub mask: Regex,
    pub simple: Regex,
    pub discrete_mask: Regex,
    pub range_mask: Regex,
    pub filler: Regex,
    pub join_range: Regex,
    pub join_discrete: Regex,
    pub suffix2: Regex,
    pub catnum: String,
}

impl RegexBank {
    pub fn compile(patterns: &RegexPatterns) -> Result<Self, CoreError> {
        let catnum = patterns.catnum.replace("{prefix}", &patterns.prefix).replace(
            "{number}",
            &patterns.number,
        ).replace("{suffix}", &patterns.suffix);
        let compile = |name: &str, src: &str| -> Result<Regex, CoreError> {
            Regex::new(src).map_err(|e| {
                CoreError::Configuration(format!("regex bank pattern {name:?} is invalid: {e}"))
            })
        };
        let discrete_mask = patterns
            .discrete_mask
            .replace("{catnum}", &catnum)
            .replace("{join_discrete}", &patterns.join_discrete);
        let range_mask = patterns
            .range_mask
            .replace("{catnum}", &catnum)
            .replace("{join_range}", &patterns.join_range);
        let mask = patterns
            .mask
            .replace("{code}", &patterns.code)
            .replace("{catnum}", &catnum);
        Ok(Self {
            code: compile("code", &patterns.code)?,
            mask: compile("mask", &mask)?,
            simple: compile("simple", &patterns.simple)?,
            discrete_mask: compile("discrete_mask", &discrete_mask)?,
            range_mask: compile("range_mask", &range_mask)?,
            filler: compile("filler", &patterns.filler)?,
            join_range: compile("join_range", &patterns.join_range)?,
            join_discrete: compile("join_discrete", &patterns.join_discrete)?,
            suffix2: compile("suffix2", &patterns.suffix2)?,
            catnum,
        })
    }
}
