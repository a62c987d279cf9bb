use serde::{Deserialize, Serialize};

/// A resolved (or attempted) link between a catalog-number mention and a
/// specimen record (`links` table). Unique on `(doc_url, verbatim,
/// spec_num)`. `department` may carry a trailing `*` marking it as
/// contextually, rather than authoritatively, assigned (§9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub doc_url: String,
    pub verbatim: String,
    pub spec_num: String,
    pub ezid: Option<String>,
    pub match_quality: Option<String>,
    pub department: Option<String>,
    pub has_similar_ref: bool,
    pub num_snippets: i64,
    pub notes: Option<String>,
}

impl Link {
    pub fn derive_id(doc_url: &str, verbatim: &str, spec_num: &str) -> String {
        format!("{doc_url}|{verbatim}|{spec_num}")
    }

    pub fn new(doc_url: impl Into<String>, verbatim: impl Into<String>, spec_num: impl Into<String>) -> Self {
        let doc_url = doc_url.into();
        let verbatim = verbatim.into();
        let spec_num = spec_num.into();
        let id = Self::derive_id(&doc_url, &verbatim, &spec_num);
        Self {
            id,
            doc_url,
            verbatim,
            spec_num,
            ezid: None,
            match_quality: None,
            department: None,
            has_similar_ref: false,
            num_snippets: 0,
            notes: None,
        }
    }

    /// §4.6 Phase 1: a link is a candidate for (re)matching when it has
    /// never been matched, or was explicitly recorded as unmatched.
    pub fn needs_matching(&self) -> bool {
        self.ezid.is_none() || matches!(self.match_quality.as_deref(), None | Some("No match"))
    }

    /// §9's exclusionary `guess_department`: a link is eligible for
    /// sibling/topic/range department inference only if its department
    /// wasn't already forced (non-`*`) by an earlier phase.
    pub fn eligible_for_inference(&self) -> bool {
        match &self.department {
            None => true,
            Some(d) => d.ends_with('*'),
        }
    }
}
