//! Boolean query evaluation over a record's title, abstract and keywords.
use std::fmt;

use serde::Serialize;

use crate::query::{AbsentYearPolicy, QuerySpec, Term};
use crate::record::CanonicalRecord;

/// Outcome of evaluating one record, with the first failing clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    MissingCloudTerm,
    MissingSemanticTerm,
    Excluded { term: String },
    YearOutOfRange { year: i32 },
    YearMissing,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted => None,
            Self::MissingCloudTerm => Some(RejectReason::MissingCloudTerm),
            Self::MissingSemanticTerm => Some(RejectReason::MissingSemanticTerm),
            Self::Excluded { .. } => Some(RejectReason::Excluded),
            Self::YearOutOfRange { .. } => Some(RejectReason::YearOutOfRange),
            Self::YearMissing => Some(RejectReason::YearMissing),
        }
    }
}

/// Verdict without its payload, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingCloudTerm,
    MissingSemanticTerm,
    Excluded,
    YearOutOfRange,
    YearMissing,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCloudTerm => "missing_cloud_term",
            Self::MissingSemanticTerm => "missing_semantic_term",
            Self::Excluded => "excluded",
            Self::YearOutOfRange => "year_out_of_range",
            Self::YearMissing => "year_missing",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn matches(record: &CanonicalRecord, spec: &QuerySpec) -> bool {
    evaluate(record, spec).is_accepted()
}

pub fn evaluate(record: &CanonicalRecord, spec: &QuerySpec) -> Verdict {
    let text = record.search_text();
    let tokens = tokenize(&text);

    if !spec.cloud_terms().iter().any(|t| term_matches(t, &text, &tokens)) {
        return Verdict::MissingCloudTerm;
    }
    if !spec.semantic_terms().iter().any(|t| term_matches(t, &text, &tokens)) {
        return Verdict::MissingSemanticTerm;
    }
    if let Some(term) = spec
        .exclude_terms()
        .iter()
        .find(|t| term_matches(t, &text, &tokens))
    {
        return Verdict::Excluded {
            term: term.to_string(),
        };
    }

    if let Some(range) = spec.year_range() {
        match record.year {
            Some(year) if !range.contains(year) => return Verdict::YearOutOfRange { year },
            None if spec.absent_year() == AbsentYearPolicy::Reject => return Verdict::YearMissing,
            _ => {}
        }
    }

    Verdict::Accepted
}

/// Split on anything that is not alphanumeric or `_`.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// `text` must already be lowercase and `tokens` must come from it.
pub fn term_matches(term: &Term, text: &str, tokens: &[&str]) -> bool {
    match term {
        Term::Phrase(phrase) => text.contains(phrase.as_str()),
        Term::Prefix(prefix) => {
            let words = tokenize(prefix);
            match words.split_last() {
                None => text.contains(prefix.as_str()),
                Some((last, [])) => tokens.iter().any(|t| t.starts_with(last)),
                Some((last, leading)) => tokens.windows(words.len()).any(|window| {
                    window[..leading.len()] == *leading && window[leading.len()].starts_with(last)
                }),
            }
        }
    }
}
