//! The three-group boolean topic query.
//!
//! ```text
//! any(cloud_terms) AND any(semantic_terms) AND NOT any(exclude_terms)
//! ```
//! A term ending in `*` is a prefix wildcard; every other term is a plain
//! substring. Terms are stored lowercase.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Matches anywhere in the search text.
    Phrase(String),
    /// Matches tokens starting with the prefix (`ontolog*`).
    Prefix(String),
}

impl Term {
    pub fn parse(input: &str) -> Result<Self> {
        let lowered = input.trim().to_lowercase();
        let term = match lowered.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.trim_end().to_string()),
            None => Self::Phrase(lowered),
        };
        if term.text().is_empty() {
            return Err(CoreError::InvalidQuery(format!("empty term: {input:?}")));
        }
        Ok(term)
    }

    /// The term without its wildcard marker.
    pub fn text(&self) -> &str {
        match self {
            Self::Phrase(s) | Self::Prefix(s) => s,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phrase(s) => f.write_str(s),
            Self::Prefix(s) => write!(f, "{s}*"),
        }
    }
}

/// Inclusive publication-year bounds. Either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearRange {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min.is_none_or(|min| year >= min) && self.max.is_none_or(|max| year <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Years every provider date filter can express.
const YEAR_BOUNDS: std::ops::RangeInclusive<i32> = 0..=9999;

/// What the year filter does with a record whose year could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentYearPolicy {
    /// Unknown year is indeterminate and passes.
    #[default]
    Pass,
    /// Unknown year fails a bounded range.
    Reject,
}

/// Validated, immutable query. Build with [`QuerySpec::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    cloud_terms: Vec<Term>,
    semantic_terms: Vec<Term>,
    exclude_terms: Vec<Term>,
    year_range: Option<YearRange>,
    absent_year: AbsentYearPolicy,
}

impl QuerySpec {
    /// Parse and validate the term groups.
    ///
    /// Fails when either include group is empty, when any term is blank or
    /// `*` alone, or when the year range is inverted.
    pub fn new<C, S, E>(cloud: C, semantic: S, exclude: E) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let cloud_terms = parse_group("cloud_terms", cloud)?;
        let semantic_terms = parse_group("semantic_terms", semantic)?;
        let exclude_terms = parse_group("exclude_terms", exclude)?;

        if cloud_terms.is_empty() {
            return Err(CoreError::InvalidQuery("cloud_terms must not be empty".into()));
        }
        if semantic_terms.is_empty() {
            return Err(CoreError::InvalidQuery("semantic_terms must not be empty".into()));
        }

        Ok(Self {
            cloud_terms,
            semantic_terms,
            exclude_terms,
            year_range: None,
            absent_year: AbsentYearPolicy::default(),
        })
    }

    /// Fails on an inverted range or a bound outside `0..=9999`.
    pub fn with_year_range(mut self, range: YearRange) -> Result<Self> {
        for year in [range.min, range.max].into_iter().flatten() {
            if !YEAR_BOUNDS.contains(&year) {
                return Err(CoreError::InvalidQuery(format!(
                    "year {year} is outside {}..={}",
                    YEAR_BOUNDS.start(),
                    YEAR_BOUNDS.end()
                )));
            }
        }
        if let (Some(min), Some(max)) = (range.min, range.max)
            && min > max
        {
            return Err(CoreError::InvalidQuery(format!(
                "year_min {min} is greater than year_max {max}"
            )));
        }
        self.year_range = if range.is_unbounded() { None } else { Some(range) };
        Ok(self)
    }

    pub fn with_absent_year(mut self, policy: AbsentYearPolicy) -> Self {
        self.absent_year = policy;
        self
    }

    pub fn cloud_terms(&self) -> &[Term] {
        &self.cloud_terms
    }

    pub fn semantic_terms(&self) -> &[Term] {
        &self.semantic_terms
    }

    pub fn exclude_terms(&self) -> &[Term] {
        &self.exclude_terms
    }

    pub fn year_range(&self) -> Option<YearRange> {
        self.year_range
    }

    pub fn absent_year(&self) -> AbsentYearPolicy {
        self.absent_year
    }
}

fn parse_group<I>(group: &str, terms: I) -> Result<Vec<Term>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<Term> = Vec::new();
    for raw in terms {
        let term = Term::parse(raw.as_ref()).map_err(|e| match e {
            CoreError::InvalidQuery(msg) => CoreError::InvalidQuery(format!("{group}: {msg}")),
            other => other,
        })?;
        if !out.contains(&term) {
            out.push(term);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_lowercased_and_wildcards_detected() {
        assert_eq!(Term::parse("Ontolog*").unwrap(), Term::Prefix("ontolog".into()));
        assert_eq!(Term::parse(" Semantic Web ").unwrap(), Term::Phrase("semantic web".into()));
        assert_eq!(Term::parse("knowledge graph*").unwrap().to_string(), "knowledge graph*");
        assert!(Term::parse("*").is_err());
        assert!(Term::parse("  ").is_err());
    }

    #[test]
    fn empty_include_group_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            QuerySpec::new(empty, ["ontology"], ["iot"]),
            Err(CoreError::InvalidQuery(_))
        ));
        assert!(matches!(
            QuerySpec::new(["cloud"], empty, ["iot"]),
            Err(CoreError::InvalidQuery(_))
        ));
        assert!(QuerySpec::new(["cloud"], ["ontology"], empty).is_ok());
    }

    #[test]
    fn duplicate_terms_collapse() {
        let spec = QuerySpec::new(["Cloud", "cloud"], ["ontology"], ["iot"]).unwrap();
        assert_eq!(spec.cloud_terms().len(), 1);
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        assert!(
            spec.clone()
                .with_year_range(YearRange::new(Some(2020), Some(2010)))
                .is_err()
        );
        let open = spec.with_year_range(YearRange::default()).unwrap();
        assert_eq!(open.year_range(), None);
    }

    #[test]
    fn out_of_range_years_are_rejected() {
        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        for range in [
            YearRange::new(Some(i32::MIN), None),
            YearRange::new(None, Some(i32::MAX)),
            YearRange::new(Some(2014), Some(10_000)),
        ] {
            assert!(matches!(
                spec.clone().with_year_range(range),
                Err(CoreError::InvalidQuery(_))
            ));
        }
        let edge = spec.with_year_range(YearRange::new(Some(0), Some(9999))).unwrap();
        assert_eq!(edge.year_range(), Some(YearRange::new(Some(0), Some(9999))));
    }

    #[test]
    fn year_range_bounds_are_inclusive() {
        let range = YearRange::new(Some(2015), Some(2020));
        assert!(!range.contains(2014));
        assert!(range.contains(2015));
        assert!(range.contains(2020));
        assert!(!range.contains(2021));
        assert!(YearRange::new(None, Some(2020)).contains(1900));
    }
}
