use std::collections::HashMap;
use std::fmt;

use crate::record::CanonicalRecord;

/// Identity used to decide whether two records are the same work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Doi(String),
    Url(String),
    /// `normalized_title + "::" + normalized_authors`
    TitleAuthors(String),
}

impl DedupKey {
    /// First non-empty of DOI, URL, normalized title+authors.
    pub fn derive(record: &CanonicalRecord) -> Self {
        if let Some(doi) = non_empty(record.doi.as_deref()) {
            return Self::Doi(doi.to_string());
        }
        if let Some(url) = non_empty(record.url.as_deref()) {
            return Self::Url(url.to_string());
        }
        Self::TitleAuthors(format!(
            "{}::{}",
            normalize_text(&record.title),
            normalize_text(&record.authors)
        ))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Doi(s) | Self::Url(s) | Self::TitleAuthors(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Doi(_) => "doi",
            Self::Url(_) => "url",
            Self::TitleAuthors(_) => "title_authors",
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}

/// A record dropped because its key was already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discarded {
    pub record: CanonicalRecord,
    pub key: DedupKey,
    /// Position of the kept record in the unique output.
    pub kept_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    Kept { index: usize },
    Duplicate { kept_index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    pub unique: Vec<CanonicalRecord>,
    pub discarded: Vec<Discarded>,
}

/// First-occurrence-wins index over derived keys. One per pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    index: HashMap<DedupKey, usize>,
    unique: Vec<CanonicalRecord>,
    discarded: Vec<Discarded>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: CanonicalRecord) -> Insertion {
        let key = DedupKey::derive(&record);
        if let Some(&kept_index) = self.index.get(&key) {
            self.discarded.push(Discarded {
                record,
                key,
                kept_index,
            });
            return Insertion::Duplicate { kept_index };
        }

        let index = self.unique.len();
        self.index.insert(key, index);
        self.unique.push(record);
        Insertion::Kept { index }
    }

    pub fn len(&self) -> usize {
        self.unique.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.discarded.len()
    }

    pub fn finish(self) -> DedupOutcome {
        DedupOutcome {
            unique: self.unique,
            discarded: self.discarded,
        }
    }
}

/// Collapse records sharing a key, keeping the first of each.
pub fn dedupe(records: Vec<CanonicalRecord>) -> DedupOutcome {
    let mut dedup = Deduplicator::new();
    for record in records {
        dedup.insert(record);
    }
    dedup.finish()
}

/// Lowercase, punctuation removed, whitespace collapsed.
///
/// Word characters are letters, digits and `_`; everything else except
/// whitespace is deleted, so `multi-cloud` and `multicloud` agree.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
