use serde::{Deserialize, Serialize};

use crate::schema::Provider;

/// A provider-native record, exactly as the fetcher received it.
pub type RawRecord = serde_json::Value;

/// The provider-agnostic shape every raw record is normalized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CanonicalRecord {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

impl CanonicalRecord {
    pub fn new(title: impl Into<String>, source: Provider) -> Self {
        Self {
            title: title.into(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// True when no dedup key beyond an empty title could be formed.
    pub fn lacks_identity(&self) -> bool {
        self.title.trim().is_empty()
            && self.doi.as_deref().is_none_or(|d| d.trim().is_empty())
            && self.url.as_deref().is_none_or(|u| u.trim().is_empty())
    }

    /// Lowercased `title abstract keywords`, the only text the matcher looks at.
    pub fn search_text(&self) -> String {
        [
            self.title.as_str(),
            self.abstract_text.as_str(),
            self.keywords.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}
