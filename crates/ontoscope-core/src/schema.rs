//! Per-provider field-mapping tables.
//!
//! Every provider hands back a differently shaped JSON object. Instead of one
//! normalizer per provider, a [`ProviderSchema`] lists where each canonical
//! field lives, and the generic normalizer walks those paths.
//!
//! Path syntax:
//! ```text
//! metadata.title          → nested object keys, dot separated
//! link.0.@href            → numeric segment indexes into an array
//! metadata.creators[].name → `[]` maps the rest of the path over each element
//! ```
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Crossref,
    Acm,
    Scopus,
    Zenodo,
    Github,
    LodCloud,
    Ieee,
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 8] = [
        Provider::Crossref,
        Provider::Acm,
        Provider::Scopus,
        Provider::Zenodo,
        Provider::Github,
        Provider::LodCloud,
        Provider::Ieee,
        Provider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crossref => "crossref",
            Self::Acm => "acm",
            Self::Scopus => "scopus",
            Self::Zenodo => "zenodo",
            Self::Github => "github",
            Self::LodCloud => "lod-cloud",
            Self::Ieee => "ieee",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crossref" => Ok(Self::Crossref),
            "acm" => Ok(Self::Acm),
            "scopus" => Ok(Self::Scopus),
            "zenodo" => Ok(Self::Zenodo),
            "github" => Ok(Self::Github),
            "lod-cloud" | "lodcloud" | "lod_cloud" | "lod" => Ok(Self::LodCloud),
            "ieee" => Ok(Self::Ieee),
            "custom" => Ok(Self::Custom),
            other => Err(CoreError::UnknownProvider(other.to_string())),
        }
    }
}

/// Ordered fallback paths for one canonical field. First non-empty wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpec(pub Vec<String>);

impl FieldSpec {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One segment of a parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
    /// Map the remaining path over every element of an array.
    Each(&'a str),
}

/// Split a path string into segments. Empty segments are skipped.
pub fn parse_path(path: &str) -> Vec<PathSegment<'_>> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(key) = segment.strip_suffix("[]") {
                PathSegment::Each(key)
            } else if let Ok(index) = segment.parse::<usize>() {
                PathSegment::Index(index)
            } else {
                PathSegment::Key(segment)
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSchema {
    pub provider: Provider,
    pub title: FieldSpec,
    pub authors: FieldSpec,
    pub abstract_text: FieldSpec,
    pub keywords: FieldSpec,
    pub year: FieldSpec,
    pub doi: FieldSpec,
    pub url: FieldSpec,
    pub publisher: FieldSpec,
    /// Field holding the provider's own record id, used by `url_template`.
    pub id: FieldSpec,
    /// Landing-page template with an `{id}` placeholder, used when `url` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_template: Option<String>,
}

impl Default for ProviderSchema {
    fn default() -> Self {
        Self::flat(Provider::Custom)
    }
}

impl ProviderSchema {
    /// Built-in mapping table for a provider.
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Crossref => Self {
                provider,
                title: FieldSpec::new(["title"]),
                authors: FieldSpec::new(["author[]"]),
                abstract_text: FieldSpec::new(["abstract"]),
                keywords: FieldSpec::new(["subject"]),
                year: FieldSpec::new(["published-print", "published-online", "issued", "created"]),
                doi: FieldSpec::new(["DOI"]),
                url: FieldSpec::new(["URL", "resource.primary.URL"]),
                publisher: FieldSpec::new(["container-title", "publisher"]),
                id: FieldSpec::none(),
                url_template: None,
            },
            Provider::Scopus => Self {
                provider,
                title: FieldSpec::new(["dc:title"]),
                authors: FieldSpec::new(["author[].authname", "dc:creator"]),
                abstract_text: FieldSpec::new(["dc:description"]),
                keywords: FieldSpec::new(["authkeywords"]),
                year: FieldSpec::new(["prism:coverDate", "prism:coverDisplayDate"]),
                doi: FieldSpec::new(["prism:doi"]),
                url: FieldSpec::new(["link.0.@href", "prism:url"]),
                publisher: FieldSpec::new(["prism:publicationName", "prism:publisher"]),
                id: FieldSpec::new(["eid"]),
                url_template: None,
            },
            Provider::Zenodo => Self {
                provider,
                title: FieldSpec::new(["metadata.title", "title"]),
                authors: FieldSpec::new(["metadata.creators[].name"]),
                abstract_text: FieldSpec::new(["metadata.description"]),
                keywords: FieldSpec::new(["metadata.keywords"]),
                year: FieldSpec::new(["metadata.publication_date", "created"]),
                doi: FieldSpec::new(["doi", "metadata.doi"]),
                url: FieldSpec::new(["links.html", "links.self_html"]),
                publisher: FieldSpec::new([
                    "metadata.journal.title",
                    "metadata.imprint.publisher",
                    "metadata.publisher",
                ]),
                id: FieldSpec::new(["id", "recid"]),
                url_template: Some("https://zenodo.org/records/{id}".to_string()),
            },
            Provider::Github => Self {
                provider,
                title: FieldSpec::new(["name", "full_name"]),
                authors: FieldSpec::new(["owner.login"]),
                abstract_text: FieldSpec::new(["description"]),
                keywords: FieldSpec::new(["topics"]),
                year: FieldSpec::new(["created_at"]),
                doi: FieldSpec::none(),
                url: FieldSpec::new(["html_url"]),
                publisher: FieldSpec::none(),
                id: FieldSpec::new(["full_name"]),
                url_template: Some("https://github.com/{id}".to_string()),
            },
            Provider::LodCloud => Self {
                provider,
                title: FieldSpec::new(["title"]),
                authors: FieldSpec::new(["contact_point"]),
                abstract_text: FieldSpec::new(["description"]),
                keywords: FieldSpec::new(["keywords", "tags"]),
                year: FieldSpec::new(["issued"]),
                doi: FieldSpec::new(["doi"]),
                url: FieldSpec::none(),
                publisher: FieldSpec::none(),
                id: FieldSpec::new(["id", "identifier", "_id"]),
                url_template: Some("https://lod-cloud.net/dataset/{id}".to_string()),
            },
            Provider::Ieee => Self {
                publisher: FieldSpec::new(["journal", "publisher"]),
                ..Self::flat(provider)
            },
            Provider::Acm | Provider::Custom => Self::flat(provider),
        }
    }

    /// Schema for records that already use canonical field names, as the
    /// HTML scrapers and hand-curated JSON inputs do.
    pub fn flat(provider: Provider) -> Self {
        Self {
            provider,
            title: FieldSpec::new(["title"]),
            authors: FieldSpec::new(["authors", "author"]),
            abstract_text: FieldSpec::new(["abstract", "description"]),
            keywords: FieldSpec::new(["keywords", "tags"]),
            year: FieldSpec::new(["year", "date", "created"]),
            doi: FieldSpec::new(["doi"]),
            url: FieldSpec::new(["url"]),
            publisher: FieldSpec::new(["publisher", "journal", "source"]),
            id: FieldSpec::new(["id"]),
            url_template: None,
        }
    }
}
