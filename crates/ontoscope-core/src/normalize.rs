//! Raw provider record → [`CanonicalRecord`].
//!
//! Missing or malformed fields are absences, never errors. The only outcome
//! besides a record is [`Normalized::Dropped`], for input that can never be
//! deduplicated.
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::identifiers::{normalize_doi, normalize_url};
use crate::record::{CanonicalRecord, RawRecord};
use crate::schema::{FieldSpec, PathSegment, ProviderSchema, parse_path};

/// Language picked out of language-tagged maps such as `{"en": "...", "it": "..."}`.
pub const DEFAULT_LANGUAGE: &str = "en";

const PERSON_KEYS: &[&str] = &["name", "display_name", "authname", "login"];

static SCRIPT_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("valid regex")
});
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9:_-]*(?:\s[^<>]*)?/?>").expect("valid regex"));
static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Record(CanonicalRecord),
    Dropped(DropReason),
}

impl Normalized {
    pub fn into_record(self) -> Option<CanonicalRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Dropped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// The raw value was not a JSON object.
    NotAnObject,
    /// Title, DOI and URL were all empty.
    NoIdentity,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::NoIdentity => "no_identity",
        }
    }
}

pub fn normalize(raw: RawRecord, schema: &ProviderSchema) -> Normalized {
    if !raw.is_object() {
        return Normalized::Dropped(DropReason::NotAnObject);
    }

    let doi = text_field(&raw, &schema.doi).as_deref().and_then(normalize_doi);
    let url = text_field(&raw, &schema.url)
        .or_else(|| templated_url(&raw, schema))
        .as_deref()
        .and_then(normalize_url);

    let record = CanonicalRecord {
        title: text_field(&raw, &schema.title).unwrap_or_default(),
        authors: text_field(&raw, &schema.authors).unwrap_or_default(),
        abstract_text: text_field(&raw, &schema.abstract_text).unwrap_or_default(),
        keywords: text_field(&raw, &schema.keywords).unwrap_or_default(),
        year: year_field(&raw, &schema.year),
        doi,
        url,
        source: schema.provider.to_string(),
        publisher: text_field(&raw, &schema.publisher),
    };

    if record.lacks_identity() {
        return Normalized::Dropped(DropReason::NoIdentity);
    }
    Normalized::Record(record)
}

/// Resolve a path against a value. `[]` segments fan out over arrays.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments = parse_path(path);
    let mut out = Vec::new();
    resolve_segments(value, &segments, &mut out);
    out
}

fn resolve_segments<'a>(value: &'a Value, segments: &[PathSegment<'_>], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match head {
        PathSegment::Key(key) => {
            if let Some(child) = value.get(*key) {
                resolve_segments(child, rest, out);
            }
        }
        PathSegment::Index(index) => match value {
            Value::Array(items) => {
                if let Some(child) = items.get(*index) {
                    resolve_segments(child, rest, out);
                }
            }
            // Numeric keys on objects still work as plain keys.
            Value::Object(map) => {
                if let Some(child) = map.get(&index.to_string()) {
                    resolve_segments(child, rest, out);
                }
            }
            _ => {}
        },
        PathSegment::Each(key) => match value.get(*key) {
            Some(Value::Array(items)) => {
                for item in items {
                    resolve_segments(item, rest, out);
                }
            }
            Some(single) => resolve_segments(single, rest, out),
            None => {}
        },
    }
}

/// Text at the first of the field's paths that yields any.
fn text_field(raw: &Value, spec: &FieldSpec) -> Option<String> {
    spec.paths().find_map(|path| {
        let parts: Vec<String> = resolve(raw, path)
            .into_iter()
            .map(|v| flatten_text(v, DEFAULT_LANGUAGE))
            .filter(|s| !s.is_empty())
            .collect();
        let joined = clean_text(&parts.join(", "));
        if joined.is_empty() { None } else { Some(joined) }
    })
}

fn year_field(raw: &Value, spec: &FieldSpec) -> Option<i32> {
    spec.paths()
        .find_map(|path| resolve(raw, path).into_iter().find_map(extract_year))
}

fn templated_url(raw: &Value, schema: &ProviderSchema) -> Option<String> {
    let template = schema.url_template.as_deref()?;
    let id = text_field(raw, &schema.id)?;
    Some(template.replace("{id}", &id))
}

/// Flatten any JSON value into one display string.
///
/// Arrays join with `", "`, person objects render their name, other objects
/// are treated as language-tagged maps and yield the `lang` entry or nothing.
pub fn flatten_text(value: &Value, lang: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| flatten_text(item, lang))
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => person_name(map).unwrap_or_else(|| {
            map.get(lang)
                .map(|v| flatten_text(v, lang))
                .unwrap_or_default()
        }),
    }
}

fn person_name(map: &Map<String, Value>) -> Option<String> {
    for key in PERSON_KEYS {
        if let Some(name) = map.get(*key).and_then(Value::as_str)
            && !name.trim().is_empty()
        {
            return Some(name.to_string());
        }
    }

    let given = map.get("given").and_then(Value::as_str).map(str::trim);
    let family = map.get("family").and_then(Value::as_str).map(str::trim);
    match (given, family) {
        (Some(g), Some(f)) if !g.is_empty() && !f.is_empty() => Some(format!("{g} {f}")),
        (_, Some(f)) if !f.is_empty() => Some(f.to_string()),
        (Some(g), _) if !g.is_empty() => Some(g.to_string()),
        _ => None,
    }
}

/// Drop `<script>`/`<style>` bodies and markup tags, decode every HTML
/// entity (named and numeric), turn control characters into spaces and
/// collapse whitespace.
pub fn clean_text(input: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(input, " ");
    let stripped = TAG_RE.replace_all(&without_code, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Year from a bare number, a date string, a date-parts array or an object
/// carrying `date-parts`. Anything else yields `None`.
pub fn extract_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|y| (1000..=9999).contains(y))
            .and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => parse_year_str(s),
        Value::Array(items) => items.first().and_then(extract_year),
        Value::Object(map) => map.get("date-parts").and_then(extract_year),
        _ => None,
    }
}

pub fn parse_year_str(input: &str) -> Option<i32> {
    let s = input.trim();
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }
    if let Some(caps) = YEAR_MONTH_RE.captures(s) {
        return caps[1].parse().ok();
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.year());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.year());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Provider;
    use serde_json::json;

    fn schema(provider: Provider) -> ProviderSchema {
        ProviderSchema::for_provider(provider)
    }

    #[test]
    fn zenodo_record_is_flattened() {
        let raw = json!({
            "id": 123,
            "doi": " 10.5281/ZENODO.123 ",
            "created": "2021-03-04T10:00:00.123456+00:00",
            "links": {"html": "https://Zenodo.org/records/123"},
            "metadata": {
                "title": "Cloud <b>Ontology</b>  Survey",
                "creators": [{"name": "Rossi, Maria"}, {"name": "Bianchi, Luca"}],
                "description": "<p>Semantic web &amp; cloud computing</p>",
                "keywords": ["ontology", "cloud computing"],
                "publication_date": "2020-11-02"
            }
        });

        let record = normalize(raw, &schema(Provider::Zenodo)).into_record().unwrap();
        assert_eq!(record.title, "Cloud Ontology Survey");
        assert_eq!(record.authors, "Rossi, Maria, Bianchi, Luca");
        assert_eq!(record.abstract_text, "Semantic web & cloud computing");
        assert_eq!(record.keywords, "ontology, cloud computing");
        assert_eq!(record.year, Some(2020));
        assert_eq!(record.doi.as_deref(), Some("10.5281/zenodo.123"));
        assert_eq!(record.url.as_deref(), Some("https://zenodo.org/records/123"));
        assert_eq!(record.source, "zenodo");
    }

    #[test]
    fn crossref_authors_and_date_parts() {
        let raw = json!({
            "DOI": "10.1145/3366423.3380211",
            "title": ["Knowledge Graphs in the Cloud"],
            "author": [
                {"given": "Ada", "family": "Lovelace"},
                {"family": "Turing"},
                {"name": "W3C Working Group"}
            ],
            "issued": {"date-parts": [[2019, 5, 13]]},
            "container-title": ["Proceedings of The Web Conference"],
            "URL": "http://dx.doi.org/10.1145/3366423.3380211"
        });

        let record = normalize(raw, &schema(Provider::Crossref)).into_record().unwrap();
        assert_eq!(record.authors, "Ada Lovelace, Turing, W3C Working Group");
        assert_eq!(record.year, Some(2019));
        assert_eq!(record.publisher.as_deref(), Some("Proceedings of The Web Conference"));
    }

    #[test]
    fn language_tagged_values_pick_english() {
        let raw = json!({
            "id": "dbpedia",
            "title": {"en": "DBpedia", "it": "DBpedia IT"},
            "description": {"it": "solo italiano"},
            "keywords": ["linked data", {"en": "cloud"}, {"de": "wolke"}],
            "issued": "2016"
        });

        let record = normalize(raw, &schema(Provider::LodCloud)).into_record().unwrap();
        assert_eq!(record.title, "DBpedia");
        assert_eq!(record.abstract_text, "");
        assert_eq!(record.keywords, "linked data, cloud");
        assert_eq!(record.url.as_deref(), Some("https://lod-cloud.net/dataset/dbpedia"));
        assert_eq!(record.year, Some(2016));
    }

    #[test]
    fn scopus_link_and_cover_date() {
        let raw = json!({
            "dc:title": "Multi-cloud ontology",
            "dc:creator": "Smith J.",
            "prism:coverDate": "2018-07-01",
            "prism:doi": "10.1016/J.FUTURE.2018.01.001",
            "link": [{"@ref": "self", "@href": "https://api.elsevier.com/content/abstract/scopus_id/1"}]
        });

        let record = normalize(raw, &schema(Provider::Scopus)).into_record().unwrap();
        assert_eq!(record.authors, "Smith J.");
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.doi.as_deref(), Some("10.1016/j.future.2018.01.001"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://api.elsevier.com/content/abstract/scopus_id/1")
        );
    }

    #[test]
    fn keyless_record_is_dropped() {
        let raw = json!({"description": "cloud computing ontology", "year": 2020});
        assert_eq!(
            normalize(raw, &schema(Provider::Acm)),
            Normalized::Dropped(DropReason::NoIdentity)
        );
        assert_eq!(
            normalize(json!(["not", "an", "object"]), &schema(Provider::Acm)),
            Normalized::Dropped(DropReason::NotAnObject)
        );
    }

    #[test]
    fn malformed_fields_become_absent() {
        let raw = json!({
            "title": "Cloud",
            "year": "sometime in 2019",
            "doi": null,
            "authors": {"unexpected": true}
        });
        let record = normalize(raw, &schema(Provider::Acm)).into_record().unwrap();
        assert_eq!(record.year, None);
        assert_eq!(record.doi, None);
        assert_eq!(record.authors, "");
    }

    #[test]
    fn year_formats() {
        assert_eq!(extract_year(&json!(2015)), Some(2015));
        assert_eq!(extract_year(&json!(15)), None);
        assert_eq!(extract_year(&json!("2015")), Some(2015));
        assert_eq!(extract_year(&json!("2015-06")), Some(2015));
        assert_eq!(extract_year(&json!("2015-06-30")), Some(2015));
        assert_eq!(extract_year(&json!("2015-06-30T12:01:02")), Some(2015));
        assert_eq!(extract_year(&json!("2015-06-30T12:01:02.123")), Some(2015));
        assert_eq!(extract_year(&json!("2015-06-30T12:01:02Z")), Some(2015));
        assert_eq!(extract_year(&json!([[2015, 6, 30]])), Some(2015));
        assert_eq!(extract_year(&json!([2015, 6])), Some(2015));
        assert_eq!(extract_year(&json!({"date-parts": [[2015]]})), Some(2015));
        assert_eq!(extract_year(&json!("2015-13-40")), None);
        assert_eq!(extract_year(&json!("June 2015")), None);
        assert_eq!(extract_year(&json!(null)), None);
    }

    #[test]
    fn clean_text_keeps_comparisons() {
        assert_eq!(clean_text("a < b and c > d"), "a < b and c > d");
        assert_eq!(clean_text("<jats:p>Linked\n data</jats:p>"), "Linked data");
    }

    #[test]
    fn clean_text_decodes_every_entity() {
        assert_eq!(clean_text("Don&#8217;t&#160;stop&nbsp;&amp; go"), "Don\u{2019}t stop & go");
        assert_eq!(clean_text("caf&eacute; &#x41;PI &lt;tag&gt;"), "caf\u{e9} API <tag>");
    }

    #[test]
    fn clean_text_drops_scripts_styles_and_control_characters() {
        let html = "<style>p { color: red }</style><p>Cloud</p>\
                    <SCRIPT type=\"x\">alert(1)</SCRIPT> ontology\u{7}graph";
        assert_eq!(clean_text(html), "Cloud ontology graph");
    }
}
