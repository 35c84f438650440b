//! Provider query strings built from one [`QuerySpec`].
//!
//! Scopus and the ACM DL understand `*` natively, so wildcard terms keep
//! their star there. Zenodo, GitHub and Crossref get the bare prefix and the
//! local matcher re-applies the wildcard afterwards.
use ontoscope_core::{Provider, QuerySpec, Term};

const ACM_FIELDS: &[&str] = &["Title", "Abstract", "Keyword"];
const ZENODO_FIELDS: &[&str] = &["metadata.title", "metadata.description", "metadata.keywords"];

/// Every query string sent to `provider` for this spec, in request order.
pub fn queries_for(provider: Provider, spec: &QuerySpec) -> Vec<String> {
    match provider {
        Provider::Scopus => vec![scopus_query(spec)],
        Provider::Acm => vec![acm_query(spec)],
        Provider::Zenodo => zenodo_queries(spec),
        Provider::Github => github_queries(spec),
        Provider::Crossref => crossref_queries(spec),
        Provider::LodCloud | Provider::Ieee | Provider::Custom => Vec::new(),
    }
}

/// `TITLE-ABS-KEY((c OR ..) AND (s OR ..) AND NOT (e OR ..)) AND PUBYEAR > a AND PUBYEAR < b`
pub fn scopus_query(spec: &QuerySpec) -> String {
    let mut inner = format!(
        "{} AND {}",
        or_group(spec.cloud_terms(), quoted_native),
        or_group(spec.semantic_terms(), quoted_native)
    );
    if !spec.exclude_terms().is_empty() {
        inner.push_str(&format!(" AND NOT {}", or_group(spec.exclude_terms(), quoted_native)));
    }

    let mut query = format!("TITLE-ABS-KEY({inner})");
    if let Some(range) = spec.year_range() {
        if let Some(min) = range.min {
            query.push_str(&format!(" AND PUBYEAR > {}", min.saturating_sub(1)));
        }
        if let Some(max) = range.max {
            query.push_str(&format!(" AND PUBYEAR < {}", max.saturating_add(1)));
        }
    }
    query
}

/// Same group across title, abstract and keywords, e.g.
/// `(Title:("a" OR "b") OR Abstract:("a" OR "b") OR Keyword:("a" OR "b"))`.
pub fn acm_query(spec: &QuerySpec) -> String {
    let mut query = format!(
        "{} AND {}",
        acm_group(spec.cloud_terms()),
        acm_group(spec.semantic_terms())
    );
    if !spec.exclude_terms().is_empty() {
        query.push_str(&format!(" AND !{}", acm_group(spec.exclude_terms())));
    }
    query
}

/// One query per (cloud, semantic) pair, each restricted to title,
/// description and keywords.
pub fn zenodo_queries(spec: &QuerySpec) -> Vec<String> {
    let exclusion = (!spec.exclude_terms().is_empty())
        .then(|| format!(" NOT {}", or_group(spec.exclude_terms(), quoted_bare)));
    let dates = spec.year_range().map(|range| {
        let from = range.min.map(|y| format!("{y}-01-01")).unwrap_or_else(|| "*".to_string());
        let to = range.max.map(|y| format!("{y}-12-31")).unwrap_or_else(|| "*".to_string());
        format!(" AND publication_date:[{from} TO {to}]")
    });

    pairs(spec)
        .map(|(cloud, semantic)| {
            format!(
                "{} AND {}{}{}",
                zenodo_fields(cloud),
                zenodo_fields(semantic),
                exclusion.as_deref().unwrap_or(""),
                dates.as_deref().unwrap_or("")
            )
        })
        .collect()
}

/// One repository search per pair, e.g.
/// `"cloud computing" "ontology" NOT ("iot") in:name,description created:>2014-01-01 created:<2028-01-01`.
pub fn github_queries(spec: &QuerySpec) -> Vec<String> {
    let mut qualifiers = String::new();
    if !spec.exclude_terms().is_empty() {
        qualifiers.push_str(&format!(" NOT {}", or_group(spec.exclude_terms(), quoted_bare)));
    }
    qualifiers.push_str(" in:name,description");
    if let Some(range) = spec.year_range() {
        if let Some(min) = range.min {
            qualifiers.push_str(&format!(" created:>{min}-01-01"));
        }
        if let Some(max) = range.max {
            qualifiers.push_str(&format!(" created:<{}-01-01", max.saturating_add(1)));
        }
    }

    pairs(spec)
        .map(|(cloud, semantic)| {
            format!("{} {}{qualifiers}", quoted_bare(cloud), quoted_bare(semantic))
        })
        .collect()
}

/// Free-text `query.bibliographic` values, one per pair. Years and
/// publisher go into Crossref's `filter` parameter instead.
pub fn crossref_queries(spec: &QuerySpec) -> Vec<String> {
    pairs(spec)
        .map(|(cloud, semantic)| format!("{} {}", cloud.text(), semantic.text()))
        .collect()
}

fn pairs(spec: &QuerySpec) -> impl Iterator<Item = (&Term, &Term)> {
    spec.cloud_terms()
        .iter()
        .flat_map(move |c| spec.semantic_terms().iter().map(move |s| (c, s)))
}

fn or_group(terms: &[Term], render: fn(&Term) -> String) -> String {
    let parts: Vec<String> = terms.iter().map(render).collect();
    format!("({})", parts.join(" OR "))
}

/// `"ontolog*"`: star kept for engines with native wildcards.
fn quoted_native(term: &Term) -> String {
    format!("\"{term}\"")
}

/// `"ontolog"`: star dropped.
fn quoted_bare(term: &Term) -> String {
    format!("\"{}\"", term.text())
}

fn acm_group(terms: &[Term]) -> String {
    let group = or_group(terms, quoted_native);
    let fields: Vec<String> = ACM_FIELDS.iter().map(|f| format!("{f}:{group}")).collect();
    format!("({})", fields.join(" OR "))
}

fn zenodo_fields(term: &Term) -> String {
    let value = quoted_bare(term);
    let fields: Vec<String> = ZENODO_FIELDS.iter().map(|f| format!("{f}:{value}")).collect();
    format!("({})", fields.join(" OR "))
}
