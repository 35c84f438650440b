use std::collections::HashMap;

use crate::identifiers::is_registered_doi;
use crate::record::CanonicalRecord;

/// Render all records as `@misc` entries with unique cite keys.
pub fn generate_bibliography(records: &[CanonicalRecord]) -> String {
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut out = String::new();

    for (i, record) in records.iter().enumerate() {
        let base = generate_cite_key(record)
            .unwrap_or_else(|| format!("{}{}", record.source.replace('-', ""), i + 1));
        let count = used.entry(base.clone()).or_default();
        let key = if *count == 0 {
            base
        } else {
            format!("{base}{}", suffix(*count))
        };
        *count += 1;

        out.push_str(&generate_bibtex(record, &key));
        out.push('\n');
    }
    out
}

pub fn generate_bibtex(record: &CanonicalRecord, cite_key: &str) -> String {
    let mut bib = format!("@misc{{{cite_key},\n");

    bib.push_str(&format!("  title = {{{}}},\n", escape_bibtex(&record.title)));

    if !record.authors.is_empty() {
        let authors = escape_bibtex(&bibtex_authors(&record.authors));
        bib.push_str(&format!("  author = {{{authors}}},\n"));
    }

    if let Some(year) = record.year {
        bib.push_str(&format!("  year = {{{year}}},\n"));
    }

    if let Some(url) = &record.url {
        bib.push_str(&format!("  url = {{{url}}},\n"));
    }

    if let Some(doi) = record.doi.as_deref().filter(|d| is_registered_doi(d)) {
        bib.push_str(&format!("  doi = {{{}}},\n", escape_bibtex(doi)));
    }

    if let Some(publisher) = &record.publisher {
        bib.push_str(&format!("  publisher = {{{}}},\n", escape_bibtex(publisher)));
    }

    if !record.keywords.is_empty() {
        bib.push_str(&format!("  keywords = {{{}}},\n", escape_bibtex(&record.keywords)));
    }

    if !record.abstract_text.is_empty() {
        bib.push_str(&format!("  abstract = {{{}}},\n", escape_bibtex(&record.abstract_text)));
    }

    bib.push_str(&format!("  note = {{Retrieved from {}}},\n", escape_bibtex(&record.source)));
    bib.push_str("}\n");
    bib
}

/// `<firstauthor><year><firstword>`, or `None` when neither author nor title
/// contributes a word.
fn generate_cite_key(record: &CanonicalRecord) -> Option<String> {
    let author = record
        .authors
        .split(',')
        .next()
        .and_then(|first| first.split_whitespace().last())
        .map(alphanumeric_lowercase)
        .unwrap_or_default();

    let year = record.year.map(|y| y.to_string()).unwrap_or_default();

    let title_word = record
        .title
        .split_whitespace()
        .map(alphanumeric_lowercase)
        .find(|w| !w.is_empty())
        .unwrap_or_default();

    if author.is_empty() && title_word.is_empty() {
        return None;
    }
    Some(format!("{author}{year}{title_word}"))
}

/// Authors are stored comma-joined; BibTeX separates names with `and`.
///
/// `"Rossi, Maria"` is ambiguous once joined, so the string is only split
/// when every comma part is itself a full name.
fn bibtex_authors(authors: &str) -> String {
    let parts: Vec<&str> = authors
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let every_part_is_full_name = parts.iter().all(|p| p.contains(' '));
    if parts.len() > 1 && every_part_is_full_name {
        parts.join(" and ")
    } else {
        authors.to_string()
    }
}

fn alphanumeric_lowercase(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

fn suffix(n: usize) -> String {
    let mut n = n;
    let mut out = Vec::new();
    loop {
        out.push((b'a' + ((n - 1) % 26) as u8) as char);
        n = (n - 1) / 26;
        if n == 0 {
            break;
        }
    }
    out.iter().rev().collect()
}

fn escape_bibtex(s: &str) -> String {
    s.replace('\\', "\\textbackslash ")
        .replace('&', "\\&")
        .replace('_', "\\_")
        .replace('$', "\\$")
        .replace('%', "\\%")
        .replace('#', "\\#")
        .replace('{', "\\{")
        .replace('}', "\\}")
}
