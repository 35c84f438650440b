//! DOI and URL normalization used to build comparable dedup keys.

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

/// Normalize a DOI for storage: trimmed, lowercased, resolver prefixes removed.
///
/// Values that do not look like a registered DOI (`10.` prefix) are kept as
/// lowercase text rather than rejected; provider metadata is often sloppy and
/// the value still identifies the record. Returns `None` for empty input.
pub fn normalize_doi(input: &str) -> Option<String> {
    let lowered = input.trim().to_lowercase();

    let mut stripped = lowered.as_str();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = stripped.strip_prefix(prefix) {
            stripped = rest.trim_start();
            break;
        }
    }

    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Normalize a URL for storage: trimmed and lowercased.
pub fn normalize_url(input: &str) -> Option<String> {
    let url = input.trim().to_lowercase();
    if url.is_empty() { None } else { Some(url) }
}

/// Whether a normalized DOI has the `10.<registrant>/<suffix>` shape.
pub fn is_registered_doi(doi: &str) -> bool {
    let Some(rest) = doi.strip_prefix("10.") else {
        return false;
    };
    match rest.find('/') {
        Some(slash) => slash > 0 && slash + 1 < rest.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        assert_eq!(normalize_doi("10.1000/xyz123").as_deref(), Some("10.1000/xyz123"));
    }

    #[test]
    fn doi_with_https_prefix() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1000/XYZ123").as_deref(),
            Some("10.1000/xyz123")
        );
    }

    #[test]
    fn doi_with_space_after_colon() {
        assert_eq!(normalize_doi("  DOI: 10.1000/xyz123 ").as_deref(), Some("10.1000/xyz123"));
    }

    #[test]
    fn doi_with_dx_doi_org() {
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1000/xyz123").as_deref(),
            Some("10.1000/xyz123")
        );
    }

    #[test]
    fn blank_doi_is_absent() {
        assert_eq!(normalize_doi("   "), None);
        assert_eq!(normalize_doi("doi:"), None);
    }

    #[test]
    fn url_is_lowercased_and_trimmed() {
        assert_eq!(
            normalize_url("  https://Zenodo.org/Records/42 \n").as_deref(),
            Some("https://zenodo.org/records/42")
        );
        assert_eq!(normalize_url(""), None);
    }

    #[test]
    fn registered_doi_shape() {
        assert!(is_registered_doi("10.1145/3366423.3380211"));
        assert!(!is_registered_doi("10.1145"));
        assert!(!is_registered_doi("10./abc"));
        assert!(!is_registered_doi("not-a-doi"));
    }
}
