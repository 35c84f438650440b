use async_trait::async_trait;
use ontoscope_core::config::{HttpConfig, ScopusConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::http::RateLimitedClient;
use crate::query::scopus_query;
use crate::sources::RecordSource;

const SEARCH_PATH: &str = "/content/search/scopus";
const API_KEY_HEADER: &str = "x-els-apikey";

/// Elsevier Scopus Search API, `start`/`count` paged.
pub struct ScopusSource {
    client: RateLimitedClient,
    config: ScopusConfig,
    headers: HeaderMap,
}

impl ScopusSource {
    pub fn new(config: ScopusConfig, api_key: String, http: &HttpConfig) -> Result<Self> {
        let client = RateLimitedClient::from_config(http, config.page_delay_ms)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&api_key)
            .map_err(|_| SourceError::MissingCredential(config.api_key_env.clone()))?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

        Ok(Self {
            client,
            config,
            headers,
        })
    }

    fn search_url(&self, query: &str, start: u32) -> String {
        format!(
            "{}{SEARCH_PATH}?query={}&start={start}&count={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.count
        )
    }
}

#[async_trait]
impl RecordSource for ScopusSource {
    fn provider(&self) -> Provider {
        Provider::Scopus
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        let query = scopus_query(spec);
        let mut records = Vec::new();
        let mut start = 0u32;

        while start < self.config.max_results {
            let url = self.search_url(&query, start);
            let body: Value = match self
                .client
                .get_json_with_headers(&url, self.headers.clone())
                .await
            {
                Ok(body) => body,
                Err(e) if start > 0 => {
                    warn!(start, error = %e, "scopus page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };

            let results = &body["search-results"];
            let total = total_results(results);
            let entries = entries(results);
            let count = entries.len() as u32;
            debug!(start, count, total, "scopus page");

            if count == 0 {
                break;
            }
            records.extend(entries);
            start += count;
            if u64::from(start) >= total {
                break;
            }
        }
        Ok(records)
    }
}

/// `opensearch:totalResults` arrives as a string.
fn total_results(results: &Value) -> u64 {
    match &results["opensearch:totalResults"] {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// Empty result sets come back as a single `{"error": ...}` entry.
fn entries(results: &Value) -> Vec<Value> {
    results["entry"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|e| e.get("error").is_none())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn source(base_url: String, count: u32) -> ScopusSource {
        let config = ScopusConfig {
            base_url,
            count,
            page_delay_ms: 0,
            ..Default::default()
        };
        let http = HttpConfig {
            min_interval_ms: 0,
            ..Default::default()
        };
        ScopusSource::new(config, "secret-key".to_string(), &http).unwrap()
    }

    fn page(total: &str, entries: Value) -> String {
        json!({"search-results": {"opensearch:totalResults": total, "entry": entries}}).to_string()
    }

    #[tokio::test]
    async fn pages_until_total_results() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
            .match_header("x-els-apikey", "secret-key")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(page("3", json!([{"dc:title": "A"}, {"dc:title": "B"}])))
            .create_async()
            .await;
        let second = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded("start".into(), "2".into()))
            .with_status(200)
            .with_body(page("3", json!([{"dc:title": "C"}])))
            .create_async()
            .await;

        let spec = QuerySpec::new(["cloud"], ["ontolog*"], ["iot"]).unwrap();
        let records = source(server.url(), 2).fetch(&spec).await.unwrap();
        let titles: Vec<&str> = records.iter().filter_map(|r| r["dc:title"].as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn empty_result_set_yields_nothing() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(page("0", json!([{"@_fa": "true", "error": "Result set was empty"}])))
            .create_async()
            .await;

        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        let records = source(server.url(), 25).fetch(&spec).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn invalid_key_is_an_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"service-error": {"status": {"statusText": "Invalid API Key"}}}"#)
            .create_async()
            .await;

        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        let err = source(server.url(), 25).fetch(&spec).await.unwrap_err();
        assert!(matches!(err, SourceError::Api(_, ref msg) if msg.contains("Invalid API Key")));
    }
}
