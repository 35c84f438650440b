use async_trait::async_trait;
use ontoscope_core::config::{CrossrefConfig, HttpConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::query::crossref_queries;
use crate::sources::{RecordSource, fetch_each};

/// Crossref `/works` search, offset paged.
pub struct CrossrefSource {
    client: RateLimitedClient,
    config: CrossrefConfig,
}

impl CrossrefSource {
    pub fn new(config: CrossrefConfig, http: &HttpConfig) -> Result<Self> {
        let mut http = http.clone();
        if let Some(email) = &config.mailto {
            http.user_agent = format!("{} (mailto:{email})", http.user_agent);
        }
        let client = RateLimitedClient::from_config(&http, config.page_delay_ms)?;
        Ok(Self { client, config })
    }

    fn works_url(&self, query: &str, spec: &QuerySpec, offset: u32) -> String {
        let mut url = format!(
            "{}/works?query.bibliographic={}&rows={}&offset={offset}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.rows
        );

        let filter = self.filter(spec);
        if !filter.is_empty() {
            url.push_str(&format!("&filter={}", urlencoding::encode(&filter)));
        }
        if let Some(email) = &self.config.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
        }
        url
    }

    /// `from-pub-date:2014,until-pub-date:2027,member:320`
    fn filter(&self, spec: &QuerySpec) -> String {
        let mut parts = Vec::new();
        if let Some(range) = spec.year_range() {
            if let Some(min) = range.min {
                parts.push(format!("from-pub-date:{min}"));
            }
            if let Some(max) = range.max {
                parts.push(format!("until-pub-date:{max}"));
            }
        }
        if let Some(member) = &self.config.member {
            parts.push(format!("member:{member}"));
        }
        parts.join(",")
    }

    async fn fetch_query(&self, query: &str, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut offset = 0u32;

        while offset < self.config.max_results {
            let url = self.works_url(query, spec, offset);
            let body: Value = match self.client.get_json(&url).await {
                Ok(body) => body,
                Err(e) if offset > 0 => {
                    warn!(query, offset, error = %e, "crossref page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };

            let items = body["message"]["items"].as_array().cloned().unwrap_or_default();
            let total = body["message"]["total-results"].as_u64().unwrap_or(0);
            let count = items.len() as u32;
            debug!(query, offset, count, total, "crossref page");

            records.extend(items);
            offset += count;
            if count < self.config.rows || u64::from(offset) >= total {
                break;
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for CrossrefSource {
    fn provider(&self) -> Provider {
        Provider::Crossref
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        fetch_each(Provider::Crossref, crossref_queries(spec), move |query| async move {
            self.fetch_query(&query, spec).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use ontoscope_core::YearRange;

    fn http() -> HttpConfig {
        HttpConfig {
            min_interval_ms: 0,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        }
    }

    fn spec() -> QuerySpec {
        QuerySpec::new(["cloud computing"], ["ontology"], ["iot"])
            .unwrap()
            .with_year_range(YearRange::new(Some(2014), Some(2027)))
            .unwrap()
    }

    #[tokio::test]
    async fn pages_by_offset_until_short_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "query.bibliographic".into(),
                    "cloud computing ontology".into(),
                ),
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("rows".into(), "2".into()),
                Matcher::UrlEncoded(
                    "filter".into(),
                    "from-pub-date:2014,until-pub-date:2027,member:320".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status": "ok", "message": {"total-results": 3, "items": [
                    {"DOI": "10.1145/1", "title": ["One"]},
                    {"DOI": "10.1145/2", "title": ["Two"]}
                ]}}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("offset".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"message": {"total-results": 3, "items": [{"DOI": "10.1145/3"}]}}"#)
            .create_async()
            .await;

        let config = CrossrefConfig {
            base_url: server.url(),
            rows: 2,
            page_delay_ms: 0,
            ..Default::default()
        };
        let source = CrossrefSource::new(config, &http()).unwrap();
        let records = source.fetch(&spec()).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["DOI"], "10.1145/3");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(400)
            .create_async()
            .await;

        let config = CrossrefConfig {
            base_url: server.url(),
            page_delay_ms: 0,
            ..Default::default()
        };
        let source = CrossrefSource::new(config, &http()).unwrap();
        assert!(source.fetch(&spec()).await.is_err());
    }

    #[test]
    fn mailto_joins_the_polite_pool() {
        let config = CrossrefConfig {
            base_url: "https://api.crossref.org/".to_string(),
            mailto: Some("me@example.org".to_string()),
            member: None,
            rows: 10,
            ..Default::default()
        };
        let source = CrossrefSource::new(config, &http()).unwrap();
        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        assert_eq!(
            source.works_url("cloud ontology", &spec, 20),
            "https://api.crossref.org/works?query.bibliographic=cloud%20ontology&rows=10&offset=20\
             &mailto=me%40example.org"
        );
    }

    #[tokio::test]
    async fn failed_pair_keeps_earlier_pairs() {
        let mut server = Server::new_async().await;
        let working = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded(
                "query.bibliographic".into(),
                "cloud computing ontology".into(),
            ))
            .with_status(200)
            .with_body(r#"{"message": {"total-results": 1, "items": [{"DOI": "10.1145/9"}]}}"#)
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded(
                "query.bibliographic".into(),
                "cloud computing linked data".into(),
            ))
            .with_status(400)
            .create_async()
            .await;

        let config = CrossrefConfig {
            base_url: server.url(),
            page_delay_ms: 0,
            ..Default::default()
        };
        let source = CrossrefSource::new(config, &http()).unwrap();
        let spec =
            QuerySpec::new(["cloud computing"], ["ontology", "linked data"], ["iot"]).unwrap();
        let records = source.fetch(&spec).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["DOI"], "10.1145/9");
        working.assert_async().await;
        broken.assert_async().await;
    }
}
