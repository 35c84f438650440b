use async_trait::async_trait;
use ontoscope_core::config::{HttpConfig, ZenodoConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::query::zenodo_queries;
use crate::sources::{RecordSource, fetch_each};

const RECORDS_PATH: &str = "/api/records";

/// Zenodo records search. Only publications in English (or with no
/// language given) are kept.
pub struct ZenodoSource {
    client: RateLimitedClient,
    config: ZenodoConfig,
}

impl ZenodoSource {
    pub fn new(config: ZenodoConfig, http: &HttpConfig) -> Result<Self> {
        let client = RateLimitedClient::from_config(http, config.page_delay_ms)?;
        Ok(Self { client, config })
    }

    fn records_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}{RECORDS_PATH}?q={}&size={}&page={page}&sort=mostdownloaded&all_versions=false",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.size
        )
    }

    fn keep(&self, hit: &Value) -> bool {
        let metadata = &hit["metadata"];
        let resource_type = metadata["resource_type"]["type"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase();
        let subtype = metadata["resource_type"]["subtype"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase();
        let type_ok = self
            .config
            .resource_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&resource_type) || t.eq_ignore_ascii_case(&subtype));

        type_ok && is_english_or_unspecified(&metadata["language"])
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        for page in 1..=self.config.max_pages {
            let url = self.records_url(query, page);
            let body: Value = match self.client.get_json(&url).await {
                Ok(body) => body,
                Err(e) if page > 1 => {
                    warn!(query, page, error = %e, "zenodo page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };

            let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();
            if hits.is_empty() {
                break;
            }
            let fetched = hits.len();
            let before = records.len();
            records.extend(hits.into_iter().filter(|hit| self.keep(hit)));
            debug!(query, page, fetched, kept = records.len() - before, "zenodo page");

            if fetched < self.config.size as usize {
                break;
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for ZenodoSource {
    fn provider(&self) -> Provider {
        Provider::Zenodo
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        fetch_each(Provider::Zenodo, zenodo_queries(spec), move |query| async move {
            self.fetch_query(&query).await
        })
        .await
    }
}

/// `"en"`, `"eng"`, `{"id": "eng"}` or absent.
fn is_english_or_unspecified(language: &Value) -> bool {
    let code = match language {
        Value::Null => return true,
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("id").and_then(Value::as_str).unwrap_or_default(),
        _ => return false,
    };
    matches!(code.trim().to_lowercase().as_str(), "" | "en" | "eng")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn language_filter() {
        assert!(is_english_or_unspecified(&Value::Null));
        assert!(is_english_or_unspecified(&json!("EN")));
        assert!(is_english_or_unspecified(&json!("eng")));
        assert!(!is_english_or_unspecified(&json!("ita")));
    }

    #[tokio::test]
    async fn keeps_publications_and_stops_on_empty_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", RECORDS_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("size".into(), "3".into()),
                Matcher::UrlEncoded("sort".into(), "mostdownloaded".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"hits": {"hits": [
                    {"id": 1, "metadata": {"title": "Paper", "resource_type": {"type": "publication"}}},
                    {"id": 2, "metadata": {"title": "Data", "resource_type": {"type": "dataset"}}},
                    {"id": 3, "metadata": {"title": "Articolo", "language": "ita",
                        "resource_type": {"type": "publication", "subtype": "article"}}}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", RECORDS_PATH)
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"hits": {"hits": []}}"#)
            .create_async()
            .await;

        let config = ZenodoConfig {
            base_url: server.url(),
            size: 3,
            page_delay_ms: 0,
            ..Default::default()
        };
        let http = HttpConfig {
            min_interval_ms: 0,
            ..Default::default()
        };
        let spec = QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap();
        let records = ZenodoSource::new(config, &http).unwrap().fetch(&spec).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], 1);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn failed_pair_keeps_other_pairs() {
        let mut server = Server::new_async().await;
        let broken = server
            .mock("GET", RECORDS_PATH)
            .match_query(Matcher::Regex("taxonomy".into()))
            .with_status(400)
            .with_body("bad query")
            .create_async()
            .await;
        let working = server
            .mock("GET", RECORDS_PATH)
            .match_query(Matcher::Regex("ontology".into()))
            .with_status(200)
            .with_body(
                json!({"hits": {"hits": [
                    {"id": 7, "metadata": {"title": "Paper", "resource_type": {"type": "publication"}}}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;

        let config = ZenodoConfig {
            base_url: server.url(),
            page_delay_ms: 0,
            ..Default::default()
        };
        let http = HttpConfig {
            min_interval_ms: 0,
            ..Default::default()
        };
        let source = ZenodoSource::new(config, &http).unwrap();
        let spec =
            QuerySpec::new(["cloud"], ["taxonomy", "ontology"], Vec::<String>::new()).unwrap();
        let records = source.fetch(&spec).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], 7);
        broken.assert_async().await;
        working.assert_async().await;
    }
}
