use async_trait::async_trait;
use ontoscope_core::config::{GithubConfig, HttpConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::http::RateLimitedClient;
use crate::query::github_queries;
use crate::sources::{RecordSource, fetch_each};

const SEARCH_PATH: &str = "/search/repositories";
/// The search API never returns more than this many results per query.
const SEARCH_CAP: u32 = 1000;

/// GitHub repository search.
pub struct GithubSource {
    client: RateLimitedClient,
    config: GithubConfig,
    headers: HeaderMap,
}

impl GithubSource {
    pub fn new(config: GithubConfig, token: Option<String>, http: &HttpConfig) -> Result<Self> {
        let client = RateLimitedClient::from_config(http, config.page_delay_ms)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        match token {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| SourceError::MissingCredential(config.token_env.clone()))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => info!(env = %config.token_env, "no GitHub token; searching unauthenticated"),
        }

        Ok(Self {
            client,
            config,
            headers,
        })
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}{SEARCH_PATH}?q={}&per_page={}&page={page}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.per_page
        )
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<RawRecord>> {
        let limit = self.config.max_results.min(SEARCH_CAP) as usize;
        let mut records: Vec<RawRecord> = Vec::new();
        let mut page = 1u32;

        while records.len() < limit {
            let url = self.search_url(query, page);
            let response = self.client.get_json_with_headers(&url, self.headers.clone()).await;
            let body: Value = match response {
                Ok(body) => body,
                Err(e) if page > 1 => {
                    warn!(query, page, error = %e, "github page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };

            let items = body["items"].as_array().cloned().unwrap_or_default();
            let count = items.len();
            debug!(query, page, count, total = body["total_count"].as_u64(), "github page");

            let room = limit - records.len();
            records.extend(items.into_iter().take(room));
            if count < self.config.per_page as usize {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for GithubSource {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        fetch_each(Provider::Github, github_queries(spec), move |query| async move {
            self.fetch_query(&query).await
        })
        .await
    }
}
