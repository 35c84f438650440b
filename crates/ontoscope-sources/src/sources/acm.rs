use async_trait::async_trait;
use ontoscope_core::config::{AcmConfig, HttpConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::http::RateLimitedClient;
use crate::query::acm_query;
use crate::sources::RecordSource;

const SEARCH_PATH: &str = "/action/doSearch";

/// ACM Digital Library search result page, scraped.
///
/// Each result becomes a flat record (`title`, `authors`, `abstract`,
/// `keywords`, `url`) read by the flat provider schema.
pub struct AcmSource {
    client: RateLimitedClient,
    config: AcmConfig,
}

impl AcmSource {
    pub fn new(config: AcmConfig, http: &HttpConfig) -> Result<Self> {
        let client = RateLimitedClient::from_config(http, config.page_delay_ms)?;
        Ok(Self { client, config })
    }

    fn search_url(&self, spec: &QuerySpec, page: u32) -> String {
        let mut url = format!(
            "{}{SEARCH_PATH}?AllField={}&startPage={page}&pageSize={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&acm_query(spec)),
            self.config.page_size
        );
        if let Some(range) = spec.year_range() {
            if let Some(min) = range.min {
                url.push_str(&format!("&AfterYear={min}"));
            }
            if let Some(max) = range.max {
                url.push_str(&format!("&BeforeYear={max}"));
            }
        }
        url
    }
}

#[async_trait]
impl RecordSource for AcmSource {
    fn provider(&self) -> Provider {
        Provider::Acm
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        for page in 0..self.config.max_pages {
            let url = self.search_url(spec, page);
            let html = match self.client.get(&url).await {
                Ok(html) => html,
                Err(e) if page > 0 => {
                    warn!(page, error = %e, "acm page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };

            let items = parse_search_page(&html, &self.config.base_url)?;
            debug!(page, count = items.len(), "acm page");
            if items.is_empty() {
                break;
            }
            let short = items.len() < self.config.page_size as usize;
            records.extend(items);
            if short {
                break;
            }
        }
        Ok(records)
    }
}

/// Extract result items from one search page. Items without a title link are skipped.
pub fn parse_search_page(html: &str, base_url: &str) -> Result<Vec<RawRecord>> {
    let document = Html::parse_document(html);
    let item_selector = parse_selector("div.search__item")?;
    let title_selector = parse_selector("h5.issue-item__title a")?;
    let author_selector = parse_selector("ul.rlist--inline li span.hlFld-ContribAuthor")?;
    let abstract_selector = parse_selector("div.issue-item__abstract")?;
    let keyword_selector = parse_selector("div.issue-item__keywords span")?;
    let base = Url::parse(base_url)
        .map_err(|e| SourceError::Parse(format!("invalid ACM base url {base_url}: {e}")))?;

    let mut records = Vec::new();
    for item in document.select(&item_selector) {
        let Some(title_link) = item.select(&title_selector).next() else {
            continue;
        };
        let title = element_text(&title_link);
        let url = title_link
            .value()
            .attr("href")
            .and_then(|href| base.join(href).ok())
            .map(|u| u.to_string());

        let authors: Vec<String> = item
            .select(&author_selector)
            .map(|a| element_text(&a))
            .filter(|a| !a.is_empty())
            .collect();
        let abstract_text = item
            .select(&abstract_selector)
            .next()
            .map(|a| element_text(&a))
            .unwrap_or_default();
        let keywords: Vec<String> = item
            .select(&keyword_selector)
            .map(|k| element_text(&k))
            .filter(|k| !k.is_empty())
            .collect();

        records.push(json!({
            "title": title,
            "authors": authors,
            "abstract": abstract_text,
            "keywords": keywords,
            "url": url,
        }));
    }
    Ok(records)
}

fn parse_selector(input: &str) -> Result<Selector> {
    Selector::parse(input).map_err(|e| SourceError::Parse(format!("invalid selector {input}: {e}")))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
