use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use ontoscope_core::{AppConfig, Provider, QuerySpec, RawRecord, SourceBatch};
use tracing::{error, info, warn};

use crate::credentials::Credentials;
use crate::error::{Result, SourceError};

pub mod acm;
pub mod crossref;
pub mod github;
pub mod lod_cloud;
pub mod scopus;
pub mod zenodo;

pub use acm::AcmSource;
pub use crossref::CrossrefSource;
pub use github::GithubSource;
pub use lod_cloud::LodCloudSource;
pub use scopus::ScopusSource;
pub use zenodo::ZenodoSource;

/// A provider that can be asked for every raw record matching a query.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRecord>>;
}

/// Run each provider query in turn and concatenate the results.
///
/// A failing query is logged and skipped so the other queries' records
/// survive. The first error is returned only when every query failed.
pub(crate) async fn fetch_each<F, Fut>(
    provider: Provider,
    queries: Vec<String>,
    mut fetch_query: F,
) -> Result<Vec<RawRecord>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<RawRecord>>>,
{
    let mut records = Vec::new();
    let mut succeeded = 0usize;
    let mut first_error = None;
    for query in queries {
        match fetch_query(query.clone()).await {
            Ok(batch) => {
                succeeded += 1;
                records.extend(batch);
            }
            Err(e) => {
                warn!(
                    %provider, query = %query, error = %e,
                    "query failed; keeping other results"
                );
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(records),
    }
}

/// Build fetchers for `providers`, in that order.
///
/// Providers without a fetcher, or without a required credential, are
/// skipped with a warning rather than failing the whole run.
pub fn build_sources(
    config: &AppConfig,
    credentials: &Credentials,
    providers: &[Provider],
) -> Result<Vec<Box<dyn RecordSource>>> {
    let http = &config.http;
    let sources = &config.sources;
    let mut out: Vec<Box<dyn RecordSource>> = Vec::new();

    for &provider in providers {
        let source: Box<dyn RecordSource> = match provider {
            Provider::Crossref => Box::new(CrossrefSource::new(sources.crossref.clone(), http)?),
            Provider::Acm => Box::new(AcmSource::new(sources.acm.clone(), http)?),
            Provider::Scopus => match &credentials.scopus_api_key {
                Some(key) => {
                    Box::new(ScopusSource::new(sources.scopus.clone(), key.clone(), http)?)
                }
                None => {
                    let err = SourceError::MissingCredential(sources.scopus.api_key_env.clone());
                    warn!(%provider, "{err}; provider disabled");
                    continue;
                }
            },
            Provider::Zenodo => Box::new(ZenodoSource::new(sources.zenodo.clone(), http)?),
            Provider::Github => Box::new(GithubSource::new(
                sources.github.clone(),
                credentials.github_token.clone(),
                http,
            )?),
            Provider::LodCloud => Box::new(LodCloudSource::new(sources.lod_cloud.clone(), http)?),
            Provider::Ieee | Provider::Custom => {
                warn!(%provider, "no fetcher for provider; skipped");
                continue;
            }
        };
        out.push(source);
    }
    Ok(out)
}

/// Result of running every fetcher once.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Successful providers, in fetch order.
    pub batches: Vec<SourceBatch>,
    pub failures: Vec<(Provider, SourceError)>,
}

impl FetchOutcome {
    /// True when at least one provider was attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.batches.is_empty() && !self.failures.is_empty()
    }
}

/// Run fetchers sequentially. A failing provider is logged and skipped.
pub async fn fetch_all(sources: &[Box<dyn RecordSource>], spec: &QuerySpec) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    for source in sources {
        let provider = source.provider();
        let start = Instant::now();
        match source.fetch(spec).await {
            Ok(records) => {
                info!(
                    %provider,
                    records = records.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "fetch finished"
                );
                outcome.batches.push(SourceBatch::new(provider, records));
            }
            Err(e) => {
                error!(%provider, error = %e, "fetch failed; continuing with remaining providers");
                outcome.failures.push((provider, e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Provider, Option<Vec<RawRecord>>);

    #[async_trait]
    impl RecordSource for Fixed {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn fetch(&self, _spec: &QuerySpec) -> Result<Vec<RawRecord>> {
            self.1
                .clone()
                .ok_or_else(|| SourceError::Api("test".to_string(), "HTTP 500".to_string()))
        }
    }

    fn spec() -> QuerySpec {
        QuerySpec::new(["cloud"], ["ontology"], ["iot"]).unwrap()
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_stop_the_run() {
        let sources: Vec<Box<dyn RecordSource>> = vec![
            Box::new(Fixed(Provider::Zenodo, None)),
            Box::new(Fixed(Provider::Github, Some(vec![json!({"name": "x"})]))),
        ];
        let outcome = fetch_all(&sources, &spec()).await;
        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.batches[0].schema.provider, Provider::Github);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, Provider::Zenodo);
        assert!(!outcome.all_failed());
    }

    #[tokio::test]
    async fn all_failed_only_when_every_provider_fails() {
        let sources: Vec<Box<dyn RecordSource>> = vec![Box::new(Fixed(Provider::Acm, None))];
        assert!(fetch_all(&sources, &spec()).await.all_failed());
        assert!(!fetch_all(&[], &spec()).await.all_failed());
    }

    #[test]
    fn missing_scopus_key_disables_scopus_only() {
        let config = AppConfig::default();
        let creds = Credentials::default();
        let built = build_sources(
            &config,
            &creds,
            &[Provider::Scopus, Provider::Zenodo, Provider::Ieee, Provider::Github],
        )
        .unwrap();
        let providers: Vec<Provider> = built.iter().map(|s| s.provider()).collect();
        assert_eq!(providers, vec![Provider::Zenodo, Provider::Github]);
    }
}
