use std::fmt;

use ontoscope_core::config::SourcesConfig;

/// Secrets read once at startup. Never logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub scopus_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl Credentials {
    /// Read the env vars named in the config (`SCOPUS_API_KEY`, `GITHUB_TOKEN` by default).
    pub fn from_env(config: &SourcesConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(config: &SourcesConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            scopus_api_key: read(&config.scopus.api_key_env),
            github_token: read(&config.github.token_env),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("scopus_api_key", &mask(&self.scopus_api_key))
            .field("github_token", &mask(&self.github_token))
            .finish()
    }
}
