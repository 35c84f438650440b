use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::formats::ExportFormat;
use crate::query::{AbsentYearPolicy, QuerySpec, YearRange};
use crate::schema::Provider;

/// Root configuration, loaded from `~/.config/ontoscope/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub cloud_terms: Vec<String>,
    pub semantic_terms: Vec<String>,
    pub exclude_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_max: Option<i32>,
    pub absent_year: AbsentYearPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    /// File stem of the merged export, e.g. `results` → `results.csv`.
    pub file_stem: String,
    pub formats: Vec<ExportFormat>,
    pub write_duplicates: bool,
    /// Also write one export per provider (`<provider>_results.*`).
    pub per_source: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Floor on the spacing between two requests to the same provider.
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Fetch order. Earlier providers win duplicates.
    pub order: Vec<Provider>,
    pub crossref: CrossrefConfig,
    pub acm: AcmConfig,
    pub scopus: ScopusConfig,
    pub zenodo: ZenodoConfig,
    pub github: GithubConfig,
    pub lod_cloud: LodCloudConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossrefConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Contact address for the polite pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
    /// Restrict to ACM (`member:320`) by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    pub rows: u32,
    pub max_results: u32,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopusConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: String,
    pub count: u32,
    pub max_results: u32,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenodoConfig {
    pub enabled: bool,
    pub base_url: String,
    pub size: u32,
    pub max_pages: u32,
    pub resource_types: Vec<String>,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub enabled: bool,
    pub base_url: String,
    pub token_env: String,
    pub per_page: u32,
    pub max_results: u32,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodCloudConfig {
    pub enabled: bool,
    pub catalog_url: String,
}

// ─── Defaults ──────────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cloud_terms: strings(&["cloud computing", "cloud-computing", "multi-cloud"]),
            semantic_terms: strings(&[
                "ontolog*",
                "semantic web",
                "knowledge graph*",
                "linked data",
                "linked open data",
            ]),
            exclude_terms: strings(&["internet of things", "iot"]),
            year_min: Some(2014),
            year_max: Some(2027),
            absent_year: AbsentYearPolicy::Pass,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            file_stem: "results".to_string(),
            formats: vec![ExportFormat::Csv, ExportFormat::Bibtex],
            write_duplicates: true,
            per_source: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            max_retries: 5,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            timeout_secs: 30,
            user_agent: format!("ontoscope/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: vec![
                Provider::Crossref,
                Provider::Acm,
                Provider::Scopus,
                Provider::Zenodo,
                Provider::Github,
                Provider::LodCloud,
            ],
            crossref: CrossrefConfig::default(),
            acm: AcmConfig::default(),
            scopus: ScopusConfig::default(),
            zenodo: ZenodoConfig::default(),
            github: GithubConfig::default(),
            lod_cloud: LodCloudConfig::default(),
        }
    }
}

impl Default for CrossrefConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.crossref.org".to_string(),
            mailto: None,
            member: Some("320".to_string()),
            rows: 100,
            max_results: 1000,
            page_delay_ms: 1000,
        }
    }
}

impl Default for AcmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://dl.acm.org".to_string(),
            page_size: 20,
            max_pages: 5,
            page_delay_ms: 2000,
        }
    }
}

impl Default for ScopusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.elsevier.com".to_string(),
            api_key_env: "SCOPUS_API_KEY".to_string(),
            count: 25,
            max_results: 2000,
            page_delay_ms: 1000,
        }
    }
}

impl Default for ZenodoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://zenodo.org".to_string(),
            size: 25,
            max_pages: 10,
            resource_types: strings(&["publication", "conferencepaper"]),
            page_delay_ms: 1000,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            per_page: 100,
            max_results: 1000,
            page_delay_ms: 3000,
        }
    }
}

impl Default for LodCloudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            catalog_url: "https://lod-cloud.net/versions/2025-09-02/lod-data.json".to_string(),
        }
    }
}

// ─── Derived values ────────────────────────────────────────

impl QueryConfig {
    /// Validate the configured terms into a [`QuerySpec`].
    pub fn to_spec(&self) -> Result<QuerySpec> {
        Ok(QuerySpec::new(&self.cloud_terms, &self.semantic_terms, &self.exclude_terms)?
            .with_year_range(YearRange::new(self.year_min, self.year_max))?
            .with_absent_year(self.absent_year))
    }
}

impl OutputConfig {
    pub fn export_path(&self, stem: &str, format: ExportFormat) -> PathBuf {
        PathBuf::from(&self.directory).join(format!("{stem}.{}", format.extension()))
    }
}

impl SourcesConfig {
    /// Whether the provider has a section and it is switched on.
    pub fn is_enabled(&self, provider: Provider) -> bool {
        match provider {
            Provider::Crossref => self.crossref.enabled,
            Provider::Acm => self.acm.enabled,
            Provider::Scopus => self.scopus.enabled,
            Provider::Zenodo => self.zenodo.enabled,
            Provider::Github => self.github.enabled,
            Provider::LodCloud => self.lod_cloud.enabled,
            Provider::Ieee | Provider::Custom => false,
        }
    }

    pub fn enabled_providers(&self) -> Vec<Provider> {
        self.order
            .iter()
            .copied()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/ontoscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ONTOSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ontoscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings that parse but cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.output.formats.is_empty() {
            return Err(CoreError::Config("output.formats must list at least one format".into()));
        }
        if self.output.file_stem.trim().is_empty() {
            return Err(CoreError::Config("output.file_stem must not be blank".into()));
        }
        if self.http.base_delay_ms > self.http.max_delay_ms {
            return Err(CoreError::Config(format!(
                "http.base_delay_ms ({}) exceeds http.max_delay_ms ({})",
                self.http.base_delay_ms, self.http.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
