use async_trait::async_trait;
use ontoscope_core::config::{HttpConfig, LodCloudConfig};
use ontoscope_core::{Provider, QuerySpec, RawRecord};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::RateLimitedClient;
use crate::sources::RecordSource;

/// The LOD Cloud catalog: one JSON document holding every dataset.
///
/// There is no server-side search; all entries are returned and the local
/// matcher does the filtering.
pub struct LodCloudSource {
    client: RateLimitedClient,
    config: LodCloudConfig,
}

impl LodCloudSource {
    pub fn new(config: LodCloudConfig, http: &HttpConfig) -> Result<Self> {
        let client = RateLimitedClient::from_config(http, 0)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl RecordSource for LodCloudSource {
    fn provider(&self) -> Provider {
        Provider::LodCloud
    }

    async fn fetch(&self, _spec: &QuerySpec) -> Result<Vec<RawRecord>> {
        let catalog: Value = self.client.get_json(&self.config.catalog_url).await?;
        let records = catalog_entries(catalog)?;
        debug!(count = records.len(), "lod cloud catalog");
        Ok(records)
    }
}

/// Flatten the catalog into records.
///
/// The published form is an object keyed by dataset id; the key is copied
/// into the entry as `id` when the entry lacks one. A plain array is also
/// accepted.
pub fn catalog_entries(catalog: Value) -> Result<Vec<RawRecord>> {
    match catalog {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, mut entry)| {
                if let Value::Object(fields) = &mut entry
                    && !fields.contains_key("id")
                {
                    fields.insert("id".to_string(), Value::String(key));
                }
                entry
            })
            .collect()),
        Value::Array(items) => Ok(items),
        other => Err(SourceError::Parse(format!(
            "LOD Cloud catalog must be an object or array, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
