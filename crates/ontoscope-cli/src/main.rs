use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use ontoscope_core::formats::{self, ExportFormat};
use ontoscope_core::{
    AppConfig, Pipeline, PipelineReport, Provider, ProviderSchema, QuerySpec, RawRecord,
    SourceBatch,
};
use ontoscope_sources::query::queries_for;
use ontoscope_sources::sources::lod_cloud::catalog_entries;
use ontoscope_sources::{Credentials, build_sources, fetch_all};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ontoscope",
    about = "Fetch, filter and deduplicate cloud/ontology literature from bibliographic providers",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $ONTOSCOPE_CONFIG or ~/.config/ontoscope/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting ONTOSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// More logging: -v debug, -vv trace. RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch from providers, filter, deduplicate and export.
    Run {
        /// Provider to fetch (repeatable). Defaults to every enabled provider.
        #[arg(long = "source", action = clap::ArgAction::Append)]
        sources: Vec<Provider>,
        /// Output directory.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export format (repeatable): csv, bibtex, json, xlsx.
        #[arg(long = "format", action = clap::ArgAction::Append)]
        formats: Vec<ExportFormat>,
        /// Also write one export per provider.
        #[arg(long)]
        per_source: bool,
    },

    /// Run the offline pipeline over a saved JSON file of raw records.
    Filter {
        input: PathBuf,
        /// Provider whose field layout the records use.
        #[arg(long, required_unless_present = "schema")]
        provider: Option<Provider>,
        /// TOML field-mapping table for records no built-in provider describes.
        #[arg(long, conflicts_with = "provider")]
        schema: Option<PathBuf>,
        /// Output file. Prints JSON to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export format; inferred from the output extension when omitted.
        #[arg(long)]
        format: Option<ExportFormat>,
    },

    /// Print the query strings sent to each provider.
    Query {
        #[arg(long)]
        provider: Option<Provider>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file path.
    Path,
    /// Write a default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let json_output = cli.json || std::env::var("ONTOSCOPE_JSON").as_deref() == Ok("1");
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    match cli.command {
        Commands::Run {
            sources,
            output,
            formats,
            per_source,
        } => {
            let mut config = config;
            if let Some(dir) = output {
                config.output.directory = dir.to_string_lossy().into_owned();
            }
            if !formats.is_empty() {
                config.output.formats = formats;
            }
            config.output.per_source |= per_source;

            let summary = run(&config, &sources).await?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&json!({"status":"ok","data":summary,"meta":{"duration_ms":dur}}))?;
            } else {
                print_run_summary(&summary);
            }
        }

        Commands::Filter {
            input,
            provider,
            schema,
            output,
            format,
        } => {
            let spec = query_spec(&config)?;
            let raw = read_raw_records(&input)?;
            let batch = match (schema, provider) {
                (Some(path), _) => SourceBatch::with_schema(read_schema(&path)?, raw),
                (None, Some(provider)) => SourceBatch::new(provider, raw),
                (None, None) => bail!("pass --provider or --schema"),
            };
            let report = Pipeline::new(spec).run([batch]);
            let dur = start.elapsed().as_millis();

            match output {
                Some(path) => {
                    let format = match format {
                        Some(f) => f,
                        None => format_from_extension(&path)?,
                    };
                    let files = export(&path, format, &report, config.output.write_duplicates)?;
                    if json_output {
                        print_json(&json!({
                            "status":"ok",
                            "data":{"stats":report.stats,"files":files},
                            "meta":{"duration_ms":dur}
                        }))?;
                    } else {
                        print_stats(&report);
                        for file in &files {
                            println!("wrote {file}");
                        }
                    }
                }
                None if json_output => {
                    print_json(&json!({
                        "status":"ok",
                        "data":{"records":report.records,"stats":report.stats},
                        "meta":{"duration_ms":dur}
                    }))?;
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&report.records)?);
                }
            }
        }

        Commands::Query { provider } => {
            let spec = query_spec(&config)?;
            let providers = match provider {
                Some(p) => vec![p],
                None => config.sources.order.clone(),
            };
            let queries: Vec<Value> = providers
                .iter()
                .map(|p| json!({"provider": p, "queries": queries_for(*p, &spec)}))
                .collect();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&json!({"status":"ok","data":queries,"meta":{"duration_ms":dur}}))?;
            } else {
                for p in &providers {
                    println!("[{p}]");
                    let qs = queries_for(*p, &spec);
                    if qs.is_empty() {
                        println!("  (no server-side query; filtered locally)");
                    }
                    for q in qs {
                        println!("  {q}");
                    }
                }
            }
        }

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&json!({
                            "status": "ok",
                            "data": config,
                            "meta": {"duration_ms": dur}
                        }))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Path => {
                    let exists = config_path.exists();
                    if json_output {
                        print_json(&json!({
                            "status":"ok",
                            "data":{"path":config_path,"exists":exists},
                            "meta":{"duration_ms":dur}
                        }))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        bail!(
                            "{} already exists; pass --force to overwrite",
                            config_path.display()
                        );
                    }
                    AppConfig::default()
                        .save_to(&config_path)
                        .with_context(|| format!("failed to write {}", config_path.display()))?;
                    if json_output {
                        print_json(&json!({
                            "status":"ok",
                            "data":{"path":config_path},
                            "meta":{"duration_ms":dur}
                        }))?;
                    } else {
                        println!("wrote {}", config_path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn run(config: &AppConfig, requested: &[Provider]) -> Result<Value> {
    let spec = query_spec(config)?;
    let providers = if requested.is_empty() {
        config.sources.enabled_providers()
    } else {
        requested.to_vec()
    };

    let credentials = Credentials::from_env(&config.sources);
    let sources = build_sources(config, &credentials, &providers)?;
    if sources.is_empty() {
        bail!("no providers to fetch; enable one in the config or pass --source");
    }

    let outcome = fetch_all(&sources, &spec).await;
    if outcome.all_failed() {
        for (provider, err) in &outcome.failures {
            warn!(%provider, error = %err, "provider failed");
        }
        bail!("every provider failed");
    }

    let failures: Vec<Value> = outcome
        .failures
        .iter()
        .map(|(p, e)| json!({"provider": p, "error": e.to_string()}))
        .collect();

    let mut files = Vec::new();
    if config.output.per_source {
        for batch in &outcome.batches {
            let provider = batch.schema.provider;
            let report = Pipeline::new(spec.clone()).run([batch.clone()]);
            let prefix = provider.as_str().replace('-', "_");
            let stem = format!("{prefix}_{}", config.output.file_stem);
            files.extend(export_all(config, &stem, &report)?);
        }
    }

    let report = Pipeline::new(spec).run(outcome.batches);
    files.extend(export_all(config, &config.output.file_stem, &report)?);
    info!(kept = report.stats.kept, files = files.len(), "run finished");

    Ok(json!({
        "stats": report.stats,
        "files": files,
        "failed_providers": failures,
    }))
}

fn query_spec(config: &AppConfig) -> Result<QuerySpec> {
    config
        .query
        .to_spec()
        .context("invalid [query] section in config")
}

/// One file per configured format under the output directory. Duplicates
/// are written once, next to the first export.
fn export_all(config: &AppConfig, stem: &str, report: &PipelineReport) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for (i, &format) in config.output.formats.iter().enumerate() {
        let path = config.output.export_path(stem, format);
        let with_duplicates = config.output.write_duplicates && i == 0;
        files.extend(export(&path, format, report, with_duplicates)?);
    }
    Ok(files)
}

fn export(
    path: &Path,
    format: ExportFormat,
    report: &PipelineReport,
    with_duplicates: bool,
) -> Result<Vec<String>> {
    formats::write_records(path, format, &report.records)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let mut files = vec![path.display().to_string()];

    if with_duplicates && !report.discarded.is_empty() {
        let dup_path = formats::duplicates_path(path);
        formats::write_discarded(&dup_path, &report.discarded)
            .with_context(|| format!("failed to write {}", dup_path.display()))?;
        files.push(dup_path.display().to_string());
    }
    Ok(files)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// A JSON array of records, or an object keyed by record id.
fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    catalog_entries(value).with_context(|| format!("unexpected layout in {}", path.display()))
}

fn read_schema(path: &Path) -> Result<ProviderSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid schema in {}", path.display()))
}

fn format_from_extension(path: &Path) -> Result<ExportFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("cannot infer format of {}; pass --format", path.display()))?;
    Ok(ext.parse()?)
}

fn print_json(val: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_stats(report: &PipelineReport) {
    let s = &report.stats;
    println!(
        "{raw} fetched, {dropped} dropped, {rejected} rejected, {dup} duplicates, {kept} kept",
        raw = s.raw,
        dropped = s.dropped,
        rejected = s.rejected_total(),
        dup = s.duplicates,
        kept = s.kept,
    );
}

fn print_run_summary(summary: &Value) {
    let stats = &summary["stats"];
    println!(
        "{} fetched, {} dropped, {} duplicates, {} kept",
        stats["raw"], stats["dropped"], stats["duplicates"], stats["kept"]
    );
    if let Some(rejected) = stats["rejected"].as_object() {
        for (reason, count) in rejected {
            println!("  rejected ({reason}): {count}");
        }
    }
    if let Some(failed) = summary["failed_providers"].as_array() {
        for f in failed {
            println!(
                "  failed: {} ({})",
                f["provider"].as_str().unwrap_or_default(),
                f["error"].as_str().unwrap_or_default()
            );
        }
    }
    if let Some(files) = summary["files"].as_array() {
        for file in files.iter().filter_map(Value::as_str) {
            println!("wrote {file}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_parses_repeated_sources_and_formats() {
        let cli = Cli::try_parse_from([
            "ontoscope", "-vv", "--json", "run", "--source", "zenodo", "--source", "lod-cloud",
            "--format", "csv", "--format", "bib",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run { sources, formats, .. } => {
                assert_eq!(sources, vec![Provider::Zenodo, Provider::LodCloud]);
                assert_eq!(formats, vec![ExportFormat::Csv, ExportFormat::Bibtex]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["ontoscope", "query", "--provider", "arxiv"]).is_err());
    }

    #[test]
    fn reads_arrays_and_object_maps() {
        let dir = TempDir::new().unwrap();
        let array = dir.path().join("array.json");
        std::fs::write(&array, r#"[{"title": "a"}, {"title": "b"}]"#).unwrap();
        assert_eq!(read_raw_records(&array).unwrap().len(), 2);

        let map = dir.path().join("map.json");
        std::fs::write(&map, r#"{"ds1": {"title": "a"}}"#).unwrap();
        let records = read_raw_records(&map).unwrap();
        assert_eq!(records[0]["id"], "ds1");

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "42").unwrap();
        assert!(read_raw_records(&bad).is_err());
    }

    #[test]
    fn filter_takes_provider_or_schema() {
        let cli =
            Cli::try_parse_from(["ontoscope", "filter", "in.json", "--schema", "s.toml"]).unwrap();
        match cli.command {
            Commands::Filter { provider, schema, .. } => {
                assert_eq!(provider, None);
                assert_eq!(schema, Some(PathBuf::from("s.toml")));
            }
            _ => panic!("expected filter"),
        }
        assert!(Cli::try_parse_from(["ontoscope", "filter", "in.json"]).is_err());
        assert!(
            Cli::try_parse_from([
                "ontoscope", "filter", "in.json", "--provider", "acm", "--schema", "s.toml"
            ])
            .is_err()
        );
    }

    #[test]
    fn custom_schema_is_read_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.toml");
        let schema_toml = "provider = \"custom\"\ntitle = [\"name\"]\nurl = [\"homepage\"]\n";
        std::fs::write(&path, schema_toml).unwrap();
        let schema = read_schema(&path).unwrap();
        assert_eq!(schema.provider, Provider::Custom);
        assert_eq!(schema.title.paths().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_from_extension(Path::new("out.bib")).unwrap(), ExportFormat::Bibtex);
        assert!(format_from_extension(Path::new("out")).is_err());
        assert_eq!(format_from_extension(Path::new("out.xlsx")).unwrap(), ExportFormat::Xlsx);
        assert!(format_from_extension(Path::new("out.txt")).is_err());
    }

    #[test]
    fn export_all_writes_duplicates_once() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.output.directory = dir.path().to_string_lossy().into_owned();
        config.output.formats = vec![ExportFormat::Csv, ExportFormat::Json];

        let raw = vec![
            json!({"title": "Cloud computing ontology", "doi": "10.1/x"}),
            json!({"title": "Cloud computing ontology again", "doi": "10.1/X"}),
        ];
        let spec = config.query.to_spec().unwrap();
        let report = Pipeline::new(spec).run([SourceBatch::new(Provider::Custom, raw)]);

        let files = export_all(&config, "results", &report).unwrap();
        assert_eq!(files.len(), 3);
        assert!(dir.path().join("results.csv").exists());
        assert!(dir.path().join("results.json").exists());
        assert!(dir.path().join("results_duplicates_removed.csv").exists());
    }
}
