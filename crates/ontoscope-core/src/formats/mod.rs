pub mod bibtex;
pub mod csv;
pub mod json;
pub mod xlsx;

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dedup::Discarded;
use crate::error::{CoreError, Result};
use crate::record::CanonicalRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Bibtex,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Csv, Self::Bibtex, Self::Json, Self::Xlsx];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Bibtex => "bib",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Csv => "csv",
            Self::Bibtex => "bibtex",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "bibtex" | "bib" => Ok(Self::Bibtex),
            "json" => Ok(Self::Json),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(CoreError::UnknownFormat(other.to_string())),
        }
    }
}

/// Write `records` to `path` in `format`, creating parent directories.
pub fn write_records(path: &Path, format: ExportFormat, records: &[CanonicalRecord]) -> Result<()> {
    match format {
        ExportFormat::Csv => self::csv::write_records(create(path)?, records),
        ExportFormat::Json => json::write_records(create(path)?, records),
        ExportFormat::Bibtex => {
            let mut out = create(path)?;
            out.write_all(bibtex::generate_bibliography(records).as_bytes())?;
            out.flush()?;
            Ok(())
        }
        ExportFormat::Xlsx => {
            ensure_parent(path)?;
            xlsx::write_records(path, records)
        }
    }
}

/// Audit CSV of duplicates next to the main export.
pub fn write_discarded(path: &Path, discarded: &[Discarded]) -> Result<()> {
    self::csv::write_discarded(create(path)?, discarded)
}

/// `out/results.csv` → `out/results_duplicates_removed.csv`
pub fn duplicates_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    path.with_file_name(format!("{stem}_duplicates_removed.csv"))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent(path)?;
    Ok(BufWriter::new(File::create(path)?))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn format_names_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("bib".parse::<ExportFormat>().unwrap(), ExportFormat::Bibtex);
        assert!(matches!(
            "ods".parse::<ExportFormat>(),
            Err(CoreError::UnknownFormat(_))
        ));
        assert_eq!("Excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::Bibtex.extension(), "bib");
    }

    #[test]
    fn duplicates_file_sits_next_to_export() {
        assert_eq!(
            duplicates_path(Path::new("out/acm_results.bib")),
            PathBuf::from("out/acm_results_duplicates_removed.csv")
        );
    }

    #[test]
    fn writes_every_format_into_new_directory() {
        let dir = tempdir().unwrap();
        let records = vec![CanonicalRecord {
            title: "Semantic multi-cloud brokering".to_string(),
            authors: "Ada Lovelace".to_string(),
            year: Some(2021),
            source: "acm".to_string(),
            ..Default::default()
        }];

        for format in ExportFormat::ALL {
            let path = dir.path().join("nested").join(format!("results.{}", format.extension()));
            write_records(&path, format, &records).unwrap();
            let written = fs::read(&path).unwrap();
            assert!(!written.is_empty(), "{format} export is empty");
        }

        let bib = fs::read_to_string(dir.path().join("nested/results.bib")).unwrap();
        assert!(bib.starts_with("@misc{lovelace2021semantic,"));
        let xlsx = fs::read(dir.path().join("nested/results.xlsx")).unwrap();
        assert!(xlsx.starts_with(b"PK"));
    }
}
