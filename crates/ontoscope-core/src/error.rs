use thiserror::Error;

/// All errors that can occur in ontoscope-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
