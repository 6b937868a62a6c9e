use thiserror::Error;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum EtlError {
    /// Raised at startup, before any data access is attempted.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("malformed record at {path}:{line}: {source}")]
    MalformedRecord {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An expected input directory (`song_data/` or `log-data/`) is absent.
    #[error("input directory does not exist: {0}")]
    MissingInput(String),

    #[error("unsupported input location: {0}")]
    UnsupportedLocation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EtlError {
    /// True for failures that happen before the run touches any input data.
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, EtlError::MissingCredentials(_) | EtlError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
