//! Error types for the isolation-logs exporter

/// Custom error type for export runs
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// Reporting API error
    #[error("Reporting API error: {0}")]
    Api(#[from] isolation_api::IsolationError),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid date range
    #[error("Invalid date range: {0}")]
    DateRangeInvalid(String),

    /// Rejected API key
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;
