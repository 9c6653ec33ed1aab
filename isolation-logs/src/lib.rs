//! isolation-logs library - usage log export for the URL isolation service
//!
//! This library provides the pieces behind the `isolation-logs` binary: argument
//! parsing and prompts, key and date validation, and CSV output of exported logs.
pub mod cli;
pub mod credentials;
pub mod datetime;
pub mod error;
pub mod export;
pub mod output;

// Re-export commonly used types
pub use error::{ExportError, Result};
pub use export::{ExportOutcome, run_export};
