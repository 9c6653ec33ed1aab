//! Usage-log export run
use std::path::PathBuf;

use isolation_api::{ExportRequest, ExportSummary, IsolationClient};
use log::{info, warn};

use crate::error::Result;
use crate::output::DeferredLogFile;

/// Result of a successful export run
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// CSV file the records were written to
    pub path: PathBuf,
    /// Rows written to the file
    pub rows: u64,
    /// Call, sleep and page counts reported by the export
    pub summary: ExportSummary,
}

/// Export the usage logs for `request` into a timestamped CSV file.
///
/// # Arguments
///
/// * `client` - Reporting API client
/// * `request` - Validated export parameters
/// * `output_dir` - Directory for the CSV file (created if missing)
/// * `run_timestamp` - Run start time, `YYYYMMDD-HHMMSS`, used in the file name
///
/// # Errors
///
/// Returns an error if the export job fails or the file cannot be written.
/// Pages written before a failure stay in the file.
pub async fn run_export(
    client: &IsolationClient,
    request: &ExportRequest,
    output_dir: &str,
    run_timestamp: &str,
) -> Result<ExportOutcome> {
    let mut sink = DeferredLogFile::new(output_dir, run_timestamp);
    let summary = match client.usage_api().export(request, &mut sink).await {
        Ok(summary) => summary,
        Err(e) => {
            match sink.finish() {
                Ok(Some((path, rows))) => warn!(
                    "Export failed after writing {} rows; partial output left in {}",
                    rows,
                    path.display()
                ),
                Ok(None) => {}
                Err(flush_err) => warn!("Could not flush partial output: {}", flush_err),
            }
            return Err(e.into());
        }
    };

    let (path, rows) = sink.finish_or_create()?;

    info!(
        "Export complete: {} rows written to {} ({} pages, {} status checks)",
        rows,
        path.display(),
        summary.pages,
        summary.status_checks
    );

    Ok(ExportOutcome {
        path,
        rows,
        summary,
    })
}
