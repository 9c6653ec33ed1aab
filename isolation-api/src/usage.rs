//! Usage-data export jobs
//!
//! This module drives the reporting API's three-step export flow: submit a job,
//! poll its status until it completes, then walk the result pages through the
//! continuation token while streaming each page into a [`RecordSink`].
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{ExportRequest, IsolationClient, IsolationError};

/// Job status values reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Job accepted but not started
    Pending,
    /// Job waiting for a worker
    Queued,
    /// Job is being processed
    Running,
    /// Results are ready
    Completed,
    /// Job generation failed
    Failed,
    /// Any status this client does not know about
    #[serde(other)]
    Unknown,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One usage-data response.
///
/// Every field is optional: the submission call, each status check and each
/// page fetch all return this shape with whatever subset the API chose to send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job identifier
    pub job_id: Option<String>,
    /// Job status
    pub status: Option<JobState>,
    /// Continuation token for the next page
    pub page_token: Option<String>,
    /// Records carried by this response
    pub data: Option<Vec<LogRecord>>,
    /// Total number of records in the export
    #[serde(default, deserialize_with = "lenient_total")]
    pub total: Option<u64>,
}

/// Accept integral numbers and numeric strings for `total`.
///
/// The total is informational only, so any other value is logged and
/// treated as absent rather than failing the response.
fn lenient_total<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let total = match &value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(integral_f64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };

    if total.is_none()
        && let Some(raw) = value
    {
        warn!("Ignoring unusable total in response: {}", raw);
    }
    Ok(total)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integral_f64(f: f64) -> Option<u64> {
    // 2^64 itself is not representable as u64
    (f.fract() == 0.0 && f >= 0.0 && f < 18_446_744_073_709_551_616.0).then_some(f as u64)
}

impl JobStatus {
    /// Whether the job reported `COMPLETED`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == Some(JobState::Completed)
    }

    /// The continuation token, if one is present and non-empty.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.page_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Take the records out of the response, logging when none were sent.
    pub fn take_records(&mut self) -> Vec<LogRecord> {
        match self.data.take() {
            Some(records) => records,
            None => {
                warn!("No data field in response, treating page as empty");
                Vec::new()
            }
        }
    }
}

/// A single usage log entry.
///
/// Only the fixed fields below are kept; anything else the API sends is
/// dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub user_id: Option<Value>,
    pub user_name: Option<Value>,
    pub url: Option<Value>,
    pub date: Option<Value>,
    pub region: Option<Value>,
    pub zone: Option<Value>,
    pub classification: Option<Value>,
    pub disposition: Option<Value>,
    pub categories: Option<Value>,
}

impl LogRecord {
    /// Output column names, in output order
    pub const FIELD_NAMES: [&'static str; 9] = [
        "userId",
        "userName",
        "url",
        "date",
        "region",
        "zone",
        "classification",
        "disposition",
        "categories",
    ];

    /// Render the record as one output row in [`Self::FIELD_NAMES`] order.
    #[must_use]
    pub fn to_row(&self) -> [String; 9] {
        [
            render_cell(self.user_id.as_ref()),
            render_cell(self.user_name.as_ref()),
            render_cell(self.url.as_ref()),
            render_cell(self.date.as_ref()),
            render_cell(self.region.as_ref()),
            render_cell(self.zone.as_ref()),
            render_cell(self.classification.as_ref()),
            render_cell(self.disposition.as_ref()),
            render_cell(self.categories.as_ref()),
        ]
    }
}

/// Strings verbatim, absent/null empty, other scalars as literals, containers as compact JSON
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other @ (Value::Array(_) | Value::Object(_))) => other.to_string(),
    }
}

/// Destination for exported records.
pub trait RecordSink {
    /// Append records in the order given, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the records cannot be written.
    fn write_records(&mut self, records: &[LogRecord]) -> std::io::Result<usize>;
}

impl RecordSink for Vec<LogRecord> {
    fn write_records(&mut self, records: &[LogRecord]) -> std::io::Result<usize> {
        self.extend_from_slice(records);
        Ok(records.len())
    }
}

/// Write one batch of records to a sink.
///
/// # Errors
///
/// Returns `IsolationError::Sink` if the sink fails.
pub fn write_records<S: RecordSink + ?Sized>(
    records: &[LogRecord],
    sink: &mut S,
) -> Result<usize, IsolationError> {
    let written = sink.write_records(records)?;
    info!("{} logs written", written);
    Ok(written)
}

/// A job that has reached `COMPLETED`.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    /// Job identifier (from the submission or the completed response)
    pub job_id: Option<String>,
    /// The completed response, carrying the first page of records
    pub status: JobStatus,
    /// Status checks issued after submission
    pub status_checks: u32,
    /// Sleeps performed between status checks
    pub sleeps: u32,
}

/// Outcome of a finished export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Job identifier, if the API supplied one
    pub job_id: Option<String>,
    /// Status checks issued after submission
    pub status_checks: u32,
    /// Sleeps performed while waiting for completion
    pub sleeps: u32,
    /// Pages written, the completed response counting as the first
    pub pages: u32,
    /// Records written to the sink
    pub records: u64,
    /// Total the API reported, if any
    pub reported_total: Option<u64>,
}

/// Lazy walk over the continuation pages of a completed job.
///
/// Holds the only mutable state of pagination: the next token and the number
/// of pages fetched so far. Once a response arrives without a token the cursor
/// is exhausted and never issues another request.
///
/// A page that hands back the token it was fetched with is still returned;
/// the following call fails with `UnexpectedSchema`.
pub struct PageCursor<'a> {
    client: &'a IsolationClient,
    base_params: Vec<(&'static str, String)>,
    next_token: Option<String>,
    repeated_token: bool,
    pages_fetched: u32,
    max_pages: u32,
}

impl PageCursor<'_> {
    /// Whether another page will be requested.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_token.is_some() || self.repeated_token
    }

    /// Continuation pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetch the next page of records, or `None` once pagination is over.
    ///
    /// # Errors
    ///
    /// Returns any client error, `PageLimit` when `max_pages` pages have
    /// already been fetched, or `UnexpectedSchema` once the previous page
    /// handed back the token it was fetched with.
    pub async fn next_page(&mut self) -> Result<Option<Vec<LogRecord>>, IsolationError> {
        if self.repeated_token {
            self.repeated_token = false;
            return Err(IsolationError::UnexpectedSchema(format!(
                "page {} returned its own continuation token again",
                self.pages_fetched
            )));
        }

        let Some(token) = self.next_token.take() else {
            return Ok(None);
        };

        if self.pages_fetched >= self.max_pages {
            return Err(IsolationError::PageLimit {
                pages: self.pages_fetched,
            });
        }

        debug!("PageToken: {}", token);
        let mut params = self.base_params.clone();
        params.push(("pageToken", token.clone()));

        let mut page = self.client.get_job_status(&as_pairs(&params)).await?;
        self.pages_fetched = self.pages_fetched.saturating_add(1);

        match page.next_token() {
            Some(next) if next == token => {
                warn!("Page {} repeated its continuation token", self.pages_fetched);
                self.repeated_token = true;
            }
            Some(next) => self.next_token = Some(next.to_string()),
            None => info!("Page loop complete after {} pages", self.pages_fetched),
        }

        Ok(Some(page.take_records()))
    }
}

/// The usage-data API interface
#[derive(Clone)]
pub struct UsageApi {
    client: IsolationClient,
}

impl UsageApi {
    /// Create a new usage-data API instance
    #[must_use]
    pub fn new(client: IsolationClient) -> Self {
        Self { client }
    }

    /// Submit an export job (step 1 of the process).
    ///
    /// The API answers with the job id and its initial status; small exports
    /// may already be `COMPLETED` and carry their first page.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError` if the request or decoding fails
    pub async fn submit_job(&self, request: &ExportRequest) -> Result<JobStatus, IsolationError> {
        let params = request.submission_params();
        let status = self.client.get_job_status(&as_pairs(&params)).await?;

        info!(
            "Submitted export job {} (status: {})",
            status.job_id.as_deref().unwrap_or("<none>"),
            display_state(status.status.as_ref())
        );
        Ok(status)
    }

    /// Poll until the job completes (step 2 of the process).
    ///
    /// Starts from the submission response: a `COMPLETED` status is returned at
    /// once with no sleep. Otherwise the client sleeps the fixed poll interval
    /// before every status check. A response without a `status` field counts as
    /// not complete.
    ///
    /// # Errors
    ///
    /// - `JobFailed` when the API reports `FAILED`
    /// - `PollTimeout` after `max_poll_attempts` status checks
    /// - `UnexpectedSchema` if a status check is needed but no job id was issued
    /// - any client error from a status check
    pub async fn poll_until_complete(
        &self,
        request: &ExportRequest,
        submitted: JobStatus,
    ) -> Result<CompletedJob, IsolationError> {
        let config = self.client.config();
        let job_id = submitted.job_id.clone();
        let mut current = submitted;
        let mut status_checks: u32 = 0;
        let mut sleeps: u32 = 0;

        loop {
            let label = job_id.as_deref().unwrap_or("<none>");

            match current.status.clone() {
                Some(JobState::Completed) => {
                    info!("Job {} completed", label);
                    let job_id = job_id.or_else(|| current.job_id.clone());
                    return Ok(CompletedJob {
                        job_id,
                        status: current,
                        status_checks,
                        sleeps,
                    });
                }
                Some(JobState::Failed) => {
                    return Err(IsolationError::JobFailed {
                        job_id: label.to_string(),
                        status: JobState::Failed.to_string(),
                    });
                }
                Some(state) => debug!("Job {} status: {}", label, state),
                None => warn!("Job {} response has no status, treating as not complete", label),
            }

            if status_checks >= config.max_poll_attempts {
                return Err(IsolationError::PollTimeout {
                    job_id: label.to_string(),
                    attempts: status_checks,
                });
            }

            let Some(id) = job_id.as_deref() else {
                return Err(IsolationError::UnexpectedSchema(
                    "job submission response has no jobId to poll".to_string(),
                ));
            };

            info!(
                "Waiting... sleeping for {} seconds",
                config.poll_interval.as_secs_f64()
            );
            tokio::time::sleep(config.poll_interval).await;
            sleeps = sleeps.saturating_add(1);

            current = self.check_status(request, id).await?;
            status_checks = status_checks.saturating_add(1);

            info!(
                "Job {} status: {} (check {}/{})",
                id,
                display_state(current.status.as_ref()),
                status_checks,
                config.max_poll_attempts
            );
        }
    }

    /// Fetch the current status of a submitted job.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError` if the request or decoding fails
    pub async fn check_status(
        &self,
        request: &ExportRequest,
        job_id: &str,
    ) -> Result<JobStatus, IsolationError> {
        let params = job_params(request, job_id);
        self.client.get_job_status(&as_pairs(&params)).await
    }

    /// Start walking the continuation pages of a completed job (step 3).
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedSchema` if the job has a continuation token but no
    /// job id to address the pages with.
    pub fn paginate<'a>(
        &'a self,
        request: &ExportRequest,
        job: &CompletedJob,
    ) -> Result<PageCursor<'a>, IsolationError> {
        let next_token = job.status.next_token().map(str::to_string);

        let base_params = match (&job.job_id, &next_token) {
            (Some(id), _) => job_params(request, id),
            (None, None) => request.submission_params(),
            (None, Some(_)) => {
                return Err(IsolationError::UnexpectedSchema(
                    "completed job has a pageToken but no jobId".to_string(),
                ));
            }
        };

        if next_token.is_none() {
            info!("No page token, export fits in a single page");
        }

        Ok(PageCursor {
            client: &self.client,
            base_params,
            next_token,
            repeated_token: false,
            pages_fetched: 0,
            max_pages: self.client.config().max_pages,
        })
    }

    /// Run a complete export into `sink`: submit, poll, then write every page.
    ///
    /// # Errors
    ///
    /// Returns the first error from validation, any API call, or the sink.
    /// Records already written stay in the sink.
    pub async fn export<S: RecordSink + ?Sized>(
        &self,
        request: &ExportRequest,
        sink: &mut S,
    ) -> Result<ExportSummary, IsolationError> {
        request.validate()?;

        info!(
            "Requesting usage logs from {} to {}",
            request.start_date, request.end_date
        );
        let submitted = self.submit_job(request).await?;
        let mut job = self.poll_until_complete(request, submitted).await?;

        let reported_total = job.status.total;
        match reported_total {
            Some(total) => info!("Total Records: {}", total),
            None => warn!("Total not found in completed job response"),
        }

        let mut cursor = self.paginate(request, &job)?;

        let first_page = job.status.take_records();
        let mut records = write_records(&first_page, sink)? as u64;

        while let Some(batch) = cursor.next_page().await? {
            let written = write_records(&batch, sink)? as u64;
            records = records.saturating_add(written);
        }
        let pages = cursor.pages_fetched().saturating_add(1);

        if let Some(total) = reported_total
            && total != records
        {
            warn!(
                "API reported {} total records but {} were written",
                total, records
            );
        }

        info!("Export finished: {} records across {} pages", records, pages);

        Ok(ExportSummary {
            job_id: job.job_id,
            status_checks: job.status_checks,
            sleeps: job.sleeps,
            pages,
            records,
            reported_total,
        })
    }
}

/// Query parameters addressing an existing job
fn job_params(request: &ExportRequest, job_id: &str) -> Vec<(&'static str, String)> {
    let mut params = request.submission_params();
    params.push(("jobId", job_id.to_string()));
    params
}

fn as_pairs<'a>(params: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    params.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

fn display_state(state: Option<&JobState>) -> String {
    state.map_or_else(|| "<missing>".to_string(), ToString::to_string)
}
