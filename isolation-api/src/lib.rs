//! # Isolation Reporting API Client Library
//!
//! A Rust client for the URL isolation service's reporting API. The reporting API
//! exposes usage logs through asynchronous export jobs: a job is requested for a
//! date range, its status is polled until it completes, and the results are then
//! walked page by page through an opaque continuation token.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use isolation_api::{ExportRequest, IsolationClient, IsolationConfig, LogRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IsolationClient::new(IsolationConfig::new())?;
//!
//!     let request = ExportRequest::new(
//!         "your_api_key",
//!         NaiveDate::from_ymd_opt(2022, 1, 20).ok_or("bad date")?,
//!         NaiveDate::from_ymd_opt(2022, 2, 7).ok_or("bad date")?,
//!     );
//!
//!     // Any `RecordSink` works; a Vec simply collects the records in memory
//!     let mut records: Vec<LogRecord> = Vec::new();
//!     let summary = client.usage_api().export(&request, &mut records).await?;
//!     println!("{} records across {} pages", summary.records, summary.pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Every network, decoding and schema problem surfaces as an [`IsolationError`].
//! Polling and pagination are bounded by [`IsolationConfig::max_poll_attempts`] and
//! [`IsolationConfig::max_pages`], so a job that never completes or a server that
//! never stops handing out tokens ends the run with a typed error instead of
//! looping forever.

pub mod client;
pub mod json_validator;
pub mod usage;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};

// Re-export common types for convenience
pub use client::{IsolationClient, redact_url};
pub use usage::{
    CompletedJob, ExportSummary, JobState, JobStatus, LogRecord, PageCursor, RecordSink, UsageApi,
    write_records,
};

/// Default reporting endpoint for usage-data export jobs
pub const DEFAULT_BASE_URL: &str = "https://urlisolation.com/api/reporting/usage-data";

/// Largest page size the reporting API accepts
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Error type for reporting API operations
#[derive(Debug, thiserror::Error)]
#[must_use = "Need to handle all error enum types."]
pub enum IsolationError {
    /// The request never produced a response (connection, TLS, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success HTTP status
    #[error("HTTP {status} from reporting API: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The response body was not acceptable JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The response was JSON but not shaped like a job status
    #[error("Unexpected response schema: {0}")]
    UnexpectedSchema(String),

    /// The export job reported a terminal failure
    #[error("Export job {job_id} ended with status {status}")]
    JobFailed {
        /// Job identifier
        job_id: String,
        /// Status reported by the API
        status: String,
    },

    /// The job did not complete within the allowed number of status checks
    #[error("Export job {job_id} not completed after {attempts} status checks")]
    PollTimeout {
        /// Job identifier
        job_id: String,
        /// Status checks performed after submission
        attempts: u32,
    },

    /// Pagination did not terminate within the allowed number of page fetches
    #[error("Pagination still returning tokens after {pages} page fetches")]
    PageLimit {
        /// Page fetches performed
        pages: u32,
    },

    /// Configuration or request parameters are invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing records to the sink failed
    #[error("Failed to write records: {0}")]
    Sink(#[from] std::io::Error),
}

/// Configuration for the reporting API client.
///
/// Holds the endpoint, transport settings and the bounds applied to the
/// polling and pagination loops. The API key is not part of the configuration;
/// it travels with each [`ExportRequest`].
#[derive(Clone)]
pub struct IsolationConfig {
    /// Usage-data endpoint (query parameters are appended to it)
    pub base_url: String,
    /// Whether to validate TLS certificates (default: true)
    pub validate_certificates: bool,
    /// HTTP connection timeout in seconds
    pub connect_timeout: u64,
    /// HTTP request timeout in seconds
    pub request_timeout: u64,
    /// Optional HTTP/HTTPS proxy URL
    pub proxy_url: Option<String>,
    /// Optional proxy username
    pub proxy_username: Option<Arc<SecretString>>,
    /// Optional proxy password
    pub proxy_password: Option<Arc<SecretString>>,
    /// Fixed delay between job status checks
    pub poll_interval: Duration,
    /// Maximum number of status checks after submission
    pub max_poll_attempts: u32,
    /// Maximum number of continuation pages fetched after the first page
    pub max_pages: u32,
}

impl IsolationConfig {
    /// Create a configuration pointing at the public reporting endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            validate_certificates: true, // Default to secure
            connect_timeout: 30,
            request_timeout: 300,
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            poll_interval: Duration::from_secs(60),
            max_poll_attempts: 120,
            max_pages: 10_000,
        }
    }

    /// Override the usage-data endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Disable certificate validation.
    ///
    /// The isolation reporting endpoint is commonly reached through
    /// TLS-intercepting gateways, which is why the CLI turns this on by default.
    #[must_use]
    pub fn with_certificate_validation_disabled(mut self) -> Self {
        self.validate_certificates = false;
        self
    }

    /// Set connect and request timeouts in seconds.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: u64, request_timeout: u64) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }

    /// Route requests through a proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Basic-auth credentials for the proxy.
    #[must_use]
    pub fn with_proxy_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let username: String = username.into();
        let password: String = password.into();
        self.proxy_username = Some(Arc::new(SecretString::new(username.into())));
        self.proxy_password = Some(Arc::new(SecretString::new(password.into())));
        self
    }

    /// Set the fixed delay between job status checks.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the maximum number of status checks after submission.
    #[must_use]
    pub fn with_max_poll_attempts(mut self, max_poll_attempts: u32) -> Self {
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    /// Set the maximum number of continuation pages.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IsolationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationConfig")
            .field("base_url", &self.base_url)
            .field("validate_certificates", &self.validate_certificates)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("proxy_url", &self.proxy_url)
            .field(
                "proxy_username",
                &self.proxy_username.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "proxy_password",
                &self.proxy_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// Parameters of a usage-data export job.
///
/// Built once from user input and never mutated afterwards.
#[derive(Clone)]
pub struct ExportRequest {
    api_key: Arc<SecretString>,
    /// Records per result page
    pub page_size: u32,
    /// First day of the export range (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the export range (inclusive)
    pub end_date: NaiveDate,
}

impl ExportRequest {
    /// Create a request with the maximum page size.
    #[must_use]
    pub fn new(api_key: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let api_key: String = api_key.into();
        Self::from_arc_key(Arc::new(SecretString::new(api_key.into())), start_date, end_date)
    }

    /// Create a request from an already-shared secret key.
    #[must_use]
    pub fn from_arc_key(api_key: Arc<SecretString>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            api_key,
            page_size: MAX_PAGE_SIZE,
            start_date,
            end_date,
        }
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check the request before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError::InvalidConfig` for an empty key, a page size
    /// outside `1..=MAX_PAGE_SIZE`, or a start date after the end date.
    pub fn validate(&self) -> Result<(), IsolationError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(IsolationError::InvalidConfig(
                "API key cannot be empty".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(IsolationError::InvalidConfig(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE} (got {})",
                self.page_size
            )));
        }
        if self.start_date > self.end_date {
            return Err(IsolationError::InvalidConfig(format!(
                "Start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    /// Query parameters of the job-submission call, in wire order.
    pub(crate) fn submission_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.api_key.expose_secret().to_string()),
            ("pageSize", self.page_size.to_string()),
            ("from", self.start_date.format("%Y-%m-%d").to_string()),
            ("to", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

impl fmt::Debug for ExportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRequest")
            .field("api_key", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .finish()
    }
}

impl IsolationClient {
    /// Get a usage-data API instance.
    #[must_use]
    pub fn usage_api(&self) -> UsageApi {
        UsageApi::new(self.clone())
    }
}
