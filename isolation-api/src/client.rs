//! Core reporting API client implementation.
//!
//! This module owns the HTTP client, builds request URLs from query parameters
//! and decodes every response into a [`JobStatus`].

use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use reqwest::header::ACCEPT;
use secrecy::ExposeSecret;
use url::Url;

use crate::json_validator::{MAX_JSON_DEPTH, parse_bounded};
use crate::usage::JobStatus;
use crate::{IsolationConfig, IsolationError};

/// Longest response body kept in an `HttpStatus` error
const MAX_ERROR_BODY_LEN: usize = 512;

/// Placeholder written in place of the API key in logged URLs
const REDACTED: &str = "[REDACTED]";

/// Core reporting API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct IsolationClient {
    config: IsolationConfig,
    client: Client,
}

impl IsolationClient {
    /// Create a new reporting API client.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError::InvalidConfig` for an unusable base or proxy URL,
    /// or `IsolationError::Transport` if the HTTP client cannot be built.
    pub fn new(config: IsolationConfig) -> Result<Self, IsolationError> {
        Url::parse(&config.base_url).map_err(|e| {
            IsolationError::InvalidConfig(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;

        let mut client_builder = Client::builder();

        // Use the certificate validation setting from config
        if !config.validate_certificates {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        client_builder = client_builder
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout));

        if let Some(proxy_url) = &config.proxy_url {
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| IsolationError::InvalidConfig(format!("Invalid proxy URL: {e}")))?;

            // Add basic authentication if credentials are provided
            if let (Some(username), Some(password)) =
                (&config.proxy_username, &config.proxy_password)
            {
                proxy = proxy.basic_auth(username.expose_secret(), password.expose_secret());
            }

            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(IsolationError::Transport)?;
        Ok(Self { config, client })
    }

    /// Get access to the configuration
    #[must_use]
    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    /// Build the request URL for the given query parameters.
    ///
    /// Values are percent-encoded; parameters keep the order given.
    #[must_use]
    pub fn build_url(&self, query_params: &[(&str, &str)]) -> String {
        let estimated_capacity = self
            .config
            .base_url
            .len()
            .saturating_add(query_params.len().saturating_mul(32));

        let mut url = String::with_capacity(estimated_capacity);
        url.push_str(&self.config.base_url);

        let mut separator = if self.config.base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        for (key, value) in query_params {
            url.push(separator);
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }

        url
    }

    /// Issue a GET against the usage-data endpoint and decode the job status.
    ///
    /// # Errors
    ///
    /// - `Transport` when no response arrives or the body cannot be read
    /// - `HttpStatus` for a non-success status code
    /// - `Decode` when the body is not JSON or nests too deeply
    /// - `UnexpectedSchema` when the JSON is not a job status object
    pub async fn get_job_status(
        &self,
        query_params: &[(&str, &str)],
    ) -> Result<JobStatus, IsolationError> {
        let url = self.build_url(query_params);
        debug!("GET {}", redact_url(&url));

        let response = self.client.get(&url).header(ACCEPT, "*/*").send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            warn!("Reporting API returned HTTP {} for {}", status, redact_url(&url));
            return Err(IsolationError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&response_text),
            });
        }

        decode_job_status(&response_text)
    }
}

/// Decode a response body into a [`JobStatus`].
///
/// # Errors
///
/// `Decode` for malformed or over-nested JSON, `UnexpectedSchema` when the JSON
/// is not an object or a known field has the wrong type.
pub(crate) fn decode_job_status(body: &str) -> Result<JobStatus, IsolationError> {
    let value = parse_bounded(body, MAX_JSON_DEPTH).map_err(IsolationError::Decode)?;

    if !value.is_object() {
        return Err(IsolationError::UnexpectedSchema(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| IsolationError::UnexpectedSchema(e.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    format!("{}...", &body[..end])
}

/// Replace the `key` query parameter of a URL so it can be logged.
///
/// Strings that do not parse as URLs are returned with everything after the
/// first `?` removed.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.split('?').next().unwrap_or_default().to_string();
    };

    if parsed.query().is_none() {
        return parsed.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            if k == "key" {
                (k.into_owned(), REDACTED.to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
