//! API key handling and reporting client configuration
use std::sync::Arc;
use std::time::Duration;

use isolation_api::IsolationConfig;
use log::{debug, warn};
use secrecy::SecretString;

use crate::cli::Cli;
use crate::error::{ExportError, Result};

/// Validate an isolation API key.
///
/// Keys are opaque tokens sent as a query parameter, so the only hard
/// requirements are that the key is present and contains no whitespace or
/// control characters.
pub fn validate_api_key(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("API key cannot be empty".to_string());
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("API key must not contain whitespace or control characters".to_string());
    }

    Ok(())
}

/// Validate a raw API key and move it into a shared secret.
///
/// # Errors
///
/// Returns `ExportError::InvalidCredentials` if validation fails.
pub fn secure_api_key(raw: &str) -> Result<Arc<SecretString>> {
    // Surrounding whitespace typically comes from pasting into the prompt
    let trimmed = raw.trim();
    validate_api_key(trimmed).map_err(ExportError::InvalidCredentials)?;

    let key = trimmed.to_string();
    Ok(Arc::new(SecretString::new(key.into())))
}

/// Build the reporting client configuration from command-line arguments.
pub fn create_isolation_config(args: &Cli) -> IsolationConfig {
    let mut config = IsolationConfig::new()
        .with_base_url(args.base_url.as_str())
        .with_poll_interval(Duration::from_secs(args.poll_interval))
        .with_max_poll_attempts(args.max_polls)
        .with_max_pages(args.max_pages);

    if args.validate_certificates {
        debug!("TLS certificate validation enabled");
    } else {
        config = config.with_certificate_validation_disabled();
        warn!("Certificate validation disabled for the reporting API; pass --validate-certificates to enable it");
    }

    if let Some(url) = args.proxy_url.as_deref().filter(|u| !u.trim().is_empty()) {
        debug!("Routing reporting API requests through proxy");
        config = config.with_proxy(url);

        match (&args.proxy_username, &args.proxy_password) {
            (Some(u), Some(p)) => {
                debug!("Proxy authentication credentials supplied");
                config = config.with_proxy_auth(u.as_str(), p.as_str());
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("Proxy authentication needs both a username and a password, ignoring the one supplied");
            }
            (None, None) => {}
        }
    }

    config
}
