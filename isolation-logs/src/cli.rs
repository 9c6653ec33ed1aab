//! CLI argument parsing and interactive prompts for isolation-logs
use std::fmt;
use std::io::{self, BufRead, Write};

use clap::Parser;
use isolation_api::{DEFAULT_BASE_URL, MAX_PAGE_SIZE};

/// Prompt shown when no API key was supplied
pub const PROMPT_API_KEY: &str = "Enter Isolation API Key: ";
/// Prompt shown when no start date was supplied
pub const PROMPT_START_DATE: &str = "Enter Log Start Date (yyyy-mm-dd): ";
/// Prompt shown when no end date was supplied
pub const PROMPT_END_DATE: &str = "Enter Log End Date (yyyy-mm-dd): ";

#[derive(Parser)]
#[command(
    name = "isolation-logs",
    version,
    about = "URL isolation usage log exporter",
    long_about = "Export URL isolation usage logs for a date range to a timestamped CSV file using the reporting API",
    after_help = "SERVICE BEHAVIOR:

  • Exports run as server-side jobs; the tool checks job status once per poll interval
  • Only the last 30 days of usage data are available
  • Reporting data is refreshed every 30 minutes
  • Each result page holds at most 10000 records

Any of --api-key, --start or --end that is not supplied is prompted for on stdin.

EXAMPLES:
  # Prompt for everything
  isolation-logs

  # Non-interactive run
  ISOLATION_API_KEY=... isolation-logs --start 2022-01-20 --end 2022-02-07 --output-dir ./exports"
)]
pub struct Cli {
    /// Isolation API key (prompted for if not supplied)
    #[arg(long, env = "ISOLATION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// First day to export (inclusive). Format: YYYY-MM-DD
    #[arg(short, long, value_parser = validate_date)]
    pub start: Option<String>,

    /// Last day to export (inclusive). Format: YYYY-MM-DD
    #[arg(short, long, value_parser = validate_date)]
    pub end: Option<String>,

    /// Records per result page (1-10000)
    #[arg(long, default_value_t = MAX_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub page_size: u32,

    /// Usage-data endpoint of the reporting API
    #[arg(long, default_value = DEFAULT_BASE_URL, value_parser = validate_base_url)]
    pub base_url: String,

    /// Directory the CSV file is written to (created if missing)
    #[arg(short, long, default_value = ".", value_parser = validate_directory)]
    pub output_dir: String,

    /// Seconds to wait between job status checks
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Give up after this many status checks
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_polls: u32,

    /// Give up after this many continuation pages
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,

    /// Validate TLS certificates (disabled by default)
    #[arg(long)]
    pub validate_certificates: bool,

    /// HTTP/HTTPS proxy URL
    #[arg(long, env = "HTTPS_PROXY")]
    pub proxy_url: Option<String>,

    /// Proxy username
    #[arg(long, env = "PROXY_USERNAME")]
    pub proxy_username: Option<String>,

    /// Proxy password
    #[arg(long, env = "PROXY_PASSWORD", hide_env_values = true)]
    pub proxy_password: Option<String>,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("start", &self.start)
            .field("end", &self.end)
            .field("page_size", &self.page_size)
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .field("max_pages", &self.max_pages)
            .field("validate_certificates", &self.validate_certificates)
            .field("proxy_url", &self.proxy_url)
            .field("proxy_username", &self.proxy_username)
            .field(
                "proxy_password",
                &self.proxy_password.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Write `prompt` to `output` and read one line of input.
///
/// The trailing line ending is stripped; other whitespace is left for the
/// caller's validation.
///
/// # Errors
///
/// Returns an I/O error if writing the prompt or reading fails, and
/// `UnexpectedEof` if the input is closed before a line arrives.
pub fn prompt_for<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<String> {
    output.write_all(prompt.as_bytes())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("input closed before answering '{}'", prompt.trim_end()),
        ));
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Use `value` if present, otherwise prompt for it.
///
/// # Errors
///
/// Propagates prompt I/O errors.
pub fn value_or_prompt<R: BufRead, W: Write>(
    value: Option<String>,
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt_for(prompt, input, output),
    }
}

/// Validate date format (YYYY-MM-DD)
fn validate_date(s: &str) -> Result<String, String> {
    crate::datetime::parse_date(s, "Date")
        .map(|_| s.trim().to_string())
        .map_err(|e| e.to_string())
}

/// Validate the endpoint URL scheme
fn validate_base_url(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(format!(
            "Base URL '{}' must start with http:// or https://",
            trimmed
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate the output directory: an existing path must be a writable directory
fn validate_directory(s: &str) -> Result<String, String> {
    use std::fs;
    use std::path::Path;

    if s.trim().is_empty() {
        return Err("Output directory cannot be empty".to_string());
    }

    let path = Path::new(s);
    if !path.exists() {
        // Created right before the file is written
        return Ok(s.to_string());
    }

    if !path.is_dir() {
        return Err(format!("Path '{}' exists but is not a directory", s));
    }

    let metadata =
        fs::metadata(path).map_err(|e| format!("Cannot access directory '{}': {}", s, e))?;
    if metadata.permissions().readonly() {
        return Err(format!(
            "Directory '{}' is read-only (permission denied)",
            s
        ));
    }

    Ok(s.to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["isolation-logs", "--api-key", "abc123"]).expect("parse");

        assert_eq!(cli.api_key.as_deref(), Some("abc123"));
        assert!(cli.start.is_none());
        assert!(cli.end.is_none());
        assert_eq!(cli.page_size, 10_000);
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.output_dir, ".");
        assert_eq!(cli.poll_interval, 60);
        assert_eq!(cli.max_polls, 120);
        assert_eq!(cli.max_pages, 10_000);
        assert!(!cli.validate_certificates);
    }

    #[test]
    fn test_cli_all_options() {
        let temp_dir = TempDir::new().expect("temp dir");
        let dir = temp_dir.path().to_str().expect("utf-8 path");

        let cli = Cli::try_parse_from([
            "isolation-logs",
            "--api-key",
            "abc123",
            "--start",
            "2022-01-20",
            "--end",
            "2022-02-07",
            "--page-size",
            "500",
            "--base-url",
            "http://localhost:8080/usage",
            "--output-dir",
            dir,
            "--poll-interval",
            "5",
            "--max-polls",
            "3",
            "--max-pages",
            "9",
            "--validate-certificates",
        ])
        .expect("parse");

        assert_eq!(cli.start.as_deref(), Some("2022-01-20"));
        assert_eq!(cli.end.as_deref(), Some("2022-02-07"));
        assert_eq!(cli.page_size, 500);
        assert_eq!(cli.base_url, "http://localhost:8080/usage");
        assert_eq!(cli.output_dir, dir);
        assert_eq!(cli.poll_interval, 5);
        assert_eq!(cli.max_polls, 3);
        assert_eq!(cli.max_pages, 9);
        assert!(cli.validate_certificates);
    }

    #[test]
    fn test_cli_rejects_page_size_out_of_range() {
        assert!(Cli::try_parse_from(["isolation-logs", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["isolation-logs", "--page-size", "10001"]).is_err());
        assert!(Cli::try_parse_from(["isolation-logs", "--page-size", "10000"]).is_ok());
    }

    #[test]
    fn test_cli_rejects_bad_dates() {
        assert!(Cli::try_parse_from(["isolation-logs", "--start", "2022/01/20"]).is_err());
        assert!(Cli::try_parse_from(["isolation-logs", "--end", "yesterday"]).is_err());
    }

    #[test]
    fn test_cli_rejects_zero_poll_interval() {
        assert!(Cli::try_parse_from(["isolation-logs", "--poll-interval", "0"]).is_err());
    }

    #[test]
    fn test_cli_debug_redacts_secrets() {
        let cli = Cli::try_parse_from([
            "isolation-logs",
            "--api-key",
            "topsecretkey",
            "--proxy-password",
            "hunter2",
        ])
        .expect("parse");
        let debug = format!("{cli:?}");

        assert!(!debug.contains("topsecretkey"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://urlisolation.com/api/reporting/usage-data").is_ok());
        assert!(validate_base_url("http://127.0.0.1:9000").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("urlisolation.com").is_err());
    }

    #[test]
    fn test_validate_directory_existing() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().to_str().expect("utf-8 path");
        assert_eq!(validate_directory(path).expect("valid"), path);
    }

    #[test]
    fn test_validate_directory_missing_is_allowed() {
        let temp_dir = TempDir::new().expect("temp dir");
        let new_dir = temp_dir.path().join("exports").join("2022");
        let path = new_dir.to_str().expect("utf-8 path");
        assert!(validate_directory(path).is_ok());
    }

    #[test]
    fn test_validate_directory_path_is_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let file_path = temp_dir.path().join("not_a_dir.csv");
        fs::write(&file_path, "userId\r\n").expect("write");

        let err = validate_directory(file_path.to_str().expect("utf-8 path"))
            .expect_err("file is not a directory");
        assert!(err.contains("exists but is not a directory"));
    }

    #[test]
    fn test_prompt_for_reads_line_and_writes_prompt() {
        let mut input = Cursor::new("2022-01-20\r\n");
        let mut output = Vec::new();

        let value = prompt_for(PROMPT_START_DATE, &mut input, &mut output).expect("prompt");

        assert_eq!(value, "2022-01-20");
        assert_eq!(
            String::from_utf8(output).expect("utf-8"),
            "Enter Log Start Date (yyyy-mm-dd): "
        );
    }

    #[test]
    fn test_prompt_for_eof() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();

        let err = prompt_for(PROMPT_API_KEY, &mut input, &mut output).expect_err("no input");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_value_or_prompt_only_prompts_when_missing() {
        let mut input = Cursor::new("abc123\n2022-01-20\n");
        let mut output = Vec::new();

        let key = value_or_prompt(None, PROMPT_API_KEY, &mut input, &mut output).expect("key");
        let end = value_or_prompt(
            Some("2022-02-07".to_string()),
            PROMPT_END_DATE,
            &mut input,
            &mut output,
        )
        .expect("end");
        let start =
            value_or_prompt(None, PROMPT_START_DATE, &mut input, &mut output).expect("start");

        assert_eq!(key, "abc123");
        assert_eq!(start, "2022-01-20");
        assert_eq!(end, "2022-02-07");

        let shown = String::from_utf8(output).expect("utf-8");
        assert!(shown.contains(PROMPT_API_KEY));
        assert!(shown.contains(PROMPT_START_DATE));
        assert!(!shown.contains(PROMPT_END_DATE));
    }
}
