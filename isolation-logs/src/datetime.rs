//! Date validation and run timestamps for usage-log exports
use crate::error::{ExportError, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, warn};

/// Date format accepted on the command line and sent to the API
const FORMAT_DATE: &str = "%Y-%m-%d";

/// Timestamp format embedded in output file names
const FORMAT_RUN_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// The reporting service only keeps the most recent 30 days of usage data
pub const RETENTION_DAYS: i64 = 30;

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `ExportError::InvalidDate` if the value is empty or not a valid
/// calendar date in that format.
///
/// # Examples
///
/// ```
/// use isolation_logs::datetime::parse_date;
///
/// let date = parse_date("2022-01-20", "Start date").unwrap();
/// assert_eq!(date.to_string(), "2022-01-20");
///
/// assert!(parse_date("20/01/2022", "Start date").is_err());
/// ```
pub fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ExportError::InvalidDate(format!(
            "{field_name} cannot be empty"
        )));
    }

    NaiveDate::parse_from_str(trimmed, FORMAT_DATE).map_err(|_| {
        ExportError::InvalidDate(format!(
            "{field_name} '{trimmed}' is not a valid date. Expected: YYYY-MM-DD"
        ))
    })
}

/// Whether `start` lies further back than the service retains data.
#[must_use]
pub fn exceeds_retention(start: NaiveDate, today: NaiveDate) -> bool {
    today.signed_duration_since(start).num_days() > RETENTION_DAYS
}

/// Validate an export date range.
///
/// Both dates are inclusive, so `start == end` exports a single day. Ranges
/// reaching past the retention window or into the future are allowed but
/// logged, since the service simply returns no records for those days.
///
/// # Errors
///
/// Returns `InvalidDate` for a malformed date and `DateRangeInvalid` when the
/// start date is after the end date.
pub fn validate_date_range(
    start: &str,
    end: &str,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let start_date = parse_date(start, "Start date")?;
    let end_date = parse_date(end, "End date")?;

    if start_date > end_date {
        return Err(ExportError::DateRangeInvalid(format!(
            "Start date must not be after end date: start='{}', end='{}'",
            start_date, end_date
        )));
    }

    if exceeds_retention(start_date, today) {
        warn!(
            "Start date {} is more than {} days ago; the service only keeps the last {} days of usage data",
            start_date, RETENTION_DAYS, RETENTION_DAYS
        );
    }

    if end_date > today {
        warn!("End date {} is in the future", end_date);
    }

    debug!("Validated date range {} to {}", start_date, end_date);
    Ok((start_date, end_date))
}

/// Format a run timestamp as `YYYYMMDD-HHMMSS`.
#[must_use]
pub fn format_run_timestamp(at: NaiveDateTime) -> String {
    at.format(FORMAT_RUN_TIMESTAMP).to_string()
}

/// Current local time formatted as a run timestamp
#[must_use]
pub fn run_timestamp_now() -> String {
    format_run_timestamp(Local::now().naive_local())
}

/// Today's date in the local timezone
#[must_use]
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}
