#![no_main]

use chrono::NaiveDate;
use isolation_logs::credentials::validate_api_key;
use isolation_logs::datetime::{parse_date, validate_date_range};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_api_key(s);
        let _ = parse_date(s, "fuzz");

        // Split the input into a start and an end date
        let mid = data.len() / 2;
        if mid > 0
            && let (Ok(start), Ok(end)) = (
                std::str::from_utf8(&data[..mid]),
                std::str::from_utf8(&data[mid..]),
            )
            && let Some(today) = NaiveDate::from_ymd_opt(2022, 2, 10)
        {
            let _ = validate_date_range(start, end, today);
        }
    }
});
