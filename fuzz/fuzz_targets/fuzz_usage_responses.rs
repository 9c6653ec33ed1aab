#![no_main]

use isolation_api::json_validator::{MAX_JSON_DEPTH, parse_bounded};
use isolation_api::{JobStatus, redact_url};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        // Depth-bounded parse, then the job status shape every call returns
        if let Ok(value) = parse_bounded(body, MAX_JSON_DEPTH)
            && let Ok(mut status) = serde_json::from_value::<JobStatus>(value)
        {
            let _ = status.is_completed();
            let _ = status.next_token();
            for record in status.take_records() {
                let _ = record.to_row();
            }
        }

        // Redaction must never panic, whatever the URL looks like
        let _ = redact_url(body);
        let _ = redact_url(&format!("https://urlisolation.com/api?key={body}&pageSize=10"));
    }
});
