//! End-to-end export runs against a mock reporting API, checking the CSV on disk

use std::fs;
use std::time::Duration;

use chrono::NaiveDate;
use isolation_api::{ExportRequest, IsolationClient, IsolationConfig};
use isolation_logs::{ExportError, run_export};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USAGE_PATH: &str = "/api/reporting/usage-data";
const HEADER: &str = "userId,userName,url,date,region,zone,classification,disposition,categories";
const RUN_TIMESTAMP: &str = "20220207-120000";

fn client_for(server: &MockServer) -> IsolationClient {
    let config = IsolationConfig::new()
        .with_base_url(format!("{}{}", server.uri(), USAGE_PATH))
        .with_poll_interval(Duration::from_millis(5))
        .with_max_poll_attempts(5)
        .with_max_pages(5);
    IsolationClient::new(config).expect("client")
}

fn request() -> ExportRequest {
    ExportRequest::new(
        "test-key",
        NaiveDate::from_ymd_opt(2022, 1, 20).expect("date"),
        NaiveDate::from_ymd_opt(2022, 2, 7).expect("date"),
    )
}

fn csv_lines(contents: &str) -> Vec<&str> {
    contents.split("\r\n").filter(|l| !l.is_empty()).collect()
}

#[tokio::test]
async fn test_single_page_export_writes_header_and_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "data": [{"userId": "u1", "url": "http://x", "sessionId": "dropped"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let output_dir = temp_dir.path().join("out");
    let outcome = run_export(
        &client_for(&server),
        &request(),
        output_dir.to_str().expect("utf-8 path"),
        RUN_TIMESTAMP,
    )
    .await
    .expect("export");

    assert_eq!(
        outcome.path,
        output_dir.join("Isolation_Logs_20220207-120000.csv")
    );
    assert_eq!(outcome.rows, 1);
    assert_eq!(outcome.summary.sleeps, 0);

    let contents = fs::read_to_string(&outcome.path).expect("read csv");
    assert_eq!(csv_lines(&contents), vec![HEADER, "u1,,http://x,,,,,,"]);
}

#[tokio::test]
async fn test_polled_and_paged_export_writes_rows_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .and(query_param("pageToken", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"userId": "u2", "categories": ["News"]}],
            "pageToken": "tok2"
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .and(query_param("pageToken", "tok2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"userId": "u3", "userName": "Smith, J"}]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .and(query_param("jobId", "job-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "jobId": "job-9",
            "total": 3,
            "data": [{"userId": "u1"}],
            "pageToken": "tok1"
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "RUNNING",
            "jobId": "job-9"
        })))
        .with_priority(3)
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let outcome = run_export(
        &client_for(&server),
        &request(),
        temp_dir.path().to_str().expect("utf-8 path"),
        RUN_TIMESTAMP,
    )
    .await
    .expect("export");

    assert_eq!(outcome.rows, 3);
    assert_eq!(outcome.summary.pages, 3);
    assert_eq!(outcome.summary.sleeps, 1);

    let contents = fs::read_to_string(&outcome.path).expect("read csv");
    assert_eq!(
        csv_lines(&contents),
        vec![
            HEADER,
            "u1,,,,,,,,",
            r#"u2,,,,,,,,"[""News""]""#,
            r#"u3,"Smith, J",,,,,,,"#,
        ]
    );
}

#[tokio::test]
async fn test_failed_job_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILED",
            "jobId": "job-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let err = run_export(
        &client_for(&server),
        &request(),
        temp_dir.path().to_str().expect("utf-8 path"),
        RUN_TIMESTAMP,
    )
    .await
    .expect_err("failed job");

    assert!(matches!(err, ExportError::Api(_)));
    assert_eq!(fs::read_dir(temp_dir.path()).expect("read dir").count(), 0);
}

#[tokio::test]
async fn test_page_failure_keeps_written_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .and(query_param("pageToken", "tok1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "jobId": "job-1",
            "data": [{"userId": "u1"}],
            "pageToken": "tok1"
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let err = run_export(
        &client_for(&server),
        &request(),
        temp_dir.path().to_str().expect("utf-8 path"),
        RUN_TIMESTAMP,
    )
    .await
    .expect_err("page fetch fails");

    // The API error is reported, not a later file problem
    assert!(matches!(err, ExportError::Api(_)));
    assert!(err.to_string().contains("500"));

    let partial = temp_dir.path().join("Isolation_Logs_20220207-120000.csv");
    let contents = fs::read_to_string(partial).expect("partial file exists");
    assert_eq!(csv_lines(&contents), vec![HEADER, "u1,,,,,,,,"]);
}
