//! isolation-logs - URL isolation usage log exporter
//!
//! CLI tool that exports usage logs for a date range to a timestamped CSV file
use std::io;
use std::process::ExitCode;

use clap::Parser;
use isolation_api::{ExportRequest, IsolationClient};
use isolation_logs::{Result, cli, credentials, datetime, export};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    // Output file name uses the start time of the run
    let run_timestamp = datetime::run_timestamp_now();
    info!("{} -- Starting isolation usage log export", run_timestamp);

    // Prompt for anything not given on the command line or in the environment
    let (raw_key, start, end) = {
        let mut input = io::stdin().lock();
        let mut output = io::stdout();
        (
            cli::value_or_prompt(args.api_key.clone(), cli::PROMPT_API_KEY, &mut input, &mut output)?,
            cli::value_or_prompt(args.start.clone(), cli::PROMPT_START_DATE, &mut input, &mut output)?,
            cli::value_or_prompt(args.end.clone(), cli::PROMPT_END_DATE, &mut input, &mut output)?,
        )
    };

    let api_key = credentials::secure_api_key(&raw_key)?;
    let (start_date, end_date) =
        datetime::validate_date_range(&start, &end, datetime::today_local())?;

    let request =
        ExportRequest::from_arc_key(api_key, start_date, end_date).with_page_size(args.page_size);

    let config = credentials::create_isolation_config(&args);
    let client = IsolationClient::new(config)?;

    info!("Running export");
    info!("  Start date: {}", start_date);
    info!("  End date: {}", end_date);
    info!("  Output directory: {}", args.output_dir);

    let outcome = export::run_export(&client, &request, &args.output_dir, &run_timestamp).await?;
    info!("Success! Usage logs saved to: {}", outcome.path.display());

    Ok(())
}
