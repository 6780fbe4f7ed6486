use std::path::Path;
use std::process::ExitCode;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use kvitto::config::Settings;
use kvitto::consumer::{self, JsonlEventSource};
use kvitto::db::open_database;
use kvitto::models::UploadEvent;
use kvitto::pipeline::extraction::HttpExpenseClient;
use kvitto::pipeline::notify::{HttpMailer, NotificationDispatcher};
use kvitto::pipeline::processor::ReceiptProcessor;
use kvitto::pipeline::store::SqliteStore;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let processor = match build_processor(&settings) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("startup error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, path] if flag == "--events" => consume_file(Path::new(path), &processor),
        [container, object_key] => process_one(container, object_key, &processor),
        _ => {
            eprintln!("usage: kvitto <container> <object_key> | kvitto --events <file.jsonl>");
            ExitCode::FAILURE
        }
    }
}

fn build_processor(settings: &Settings) -> Result<ReceiptProcessor, kvitto::db::DatabaseError> {
    let conn = open_database(&settings.db_path)?;
    let store = SqliteStore::new(conn, settings.retry);

    let analyzer = HttpExpenseClient::new(
        &settings.ocr_url,
        settings.request_timeout_secs,
        settings.retry,
    );
    let mailer = HttpMailer::new(&settings.mail_url, settings.request_timeout_secs);
    let dispatcher = NotificationDispatcher::new(
        Box::new(mailer),
        &settings.sender,
        &settings.recipient,
        settings.notify_on_review,
        settings.retry,
    );

    Ok(ReceiptProcessor::new(
        Box::new(analyzer),
        Box::new(store),
        dispatcher,
    ))
}

/// Manual invocation for a single object, mirroring a storage trigger
/// firing right now.
fn process_one(container: &str, object_key: &str, processor: &ReceiptProcessor) -> ExitCode {
    let event = UploadEvent::new(container, object_key, Utc::now());
    match processor.process(&event) {
        Ok(outcome) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).expect("outcome serializes")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline run failed");
            ExitCode::FAILURE
        }
    }
}

fn consume_file(path: &Path, processor: &ReceiptProcessor) -> ExitCode {
    let mut source = match JsonlEventSource::open(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot open event file: {e}");
            return ExitCode::FAILURE;
        }
    };

    match consumer::run(&mut source, processor) {
        Ok(stats) => {
            tracing::info!(
                processed = stats.processed,
                replayed = stats.replayed,
                failed = stats.failed,
                "event file drained"
            );
            if stats.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("consumer error: {e}");
            ExitCode::FAILURE
        }
    }
}
