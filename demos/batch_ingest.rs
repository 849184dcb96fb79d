//! Batch Ingestion Example
//!
//! Run with:
//!   RUST_LOG=docpipe=info cargo run --example batch_ingest
//!
//! This example shows:
//! - enrichment with the stock stages
//! - a flaky custom stage recovered by retries
//! - a stage that keeps failing, isolated to its own document
//! - chunked streaming with metrics collected through an observer

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docpipe::error::{Result, StageError};
use docpipe::prelude::*;
use docpipe::stages::{ContentAnalyzer, ContentHasher, MimeSniffer, SizeMetrics, Validator};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docpipe=info")))
        .init();

    let config = PipelineConfig::new()
        .batch_size(4)
        .max_workers(3)
        .max_retries(3)
        .timeout(Duration::from_millis(500))
        .retry_delay(Duration::from_millis(20));

    // Fails the first attempt of every other call to simulate a transient backend.
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_stage = calls.clone();
    let flaky_lookup = stage_fn("flaky_lookup", move |mut doc: Document| {
        let calls = calls_in_stage.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                return Err(StageError::new("lookup service unavailable"));
            }
            doc.insert_metadata("lookup", "ok");
            Ok(doc)
        }
    });

    let quarantine = stage_sync("quarantine", |doc| {
        if doc.metadata_str("source") == Some("untrusted") {
            return Err(StageError::new("untrusted source"));
        }
        Ok(())
    });

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Pipeline::from_config(&config)?
        .stage(ContentHasher::new())
        .stage(MimeSniffer::new())
        .stage(SizeMetrics::new())
        .stage(ContentAnalyzer::new())
        .stage(Validator::from_config(&config))
        .stage(flaky_lookup)
        .stage(quarantine)
        .observer(metrics.clone());

    let documents: Vec<Document> = (0..10)
        .map(|i| {
            let source = if i == 7 { "untrusted" } else { "inbox" };
            Document::new(format!("message {i}: the quick brown fox").into_bytes())
                .with_metadata("source", source)
        })
        .chain([Document::from("%PDF-1.7 fake"), Document::empty()])
        .collect();

    let mut stream = pipeline.run_stream(documents)?;
    while let Some(doc) = stream.next().await {
        match doc.status() {
            DocumentStatus::Completed => println!(
                "✓ {} mime={} words={}",
                doc.id(),
                doc.metadata_str("mime_type").unwrap_or("?"),
                doc.metadata_value("word_count")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            _ => println!("✗ {} {}", doc.id(), doc.error().unwrap_or("unknown error")),
        }
    }

    let snapshot = metrics.snapshot();
    println!(
        "\ntotal={} completed={} failed={} time={:?}",
        snapshot.total_documents,
        snapshot.processed_documents,
        snapshot.failed_documents,
        snapshot.processing_time
    );
    Ok(())
}
