//! # docpipe
//!
//! **Bounded-concurrency document pipelines in Rust.**
//!
//! `docpipe` runs opaque content blobs through an ordered list of
//! transformation stages. Each stage call is retried with a timeout and
//! exponential backoff. Many documents run at once behind a counting
//! admission gate. A document that fails never takes its siblings down.
//!
//! ---
//!
//! ## Core Model
//!
//! ```text
//! Document ─▶ [ Stage 1 ] ─▶ [ Stage 2 ] ─▶ ... ─▶ Completed | Failed
//!                 │              │
//!            RetryExecutor  RetryExecutor   (timeout + backoff per call)
//! ```
//!
//! - [`Document`]: id, content, metadata, status, timestamps, error.
//! - [`Stage`]: `apply(Document) -> Result<Document, StageError>`.
//! - [`RetryExecutor`]: bounds one stage call in attempts and time.
//! - [`Pipeline`]: orders stages, drives documents, bounds concurrency.
//!
//! Status moves `Pending -> Processing -> Completed | Failed` and never goes back.
//!
//! ---
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use docpipe::prelude::*;
//! use docpipe::stages::{ContentAnalyzer, ContentHasher, MimeSniffer, SizeMetrics};
//!
//! #[tokio::main]
//! async fn main() -> docpipe::error::Result<()> {
//!     let pipeline = Pipeline::new()
//!         .stage(ContentHasher::new())
//!         .stage(MimeSniffer::new())
//!         .stage(SizeMetrics::new())
//!         .stage(ContentAnalyzer::new())
//!         .with_retry(
//!             RetryPolicy::new(3)
//!                 .timeout(Duration::from_secs(5))
//!                 .retry_delay(Duration::from_millis(100)),
//!         );
//!
//!     let docs = vec![Document::from("hello world"), Document::from("%PDF-1.7")];
//!     let processed = pipeline.process_batch(docs, 4).await?;
//!
//!     for doc in &processed {
//!         println!("{} -> {:?}", doc.id(), doc.status());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ---
//!
//! ## Streaming in chunks
//!
//! ```no_run
//! use futures::StreamExt;
//! use docpipe::prelude::*;
//!
//! # async fn demo(pipeline: Pipeline, docs: Vec<Document>) -> docpipe::error::Result<()> {
//! let mut stream = pipeline.process_stream(docs, 10, 4)?;
//! while let Some(doc) = stream.next().await {
//!     println!("{}: {}", doc.id(), doc.status());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Chunk `i + 1` is not pulled from the input until chunk `i` is done.
//!
//! ---
//!
//! ## Error Handling Contract
//!
//! - A stage failure or timeout is retried up to `max_retries` attempts.
//! - When attempts run out the executor returns `Error::RetryExhausted`
//!   wrapping the last cause.
//! - The traversal stops at the first exhausted stage. Later stages never run,
//!   and the document is returned `Failed` with `error` populated.
//! - A panicking stage counts as a failed attempt; it never takes down its batch.
//! - `process_batch` and `process_stream` return every input document.
//!   `Err` means a programming mistake such as no stages or a zero worker limit.
//! - `try_process_one` also turns a failed traversal into
//!   `Error::ProcessingFailed`.
//!
//! ---
//!
//! ## Cancellation
//!
//! [`Pipeline::cancel_token`] returns a [`CancelToken`]. Cancelling it stops
//! admission, in-flight attempts and backoff waits. Affected documents come
//! back `Failed`.
//!
//! ---
//!
//! ## Observability
//!
//! With the default `tracing` feature, `docpipe` emits structured events such
//! as `docpipe.retry.attempt_failed`, `docpipe.retry.sleep`,
//! `docpipe.retry.exhausted`, `docpipe.traversal.failed`,
//! `docpipe.batch.finished` and `docpipe.cancelled`. Each traversal runs
//! inside a `docpipe.traversal` span. Installing a subscriber is up to you:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("docpipe=info")
//!     .init();
//! ```
//!
//! For counters, inject a [`PipelineObserver`] such as [`PipelineMetrics`].
//!
//! ---
//!
//! ## Feature Flags
//!
//! - `tracing` *(default)*: structured spans and events.
//!
//! [`Document`]: document::Document
//! [`Stage`]: pipeline::stage::Stage
//! [`RetryExecutor`]: pipeline::retry::RetryExecutor
//! [`Pipeline`]: pipeline::runtime::Pipeline
//! [`Pipeline::cancel_token`]: pipeline::runtime::Pipeline::cancel_token
//! [`CancelToken`]: pipeline::cancel::CancelToken
//! [`PipelineObserver`]: pipeline::observe::PipelineObserver
//! [`PipelineMetrics`]: pipeline::observe::PipelineMetrics

// Public modules
pub mod document;
pub mod error;
pub mod pipeline;
pub mod stages;

pub mod prelude {
    //! Convenient imports for most `docpipe` users.

    pub use crate::document::{Document, DocumentStatus};
    pub use crate::error::{Error, StageError};
    pub use crate::pipeline::adapters::{stage_fn, stage_sync};
    pub use crate::pipeline::cancel::CancelToken;
    pub use crate::pipeline::config::PipelineConfig;
    pub use crate::pipeline::observe::{PipelineMetrics, PipelineObserver};
    pub use crate::pipeline::retry::{RetryExecutor, RetryPolicy};
    pub use crate::pipeline::runtime::{Outcome, Pipeline};
    pub use crate::pipeline::stage::Stage;
}
