#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docpipe::document::Document;
use docpipe::error::{Error, StageError};
use docpipe::pipeline::observe::{BatchSummary, PipelineObserver};
use docpipe::pipeline::stage::Stage;

/// Build `n` pending documents tagged with their input position under `idx`.
pub fn docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("document number {i}").into_bytes()).with_metadata("idx", i))
        .collect()
}

pub fn idx(doc: &Document) -> u64 {
    doc.metadata_value("idx")
        .and_then(|v| v.as_u64())
        .expect("idx metadata")
}

/// Appends its name to a shared log on every call, then passes the document on.
pub struct RecordingStage {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStage {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log }
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        self.name
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        self.log.lock().expect("mutex poisoned").push(self.name.to_owned());
        document.insert_metadata(self.name, true);
        Ok(document)
    }
}

/// Always fails and counts its calls.
pub struct FailingStage {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl FailingStage {
    pub fn new(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
        Self { name, calls }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        self.name
    }

    async fn apply(&self, _document: Document) -> Result<Document, StageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err(StageError::new(format!("boom #{n}")))
    }
}

/// Fails for documents whose metadata has `"bad": true`.
pub struct RejectBad;

#[async_trait]
impl Stage for RejectBad {
    fn name(&self) -> &str {
        "reject_bad"
    }

    async fn apply(&self, document: Document) -> Result<Document, StageError> {
        if document.metadata_value("bad").and_then(|v| v.as_bool()) == Some(true) {
            return Err(StageError::new("bad document"));
        }
        Ok(document)
    }
}

/// Sleeps for `delay` while tracking how many calls overlap.
pub struct InFlightProbe {
    delay: Duration,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlightProbe {
    pub fn new(delay: Duration, peak: Arc<AtomicUsize>) -> Self {
        Self {
            delay,
            current: Arc::new(AtomicUsize::new(0)),
            peak,
        }
    }
}

#[async_trait]
impl Stage for InFlightProbe {
    fn name(&self) -> &str {
        "in_flight_probe"
    }

    async fn apply(&self, document: Document) -> Result<Document, StageError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(document)
    }
}

/// Logs `enter:<idx>` and `exit:<idx>` around a short sleep.
pub struct EnterExitStage {
    delay: Duration,
    log: Arc<Mutex<Vec<String>>>,
}

impl EnterExitStage {
    pub fn new(delay: Duration, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { delay, log }
    }
}

#[async_trait]
impl Stage for EnterExitStage {
    fn name(&self) -> &str {
        "enter_exit"
    }

    async fn apply(&self, document: Document) -> Result<Document, StageError> {
        let i = idx(&document);
        self.log.lock().expect("mutex poisoned").push(format!("enter:{i}"));
        tokio::time::sleep(self.delay).await;
        self.log.lock().expect("mutex poisoned").push(format!("exit:{i}"));
        Ok(document)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub batches: Mutex<Vec<BatchSummary>>,
    pub attempts: Mutex<Vec<(String, u32)>>,
}

impl PipelineObserver for RecordingObserver {
    fn attempt_failed(&self, stage: &str, attempt: u32, _error: &Error) {
        self.attempts
            .lock()
            .expect("mutex poisoned")
            .push((stage.to_owned(), attempt));
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        self.batches.lock().expect("mutex poisoned").push(*summary);
    }
}
