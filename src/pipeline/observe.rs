use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::document::{Document, DocumentStatus};
use crate::error::Error;

/// Counts reported once per `process_batch` call (and once per stream chunk).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub(crate) fn from_documents(documents: &[Document]) -> Self {
        let completed = documents
            .iter()
            .filter(|d| d.status() == DocumentStatus::Completed)
            .count();
        Self {
            total: documents.len(),
            completed,
            failed: documents.len() - completed,
        }
    }
}

/// Hooks invoked by the pipeline and its retry executor.
///
/// All methods default to no-ops. Implementations are shared across
/// concurrent traversals and must not block.
pub trait PipelineObserver: Send + Sync {
    fn traversal_started(&self, _document: &Document) {}

    fn attempt_failed(&self, _stage: &str, _attempt: u32, _error: &Error) {}

    fn traversal_finished(&self, _document: &Document, _elapsed: Duration) {}

    fn batch_finished(&self, _summary: &BatchSummary) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_documents: u64,
    pub processed_documents: u64,
    pub failed_documents: u64,
    pub processing_time: Duration,
}

/// Lock-free document counters and cumulative traversal time.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    total: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    processing_nanos: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_documents: self.total.load(Ordering::Relaxed),
            processed_documents: self.processed.load(Ordering::Relaxed),
            failed_documents: self.failed.load(Ordering::Relaxed),
            processing_time: Duration::from_nanos(self.processing_nanos.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.processing_nanos.store(0, Ordering::Relaxed);
    }
}

impl PipelineObserver for PipelineMetrics {
    fn traversal_started(&self, _document: &Document) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn traversal_finished(&self, document: &Document, elapsed: Duration) {
        match document.status() {
            DocumentStatus::Completed => self.processed.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.processing_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}
