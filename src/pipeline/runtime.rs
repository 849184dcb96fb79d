use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, BoxStream, FuturesUnordered};
use futures::{FutureExt, StreamExt};
use tokio::sync::Semaphore;

use crate::document::{Document, DocumentStatus};
use crate::error::{Error, Result, StageError};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::observe::{BatchSummary, NoopObserver, PipelineObserver};
use crate::pipeline::retry::{RetryExecutor, RetryPolicy};
use crate::pipeline::stage::Stage;

/// Result of one traversal.
#[derive(Debug)]
pub enum Outcome {
    Completed(Document),
    Failed { document: Document, error: Error },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn document(&self) -> &Document {
        match self {
            Self::Completed(document) | Self::Failed { document, .. } => document,
        }
    }

    pub fn into_document(self) -> Document {
        match self {
            Self::Completed(document) | Self::Failed { document, .. } => document,
        }
    }

    /// Surface a failed traversal as [`Error::ProcessingFailed`].
    pub fn into_result(self) -> Result<Document> {
        match self {
            Self::Completed(document) => Ok(document),
            Self::Failed { document, error } => Err(Error::ProcessingFailed {
                id: document.id(),
                source: Box::new(error),
                document: Box::new(document),
            }),
        }
    }
}

/// Ordered stages plus the retry and admission policy used to run them.
///
/// Every document goes through every stage in registration order. Batches run
/// many documents at once behind a counting semaphore; a failing document is
/// marked [`DocumentStatus::Failed`] and returned, never dropped.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    policy: RetryPolicy,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancelToken,
    executor: RetryExecutor,
    batch_size: usize,
    max_workers: usize,
}

impl Pipeline {
    pub fn new() -> Self {
        let defaults = PipelineConfig::default();
        let policy = defaults.retry_policy();
        let observer: Arc<dyn PipelineObserver> = Arc::new(NoopObserver);
        let cancel = CancelToken::default();
        Self {
            stages: Vec::new(),
            executor: RetryExecutor::new(policy.clone())
                .with_observer(observer.clone())
                .with_cancel(cancel.clone()),
            policy,
            observer,
            cancel,
            batch_size: defaults.batch_size,
            max_workers: defaults.max_workers,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let mut pipeline = Self::new().with_retry(config.retry_policy());
        pipeline.batch_size = config.batch_size;
        pipeline.max_workers = config.max_workers;
        Ok(pipeline)
    }

    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage + 'static,
    {
        self.add_stage(stage);
        self
    }

    pub fn add_stage<S>(&mut self, stage: S)
    where
        S: Stage + 'static,
    {
        self.stages.push(Arc::new(stage));
    }

    pub fn add_shared_stage(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self.rebuild_executor();
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self.rebuild_executor();
        self
    }

    /// Handle that stops admission, in-flight attempts and backoff waits.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn rebuild_executor(&mut self) {
        self.executor = RetryExecutor::new(self.policy.clone())
            .with_observer(self.observer.clone())
            .with_cancel(self.cancel.clone());
    }

    fn ensure_runnable(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::config("pipeline has no stages registered"));
        }
        Ok(())
    }

    fn ensure_pending(document: &Document) -> Result<()> {
        if document.status() != DocumentStatus::Pending {
            return Err(Error::InvalidTransition {
                from: document.status(),
                to: DocumentStatus::Processing,
            });
        }
        Ok(())
    }

    /// Run one document through every stage.
    ///
    /// Stage failures end up in the returned document (`Failed` with `error`
    /// set). `Err` is reserved for an empty pipeline or a document that is
    /// not `Pending`.
    pub async fn process_one(&self, document: Document) -> Result<Document> {
        self.ensure_runnable()?;
        Self::ensure_pending(&document)?;
        Ok(self.traverse(document).await.into_document())
    }

    /// Like [`Self::process_one`], but a failed traversal is returned as
    /// [`Error::ProcessingFailed`] carrying the failed document.
    pub async fn try_process_one(&self, document: Document) -> Result<Document> {
        self.ensure_runnable()?;
        Self::ensure_pending(&document)?;
        self.traverse(document).await.into_result()
    }

    /// Process all documents with at most `worker_limit` traversals in flight.
    ///
    /// Output is in completion order and always has one entry per input.
    pub async fn process_batch(
        &self,
        documents: Vec<Document>,
        worker_limit: usize,
    ) -> Result<Vec<Document>> {
        self.ensure_runnable()?;
        if worker_limit == 0 {
            return Err(Error::config("worker limit must be greater than zero"));
        }
        Ok(self.run_admitted(documents, worker_limit).await)
    }

    /// Lazily process documents in consecutive chunks of `batch_size`.
    ///
    /// A chunk is pulled from `documents` only after the previous chunk has
    /// fully completed. Chunk order is preserved; order inside a chunk is not.
    pub fn process_stream<'a, I>(
        &'a self,
        documents: I,
        batch_size: usize,
        worker_limit: usize,
    ) -> Result<BoxStream<'a, Document>>
    where
        I: IntoIterator<Item = Document>,
        I::IntoIter: Send + 'a,
    {
        self.ensure_runnable()?;
        if batch_size == 0 {
            return Err(Error::config("batch size must be greater than zero"));
        }
        if worker_limit == 0 {
            return Err(Error::config("worker limit must be greater than zero"));
        }

        let stream = stream::unfold(documents.into_iter(), move |mut remaining| async move {
            let chunk: Vec<Document> = remaining.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                return None;
            }
            let processed = self.run_admitted(chunk, worker_limit).await;
            Some((stream::iter(processed), remaining))
        })
        .flatten();

        Ok(stream.boxed())
    }

    /// [`Self::process_batch`] with the configured `max_workers`.
    pub async fn run_batch(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        self.process_batch(documents, self.max_workers).await
    }

    /// [`Self::process_stream`] with the configured `batch_size` and `max_workers`.
    pub fn run_stream<'a, I>(&'a self, documents: I) -> Result<BoxStream<'a, Document>>
    where
        I: IntoIterator<Item = Document>,
        I::IntoIter: Send + 'a,
    {
        self.process_stream(documents, self.batch_size, self.max_workers)
    }

    async fn run_admitted(&self, documents: Vec<Document>, worker_limit: usize) -> Vec<Document> {
        let gate = Semaphore::new(worker_limit.min(Semaphore::MAX_PERMITS));
        let mut processed = Vec::with_capacity(documents.len());

        let mut in_flight: FuturesUnordered<_> = documents
            .into_iter()
            .map(|document| self.admit(&gate, document))
            .collect();
        while let Some(document) = in_flight.next().await {
            processed.push(document);
        }

        let summary = BatchSummary::from_documents(&processed);
        #[cfg(feature = "tracing")]
        {
            tracing::event!(
                tracing::Level::INFO,
                event = "docpipe.batch.finished",
                total = summary.total,
                completed = summary.completed,
                failed = summary.failed,
                "docpipe.batch.finished"
            );
            if summary.failed > 0 {
                tracing::event!(
                    tracing::Level::WARN,
                    event = "docpipe.batch.errors",
                    failed = summary.failed,
                    "docpipe.batch.errors"
                );
            }
        }
        self.observer.batch_finished(&summary);

        processed
    }

    async fn admit(&self, gate: &Semaphore, document: Document) -> Document {
        if document.status() != DocumentStatus::Pending {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "docpipe.traversal.rejected",
                document_id = %document.id(),
                status = %document.status(),
                "docpipe.traversal.rejected"
            );
            if document.is_terminal() {
                return document;
            }
            // A copy taken mid-traversal; it can still be settled as failed.
            let error = Error::InvalidTransition {
                from: document.status(),
                to: DocumentStatus::Processing,
            };
            return self.abandon(document, error);
        }

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = gate.acquire() => permit.ok(),
        };
        let Some(permit) = permit else {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::DEBUG,
                event = "docpipe.cancelled",
                document_id = %document.id(),
                phase = "admission",
                "docpipe.cancelled"
            );
            return self.abandon(document, Error::Cancelled);
        };

        let document = self.traverse(document).await.into_document();
        drop(permit);
        document
    }

    /// Mark a document that never reached its first stage as failed.
    fn abandon(&self, mut document: Document, error: Error) -> Document {
        let started = Instant::now();
        self.observer.traversal_started(&document);
        let settleable =
            document.status() == DocumentStatus::Processing || document.begin_processing().is_ok();
        if settleable {
            Self::settle(&mut document, Some(&error));
        }
        self.observer.traversal_finished(&document, started.elapsed());
        document
    }

    async fn traverse(&self, document: Document) -> Outcome {
        #[cfg(feature = "tracing")]
        let outcome = {
            use tracing::Instrument;
            let span = tracing::info_span!("docpipe.traversal", document_id = %document.id());
            self.traverse_stages(document).instrument(span).await
        };

        #[cfg(not(feature = "tracing"))]
        let outcome = self.traverse_stages(document).await;

        outcome
    }

    async fn traverse_stages(&self, mut document: Document) -> Outcome {
        let started = Instant::now();
        if let Err(error) = document.begin_processing() {
            return Outcome::Failed { document, error };
        }
        self.observer.traversal_started(&document);

        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::DEBUG,
            event = "docpipe.traversal.started",
            stages = self.stages.len(),
            "docpipe.traversal.started"
        );

        let mut failure = None;
        for stage in &self.stages {
            let name = stage.name();
            let expected = document.id();
            let input = &document;
            let result = self
                .executor
                .execute(name, move || {
                    let attempt = async move { stage.apply(input.clone()).await };
                    AssertUnwindSafe(attempt)
                        .catch_unwind()
                        .map(|caught| {
                            caught.unwrap_or_else(|panic| Err(StageError::from_panic(panic)))
                        })
                })
                .await;
            match result {
                Ok(next) if next.id() == expected => document = next,
                Ok(next) => {
                    failure = Some(Error::IdentityChanged {
                        stage: name.to_owned(),
                        expected,
                        found: next.id(),
                    });
                    break;
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        Self::settle(&mut document, failure.as_ref());
        self.observer.traversal_finished(&document, started.elapsed());

        match failure {
            None => {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::DEBUG,
                    event = "docpipe.traversal.completed",
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "docpipe.traversal.completed"
                );
                Outcome::Completed(document)
            }
            Some(error) => {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "docpipe.traversal.failed",
                    error = %error,
                    "docpipe.traversal.failed"
                );
                Outcome::Failed { document, error }
            }
        }
    }

    /// Move a processing document to its terminal status. Failures are
    /// recorded the way [`Error::ProcessingFailed`] displays them.
    fn settle(document: &mut Document, failure: Option<&Error>) {
        let id = document.id();
        let settled = match failure {
            None => document.complete(),
            Some(error) => document.fail(format!("processing failed for document {id}: {error}")),
        };
        if let Err(_err) = settled {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "docpipe.traversal.settle_failed",
                error = %_err,
                "docpipe.traversal.settle_failed"
            );
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
