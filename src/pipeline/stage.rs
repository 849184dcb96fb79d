use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;

/// A single transformation applied to a [`Document`].
///
/// Implementations take one document and return one document. They may
/// replace the content and add metadata. Retries, timeouts and concurrency
/// belong to the pipeline; a stage just does its work once per call and may be
/// called again with a fresh copy of the same input if an attempt fails.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str {
        "stage"
    }

    async fn apply(&self, document: Document) -> Result<Document, StageError>;
}
