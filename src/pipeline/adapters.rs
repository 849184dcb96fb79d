use std::future::Future;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::stage::Stage;

/// Stage backed by an async closure: `Document -> Result<Document, StageError>`.
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> FnStage<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Document) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Document, StageError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, document: Document) -> Result<Document, StageError> {
        (self.f)(document).await
    }
}

/// Stage that only touches metadata, synchronously.
pub struct InspectStage<F> {
    name: String,
    f: F,
}

impl<F> InspectStage<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Stage for InspectStage<F>
where
    F: Fn(&mut Document) -> Result<(), StageError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        (self.f)(&mut document)?;
        Ok(document)
    }
}

/// Build a stage from an async closure.
///
/// ```no_run
/// use docpipe::error::StageError;
/// use docpipe::pipeline::adapters::stage_fn;
///
/// let tag = stage_fn("tag", |mut doc| async move {
///     doc.insert_metadata("source", "inbox");
///     Ok::<_, StageError>(doc)
/// });
/// # let _ = tag;
/// ```
pub fn stage_fn<F, Fut>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: Fn(Document) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Document, StageError>> + Send + 'static,
{
    FnStage::new(name, f)
}

/// Build a synchronous stage that edits the document in place.
pub fn stage_sync<F>(name: impl Into<String>, f: F) -> InspectStage<F>
where
    F: Fn(&mut Document) -> Result<(), StageError> + Send + Sync + 'static,
{
    InspectStage::new(name, f)
}
