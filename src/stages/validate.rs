use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::config::{PipelineConfig, DEFAULT_MAX_DOCUMENT_SIZE};
use crate::pipeline::stage::Stage;
use crate::stages::{MIME_TYPE, MIME_WARNING, SIZE_WARNING, VALIDATION_ERROR};

/// Checks emptiness, size and (when `mime_type` is known) the allowed types.
///
/// By default problems are recorded as metadata and the document continues.
/// In strict mode the first problem fails the stage.
pub struct Validator {
    max_document_size: usize,
    allowed_mime_types: Vec<String>,
    strict: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            allowed_mime_types: Vec::new(),
            strict: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_document_size: config.max_document_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
            strict: false,
        }
    }

    pub fn max_document_size(mut self, max_document_size: usize) -> Self {
        self.max_document_size = max_document_size;
        self
    }

    /// Restrict accepted types. An empty list accepts everything.
    pub fn allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn problems(&self, document: &Document) -> Vec<(&'static str, String)> {
        let mut found = Vec::new();
        let len = document.content().len();
        if len == 0 {
            found.push((VALIDATION_ERROR, "Empty document".to_owned()));
        }
        if len > self.max_document_size {
            found.push((
                SIZE_WARNING,
                format!("Document exceeds {} bytes", self.max_document_size),
            ));
        }
        if let Some(mime) = document.metadata_str(MIME_TYPE) {
            if !self.allowed_mime_types.is_empty()
                && !self.allowed_mime_types.iter().any(|allowed| allowed == mime)
            {
                found.push((MIME_WARNING, format!("MIME type {mime} is not allowed")));
            }
        }
        found
    }
}

#[async_trait]
impl Stage for Validator {
    fn name(&self) -> &str {
        "validator"
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        let problems = self.problems(&document);
        if self.strict {
            if let Some((_, message)) = problems.into_iter().next() {
                return Err(StageError::new(message));
            }
            return Ok(document);
        }
        for (key, message) in problems {
            document.insert_metadata(key, message);
        }
        Ok(document)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
