use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::stage::Stage;
use crate::stages::{MIME_TYPE, WORD_COUNT};

/// Counts whitespace-separated words for `text/*` documents.
///
/// Relies on `mime_type` being present, so register it after
/// [`MimeSniffer`](crate::stages::MimeSniffer). Other types are left alone.
pub struct ContentAnalyzer;

impl ContentAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for ContentAnalyzer {
    fn name(&self) -> &str {
        "content_analyzer"
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        let is_text = document
            .metadata_str(MIME_TYPE)
            .is_some_and(|mime| mime.starts_with("text/"));
        if !is_text {
            return Ok(document);
        }

        let words = std::str::from_utf8(document.content())
            .map(|text| text.split_whitespace().count())
            .unwrap_or(0);
        document.insert_metadata(WORD_COUNT, words);
        Ok(document)
    }
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self
    }
}
