use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::stage::Stage;
use crate::stages::{SIZE_BYTES, SIZE_KB};

/// Records `size_bytes` and `size_kb` (two decimals).
pub struct SizeMetrics;

impl SizeMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn kilobytes(len: usize) -> f64 {
        ((len as f64 / 1024.0) * 100.0).round() / 100.0
    }
}

#[async_trait]
impl Stage for SizeMetrics {
    fn name(&self) -> &str {
        "size_metrics"
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        let len = document.content().len();
        document.insert_metadata(SIZE_BYTES, len);
        document.insert_metadata(SIZE_KB, Self::kilobytes(len));
        Ok(document)
    }
}

impl Default for SizeMetrics {
    fn default() -> Self {
        Self
    }
}
