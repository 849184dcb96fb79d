use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::stage::Stage;
use crate::stages::CONTENT_HASH;

/// Stores the lowercase hex SHA-256 of the content under `content_hash`.
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    pub fn digest(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }
}

#[async_trait]
impl Stage for ContentHasher {
    fn name(&self) -> &str {
        "content_hash"
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        let digest = Self::digest(document.content());
        document.insert_metadata(CONTENT_HASH, digest);
        Ok(document)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self
    }
}
