use async_trait::async_trait;

use crate::document::Document;
use crate::error::StageError;
use crate::pipeline::stage::Stage;
use crate::stages::MIME_TYPE;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const EMPTY: &str = "application/x-empty";

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B", "application/gzip"),
];

/// Detects a MIME type from leading magic bytes, falling back to text
/// heuristics and finally `application/octet-stream`.
pub struct MimeSniffer;

impl MimeSniffer {
    pub fn new() -> Self {
        Self
    }

    pub fn sniff(content: &[u8]) -> &'static str {
        if content.is_empty() {
            return EMPTY;
        }
        if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| content.starts_with(magic)) {
            return *mime;
        }

        let Ok(text) = std::str::from_utf8(content) else {
            return OCTET_STREAM;
        };
        let head = text.trim_start();
        if (head.starts_with('{') || head.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(text).is_ok()
        {
            return "application/json";
        }
        if head.starts_with("<?xml") {
            return "text/xml";
        }
        let lowered: String = head.chars().take(16).collect::<String>().to_ascii_lowercase();
        if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") {
            return "text/html";
        }
        "text/plain"
    }
}

#[async_trait]
impl Stage for MimeSniffer {
    fn name(&self) -> &str {
        "mime_type"
    }

    async fn apply(&self, mut document: Document) -> Result<Document, StageError> {
        let mime = Self::sniff(document.content());
        document.insert_metadata(MIME_TYPE, mime);
        Ok(document)
    }
}

impl Default for MimeSniffer {
    fn default() -> Self {
        Self
    }
}
