use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

pub type Metadata = HashMap<String, Value>;

/// Processing status of a [`Document`].
///
/// ```text
/// Pending -> Processing -> Completed
///                       \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work moved through a pipeline.
///
/// Identity, creation time and status are read-only from the outside; stages
/// may replace `content` and add metadata entries, nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    id: Uuid,
    content: Bytes,
    metadata: Metadata,
    status: DocumentStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata: Metadata::new(),
            status: DocumentStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Builder-style metadata insert, for use at construction time.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        self.content = content.into();
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Insert or overwrite a single entry, returning the previous value.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.metadata.insert(key.into(), value.into())
    }

    pub fn extend_metadata<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.metadata
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn to_json(&self) -> Value {
        // Only map keys are strings and every field serializes infallibly.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub(crate) fn begin_processing(&mut self) -> Result<()> {
        self.transition(DocumentStatus::Processing)
    }

    pub(crate) fn complete(&mut self) -> Result<()> {
        self.transition(DocumentStatus::Completed)
    }

    pub(crate) fn fail(&mut self, reason: impl fmt::Display) -> Result<()> {
        self.transition(DocumentStatus::Failed)?;
        self.error = Some(reason.to_string());
        Ok(())
    }

    fn transition(&mut self, to: DocumentStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.processed_at = Some(Utc::now());
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Document {
    fn from(content: Bytes) -> Self {
        Self::new(content)
    }
}

impl From<Vec<u8>> for Document {
    fn from(content: Vec<u8>) -> Self {
        Self::new(content)
    }
}

impl From<&'static str> for Document {
    fn from(content: &'static str) -> Self {
        Self::new(Bytes::from_static(content.as_bytes()))
    }
}
