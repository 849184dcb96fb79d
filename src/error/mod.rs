use std::any::Any;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::document::{Document, DocumentStatus};

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a [`Stage`](crate::pipeline::stage::Stage) implementation.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StageError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_owned());
        Self::new(format!("stage panicked: {detail}"))
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source("io error", err)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("stage `{stage}` timed out after {timeout:?}")]
    Timeout { stage: String, timeout: Duration },

    #[error("stage `{stage}` exhausted retries after {attempts} attempts: {source}")]
    RetryExhausted {
        stage: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("processing failed for document {id}: {source}")]
    ProcessingFailed {
        id: Uuid,
        #[source]
        source: Box<Error>,
        document: Box<Document>,
    },

    #[error("stage `{stage}` returned document {found}, expected {expected}")]
    IdentityChanged {
        stage: String,
        expected: Uuid,
        found: Uuid,
    },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("invalid configuration: {context}")]
    InvalidConfig { context: String },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    pub fn stage(stage: impl Into<String>, source: StageError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source,
        }
    }

    pub fn config(context: impl Into<String>) -> Self {
        Self::InvalidConfig {
            context: context.into(),
        }
    }

    pub(crate) fn retry_exhausted(stage: impl Into<String>, attempts: u32, last: Error) -> Self {
        Self::RetryExhausted {
            stage: stage.into(),
            attempts,
            source: Box::new(last),
        }
    }

    /// The innermost failure, looking through `RetryExhausted` and
    /// `ProcessingFailed` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::RetryExhausted { source, .. } | Self::ProcessingFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }
}
