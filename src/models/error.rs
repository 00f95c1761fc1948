//! Error types for the proxy container.
//!
//! Only [`ContainerError`] ever leaves the container. Decode and handler
//! failures are turned into error responses by [`crate::error_mapper`].

use thiserror::Error;

use crate::models::EventShape;

/// The payload could not be read as one of the supported proxy events.
#[derive(Debug, Clone, Error)]
#[error("Malformed event: {reason}")]
pub struct MalformedEvent {
    pub reason: String,
    /// Best guess at the invoker, used to shape the error response.
    pub shape: EventShape,
}

impl MalformedEvent {
    #[must_use]
    pub fn new(reason: impl Into<String>, shape: EventShape) -> Self {
        Self {
            reason: reason.into(),
            shape,
        }
    }
}

/// Failure reported by a downstream request handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No route matched the request.
    #[error("No route for {method} {path}")]
    Unroutable { method: String, path: String },
    /// The handler failed while processing the request.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn unroutable(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Unroutable {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Errors surfaced by the container to its caller.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The downstream handler could not be constructed.
    #[error("Initialization failure: {0}")]
    Initialization(String),
    /// Reserved for callers decoding outside the container; the container
    /// itself maps malformed events to responses.
    #[error(transparent)]
    MalformedEvent(#[from] MalformedEvent),
    /// Writing the response to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing the response failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContainerError {
    /// Short error type used in Lambda diagnostics.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Initialization(_) => "InitializationFailure",
            Self::MalformedEvent(_) => "MalformedEvent",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

impl From<ContainerError> for lambda_runtime::Diagnostic {
    fn from(error: ContainerError) -> Self {
        Self {
            error_type: error.error_type().to_string(),
            error_message: error.to_string(),
        }
    }
}
