//! Interfaces to the external services a build depends on.
//!
//! Every collaborator reports failure as a [`CollaboratorError`], so whatever
//! transport sits behind an implementation (HTTP status in a body, a network
//! exception, a closed stream) is normalized before it reaches the classifier.

use crate::error::ForgeError;
use crate::file_set::FileSet;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized failure kinds reported by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollaboratorErrorKind {
    Timeout,
    RateLimited,
    ContextTooLarge,
    PaymentRequired,
    /// Connection-level or server-side failure.
    Transport,
    /// The collaborator answered with something unusable.
    Malformed,
    Other,
}

/// A collaborator failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub kind: CollaboratorErrorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(kind: CollaboratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Timeout, message)
    }

    /// Maps an HTTP-style status code and response body onto a failure kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_core::{CollaboratorError, CollaboratorErrorKind};
    ///
    /// let err = CollaboratorError::from_http_status(429, "slow down");
    /// assert_eq!(err.kind, CollaboratorErrorKind::RateLimited);
    /// assert_eq!(err.message, "HTTP 429: slow down");
    /// ```
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let kind = match status {
            402 => CollaboratorErrorKind::PaymentRequired,
            408 | 504 => CollaboratorErrorKind::Timeout,
            413 => CollaboratorErrorKind::ContextTooLarge,
            429 => CollaboratorErrorKind::RateLimited,
            500..=599 => CollaboratorErrorKind::Transport,
            _ => CollaboratorErrorKind::Other,
        };
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self::new(kind, message)
    }
}

impl From<CollaboratorError> for ForgeError {
    fn from(err: CollaboratorError) -> Self {
        ForgeError::Generation {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Streamed generator output, one text chunk per item.
pub type TextStream = BoxStream<'static, Result<String, CollaboratorError>>;

/// The text-generation service.
///
/// Implementations enforce their own per-call time limit and surface it as a
/// `Timeout` error; the orchestrator never cancels a stream itself.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> Result<TextStream, CollaboratorError>;
}

/// Payment verification keyed by an opaque checkout session id.
#[async_trait]
pub trait PaymentGate: Send + Sync {
    async fn is_paid(&self, session_id: &str) -> Result<bool, CollaboratorError>;
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    pub commit_sha: String,
    pub url: Option<String>,
}

/// Source-control push target. Failures are never fatal to a build.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn push(
        &self,
        repo: &str,
        files: &FileSet,
        commit_message: &str,
    ) -> Result<PushResult, CollaboratorError>;
}

/// Packages a finished file set into a downloadable archive.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, files: &FileSet, project_name: &str) -> Result<Vec<u8>, CollaboratorError>;
}
