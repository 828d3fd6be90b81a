//! Error types for forge_core operations.

use crate::collaborators::CollaboratorErrorKind;
use thiserror::Error;

/// Core error type for forge_core operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// No payment session was supplied, or the gate reported it unpaid.
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// The payment collaborator itself failed while verifying a session.
    #[error("payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    /// The generation collaborator failed.
    #[error("generation failed ({kind:?}): {message}")]
    Generation {
        /// Normalized failure kind reported by the collaborator.
        kind: CollaboratorErrorKind,
        /// Collaborator-provided message.
        message: String,
    },

    /// Pushing files to source control failed.
    #[error("source control sync failed: {0}")]
    Sync(String),

    /// Bundling the file set into an archive failed.
    #[error("bundling failed: {0}")]
    Bundle(String),

    /// The recovery store could not be opened, read or written.
    #[error("recovery storage error: {0}")]
    Storage(String),

    /// Serialization error while encoding a snapshot.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while decoding a snapshot.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// A stored snapshot failed its checksum.
    #[error("recovery snapshot for build {build_id} is corrupted: expected {expected}, got {actual}")]
    SnapshotCorrupted {
        /// Build whose snapshot is corrupted.
        build_id: String,
        /// Checksum recorded when the snapshot was written.
        expected: String,
        /// Checksum computed on load.
        actual: String,
    },

    /// Invalid build state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// Invalid todo status transition.
    #[error("invalid status change for todo '{id}': {from} -> {to}")]
    InvalidTodoTransition {
        /// Todo identifier
        id: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::PaymentRequired(_) | Self::PaymentVerificationFailed(_) => {
                Some("Complete checkout and start the build again with the paid session id.")
            }
            Self::SnapshotCorrupted { .. } => {
                Some("Discard the snapshot with 'forge recovery clear <build-id>' and rebuild.")
            }
            Self::Storage(_) => {
                Some("Check that the recovery store file is writable and not held by another build.")
            }
            Self::ConfigError(_) => Some("Fix or remove forge.toml; missing keys fall back to defaults."),
            _ => None,
        }
    }

    /// Returns true for failures that stop a build before any generation work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PaymentRequired(_) | Self::PaymentVerificationFailed(_)
        )
    }
}

/// Convenience Result type for forge_core operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
