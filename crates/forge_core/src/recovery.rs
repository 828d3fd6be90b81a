//! Error classification and per-iteration retry bookkeeping.

use crate::collaborators::CollaboratorErrorKind;
use crate::config::BuildConfig;
use crate::error::ForgeError;
use crate::file_set::FileSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure categories the retry policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Timeout,
    RateLimited,
    Parse,
    ContextTooLarge,
    PaymentRequired,
    Unknown,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::PaymentRequired)
    }

    /// Upper bound on retries for this kind, on top of the configured maximum.
    ///
    /// Unrecognized failures get a single retry.
    pub fn retry_cap(self) -> u32 {
        match self {
            ErrorKind::Unknown => 1,
            _ => u32::MAX,
        }
    }

    fn headline(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::RateLimited => "Rate limited by API",
            ErrorKind::Parse => "Failed to parse generated code",
            ErrorKind::ContextTooLarge => "Context too large",
            ErrorKind::PaymentRequired => "Payment required",
            ErrorKind::Unknown => "Unexpected error",
        }
    }

    fn suggestion(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "The request took too long. Retrying with a simpler prompt.",
            ErrorKind::RateLimited => "Too many requests. Waiting before retry.",
            ErrorKind::Parse => "Output format was incorrect. Retrying with clearer instructions.",
            ErrorKind::ContextTooLarge => "Reducing context size and retrying.",
            ErrorKind::PaymentRequired => "Please complete payment to continue.",
            ErrorKind::Unknown => "An unexpected error occurred. Retrying once.",
        }
    }

    /// Kind implied by a collaborator's own classification, if it is specific enough.
    pub fn from_collaborator(kind: CollaboratorErrorKind) -> Option<Self> {
        match kind {
            CollaboratorErrorKind::Timeout => Some(ErrorKind::Timeout),
            CollaboratorErrorKind::RateLimited => Some(ErrorKind::RateLimited),
            CollaboratorErrorKind::ContextTooLarge => Some(ErrorKind::ContextTooLarge),
            CollaboratorErrorKind::PaymentRequired => Some(ErrorKind::PaymentRequired),
            CollaboratorErrorKind::Malformed => Some(ErrorKind::Parse),
            CollaboratorErrorKind::Transport | CollaboratorErrorKind::Other => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.headline())
    }
}

/// A classified failure of one iteration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildError {
    pub iteration: u32,
    pub kind: ErrorKind,
    /// Original failure message.
    pub error: String,
    pub retryable: bool,
    pub suggestion: Option<String>,
}

/// Classifies a failure message by substring.
///
/// Payment markers are checked first so a payment failure is never retried,
/// whatever else the message mentions.
///
/// # Examples
///
/// ```
/// use forge_core::{analyze_error, ErrorKind};
///
/// let err = analyze_error("upstream returned 429", 2);
/// assert_eq!(err.kind, ErrorKind::RateLimited);
/// assert!(err.retryable);
///
/// assert!(!analyze_error("payment session not found", 1).retryable);
/// ```
pub fn analyze_error(message: &str, iteration: u32) -> BuildError {
    build_error(classify_message(message), message, iteration)
}

fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["payment", "402"]) {
        ErrorKind::PaymentRequired
    } else if has(&["timeout", "timed out", "etimedout"]) {
        ErrorKind::Timeout
    } else if has(&["rate limit", "429"]) {
        ErrorKind::RateLimited
    } else if has(&["parse", "json"]) {
        ErrorKind::Parse
    } else if has(&["token", "context length"]) {
        ErrorKind::ContextTooLarge
    } else {
        ErrorKind::Unknown
    }
}

fn build_error(kind: ErrorKind, message: &str, iteration: u32) -> BuildError {
    BuildError {
        iteration,
        kind,
        error: message.to_string(),
        retryable: kind.is_retryable(),
        suggestion: Some(kind.suggestion().to_string()),
    }
}

/// Classifies a build error, trusting a collaborator's own kind when it has one.
pub fn classify_error(err: &ForgeError, iteration: u32) -> BuildError {
    match err {
        ForgeError::Generation { kind, message } => {
            let kind = ErrorKind::from_collaborator(*kind).unwrap_or_else(|| classify_message(message));
            build_error(kind, message, iteration)
        }
        ForgeError::PaymentRequired(msg) | ForgeError::PaymentVerificationFailed(msg) => {
            build_error(ErrorKind::PaymentRequired, msg, iteration)
        }
        other => analyze_error(&other.to_string(), iteration),
    }
}

/// Backoff before the retry following `retry_count` earlier retries, with default limits.
pub fn retry_delay(retry_count: u32) -> Duration {
    BuildConfig::default().retry_delay(retry_count)
}

/// Retry and last-known-good bookkeeping for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    pub last_successful_iteration: u32,
    pub last_successful_files: FileSet,
    /// Every classified failure, in order.
    pub errors: Vec<BuildError>,
    /// Retries spent on the current iteration.
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Default for RecoveryState {
    fn default() -> Self {
        Self::new(BuildConfig::default().max_retries)
    }
}

impl RecoveryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            last_successful_iteration: 0,
            last_successful_files: FileSet::new(),
            errors: Vec::new(),
            retry_count: 0,
            max_retries,
        }
    }

    /// True if `error` may be retried given the retries already spent.
    pub fn should_retry(&self, error: &BuildError) -> bool {
        error.retryable && self.retry_count < self.max_retries.min(error.kind.retry_cap())
    }

    /// Records a failed attempt and counts it against the retry budget.
    pub fn record_failure(&mut self, error: BuildError) {
        self.errors.push(error);
        self.retry_count += 1;
    }

    /// Records a finished iteration and resets the retry budget.
    pub fn record_success(&mut self, iteration: u32, files: &FileSet) {
        self.last_successful_iteration = iteration;
        self.last_successful_files = files.clone();
        self.retry_count = 0;
    }

    /// Gives up on the current iteration; the next one starts with a full budget.
    pub fn abandon_iteration(&mut self) {
        self.retry_count = 0;
    }
}
