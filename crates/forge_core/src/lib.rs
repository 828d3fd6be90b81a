//! Forge Core Library
//!
//! Iterative, generator-driven construction of a web application from a
//! requirements document, providing:
//! - Complexity, token and price estimation
//! - Task planning across iterations
//! - Parsing of streamed generator output into files
//! - Merging, structural validation and retry-aware recovery
//! - An orchestrator that drives the whole loop
//!
//! # Quick Start
//!
//! ```
//! use forge_core::{estimate, generate_todos, PricingConfig};
//!
//! let prd = "Users login with email, buy prints through a stripe checkout, and upload profile photo.";
//! let quote = estimate(prd, &PricingConfig::default());
//!
//! // The tier decides how many iterations the build gets
//! assert_eq!(quote.tokens.iteration_count, 4);
//! assert!(quote.pricing.total_cost >= 5.0);
//!
//! let todos = generate_todos(prd, quote.tokens.iteration_count);
//! assert!(todos.iter().any(|t| t.id == "payments"));
//! ```
//!
//! # Features
//!
//! ## Parsing Generator Output
//!
//! Output follows a simple marker protocol; a fenced-code or JSON fallback is
//! used when the markers are missing:
//!
//! ```
//! use forge_core::parse_iteration_output;
//!
//! let raw = "=== FILE: app/page.tsx ===\nexport default function Page() { return null }\n=== END FILE ===\n\
//!            === PROGRESS UPDATE ===\n{\"iteration\": 1, \"summary\": \"Home page\"}\n=== END PROGRESS ===";
//!
//! let parsed = parse_iteration_output(raw);
//! assert_eq!(parsed.files.len(), 1);
//! assert_eq!(parsed.files[0].path, "app/page.tsx");
//! assert_eq!(parsed.progress.unwrap().summary, "Home page");
//! ```
//!
//! ## Merging and Validation
//!
//! Each iteration's files are merged into the accumulated set, which is then
//! checked structurally:
//!
//! ```
//! use forge_core::{merge_generated_files, test_generated_files, FileSet, GeneratedFile};
//! use forge_core::{MergeConfig, ValidationConfig};
//!
//! let files = [
//!     GeneratedFile::new("app/page.tsx", "export default function Page() { return null }"),
//!     GeneratedFile::new("app/layout.tsx", "export default function Layout() { return null }"),
//! ];
//! let (merged, report) = merge_generated_files(&FileSet::new(), &files, &MergeConfig::default());
//! assert_eq!(report.created.len(), 2);
//!
//! let result = test_generated_files(&merged, &ValidationConfig::default(), 0);
//! assert!(result.passed);
//! ```

mod collaborators;
mod config;
mod error;
mod estimate;
mod file_set;
mod merge;
mod orchestrator;
mod parser;
mod planner;
mod prompt;
mod recovery;
mod recovery_store;
mod types;
mod usage;
mod validate;

pub use collaborators::{
    Bundler, CollaboratorError, CollaboratorErrorKind, Generator, PaymentGate, PushResult,
    SourceControl, TextStream,
};
pub use config::{
    BuildConfig, Config, MergeConfig, PricingConfig, RecoveryConfig, ValidationConfig, CONFIG_FILE,
};
pub use error::{ForgeError, Result};
pub use estimate::{
    analyze_complexity, calculate_pricing, estimate, estimate_tokens, round_cents,
    ComplexityAnalysis, ComplexityTier, DetectedFeatures, Estimate, Feature, PricingEstimate,
    TokenBreakdown, TokenEstimate,
};
pub use file_set::{language_for_path, sanitize_path, FileSet, GeneratedFile, InsertOutcome};
pub use merge::{merge_generated_files, MergeReport, SkipReason};
pub use orchestrator::{BuildEvent, BuildObserver, BuildReport, ChannelObserver, Orchestrator};
pub use parser::{
    clean_content, parse_generated_code, parse_iteration_output, parse_progress_update,
    CurrentFileScanner, ParsedIteration, ProgressUpdate, TodoUpdate, END_FILE_MARKER,
    END_PROGRESS_MARKER, FILE_MARKER, PROGRESS_MARKER,
};
pub use planner::generate_todos;
pub use prompt::{
    build_iteration_prompt, format_context_for_prompt, iteration_focus, ContextBounds,
    IterationPrompt,
};
pub use recovery::{analyze_error, classify_error, retry_delay, BuildError, ErrorKind, RecoveryState};
pub use recovery_store::{RecoverySnapshot, RecoveryStore, SnapshotInfo};
pub use types::*;
pub use usage::{approximate_tokens, TokenUsage, UsageLedger};
pub use validate::{scan_delimiters, test_generated_files, DelimiterCounts, FileStats};

/// Time provider trait for testing.
///
/// Allows injecting controlled time into the orchestrator and the recovery
/// store so snapshot expiry can be exercised without waiting.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
