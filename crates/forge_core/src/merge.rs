//! Merging newly parsed files into the accumulated file set.

use crate::config::MergeConfig;
use crate::file_set::{FileSet, GeneratedFile, InsertOutcome};
use tracing::debug;

/// Why a parsed file was not written into the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty or shorter than `min_content_len`.
    TooShort,
    /// Looks like an error message or a refusal.
    ErrorLike,
    /// Near-duplicate of the stored content; the stored version is kept.
    NearDuplicate,
}

/// What one merge did, path by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Paths that were not in the set before.
    pub created: Vec<String>,
    /// Existing paths whose content was replaced with different content.
    pub updated: Vec<String>,
    /// Rejected writes.
    pub skipped: Vec<(String, SkipReason)>,
}

impl MergeReport {
    /// True if the merge left the set untouched.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

/// Looks for an error marker or an apology phrase.
fn is_error_like(content: &str) -> bool {
    content.starts_with("Error:") || content.contains("I apologize")
}

/// Decides whether `new` should replace `old` at the same path.
///
/// A rewrite wins when the lengths differ by more than the threshold, or when
/// the leading characters of the new content do not appear in the old content.
fn should_replace(old: &str, new: &str, config: &MergeConfig) -> bool {
    let old_len = old.chars().count();
    let new_len = new.chars().count();
    if old_len.abs_diff(new_len) > config.length_delta_threshold {
        return true;
    }
    let probe: String = new.chars().take(config.prefix_probe_len).collect();
    !old.contains(&probe)
}

/// Merges `new_files` into a copy of `existing` and reports what changed.
///
/// Files are applied in order, so a later file in the same batch sees the
/// result of an earlier one. Merging an empty batch returns `existing` unchanged.
///
/// # Examples
///
/// ```
/// use forge_core::{merge_generated_files, FileSet, GeneratedFile, MergeConfig};
///
/// let existing = FileSet::new();
/// let (merged, report) = merge_generated_files(
///     &existing,
///     &[GeneratedFile::new("app/page.tsx", "export default function Page() {}")],
///     &MergeConfig::default(),
/// );
/// assert_eq!(merged.len(), 1);
/// assert_eq!(report.created, vec!["app/page.tsx"]);
/// ```
pub fn merge_generated_files(
    existing: &FileSet,
    new_files: &[GeneratedFile],
    config: &MergeConfig,
) -> (FileSet, MergeReport) {
    let mut merged = existing.clone();
    let mut report = MergeReport::default();

    for file in new_files {
        if file.content.chars().count() < config.min_content_len {
            report.skipped.push((file.path.clone(), SkipReason::TooShort));
            continue;
        }
        if is_error_like(&file.content) {
            debug!(path = %file.path, "discarding error-like content");
            report.skipped.push((file.path.clone(), SkipReason::ErrorLike));
            continue;
        }

        let previous_digest = match merged.get(&file.path) {
            Some(current) => {
                if !should_replace(&current.content, &file.content, config) {
                    report
                        .skipped
                        .push((file.path.clone(), SkipReason::NearDuplicate));
                    continue;
                }
                Some(current.digest())
            }
            None => None,
        };

        let path = file.path.clone();
        let changed = previous_digest.as_deref() != Some(file.digest().as_str());
        match merged.insert(file.clone()) {
            InsertOutcome::Inserted => push_unique(&mut report.created, path),
            InsertOutcome::Replaced if changed && !report.created.contains(&path) => {
                push_unique(&mut report.updated, path)
            }
            InsertOutcome::Replaced => {}
        }
    }

    (merged, report)
}

fn push_unique(list: &mut Vec<String>, path: String) {
    if !list.contains(&path) {
        list.push(path);
    }
}
