//! Core data types for a build: todos, progress, history, test results and the build log.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Build orchestrator state machine states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    /// Waiting on the payment gate.
    VerifyingPayment,

    /// An iteration's generation call is in flight (or being retried).
    Building,

    /// The validator is running over the accumulated file set.
    Testing,

    /// The file set is being pushed to source control.
    Syncing,

    /// All iterations have run.
    Complete,

    /// The build stopped before the loop could start.
    Error {
        /// Why the build stopped.
        reason: String,
    },
}

impl BuildState {
    /// Returns true for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Complete | BuildState::Error { .. })
    }

    /// Checks a transition against the build lifecycle.
    ///
    /// `Building -> Building` and `Building -> Complete` cover an iteration that
    /// exhausted its retries and is skipped.
    pub fn can_transition_to(&self, next: &BuildState) -> bool {
        use BuildState::*;

        if !self.is_terminal() && matches!(next, Error { .. }) {
            return true;
        }

        matches!(
            (self, next),
            (VerifyingPayment, Building)
                | (Building, Testing)
                | (Building, Building)
                | (Building, Complete)
                | (Testing, Syncing)
                | (Syncing, Building)
                | (Syncing, Complete)
        )
    }

    /// Short lowercase name used in logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            BuildState::VerifyingPayment => "verifying-payment",
            BuildState::Building => "building",
            BuildState::Testing => "testing",
            BuildState::Syncing => "syncing",
            BuildState::Complete => "complete",
            BuildState::Error { .. } => "error",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TodoStatus {
    /// Parses the kebab-case names used in the progress block.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pending" => Some(TodoStatus::Pending),
            "in-progress" => Some(TodoStatus::InProgress),
            "completed" | "complete" | "done" => Some(TodoStatus::Completed),
            "failed" => Some(TodoStatus::Failed),
            _ => None,
        }
    }

    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TodoStatus::Completed | TodoStatus::Failed)
    }

    /// Status changes only ever move forward.
    pub fn can_transition_to(self, next: TodoStatus) -> bool {
        matches!(
            (self, next),
            (TodoStatus::Pending, TodoStatus::InProgress)
                | (TodoStatus::InProgress, TodoStatus::Completed)
                | (TodoStatus::InProgress, TodoStatus::Failed)
        )
    }

    fn marker(self) -> &'static str {
        match self {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[>]",
            TodoStatus::Completed => "[x]",
            TodoStatus::Failed => "[!]",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in-progress",
            TodoStatus::Completed => "completed",
            TodoStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A planned unit of work mapped to a target iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Stable identifier, unique per task kind (e.g. "setup", "auth").
    pub id: String,
    /// Human-readable description.
    pub task: String,
    /// Current lifecycle status.
    pub status: TodoStatus,
    /// Iteration this task is scheduled for (1-based).
    pub target_iteration: u32,
    /// Latest validation result; replaced, never merged.
    pub test_result: Option<TestResult>,
}

impl TodoItem {
    /// Creates a pending todo.
    pub fn new(id: &str, task: &str, target_iteration: u32) -> Self {
        Self {
            id: id.to_string(),
            task: task.to_string(),
            status: TodoStatus::Pending,
            target_iteration,
            test_result: None,
        }
    }

    /// Moves to `next`, rejecting any backward or skipping transition.
    pub fn set_status(&mut self, next: TodoStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ForgeError::InvalidTodoTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Walks forward to `target`, passing through `InProgress` when starting from `Pending`.
    ///
    /// Returns false (leaving the item untouched) when `target` is not ahead of the current status.
    pub fn advance_to(&mut self, target: TodoStatus) -> bool {
        if self.status == target || self.status.is_terminal() {
            return false;
        }
        if self.status == TodoStatus::Pending && target.is_terminal() {
            self.status = TodoStatus::InProgress;
        }
        self.set_status(target).is_ok()
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// True iff `errors` is empty.
    pub passed: bool,
    /// Build-breaking findings, in discovery order.
    pub errors: Vec<String>,
    /// Non-blocking findings, in discovery order.
    pub warnings: Vec<String>,
    /// Unix timestamp of the pass.
    pub tested_at: i64,
}

impl TestResult {
    /// Builds a result; `passed` is derived from `errors`.
    pub fn new(errors: Vec<String>, warnings: Vec<String>, tested_at: i64) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
            warnings,
            tested_at,
        }
    }
}

/// Summary of one completed iteration. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationResult {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Paths that did not exist before this iteration.
    pub files_created: Vec<String>,
    /// Existing paths whose content was replaced.
    pub files_updated: Vec<String>,
    /// Validation result for the accumulated set after this iteration.
    pub test_result: Option<TestResult>,
    /// Model-provided or synthesized summary.
    pub summary: String,
    /// Unix timestamp when the iteration finished.
    pub timestamp: i64,
}

/// Coarse build phase shown in prompts and progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Setup,
    Components,
    Pages,
    Features,
    Api,
    Testing,
    Complete,
}

impl BuildPhase {
    /// Phase for a 1-based iteration number.
    pub fn for_iteration(iteration: u32) -> Self {
        match iteration {
            0 | 1 => BuildPhase::Setup,
            2..=3 => BuildPhase::Components,
            4..=5 => BuildPhase::Pages,
            6..=7 => BuildPhase::Features,
            8..=9 => BuildPhase::Api,
            _ => BuildPhase::Testing,
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Setup => "setup",
            BuildPhase::Components => "components",
            BuildPhase::Pages => "pages",
            BuildPhase::Features => "features",
            BuildPhase::Api => "api",
            BuildPhase::Testing => "testing",
            BuildPhase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Progress snapshot carried in the build context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProgress {
    pub current_iteration: u32,
    pub total_iterations: u32,
    pub phase: BuildPhase,
    /// Ids of todos that reached `Completed`, in completion order.
    pub completed_tasks: Vec<String>,
    pub current_task: String,
    pub files_generated: usize,
    pub lines_of_code: usize,
    /// `current_iteration / total_iterations * 100`.
    pub percent: f64,
    pub last_test_result: Option<TestResult>,
    pub synced_at: Option<i64>,
    pub commit_sha: Option<String>,
}

impl BuildProgress {
    /// Progress before the first iteration.
    pub fn new(total_iterations: u32) -> Self {
        Self {
            current_iteration: 0,
            total_iterations,
            phase: BuildPhase::Setup,
            completed_tasks: Vec::new(),
            current_task: String::new(),
            files_generated: 0,
            lines_of_code: 0,
            percent: 0.0,
            last_test_result: None,
            synced_at: None,
            commit_sha: None,
        }
    }

    /// Records that `iteration` has finished (successfully or not).
    pub fn finish_iteration(&mut self, iteration: u32) {
        self.current_iteration = iteration;
        self.percent = if self.total_iterations == 0 {
            100.0
        } else {
            f64::from(iteration) / f64::from(self.total_iterations) * 100.0
        };
    }
}

const ADDENDUM_HEADING: &str = "\n\n## Implementation Notes (Iteration ";

/// Everything later prompts need to know about the build so far.
///
/// Owned by the orchestrator; handed out only as clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Requirements document, with implementation notes appended over time.
    pub requirements: String,
    pub todo_list: Vec<TodoItem>,
    pub progress: BuildProgress,
    /// Append-only, ordered by iteration number.
    pub iteration_history: Vec<IterationResult>,
}

impl BuildContext {
    /// Creates a context for a fresh build.
    pub fn new(requirements: &str, todo_list: Vec<TodoItem>, total_iterations: u32) -> Self {
        Self {
            requirements: requirements.to_string(),
            todo_list,
            progress: BuildProgress::new(total_iterations),
            iteration_history: Vec::new(),
        }
    }

    /// Indexes of todos scheduled for `iteration`.
    pub fn todos_for_iteration(&self, iteration: u32) -> Vec<usize> {
        self.todo_list
            .iter()
            .enumerate()
            .filter(|(_, t)| t.target_iteration == iteration)
            .map(|(i, _)| i)
            .collect()
    }

    /// Looks up a todo by id.
    pub fn todo_mut(&mut self, id: &str) -> Option<&mut TodoItem> {
        self.todo_list.iter_mut().find(|t| t.id == id)
    }

    /// Appends an implementation-notes section to the requirements document.
    pub fn append_addendum(&mut self, iteration: u32, notes: &str) {
        let notes = notes.trim();
        if notes.is_empty() {
            return;
        }
        self.requirements.push_str(&format!(
            "{}{})\n{}",
            ADDENDUM_HEADING, iteration, notes
        ));
    }

    /// The requirements document as submitted, without appended notes.
    pub fn original_requirements(&self) -> &str {
        match self.requirements.find(ADDENDUM_HEADING) {
            Some(at) => &self.requirements[..at],
            None => &self.requirements,
        }
    }

    /// Appends to the history.
    ///
    /// Entries must arrive in strictly increasing iteration order.
    pub fn push_history(&mut self, result: IterationResult) -> Result<()> {
        if let Some(last) = self.iteration_history.last() {
            if result.iteration <= last.iteration {
                return Err(ForgeError::InvalidStateTransition {
                    from: format!("history at iteration {}", last.iteration),
                    to: format!("iteration {}", result.iteration),
                });
            }
        }
        self.iteration_history.push(result);
        Ok(())
    }

    /// Renders the todo list as checklist lines.
    pub fn todo_checklist(&self) -> String {
        self.todo_list
            .iter()
            .map(|item| {
                let test = match &item.test_result {
                    Some(r) if r.passed => " (Test: PASS)",
                    Some(_) => " (Test: FAIL)",
                    None => "",
                };
                format!("{} {}{}", item.status.marker(), item.task, test)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Severity tag on a build log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-visible event in the build log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLogEntry {
    /// Iteration the event belongs to (0 before the loop starts).
    pub iteration: u32,
    pub severity: LogSeverity,
    pub message: String,
    /// Unix timestamp.
    pub at: i64,
}
