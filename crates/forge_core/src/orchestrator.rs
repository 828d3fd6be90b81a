//! The iterative build loop.
//!
//! An [`Orchestrator`] owns one build at a time: it verifies payment, then runs
//! every planned iteration in order (prompt, generate, parse, merge, validate,
//! sync), retrying failed attempts according to the recovery policy. A failed
//! iteration is recorded and skipped; only the payment gate can stop a build.
//!
//! Observers receive owned snapshots of what changed after each stage. They
//! never see the build's mutable state.

use crate::collaborators::{Bundler, Generator, PaymentGate, SourceControl};
use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::estimate::estimate;
use crate::file_set::FileSet;
use crate::merge::merge_generated_files;
use crate::parser::{parse_iteration_output, CurrentFileScanner, ProgressUpdate};
use crate::planner::generate_todos;
use crate::prompt::{build_iteration_prompt, iteration_focus, ContextBounds};
use crate::recovery::{classify_error, BuildError, ErrorKind, RecoveryState};
use crate::recovery_store::RecoveryStore;
use crate::types::{
    BuildContext, BuildLogEntry, BuildPhase, BuildProgress, BuildState, IterationResult,
    LogSeverity, TestResult, TodoStatus,
};
use crate::usage::UsageLedger;
use crate::validate::test_generated_files;
use crate::{current_timestamp, TimeProvider};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A change in a running build, delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    StateChanged {
        from: BuildState,
        to: BuildState,
    },
    IterationStarted {
        iteration: u32,
        total: u32,
        /// 1-based attempt within the iteration.
        attempt: u32,
    },
    /// The generator started writing a new file.
    CurrentFile {
        iteration: u32,
        path: String,
    },
    IterationFinished {
        result: IterationResult,
        progress: BuildProgress,
    },
    Log(BuildLogEntry),
    Completed {
        final_state: BuildState,
        file_count: usize,
    },
}

/// Receives build events.
pub trait BuildObserver: Send + Sync {
    fn on_event(&self, event: &BuildEvent);
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<BuildEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BuildObserver for ChannelObserver {
    fn on_event(&self, event: &BuildEvent) {
        // A dropped receiver just means nobody is watching
        let _ = self.tx.send(event.clone());
    }
}

/// Final outcome of a build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub build_id: String,
    pub final_state: BuildState,
    pub files: FileSet,
    pub context: BuildContext,
    pub log: Vec<BuildLogEntry>,
    pub usage: UsageLedger,
    /// Price quoted before the build started.
    pub projected_cost: f64,
    /// Provider cost of every generation call in this run.
    pub actual_cost: f64,
    /// Archive produced by the bundler, when one is attached and succeeded.
    pub bundle: Option<Vec<u8>>,
}

impl BuildReport {
    /// Iterations whose todos ended up failed.
    pub fn failed_iterations(&self) -> Vec<u32> {
        let mut failed: Vec<u32> = self
            .context
            .todo_list
            .iter()
            .filter(|t| t.status == TodoStatus::Failed)
            .map(|t| t.target_iteration)
            .collect();
        failed.dedup();
        failed
    }
}

/// Mutable state of the build in flight.
struct BuildRun {
    build_id: String,
    state: BuildState,
    context: BuildContext,
    files: FileSet,
    recovery: RecoveryState,
    log: Vec<BuildLogEntry>,
    usage: UsageLedger,
    projected_cost: f64,
}

enum AttemptOutcome {
    Succeeded(String),
    Abandoned(BuildError),
}

/// Runs builds against a set of collaborators.
pub struct Orchestrator {
    config: Config,
    generator: Arc<dyn Generator>,
    payment: Arc<dyn PaymentGate>,
    source_control: Option<(Arc<dyn SourceControl>, String)>,
    bundler: Option<Arc<dyn Bundler>>,
    store: Option<Arc<RecoveryStore>>,
    clock: Arc<dyn TimeProvider>,
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("source_control", &self.source_control.as_ref().map(|(_, repo)| repo))
            .field("bundler", &self.bundler.is_some())
            .field("store", &self.store)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(config: Config, generator: Arc<dyn Generator>, payment: Arc<dyn PaymentGate>) -> Self {
        Self {
            config,
            generator,
            payment,
            source_control: None,
            bundler: None,
            store: None,
            clock: Arc::new(current_timestamp),
            observers: Vec::new(),
        }
    }

    /// Pushes the file set to `repo` after every iteration.
    pub fn with_source_control(mut self, source_control: Arc<dyn SourceControl>, repo: &str) -> Self {
        self.source_control = Some((source_control, repo.to_string()));
        self
    }

    /// Bundles the final file set once the loop completes.
    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = Some(bundler);
        self
    }

    /// Persists a snapshot after every iteration so the build can be resumed.
    pub fn with_recovery_store(mut self, store: Arc<RecoveryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a custom time provider (for testing).
    pub fn with_time_provider(mut self, provider: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(provider);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: BuildEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    fn log(&self, run: &mut BuildRun, iteration: u32, severity: LogSeverity, message: String) {
        match severity {
            LogSeverity::Warning | LogSeverity::Error => {
                warn!(build_id = %run.build_id, iteration, "{}", message)
            }
            _ => info!(build_id = %run.build_id, iteration, "{}", message),
        }
        let entry = BuildLogEntry {
            iteration,
            severity,
            message,
            at: self.clock.now(),
        };
        run.log.push(entry.clone());
        self.emit(BuildEvent::Log(entry));
    }

    fn transition(&self, run: &mut BuildRun, next: BuildState) -> Result<()> {
        if !run.state.can_transition_to(&next) {
            return Err(ForgeError::InvalidStateTransition {
                from: run.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!(build_id = %run.build_id, from = %run.state, to = %next, "state transition");
        let from = std::mem::replace(&mut run.state, next.clone());
        self.emit(BuildEvent::StateChanged { from, to: next });
        Ok(())
    }

    /// Runs a full build of `prd`.
    ///
    /// Fails only when the payment gate refuses or cannot check `session_id`; then no
    /// generation call is ever made. Every other failure is recorded in the
    /// report's log and the build still completes.
    pub async fn run(&self, build_id: &str, prd: &str, session_id: Option<&str>) -> Result<BuildReport> {
        let quote = estimate(prd, &self.config.pricing);
        let total = self
            .config
            .build
            .iterations
            .unwrap_or(quote.tokens.iteration_count)
            .max(1);
        let todos = generate_todos(prd, total);

        info!(
            build_id,
            tier = %quote.analysis.tier,
            iterations = total,
            projected_cost = quote.pricing.total_cost,
            "starting build"
        );

        let mut run = BuildRun {
            build_id: build_id.to_string(),
            state: BuildState::VerifyingPayment,
            context: BuildContext::new(prd, todos, total),
            files: FileSet::new(),
            recovery: RecoveryState::new(self.config.build.max_retries),
            log: Vec::new(),
            usage: UsageLedger::new(&self.config.pricing),
            projected_cost: quote.pricing.total_cost,
        };

        if let Err(err) = self.verify_payment(session_id).await {
            let reason = err.to_string();
            self.log(&mut run, 0, LogSeverity::Error, reason.clone());
            self.transition(&mut run, BuildState::Error { reason })?;
            self.emit(BuildEvent::Completed {
                final_state: run.state.clone(),
                file_count: 0,
            });
            return Err(err);
        }

        self.transition(&mut run, BuildState::Building)?;
        self.log(
            &mut run,
            0,
            LogSeverity::Info,
            format!("Payment verified, planning {} iterations", total),
        );

        self.run_loop(run, 1).await
    }

    /// Picks up a build from its recovery snapshot.
    ///
    /// Returns `None` when there is no store attached or no live snapshot for
    /// `build_id`. The payment gate is not consulted again.
    pub async fn resume(&self, build_id: &str) -> Result<Option<BuildReport>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(snapshot) = store.load(build_id)? else {
            return Ok(None);
        };

        let quote = estimate(snapshot.context.original_requirements(), &self.config.pricing);
        let next = snapshot.context.progress.current_iteration + 1;
        let mut recovery = snapshot.state;
        recovery.max_retries = self.config.build.max_retries;
        recovery.retry_count = 0;

        let mut run = BuildRun {
            build_id: build_id.to_string(),
            state: BuildState::Building,
            context: snapshot.context,
            files: snapshot.files,
            recovery,
            log: Vec::new(),
            usage: UsageLedger::new(&self.config.pricing),
            projected_cost: quote.pricing.total_cost,
        };

        let message = format!("Resuming at iteration {} with {} files", next, run.files.len());
        self.log(&mut run, next - 1, LogSeverity::Info, message);

        self.run_loop(run, next).await.map(Some)
    }

    async fn verify_payment(&self, session_id: Option<&str>) -> Result<()> {
        let session_id = match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ForgeError::PaymentRequired("no payment session".to_string())),
        };

        match self.payment.is_paid(session_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ForgeError::PaymentRequired(format!(
                "session {} is not paid",
                session_id
            ))),
            Err(e) => Err(ForgeError::PaymentVerificationFailed(e.message)),
        }
    }

    async fn run_loop(&self, mut run: BuildRun, first: u32) -> Result<BuildReport> {
        let total = run.context.progress.total_iterations;

        for iteration in first..=total {
            self.run_iteration(&mut run, iteration).await;
        }

        if let Err(e) = self.transition(&mut run, BuildState::Complete) {
            warn!(build_id = %run.build_id, error = %e, "build did not reach complete");
        }
        run.context.progress.phase = BuildPhase::Complete;

        if let Some(store) = &self.store {
            if let Err(e) = store.clear(&run.build_id) {
                warn!(build_id = %run.build_id, error = %e, "failed to clear recovery snapshot");
            }
        }

        let bundle = self.bundle(&mut run).await;

        let failed = run
            .context
            .todo_list
            .iter()
            .filter(|t| t.status == TodoStatus::Failed)
            .count();
        let summary = format!(
            "Build complete: {} files, {} lines of code",
            run.files.len(),
            run.files.total_lines()
        );
        if failed == 0 {
            self.log(&mut run, total, LogSeverity::Success, summary);
        } else {
            self.log(
                &mut run,
                total,
                LogSeverity::Warning,
                format!("{} ({} tasks failed)", summary, failed),
            );
        }

        self.emit(BuildEvent::Completed {
            final_state: run.state.clone(),
            file_count: run.files.len(),
        });

        let actual_cost = run.usage.actual_cost();
        info!(
            build_id = %run.build_id,
            files = run.files.len(),
            projected_cost = run.projected_cost,
            actual_cost,
            "build finished"
        );

        Ok(BuildReport {
            build_id: run.build_id,
            final_state: run.state,
            files: run.files,
            context: run.context,
            log: run.log,
            usage: run.usage,
            projected_cost: run.projected_cost,
            actual_cost,
            bundle,
        })
    }

    async fn bundle(&self, run: &mut BuildRun) -> Option<Vec<u8>> {
        let bundler = self.bundler.as_ref()?;
        let total = run.context.progress.total_iterations;
        match bundler.bundle(&run.files, &run.build_id).await {
            Ok(bytes) => {
                let message = format!("Bundled {} files ({} bytes)", run.files.len(), bytes.len());
                self.log(run, total, LogSeverity::Success, message);
                Some(bytes)
            }
            Err(e) => {
                let err = ForgeError::Bundle(e.message);
                self.log(run, total, LogSeverity::Warning, err.to_string());
                None
            }
        }
    }

    /// Runs one iteration. Nothing raised inside it escapes; failures are
    /// logged against the iteration and the build moves on.
    async fn run_iteration(&self, run: &mut BuildRun, iteration: u32) {
        if let Err(err) = self.try_iteration(run, iteration).await {
            let error = classify_error(&err, iteration);
            self.fail_iteration(run, iteration, &error);
        }
        self.save_snapshot(run);
    }

    async fn try_iteration(&self, run: &mut BuildRun, iteration: u32) -> Result<()> {
        let total = run.context.progress.total_iterations;
        if run.state != BuildState::Building {
            self.transition(run, BuildState::Building)?;
        }

        let scheduled = run.context.todos_for_iteration(iteration);
        for &index in &scheduled {
            run.context.todo_list[index].advance_to(TodoStatus::InProgress);
        }
        run.context.progress.phase = BuildPhase::for_iteration(iteration);
        run.context.progress.current_task = scheduled
            .first()
            .map(|&i| run.context.todo_list[i].task.clone())
            .unwrap_or_else(|| iteration_focus(iteration, total).lines().next().unwrap_or_default().to_string());

        let message = format!(
            "Starting iteration {}/{}: {}",
            iteration, total, run.context.progress.current_task
        );
        self.log(run, iteration, LogSeverity::Info, message);

        match self.generate_with_retries(run, iteration).await {
            AttemptOutcome::Succeeded(raw) => self.finish_iteration(run, iteration, &raw).await?,
            AttemptOutcome::Abandoned(error) => self.fail_iteration(run, iteration, &error),
        }
        Ok(())
    }

    async fn generate_with_retries(&self, run: &mut BuildRun, iteration: u32) -> AttemptOutcome {
        let total = run.context.progress.total_iterations;
        let mut bounds = ContextBounds::for_iteration(iteration);
        let mut retry_error: Option<String> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.emit(BuildEvent::IterationStarted {
                iteration,
                total,
                attempt,
            });

            let err = match self
                .generate_once(run, iteration, attempt, &bounds, retry_error.as_deref())
                .await
            {
                Ok(raw) => return AttemptOutcome::Succeeded(raw),
                Err(err) => err,
            };

            let error = classify_error(&err, iteration);
            if !run.recovery.should_retry(&error) {
                run.recovery.record_failure(error.clone());
                return AttemptOutcome::Abandoned(error);
            }

            let delay = self.config.build.retry_delay(run.recovery.retry_count);
            run.recovery.record_failure(error.clone());
            self.log(
                run,
                iteration,
                LogSeverity::Warning,
                format!(
                    "Attempt {} failed: {}. Retrying in {}ms",
                    attempt,
                    error.kind,
                    delay.as_millis()
                ),
            );

            if error.kind == ErrorKind::ContextTooLarge {
                bounds = bounds.shrink();
                debug!(iteration, max_files = bounds.max_previous_files, "shrinking prompt context");
            }
            retry_error = Some(error.error);
            tokio::time::sleep(delay).await;
        }
    }

    /// One generation call, with the stream fully buffered.
    async fn generate_once(
        &self,
        run: &mut BuildRun,
        iteration: u32,
        attempt: u32,
        bounds: &ContextBounds,
        retry_error: Option<&str>,
    ) -> Result<String> {
        let prompt = build_iteration_prompt(&run.context, &run.files, iteration, bounds, retry_error);
        debug!(
            build_id = %run.build_id,
            iteration,
            attempt,
            prompt_chars = prompt.text_len(),
            "calling generator"
        );

        let mut stream = self
            .generator
            .generate(&prompt.system, &prompt.user, self.config.build.max_output_tokens)
            .await?;

        let mut scanner = CurrentFileScanner::new();
        let mut raw = String::new();
        let mut failure = None;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    for path in scanner.push(&text) {
                        self.emit(BuildEvent::CurrentFile { iteration, path });
                    }
                    raw.push_str(&text);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let prompt_text = format!("{}{}", prompt.system, prompt.user);
        run.usage.record(iteration, attempt, &prompt_text, &raw);

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(raw),
        }
    }

    async fn finish_iteration(&self, run: &mut BuildRun, iteration: u32, raw: &str) -> Result<()> {
        let total = run.context.progress.total_iterations;
        let parsed = parse_iteration_output(raw);
        let (merged, merge) = merge_generated_files(&run.files, &parsed.files, &self.config.merge);
        run.files = merged;
        debug!(
            iteration,
            parsed = parsed.files.len(),
            created = merge.created.len(),
            updated = merge.updated.len(),
            skipped = merge.skipped.len(),
            "merged iteration output"
        );

        self.transition(run, BuildState::Testing)?;
        let test_result = test_generated_files(&run.files, &self.config.validation, self.clock.now());
        self.report_test_result(run, iteration, &test_result);
        for index in run.context.todos_for_iteration(iteration) {
            run.context.todo_list[index].test_result = Some(test_result.clone());
        }

        self.transition(run, BuildState::Syncing)?;
        self.sync(run, iteration).await;

        let summary = self.apply_progress_update(run, iteration, parsed.progress);
        for index in run.context.todos_for_iteration(iteration) {
            let todo = &mut run.context.todo_list[index];
            if todo.advance_to(TodoStatus::Completed) {
                run.context.progress.completed_tasks.push(todo.id.clone());
            }
        }

        let progress = &mut run.context.progress;
        progress.files_generated = run.files.len();
        progress.lines_of_code = run.files.total_lines();
        progress.last_test_result = Some(test_result.clone());
        progress.finish_iteration(iteration);

        let result = IterationResult {
            iteration,
            files_created: merge.created,
            files_updated: merge.updated,
            test_result: Some(test_result),
            summary,
            timestamp: self.clock.now(),
        };
        run.context.push_history(result.clone())?;
        run.recovery.record_success(iteration, &run.files);

        self.log(
            run,
            iteration,
            LogSeverity::Success,
            format!(
                "Iteration {}/{} complete: {} created, {} updated",
                iteration,
                total,
                result.files_created.len(),
                result.files_updated.len()
            ),
        );
        self.emit(BuildEvent::IterationFinished {
            result,
            progress: run.context.progress.clone(),
        });
        Ok(())
    }

    fn report_test_result(&self, run: &mut BuildRun, iteration: u32, result: &TestResult) {
        if result.passed {
            self.log(
                run,
                iteration,
                LogSeverity::Success,
                format!("Tests passed ({} warnings)", result.warnings.len()),
            );
        } else {
            self.log(
                run,
                iteration,
                LogSeverity::Warning,
                format!(
                    "Tests failed with {} errors: {}",
                    result.errors.len(),
                    result.errors.join("; ")
                ),
            );
        }
    }

    async fn sync(&self, run: &mut BuildRun, iteration: u32) {
        if !self.config.build.sync_enabled {
            return;
        }
        let Some((source_control, repo)) = &self.source_control else {
            return;
        };

        let message = format!("Iteration {}: {}", iteration, run.context.progress.current_task);
        match source_control.push(repo, &run.files, &message).await {
            Ok(pushed) => {
                run.context.progress.synced_at = Some(self.clock.now());
                run.context.progress.commit_sha = Some(pushed.commit_sha.clone());
                self.log(
                    run,
                    iteration,
                    LogSeverity::Success,
                    format!("Synced to {} ({})", repo, pushed.commit_sha),
                );
            }
            Err(e) => {
                let err = ForgeError::Sync(e.message);
                self.log(run, iteration, LogSeverity::Warning, err.to_string());
            }
        }
    }

    /// Applies the generator's progress block and returns the iteration summary.
    fn apply_progress_update(
        &self,
        run: &mut BuildRun,
        iteration: u32,
        update: Option<ProgressUpdate>,
    ) -> String {
        let Some(update) = update else {
            return format!("Iteration {}: {} files in the project", iteration, run.files.len());
        };

        if update.iteration != iteration {
            debug!(iteration, reported = update.iteration, "progress block names another iteration");
        }

        for change in &update.todo_updates {
            let Some(status) = TodoStatus::parse(&change.status) else {
                debug!(id = %change.id, status = %change.status, "ignoring unknown todo status");
                continue;
            };
            let Some(todo) = run.context.todo_mut(&change.id) else {
                debug!(id = %change.id, "ignoring update for unknown todo");
                continue;
            };
            if todo.advance_to(status) {
                if status == TodoStatus::Completed {
                    let id = todo.id.clone();
                    run.context.progress.completed_tasks.push(id);
                }
            } else {
                debug!(id = %change.id, from = %todo.status, to = %status, "ignoring backward todo update");
            }
        }

        if let Some(notes) = update.prd_addendum.as_deref() {
            run.context.append_addendum(iteration, notes);
        }

        if update.summary.trim().is_empty() {
            format!("Iteration {}: {} files in the project", iteration, run.files.len())
        } else {
            update.summary
        }
    }

    fn fail_iteration(&self, run: &mut BuildRun, iteration: u32, error: &BuildError) {
        for index in run.context.todos_for_iteration(iteration) {
            run.context.todo_list[index].advance_to(TodoStatus::Failed);
        }
        run.context.progress.finish_iteration(iteration);
        run.recovery.abandon_iteration();

        let mut message = format!("Iteration {} failed: {} ({})", iteration, error.kind, error.error);
        if let Some(suggestion) = &error.suggestion {
            message.push_str(". ");
            message.push_str(suggestion);
        }
        self.log(run, iteration, LogSeverity::Error, message);
    }

    fn save_snapshot(&self, run: &BuildRun) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&run.build_id, &run.recovery, &run.context, &run.files) {
            warn!(build_id = %run.build_id, error = %e, "failed to save recovery snapshot");
        }
    }
}
