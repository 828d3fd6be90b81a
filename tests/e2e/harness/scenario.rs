use super::assertions::{Assertion, StateMatch};
use super::collaborators::{PaymentVerdict, SyncTarget};
use super::runner::{BuildSetup, ScenarioRunner};
use super::steps::ScenarioStep;
use super::workspace::Fixture;
use forge_core::{CollaboratorErrorKind, TodoStatus};
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    setup: BuildSetup,
    setup_error: Option<String>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            setup: BuildSetup::default(),
            setup_error: None,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Load the requirements and recorded generator output from fixtures
    pub fn from_fixture(mut self, fixture_name: &str) -> Self {
        match Fixture::load(fixture_name) {
            Ok(fixture) => {
                self.setup.prd = fixture.prd;
                self.setup.outputs.extend(fixture.outputs);
            }
            Err(e) => self.setup_error = Some(format!("{:#}", e)),
        }
        self
    }

    /// Replace the requirements document
    pub fn with_prd(mut self, prd: &str) -> Self {
        self.setup.prd = prd.to_string();
        self
    }

    /// Set (or replace) the recorded output for one iteration
    pub fn generator_output(mut self, iteration: u32, output: &str) -> Self {
        self.setup.outputs.insert(iteration, output.to_string());
        self
    }

    /// Fix the iteration count instead of letting the estimator pick it
    pub fn iterations(mut self, count: u32) -> Self {
        self.setup.iterations = Some(count);
        self
    }

    /// The first `times` generate calls for `iteration` fail with `kind`
    pub fn generator_fails(mut self, iteration: u32, times: u32, kind: CollaboratorErrorKind) -> Self {
        self.setup.failures.push((iteration, times, kind));
        self
    }

    /// The payment gate reports the session as unpaid
    pub fn unpaid(mut self) -> Self {
        self.setup.payment = PaymentVerdict::Unpaid;
        self
    }

    /// Every payment check fails with a provider error
    pub fn payment_unreachable(mut self) -> Self {
        self.setup.payment = PaymentVerdict::Unreachable;
        self
    }

    /// Start the build without a payment session
    pub fn without_session(mut self) -> Self {
        self.setup.session = None;
        self
    }

    /// Start the build with a specific payment session id
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.setup.session = Some(session_id.to_string());
        self
    }

    /// Push the file set to source control after every iteration
    pub fn sync_to_repo(mut self) -> Self {
        self.setup.sync = Some(SyncTarget::Accepting);
        self
    }

    /// Attach a source-control target that rejects every push
    pub fn sync_fails(mut self) -> Self {
        self.setup.sync = Some(SyncTarget::Rejecting);
        self
    }

    // ===== Build actions =====

    /// Run the build from the top
    pub fn run_build(mut self) -> Self {
        self.steps.push(ScenarioStep::RunBuild);
        self
    }

    /// Resume the build from its recovery snapshot
    pub fn resume(mut self) -> Self {
        self.steps.push(ScenarioStep::Resume);
        self
    }

    // ===== Time control =====

    /// Wait for a duration
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    /// Wait for N hours
    pub fn wait_hours(mut self, hours: u64) -> Self {
        self.steps.push(ScenarioStep::WaitHours { hours });
        self
    }

    // ===== Failure simulation =====

    /// Run the build and crash once `iteration` is done
    pub fn crash_after(mut self, iteration: u32) -> Self {
        self.steps.push(ScenarioStep::CrashAfter { iteration });
        self
    }

    /// Restart after crash
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert the last build ended in a specific state
    pub fn assert_final_state(self, state: StateMatch) -> Self {
        self.assert(Assertion::FinalState(state))
    }

    /// Assert which iterations made it into the history
    pub fn assert_history(self, iterations: &[u32]) -> Self {
        self.assert(Assertion::HistoryIterations(iterations.to_vec()))
    }

    /// Assert a todo's status
    pub fn assert_todo(self, id: &str, status: TodoStatus) -> Self {
        self.assert(Assertion::TodoStatus {
            id: id.to_string(),
            status,
        })
    }

    /// Assert a file is in the final file set
    pub fn assert_file(self, path: &str) -> Self {
        self.assert(Assertion::FileExists {
            path: path.to_string(),
        })
    }

    /// Assert the total number of generate calls so far
    pub fn assert_generator_calls(self, count: usize) -> Self {
        self.assert(Assertion::GeneratorCalls(count))
    }

    /// Assert a log entry of the last build contains text
    pub fn assert_log_contains(self, text: &str) -> Self {
        self.assert(Assertion::LogContains(text.to_string()))
    }

    /// Assert a live recovery snapshot exists
    pub fn assert_snapshot_exists(self) -> Self {
        self.assert(Assertion::SnapshotExists)
    }

    /// Assert no live recovery snapshot
    pub fn assert_no_snapshot(self) -> Self {
        self.assert(Assertion::NoSnapshot)
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        if let Some(error) = self.setup_error {
            return ScenarioResult {
                name: self.name,
                success: false,
                steps_executed: 0,
                failure_step: Some(0),
                error: Some(format!("Failed to set up scenario: {}", error)),
            };
        }

        let mut runner = match ScenarioRunner::new(self.setup) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
