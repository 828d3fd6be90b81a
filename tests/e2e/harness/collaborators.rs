use async_trait::async_trait;
use forge_core::{
    BuildEvent, BuildObserver, CollaboratorError, CollaboratorErrorKind, FileSet, Generator,
    PaymentGate, PushResult, SourceControl, TextStream,
};
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One generate call as the generator saw it
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub iteration: u32,
    /// The system prompt carried a previous attempt's error.
    pub saw_retry_error: bool,
}

/// Pulls the iteration number out of the user prompt ("Build iteration N. ...").
fn prompt_iteration(user_prompt: &str) -> Option<u32> {
    user_prompt
        .strip_prefix("Build iteration ")?
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()
}

/// Serves recorded output per iteration, with injected failures and crashes.
pub struct ScriptedGenerator {
    outputs: BTreeMap<u32, String>,
    failures: Mutex<HashMap<u32, (u32, CollaboratorErrorKind)>>,
    crash_at: Mutex<Option<u32>>,
    crashed: Arc<Notify>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new(outputs: BTreeMap<u32, String>) -> Self {
        Self {
            outputs,
            failures: Mutex::new(HashMap::new()),
            crash_at: Mutex::new(None),
            crashed: Arc::new(Notify::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The next `times` calls for `iteration` fail with `kind`.
    pub fn fail(&self, iteration: u32, times: u32, kind: CollaboratorErrorKind) {
        self.failures.lock().unwrap().insert(iteration, (times, kind));
    }

    /// The first call for `iteration` hangs forever and signals [`Self::crashed`].
    pub fn arm_crash(&self, iteration: u32) {
        *self.crash_at.lock().unwrap() = Some(iteration);
    }

    pub fn crashed(&self) -> Arc<Notify> {
        self.crashed.clone()
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    fn injected_failure(&self, iteration: u32) -> Option<CollaboratorError> {
        let mut failures = self.failures.lock().unwrap();
        let (remaining, kind) = failures.get_mut(&iteration)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        let message = match *kind {
            CollaboratorErrorKind::Timeout => "request timed out".to_string(),
            CollaboratorErrorKind::RateLimited => "rate limit exceeded".to_string(),
            CollaboratorErrorKind::ContextTooLarge => "context length exceeded".to_string(),
            other => format!("injected {:?} failure", other),
        };
        Some(CollaboratorError::new(*kind, message))
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<TextStream, CollaboratorError> {
        let iteration = prompt_iteration(user_prompt).ok_or_else(|| {
            CollaboratorError::new(CollaboratorErrorKind::Malformed, "prompt names no iteration")
        })?;
        self.calls.lock().unwrap().push(GeneratorCall {
            iteration,
            saw_retry_error: system_prompt.contains("PREVIOUS ATTEMPT FAILED WITH ERROR"),
        });

        let crash = {
            let mut crash_at = self.crash_at.lock().unwrap();
            if *crash_at == Some(iteration) {
                crash_at.take()
            } else {
                None
            }
        };
        if crash.is_some() {
            self.crashed.notify_one();
            return Ok(futures::stream::pending::<Result<String, CollaboratorError>>().boxed());
        }

        if let Some(err) = self.injected_failure(iteration) {
            return Err(err);
        }

        let text = self.outputs.get(&iteration).ok_or_else(|| {
            CollaboratorError::new(
                CollaboratorErrorKind::Malformed,
                format!("no recorded output for iteration {}", iteration),
            )
        })?;

        let chunks: Vec<Result<String, CollaboratorError>> = text
            .split_inclusive('\n')
            .map(|line| Ok(line.to_string()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Answers every session with a fixed verdict.
/// How the scripted payment gate answers every check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentVerdict {
    Paid,
    Unpaid,
    /// The verification call itself fails.
    Unreachable,
}

pub struct ScriptedPaymentGate {
    verdict: PaymentVerdict,
    sessions: Mutex<Vec<String>>,
}

impl ScriptedPaymentGate {
    pub fn new(verdict: PaymentVerdict) -> Self {
        Self {
            verdict,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGate for ScriptedPaymentGate {
    async fn is_paid(&self, session_id: &str) -> Result<bool, CollaboratorError> {
        self.sessions.lock().unwrap().push(session_id.to_string());
        match self.verdict {
            PaymentVerdict::Paid => Ok(true),
            PaymentVerdict::Unpaid => Ok(false),
            PaymentVerdict::Unreachable => Err(CollaboratorError::from_http_status(
                503,
                "payment provider unavailable",
            )),
        }
    }
}

/// One recorded push
#[derive(Debug, Clone)]
pub struct Push {
    pub repo: String,
    pub file_count: usize,
    pub message: String,
}

/// Whether the attached repository takes pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Accepting,
    Rejecting,
}

/// Records pushes, or refuses all of them.
pub struct RecordingSourceControl {
    target: SyncTarget,
    pushes: Mutex<Vec<Push>>,
}

impl RecordingSourceControl {
    pub fn new(target: SyncTarget) -> Self {
        Self {
            target,
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn pushes(&self) -> Vec<Push> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for RecordingSourceControl {
    async fn push(
        &self,
        repo: &str,
        files: &FileSet,
        commit_message: &str,
    ) -> Result<PushResult, CollaboratorError> {
        if self.target == SyncTarget::Rejecting {
            return Err(CollaboratorError::new(
                CollaboratorErrorKind::Transport,
                "remote hung up",
            ));
        }
        let mut pushes = self.pushes.lock().unwrap();
        pushes.push(Push {
            repo: repo.to_string(),
            file_count: files.len(),
            message: commit_message.to_string(),
        });
        Ok(PushResult {
            commit_sha: format!("{:07x}", pushes.len()),
            url: None,
        })
    }
}

/// Keeps every event of the current build step.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BuildEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl BuildObserver for RecordingObserver {
    fn on_event(&self, event: &BuildEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
