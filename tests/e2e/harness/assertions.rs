use anyhow::Result;
use forge_core::{BuildReport, BuildState, TodoStatus};

/// Declarative assertions on build outcomes
pub enum Assertion {
    // Lifecycle
    FinalState(StateMatch),
    /// Target states of every transition in the last build step, in order.
    StateSequence(Vec<StateMatch>),
    BuildRejected,
    /// The payment gate could not be reached.
    PaymentCheckFailed,
    NothingResumed,

    // Collaborators
    GeneratorCalls(usize),
    GeneratorCallsFor {
        iteration: u32,
        count: usize,
    },
    RetryPromptSeen {
        iteration: u32,
    },
    PaymentChecks(usize),
    SyncCount(usize),

    // Progress
    HistoryIterations(Vec<u32>),
    FailedIterations(Vec<u32>),
    TodoStatus {
        id: String,
        status: TodoStatus,
    },
    AllTodosCompleted,
    LastTestPassed,
    RequirementsContain(String),
    LogContains(String),

    // Files
    FileExists {
        path: String,
    },
    FileContentContains {
        path: String,
        content: String,
    },
    FileCount(usize),

    // Recovery
    SnapshotExists,
    NoSnapshot,

    // Custom
    Custom(Box<dyn Fn(&BuildReport) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FinalState(s) => write!(f, "FinalState({:?})", s),
            Self::StateSequence(s) => write!(f, "StateSequence({:?})", s),
            Self::BuildRejected => write!(f, "BuildRejected"),
            Self::PaymentCheckFailed => write!(f, "PaymentCheckFailed"),
            Self::NothingResumed => write!(f, "NothingResumed"),
            Self::GeneratorCalls(n) => write!(f, "GeneratorCalls({})", n),
            Self::GeneratorCallsFor { iteration, count } => {
                write!(f, "GeneratorCallsFor {{ iteration: {}, count: {} }}", iteration, count)
            }
            Self::RetryPromptSeen { iteration } => {
                write!(f, "RetryPromptSeen {{ iteration: {} }}", iteration)
            }
            Self::PaymentChecks(n) => write!(f, "PaymentChecks({})", n),
            Self::SyncCount(n) => write!(f, "SyncCount({})", n),
            Self::HistoryIterations(v) => write!(f, "HistoryIterations({:?})", v),
            Self::FailedIterations(v) => write!(f, "FailedIterations({:?})", v),
            Self::TodoStatus { id, status } => {
                write!(f, "TodoStatus {{ id: {:?}, status: {:?} }}", id, status)
            }
            Self::AllTodosCompleted => write!(f, "AllTodosCompleted"),
            Self::LastTestPassed => write!(f, "LastTestPassed"),
            Self::RequirementsContain(s) => write!(f, "RequirementsContain({:?})", s),
            Self::LogContains(s) => write!(f, "LogContains({:?})", s),
            Self::FileExists { path } => write!(f, "FileExists {{ path: {:?} }}", path),
            Self::FileContentContains { path, content } => {
                write!(f, "FileContentContains {{ path: {:?}, content: {:?} }}", path, content)
            }
            Self::FileCount(n) => write!(f, "FileCount({})", n),
            Self::SnapshotExists => write!(f, "SnapshotExists"),
            Self::NoSnapshot => write!(f, "NoSnapshot"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Match against build states
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateMatch {
    VerifyingPayment,
    Building,
    Testing,
    Syncing,
    Complete,
    Error,
}

impl StateMatch {
    pub fn matches(&self, state: &BuildState) -> bool {
        matches!(
            (self, state),
            (StateMatch::VerifyingPayment, BuildState::VerifyingPayment)
                | (StateMatch::Building, BuildState::Building)
                | (StateMatch::Testing, BuildState::Testing)
                | (StateMatch::Syncing, BuildState::Syncing)
                | (StateMatch::Complete, BuildState::Complete)
                | (StateMatch::Error, BuildState::Error { .. })
        )
    }
}
