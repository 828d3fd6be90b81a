use std::time::Duration;

use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Build actions
    RunBuild,
    Resume,

    // Time control
    Wait {
        duration: Duration,
    },
    WaitHours {
        hours: u64,
    },

    // Failure simulation
    /// Run the build and kill it while the iteration after `iteration` is generating.
    CrashAfter {
        iteration: u32,
    },
    Restart,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
