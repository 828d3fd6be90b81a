use crate::harness::{Assertion, Scenario, StateMatch};
use forge_core::{CollaboratorErrorKind, TodoStatus};

#[test]
fn test_timeouts_are_retried_with_the_error() {
    Scenario::new("timeouts_are_retried_with_the_error")
        .from_fixture("default")
        .iterations(3)
        .generator_fails(2, 2, CollaboratorErrorKind::Timeout)
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 2, 3])
        .assert(Assertion::GeneratorCallsFor {
            iteration: 2,
            count: 3,
        })
        .assert(Assertion::RetryPromptSeen { iteration: 2 })
        .assert_todo("ui-components", TodoStatus::Completed)
        .assert_log_contains("Attempt 1 failed: Request timed out")
        .run()
        .unwrap();
}

#[test]
fn test_exhausted_iteration_is_skipped() {
    Scenario::new("exhausted_iteration_is_skipped")
        .from_fixture("default")
        .iterations(3)
        .generator_fails(2, 10, CollaboratorErrorKind::Timeout)
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 3])
        // One attempt plus three retries
        .assert(Assertion::GeneratorCallsFor {
            iteration: 2,
            count: 4,
        })
        .assert(Assertion::FailedIterations(vec![2]))
        .assert_todo("ui-components", TodoStatus::Failed)
        .assert_log_contains("Iteration 2 failed: Request timed out")
        .assert_log_contains("1 tasks failed")
        .run()
        .unwrap();
}

#[test]
fn test_budget_resets_after_a_skipped_iteration() {
    Scenario::new("budget_resets_after_a_skipped_iteration")
        .from_fixture("default")
        .iterations(3)
        .generator_fails(2, 10, CollaboratorErrorKind::Timeout)
        .generator_fails(3, 3, CollaboratorErrorKind::RateLimited)
        .run_build()
        .assert_history(&[1, 3])
        .assert(Assertion::GeneratorCallsFor {
            iteration: 3,
            count: 4,
        })
        .run()
        .unwrap();
}

#[test]
fn test_payment_failure_mid_build_is_not_retried() {
    Scenario::new("payment_failure_mid_build_is_not_retried")
        .from_fixture("default")
        .iterations(3)
        .generator_fails(2, 1, CollaboratorErrorKind::PaymentRequired)
        .run_build()
        .assert(Assertion::GeneratorCallsFor {
            iteration: 2,
            count: 1,
        })
        .assert_history(&[1, 3])
        .assert_final_state(StateMatch::Complete)
        .run()
        .unwrap();
}

#[test]
fn test_unknown_failure_gets_one_retry() {
    Scenario::new("unknown_failure_gets_one_retry")
        .from_fixture("default")
        .iterations(2)
        .generator_fails(1, 5, CollaboratorErrorKind::Other)
        .run_build()
        .assert(Assertion::GeneratorCallsFor {
            iteration: 1,
            count: 2,
        })
        .assert_history(&[2])
        .assert(Assertion::FailedIterations(vec![1]))
        .run()
        .unwrap();
}

#[test]
fn test_context_too_large_shrinks_the_prompt() {
    Scenario::new("context_too_large_shrinks_the_prompt")
        .from_fixture("default")
        .iterations(2)
        .generator_fails(2, 1, CollaboratorErrorKind::ContextTooLarge)
        .run_build()
        .assert(Assertion::GeneratorCallsFor {
            iteration: 2,
            count: 2,
        })
        .assert_history(&[1, 2])
        .assert_log_contains("Attempt 1 failed: Context too large")
        .run()
        .unwrap();
}

#[test]
fn test_sync_failure_is_only_a_warning() {
    Scenario::new("sync_failure_is_only_a_warning")
        .from_fixture("default")
        .iterations(2)
        .sync_fails()
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 2])
        .assert(Assertion::SyncCount(0))
        .assert_log_contains("source control sync failed: remote hung up")
        .assert(Assertion::FailedIterations(vec![]))
        .run()
        .unwrap();
}
