use crate::harness::{Assertion, Scenario, StateMatch};
use std::time::Duration;

#[test]
fn test_crash_after_iteration_resumes_from_snapshot() {
    Scenario::new("crash_after_iteration_resumes")
        .from_fixture("default")
        .crash_after(1)
        .restart()
        .assert_snapshot_exists()
        .resume()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 2, 3, 4])
        .assert_file("app/layout.tsx")
        .assert(Assertion::FileCount(13))
        .assert_log_contains("Resuming at iteration 2 with 4 files")
        .assert_no_snapshot()
        .run()
        .unwrap();
}

#[test]
fn test_resume_does_not_regenerate_or_recharge() {
    Scenario::new("resume_does_not_regenerate")
        .from_fixture("default")
        .crash_after(2)
        .restart()
        .resume()
        // Iteration 3 was interrupted once and regenerated once
        .assert(Assertion::GeneratorCallsFor {
            iteration: 1,
            count: 1,
        })
        .assert(Assertion::GeneratorCallsFor {
            iteration: 3,
            count: 2,
        })
        .assert_generator_calls(5)
        .assert(Assertion::PaymentChecks(1))
        .assert(Assertion::AllTodosCompleted)
        .run()
        .unwrap();
}

#[test]
fn test_snapshot_within_max_age_survives_a_wait() {
    Scenario::new("snapshot_within_max_age")
        .from_fixture("default")
        .crash_after(1)
        .wait(Duration::from_secs(30 * 60))
        .restart()
        .resume()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 2, 3, 4])
        .run()
        .unwrap();
}

#[test]
fn test_expired_snapshot_is_not_resumed() {
    Scenario::new("expired_snapshot_is_not_resumed")
        .from_fixture("default")
        .crash_after(2)
        .wait_hours(2)
        .restart()
        .resume()
        .assert(Assertion::NothingResumed)
        .assert_no_snapshot()
        .run()
        .unwrap();
}

#[test]
fn test_crash_before_first_iteration_leaves_nothing() {
    Scenario::new("crash_before_first_iteration")
        .from_fixture("default")
        .crash_after(0)
        .restart()
        .assert_no_snapshot()
        .resume()
        .assert(Assertion::NothingResumed)
        .run()
        .unwrap();
}

#[test]
fn test_completed_build_leaves_nothing_to_resume() {
    Scenario::new("completed_build_leaves_nothing")
        .from_fixture("default")
        .iterations(2)
        .run_build()
        .assert_no_snapshot()
        .resume()
        .assert(Assertion::NothingResumed)
        .run()
        .unwrap();
}

#[test]
fn test_skipped_iteration_survives_a_crash() {
    Scenario::new("skipped_iteration_survives_a_crash")
        .from_fixture("default")
        .iterations(3)
        .generator_fails(1, 10, forge_core::CollaboratorErrorKind::Timeout)
        .crash_after(1)
        .restart()
        .resume()
        .assert_history(&[2, 3])
        .assert(Assertion::FailedIterations(vec![1]))
        .run()
        .unwrap();
}
