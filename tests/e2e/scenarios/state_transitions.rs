use crate::harness::{Assertion, Scenario, StateMatch};
use forge_core::CollaboratorErrorKind;

#[test]
fn test_single_iteration_lifecycle() {
    Scenario::new("single_iteration_lifecycle")
        .from_fixture("default")
        .iterations(1)
        .run_build()
        .assert(Assertion::StateSequence(vec![
            StateMatch::Building,
            StateMatch::Testing,
            StateMatch::Syncing,
            StateMatch::Complete,
        ]))
        .run()
        .unwrap();
}

#[test]
fn test_each_iteration_returns_to_building() {
    Scenario::new("each_iteration_returns_to_building")
        .from_fixture("default")
        .iterations(2)
        .run_build()
        .assert(Assertion::StateSequence(vec![
            StateMatch::Building,
            StateMatch::Testing,
            StateMatch::Syncing,
            StateMatch::Building,
            StateMatch::Testing,
            StateMatch::Syncing,
            StateMatch::Complete,
        ]))
        .run()
        .unwrap();
}

#[test]
fn test_rejected_payment_goes_straight_to_error() {
    Scenario::new("rejected_payment_goes_straight_to_error")
        .from_fixture("default")
        .unpaid()
        .run_build()
        .assert(Assertion::StateSequence(vec![StateMatch::Error]))
        .run()
        .unwrap();
}

#[test]
fn test_skipped_iteration_never_tests() {
    Scenario::new("skipped_iteration_never_tests")
        .from_fixture("default")
        .iterations(1)
        .generator_fails(1, 10, CollaboratorErrorKind::Timeout)
        .run_build()
        .assert(Assertion::StateSequence(vec![
            StateMatch::Building,
            StateMatch::Complete,
        ]))
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[])
        .run()
        .unwrap();
}

#[test]
fn test_resumed_build_starts_in_building() {
    Scenario::new("resumed_build_starts_in_building")
        .from_fixture("default")
        .iterations(2)
        .crash_after(1)
        .restart()
        .resume()
        .assert(Assertion::StateSequence(vec![
            StateMatch::Testing,
            StateMatch::Syncing,
            StateMatch::Complete,
        ]))
        .run()
        .unwrap();
}
