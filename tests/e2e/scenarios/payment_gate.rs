use crate::harness::{Assertion, Scenario, StateMatch};

#[test]
fn test_unpaid_session_never_generates() {
    Scenario::new("unpaid_session_never_generates")
        .from_fixture("default")
        .unpaid()
        .run_build()
        .assert(Assertion::BuildRejected)
        .assert_final_state(StateMatch::Error)
        .assert(Assertion::PaymentChecks(1))
        .assert_generator_calls(0)
        .assert_no_snapshot()
        .run()
        .unwrap();
}

#[test]
fn test_unreachable_gate_is_fatal() {
    Scenario::new("unreachable_gate_is_fatal")
        .from_fixture("default")
        .payment_unreachable()
        .run_build()
        .assert(Assertion::PaymentCheckFailed)
        .assert_final_state(StateMatch::Error)
        .assert(Assertion::PaymentChecks(1))
        .assert_generator_calls(0)
        .assert_no_snapshot()
        .run()
        .unwrap();
}

#[test]
fn test_missing_session_skips_the_gate() {
    Scenario::new("missing_session_skips_the_gate")
        .from_fixture("default")
        .without_session()
        .run_build()
        .assert(Assertion::BuildRejected)
        .assert(Assertion::PaymentChecks(0))
        .assert_generator_calls(0)
        .run()
        .unwrap();
}

#[test]
fn test_blank_session_is_missing() {
    Scenario::new("blank_session_is_missing")
        .from_fixture("default")
        .with_session("   ")
        .run_build()
        .assert(Assertion::BuildRejected)
        .assert(Assertion::PaymentChecks(0))
        .run()
        .unwrap();
}

#[test]
fn test_paid_session_is_checked_once() {
    Scenario::new("paid_session_is_checked_once")
        .from_fixture("default")
        .iterations(2)
        .run_build()
        .assert(Assertion::PaymentChecks(1))
        .assert_final_state(StateMatch::Complete)
        .assert_log_contains("Payment verified, planning 2 iterations")
        .run()
        .unwrap();
}
