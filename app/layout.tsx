export default function Layout({ children }: { children: React.ReactNode }) {
  return <html><body>{children}</body></html>
}
=== END FILE ===
=== PROGRESS UPDATE ===
{\"iteration\": 1, \"summary\": \"Single page\"}
=== END PROGRESS ===";

/// Test that fixture loading finds the PRD and every recorded iteration
#[test]
fn test_fixture_loading() {
    let fixture = Fixture::load("default").unwrap();
    assert!(fixture.prd.starts_with("# Print Shop"));
    assert_eq!(fixture.outputs.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(fixture.outputs[&1].contains("=== FILE: app/layout.tsx ==="));
}

/// Test that a missing fixture fails the scenario instead of panicking
#[test]
fn test_missing_fixture_fails_scenario() {
    let result = Scenario::new("missing_fixture")
        .from_fixture("does-not-exist")
        .run_build()
        .run();

    assert!(!result.success);
    assert_eq!(result.failure_step, Some(0));
    assert!(result.error.unwrap().contains("Fixture not found"));
}

/// Test that inline requirements and output need no fixture at all
#[test]
fn test_inline_build() {
    Scenario::new("inline_build")
        .with_prd("A single landing page.")
        .iterations(1)
        .generator_output(1, TINY_OUTPUT)
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert(Assertion::FileCount(2))
        .assert(Assertion::LastTestPassed)
        .assert_history(&[1])
        .run()
        .unwrap();
}

/// Test that a fixture output can be replaced per iteration
#[test]
fn test_override_fixture_output() {
    Scenario::new("override_fixture_output")
        .from_fixture("default")
        .iterations(1)
        .generator_output(1, TINY_OUTPUT)
        .run_build()
        .assert(Assertion::FileContentContains {
            path: "app/page.tsx".into(),
            content: "Hello".into(),
        })
        .assert(Assertion::FileCount(2))
        .run()
        .unwrap();
}

/// Test that a failing assertion reports the step it failed at
#[test]
fn test_failure_reports_step() {
    let result = Scenario::new("failure_reports_step")
        .from_fixture("default")
        .iterations(1)
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert(Assertion::Custom(Box::new(|_: &BuildReport| anyhow::bail!("deliberate"))))
        .run();

    assert!(!result.success);
    assert_eq!(result.failure_step, Some(2));
    assert!(result.error.unwrap().contains("deliberate"));
}

/// Test that assertions on a missing report explain why
#[test]
fn test_assertion_without_report() {
    let result = Scenario::new("assertion_without_report")
        .from_fixture("default")
        .unpaid()
        .run_build()
        .assert_history(&[])
        .run();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("payment required"));
}

#[test]
#[should_panic(expected = "Scenario 'must_fail' failed at step 0")]
fn test_unwrap_panics_on_failure() {
    Scenario::new("must_fail")
        .from_fixture("default")
        .assert(Assertion::NothingResumed)
        .run()
        .unwrap();
}

#[test]
fn test_mock_clock_advances() {
    let clock = MockClock::new();
    let start = clock.now();
    let provider = clock.as_provider();

    clock.advance_minutes(30);
    clock.advance_hours(1);

    assert_eq!(clock.now() - start, 5400);
    assert_eq!(provider(), clock.now());
}
