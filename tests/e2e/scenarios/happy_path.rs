use crate::harness::{Assertion, Scenario, StateMatch};
use forge_core::{BuildReport, TodoStatus};

#[test]
fn test_full_build_completes() {
    Scenario::new("full_build_completes")
        .from_fixture("default")
        .run_build()
        .assert_final_state(StateMatch::Complete)
        .assert_history(&[1, 2, 3, 4])
        .assert_generator_calls(4)
        .assert(Assertion::AllTodosCompleted)
        .assert(Assertion::FileCount(13))
        .assert(Assertion::LastTestPassed)
        .assert_log_contains("Build complete: 13 files")
        .assert_no_snapshot()
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_estimator_picks_iteration_count() {
    // The print shop needs auth, payments and uploads: medium tier
    Scenario::new("estimator_picks_iteration_count")
        .from_fixture("default")
        .run_build()
        .assert(Assertion::Custom(Box::new(|report: &BuildReport| {
            anyhow::ensure!(
                report.context.progress.total_iterations == 4,
                "expected 4 iterations, got {}",
                report.context.progress.total_iterations
            );
            anyhow::ensure!(report.projected_cost >= 5.0, "price below the minimum charge");
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_later_iteration_rewrites_home_page() {
    Scenario::new("later_iteration_rewrites_home_page")
        .from_fixture("default")
        .run_build()
        .assert(Assertion::FileContentContains {
            path: "app/page.tsx".into(),
            content: "PRINTS.map".into(),
        })
        .assert(Assertion::Custom(Box::new(|report: &BuildReport| {
            let last = report
                .context
                .iteration_history
                .last()
                .ok_or_else(|| anyhow::anyhow!("empty history"))?;
            anyhow::ensure!(
                last.files_updated == vec!["app/page.tsx".to_string()],
                "unexpected updates: {:?}",
                last.files_updated
            );
            anyhow::ensure!(last.files_created.len() == 2, "expected 2 new files");
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_progress_blocks_drive_todos_and_notes() {
    Scenario::new("progress_blocks_drive_todos_and_notes")
        .from_fixture("default")
        .run_build()
        .assert(Assertion::RequirementsContain(
            "## Implementation Notes (Iteration 1)".into(),
        ))
        .assert(Assertion::RequirementsContain("formatPrice()".into()))
        .assert_todo("setup", TodoStatus::Completed)
        .assert_todo("payments", TodoStatus::Completed)
        .assert_todo("uploads", TodoStatus::Completed)
        .assert(Assertion::Custom(Box::new(|report: &BuildReport| {
            let summaries: Vec<&str> = report
                .context
                .iteration_history
                .iter()
                .map(|r| r.summary.as_str())
                .collect();
            anyhow::ensure!(
                summaries[1] == "Added the button, header and print card components",
                "unexpected summary {:?}",
                summaries[1]
            );
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_every_iteration_is_synced() {
    Scenario::new("every_iteration_is_synced")
        .from_fixture("default")
        .sync_to_repo()
        .run_build()
        .assert(Assertion::SyncCount(4))
        .assert_log_contains("Synced to forge-e2e/print-shop")
        .assert(Assertion::Custom(Box::new(|report: &BuildReport| {
            anyhow::ensure!(
                report.context.progress.commit_sha.is_some(),
                "no commit recorded"
            );
            Ok(())
        })))
        .run()
        .unwrap();
}
