//! Build command - run the orchestrator against recorded generator output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use forge_core::{
    BuildEvent, BuildObserver, BuildReport, CollaboratorError, CollaboratorErrorKind, Generator,
    LogSeverity, Orchestrator, PaymentGate, TextStream,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct BuildOptions {
    pub prd: PathBuf,
    pub session: Option<String>,
    pub replay: PathBuf,
    pub out: Option<PathBuf>,
    pub build_id: Option<String>,
    pub resume: bool,
}

/// Serves `iteration-N.txt` from a directory, line by line.
struct ReplayGenerator {
    dir: PathBuf,
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

#[async_trait]
impl Generator for ReplayGenerator {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<TextStream, CollaboratorError> {
        let iteration = prompt_iteration(user_prompt).ok_or_else(|| {
            CollaboratorError::new(CollaboratorErrorKind::Malformed, "prompt names no iteration")
        })?;
        let path = self.dir.join(format!("iteration-{}.txt", iteration));
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CollaboratorError::new(
                CollaboratorErrorKind::Other,
                format!("no recorded output at {}: {}", path.display(), e),
            )
        })?;

        let chunks: Vec<Result<String, CollaboratorError>> =
            text.split_inclusive('\n').map(|line| Ok(line.to_string())).collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Treats every supplied session as paid.
struct OfflinePaymentGate;

#[async_trait]
impl PaymentGate for OfflinePaymentGate {
    async fn is_paid(&self, _session_id: &str) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}

/// Drives a progress bar from build events.
struct ProgressObserver {
    bar: ProgressBar,
}

impl BuildObserver for ProgressObserver {
    fn on_event(&self, event: &BuildEvent) {
        match event {
            BuildEvent::IterationStarted {
                iteration,
                total,
                attempt,
            } => {
                self.bar.set_length(u64::from(*total));
                if *attempt > 1 {
                    self.bar
                        .set_message(format!("iteration {} (attempt {})", iteration, attempt));
                } else {
                    self.bar.set_message(format!("iteration {}", iteration));
                }
            }
            BuildEvent::CurrentFile { iteration, path } => {
                self.bar.set_message(format!("iteration {}: {}", iteration, path));
            }
            BuildEvent::IterationFinished { result, .. } => {
                self.bar.set_position(u64::from(result.iteration));
            }
            BuildEvent::Log(entry) => {
                let marker = match entry.severity {
                    LogSeverity::Info => style("·").dim(),
                    LogSeverity::Success => style("✓").green(),
                    LogSeverity::Warning => style("!").yellow(),
                    LogSeverity::Error => style("×").red(),
                };
                self.bar.println(format!("{} {}", marker, entry.message));
            }
            BuildEvent::StateChanged { .. } | BuildEvent::Completed { .. } => {}
        }
    }
}

fn print_report(report: &BuildReport) {
    let progress = &report.context.progress;
    println!();
    println!("{}", style("Build Report:").bold());
    println!("  Build id:         {}", report.build_id);
    println!("  Final state:      {}", style(&report.final_state).cyan());
    println!(
        "  Iterations:       {} of {} recorded",
        report.context.iteration_history.len(),
        progress.total_iterations
    );
    println!("  Files:            {}", report.files.len());
    println!("  Lines of code:    {}", report.files.total_lines());
    println!("  Projected price:  ${:.2}", report.projected_cost);
    println!("  Actual cost:      ${:.4}", report.actual_cost);

    let failed = report.failed_iterations();
    if !failed.is_empty() {
        let list: Vec<String> = failed.iter().map(u32::to_string).collect();
        println!("  Failed:           {}", style(list.join(", ")).red());
    }
    if let Some(result) = &progress.last_test_result {
        let status = if result.passed {
            style("passed".to_string()).green()
        } else {
            style(format!("failed ({} errors)", result.errors.len())).red()
        };
        println!("  Last test:        {}", status);
    }
}

pub async fn run(options: BuildOptions) -> Result<()> {
    let config = super::load_config()?;
    let store = Arc::new(super::open_store(&config)?);

    if !options.replay.is_dir() {
        anyhow::bail!("replay directory {} does not exist", options.replay.display());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(ReplayGenerator {
            dir: options.replay.clone(),
        }),
        Arc::new(OfflinePaymentGate),
    )
    .with_recovery_store(store)
    .with_observer(Arc::new(ProgressObserver { bar: bar.clone() }));

    let report = if options.resume {
        let build_id = options
            .build_id
            .as_deref()
            .context("--resume needs --build-id")?;
        orchestrator
            .resume(build_id)
            .await?
            .with_context(|| format!("No live recovery snapshot for build {}", build_id))?
    } else {
        let prd = super::read_prd(&options.prd)?;
        let build_id = options
            .build_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        orchestrator
            .run(&build_id, &prd, options.session.as_deref())
            .await?
    };
    bar.finish_and_clear();

    print_report(&report);

    if let Some(out) = options.out.as_deref() {
        write_report_files(&report, out)?;
    }

    Ok(())
}

fn write_report_files(report: &BuildReport, out: &Path) -> Result<()> {
    let written = super::write_files(&report.files, out)?;
    println!();
    println!("Wrote {} files to {}", written, out.display());
    Ok(())
}
