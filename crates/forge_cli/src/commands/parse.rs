//! Parse command - split raw generator output into files.

use anyhow::{Context, Result};
use console::style;
use forge_core::parse_iteration_output;
use std::fs;
use std::path::Path;

pub fn run(input: &Path, out: Option<&Path>) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let parsed = parse_iteration_output(&raw);

    if parsed.files.is_empty() {
        println!("{}", style("No files found in output").yellow());
    } else {
        println!("{} {} files", style("Parsed").bold(), parsed.files.len());
        for file in &parsed.files {
            println!(
                "  {} {} ({}, {} lines)",
                style("+").green(),
                file.path,
                file.language,
                file.line_count()
            );
        }
    }

    match &parsed.progress {
        Some(progress) => {
            println!();
            println!("{}", style("Progress update:").bold());
            println!("  Iteration: {}", progress.iteration);
            println!("  Summary:   {}", progress.summary);
            for step in &progress.next_steps {
                println!("  Next:      {}", step);
            }
            for update in &progress.todo_updates {
                println!("  Todo:      {} -> {}", update.id, update.status);
            }
        }
        None => println!("{}", style("No progress block").dim()),
    }

    if let Some(out) = out {
        let written = super::write_files(&parsed.files, out)?;
        println!();
        println!("Wrote {} files to {}", written, out.display());
    }

    Ok(())
}
