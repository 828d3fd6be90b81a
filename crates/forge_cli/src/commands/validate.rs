//! Validate command - run the structural checks over a project on disk.

use anyhow::{Context, Result};
use console::style;
use forge_core::{current_timestamp, test_generated_files, FileSet, FileStats, GeneratedFile};
use std::fs;
use std::path::Path;

/// Directories never loaded from a project tree.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".next", ".git", "dist", "build", "out"];

/// Recursively loads UTF-8 files under `current`, keyed by path relative to `base`.
fn collect_files(current: &Path, base: &Path, files: &mut Vec<GeneratedFile>) -> Result<()> {
    let entries =
        fs::read_dir(current).with_context(|| format!("Failed to read {}", current.display()))?;
    for entry in entries {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        if path.is_dir() {
            if SKIPPED_DIRS.contains(&name) {
                continue;
            }
            collect_files(&path, base, files)?;
        } else if path.is_file() {
            // Binary assets are not part of the generated source
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            if let Some(rel) = path.strip_prefix(base).ok().and_then(|p| p.to_str()) {
                files.push(GeneratedFile::new(rel, content));
            }
        }
    }
    Ok(())
}

pub fn run(dir: &Path) -> Result<()> {
    let config = super::load_config()?;

    let mut loaded = Vec::new();
    collect_files(dir, dir, &mut loaded)?;
    loaded.sort_by(|a, b| a.path.cmp(&b.path));
    let files: FileSet = loaded.into_iter().collect();

    let stats = FileStats::from_files(&files);
    let result = test_generated_files(&files, &config.validation, current_timestamp());

    println!("{}", style("Project:").bold());
    println!("  Files:            {}", stats.file_count);
    println!("  Lines:            {}", stats.total_lines);
    let by_ext: Vec<String> = stats
        .by_extension
        .iter()
        .map(|(ext, count)| format!("{} {}", count, ext))
        .collect();
    println!("  By extension:     {}", by_ext.join(", "));

    if !result.errors.is_empty() {
        println!();
        println!("{} ({})", style("Errors:").red().bold(), result.errors.len());
        for error in &result.errors {
            println!("  {} {}", style("×").red(), error);
        }
    }
    if !result.warnings.is_empty() {
        println!();
        println!("{} ({})", style("Warnings:").yellow().bold(), result.warnings.len());
        for warning in &result.warnings {
            println!("  {} {}", style("!").yellow(), warning);
        }
    }
    if !stats.issues.is_empty() {
        println!();
        println!("{}", style("Notes:").dim());
        for issue in &stats.issues {
            println!("  {}", issue);
        }
    }

    println!();
    if result.passed {
        println!("{}", style("✓ Validation passed").green().bold());
        Ok(())
    } else {
        anyhow::bail!("validation failed with {} errors", result.errors.len())
    }
}
