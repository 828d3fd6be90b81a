//! Plan command - show the todo list a build would follow.

use anyhow::Result;
use console::style;
use forge_core::{estimate, generate_todos};
use std::path::Path;

pub fn run(prd_path: &Path, iterations: Option<u32>) -> Result<()> {
    let config = super::load_config()?;
    let prd = super::read_prd(prd_path)?;

    let total = match iterations.or(config.build.iterations) {
        Some(0) => anyhow::bail!("--iterations must be at least 1"),
        Some(n) => n,
        None => estimate(&prd, &config.pricing).tokens.iteration_count,
    };
    let todos = generate_todos(&prd, total);

    println!("{} ({} iterations)", style("Plan:").bold(), total);
    for iteration in 1..=total {
        let scheduled: Vec<_> = todos.iter().filter(|t| t.target_iteration == iteration).collect();
        if scheduled.is_empty() {
            continue;
        }
        println!();
        println!("  {}", style(format!("Iteration {}", iteration)).cyan());
        for todo in scheduled {
            println!("    {:<14} {}", style(&todo.id).dim(), todo.task);
        }
    }

    Ok(())
}
