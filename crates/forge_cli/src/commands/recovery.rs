//! Recovery store inspection commands.

use anyhow::Result;
use chrono::DateTime;
use console::style;

fn format_time(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

pub fn list() -> Result<()> {
    let config = super::load_config()?;
    let store = super::open_store(&config)?;
    let entries = store.list()?;

    if entries.is_empty() {
        println!("No recovery snapshots");
        return Ok(());
    }

    for entry in entries {
        let age = if entry.expired {
            style(format!("{}s, expired", entry.age_secs)).red()
        } else {
            style(format!("{}s", entry.age_secs)).dim()
        };
        println!("{}  {}  ({})", entry.build_id, format_time(entry.saved_at), age);
    }
    Ok(())
}

pub fn show(build_id: &str) -> Result<()> {
    let config = super::load_config()?;
    let store = super::open_store(&config)?;

    let Some(snapshot) = store.load(build_id)? else {
        anyhow::bail!("No live recovery snapshot for build {}", build_id);
    };
    let progress = &snapshot.context.progress;

    println!("{}", style(format!("Snapshot {}", build_id)).bold());
    println!("  Saved:            {}", format_time(snapshot.saved_at));
    println!("  Checksum:         {}", snapshot.checksum);
    println!(
        "  Progress:         iteration {} of {} ({:.0}%)",
        progress.current_iteration, progress.total_iterations, progress.percent
    );
    println!(
        "  Last successful:  {}",
        snapshot.state.last_successful_iteration
    );
    println!("  Files:            {}", snapshot.files.len());
    println!("  Errors recorded:  {}", snapshot.state.errors.len());

    println!();
    println!("{}", style("Todo list:").bold());
    println!("{}", snapshot.context.todo_checklist());

    if !snapshot.state.errors.is_empty() {
        println!();
        println!("{}", style("Errors:").bold());
        for error in &snapshot.state.errors {
            println!("  iteration {}: {} ({})", error.iteration, error.kind, error.error);
        }
    }
    Ok(())
}

pub fn clear(build_id: &str) -> Result<()> {
    let config = super::load_config()?;
    let store = super::open_store(&config)?;

    if store.clear(build_id)? {
        println!("Cleared recovery snapshot for {}", build_id);
    } else {
        println!("No recovery snapshot for {}", build_id);
    }
    Ok(())
}
