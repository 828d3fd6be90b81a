//! Estimate command - complexity, tokens and price for a requirements document.

use anyhow::{Context, Result};
use console::style;
use forge_core::estimate;
use std::path::Path;

pub fn run(prd_path: &Path, format: &str) -> Result<()> {
    let config = super::load_config()?;
    let prd = super::read_prd(prd_path)?;
    let quote = estimate(&prd, &config.pricing);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&quote).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        "text" => {
            let analysis = &quote.analysis;
            let features = &analysis.features;
            let detected: Vec<&str> = [
                (features.authentication, "authentication"),
                (features.database, "database"),
                (features.payments, "payments"),
                (features.file_upload, "file upload"),
                (features.realtime, "realtime"),
            ]
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect();

            println!("{}", style("Complexity:").bold());
            println!("  Tier:             {} ({})", style(analysis.tier.label()).cyan(), analysis.tier);
            println!("  Pages:            {}", analysis.page_count);
            println!("  Components:       {}", analysis.component_count);
            println!("  Lines of code:    ~{}", analysis.estimated_lines_of_code);
            if detected.is_empty() {
                println!("  Features:         none detected");
            } else {
                println!("  Features:         {}", detected.join(", "));
            }
            println!("  Integrations:     {}", features.api_integrations);
            println!("  Forms:            {}", features.forms);

            println!();
            println!("{}", style("Tokens:").bold());
            println!("  Iterations:       {}", quote.tokens.iteration_count);
            println!("  Input:            {}", quote.tokens.input_tokens);
            println!("  Output:           {}", quote.tokens.output_tokens);
            println!("  Total:            {}", quote.tokens.total_tokens);

            println!();
            println!("{}", style("Price:").bold());
            println!("  Base cost:        ${:.2}", quote.pricing.base_cost);
            println!("  Margin:           ${:.2}", quote.pricing.margin);
            println!("  Total:            {}", style(format!("${:.2}", quote.pricing.total_cost)).green().bold());
        }
        _ => {
            anyhow::bail!("Unsupported format: {}. Use 'json' or 'text'.", format);
        }
    }

    Ok(())
}
