//! Token usage and actual cost, tracked per iteration for reconciliation.
//!
//! Nothing here enforces a budget. The projected price is fixed before the build
//! starts; this ledger only records what the build actually consumed.

use crate::config::PricingConfig;
use serde::{Deserialize, Serialize};

/// Characters per token used for approximate counts.
const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text`.
pub fn approximate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Usage for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub iteration: u32,
    /// 1-based attempt within the iteration.
    pub attempt: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Provider cost in USD, without margin.
    pub cost_usd: f64,
}

/// Running record of every generation call in a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLedger {
    entries: Vec<TokenUsage>,
    input_per_million: f64,
    output_per_million: f64,
}

impl UsageLedger {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            entries: Vec::new(),
            input_per_million: pricing.input_per_million,
            output_per_million: pricing.output_per_million,
        }
    }

    /// Records one call from its prompt and output text.
    pub fn record(&mut self, iteration: u32, attempt: u32, prompt: &str, output: &str) -> &TokenUsage {
        let input_tokens = approximate_tokens(prompt);
        let output_tokens = approximate_tokens(output);
        let cost_usd = input_tokens as f64 / 1_000_000.0 * self.input_per_million
            + output_tokens as f64 / 1_000_000.0 * self.output_per_million;

        self.entries.push(TokenUsage {
            iteration,
            attempt,
            input_tokens,
            output_tokens,
            cost_usd,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TokenUsage] {
        &self.entries
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.entries.iter().map(|e| e.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.entries.iter().map(|e| e.output_tokens).sum()
    }

    /// Summed provider cost of every recorded call, including failed attempts.
    pub fn actual_cost(&self) -> f64 {
        self.entries.iter().map(|e| e.cost_usd).sum()
    }
}
