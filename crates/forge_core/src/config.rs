//! Configuration types for builds, merging, validation and recovery.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "forge.toml";

/// Comprehensive configuration for a forge project.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Iteration loop configuration.
    #[serde(default)]
    pub build: BuildConfig,

    /// File merge heuristics.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Structural validation toggles.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Recovery snapshot configuration.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Price model used by the estimator.
    #[serde(default)]
    pub pricing: PricingConfig,
}

impl Config {
    /// Load configuration from `forge.toml` in `dir`, or defaults if absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| ForgeError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| ForgeError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `forge.toml` in `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForgeError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| ForgeError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Iteration loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Retries allowed per iteration before it is marked failed (default: 3).
    pub max_retries: u32,

    /// First backoff delay in milliseconds (default: 1000).
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds (default: 30000).
    pub retry_max_delay_ms: u64,

    /// Output token ceiling passed to the generator per call (default: 16000).
    pub max_output_tokens: u32,

    /// Push the file set to source control after each iteration (default: true).
    /// Has no effect when no source-control collaborator is attached.
    pub sync_enabled: bool,

    /// Fixed iteration count. When unset the complexity tier decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            max_output_tokens: 16_000,
            sync_enabled: true,
            iterations: None,
        }
    }
}

impl BuildConfig {
    /// Exponential backoff for the given retry count, capped at `retry_max_delay_ms`.
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        let ms = self
            .retry_base_delay_ms
            .saturating_mul(factor)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Heuristics deciding whether a re-emitted file replaces the stored one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeConfig {
    /// Content shorter than this many characters is discarded (default: 5).
    pub min_content_len: usize,

    /// Length difference above which a rewrite always wins (default: 50).
    pub length_delta_threshold: usize,

    /// Leading characters of the new content probed against the old (default: 100).
    pub prefix_probe_len: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_content_len: 5,
            length_delta_threshold: 50,
            prefix_probe_len: 100,
        }
    }
}

/// Structural validation toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Bracket, paren and quote balance.
    pub check_syntax: bool,
    /// Local import resolution (warnings only).
    pub check_imports: bool,
    /// TODO/FIXME and template placeholder detection (warnings only).
    pub check_placeholders: bool,
    /// Reserved; no type checker is run.
    pub check_types: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_syntax: true,
            check_imports: true,
            check_placeholders: true,
            check_types: false,
        }
    }
}

/// Recovery snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    /// Snapshots older than this are treated as absent (default: 1 hour).
    pub max_age_secs: u64,

    /// Database file, relative to the project directory.
    pub store_file: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 60 * 60,
            store_file: "recovery.redb".to_string(),
        }
    }
}

impl RecoveryConfig {
    /// Returns the maximum snapshot age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Price model: provider rates plus our margin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// USD per million input tokens (default: 3.0).
    pub input_per_million: f64,
    /// USD per million output tokens (default: 15.0).
    pub output_per_million: f64,
    /// Multiplier applied to the raw provider cost (default: 2.5).
    pub margin_multiplier: f64,
    /// Floor for the quoted total in USD (default: 5.00).
    pub minimum_charge: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
            margin_multiplier: 2.5,
            minimum_charge: 5.0,
        }
    }
}
