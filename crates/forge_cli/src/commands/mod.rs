//! CLI commands.

pub mod build;
pub mod estimate;
pub mod parse;
pub mod plan;
pub mod recovery;
pub mod validate;

use anyhow::{Context, Result};
use forge_core::{Config, GeneratedFile, RecoveryStore};
use std::fs;
use std::path::Path;

/// Directory holding local state such as the recovery store.
pub(crate) const STATE_DIR: &str = ".forge";

/// Loads `forge.toml` from the working directory.
pub(crate) fn load_config() -> Result<Config> {
    Config::load(Path::new(".")).context("Failed to load forge.toml")
}

/// Reads a requirements document, rejecting an empty one.
pub(crate) fn read_prd(path: &Path) -> Result<String> {
    let prd = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if prd.trim().is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }
    Ok(prd)
}

/// Opens the recovery store configured in `forge.toml`.
pub(crate) fn open_store(config: &Config) -> Result<RecoveryStore> {
    let path = Path::new(STATE_DIR).join(&config.recovery.store_file);
    RecoveryStore::open(&path, config.recovery.max_age())
        .with_context(|| format!("Failed to open recovery store at {}", path.display()))
}

/// Writes files under `out`, creating directories as needed.
pub(crate) fn write_files<'a>(
    files: impl IntoIterator<Item = &'a GeneratedFile>,
    out: &Path,
) -> Result<usize> {
    let mut written = 0;
    for file in files {
        let target = out.join(&file.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&target, &file.content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        written += 1;
    }
    Ok(written)
}
