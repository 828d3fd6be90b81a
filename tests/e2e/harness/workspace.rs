use anyhow::{Context, Result};
use forge_core::{RecoveryStore, TimeProvider};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Recorded inputs for one build: the requirements and one generator
/// response per iteration.
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub prd: String,
    pub outputs: BTreeMap<u32, String>,
}

impl Fixture {
    /// Loads `prd.md` and every `iteration-N.txt` from `fixtures/<name>`.
    pub fn load(name: &str) -> Result<Self> {
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name);

        if !fixture_path.exists() {
            anyhow::bail!("Fixture not found: {}", fixture_path.display());
        }

        let prd = fs::read_to_string(fixture_path.join("prd.md"))
            .with_context(|| format!("Fixture {} has no prd.md", name))?;

        let mut outputs = BTreeMap::new();
        for entry in fs::read_dir(&fixture_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(iteration) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix("iteration-"))
                .and_then(|n| n.strip_suffix(".txt"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            outputs.insert(iteration, text);
        }

        Ok(Self { prd, outputs })
    }
}

/// Manages an isolated directory holding the recovery store
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the recovery database
    pub fn store_path(&self) -> PathBuf {
        self.path().join(".forge").join("recovery.redb")
    }

    /// Open (or reopen) the recovery store
    pub fn open_store(&self, max_age: Duration, clock: Arc<dyn TimeProvider>) -> Result<RecoveryStore> {
        RecoveryStore::open_with_clock(self.store_path(), max_age, clock)
            .context("Failed to open recovery store")
    }

    /// Check if a file exists under the workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }
}
