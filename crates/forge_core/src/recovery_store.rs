//! Persisted recovery snapshots.
//!
//! Each in-flight build keeps one snapshot in a redb database, keyed by build id.
//! The value is a small envelope holding the save time, a BLAKE3 checksum and the
//! zstd-compressed postcard encoding of the snapshot body. Snapshots older than
//! the configured maximum age are treated as absent and removed on sight.

use crate::error::{ForgeError, Result};
use crate::file_set::FileSet;
use crate::recovery::RecoveryState;
use crate::types::BuildContext;
use crate::{current_timestamp, TimeProvider};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SNAPSHOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Zstd level for snapshot payloads.
const COMPRESSION_LEVEL: i32 = 3;

/// Everything needed to pick a build back up.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverySnapshot {
    pub build_id: String,
    pub state: RecoveryState,
    pub context: BuildContext,
    pub files: FileSet,
    /// Unix timestamp of the save.
    pub saved_at: i64,
    /// Hex BLAKE3 digest of the compressed payload.
    pub checksum: String,
}

/// Listing entry for a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub build_id: String,
    pub saved_at: i64,
    pub age_secs: i64,
    pub expired: bool,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    saved_at: i64,
    checksum: String,
    payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    state: RecoveryState,
    context: BuildContext,
    files: FileSet,
}

fn storage_err(what: &str, e: impl std::fmt::Display) -> ForgeError {
    ForgeError::Storage(format!("{}: {}", what, e))
}

/// redb-backed snapshot store.
pub struct RecoveryStore {
    db: Database,
    path: PathBuf,
    max_age: Duration,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for RecoveryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryStore")
            .field("path", &self.path)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl RecoveryStore {
    /// Opens the store at `path`, creating the database file if needed.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_core::RecoveryStore;
    /// use std::time::Duration;
    /// use tempfile::TempDir;
    ///
    /// let tmp = TempDir::new().unwrap();
    /// let store = RecoveryStore::open(tmp.path().join("recovery.redb"), Duration::from_secs(3600)).unwrap();
    /// assert!(store.load("missing").unwrap().is_none());
    /// ```
    pub fn open(path: impl AsRef<Path>, max_age: Duration) -> Result<Self> {
        Self::open_with_clock(path, max_age, Arc::new(current_timestamp))
    }

    /// Opens the store with an injected clock.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        max_age: Duration,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(|e| storage_err("failed to open recovery store", e))?;

        // Make sure the table exists so read transactions never see it missing
        let write_txn = db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write transaction", e))?;
        write_txn
            .open_table(SNAPSHOTS_TABLE)
            .map_err(|e| storage_err("failed to open snapshots table", e))?;
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit", e))?;

        Ok(Self {
            db,
            path,
            max_age,
            clock,
        })
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, saved_at: i64, now: i64) -> bool {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(saved_at) > max_age
    }

    /// Writes (or overwrites) the snapshot for `build_id`.
    pub fn save(
        &self,
        build_id: &str,
        state: &RecoveryState,
        context: &BuildContext,
        files: &FileSet,
    ) -> Result<()> {
        let body = SnapshotBody {
            state: state.clone(),
            context: context.clone(),
            files: files.clone(),
        };
        let encoded =
            postcard::to_allocvec(&body).map_err(|e| ForgeError::Serialization(e.to_string()))?;
        let payload = zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| ForgeError::Compression(e.to_string()))?;
        let envelope = Envelope {
            saved_at: self.clock.now(),
            checksum: hex::encode(blake3::hash(&payload).as_bytes()),
            payload,
        };
        let value =
            postcard::to_allocvec(&envelope).map_err(|e| ForgeError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(SNAPSHOTS_TABLE)
                .map_err(|e| storage_err("failed to open snapshots table", e))?;
            table
                .insert(build_id, value.as_slice())
                .map_err(|e| storage_err("failed to write snapshot", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit", e))?;

        debug!(build_id, bytes = value.len(), "saved recovery snapshot");
        Ok(())
    }

    fn read_envelope(&self, build_id: &str) -> Result<Option<Envelope>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("failed to begin read transaction", e))?;
        let table = read_txn
            .open_table(SNAPSHOTS_TABLE)
            .map_err(|e| storage_err("failed to open snapshots table", e))?;

        let Some(raw) = table
            .get(build_id)
            .map_err(|e| storage_err("failed to read snapshot", e))?
        else {
            return Ok(None);
        };

        let envelope: Envelope = postcard::from_bytes(raw.value())
            .map_err(|e| ForgeError::Deserialization(format!("snapshot envelope: {}", e)))?;
        Ok(Some(envelope))
    }

    /// Loads the snapshot for `build_id`.
    ///
    /// Returns `None` when there is none or when it has expired; an expired
    /// snapshot is deleted. A checksum mismatch is an error.
    pub fn load(&self, build_id: &str) -> Result<Option<RecoverySnapshot>> {
        let Some(envelope) = self.read_envelope(build_id)? else {
            return Ok(None);
        };

        if self.is_expired(envelope.saved_at, self.clock.now()) {
            debug!(build_id, saved_at = envelope.saved_at, "discarding expired snapshot");
            self.clear(build_id)?;
            return Ok(None);
        }

        let actual = hex::encode(blake3::hash(&envelope.payload).as_bytes());
        if actual != envelope.checksum {
            warn!(build_id, "recovery snapshot failed checksum");
            return Err(ForgeError::SnapshotCorrupted {
                build_id: build_id.to_string(),
                expected: envelope.checksum,
                actual,
            });
        }

        let decoded = zstd::decode_all(envelope.payload.as_slice())
            .map_err(|e| ForgeError::Compression(e.to_string()))?;
        let body: SnapshotBody = postcard::from_bytes(&decoded)
            .map_err(|e| ForgeError::Deserialization(format!("snapshot body: {}", e)))?;

        Ok(Some(RecoverySnapshot {
            build_id: build_id.to_string(),
            state: body.state,
            context: body.context,
            files: body.files,
            saved_at: envelope.saved_at,
            checksum: envelope.checksum,
        }))
    }

    /// Removes the snapshot for `build_id`. Returns whether one existed.
    pub fn clear(&self, build_id: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write transaction", e))?;
        let removed = {
            let mut table = write_txn
                .open_table(SNAPSHOTS_TABLE)
                .map_err(|e| storage_err("failed to open snapshots table", e))?;
            let removed = table
                .remove(build_id)
                .map_err(|e| storage_err("failed to remove snapshot", e))?;
            removed.is_some()
        };
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit", e))?;
        Ok(removed)
    }

    /// Lists stored snapshots, oldest first. Expired entries are reported, not removed.
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let now = self.clock.now();
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("failed to begin read transaction", e))?;
        let table = read_txn
            .open_table(SNAPSHOTS_TABLE)
            .map_err(|e| storage_err("failed to open snapshots table", e))?;

        let mut entries = Vec::new();
        for item in table
            .iter()
            .map_err(|e| storage_err("failed to iterate snapshots", e))?
        {
            let (key, value) = item.map_err(|e| storage_err("failed to read snapshot", e))?;
            let build_id = key.value().to_string();
            match postcard::from_bytes::<Envelope>(value.value()) {
                Ok(envelope) => entries.push(SnapshotInfo {
                    age_secs: now.saturating_sub(envelope.saved_at),
                    expired: self.is_expired(envelope.saved_at, now),
                    saved_at: envelope.saved_at,
                    build_id,
                }),
                Err(e) => warn!(build_id = %build_id, error = %e, "skipping unreadable snapshot"),
            }
        }
        entries.sort_by_key(|e| e.saved_at);
        Ok(entries)
    }

    #[cfg(test)]
    fn overwrite_raw(&self, build_id: &str, value: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(SNAPSHOTS_TABLE)
                .map_err(|e| storage_err("failed to open snapshots table", e))?;
            table
                .insert(build_id, value)
                .map_err(|e| storage_err("failed to write snapshot", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("failed to commit", e))?;
        Ok(())
    }
}
