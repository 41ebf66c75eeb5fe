//! Worker-owned sync state.

use crate::error::{SyncError, SyncResult};
use risusave_codec::{encode_legacy, encode_modern, structural_hash, StructuralHash, Value};
use risusave_sync_protocol::{diff, PatchPlan};
use tracing::debug;

/// Baseline and staged snapshots for one client.
///
/// Owned by the save worker and only touched from its thread, one request
/// at a time.
#[derive(Debug, Default)]
pub struct SyncSession {
    baseline: Option<Value>,
    baseline_hash: Option<StructuralHash>,
    staged: Option<String>,
    committed: Option<Value>,
}

impl SyncSession {
    /// Creates a session with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the last synced snapshot.
    pub fn baseline_hash(&self) -> Option<StructuralHash> {
        self.baseline_hash
    }

    /// Returns true once a baseline is set.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Returns true if a committed snapshot is available.
    pub fn has_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Seeds the baseline with `db`, or with the committed snapshot.
    ///
    /// Leaves the baseline alone when neither is available.
    pub fn initialize(&mut self, db: Option<Value>) {
        let Some(db) = db.or_else(|| self.committed.clone()) else {
            return;
        };
        let hash = structural_hash(&db);
        debug!(%hash, "baseline initialized");
        self.baseline = Some(db);
        self.baseline_hash = Some(hash);
    }

    /// Starts a staged upload, discarding any unfinished one.
    pub fn begin_load(&mut self) {
        self.staged = Some(String::new());
    }

    /// Appends a chunk of JSON text to the staged upload.
    pub fn write_chunk(&mut self, chunk: &str) -> SyncResult<()> {
        match self.staged.as_mut() {
            Some(staged) => {
                staged.push_str(chunk);
                Ok(())
            }
            None => Err(SyncError::Staging("no upload in progress".into())),
        }
    }

    /// Parses the staged text and makes it the committed snapshot.
    pub fn commit(&mut self) -> SyncResult<()> {
        let text = self
            .staged
            .take()
            .ok_or_else(|| SyncError::Staging("no upload in progress".into()))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| SyncError::Staging(e.to_string()))?;
        debug!(bytes = text.len(), "staged snapshot committed");
        self.committed = Some(value);
        Ok(())
    }

    fn resolve(&self, db: Option<Value>) -> SyncResult<Value> {
        db.or_else(|| self.committed.clone())
            .ok_or(SyncError::DatabaseNotProvided)
    }

    /// Diffs `db` (or the committed snapshot) against the baseline, then
    /// makes it the new baseline.
    ///
    /// With no baseline the plan asks for a full save.
    pub fn compute_patch(&mut self, db: Option<Value>) -> SyncResult<PatchPlan> {
        let db = self.resolve(db)?;
        let plan = match (&self.baseline, self.baseline_hash) {
            (Some(baseline), Some(hash)) => PatchPlan {
                patch: diff(baseline, &db),
                expected_hash: Some(hash),
                needs_full_save: false,
            },
            _ => PatchPlan::full_save(),
        };

        self.baseline_hash = Some(structural_hash(&db));
        self.baseline = Some(db);
        Ok(plan)
    }

    /// Encodes `db` (or the committed snapshot) as an uncompressed container.
    pub fn encode_legacy(&self, db: Option<Value>) -> SyncResult<Vec<u8>> {
        Ok(encode_legacy(&self.resolve(db)?)?)
    }

    /// Encodes `db` (or the committed snapshot) as a stream-compressed container.
    pub fn encode(&self, db: Option<Value>) -> SyncResult<Vec<u8>> {
        Ok(encode_modern(&self.resolve(db)?)?)
    }
}
