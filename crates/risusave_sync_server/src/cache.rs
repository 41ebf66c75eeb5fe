//! In-memory snapshot cache with debounced flushing.
//!
//! Each key has a slot guarded by an async mutex. Every operation on a key
//! (patch, read, write, remove, timer flush) holds that slot's lock for its
//! whole duration, so operations on one key are serialized while different
//! keys proceed independently.
//!
//! A slot that caches nothing and is held by no one is dropped from the map
//! once the operation that emptied it finishes.
//!
//! A successful patch re-arms a single flush timer per key. The timer task
//! holds a weak handle and the slot generation it was armed with;
//! cancelling bumps the generation so a timer that already woke up sees it
//! is stale and backs off.

use crate::error::{ServerError, ServerResult};
use crate::persistence::Persistence;
use risusave_codec::{structural_hash, StructuralHash, Value};
use risusave_storage::StorageKey;
use risusave_sync_protocol::{apply_patch, PatchOperation};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Observable state of one key in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing cached; the next patch loads from storage.
    Unloaded,
    /// Cached and identical to what was last written.
    Clean,
    /// Cached with changes not yet written.
    Dirty,
}

#[derive(Default)]
struct CacheSlot {
    snapshot: Option<Value>,
    dirty: bool,
    pending_flush: Option<JoinHandle<()>>,
    flush_generation: u64,
}

impl CacheSlot {
    fn cancel_flush(&mut self) {
        if let Some(handle) = self.pending_flush.take() {
            handle.abort();
        }
        self.flush_generation = self.flush_generation.wrapping_add(1);
    }

    fn evict(&mut self) {
        self.cancel_flush();
        self.snapshot = None;
        self.dirty = false;
    }

    fn state(&self) -> SlotState {
        match (&self.snapshot, self.dirty) {
            (None, _) => SlotState::Unloaded,
            (Some(_), false) => SlotState::Clean,
            (Some(_), true) => SlotState::Dirty,
        }
    }
}

type SharedSlot = Arc<AsyncMutex<CacheSlot>>;

/// Per-key snapshot cache in front of a [`Persistence`].
pub struct SnapshotCache {
    persistence: Arc<Persistence>,
    save_interval: Duration,
    slots: parking_lot::Mutex<HashMap<StorageKey, SharedSlot>>,
}

impl SnapshotCache {
    /// Creates an empty cache.
    pub fn new(persistence: Arc<Persistence>) -> Self {
        let save_interval = persistence.config().save_interval;
        Self {
            persistence,
            save_interval,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &StorageKey) -> SharedSlot {
        Arc::clone(self.slots.lock().entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &StorageKey) -> Option<SharedSlot> {
        self.slots.lock().get(key).cloned()
    }

    /// Gives back a slot handle and drops the map entry if the slot is idle.
    ///
    /// Idle means unloaded with no other handle alive. New handles are only
    /// handed out under the map lock. A flush timer may still upgrade its
    /// weak handle, but an unloaded slot has no live timer generation.
    fn release(&self, key: &StorageKey, shared: SharedSlot) {
        let mut slots = self.slots.lock();
        drop(shared);
        let idle = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .is_ok_and(|guard| guard.state() == SlotState::Unloaded)
        });
        if idle {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Applies `ops` to the snapshot at `key` if its hash equals `expected`.
    ///
    /// Loads the snapshot on first use. On a hash mismatch nothing changes.
    /// If an operation fails the slot is invalidated, including any pending
    /// unflushed changes, and the next request reloads from storage.
    pub async fn apply(
        &self,
        key: &StorageKey,
        ops: &[PatchOperation],
        expected: StructuralHash,
    ) -> ServerResult<usize> {
        let shared = self.slot(key);
        let mut slot = shared.lock().await;

        let mut snapshot = match slot.snapshot.take() {
            Some(snapshot) => snapshot,
            None => match self.persistence.load_snapshot(key).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    drop(slot);
                    self.release(key, shared);
                    return Err(e);
                }
            },
        };

        let actual = structural_hash(&snapshot);
        if actual != expected {
            warn!(%key, %expected, %actual, "patch rejected: hash mismatch");
            slot.snapshot = Some(snapshot);
            return Err(ServerError::HashMismatch { expected, actual });
        }

        match apply_patch(&mut snapshot, ops) {
            Ok(applied) => {
                slot.snapshot = Some(snapshot);
                slot.dirty = true;
                self.schedule_flush(key, &shared, &mut slot);
                debug!(%key, applied, "patch applied");
                Ok(applied)
            }
            Err(e) => {
                warn!(%key, error = %e, "patch failed, dropping cached snapshot");
                slot.evict();
                drop(slot);
                self.release(key, shared);
                Err(e.into())
            }
        }
    }

    fn schedule_flush(&self, key: &StorageKey, shared: &SharedSlot, slot: &mut CacheSlot) {
        slot.cancel_flush();
        let generation = slot.flush_generation;
        let task = flush_after(
            Arc::clone(&self.persistence),
            key.clone(),
            Arc::downgrade(shared),
            generation,
            self.save_interval,
        );
        slot.pending_flush = Some(tokio::spawn(task));
    }

    /// Returns the durable bytes at `key`, flushing any cached changes first.
    ///
    /// The cached snapshot is dropped, so the next patch reloads from
    /// storage.
    pub async fn read(&self, key: &StorageKey) -> ServerResult<Option<Vec<u8>>> {
        let Some(shared) = self.existing_slot(key) else {
            return self.persistence.get(key).await;
        };
        let mut slot = shared.lock().await;
        slot.cancel_flush();
        if slot.dirty {
            if let Some(snapshot) = slot.snapshot.as_ref() {
                // Keep the changes cached if they could not be written.
                let result = self.persistence.save_snapshot(key, snapshot, false).await;
                if let Err(e) = result {
                    error!(%key, error = %e, "flush before read failed");
                    self.schedule_flush(key, &shared, &mut slot);
                    return Err(e);
                }
            }
        }
        slot.evict();
        let result = self.persistence.get(key).await;
        drop(slot);
        self.release(key, shared);
        result
    }

    /// Replaces the bytes at `key` and drops any cached snapshot.
    pub async fn write(&self, key: &StorageKey, data: Vec<u8>) -> ServerResult<()> {
        let shared = self.slot(key);
        let mut slot = shared.lock().await;
        let result = self.persistence.put(key, data).await;
        if result.is_ok() {
            slot.evict();
            debug!(%key, "direct write replaced cached snapshot");
        }
        drop(slot);
        self.release(key, shared);
        result
    }

    /// Deletes `key` and drops any cached snapshot.
    pub async fn remove(&self, key: &StorageKey) -> ServerResult<()> {
        let shared = self.slot(key);
        let mut slot = shared.lock().await;
        slot.evict();
        let result = self.persistence.delete(key).await;
        drop(slot);
        self.release(key, shared);
        result
    }

    /// Lists stored keys whose logical name starts with `prefix`.
    pub async fn list(&self, prefix: &str) -> ServerResult<Vec<StorageKey>> {
        self.persistence.list(prefix.as_bytes()).await
    }

    /// Writes every dirty snapshot now, cancelling pending timers.
    ///
    /// Returns how many snapshots were written. All keys are attempted;
    /// the first failure is returned afterwards.
    pub async fn flush_all(&self) -> ServerResult<usize> {
        let slots: Vec<(StorageKey, SharedSlot)> = self
            .slots
            .lock()
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();

        let mut flushed = 0;
        let mut first_error = None;
        for (key, shared) in slots {
            let mut slot = shared.lock().await;
            if !slot.dirty {
                continue;
            }
            slot.cancel_flush();
            let Some(snapshot) = slot.snapshot.as_ref() else {
                continue;
            };
            let result = self.persistence.save_snapshot(&key, snapshot, true).await;
            match result {
                Ok(()) => {
                    slot.dirty = false;
                    flushed += 1;
                }
                Err(e) => {
                    error!(%key, error = %e, "flush failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    /// Hash of the cached snapshot at `key`, if one is cached.
    pub async fn cached_hash(&self, key: &StorageKey) -> Option<StructuralHash> {
        let shared = self.existing_slot(key)?;
        let slot = shared.lock().await;
        slot.snapshot.as_ref().map(structural_hash)
    }

    /// Current state of `key`.
    pub async fn state(&self, key: &StorageKey) -> SlotState {
        match self.existing_slot(key) {
            Some(shared) => {
                let slot = shared.lock().await;
                slot.state()
            }
            None => SlotState::Unloaded,
        }
    }
}

async fn flush_after(
    persistence: Arc<Persistence>,
    key: StorageKey,
    slot: Weak<AsyncMutex<CacheSlot>>,
    generation: u64,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;

    let Some(shared) = slot.upgrade() else {
        return;
    };
    let mut slot = shared.lock().await;
    if slot.flush_generation != generation {
        debug!(%key, "flush timer superseded");
        return;
    }
    slot.pending_flush = None;
    if !slot.dirty {
        return;
    }
    let Some(snapshot) = slot.snapshot.as_ref() else {
        return;
    };

    let result = persistence.save_snapshot(&key, snapshot, true).await;
    match result {
        Ok(()) => {
            slot.dirty = false;
            info!(%key, "debounced flush complete");
        }
        // The snapshot stays dirty and is written by the next flush.
        Err(e) => error!(%key, error = %e, "debounced flush failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use risusave_codec::{decode_container, encode_legacy};
    use risusave_storage::{InMemoryStore, KeyValueStore};
    use risusave_sync_protocol::PatchOperation;

    const INTERVAL: Duration = Duration::from_millis(50);

    fn primary() -> StorageKey {
        StorageKey::from("database/database.bin")
    }

    fn setup() -> (SnapshotCache, Arc<InMemoryStore>) {
        setup_with(InMemoryStore::new())
    }

    fn setup_with(store: InMemoryStore) -> (SnapshotCache, Arc<InMemoryStore>) {
        let store = Arc::new(store);
        let config = ServerConfig::new()
            .with_patch_sync(true)
            .with_save_interval(INTERVAL);
        let persistence = Arc::new(Persistence::new(store.clone(), config));
        (SnapshotCache::new(persistence), store)
    }

    fn set(path: &str, value: i64) -> Vec<PatchOperation> {
        vec![PatchOperation::add(path, Value::from(value))]
    }

    async fn settle() {
        tokio::time::sleep(INTERVAL * 4).await;
    }

    #[tokio::test]
    async fn first_patch_loads_empty_object() {
        let (cache, _) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());

        let applied = cache.apply(&key, &set("/a", 1), empty).await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(cache.state(&key).await, SlotState::Dirty);

        let mut expected = Value::object();
        expected.insert("a", Value::from(1));
        assert_eq!(cache.cached_hash(&key).await, Some(structural_hash(&expected)));
    }

    #[tokio::test]
    async fn patches_collapse_into_one_write() {
        let (cache, store) = setup();
        let key = primary();
        let mut doc = Value::object();

        for i in 0..5 {
            let hash = structural_hash(&doc);
            cache.apply(&key, &set("/n", i), hash).await.unwrap();
            doc.insert("n", Value::from(i));
        }
        assert_eq!(store.put_count(&key), 0);

        settle().await;
        assert_eq!(store.put_count(&key), 1);
        assert_eq!(cache.state(&key).await, SlotState::Clean);

        let stored = decode_container(&store.get(&key).unwrap().unwrap()).unwrap();
        assert_eq!(stored, doc);

        let backups = store.list_prefix(b"database/dbbackup-").unwrap();
        assert_eq!(backups.len(), 1);
    }

    #[tokio::test]
    async fn flushed_snapshot_stays_cached() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();
        settle().await;

        // The next patch works against the cached copy without reloading.
        let mut doc = Value::object();
        doc.insert("a", Value::from(1));
        cache
            .apply(&key, &set("/b", 2), structural_hash(&doc))
            .await
            .unwrap();
        settle().await;
        assert_eq!(store.put_count(&key), 2);
        assert_eq!(
            store.list_prefix(b"database/dbbackup-").unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn hash_mismatch_changes_nothing() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();
        let before = cache.cached_hash(&key).await;

        let err = cache.apply(&key, &set("/a", 2), empty).await.unwrap_err();
        assert!(matches!(err, ServerError::HashMismatch { .. }));
        assert_eq!(cache.cached_hash(&key).await, before);

        settle().await;
        let stored = decode_container(&store.get(&key).unwrap().unwrap()).unwrap();
        assert_eq!(stored.get("a"), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn mismatch_on_first_load_caches_snapshot() {
        let mut doc = Value::object();
        doc.insert("x", Value::from(true));
        let (cache, store) = setup_with(InMemoryStore::with_entries([(
            primary(),
            encode_legacy(&doc).unwrap(),
        )]));

        let err = cache
            .apply(&primary(), &set("/a", 1), structural_hash(&Value::object()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(cache.state(&primary()).await, SlotState::Clean);
        settle().await;
        assert_eq!(store.total_puts(), 0);
    }

    #[tokio::test]
    async fn failed_patch_invalidates_slot() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        let mut doc = Value::object();
        doc.insert("a", Value::from(1));
        let bad = vec![
            PatchOperation::add("/b", Value::from(2)),
            PatchOperation::remove("/missing"),
        ];
        let err = cache
            .apply(&key, &bad, structural_hash(&doc))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Patch(_)));
        assert_eq!(cache.state(&key).await, SlotState::Unloaded);

        settle().await;
        assert_eq!(store.put_count(&key), 0);
    }

    #[tokio::test]
    async fn read_flushes_pending_changes() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        let bytes = cache.read(&key).await.unwrap().unwrap();
        let value = decode_container(&bytes).unwrap();
        assert_eq!(value.get("a"), Some(&Value::from(1)));
        assert_eq!(cache.state(&key).await, SlotState::Unloaded);

        // The timer was cancelled and no backup is written for a read.
        settle().await;
        assert_eq!(store.put_count(&key), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn read_missing_key() {
        let (cache, _) = setup();
        assert_eq!(cache.read(&StorageKey::from("nope")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_flush_failure_keeps_changes() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        store.set_fail_writes(true);
        assert!(cache.read(&key).await.is_err());
        assert_eq!(cache.state(&key).await, SlotState::Dirty);

        store.set_fail_writes(false);
        settle().await;
        assert_eq!(store.put_count(&key), 1);
    }

    #[tokio::test]
    async fn write_cancels_pending_flush() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        let mut replacement = Value::object();
        replacement.insert("fresh", Value::from(true));
        let bytes = encode_legacy(&replacement).unwrap();
        cache.write(&key, bytes.clone()).await.unwrap();
        assert_eq!(cache.state(&key).await, SlotState::Unloaded);

        settle().await;
        assert_eq!(store.get(&key).unwrap(), Some(bytes));
        assert_eq!(store.put_count(&key), 1);

        // The next patch starts from the written bytes.
        cache
            .apply(&key, &set("/b", 1), structural_hash(&replacement))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remove_cancels_pending_flush() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        cache.remove(&key).await.unwrap();
        settle().await;
        assert!(store.is_empty());
        assert_eq!(cache.state(&key).await, SlotState::Unloaded);
    }

    #[tokio::test]
    async fn failed_flush_stays_dirty() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        store.set_fail_writes(true);
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        settle().await;
        assert_eq!(cache.state(&key).await, SlotState::Dirty);

        store.set_fail_writes(false);
        assert_eq!(cache.flush_all().await.unwrap(), 1);
        assert_eq!(store.put_count(&key), 1);
        assert_eq!(cache.state(&key).await, SlotState::Clean);
    }

    #[tokio::test]
    async fn flush_all_skips_clean_slots() {
        let (cache, store) = setup();
        let empty = structural_hash(&Value::object());
        cache
            .apply(&StorageKey::from("a.bin"), &set("/a", 1), empty)
            .await
            .unwrap();
        cache
            .apply(&StorageKey::from("b.bin"), &set("/b", 1), empty)
            .await
            .unwrap();

        assert_eq!(cache.flush_all().await.unwrap(), 2);
        assert_eq!(cache.flush_all().await.unwrap(), 0);
        settle().await;
        assert_eq!(store.total_puts(), 2);
    }

    #[tokio::test]
    async fn write_and_remove_leave_no_slots() {
        let (cache, store) = setup();
        for i in 0..1000 {
            let key = StorageKey::from(format!("assets/{i}.png"));
            cache.write(&key, vec![0x89, 0x50, 0x4e, 0x47]).await.unwrap();
            cache.remove(&key).await.unwrap();
        }
        assert_eq!(cache.slot_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn emptied_slots_are_dropped() {
        let (cache, _) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());

        cache.read(&StorageKey::from("nope")).await.unwrap();
        assert_eq!(cache.slot_count(), 0);

        cache.apply(&key, &set("/a", 1), empty).await.unwrap();
        assert_eq!(cache.slot_count(), 1);
        cache.read(&key).await.unwrap();
        assert_eq!(cache.slot_count(), 0);

        let err = cache
            .apply(
                &key,
                &[PatchOperation::remove("/missing")],
                structural_hash(&Value::map([("a", Value::from(1))])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Patch(_)));
        assert_eq!(cache.slot_count(), 0);
    }

    #[tokio::test]
    async fn dirty_slot_survives_failed_write_elsewhere() {
        let (cache, store) = setup();
        let key = primary();
        let empty = structural_hash(&Value::object());
        cache.apply(&key, &set("/a", 1), empty).await.unwrap();

        store.set_fail_writes(true);
        assert!(cache.write(&StorageKey::from("other.bin"), vec![1]).await.is_err());
        assert_eq!(cache.slot_count(), 1);
        assert_eq!(cache.state(&key).await, SlotState::Dirty);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_patches_with_same_hash_have_one_winner() {
        let (cache, _) = setup();
        let cache = Arc::new(cache);
        let key = primary();
        let empty = structural_hash(&Value::object());

        let tasks: Vec<_> = (0..16i64)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                tokio::spawn(async move {
                    let result = cache.apply(&key, &set("/winner", i), empty).await;
                    (i, result)
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut mismatches = 0;
        for task in tasks {
            let (i, result) = task.await.unwrap();
            match result {
                Ok(applied) => {
                    assert_eq!(applied, 1);
                    winners.push(i);
                }
                Err(ServerError::HashMismatch { expected, .. }) => {
                    assert_eq!(expected, empty);
                    mismatches += 1;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(mismatches, 15);
        let expected = Value::map([("winner", Value::from(winners[0]))]);
        assert_eq!(cache.cached_hash(&key).await, Some(structural_hash(&expected)));
    }

    #[tokio::test]
    async fn list_returns_matching_keys() {
        let (cache, store) = setup();
        store.put(&StorageKey::from("database/a"), b"").unwrap();
        store.put(&StorageKey::from("assets/b"), b"").unwrap();
        let keys = cache.list("database/").await.unwrap();
        assert_eq!(keys, vec![StorageKey::from("database/a")]);
    }
}
