//! Async front end of the save worker.
//!
//! Every call gets a fresh request id and a oneshot receiver parked in the
//! pending map. A dispatcher task matches worker responses to pending
//! entries by id. When the worker goes away, whatever is still pending is
//! failed and the coordinator refuses further calls.

use crate::error::{SyncError, SyncResult};
use crate::worker::{self, Operation, Output, WorkerRequest, WorkerResponse};
use parking_lot::Mutex;
use risusave_codec::Value;
use risusave_sync_protocol::PatchPlan;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Fault,
    Terminated,
}

impl Closed {
    fn error(self) -> SyncError {
        match self {
            Closed::Fault => SyncError::WorkerFault,
            Closed::Terminated => SyncError::Terminated,
        }
    }
}

#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, oneshot::Sender<SyncResult<Output>>>,
    closed: Option<Closed>,
}

impl Pending {
    fn close(&mut self, reason: Closed) {
        if self.closed.is_none() {
            self.closed = Some(reason);
        }
        let failed = self.waiters.len();
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.send(Err(reason.error()));
        }
        if failed > 0 {
            warn!(failed, ?reason, "failed pending save requests");
        }
    }
}

/// Runs hashing, diffing and encoding on the save worker thread.
///
/// Must be created inside a tokio runtime.
///
/// # Example
///
/// ```
/// use risusave_codec::Value;
/// use risusave_sync_engine::SaveCoordinator;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let coordinator = SaveCoordinator::spawn("save-worker").unwrap();
/// let plan = coordinator.compute_patch(Some(Value::object())).await.unwrap();
/// assert!(plan.needs_full_save);
/// # });
/// ```
pub struct SaveCoordinator {
    requests: Mutex<Option<mpsc::Sender<WorkerRequest>>>,
    pending: Arc<Mutex<Pending>>,
    next_id: AtomicU64,
}

impl SaveCoordinator {
    /// Starts the worker thread and the dispatcher task.
    pub fn spawn(worker_name: &str) -> SyncResult<Self> {
        let (response_tx, response_rx) = unbounded_channel();
        let (requests, _thread) = worker::spawn(worker_name, response_tx)
            .map_err(|e| SyncError::Protocol(format!("cannot start save worker: {e}")))?;

        let pending = Arc::new(Mutex::new(Pending::default()));
        tokio::spawn(dispatch(response_rx, Arc::clone(&pending)));

        Ok(Self {
            requests: Mutex::new(Some(requests)),
            pending,
            next_id: AtomicU64::new(0),
        })
    }

    async fn call(&self, op: Operation) -> SyncResult<Output> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if let Some(reason) = pending.closed {
                return Err(reason.error());
            }
            pending.waiters.insert(id, tx);
        }

        let sent = match self.requests.lock().as_ref() {
            Some(requests) => requests.send(WorkerRequest { id, op }).is_ok(),
            None => false,
        };
        if !sent {
            let mut pending = self.pending.lock();
            pending.waiters.remove(&id);
            return Err(pending.closed.unwrap_or(Closed::Fault).error());
        }

        rx.await.map_err(|_| SyncError::WorkerFault)?
    }

    /// Seeds the baseline with `db`, or with the committed snapshot.
    pub async fn initialize(&self, db: Option<Value>) -> SyncResult<()> {
        worker::expect_done(self.call(Operation::Initialize(db)).await?)
    }

    /// Starts a staged upload.
    pub async fn begin_load(&self) -> SyncResult<()> {
        worker::expect_done(self.call(Operation::BeginLoad).await?)
    }

    /// Appends a chunk to the staged upload.
    pub async fn write_chunk(&self, chunk: impl Into<String>) -> SyncResult<()> {
        worker::expect_done(self.call(Operation::WriteChunk(chunk.into())).await?)
    }

    /// Parses the staged upload into the committed snapshot.
    pub async fn commit(&self) -> SyncResult<()> {
        worker::expect_done(self.call(Operation::Commit).await?)
    }

    /// Stages `json` in chunks of at most `chunk_size` bytes and commits it.
    pub async fn stage_json(&self, json: &str, chunk_size: usize) -> SyncResult<()> {
        self.begin_load().await?;
        for chunk in utf8_chunks(json, chunk_size) {
            self.write_chunk(chunk).await?;
        }
        self.commit().await
    }

    /// Diffs against the baseline and rotates it.
    pub async fn compute_patch(&self, db: Option<Value>) -> SyncResult<PatchPlan> {
        worker::expect_plan(self.call(Operation::ComputePatch(db)).await?)
    }

    /// Encodes as an uncompressed container.
    pub async fn encode_legacy(&self, db: Option<Value>) -> SyncResult<Vec<u8>> {
        worker::expect_bytes(self.call(Operation::EncodeLegacy(db)).await?)
    }

    /// Encodes as a stream-compressed container.
    pub async fn encode(&self, db: Option<Value>) -> SyncResult<Vec<u8>> {
        worker::expect_bytes(self.call(Operation::Encode(db)).await?)
    }

    /// Stops the worker. Pending and later calls fail with
    /// [`SyncError::Terminated`].
    pub fn terminate(&self) {
        self.pending.lock().close(Closed::Terminated);
        self.requests.lock().take();
        debug!("save worker terminated");
    }

    /// Number of calls waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    /// Returns true while calls are accepted.
    pub fn is_running(&self) -> bool {
        self.pending.lock().closed.is_none()
    }

    #[cfg(test)]
    async fn crash(&self) -> SyncResult<Output> {
        self.call(Operation::Crash).await
    }
}

impl Drop for SaveCoordinator {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn dispatch(mut responses: UnboundedReceiver<WorkerResponse>, pending: Arc<Mutex<Pending>>) {
    while let Some(WorkerResponse { id, result }) = responses.recv().await {
        let waiter = pending.lock().waiters.remove(&id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => debug!(id, "ignoring response for unknown request"),
        }
    }
    // The worker thread is gone.
    pending.lock().close(Closed::Fault);
}

fn utf8_chunks(text: &str, max: usize) -> impl Iterator<Item = &str> {
    let max = max.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = max.min(rest.len());
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use risusave_codec::{decode_container, structural_hash};

    fn doc(key: &str, value: i64) -> Value {
        Value::map([(key, Value::from(value))])
    }

    #[tokio::test]
    async fn ids_correlate_concurrent_calls() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        let (legacy, modern) = tokio::join!(
            coordinator.encode_legacy(Some(doc("a", 1))),
            coordinator.encode(Some(doc("b", 2)))
        );
        assert_eq!(decode_container(&legacy.unwrap()).unwrap(), doc("a", 1));
        assert_eq!(decode_container(&modern.unwrap()).unwrap(), doc("b", 2));
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn baseline_flow() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        coordinator.initialize(Some(doc("a", 1))).await.unwrap();

        let plan = coordinator
            .compute_patch(Some(Value::map([
                ("a", Value::from(1)),
                ("b", Value::from(2)),
            ])))
            .await
            .unwrap();
        assert_eq!(plan.expected_hash, Some(structural_hash(&doc("a", 1))));
        assert_eq!(plan.patch.len(), 1);
    }

    #[tokio::test]
    async fn staged_json_is_used_when_no_value_given() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        coordinator
            .stage_json(r#"{"name":"café ☕","n":[1,2,3]}"#, 3)
            .await
            .unwrap();
        let bytes = coordinator.encode_legacy(None).await.unwrap();
        let value = decode_container(&bytes).unwrap();
        assert_eq!(value.get("name"), Some(&Value::from("café ☕")));
    }

    #[tokio::test]
    async fn worker_errors_reach_the_caller() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        let err = coordinator.compute_patch(None).await.unwrap_err();
        assert!(matches!(err, SyncError::DatabaseNotProvided));
        // The worker is still usable.
        coordinator.initialize(None).await.unwrap();
        assert!(coordinator.is_running());
    }

    #[tokio::test]
    async fn crash_fails_pending_and_later_calls() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        let err = coordinator.crash().await.unwrap_err();
        assert!(matches!(err, SyncError::WorkerFault));

        let err = coordinator.encode(Some(Value::object())).await.unwrap_err();
        assert!(matches!(err, SyncError::WorkerFault));
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn terminate_rejects_calls() {
        let coordinator = SaveCoordinator::spawn("test-save-worker").unwrap();
        coordinator.terminate();
        let err = coordinator.encode(Some(Value::object())).await.unwrap_err();
        assert!(matches!(err, SyncError::Terminated));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn chunks_respect_char_boundaries() {
        let text = "aé☕b";
        let chunks: Vec<&str> = utf8_chunks(text, 1).collect();
        assert_eq!(chunks, vec!["a", "é", "☕", "b"]);
        assert_eq!(chunks.concat(), text);
        assert_eq!(utf8_chunks("", 4).count(), 0);
        assert_eq!(utf8_chunks("abcdef", 4).collect::<Vec<_>>(), vec!["abcd", "ef"]);
    }
}
