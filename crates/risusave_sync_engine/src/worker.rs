//! The save worker thread.
//!
//! Requests arrive over a std channel and are processed strictly in order
//! against one [`SyncSession`]. Each result goes back over a tokio channel
//! tagged with the request id.

use crate::error::{SyncError, SyncResult};
use crate::session::SyncSession;
use risusave_codec::Value;
use risusave_sync_protocol::PatchPlan;
use std::sync::mpsc;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// Work the save worker can do.
#[derive(Debug)]
pub enum Operation {
    /// Seed the baseline.
    Initialize(Option<Value>),
    /// Start a staged upload.
    BeginLoad,
    /// Append JSON text to the staged upload.
    WriteChunk(String),
    /// Parse the staged upload.
    Commit,
    /// Diff against the baseline and rotate it.
    ComputePatch(Option<Value>),
    /// Encode as an uncompressed container.
    EncodeLegacy(Option<Value>),
    /// Encode as a stream-compressed container.
    Encode(Option<Value>),
    /// Kill the worker thread.
    #[cfg(test)]
    Crash,
}

impl Operation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Initialize(_) => "initialize",
            Operation::BeginLoad => "load",
            Operation::WriteChunk(_) => "write",
            Operation::Commit => "commit",
            Operation::ComputePatch(_) => "patch",
            Operation::EncodeLegacy(_) => "encode-legacy",
            Operation::Encode(_) => "encode",
            #[cfg(test)]
            Operation::Crash => "crash",
        }
    }
}

/// Successful result of an [`Operation`].
#[derive(Debug)]
pub enum Output {
    /// The operation has no payload.
    Done,
    /// Result of `ComputePatch`.
    Plan(PatchPlan),
    /// Encoded container bytes.
    Bytes(Vec<u8>),
}

/// A request tagged with its id.
#[derive(Debug)]
pub struct WorkerRequest {
    /// Correlation id.
    pub id: u64,
    /// What to do.
    pub op: Operation,
}

/// A result tagged with the id of its request.
#[derive(Debug)]
pub struct WorkerResponse {
    /// Correlation id.
    pub id: u64,
    /// Outcome.
    pub result: SyncResult<Output>,
}

/// Starts the worker thread.
///
/// The thread runs until the request sender is dropped. Results go to
/// `responses`; the thread exits early if that channel closes.
pub fn spawn(
    name: &str,
    responses: UnboundedSender<WorkerResponse>,
) -> std::io::Result<(mpsc::Sender<WorkerRequest>, thread::JoinHandle<()>)> {
    let (sender, receiver) = mpsc::channel::<WorkerRequest>();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(receiver, responses))?;
    Ok((sender, handle))
}

fn run(requests: mpsc::Receiver<WorkerRequest>, responses: UnboundedSender<WorkerResponse>) {
    let mut session = SyncSession::new();
    while let Ok(WorkerRequest { id, op }) = requests.recv() {
        trace!(id, op = op.name(), "worker request");
        let result = process(&mut session, op);
        if responses.send(WorkerResponse { id, result }).is_err() {
            break;
        }
    }
    debug!("save worker stopped");
}

fn process(session: &mut SyncSession, op: Operation) -> SyncResult<Output> {
    match op {
        Operation::Initialize(db) => {
            session.initialize(db);
            Ok(Output::Done)
        }
        Operation::BeginLoad => {
            session.begin_load();
            Ok(Output::Done)
        }
        Operation::WriteChunk(chunk) => session.write_chunk(&chunk).map(|()| Output::Done),
        Operation::Commit => session.commit().map(|()| Output::Done),
        Operation::ComputePatch(db) => session.compute_patch(db).map(Output::Plan),
        Operation::EncodeLegacy(db) => session.encode_legacy(db).map(Output::Bytes),
        Operation::Encode(db) => session.encode(db).map(Output::Bytes),
        #[cfg(test)]
        Operation::Crash => panic!("save worker crash requested"),
    }
}

/// Checks an [`Output`] has the expected shape.
pub(crate) fn expect_done(output: Output) -> SyncResult<()> {
    match output {
        Output::Done => Ok(()),
        other => Err(unexpected(&other)),
    }
}

pub(crate) fn expect_plan(output: Output) -> SyncResult<PatchPlan> {
    match output {
        Output::Plan(plan) => Ok(plan),
        other => Err(unexpected(&other)),
    }
}

pub(crate) fn expect_bytes(output: Output) -> SyncResult<Vec<u8>> {
    match output {
        Output::Bytes(bytes) => Ok(bytes),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(output: &Output) -> SyncError {
    SyncError::Protocol(format!("unexpected worker output: {output:?}"))
}
