//! Request serialization.
//!
//! Two requests that contend on the same resource (an open handle, a path
//! being mutated) must appear to execute in wire order even once the worker
//! pool is running. Jobs are registered in wire order on the reader task;
//! before a worker runs a job's handler it waits until no earlier-registered
//! job with an overlapping key set is still in flight.
//!
//! Because the reader registers strictly before submission and workers pull
//! from a FIFO queue, the wait graph only ever points at earlier sequence
//! numbers and cannot cycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::watch;

use crate::constants::*;
use crate::job::Job;
use crate::wire::PacketCursor;

/// An opaque token naming a resource a request may mutate.
///
/// Handles and paths live in different namespaces: a path key never
/// conflicts with a handle key even if the byte strings happen to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialKey {
    /// The raw bytes of an open-file or directory handle.
    Handle(Bytes),
    /// The raw wire bytes of a path argument. Canonicalization is the
    /// handler's business; ordering is promised for byte-identical names,
    /// which is what a client reusing a name relies on.
    Path(Bytes),
}

#[derive(Debug)]
struct Registered {
    seq: u64,
    keys: Vec<SerialKey>,
}

/// Orders jobs whose key sets overlap.
#[derive(Debug)]
pub struct Serializer {
    inflight: Mutex<VecDeque<Registered>>,
    next_seq: AtomicU64,
    /// Bumped on every release; waiters re-check their conflicts.
    wake_tx: watch::Sender<u64>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        let (wake_tx, _) = watch::channel(0);
        Self {
            inflight: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
            wake_tx,
        }
    }

    /// Register a job in wire order. Must be called on the reader task,
    /// before the job can reach a worker.
    pub fn register(&self, job: &mut Job) {
        job.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        job.keys = derive_keys(&job.payload);
        if job.keys.is_empty() {
            return;
        }
        let mut inflight = self.inflight.lock().expect("serializer poisoned");
        inflight.push_back(Registered {
            seq: job.seq,
            keys: job.keys.clone(),
        });
    }

    /// Wait until no earlier-registered job with an overlapping key set is
    /// still in flight. Called immediately before the handler runs.
    pub async fn acquire(&self, job: &Job) {
        if job.keys.is_empty() {
            return;
        }
        let mut wake_rx = self.wake_tx.subscribe();
        loop {
            if !self.has_conflict(job) {
                return;
            }
            // A release between the check and this await marks the channel
            // changed, so the wakeup cannot be lost.
            if wake_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drop a job's registration and wake any blocked successors. Called
    /// after the handler finished and its response was sent.
    pub fn release(&self, job: &Job) {
        if job.keys.is_empty() {
            return;
        }
        {
            let mut inflight = self.inflight.lock().expect("serializer poisoned");
            if let Some(pos) = inflight.iter().position(|r| r.seq == job.seq) {
                inflight.remove(pos);
            }
        }
        self.wake_tx.send_modify(|generation| *generation += 1);
    }

    fn has_conflict(&self, job: &Job) -> bool {
        let inflight = self.inflight.lock().expect("serializer poisoned");
        inflight.iter().any(|r| {
            r.seq < job.seq && r.keys.iter().any(|key| job.keys.contains(key))
        })
    }
}

/// Derive the serialization key set from a raw request payload.
///
/// Handle-bearing operations contend on the handle bytes; namespace-mutating
/// operations contend on their path arguments (both paths for RENAME,
/// SYMLINK and LINK). Read-only path lookups (STAT, LSTAT, REALPATH,
/// READLINK, OPENDIR) take no keys. A payload too short to parse yields no
/// keys; the dispatcher will refuse it as BAD_MESSAGE anyway.
pub fn derive_keys(payload: &Bytes) -> Vec<SerialKey> {
    let mut cursor = PacketCursor::new(payload.clone());
    let Ok(type_code) = cursor.u8() else {
        return Vec::new();
    };
    if type_code == SSH_FXP_INIT {
        return Vec::new();
    }
    if cursor.u32().is_err() {
        return Vec::new();
    }

    let mut keys = Vec::new();
    let handle = |cursor: &mut PacketCursor, keys: &mut Vec<SerialKey>| {
        if let Ok(bytes) = cursor.bytes() {
            keys.push(SerialKey::Handle(bytes));
        }
    };
    let path = |cursor: &mut PacketCursor, keys: &mut Vec<SerialKey>| {
        if let Ok(bytes) = cursor.bytes() {
            keys.push(SerialKey::Path(bytes));
        }
    };

    match type_code {
        SSH_FXP_CLOSE | SSH_FXP_READ | SSH_FXP_WRITE | SSH_FXP_FSTAT | SSH_FXP_FSETSTAT
        | SSH_FXP_READDIR => handle(&mut cursor, &mut keys),
        SSH_FXP_OPEN | SSH_FXP_SETSTAT | SSH_FXP_REMOVE | SSH_FXP_MKDIR | SSH_FXP_RMDIR => {
            path(&mut cursor, &mut keys)
        }
        SSH_FXP_RENAME | SSH_FXP_SYMLINK | SSH_FXP_LINK => {
            path(&mut cursor, &mut keys);
            path(&mut cursor, &mut keys);
        }
        _ => {}
    }
    keys
}
