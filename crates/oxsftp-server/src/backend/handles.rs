//! The opaque handle table.
//!
//! Handles issued to the peer are 8-byte counters; the peer treats them as
//! opaque byte strings and so does the engine, which only uses them as
//! serialization keys.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::fs::{File, ReadDir};
use tokio::sync::Mutex as AsyncMutex;

/// An open file. The per-handle mutex serializes cursor movement; the
/// engine's request serializer already orders conflicting requests, so the
/// lock is only ever briefly contended.
pub struct FileHandle {
    pub file: AsyncMutex<File>,
    pub path: PathBuf,
    /// Opened with append semantics: WRITE offsets are ignored.
    pub append: bool,
    /// Unlink the file when the handle is closed (v6 open flag).
    pub delete_on_close: bool,
}

/// An open directory scan.
pub struct DirHandle {
    pub reader: AsyncMutex<ReadDir>,
    pub path: PathBuf,
}

pub enum Handle {
    File(FileHandle),
    Dir(DirHandle),
}

/// Issues and resolves opaque handles.
#[derive(Default)]
pub struct HandleTable {
    next: AtomicU64,
    map: Mutex<HashMap<Bytes, Arc<Handle>>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle and return its wire representation.
    pub fn insert(&self, handle: Handle) -> Bytes {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let key = Bytes::copy_from_slice(&id.to_be_bytes());
        self.map
            .lock()
            .expect("handle table poisoned")
            .insert(key.clone(), Arc::new(handle));
        key
    }

    pub fn get(&self, key: &[u8]) -> Option<Arc<Handle>> {
        self.map
            .lock()
            .expect("handle table poisoned")
            .get(key)
            .cloned()
    }

    pub fn remove(&self, key: &[u8]) -> Option<Arc<Handle>> {
        self.map.lock().expect("handle table poisoned").remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.lock().expect("handle table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
