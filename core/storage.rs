/*!
 * Storage collaborator (spec §6): supplies initial hard state, cluster
 * configuration, and historic log entries. Durability and snapshotting are
 * out of scope for this crate — `MemStorage` is an in-memory reference
 * implementation used by tests and the demo binary, never by the core
 * itself (the core only ever depends on the `Storage` trait).
 */

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::StorageError;
use crate::types::{ConfState, HardState, LogEntry, Term};

/// What a replica reads back from storage at construction time.
#[derive(Debug, Clone, Default)]
pub struct InitialState {
    pub hard_state: HardState,
    pub conf_state: ConfState,
}

/// The durable collaborator contract. The core calls this only through the
/// `RaftLog` view, never directly, and never concurrently with itself —
/// callers are free to share a `Storage` handle across threads (as
/// `MemStorage` does, via an internal lock) for demo/test purposes.
pub trait Storage {
    fn initial_state(&self) -> Result<InitialState, StorageError>;
    fn term(&self, index: u64) -> Result<Term, StorageError>;
    fn first_index(&self) -> Result<u64, StorageError>;
    fn last_index(&self) -> Result<u64, StorageError>;
    fn entries(&self, low: u64, high: u64) -> Result<Vec<LogEntry>, StorageError>;
}

#[derive(Debug)]
struct MemStorageCore {
    hard_state: HardState,
    conf_state: ConfState,
    // `entries[0]` is a dummy sentinel so that index `i` lives at
    // `entries[i - entries[0].index]`; first real entry has index 1.
    entries: Vec<LogEntry>,
}

impl MemStorageCore {
    fn offset(&self, index: u64) -> Option<usize> {
        let base = self.entries[0].index;
        if index < base {
            return None;
        }
        let off = (index - base) as usize;
        if off >= self.entries.len() {
            None
        } else {
            Some(off)
        }
    }
}

/// In-memory `Storage` implementation. Shareable across threads via `Arc`
/// clone; internally guarded by a `parking_lot::RwLock` so the demo binary
/// can hand the same handle to an interval-tick task and a network task
/// without the core ever taking a lock itself.
#[derive(Debug, Clone)]
pub struct MemStorage {
    inner: Arc<RwLock<MemStorageCore>>,
}

impl Default for MemStorage {
    fn default() -> Self {
        MemStorage::new(ConfState::default())
    }
}

impl MemStorage {
    pub fn new(conf_state: ConfState) -> Self {
        MemStorage {
            inner: Arc::new(RwLock::new(MemStorageCore {
                hard_state: HardState::default(),
                conf_state,
                entries: vec![LogEntry::default()],
            })),
        }
    }

    pub fn set_hard_state(&self, hs: HardState) {
        self.inner.write().hard_state = hs;
    }

    pub fn set_conf_state(&self, cs: ConfState) {
        self.inner.write().conf_state = cs;
    }

    /// Append entries to the durable tail. Entries must be contiguous and
    /// start at `last_index() + 1`; this mirrors the driver persisting the
    /// unstable entries that `RaftLog` handed it.
    pub fn append(&self, entries: &[LogEntry]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut core = self.inner.write();
        let first_new = entries[0].index;
        let base = core.entries[0].index;
        let truncate_at = (first_new - base) as usize;
        core.entries.truncate(truncate_at.max(1));
        core.entries.extend_from_slice(entries);
        Ok(())
    }
}

impl Storage for MemStorage {
    fn initial_state(&self) -> Result<InitialState, StorageError> {
        let core = self.inner.read();
        Ok(InitialState {
            hard_state: core.hard_state.clone(),
            conf_state: core.conf_state.clone(),
        })
    }

    fn term(&self, index: u64) -> Result<Term, StorageError> {
        let core = self.inner.read();
        if index == 0 {
            return Ok(0);
        }
        core.offset(index)
            .map(|off| core.entries[off].term)
            .ok_or(StorageError::Unavailable(index))
    }

    fn first_index(&self) -> Result<u64, StorageError> {
        let core = self.inner.read();
        Ok(core.entries[0].index + 1)
    }

    fn last_index(&self) -> Result<u64, StorageError> {
        let core = self.inner.read();
        Ok(core.entries[0].index + core.entries.len() as u64 - 1)
    }

    fn entries(&self, low: u64, high: u64) -> Result<Vec<LogEntry>, StorageError> {
        if low >= high {
            return Ok(Vec::new());
        }
        let core = self.inner.read();
        let lo_off = core.offset(low).ok_or(StorageError::Unavailable(low))?;
        let hi_off = (high - core.entries[0].index) as usize;
        if hi_off > core.entries.len() {
            return Err(StorageError::Unavailable(high - 1));
        }
        Ok(core.entries[lo_off..hi_off].to_vec())
    }
}
