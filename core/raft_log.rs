/*!
 * `RaftLog` (spec §6): the in-memory tail view the replica reads and
 * mutates directly. Entries at or below `stabled` are assumed durable in
 * `Storage`; entries above it live only in the `unstable` tail until the
 * driver persists them.
 */

use crate::error::StorageError;
use crate::storage::Storage;
use crate::types::{LogEntry, Term};

pub struct RaftLog<S> {
    store: S,
    /// Entries beyond what `store` held at construction time. Index
    /// `unstable[0].index == unstable_offset`.
    unstable: Vec<LogEntry>,
    unstable_offset: u64,
    pub committed: u64,
    pub applied: u64,
    pub stabled: u64,
}

impl<S: Storage> RaftLog<S> {
    pub fn new(store: S, committed: u64, applied: u64) -> Result<Self, StorageError> {
        let last = store.last_index()?;
        Ok(RaftLog {
            store,
            unstable: Vec::new(),
            unstable_offset: last + 1,
            committed,
            applied,
            stabled: last,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn first_index(&self) -> u64 {
        self.store.first_index().unwrap_or(1)
    }

    pub fn last_index(&self) -> u64 {
        if let Some(e) = self.unstable.last() {
            e.index
        } else {
            self.unstable_offset.saturating_sub(1)
        }
    }

    /// Term of the entry at `index`, or 0 if `index` is the zero sentinel
    /// or otherwise absent (mirrors Storage's treatment of index 0).
    pub fn term(&self, index: u64) -> Term {
        if index == 0 {
            return 0;
        }
        match self.to_slice_index(index) {
            Some(off) => self.unstable.get(off).map(|e| e.term).unwrap_or(0),
            None => self.store.term(index).unwrap_or(0),
        }
    }

    /// Maps a logical log index to its offset within the in-memory unstable
    /// tail, or `None` when `index` falls in the stable region served
    /// directly by `Storage`.
    pub fn to_slice_index(&self, index: u64) -> Option<usize> {
        if index >= self.unstable_offset {
            Some((index - self.unstable_offset) as usize)
        } else {
            None
        }
    }

    pub fn last_term(&self) -> Term {
        self.term(self.last_index())
    }

    /// Entries in `(lo, hi]`, drawn from storage and/or the unstable tail
    /// as needed.
    pub fn slice(&self, lo: u64, hi: u64) -> Vec<LogEntry> {
        if lo >= hi {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((hi - lo) as usize);
        let stable_hi = hi.min(self.unstable_offset.saturating_sub(1));
        if lo < stable_hi {
            if let Ok(mut stable) = self.store.entries(lo + 1, stable_hi + 1) {
                out.append(&mut stable);
            }
        }
        if hi >= self.unstable_offset {
            let start = lo.max(self.unstable_offset.saturating_sub(1));
            for e in &self.unstable {
                if e.index > start && e.index <= hi {
                    out.push(e.clone());
                }
            }
        }
        out
    }

    /// Entries not yet known to be durable — what the driver must persist
    /// before any dependent outbound message is sent.
    pub fn unstable_entries(&self) -> &[LogEntry] {
        &self.unstable
    }

    /// Append `entry` to the tail. Intended for the leader's own appends
    /// (no-op on election, client proposals).
    pub fn append(&mut self, entry: LogEntry) {
        debug_assert_eq!(entry.index, self.last_index() + 1);
        self.unstable.push(entry);
    }

    /// Truncate the unstable tail so that `from` and everything after it is
    /// discarded, then append `entry` in its place. Used when a follower's
    /// log conflicts with the leader's.
    pub fn truncate_and_append(&mut self, from: u64, entry: LogEntry) {
        if from >= self.unstable_offset {
            let off = (from - self.unstable_offset) as usize;
            self.unstable.truncate(off);
        } else {
            // conflict reaches into the already-stable region; nothing in
            // `unstable` survives, and the unstable view now starts at `from`.
            self.unstable.clear();
            self.unstable_offset = from;
        }
        self.unstable.push(entry);
    }

    /// Record the stable watermark as `index`, literally (spec §4.6/§9(ii):
    /// the truncation branch of `Append` handling can legitimately *lower*
    /// this, since a conflicting suffix means entries above the common
    /// prefix can no longer be trusted as durable matches). Clamped so it
    /// never exceeds `last_index`.
    ///
    /// Entries that fall behind the new watermark are dropped from the
    /// in-memory unstable tail and folded into the stable region — they
    /// must already be durable in `Storage` by the time a caller advances
    /// past them, since `unstable_entries()` is what the driver persists
    /// before calling this.
    pub fn mark_stable(&mut self, index: u64) {
        let index = index.min(self.last_index());
        self.stabled = index;
        if index + 1 > self.unstable_offset {
            let drop = (index + 1 - self.unstable_offset) as usize;
            self.unstable.drain(0..drop.min(self.unstable.len()));
            self.unstable_offset = index + 1;
        }
    }

    pub fn commit_to(&mut self, index: u64) -> bool {
        if index > self.committed && index <= self.last_index() {
            self.committed = index;
            true
        } else {
            false
        }
    }

    pub fn applied_to(&mut self, index: u64) {
        self.applied = self.applied.max(index).min(self.committed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    fn entry(term: Term, index: u64) -> LogEntry {
        LogEntry {
            term,
            index,
            data: Vec::new(),
        }
    }

    #[test]
    fn empty_log_has_last_index_zero() {
        let log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.last_term(), 0);
    }

    #[test]
    fn append_extends_unstable_tail() {
        let mut log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.term(1), 1);
        assert_eq!(log.unstable_entries().len(), 2);
    }

    #[test]
    fn truncate_and_append_discards_conflicting_suffix() {
        let mut log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        log.append(entry(1, 3));

        log.truncate_and_append(2, entry(2, 2));
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.term(2), 2);
    }

    #[test]
    fn commit_never_moves_backwards() {
        let mut log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        assert!(log.commit_to(2));
        assert!(!log.commit_to(1));
        assert_eq!(log.committed, 2);
    }

    #[test]
    fn slice_spans_stable_and_unstable_regions() {
        let storage = MemStorage::default();
        storage.append(&[entry(1, 1), entry(1, 2)]).unwrap();
        let mut log = RaftLog::new(storage, 0, 0).unwrap();
        log.append(entry(2, 3));

        let got = log.slice(0, 3);
        assert_eq!(got.len(), 3);
        assert_eq!(got[2].term, 2);
    }

    #[test]
    fn mark_stable_drops_persisted_entries_from_the_unstable_tail() {
        let mut log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        log.append(entry(1, 3));

        log.mark_stable(2);
        assert_eq!(log.stabled, 2);
        assert_eq!(log.unstable_entries().len(), 1);
        assert_eq!(log.unstable_entries()[0].index, 3);
        assert_eq!(log.last_index(), 3, "stabilized entries must not change last_index");
    }

    #[test]
    fn mark_stable_can_lower_the_watermark_on_a_conflicting_truncation() {
        let mut log = RaftLog::new(MemStorage::default(), 0, 0).unwrap();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        log.mark_stable(2);
        assert!(log.unstable_entries().is_empty());

        log.truncate_and_append(2, entry(2, 2));
        log.mark_stable(1);
        assert_eq!(log.stabled, 1, "a conflicting suffix must be able to lower the watermark");
        assert_eq!(log.unstable_entries().len(), 1);
        assert_eq!(log.unstable_entries()[0].index, 2);
    }
}
