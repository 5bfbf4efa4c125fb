//! Identity registry: tracked files indexed by identity and by path.
//!
//! Records live in one arena owned by the registry. Two fixed-size bucket
//! tables hold `RecordId`s into that arena, one keyed by device+inode and one
//! keyed by canonical path. Every record is reachable from both tables.
//!
//! Hardlinked files share an identity, so only the first path observed for
//! an identity is tracked. A path that turns up with a new identity keeps the
//! old record and links it to the new one through `replacement`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::hash::TableHasher;
use crate::types::{FileIdentity, FileRecord};

/// Default bucket count for both indices.
pub const DEFAULT_BUCKETS: usize = 1 << 15;

/// Index of a record in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(usize);

/// Dual-indexed set of tracked files.
#[derive(Debug)]
pub struct IdentityRegistry {
    hasher: TableHasher,
    records: Vec<FileRecord>,
    by_identity: Vec<Vec<RecordId>>,
    by_path: Vec<Vec<RecordId>>,
}

impl IdentityRegistry {
    /// Empty registry with `DEFAULT_BUCKETS` buckets per index.
    #[must_use]
    pub fn new(hasher: TableHasher) -> Self {
        Self::with_buckets(hasher, DEFAULT_BUCKETS)
    }

    /// Empty registry with a custom bucket count (at least one).
    #[must_use]
    pub fn with_buckets(hasher: TableHasher, buckets: usize) -> Self {
        let buckets = buckets.max(1);
        Self {
            hasher,
            records: Vec::new(),
            by_identity: vec![Vec::new(); buckets],
            by_path: vec![Vec::new(); buckets],
        }
    }

    fn identity_bucket(&self, identity: FileIdentity) -> usize {
        self.hasher.hash_bytes(&identity.to_bytes()) as usize % self.by_identity.len()
    }

    fn path_bucket(&self, path: &Path) -> usize {
        self.hasher.hash_path(path) as usize % self.by_path.len()
    }

    /// Most recently inserted record with this identity.
    #[must_use]
    pub fn find_id_by_identity(&self, identity: FileIdentity) -> Option<RecordId> {
        self.by_identity[self.identity_bucket(identity)]
            .iter()
            .rev()
            .copied()
            .find(|id| self.records[id.0].identity == identity)
    }

    /// Exact match by device+inode.
    #[must_use]
    pub fn find_by_identity(&self, identity: FileIdentity) -> Option<&FileRecord> {
        self.find_id_by_identity(identity).map(|id| &self.records[id.0])
    }

    /// Most recently inserted record for this path.
    #[must_use]
    pub fn find_id_by_path(&self, path: impl AsRef<Path>) -> Option<RecordId> {
        let path = path.as_ref();
        self.by_path[self.path_bucket(path)]
            .iter()
            .rev()
            .copied()
            .find(|id| self.records[id.0].path == path)
    }

    /// Exact match by canonical path.
    #[must_use]
    pub fn find_by_path(&self, path: impl AsRef<Path>) -> Option<&FileRecord> {
        self.find_id_by_path(path).map(|id| &self.records[id.0])
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&FileRecord> {
        self.records.get(id.0)
    }

    /// The record that superseded `record`, if any.
    #[must_use]
    pub fn replacement_of(&self, record: &FileRecord) -> Option<&FileRecord> {
        record.replacement.and_then(|id| self.get(id))
    }

    fn append(&mut self, record: FileRecord) -> RecordId {
        let id = RecordId(self.records.len());
        let ib = self.identity_bucket(record.identity);
        let pb = self.path_bucket(&record.path);
        self.by_identity[ib].push(id);
        self.by_path[pb].push(id);
        self.records.push(record);
        id
    }

    /// Add a record loaded from a state file. No duplicate checks.
    pub fn insert_from_baseline(&mut self, record: FileRecord) -> RecordId {
        debug!(
            path = %record.path.display(),
            identity = %record.identity,
            mtime = record.mtime,
            "loaded from state"
        );
        self.append(record)
    }

    /// Track a file found while scanning.
    ///
    /// Returns `false` if the file was already known with the same identity
    /// and mtime (re-scan or hardlink); the caller's record is dropped and the
    /// known record's `times_found` is bumped. Returns `true` if the record
    /// was inserted, either as a new file or as the replacement of whatever
    /// was previously at its path.
    pub fn observe(&mut self, mut record: FileRecord) -> bool {
        let bucket = self.identity_bucket(record.identity);
        let known = self.by_identity[bucket].iter().copied().find(|id| {
            let existing = &self.records[id.0];
            existing.identity == record.identity && existing.mtime == record.mtime
        });
        if let Some(id) = known {
            let existing = &mut self.records[id.0];
            existing.times_found += 1;
            debug!(
                path = %record.path.display(),
                known_as = %existing.path.display(),
                identity = %existing.identity,
                "found in state"
            );
            return false;
        }

        record.times_found = 1;
        match self.find_id_by_path(&record.path) {
            Some(previous) => {
                let old = &self.records[previous.0];
                warn!(
                    path = %record.path.display(),
                    old = %old.identity,
                    old_mtime = %old.modified_at(),
                    new = %record.identity,
                    new_mtime = %record.modified_at(),
                    "file modified"
                );
                let new_id = self.append(record);
                self.records[previous.0].replacement = Some(new_id);
            }
            None => {
                info!(path = %record.path.display(), identity = %record.identity, "new file");
                self.append(record);
            }
        }
        true
    }

    /// Count one process mapping resolved to `id`.
    pub fn mark_referenced(&mut self, id: RecordId) {
        if let Some(record) = self.records.get_mut(id.0) {
            record.times_referenced += 1;
        }
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Log both indices bucket by bucket at trace level.
    pub fn dump(&self) {
        for (name, table) in [("identity", &self.by_identity), ("path", &self.by_path)] {
            trace!(index = name, records = self.records.len(), "dumping state");
            for (bucket, chain) in table.iter().enumerate() {
                for id in chain {
                    let r = &self.records[id.0];
                    trace!(
                        index = name,
                        bucket,
                        path = %r.path.display(),
                        identity = %r.identity,
                        mtime = r.mtime,
                        "record"
                    );
                }
            }
        }
    }

    /// Every record sits in exactly one bucket of each index, the bucket
    /// its key hashes to.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut seen_identity = vec![0u32; self.records.len()];
        let mut seen_path = vec![0u32; self.records.len()];
        for (bucket, chain) in self.by_identity.iter().enumerate() {
            for id in chain {
                if self.identity_bucket(self.records[id.0].identity) != bucket {
                    return false;
                }
                seen_identity[id.0] += 1;
            }
        }
        for (bucket, chain) in self.by_path.iter().enumerate() {
            for id in chain {
                if self.path_bucket(&self.records[id.0].path) != bucket {
                    return false;
                }
                seen_path[id.0] += 1;
            }
        }
        seen_identity.iter().all(|&n| n == 1) && seen_path.iter().all(|&n| n == 1)
    }
}
