//! Ordered byte key-value engines.
//!
//! The prompt state store is written against [`ByteStore`] so the engine can
//! be swapped: SQLite on disk, a `BTreeMap` in memory.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::Result;

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOp::Delete { key: key.into() }
    }
}

/// Whether a scan should keep going after a visited entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// An ordered key-value byte store.
///
/// Keys compare as raw bytes. `write_batch` applies all ops or none.
pub trait ByteStore: Send {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Visit entries in ascending key order within `[start, end]` bounds.
    ///
    /// At most `limit` entries are visited when a limit is given. The visitor
    /// may stop early and may fail, which aborts the scan with its error.
    fn scan(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        limit: Option<usize>,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ScanControl>,
    ) -> Result<()>;

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<()>;

    /// Remove every key.
    fn clear(&mut self) -> Result<()>;
}

/// In-memory engine for tests and ephemeral stores.
#[derive(Debug, Default, Clone)]
pub struct MemoryByteStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owned(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl ByteStore for MemoryByteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn scan(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        limit: Option<usize>,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ScanControl>,
    ) -> Result<()> {
        // BTreeMap::range panics on inverted bounds
        if let (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) = (start, end) {
            let empty = s > e || (s == e && !matches!((start, end), (Bound::Included(_), Bound::Included(_))));
            if empty {
                return Ok(());
            }
        }

        let range = self.entries.range::<Vec<u8>, _>((owned(start), owned(end)));
        for (key, value) in range.take(limit.unwrap_or(usize::MAX)) {
            if visit(key, value)? == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<()> {
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    self.entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
