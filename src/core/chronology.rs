//! core::chronology
//!
//! Versions, chronologies, and the storage contracts the core depends on.
//!
//! # Architecture
//!
//! A chronology is the append-only, commit-ordered list of versions of one
//! durable object. The core never owns persistent storage; it reads
//! histories through [`ChronologySource`] and publishes committed versions
//! through [`ChronologySink`]. [`InMemoryChronologyStore`] implements both
//! and is the default fixture.
//!
//! # Invariants
//!
//! - Histories only grow; versions are never removed or altered
//! - A batch appended with [`ChronologySink::append_batch`] becomes visible
//!   to readers all at once, or not at all

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{ChronologyId, StampSequence};

/// Errors from chronology storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused to accept a write for this chronology.
    #[error("write rejected for {chronology}: {reason}")]
    Rejected {
        chronology: ChronologyId,
        reason: String,
    },
}

/// One stamped value in a chronology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version<P> {
    pub stamp: StampSequence,
    pub payload: P,
}

impl<P> Version<P> {
    pub fn new(stamp: StampSequence, payload: P) -> Self {
        Self { stamp, payload }
    }
}

/// Read access to chronology histories.
pub trait ChronologySource<P>: Send + Sync {
    /// Versions of one object in commit order; empty if it has none.
    fn versions_of(&self, id: ChronologyId) -> Vec<Version<P>>;
}

/// Write access used by the commit service.
pub trait ChronologySink<P>: Send + Sync {
    /// Check whether a version for `id` would be accepted.
    fn validate_append(&self, id: ChronologyId, payload: &P) -> Result<(), StoreError>;

    /// Append a batch atomically; returns the new store generation.
    fn append_batch(&self, batch: Vec<(ChronologyId, Version<P>)>) -> Result<u64, StoreError>;
}

#[derive(Debug)]
struct StoreInner<P> {
    histories: HashMap<ChronologyId, Vec<Version<P>>>,
    rejected: HashMap<ChronologyId, String>,
    generation: u64,
}

impl<P> Default for StoreInner<P> {
    fn default() -> Self {
        Self {
            histories: HashMap::new(),
            rejected: HashMap::new(),
            generation: 0,
        }
    }
}

/// In-memory chronology store.
///
/// All histories live behind one `RwLock`, so a batch append and a
/// multi-chronology [`snapshot`](Self::snapshot) never interleave.
#[derive(Debug)]
pub struct InMemoryChronologyStore<P> {
    inner: RwLock<StoreInner<P>>,
    next_id: AtomicU64,
}

impl<P> Default for InMemoryChronologyStore<P> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<P: Clone + Send + Sync> InMemoryChronologyStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh chronology id.
    pub fn allocate_id(&self) -> ChronologyId {
        ChronologyId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append a single version.
    pub fn append(&self, id: ChronologyId, version: Version<P>) -> Result<u64, StoreError> {
        self.append_batch(vec![(id, version)])
    }

    /// Refuse all future writes for `id`.
    pub fn reject(&self, id: ChronologyId, reason: impl Into<String>) {
        self.inner.write().rejected.insert(id, reason.into());
    }

    /// Accept writes for `id` again.
    pub fn accept(&self, id: ChronologyId) {
        self.inner.write().rejected.remove(&id);
    }

    /// Read several histories under a single read guard.
    pub fn snapshot(&self, ids: &[ChronologyId]) -> HashMap<ChronologyId, Vec<Version<P>>> {
        let inner = self.inner.read();
        ids.iter()
            .map(|id| (*id, inner.histories.get(id).cloned().unwrap_or_default()))
            .collect()
    }

    /// Number of versions recorded for `id`.
    pub fn history_len(&self, id: ChronologyId) -> usize {
        self.inner.read().histories.get(&id).map_or(0, Vec::len)
    }

    /// Chronologies with at least one version, in id order.
    pub fn chronology_ids(&self) -> Vec<ChronologyId> {
        let mut ids: Vec<_> = self.inner.read().histories.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of batches appended so far.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

impl<P: Clone + Send + Sync> ChronologySource<P> for InMemoryChronologyStore<P> {
    fn versions_of(&self, id: ChronologyId) -> Vec<Version<P>> {
        self.inner
            .read()
            .histories
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

impl<P: Clone + Send + Sync> ChronologySink<P> for InMemoryChronologyStore<P> {
    fn validate_append(&self, id: ChronologyId, _payload: &P) -> Result<(), StoreError> {
        match self.inner.read().rejected.get(&id) {
            Some(reason) => Err(StoreError::Rejected {
                chronology: id,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn append_batch(&self, batch: Vec<(ChronologyId, Version<P>)>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();

        // Check the whole batch before touching any history.
        for (id, _) in &batch {
            if let Some(reason) = inner.rejected.get(id) {
                return Err(StoreError::Rejected {
                    chronology: *id,
                    reason: reason.clone(),
                });
            }
        }

        for (id, version) in batch {
            inner.histories.entry(id).or_default().push(version);
        }
        inner.generation += 1;
        Ok(inner.generation)
    }
}
