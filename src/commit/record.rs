//! commit::record
//!
//! Commit identifiers, per-chronology state, and the record a commit
//! produces.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::{describe_time, ChronologyId, StampSequence};

/// Unique identifier for a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(String);

impl CommitId {
    /// Generate a new unique commit id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit lifecycle state of one chronology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChronologyState {
    /// Nothing staged and nothing committed through this service.
    NoPendingChanges,
    /// At least one staged version awaits commit.
    Uncommitted,
    /// The last staged batch touching it was committed.
    Committed,
}

impl ChronologyState {
    pub fn has_pending(&self) -> bool {
        matches!(self, ChronologyState::Uncommitted)
    }
}

/// A chronology whose staged versions could not be finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFailure {
    pub chronology: ChronologyId,
    pub reason: String,
}

/// Outcome of one commit attempt.
///
/// A failed attempt has a non-empty `failures` list and empty `stamps`
/// and `committed`: nothing from the batch was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: CommitId,
    /// Commit time in epoch millis.
    pub time: i64,
    pub comment: Option<String>,
    /// Final stamps allocated, in first-use order.
    pub stamps: Vec<StampSequence>,
    /// Chronologies that received versions, in id order.
    pub committed: Vec<ChronologyId>,
    pub failures: Vec<CommitFailure>,
}

impl CommitRecord {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the commit published nothing because nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.is_success() && self.committed.is_empty()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        if self.is_success() {
            format!(
                "commit {} at {}: {} chronologies, {} stamps",
                self.commit_id,
                describe_time(self.time),
                self.committed.len(),
                self.stamps.len()
            )
        } else {
            format!(
                "commit {} at {} failed for {} chronologies",
                self.commit_id,
                describe_time(self.time),
                self.failures.len()
            )
        }
    }
}
