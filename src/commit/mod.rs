//! commit
//!
//! Staging and atomic publication of stamped versions.
//!
//! # Modules
//!
//! - [`record`] - Commit ids, chronology state, commit records
//! - [`service`] - The commit service and its clock
//!
//! # Lifecycle
//!
//! Per chronology: `NoPendingChanges -> Uncommitted -> Committed`.
//! Versions are staged with a provisional stamp (`time = TIME_UNCOMMITTED`)
//! and are invisible to every reader until commit replaces the provisional
//! stamp with a final one and publishes the whole batch at once.

pub mod record;
pub mod service;

pub use record::{ChronologyState, CommitFailure, CommitId, CommitRecord};
pub use service::{Clock, CommitService};

use thiserror::Error;

use crate::core::stamp::StampError;
use crate::core::types::StampSequence;

/// Errors that abort a commit service operation.
///
/// Storage rejections are not errors: they are reported as
/// [`CommitFailure`]s inside the [`CommitRecord`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error(transparent)]
    Stamp(#[from] StampError),

    /// Only stamps with `time = TIME_UNCOMMITTED` may be staged.
    #[error("stamp {0} is not a provisional stamp")]
    NotProvisional(StampSequence),

    /// Commit times must not be a time sentinel.
    #[error("invalid commit time: {0}")]
    InvalidTime(i64),

    /// An earlier commit produced the same final stamp with a different
    /// comment. The batch stays pending; commit at another time.
    #[error("stamp {stamp} was already committed with a different comment")]
    CommentConflict { stamp: StampSequence },
}

/// Receives notification of successful commits.
pub trait CommitListener: Send + Sync {
    fn on_commit(&self, record: &CommitRecord);
}
