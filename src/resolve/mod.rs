//! resolve
//!
//! Latest-version resolution.
//!
//! # Modules
//!
//! - [`latest`] - The resolution result type
//! - [`calculator`] - Visibility, relative position and latest-version computation
//! - [`cache`] - Memo table for resolution results
//!
//! # Invariants
//!
//! - Resolution is pure: the same history and coordinate always produce the
//!   same result
//! - Ambiguity is a value ([`LatestVersion::Contradicted`]), never an error
//! - Invariant violations (path cycles, unknown paths or stamps) abort
//!   resolution

pub mod cache;
pub mod calculator;
pub mod latest;

pub use cache::ResolutionCache;
pub use calculator::{RelativePosition, RelativePositionCalculator};
pub use latest::LatestVersion;

use thiserror::Error;

use crate::core::ids::IdError;
use crate::core::path::PathError;
use crate::core::types::{ConceptId, StampSequence};

/// Errors that abort resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A version carries a stamp sequence the stamp service never allocated.
    #[error("stamp not found: {0}")]
    StampNotFound(StampSequence),

    /// Following origins from this path leads back to it.
    #[error("path cycle at {0}; resolution aborted")]
    PathCycle(ConceptId),

    /// The coordinate's route reaches a path the graph does not contain.
    #[error("unknown path: {0}")]
    UnknownPath(ConceptId),

    /// A referenced concept could not be mapped.
    #[error(transparent)]
    Identifier(#[from] IdError),
}

impl From<PathError> for ResolveError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Cycle(path) => ResolveError::PathCycle(path),
            PathError::UnknownPath(path) => ResolveError::UnknownPath(path),
        }
    }
}
