//! Stampwork - STAMP versioning and coordinate resolution
//!
//! Stampwork is the versioning core of a terminology knowledge base. Every
//! version of every object carries a stamp `(status, time, author, module,
//! path)`, and readers pick a consistent view by supplying a coordinate: a
//! deterministic policy for resolving "the current value of X" out of a
//! history that may disagree across paths and modules.
//!
//! # Architecture
//!
//! - [`core`] - Strong types, identifier and stamp services, path graph,
//!   chronology storage contracts, configuration
//! - [`coordinate`] - Immutable stamp, language, logic and manifold
//!   coordinates with derivation and digests
//! - [`resolve`] - Latest-version resolution, contradiction detection and
//!   the resolution cache
//! - [`commit`] - Staging, atomic batch commit, cancellation and aliases
//! - [`exchange`] - Binary stamp, alias and comment records
//!
//! # Correctness Invariants
//!
//! Stampwork maintains the following invariants:
//!
//! 1. Equal stamp tuples always intern to the same sequence
//! 2. Coordinates are never mutated; derivation returns new values
//! 3. Uncommitted and canceled stamps are never visible to resolution
//! 4. A commit batch becomes visible to readers all at once or not at all

pub mod commit;
pub mod coordinate;
pub mod core;
pub mod exchange;
pub mod resolve;
