//! core
//!
//! Core domain types, identifier and stamp services, the path model, and
//! chronology storage contracts.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ConceptId, StampSequence, Status, etc.
//! - [`ids`] - Identifier service and in-memory registry
//! - [`concepts`] - Well-known concepts with fixed identities
//! - [`stamp`] - Stamp tuples and the interning service
//! - [`path`] - Editing paths, positions and the origin graph
//! - [`verify`] - Fast verification of path graph invariants
//! - [`chronology`] - Versions and storage contracts
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Shared registries are explicit values, never process globals
//! - All verification is deterministic

pub mod chronology;
pub mod concepts;
pub mod config;
pub mod ids;
pub mod path;
pub mod stamp;
pub mod types;
pub mod verify;
