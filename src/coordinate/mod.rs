//! coordinate
//!
//! Immutable read-policy value objects.
//!
//! # Modules
//!
//! - [`stamp`] - Stamp coordinate: position, precedence, state and module policy
//! - [`language`] - Language coordinate and description selection
//! - [`logic`] - Logic coordinate, eager and lazily bound
//! - [`manifold`] - Composite coordinate with taxonomy premise and custom sort
//!
//! # Invariants
//!
//! - Equality and hashing are structural, never by identity (the one
//!   exception is a manifold's custom sort function)
//! - Derivation methods return new values and never mutate `self`
//! - `digest()` is computed from structural fields only, so equal
//!   coordinates from different call sites digest identically

pub mod language;
pub mod logic;
pub mod manifold;
pub mod stamp;

pub use language::{
    Acceptability, DescriptionPayload, DescriptionTypeMemo, LanguageCoordinate,
};
pub use logic::{LazyLogicCoordinate, LogicCoordinate, LogicCoordinateRef};
pub use manifold::{CustomSort, ManifoldCoordinate};
pub use stamp::{ModuleFilterMode, StampCoordinate, StampCoordinateBuilder};

use thiserror::Error;

use crate::core::ids::IdError;

/// Errors from building coordinates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinateError {
    /// A referenced concept could not be mapped.
    #[error(transparent)]
    Identifier(#[from] IdError),

    /// A configured standard path name is not recognized.
    #[error("unknown standard path: {0}")]
    UnknownPath(String),
}
