//! coordinate::manifold
//!
//! The composite coordinate that fixes one consistent view: taxonomy
//! premise, stamp coordinates for both ends of a relationship, language
//! and logic coordinates, and an optional custom sort.
//!
//! # Invariants
//!
//! - Two manifolds with different custom sort instances are never equal,
//!   even if the functions behave identically. Callers that need
//!   value-equal sorts must share one [`CustomSort`].

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

use super::language::LanguageCoordinate;
use super::logic::LogicCoordinate;
use super::stamp::{ModuleFilterMode, StampCoordinate};
use super::CoordinateError;
use crate::core::ids::IdentifierService;
use crate::core::types::{ConceptId, CoordinateDigest, DigestBuilder, Premise, Status};

type SortFn = dyn Fn(ConceptId, ConceptId) -> Ordering + Send + Sync;

/// A shared concept ordering compared by identity.
#[derive(Clone)]
pub struct CustomSort(Arc<SortFn>);

impl CustomSort {
    pub fn new(sort: impl Fn(ConceptId, ConceptId) -> Ordering + Send + Sync + 'static) -> Self {
        Self(Arc::new(sort))
    }

    pub fn compare(&self, a: ConceptId, b: ConceptId) -> Ordering {
        (self.0)(a, b)
    }

    /// Address of the shared function, the basis of equality.
    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for CustomSort {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for CustomSort {}

impl Hash for CustomSort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl std::fmt::Debug for CustomSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomSort({:#x})", self.identity())
    }
}

/// An immutable manifold coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifoldCoordinate {
    premise: Premise,
    stamp: StampCoordinate,
    destination_stamp: StampCoordinate,
    language: LanguageCoordinate,
    logic: LogicCoordinate,
    custom_sort: Option<CustomSort>,
}

impl ManifoldCoordinate {
    /// Build a manifold; the destination stamp coordinate is derived from
    /// the stamp coordinate's destination position.
    pub fn new(
        premise: Premise,
        stamp: StampCoordinate,
        language: LanguageCoordinate,
        logic: LogicCoordinate,
    ) -> Self {
        let destination_stamp = stamp.destination_coordinate();
        Self {
            premise,
            stamp,
            destination_stamp,
            language,
            logic,
            custom_sort: None,
        }
    }

    /// Inferred view at latest on development, US English regular names.
    pub fn development_inferred(ids: &dyn IdentifierService) -> Result<Self, CoordinateError> {
        Ok(Self::new(
            Premise::Inferred,
            StampCoordinate::development_latest(ids)?,
            LanguageCoordinate::us_english_regular_name(ids)?,
            LogicCoordinate::el_plus_plus(ids)?,
        ))
    }

    pub fn premise(&self) -> Premise {
        self.premise
    }

    pub fn stamp_coordinate(&self) -> &StampCoordinate {
        &self.stamp
    }

    pub fn destination_stamp_coordinate(&self) -> &StampCoordinate {
        &self.destination_stamp
    }

    pub fn language_coordinate(&self) -> &LanguageCoordinate {
        &self.language
    }

    pub fn logic_coordinate(&self) -> &LogicCoordinate {
        &self.logic
    }

    pub fn custom_sort(&self) -> Option<&CustomSort> {
        self.custom_sort.as_ref()
    }

    /// Assemblage holding the taxonomy for this manifold's premise.
    pub fn taxonomy_assemblage(&self) -> ConceptId {
        match self.premise {
            Premise::Stated => self.logic.stated_assemblage,
            Premise::Inferred => self.logic.inferred_assemblage,
        }
    }

    /// Sort concepts with the custom sort, or by id without one.
    pub fn sort_concepts(&self, concepts: &mut [ConceptId]) {
        match &self.custom_sort {
            Some(sort) => concepts.sort_by(|a, b| sort.compare(*a, *b)),
            None => concepts.sort(),
        }
    }

    pub fn with_taxonomy_premise(&self, premise: Premise) -> Self {
        Self {
            premise,
            ..self.clone()
        }
    }

    pub fn with_stamp_coordinate(&self, stamp: StampCoordinate) -> Self {
        Self {
            stamp,
            ..self.clone()
        }
    }

    pub fn with_destination_stamp_coordinate(&self, destination: StampCoordinate) -> Self {
        Self {
            destination_stamp: destination,
            ..self.clone()
        }
    }

    pub fn with_language_coordinate(&self, language: LanguageCoordinate) -> Self {
        Self {
            language,
            ..self.clone()
        }
    }

    pub fn with_logic_coordinate(&self, logic: LogicCoordinate) -> Self {
        Self {
            logic,
            ..self.clone()
        }
    }

    pub fn with_custom_sort(&self, sort: Option<CustomSort>) -> Self {
        Self {
            custom_sort: sort,
            ..self.clone()
        }
    }

    /// Move both stamp coordinates to `time`.
    pub fn with_time(&self, time: i64) -> Self {
        Self {
            stamp: self.stamp.with_time(time),
            destination_stamp: self.destination_stamp.with_time(time),
            ..self.clone()
        }
    }

    /// Replace the allowed states of both stamp coordinates.
    pub fn with_states(&self, states: impl IntoIterator<Item = Status> + Clone) -> Self {
        Self {
            stamp: self.stamp.with_states(states.clone()),
            destination_stamp: self.destination_stamp.with_states(states),
            ..self.clone()
        }
    }

    /// Apply a module filter to both stamp coordinates.
    pub fn with_module_filter(
        &self,
        modules: impl IntoIterator<Item = ConceptId> + Clone,
        mode: ModuleFilterMode,
    ) -> Self {
        Self {
            stamp: self.stamp.with_module_filter(modules.clone(), mode),
            destination_stamp: self.destination_stamp.with_module_filter(modules, mode),
            ..self.clone()
        }
    }

    /// Structural digest; includes the custom sort's identity.
    ///
    /// Because sort identity is an address, digests of manifolds with a
    /// custom sort are only stable within one process.
    pub fn digest(&self) -> CoordinateDigest {
        let mut builder = DigestBuilder::new("manifold-coordinate");
        builder
            .u8(self.premise.code())
            .digest(&self.stamp.digest())
            .digest(&self.destination_stamp.digest())
            .digest(&self.language.digest())
            .digest(&self.logic.digest());
        match &self.custom_sort {
            Some(sort) => {
                builder.u8(1).u64(sort.identity() as u64);
            }
            None => {
                builder.u8(0);
            }
        }
        builder.finish()
    }

    pub fn uuid(&self) -> Uuid {
        self.digest().to_uuid()
    }
}
