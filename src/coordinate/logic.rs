//! coordinate::logic
//!
//! Which derived-graph views a reader uses.
//!
//! A logic coordinate may be built eagerly from internal ids, or lazily from
//! durable UUIDs that are bound to ids in a single [`LogicCoordinateRef::resolve`]
//! step before use.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::concepts;
use crate::core::ids::{IdError, IdentifierService};
use crate::core::types::{ConceptId, CoordinateDigest, DigestBuilder};

/// Resolved logic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicCoordinate {
    pub stated_assemblage: ConceptId,
    pub inferred_assemblage: ConceptId,
    pub description_logic_profile: ConceptId,
    pub classifier: ConceptId,
    pub concept_assemblage: ConceptId,
}

impl LogicCoordinate {
    /// The EL++ stated/inferred views with the standard classifier.
    pub fn el_plus_plus(ids: &dyn IdentifierService) -> Result<Self, IdError> {
        LazyLogicCoordinate::el_plus_plus().resolve(ids)
    }

    pub fn with_stated_assemblage(&self, assemblage: ConceptId) -> Self {
        Self {
            stated_assemblage: assemblage,
            ..*self
        }
    }

    pub fn with_inferred_assemblage(&self, assemblage: ConceptId) -> Self {
        Self {
            inferred_assemblage: assemblage,
            ..*self
        }
    }

    pub fn with_classifier(&self, classifier: ConceptId) -> Self {
        Self { classifier, ..*self }
    }

    pub fn digest(&self) -> CoordinateDigest {
        let mut builder = DigestBuilder::new("logic-coordinate");
        builder
            .concept(self.stated_assemblage)
            .concept(self.inferred_assemblage)
            .concept(self.description_logic_profile)
            .concept(self.classifier)
            .concept(self.concept_assemblage);
        builder.finish()
    }

    pub fn uuid(&self) -> Uuid {
        self.digest().to_uuid()
    }
}

/// Logic coordinate expressed in durable identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LazyLogicCoordinate {
    pub stated_assemblage: Uuid,
    pub inferred_assemblage: Uuid,
    pub description_logic_profile: Uuid,
    pub classifier: Uuid,
    pub concept_assemblage: Uuid,
}

impl LazyLogicCoordinate {
    pub fn el_plus_plus() -> Self {
        Self {
            stated_assemblage: concepts::STATED_ASSEMBLAGE.uuid(),
            inferred_assemblage: concepts::INFERRED_ASSEMBLAGE.uuid(),
            description_logic_profile: concepts::EL_PROFILE.uuid(),
            classifier: concepts::SNOROCKET_CLASSIFIER.uuid(),
            concept_assemblage: concepts::CONCEPT_ASSEMBLAGE.uuid(),
        }
    }

    /// Bind every reference to an internal id.
    ///
    /// # Errors
    ///
    /// Returns the first `IdError` encountered.
    pub fn resolve(&self, ids: &dyn IdentifierService) -> Result<LogicCoordinate, IdError> {
        Ok(LogicCoordinate {
            stated_assemblage: ids.id_of(&self.stated_assemblage)?,
            inferred_assemblage: ids.id_of(&self.inferred_assemblage)?,
            description_logic_profile: ids.id_of(&self.description_logic_profile)?,
            classifier: ids.id_of(&self.classifier)?,
            concept_assemblage: ids.id_of(&self.concept_assemblage)?,
        })
    }
}

/// Either form of logic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicCoordinateRef {
    Eager(LogicCoordinate),
    Lazy(LazyLogicCoordinate),
}

impl LogicCoordinateRef {
    pub fn resolve(&self, ids: &dyn IdentifierService) -> Result<LogicCoordinate, IdError> {
        match self {
            LogicCoordinateRef::Eager(coordinate) => Ok(*coordinate),
            LogicCoordinateRef::Lazy(lazy) => lazy.resolve(ids),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LogicCoordinateRef::Eager(_))
    }
}

impl From<LogicCoordinate> for LogicCoordinateRef {
    fn from(coordinate: LogicCoordinate) -> Self {
        LogicCoordinateRef::Eager(coordinate)
    }
}

impl From<LazyLogicCoordinate> for LogicCoordinateRef {
    fn from(lazy: LazyLogicCoordinate) -> Self {
        LogicCoordinateRef::Lazy(lazy)
    }
}
