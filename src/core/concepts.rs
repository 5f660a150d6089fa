//! core::concepts
//!
//! Well-known concepts referenced by default coordinates.
//!
//! Each concept is identified by a stable name; its UUID is derived from
//! that name (see [`name_uuid`]), so every registry agrees on it.

use uuid::Uuid;

use super::ids::{name_uuid, IdError, IdentifierService};
use super::types::ConceptId;

/// A concept with a fixed durable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellKnown {
    name: &'static str,
}

impl WellKnown {
    const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn uuid(&self) -> Uuid {
        name_uuid(self.name)
    }

    /// Resolve to an internal id.
    ///
    /// # Errors
    ///
    /// Returns `IdError::UnknownUuid` if the registry was not seeded with it.
    pub fn id(&self, ids: &dyn IdentifierService) -> Result<ConceptId, IdError> {
        ids.id_of(&self.uuid())
    }
}

// Paths
pub const DEVELOPMENT_PATH: WellKnown = WellKnown::new("path/development");
pub const MASTER_PATH: WellKnown = WellKnown::new("path/master");
pub const PRIMORDIAL_PATH: WellKnown = WellKnown::new("path/primordial");

// Modules
pub const CORE_MODULE: WellKnown = WellKnown::new("module/core");
pub const PRIMORDIAL_MODULE: WellKnown = WellKnown::new("module/primordial");

// Authors
pub const SYSTEM_USER: WellKnown = WellKnown::new("user/system");

// Languages and dialects
pub const ENGLISH_LANGUAGE: WellKnown = WellKnown::new("language/english");
pub const US_ENGLISH_DIALECT: WellKnown = WellKnown::new("dialect/en-us");
pub const GB_ENGLISH_DIALECT: WellKnown = WellKnown::new("dialect/en-gb");

// Description types
pub const FULLY_SPECIFIED_NAME: WellKnown = WellKnown::new("description-type/fully-specified-name");
pub const REGULAR_NAME: WellKnown = WellKnown::new("description-type/regular-name");
pub const DEFINITION: WellKnown = WellKnown::new("description-type/definition");

// Logic
pub const STATED_ASSEMBLAGE: WellKnown = WellKnown::new("logic/el-plus-plus-stated");
pub const INFERRED_ASSEMBLAGE: WellKnown = WellKnown::new("logic/el-plus-plus-inferred");
pub const EL_PROFILE: WellKnown = WellKnown::new("logic/el-plus-plus-profile");
pub const SNOROCKET_CLASSIFIER: WellKnown = WellKnown::new("logic/snorocket-classifier");
pub const CONCEPT_ASSEMBLAGE: WellKnown = WellKnown::new("logic/concept-assemblage");

/// Every well-known concept, in registration order.
pub const WELL_KNOWN: [WellKnown; 17] = [
    DEVELOPMENT_PATH,
    MASTER_PATH,
    PRIMORDIAL_PATH,
    CORE_MODULE,
    PRIMORDIAL_MODULE,
    SYSTEM_USER,
    ENGLISH_LANGUAGE,
    US_ENGLISH_DIALECT,
    GB_ENGLISH_DIALECT,
    FULLY_SPECIFIED_NAME,
    REGULAR_NAME,
    DEFINITION,
    STATED_ASSEMBLAGE,
    INFERRED_ASSEMBLAGE,
    EL_PROFILE,
    SNOROCKET_CLASSIFIER,
    CONCEPT_ASSEMBLAGE,
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::core::ids::IdentifierRegistry;

    #[test]
    fn names_are_unique() {
        let uuids: HashSet<Uuid> = WELL_KNOWN.iter().map(WellKnown::uuid).collect();
        assert_eq!(uuids.len(), WELL_KNOWN.len());
    }

    #[test]
    fn resolves_against_seeded_registry() {
        let ids = IdentifierRegistry::with_well_known();
        assert_eq!(DEVELOPMENT_PATH.id(&ids).unwrap().get(), 1);
        assert!(CONCEPT_ASSEMBLAGE.id(&ids).is_ok());
    }

    #[test]
    fn unseeded_registry_reports_unknown() {
        let ids = IdentifierRegistry::new();
        assert_eq!(
            MASTER_PATH.id(&ids),
            Err(IdError::UnknownUuid(MASTER_PATH.uuid()))
        );
    }
}
