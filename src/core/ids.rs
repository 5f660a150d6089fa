//! core::ids
//!
//! Identifier resolution between durable UUIDs and internal concept ids.
//!
//! # Architecture
//!
//! The versioning core only ever needs the bidirectional mapping
//! `uuid <-> ConceptId`. [`IdentifierService`] is that contract;
//! [`IdentifierRegistry`] is a thread-safe in-memory implementation used as
//! the default and as an isolated test fixture. How identifiers are
//! persisted is a storage-layer concern.
//!
//! # Invariants
//!
//! - A UUID maps to exactly one concept id and vice versa
//! - Concept ids are assigned densely from 1 and never reused
//! - Lookups never create identifiers; only [`IdentifierRegistry::assign`] does
//!
//! # Example
//!
//! ```
//! use stampwork::core::ids::{IdentifierRegistry, IdentifierService};
//! use uuid::Uuid;
//!
//! let ids = IdentifierRegistry::new();
//! let uuid = Uuid::new_v4();
//! let id = ids.assign(uuid);
//!
//! assert_eq!(ids.assign(uuid), id);
//! assert_eq!(ids.uuid_of(id).unwrap(), uuid);
//! assert!(ids.id_of(&Uuid::new_v4()).is_err());
//! ```

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use super::concepts;
use super::types::ConceptId;

/// Namespace for name-derived concept UUIDs.
pub const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x2f0c_8b3a_51d4_4e6f_9c7a_0d1e_5b2a_3c4d);

/// Errors from identifier resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// No concept is registered for the UUID.
    #[error("no identifier registered for uuid {0}")]
    UnknownUuid(Uuid),

    /// The concept id has never been assigned.
    #[error("reference not found: {0}")]
    ReferenceNotFound(ConceptId),
}

/// Bidirectional mapping between durable and internal identifiers.
pub trait IdentifierService: Send + Sync {
    /// Internal id for a durable UUID.
    fn id_of(&self, uuid: &Uuid) -> Result<ConceptId, IdError>;

    /// Durable UUID for an internal id.
    fn uuid_of(&self, id: ConceptId) -> Result<Uuid, IdError>;

    /// Whether the internal id is known.
    fn contains(&self, id: ConceptId) -> bool {
        self.uuid_of(id).is_ok()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_uuid: HashMap<Uuid, ConceptId>,
    uuids: Vec<Uuid>,
}

/// Thread-safe in-memory identifier registry.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    inner: RwLock<RegistryInner>,
}

impl IdentifierRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every well-known concept pre-registered.
    ///
    /// Well-known concepts receive ids in the order of
    /// [`concepts::WELL_KNOWN`], so fixtures are reproducible.
    pub fn with_well_known() -> Self {
        let registry = Self::new();
        for concept in concepts::WELL_KNOWN {
            registry.assign(concept.uuid());
        }
        registry
    }

    /// Get the id for `uuid`, assigning the next free id if needed.
    pub fn assign(&self, uuid: Uuid) -> ConceptId {
        if let Some(id) = self.inner.read().by_uuid.get(&uuid) {
            return *id;
        }

        let mut inner = self.inner.write();
        // Another writer may have assigned it between the two locks.
        if let Some(id) = inner.by_uuid.get(&uuid) {
            return *id;
        }
        inner.uuids.push(uuid);
        let id = ConceptId::from_index(inner.uuids.len() - 1);
        inner.by_uuid.insert(uuid, id);
        tracing::trace!(%uuid, %id, "assigned concept id");
        id
    }

    /// Assign an id for a concept identified by a stable name.
    pub fn assign_name(&self, name: &str) -> ConceptId {
        self.assign(name_uuid(name))
    }

    /// Number of registered identifiers.
    pub fn len(&self) -> usize {
        self.inner.read().uuids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentifierService for IdentifierRegistry {
    fn id_of(&self, uuid: &Uuid) -> Result<ConceptId, IdError> {
        self.inner
            .read()
            .by_uuid
            .get(uuid)
            .copied()
            .ok_or(IdError::UnknownUuid(*uuid))
    }

    fn uuid_of(&self, id: ConceptId) -> Result<Uuid, IdError> {
        self.inner
            .read()
            .uuids
            .get(id.index())
            .copied()
            .ok_or(IdError::ReferenceNotFound(id))
    }
}

/// UUID derived from a stable concept name.
pub fn name_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes())
}
