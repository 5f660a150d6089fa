//! coordinate::stamp
//!
//! The stamp coordinate: which versions a reader can see.
//!
//! # Architecture
//!
//! A [`StampCoordinate`] fixes a position (time and path), a precedence
//! rule, the statuses a reader admits, an optional module filter, and a
//! module priority order used to break ties between equally recent
//! versions. The destination position defaults to the position.
//!
//! # Serialization
//!
//! The serde form lists fields in the order position, allowed states,
//! precedence, module specifications, module preference order, followed
//! by the destination position when one was set explicitly.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use stampwork::coordinate::StampCoordinate;
//! use stampwork::core::path::StampPosition;
//! use stampwork::core::types::{ConceptId, Precedence, Status};
//!
//! let path = ConceptId::new(1).unwrap();
//! let coordinate = StampCoordinate::builder(StampPosition::new(150, path))
//!     .precedence(Precedence::Time)
//!     .allowed_states([Status::Active])
//!     .build();
//!
//! let later = coordinate.with_time(250);
//! assert_eq!(coordinate.position().time, 150);
//! assert_eq!(later.position().time, 250);
//! assert_ne!(coordinate.digest(), later.digest());
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CoordinateError;
use crate::core::concepts;
use crate::core::config::Config;
use crate::core::ids::{name_uuid, IdentifierService};
use crate::core::path::StampPosition;
use crate::core::types::{ConceptId, CoordinateDigest, DigestBuilder, Precedence, Status};

/// How `with_module_filter` combines the new modules with the old filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFilterMode {
    /// Union with the existing filter.
    Additive,
    /// Discard the existing filter.
    Replace,
}

/// An immutable stamp coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StampCoordinate {
    position: StampPosition,
    allowed_states: BTreeSet<Status>,
    precedence: Precedence,
    module_specifications: BTreeSet<ConceptId>,
    module_preference_order: Vec<ConceptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<StampPosition>,
}

impl StampCoordinate {
    /// Start building a coordinate at `position`.
    ///
    /// Defaults: path precedence, active and inactive states, no module
    /// filter, no module priority.
    pub fn builder(position: StampPosition) -> StampCoordinateBuilder {
        StampCoordinateBuilder {
            coordinate: StampCoordinate {
                position,
                allowed_states: BTreeSet::from([Status::Active, Status::Inactive]),
                precedence: Precedence::Path,
                module_specifications: BTreeSet::new(),
                module_preference_order: Vec::new(),
                destination: None,
            },
        }
    }

    /// Latest position on the development path, active and inactive.
    pub fn development_latest(ids: &dyn IdentifierService) -> Result<Self, CoordinateError> {
        let path = concepts::DEVELOPMENT_PATH.id(ids)?;
        Ok(Self::builder(StampPosition::latest(path)).build())
    }

    /// Latest position on the development path, active only.
    pub fn development_latest_active_only(
        ids: &dyn IdentifierService,
    ) -> Result<Self, CoordinateError> {
        Ok(Self::development_latest(ids)?.with_states([Status::Active]))
    }

    /// Latest position on the master path, active and inactive.
    pub fn master_latest(ids: &dyn IdentifierService) -> Result<Self, CoordinateError> {
        let path = concepts::MASTER_PATH.id(ids)?;
        Ok(Self::builder(StampPosition::latest(path)).build())
    }

    /// The default coordinate described by `config`, at latest.
    ///
    /// # Errors
    ///
    /// - [`CoordinateError::UnknownPath`] for an unrecognized path name
    /// - [`CoordinateError::Identifier`] if a module name is not registered
    pub fn from_config(
        config: &Config,
        ids: &dyn IdentifierService,
    ) -> Result<Self, CoordinateError> {
        let path = match config.default_path() {
            "development" => concepts::DEVELOPMENT_PATH.id(ids)?,
            "master" => concepts::MASTER_PATH.id(ids)?,
            other => return Err(CoordinateError::UnknownPath(other.to_string())),
        };
        let priority = config
            .module_priority()
            .iter()
            .map(|name| ids.id_of(&name_uuid(name)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::builder(StampPosition::latest(path))
            .precedence(config.precedence())
            .allowed_states(config.allowed_states())
            .module_priority(priority)
            .build())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    pub fn position(&self) -> StampPosition {
        self.position
    }

    /// Destination position; the position unless set explicitly.
    pub fn destination(&self) -> StampPosition {
        self.destination.unwrap_or(self.position)
    }

    pub fn allowed_states(&self) -> &BTreeSet<Status> {
        &self.allowed_states
    }

    /// Module filter; empty means unrestricted.
    pub fn module_filter(&self) -> &BTreeSet<ConceptId> {
        &self.module_specifications
    }

    /// Module priority, highest first.
    pub fn module_priority(&self) -> &[ConceptId] {
        &self.module_preference_order
    }

    pub fn admits_status(&self, status: Status) -> bool {
        self.allowed_states.contains(&status)
    }

    pub fn admits_module(&self, module: ConceptId) -> bool {
        self.module_specifications.is_empty() || self.module_specifications.contains(&module)
    }

    /// Rank of `module` in the priority order; lower is stronger.
    pub fn module_rank(&self, module: ConceptId) -> Option<usize> {
        self.module_preference_order.iter().position(|m| *m == module)
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    /// Same coordinate at a different time on the same path.
    pub fn with_time(&self, time: i64) -> Self {
        Self {
            position: self.position.with_time(time),
            ..self.clone()
        }
    }

    /// Same coordinate at the same time on a different path.
    pub fn with_path(&self, path: ConceptId) -> Self {
        Self {
            position: StampPosition::new(self.position.time, path),
            ..self.clone()
        }
    }

    pub fn with_position(&self, position: StampPosition) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn with_states(&self, states: impl IntoIterator<Item = Status>) -> Self {
        Self {
            allowed_states: states.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_module_filter(
        &self,
        modules: impl IntoIterator<Item = ConceptId>,
        mode: ModuleFilterMode,
    ) -> Self {
        let mut filter = match mode {
            ModuleFilterMode::Additive => self.module_specifications.clone(),
            ModuleFilterMode::Replace => BTreeSet::new(),
        };
        filter.extend(modules);
        Self {
            module_specifications: filter,
            ..self.clone()
        }
    }

    pub fn with_module_priority(&self, priority: impl IntoIterator<Item = ConceptId>) -> Self {
        Self {
            module_preference_order: priority.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_precedence(&self, precedence: Precedence) -> Self {
        Self {
            precedence,
            ..self.clone()
        }
    }

    /// Set or clear the explicit destination position.
    ///
    /// A destination equal to the position is stored as no destination, so
    /// both spellings compare and digest equal.
    pub fn with_destination(&self, destination: Option<StampPosition>) -> Self {
        Self {
            destination: destination.filter(|d| *d != self.position),
            ..self.clone()
        }
    }

    /// Coordinate positioned at the destination, for reading the
    /// destination side of a relationship.
    pub fn destination_coordinate(&self) -> Self {
        Self {
            position: self.destination(),
            destination: None,
            ..self.clone()
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Structural content digest.
    pub fn digest(&self) -> CoordinateDigest {
        let mut builder = DigestBuilder::new("stamp-coordinate");
        builder
            .i64(self.position.time)
            .concept(self.position.path)
            .u64(self.allowed_states.len() as u64);
        for status in &self.allowed_states {
            builder.u8(status.code());
        }
        builder
            .u8(self.precedence.code())
            .concepts(self.module_specifications.iter())
            .concepts(self.module_preference_order.iter());
        match self.destination {
            Some(destination) => {
                builder.u8(1).i64(destination.time).concept(destination.path);
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

impl std::fmt::Display for StampCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let states: Vec<_> = self.allowed_states.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "{:?} precedence at {} [{}]",
            self.precedence,
            self.position,
            states.join(", ")
        )?;
        if !self.module_specifications.is_empty() {
            write!(f, " modules {:?}", self.module_specifications)?;
        }
        Ok(())
    }
}

/// Builder for [`StampCoordinate`].
#[derive(Debug, Clone)]
pub struct StampCoordinateBuilder {
    coordinate: StampCoordinate,
}

impl StampCoordinateBuilder {
    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.coordinate.precedence = precedence;
        self
    }

    pub fn allowed_states(mut self, states: impl IntoIterator<Item = Status>) -> Self {
        self.coordinate.allowed_states = states.into_iter().collect();
        self
    }

    pub fn module_filter(mut self, modules: impl IntoIterator<Item = ConceptId>) -> Self {
        self.coordinate.module_specifications = modules.into_iter().collect();
        self
    }

    pub fn module_priority(mut self, priority: impl IntoIterator<Item = ConceptId>) -> Self {
        self.coordinate.module_preference_order = priority.into_iter().collect();
        self
    }

    pub fn destination(mut self, destination: StampPosition) -> Self {
        self.coordinate.destination = Some(destination);
        self
    }

    pub fn build(self) -> StampCoordinate {
        let mut coordinate = self.coordinate;
        if coordinate.destination == Some(coordinate.position) {
            coordinate.destination = None;
        }
        coordinate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CoordinateDefaults, StampworkConfig};
    use crate::core::ids::IdentifierRegistry;
    use crate::core::types::TIME_LATEST;

    fn id(n: i32) -> ConceptId {
        ConceptId::new(n).unwrap()
    }

    fn sample() -> StampCoordinate {
        StampCoordinate::builder(StampPosition::new(100, id(1)))
            .precedence(Precedence::Time)
            .allowed_states([Status::Active])
            .module_filter([id(5)])
            .module_priority([id(6), id(5)])
            .build()
    }

    #[test]
    fn builder_defaults() {
        let c = StampCoordinate::builder(StampPosition::latest(id(1))).build();
        assert_eq!(c.precedence(), Precedence::Path);
        assert!(c.admits_status(Status::Active));
        assert!(c.admits_status(Status::Inactive));
        assert!(!c.admits_status(Status::Primordial));
        assert!(c.admits_module(id(99)));
        assert_eq!(c.destination(), c.position());
    }

    #[test]
    fn derivations_leave_original_untouched() {
        let original = sample();
        let snapshot = original.clone();

        let _ = original.with_time(500);
        let _ = original.with_path(id(2));
        let _ = original.with_states([Status::Inactive]);
        let _ = original.with_module_filter([id(7)], ModuleFilterMode::Replace);
        let _ = original.with_module_priority(std::iter::empty());
        let _ = original.with_precedence(Precedence::Path);
        let _ = original.with_destination(Some(StampPosition::new(1, id(3))));

        assert_eq!(original, snapshot);
        assert_eq!(original.digest(), snapshot.digest());
    }

    #[test]
    fn equal_inputs_derive_equal_values() {
        let c = sample();
        assert_eq!(c.with_time(42), c.with_time(42));
        assert_eq!(c.with_time(42).digest(), c.with_time(42).digest());
        assert_eq!(c.with_time(100), c);
    }

    #[test]
    fn module_filter_modes() {
        let c = sample();
        let added = c.with_module_filter([id(7)], ModuleFilterMode::Additive);
        assert_eq!(added.module_filter(), &BTreeSet::from([id(5), id(7)]));

        let replaced = c.with_module_filter([id(7)], ModuleFilterMode::Replace);
        assert_eq!(replaced.module_filter(), &BTreeSet::from([id(7)]));
        assert!(!replaced.admits_module(id(5)));
    }

    #[test]
    fn module_rank_follows_priority() {
        let c = sample();
        assert_eq!(c.module_rank(id(6)), Some(0));
        assert_eq!(c.module_rank(id(5)), Some(1));
        assert_eq!(c.module_rank(id(9)), None);
    }

    #[test]
    fn independent_construction_is_interchangeable() {
        assert_eq!(sample(), sample());
        assert_eq!(sample().uuid(), sample().uuid());
    }

    #[test]
    fn digest_distinguishes_fields() {
        let c = sample();
        let digests = BTreeSet::from([
            c.digest(),
            c.with_time(101).digest(),
            c.with_path(id(2)).digest(),
            c.with_states([Status::Inactive]).digest(),
            c.with_precedence(Precedence::Path).digest(),
            c.with_module_priority([id(5), id(6)]).digest(),
            c.with_module_filter(std::iter::empty(), ModuleFilterMode::Replace).digest(),
            c.with_destination(Some(StampPosition::new(7, id(4)))).digest(),
        ]);
        assert_eq!(digests.len(), 8);
    }

    #[test]
    fn destination_at_position_is_no_destination() {
        let c = sample();
        let explicit = c.with_destination(Some(c.position()));
        assert_eq!(explicit, c);
        assert_eq!(explicit.digest(), c.digest());
        assert!(!serde_json::to_string(&explicit).unwrap().contains("destination"));

        let built = StampCoordinate::builder(c.position())
            .precedence(Precedence::Time)
            .allowed_states([Status::Active])
            .module_filter([id(5)])
            .module_priority([id(6), id(5)])
            .destination(c.position())
            .build();
        assert_eq!(built, c);
    }

    #[test]
    fn destination_coordinate_moves_position() {
        let dest = StampPosition::new(7, id(4));
        let c = sample().with_destination(Some(dest));
        let d = c.destination_coordinate();
        assert_eq!(d.position(), dest);
        assert_eq!(d.destination(), dest);
    }

    #[test]
    fn serde_field_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        let order = [
            "position",
            "allowed_states",
            "precedence",
            "module_specifications",
            "module_preference_order",
        ];
        let offsets: Vec<usize> = order.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert!(!json.contains("destination"));
    }

    #[test]
    fn serde_roundtrip_with_destination() {
        let c = sample().with_destination(Some(StampPosition::new(5, id(2))));
        let json = serde_json::to_string(&c).unwrap();
        let parsed: StampCoordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn standard_constructors() {
        let ids = IdentifierRegistry::with_well_known();
        let dev = StampCoordinate::development_latest(&ids).unwrap();
        assert_eq!(dev.position().time, TIME_LATEST);
        assert_eq!(
            dev.position().path,
            concepts::DEVELOPMENT_PATH.id(&ids).unwrap()
        );

        let active = StampCoordinate::development_latest_active_only(&ids).unwrap();
        assert_eq!(active.allowed_states(), &BTreeSet::from([Status::Active]));

        let master = StampCoordinate::master_latest(&ids).unwrap();
        assert_eq!(master.position().path, concepts::MASTER_PATH.id(&ids).unwrap());
    }

    #[test]
    fn standard_constructors_need_seeded_registry() {
        let ids = IdentifierRegistry::new();
        assert!(matches!(
            StampCoordinate::development_latest(&ids),
            Err(CoordinateError::Identifier(_))
        ));
    }

    #[test]
    fn from_config() {
        let ids = IdentifierRegistry::with_well_known();
        let config = Config::new(StampworkConfig {
            coordinate: Some(CoordinateDefaults {
                precedence: Some(Precedence::Time),
                allowed_states: Some(BTreeSet::from([Status::Active])),
                default_path: Some("master".to_string()),
                module_priority: Some(vec![concepts::CORE_MODULE.name().to_string()]),
            }),
            ..Default::default()
        });

        let c = StampCoordinate::from_config(&config, &ids).unwrap();
        assert_eq!(c.precedence(), Precedence::Time);
        assert_eq!(c.position().path, concepts::MASTER_PATH.id(&ids).unwrap());
        assert_eq!(
            c.module_priority(),
            &[concepts::CORE_MODULE.id(&ids).unwrap()]
        );
    }

    #[test]
    fn from_config_unknown_module() {
        let ids = IdentifierRegistry::with_well_known();
        let config = Config::new(StampworkConfig {
            coordinate: Some(CoordinateDefaults {
                module_priority: Some(vec!["module/unheard-of".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(StampCoordinate::from_config(&config, &ids).is_err());
    }
}
