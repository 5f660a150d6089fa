//! resolve::calculator
//!
//! Visibility and latest-version computation for one stamp coordinate.
//!
//! # Algorithm
//!
//! [`RelativePositionCalculator::latest_version`] resolves a commit-ordered
//! history in four steps:
//!
//! 1. Drop versions whose stamp is uncommitted, canceled, has a status
//!    outside the allowed states, or a module outside a non-empty filter
//! 2. Drop versions not on the coordinate's route: under `Time` precedence
//!    a version is on route if its time is at or before the position time;
//!    under `Path` precedence its path must be the position's path or an
//!    ancestor reached through origins, at or before the route's bound
//! 3. Keep the versions with the greatest surviving time
//! 4. If more than one remains, the module priority order picks a winner
//!    when exactly one candidate holds the best rank; otherwise the
//!    candidate ordered first by `(module, path, author, status, stamp)`
//!    wins, comparing concepts by their UUIDs so the choice does not depend
//!    on registration order. Every other candidate is reported as a
//!    contradiction.
//!
//! The same stamp appended twice to one history counts once; the later
//! occurrence is kept.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stampwork::coordinate::StampCoordinate;
//! use stampwork::core::chronology::Version;
//! use stampwork::core::ids::IdentifierRegistry;
//! use stampwork::core::path::{PathGraph, StampPath, StampPosition};
//! use stampwork::core::stamp::StampService;
//! use stampwork::core::types::{Precedence, Status};
//! use stampwork::resolve::RelativePositionCalculator;
//!
//! let ids = Arc::new(IdentifierRegistry::new());
//! let (author, module, path) = (
//!     ids.assign_name("author"),
//!     ids.assign_name("module"),
//!     ids.assign_name("path"),
//! );
//! let stamps = StampService::new(ids.clone());
//! let mut paths = PathGraph::new();
//! paths.add_path(StampPath::root(path));
//!
//! let history = vec![
//!     Version::new(stamps.intern(Status::Active, 100, author, module, path).unwrap(), "v1"),
//!     Version::new(stamps.intern(Status::Active, 200, author, module, path).unwrap(), "v2"),
//! ];
//!
//! let coordinate = StampCoordinate::builder(StampPosition::new(150, path))
//!     .precedence(Precedence::Time)
//!     .allowed_states([Status::Active])
//!     .build();
//! let calculator = RelativePositionCalculator::new(&coordinate, &stamps, &paths).unwrap();
//! let latest = calculator.latest_version(&history).unwrap();
//! assert_eq!(latest.value().map(|v| v.payload), Some("v1"));
//! ```

use std::collections::HashMap;

use uuid::Uuid;

use super::latest::LatestVersion;
use super::ResolveError;
use crate::coordinate::StampCoordinate;
use crate::core::chronology::Version;
use crate::core::path::{PathGraph, StampPosition};
use crate::core::stamp::{Stamp, StampService};
use crate::core::types::{
    ConceptId, CoordinateDigest, DigestBuilder, Precedence, StampSequence, Status,
};

/// Ordering of two stamps as seen from a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativePosition {
    /// The first stamp precedes the second.
    Before,
    /// Same stamp, or same time on the same path.
    Equal,
    /// The first stamp follows the second.
    After,
    /// Neither stamp can be ranked against the other.
    Contradiction,
    /// At least one stamp is not on the coordinate's route.
    Unreachable,
}

/// A stamp coordinate bound to the services resolution needs.
///
/// Route bounds for `Path` precedence are computed once at construction,
/// so a path cycle or unknown path is reported before any history is
/// examined.
#[derive(Debug)]
pub struct RelativePositionCalculator<'a> {
    coordinate: &'a StampCoordinate,
    stamps: &'a StampService,
    paths: &'a PathGraph,
    bounds: HashMap<ConceptId, i64>,
    digest: CoordinateDigest,
    resolution_digest: CoordinateDigest,
}

/// Last-resort ordering between equally ranked candidates.
type TieKey = (Uuid, Uuid, Uuid, Status, StampSequence);

struct Candidate {
    index: usize,
    seq: StampSequence,
    stamp: Stamp,
}

fn route_digest(
    coordinate: &CoordinateDigest,
    bounds: &HashMap<ConceptId, i64>,
) -> CoordinateDigest {
    let mut route: Vec<_> = bounds.iter().map(|(path, bound)| (*path, *bound)).collect();
    route.sort();
    let mut builder = DigestBuilder::new("resolution");
    builder.str(coordinate.as_str()).u64(route.len() as u64);
    for (path, bound) in route {
        builder.concept(path).i64(bound);
    }
    builder.finish()
}

impl<'a> RelativePositionCalculator<'a> {
    /// Bind `coordinate` to the stamp service and path graph.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::PathCycle`] if the coordinate's route runs through
    ///   a cycle
    /// - [`ResolveError::UnknownPath`] if the route reaches a path the graph
    ///   does not contain
    pub fn new(
        coordinate: &'a StampCoordinate,
        stamps: &'a StampService,
        paths: &'a PathGraph,
    ) -> Result<Self, ResolveError> {
        let bounds = match coordinate.precedence() {
            Precedence::Path => paths.visibility_bounds(coordinate.position())?,
            Precedence::Time => HashMap::new(),
        };
        let digest = coordinate.digest();
        let resolution_digest = route_digest(&digest, &bounds);
        Ok(Self {
            coordinate,
            stamps,
            paths,
            bounds,
            digest,
            resolution_digest,
        })
    }

    pub fn coordinate(&self) -> &StampCoordinate {
        self.coordinate
    }

    pub fn stamps(&self) -> &StampService {
        self.stamps
    }

    /// Digest of the bound coordinate.
    pub fn digest(&self) -> &CoordinateDigest {
        &self.digest
    }

    /// Digest of the coordinate together with the route bounds it resolved
    /// to in the path graph. Two calculators with equal resolution digests
    /// resolve every history identically.
    pub fn resolution_digest(&self) -> &CoordinateDigest {
        &self.resolution_digest
    }

    fn stamp_of(&self, seq: StampSequence) -> Result<Stamp, ResolveError> {
        self.stamps
            .stamp(seq)
            .map_err(|_| ResolveError::StampNotFound(seq))
    }

    /// Whether `stamp` lies on the coordinate's route, ignoring the state
    /// and module filters.
    pub fn on_route(&self, stamp: &Stamp) -> bool {
        if stamp.is_uncommitted() || stamp.is_canceled() {
            return false;
        }
        match self.coordinate.precedence() {
            Precedence::Time => stamp.time <= self.coordinate.position().time,
            Precedence::Path => self
                .bounds
                .get(&stamp.path)
                .is_some_and(|bound| stamp.time <= *bound),
        }
    }

    /// Whether a version with `stamp` is visible under every filter.
    pub fn admits(&self, stamp: &Stamp) -> bool {
        self.coordinate.admits_status(stamp.status)
            && self.coordinate.admits_module(stamp.module)
            && self.on_route(stamp)
    }

    /// Whether the version stamped `seq` is visible.
    pub fn is_visible(&self, seq: StampSequence) -> Result<bool, ResolveError> {
        Ok(self.admits(&self.stamp_of(seq)?))
    }

    /// Order `a` relative to `b`.
    pub fn relative_position(
        &self,
        a: StampSequence,
        b: StampSequence,
    ) -> Result<RelativePosition, ResolveError> {
        let (first, second) = (self.stamp_of(a)?, self.stamp_of(b)?);
        if !self.on_route(&first) || !self.on_route(&second) {
            return Ok(RelativePosition::Unreachable);
        }
        if a == b || (first.time == second.time && first.path == second.path) {
            return Ok(RelativePosition::Equal);
        }

        let position = match self.coordinate.precedence() {
            Precedence::Time => match first.time.cmp(&second.time) {
                std::cmp::Ordering::Less => RelativePosition::Before,
                std::cmp::Ordering::Greater => RelativePosition::After,
                std::cmp::Ordering::Equal => RelativePosition::Contradiction,
            },
            Precedence::Path => {
                if first.time < second.time && self.sees(&second, &first)? {
                    RelativePosition::Before
                } else if second.time < first.time && self.sees(&first, &second)? {
                    RelativePosition::After
                } else {
                    RelativePosition::Contradiction
                }
            }
        };
        Ok(position)
    }

    /// Whether `target` is visible from the position of `from`.
    fn sees(&self, from: &Stamp, target: &Stamp) -> Result<bool, ResolveError> {
        let bounds = self
            .paths
            .visibility_bounds(StampPosition::new(from.time, from.path))?;
        Ok(bounds
            .get(&target.path)
            .is_some_and(|bound| target.time <= *bound))
    }

    /// Resolve a commit-ordered history to indices into it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::StampNotFound`] if any version carries an
    /// unallocated stamp sequence.
    pub fn latest_index<P>(
        &self,
        versions: &[Version<P>],
    ) -> Result<LatestVersion<usize>, ResolveError> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut best_time: Option<i64> = None;

        for (index, version) in versions.iter().enumerate() {
            let stamp = self.stamp_of(version.stamp)?;
            if !self.admits(&stamp) {
                continue;
            }
            match best_time {
                Some(time) if stamp.time < time => continue,
                Some(time) if stamp.time == time => {
                    candidates.retain(|c| c.seq != version.stamp);
                }
                _ => {
                    candidates.clear();
                    best_time = Some(stamp.time);
                }
            }
            candidates.push(Candidate {
                index,
                seq: version.stamp,
                stamp,
            });
        }

        Ok(match candidates.len() {
            0 => LatestVersion::Unresolved,
            1 => LatestVersion::Resolved(candidates[0].index),
            _ => self.break_tie(&candidates)?,
        })
    }

    fn break_tie(&self, candidates: &[Candidate]) -> Result<LatestVersion<usize>, ResolveError> {
        let rank = |c: &Candidate| self.coordinate.module_rank(c.stamp.module);
        let best_rank = candidates.iter().filter_map(rank).min();

        let mut winner: Option<(TieKey, usize)> = None;
        for candidate in candidates
            .iter()
            .filter(|c| best_rank.is_none() || rank(*c) == best_rank)
        {
            let key = self.tie_key(candidate)?;
            if winner.as_ref().map_or(true, |(best, _)| key < *best) {
                winner = Some((key, candidate.index));
            }
        }

        let Some((_, winner)) = winner else {
            return Ok(LatestVersion::Unresolved);
        };
        let contradictions: Vec<usize> = candidates
            .iter()
            .map(|c| c.index)
            .filter(|index| *index != winner)
            .collect();

        tracing::debug!(
            coordinate = %self.digest,
            winner,
            contradictions = contradictions.len(),
            "resolution contradicted"
        );
        Ok(LatestVersion::Contradicted {
            winner,
            contradictions,
        })
    }

    fn tie_key(&self, candidate: &Candidate) -> Result<TieKey, ResolveError> {
        let ids = self.stamps.identifiers();
        Ok((
            ids.uuid_of(candidate.stamp.module)?,
            ids.uuid_of(candidate.stamp.path)?,
            ids.uuid_of(candidate.stamp.author)?,
            candidate.stamp.status,
            candidate.seq,
        ))
    }

    /// Resolve a commit-ordered history to its latest version(s).
    pub fn latest_version<P: Clone>(
        &self,
        versions: &[Version<P>],
    ) -> Result<LatestVersion<Version<P>>, ResolveError> {
        Ok(self
            .latest_index(versions)?
            .map(|index| versions[index].clone()))
    }
}
