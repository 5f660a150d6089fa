//! core::path
//!
//! Editing paths, positions, and the path ancestry graph.
//!
//! # Architecture
//!
//! The path graph is a DAG where:
//! - Nodes are paths (identified by their path concept)
//! - Edges point from a path to each of its origins
//! - An origin is a [`StampPosition`]: a time on another path
//!
//! A path branching from `P1` at time 500 sees everything on `P1` stamped at
//! or before 500, and nothing stamped on `P1` afterwards.
//!
//! # Invariants
//!
//! - The graph must be acyclic. This is a caller contract: insertion does
//!   not check it, [`PathGraph::find_cycle`] and [`crate::core::verify`]
//!   detect it, and [`PathGraph::visibility_bounds`] fails loudly on it.
//! - Positions order by `(path, time)` for deterministic tie-breaks.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::concepts;
use super::ids::{IdError, IdentifierService};
use super::types::{describe_time, ConceptId, TIME_LATEST};

/// Errors from path graph queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Following origins from this path leads back to it.
    #[error("cycle detected in path graph at path {0}")]
    Cycle(ConceptId),

    /// A position or origin refers to a path the graph does not contain.
    #[error("unknown path: {0}")]
    UnknownPath(ConceptId),
}

/// A point in time on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampPosition {
    /// Epoch millis; [`TIME_LATEST`] means "as of now".
    pub time: i64,
    pub path: ConceptId,
}

impl StampPosition {
    pub fn new(time: i64, path: ConceptId) -> Self {
        Self { time, path }
    }

    /// The latest position on `path`.
    pub fn latest(path: ConceptId) -> Self {
        Self::new(TIME_LATEST, path)
    }

    /// Same path at a different time.
    pub fn with_time(&self, time: i64) -> Self {
        Self { time, ..*self }
    }

    pub fn is_latest(&self) -> bool {
        self.time == TIME_LATEST
    }
}

impl Ord for StampPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.time.cmp(&other.time))
    }
}

impl PartialOrd for StampPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for StampPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", describe_time(self.time), self.path)
    }
}

/// An editing path and the positions it branched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampPath {
    pub path: ConceptId,
    pub origins: Vec<StampPosition>,
}

impl StampPath {
    /// A root path with no origins.
    pub fn root(path: ConceptId) -> Self {
        Self {
            path,
            origins: vec![],
        }
    }

    pub fn new(path: ConceptId, origins: Vec<StampPosition>) -> Self {
        Self { path, origins }
    }
}

/// The path ancestry graph.
#[derive(Debug, Clone, Default)]
pub struct PathGraph {
    paths: HashMap<ConceptId, StampPath>,
}

impl PathGraph {
    /// Create an empty path graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard layout: a root master path and a development path
    /// branching from master at latest.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry was not seeded with the well-known
    /// path concepts.
    pub fn standard(ids: &dyn IdentifierService) -> Result<Self, IdError> {
        let master = concepts::MASTER_PATH.id(ids)?;
        let development = concepts::DEVELOPMENT_PATH.id(ids)?;
        let mut graph = Self::new();
        graph.add_path(StampPath::root(master));
        graph.add_path(StampPath::new(
            development,
            vec![StampPosition::latest(master)],
        ));
        Ok(graph)
    }

    /// Insert or replace a path.
    pub fn add_path(&mut self, path: StampPath) {
        self.paths.insert(path.path, path);
    }

    /// Add one more origin to a path, creating the path if needed.
    pub fn add_origin(&mut self, path: ConceptId, origin: StampPosition) {
        let entry = self
            .paths
            .entry(path)
            .or_insert_with(|| StampPath::root(path));
        if !entry.origins.contains(&origin) {
            entry.origins.push(origin);
        }
    }

    pub fn path(&self, path: ConceptId) -> Option<&StampPath> {
        self.paths.get(&path)
    }

    pub fn contains(&self, path: ConceptId) -> bool {
        self.paths.contains_key(&path)
    }

    /// All paths, ordered by path id.
    pub fn paths(&self) -> Vec<&StampPath> {
        let mut paths: Vec<_> = self.paths.values().collect();
        paths.sort_by_key(|p| p.path);
        paths
    }

    /// The direct origins of a path; empty for root or unknown paths.
    pub fn origins_of(&self, path: ConceptId) -> &[StampPosition] {
        self.paths
            .get(&path)
            .map(|p| p.origins.as_slice())
            .unwrap_or(&[])
    }

    /// Every position reachable by following origin edges from `path`.
    ///
    /// Traversal is breadth-first and lazy. Each distinct position is
    /// yielded once, so the iterator terminates even if the graph holds a
    /// cycle; use [`PathGraph::find_cycle`] to detect that condition.
    ///
    /// # Example
    ///
    /// ```
    /// use stampwork::core::path::{PathGraph, StampPath, StampPosition};
    /// use stampwork::core::types::ConceptId;
    ///
    /// let p1 = ConceptId::new(1).unwrap();
    /// let p2 = ConceptId::new(2).unwrap();
    /// let p3 = ConceptId::new(3).unwrap();
    ///
    /// let mut graph = PathGraph::new();
    /// graph.add_path(StampPath::root(p1));
    /// graph.add_path(StampPath::new(p2, vec![StampPosition::new(500, p1)]));
    /// graph.add_path(StampPath::new(p3, vec![StampPosition::new(700, p2)]));
    ///
    /// let ancestors: Vec<_> = graph.ancestor_positions(p3).collect();
    /// assert_eq!(
    ///     ancestors,
    ///     vec![StampPosition::new(700, p2), StampPosition::new(500, p1)]
    /// );
    /// ```
    pub fn ancestor_positions(&self, path: ConceptId) -> AncestorPositions<'_> {
        let mut iter = AncestorPositions {
            graph: self,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            expanded: HashSet::new(),
        };
        iter.expand(path);
        iter
    }

    /// Distinct ancestor paths of `path`, nearest first.
    pub fn ancestors(&self, path: ConceptId) -> Vec<ConceptId> {
        let mut result = Vec::new();
        for position in self.ancestor_positions(path) {
            if position.path != path && !result.contains(&position.path) {
                result.push(position.path);
            }
        }
        result
    }

    /// Check if the graph contains cycles.
    ///
    /// Returns `Some(path)` if a cycle is reachable from that path.
    pub fn find_cycle(&self) -> Option<ConceptId> {
        let mut visited = HashSet::new();
        let mut route = HashSet::new();

        for path in self.paths().into_iter().map(|p| p.path) {
            if self.has_cycle_from(path, &mut visited, &mut route) {
                return Some(path);
            }
        }
        None
    }

    fn has_cycle_from(
        &self,
        path: ConceptId,
        visited: &mut HashSet<ConceptId>,
        route: &mut HashSet<ConceptId>,
    ) -> bool {
        if route.contains(&path) {
            return true;
        }
        if !visited.insert(path) {
            return false;
        }

        route.insert(path);
        for origin in self.origins_of(path) {
            if self.has_cycle_from(origin.path, visited, route) {
                return true;
            }
        }
        route.remove(&path);
        false
    }

    /// Latest visible time on every path reachable from `position`.
    ///
    /// The position's own path is visible up to `position.time`. An origin
    /// path is visible up to its origin time, clamped by the bound of the
    /// path it was reached from. When several routes reach the same path
    /// the largest bound wins.
    ///
    /// # Errors
    ///
    /// - [`PathError::Cycle`] if a route revisits a path
    /// - [`PathError::UnknownPath`] if the position's path, or any origin
    ///   path reached from it, is not in the graph
    pub fn visibility_bounds(
        &self,
        position: StampPosition,
    ) -> Result<HashMap<ConceptId, i64>, PathError> {
        let mut bounds = HashMap::new();
        let mut route = Vec::new();
        self.collect_bounds(position.path, position.time, &mut route, &mut bounds)?;
        Ok(bounds)
    }

    fn collect_bounds(
        &self,
        path: ConceptId,
        bound: i64,
        route: &mut Vec<ConceptId>,
        bounds: &mut HashMap<ConceptId, i64>,
    ) -> Result<(), PathError> {
        if route.contains(&path) {
            return Err(PathError::Cycle(path));
        }
        if !self.paths.contains_key(&path) {
            return Err(PathError::UnknownPath(path));
        }
        match bounds.get(&path) {
            Some(existing) if *existing >= bound => return Ok(()),
            _ => {
                bounds.insert(path, bound);
            }
        }

        route.push(path);
        for origin in self.origins_of(path) {
            self.collect_bounds(origin.path, origin.time.min(bound), route, bounds)?;
        }
        route.pop();
        Ok(())
    }
}

/// Lazy breadth-first iterator over ancestor positions.
///
/// Created by [`PathGraph::ancestor_positions`].
pub struct AncestorPositions<'a> {
    graph: &'a PathGraph,
    queue: VecDeque<StampPosition>,
    seen: HashSet<StampPosition>,
    expanded: HashSet<ConceptId>,
}

impl AncestorPositions<'_> {
    fn expand(&mut self, path: ConceptId) {
        if !self.expanded.insert(path) {
            return;
        }
        for origin in self.graph.origins_of(path) {
            if self.seen.insert(*origin) {
                self.queue.push_back(*origin);
            }
        }
    }
}

impl Iterator for AncestorPositions<'_> {
    type Item = StampPosition;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.queue.pop_front()?;
        self.expand(position.path);
        Some(position)
    }
}
