//! core::stamp
//!
//! Stamp tuples and the interning service.
//!
//! # Architecture
//!
//! A [`Stamp`] is the `(status, time, author, module, path)` provenance tuple
//! attached to every version. The [`StampService`] interns stamps into small
//! [`StampSequence`] handles: equal tuples always yield the same sequence,
//! and a sequence, once assigned, is never reused or changed.
//!
//! The service also records stamp-level annotations: one optional comment
//! per sequence, and alias records declaring two sequences equivalent.
//!
//! # Invariants
//!
//! - Interning is atomic (check-then-insert under one write guard)
//! - Every author, module and path must be known to the identifier service;
//!   the service never creates identifiers implicitly
//! - Aliases may only target committed stamps
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stampwork::core::concepts;
//! use stampwork::core::ids::IdentifierRegistry;
//! use stampwork::core::stamp::StampService;
//! use stampwork::core::types::Status;
//!
//! let ids = Arc::new(IdentifierRegistry::with_well_known());
//! let user = concepts::SYSTEM_USER.id(ids.as_ref()).unwrap();
//! let module = concepts::CORE_MODULE.id(ids.as_ref()).unwrap();
//! let path = concepts::DEVELOPMENT_PATH.id(ids.as_ref()).unwrap();
//!
//! let stamps = StampService::new(ids);
//! let a = stamps.intern(Status::Active, 100, user, module, path).unwrap();
//! let b = stamps.intern(Status::Active, 100, user, module, path).unwrap();
//! assert_eq!(a, b);
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::IdentifierService;
use super::types::{
    describe_time, ConceptId, StampSequence, Status, TIME_CANCELED, TIME_UNCOMMITTED,
};

/// Errors from stamp operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StampError {
    /// A stamp field refers to an identifier the registry does not know.
    #[error("reference not found: {role} {id}")]
    ReferenceNotFound { role: &'static str, id: ConceptId },

    /// The stamp sequence was never allocated.
    #[error("unknown stamp sequence: {0}")]
    UnknownStamp(StampSequence),

    /// The operation requires a committed stamp.
    #[error("stamp {0} is not committed")]
    NotCommitted(StampSequence),

    /// The interning table is in a state it must never reach.
    #[error("stamp invariant violated: {0}")]
    InvariantViolation(String),
}

/// The provenance tuple attached to a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub status: Status,
    /// Epoch millis, or one of the time sentinels.
    pub time: i64,
    pub author: ConceptId,
    pub module: ConceptId,
    pub path: ConceptId,
}

impl Stamp {
    pub fn new(
        status: Status,
        time: i64,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    ) -> Self {
        Self {
            status,
            time,
            author,
            module,
            path,
        }
    }

    /// Whether this is a staged placeholder.
    pub fn is_uncommitted(&self) -> bool {
        self.time == TIME_UNCOMMITTED
    }

    /// Whether this stamp was retracted.
    pub fn is_canceled(&self) -> bool {
        self.time == TIME_CANCELED
    }

    /// Same tuple at a different time.
    pub fn with_time(&self, time: i64) -> Self {
        Self { time, ..*self }
    }
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} author {} module {} path {}",
            self.status,
            describe_time(self.time),
            self.author,
            self.module,
            self.path
        )
    }
}

/// A declared equivalence between two stamp sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampAlias {
    pub stamp: StampSequence,
    pub alias: StampSequence,
    pub comment: Option<String>,
}

#[derive(Debug, Default)]
struct StampTable {
    stamps: Vec<Stamp>,
    by_tuple: HashMap<Stamp, StampSequence>,
    comments: HashMap<StampSequence, String>,
    aliases: Vec<StampAlias>,
    alias_edges: HashMap<StampSequence, BTreeSet<StampSequence>>,
}

impl StampTable {
    fn get(&self, seq: StampSequence) -> Result<Stamp, StampError> {
        self.stamps
            .get(seq.index())
            .copied()
            .ok_or(StampError::UnknownStamp(seq))
    }
}

/// Interning service for stamps.
///
/// Readers never block each other; writers take a short exclusive guard
/// only when a tuple is seen for the first time.
pub struct StampService {
    ids: Arc<dyn IdentifierService>,
    table: RwLock<StampTable>,
}

impl std::fmt::Debug for StampService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StampService")
            .field("stamps", &self.len())
            .finish_non_exhaustive()
    }
}

impl StampService {
    /// Create an empty service resolving references through `ids`.
    pub fn new(ids: Arc<dyn IdentifierService>) -> Self {
        Self {
            ids,
            table: RwLock::new(StampTable::default()),
        }
    }

    /// The identifier service this table validates against.
    pub fn identifiers(&self) -> &Arc<dyn IdentifierService> {
        &self.ids
    }

    /// Intern a stamp tuple.
    ///
    /// # Errors
    ///
    /// - [`StampError::ReferenceNotFound`] if author, module or path is unknown
    /// - [`StampError::InvariantViolation`] if the sequence space is exhausted
    pub fn intern(
        &self,
        status: Status,
        time: i64,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    ) -> Result<StampSequence, StampError> {
        self.intern_stamp(Stamp::new(status, time, author, module, path))
    }

    /// Intern a staged placeholder stamp (`time = TIME_UNCOMMITTED`).
    pub fn intern_uncommitted(
        &self,
        status: Status,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    ) -> Result<StampSequence, StampError> {
        self.intern(status, TIME_UNCOMMITTED, author, module, path)
    }

    /// Intern a prebuilt stamp tuple.
    pub fn intern_stamp(&self, stamp: Stamp) -> Result<StampSequence, StampError> {
        if let Some(seq) = self.table.read().by_tuple.get(&stamp) {
            return Ok(*seq);
        }

        self.check_references(&stamp)?;

        let mut table = self.table.write();
        if let Some(seq) = table.by_tuple.get(&stamp) {
            return Ok(*seq);
        }
        if table.stamps.len() >= i32::MAX as usize {
            return Err(StampError::InvariantViolation(
                "stamp sequence space exhausted".into(),
            ));
        }
        let seq = StampSequence::from_index(table.stamps.len());
        table.stamps.push(stamp);
        table.by_tuple.insert(stamp, seq);
        tracing::debug!(%seq, %stamp, "interned stamp");
        Ok(seq)
    }

    fn check_references(&self, stamp: &Stamp) -> Result<(), StampError> {
        for (role, id) in [
            ("author", stamp.author),
            ("module", stamp.module),
            ("path", stamp.path),
        ] {
            if !self.ids.contains(id) {
                return Err(StampError::ReferenceNotFound { role, id });
            }
        }
        Ok(())
    }

    /// Look up the tuple for a sequence.
    pub fn stamp(&self, seq: StampSequence) -> Result<Stamp, StampError> {
        self.table.read().get(seq)
    }

    /// Look up the sequence of an already-interned tuple without interning.
    pub fn find(&self, stamp: &Stamp) -> Option<StampSequence> {
        self.table.read().by_tuple.get(stamp).copied()
    }

    pub fn status_of(&self, seq: StampSequence) -> Result<Status, StampError> {
        Ok(self.stamp(seq)?.status)
    }

    pub fn time_of(&self, seq: StampSequence) -> Result<i64, StampError> {
        Ok(self.stamp(seq)?.time)
    }

    pub fn author_of(&self, seq: StampSequence) -> Result<ConceptId, StampError> {
        Ok(self.stamp(seq)?.author)
    }

    pub fn module_of(&self, seq: StampSequence) -> Result<ConceptId, StampError> {
        Ok(self.stamp(seq)?.module)
    }

    pub fn path_of(&self, seq: StampSequence) -> Result<ConceptId, StampError> {
        Ok(self.stamp(seq)?.path)
    }

    pub fn is_uncommitted(&self, seq: StampSequence) -> Result<bool, StampError> {
        Ok(self.stamp(seq)?.is_uncommitted())
    }

    pub fn is_canceled(&self, seq: StampSequence) -> Result<bool, StampError> {
        Ok(self.stamp(seq)?.is_canceled())
    }

    /// Human-readable description of a stamp, including its comment.
    pub fn describe(&self, seq: StampSequence) -> String {
        let table = self.table.read();
        match table.get(seq) {
            Ok(stamp) => match table.comments.get(&seq) {
                Some(comment) => format!("{seq} {{{stamp}}} \"{comment}\""),
                None => format!("{seq} {{{stamp}}}"),
            },
            Err(_) => format!("{seq} {{unknown}}"),
        }
    }

    /// Number of interned stamps.
    pub fn len(&self) -> usize {
        self.table.read().stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sequences in allocation order.
    pub fn stamp_sequences(&self) -> Vec<StampSequence> {
        (0..self.len()).map(StampSequence::from_index).collect()
    }

    /// Attach (or replace) the comment on a stamp.
    pub fn set_comment(
        &self,
        seq: StampSequence,
        comment: impl Into<String>,
    ) -> Result<(), StampError> {
        let mut table = self.table.write();
        table.get(seq)?;
        table.comments.insert(seq, comment.into());
        Ok(())
    }

    pub fn comment(&self, seq: StampSequence) -> Option<String> {
        self.table.read().comments.get(&seq).cloned()
    }

    /// Every comment, ordered by stamp sequence.
    pub fn comments(&self) -> Vec<(StampSequence, String)> {
        let table = self.table.read();
        let mut comments: Vec<_> = table
            .comments
            .iter()
            .map(|(seq, comment)| (*seq, comment.clone()))
            .collect();
        comments.sort_by_key(|(seq, _)| *seq);
        comments
    }

    /// Record that `alias` is equivalent to the committed stamp `stamp`.
    ///
    /// # Errors
    ///
    /// - [`StampError::UnknownStamp`] if either sequence is unallocated
    /// - [`StampError::NotCommitted`] if `stamp` is still a staged placeholder
    pub fn add_alias(
        &self,
        stamp: StampSequence,
        alias: StampSequence,
        comment: Option<String>,
    ) -> Result<(), StampError> {
        let mut table = self.table.write();
        if table.get(stamp)?.is_uncommitted() {
            return Err(StampError::NotCommitted(stamp));
        }
        table.get(alias)?;
        if stamp == alias {
            return Ok(());
        }

        table.alias_edges.entry(stamp).or_default().insert(alias);
        table.alias_edges.entry(alias).or_default().insert(stamp);
        table.aliases.push(StampAlias {
            stamp,
            alias,
            comment,
        });
        tracing::debug!(%stamp, %alias, "recorded stamp alias");
        Ok(())
    }

    /// Every sequence equivalent to `seq` through alias records, excluding
    /// `seq` itself, in ascending order.
    pub fn aliases(&self, seq: StampSequence) -> Vec<StampSequence> {
        let table = self.table.read();
        let mut seen = BTreeSet::from([seq]);
        let mut queue = VecDeque::from([seq]);

        while let Some(current) = queue.pop_front() {
            if let Some(edges) = table.alias_edges.get(&current) {
                for next in edges {
                    if seen.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
        }

        seen.remove(&seq);
        seen.into_iter().collect()
    }

    /// Alias records in the order they were added.
    pub fn alias_records(&self) -> Vec<StampAlias> {
        self.table.read().aliases.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::IdentifierRegistry;

    struct Fixture {
        ids: Arc<IdentifierRegistry>,
        stamps: StampService,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    }

    fn fixture() -> Fixture {
        let ids = Arc::new(IdentifierRegistry::new());
        let author = ids.assign_name("author");
        let module = ids.assign_name("module");
        let path = ids.assign_name("path");
        let stamps = StampService::new(ids.clone());
        Fixture {
            ids,
            stamps,
            author,
            module,
            path,
        }
    }

    #[test]
    fn intern_is_idempotent() {
        let f = fixture();
        let a = f.stamps.intern(Status::Active, 10, f.author, f.module, f.path).unwrap();
        let b = f.stamps.intern(Status::Active, 10, f.author, f.module, f.path).unwrap();
        assert_eq!(a, b);
        assert_eq!(f.stamps.len(), 1);
    }

    #[test]
    fn distinct_tuples_get_distinct_sequences() {
        let f = fixture();
        let a = f.stamps.intern(Status::Active, 10, f.author, f.module, f.path).unwrap();
        let b = f.stamps.intern(Status::Inactive, 10, f.author, f.module, f.path).unwrap();
        let c = f.stamps.intern(Status::Active, 11, f.author, f.module, f.path).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(f.stamps.stamp_sequences(), vec![a, b, c]);
    }

    #[test]
    fn unknown_reference_rejected() {
        let f = fixture();
        let stranger = ConceptId::new(99).unwrap();
        let err = f
            .stamps
            .intern(Status::Active, 10, f.author, stranger, f.path)
            .unwrap_err();
        assert_eq!(
            err,
            StampError::ReferenceNotFound {
                role: "module",
                id: stranger
            }
        );
        assert!(f.stamps.is_empty());
        assert_eq!(f.ids.len(), 3);
    }

    #[test]
    fn accessors_return_fields() {
        let f = fixture();
        let seq = f.stamps.intern(Status::Inactive, 42, f.author, f.module, f.path).unwrap();
        assert_eq!(f.stamps.status_of(seq).unwrap(), Status::Inactive);
        assert_eq!(f.stamps.time_of(seq).unwrap(), 42);
        assert_eq!(f.stamps.author_of(seq).unwrap(), f.author);
        assert_eq!(f.stamps.module_of(seq).unwrap(), f.module);
        assert_eq!(f.stamps.path_of(seq).unwrap(), f.path);
        assert!(!f.stamps.is_uncommitted(seq).unwrap());
        assert!(!f.stamps.is_canceled(seq).unwrap());

        let missing = StampSequence::new(77).unwrap();
        assert_eq!(f.stamps.stamp(missing), Err(StampError::UnknownStamp(missing)));
    }

    #[test]
    fn sentinel_stamps() {
        let f = fixture();
        let staged = f
            .stamps
            .intern_uncommitted(Status::Active, f.author, f.module, f.path)
            .unwrap();
        let canceled = f
            .stamps
            .intern(Status::Canceled, TIME_CANCELED, f.author, f.module, f.path)
            .unwrap();
        assert!(f.stamps.is_uncommitted(staged).unwrap());
        assert!(f.stamps.is_canceled(canceled).unwrap());
    }

    #[test]
    fn comments_are_attached() {
        let f = fixture();
        let seq = f.stamps.intern(Status::Active, 10, f.author, f.module, f.path).unwrap();
        assert_eq!(f.stamps.comment(seq), None);
        f.stamps.set_comment(seq, "initial load").unwrap();
        assert_eq!(f.stamps.comment(seq).as_deref(), Some("initial load"));
        assert!(f.stamps.describe(seq).contains("initial load"));
        assert_eq!(f.stamps.comments(), vec![(seq, "initial load".to_string())]);

        let missing = StampSequence::new(5).unwrap();
        assert!(f.stamps.set_comment(missing, "x").is_err());
    }

    #[test]
    fn aliases_are_transitive() {
        let f = fixture();
        let a = f.stamps.intern(Status::Active, 1, f.author, f.module, f.path).unwrap();
        let b = f.stamps.intern(Status::Active, 2, f.author, f.module, f.path).unwrap();
        let c = f.stamps.intern(Status::Active, 3, f.author, f.module, f.path).unwrap();

        f.stamps.add_alias(a, b, Some("merged import".into())).unwrap();
        f.stamps.add_alias(b, c, None).unwrap();

        assert_eq!(f.stamps.aliases(a), vec![b, c]);
        assert_eq!(f.stamps.aliases(c), vec![a, b]);
        assert_eq!(f.stamps.alias_records().len(), 2);
    }

    #[test]
    fn alias_requires_committed_target() {
        let f = fixture();
        let staged = f
            .stamps
            .intern_uncommitted(Status::Active, f.author, f.module, f.path)
            .unwrap();
        let other = f.stamps.intern(Status::Active, 2, f.author, f.module, f.path).unwrap();
        assert_eq!(
            f.stamps.add_alias(staged, other, None),
            Err(StampError::NotCommitted(staged))
        );
    }

    #[test]
    fn concurrent_first_use_agrees() {
        let f = fixture();
        let results: Vec<StampSequence> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        f.stamps
                            .intern(Status::Active, 500, f.author, f.module, f.path)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(f.stamps.len(), 1);
    }
}
