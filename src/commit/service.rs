//! commit::service
//!
//! The commit service: stage, commit, cancel.
//!
//! # Architecture
//!
//! Staged versions live only inside the service; the chronology store never
//! sees a provisional stamp. A commit runs in two phases under the service's
//! state lock:
//!
//! 1. **Validate.** Every staged version is offered to
//!    [`ChronologySink::validate_append`]. Any rejection ends the attempt:
//!    the failures are reported in the [`CommitRecord`], no final stamp is
//!    interned, and the batch stays pending.
//! 2. **Publish.** One final stamp is interned per distinct provisional
//!    stamp (same tuple, commit time), and the whole batch is handed to
//!    [`ChronologySink::append_batch`], which makes it visible at once.
//!
//! Two commits of the same tuple at the same time share one final stamp.
//! A stamp's comment is never replaced: if the shared stamp already carries
//! a different comment the commit fails with
//! [`CommitError::CommentConflict`] before anything is interned.
//!
//! Listeners are notified after the state lock is released.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stampwork::commit::{ChronologyState, Clock, CommitService};
//! use stampwork::core::chronology::{ChronologySource, InMemoryChronologyStore};
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
//! let stamps = Arc::new(StampService::new(ids));
//! let store: Arc<InMemoryChronologyStore<String>> = Arc::new(InMemoryChronologyStore::new());
//! let commits = CommitService::new(stamps.clone(), store.clone()).with_clock(Clock::Fixed(1000));
//!
//! let id = store.allocate_id();
//! commits.stage(id, "first".to_string(), Status::Active, user, module, path).unwrap();
//! assert_eq!(commits.state_of(id), ChronologyState::Uncommitted);
//! assert!(store.versions_of(id).is_empty());
//!
//! let record = commits.commit(Some("initial load")).unwrap();
//! assert!(record.is_success());
//! assert_eq!(store.versions_of(id).len(), 1);
//! assert_eq!(stamps.time_of(record.stamps[0]).unwrap(), 1000);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::record::{ChronologyState, CommitFailure, CommitId, CommitRecord};
use super::{CommitError, CommitListener};
use crate::core::chronology::{ChronologySink, StoreError, Version};
use crate::core::config::{ClockMode, Config};
use crate::core::stamp::StampService;
use crate::core::types::{
    ChronologyId, ConceptId, StampSequence, Status, UtcTimestamp, TIME_CANCELED,
    TIME_UNCOMMITTED,
};

/// Source of commit times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// Current wall-clock time.
    #[default]
    Wall,
    /// Always the given epoch millis.
    Fixed(i64),
}

impl Clock {
    pub fn from_config(config: &Config) -> Self {
        match (config.clock_mode(), config.fixed_time()) {
            (ClockMode::Fixed, Some(time)) => Clock::Fixed(time),
            _ => Clock::Wall,
        }
    }

    pub fn now(&self) -> i64 {
        match self {
            Clock::Wall => UtcTimestamp::now().epoch_millis(),
            Clock::Fixed(time) => *time,
        }
    }
}

#[derive(Debug, Clone)]
struct StagedVersion<P> {
    chronology: ChronologyId,
    payload: P,
    provisional: StampSequence,
}

#[derive(Debug)]
struct CommitState<P> {
    pending: Vec<StagedVersion<P>>,
    /// Chronologies committed since the last `clear_committed`.
    committed: HashSet<ChronologyId>,
}

impl<P> Default for CommitState<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            committed: HashSet::new(),
        }
    }
}

/// Stages versions and commits them atomically.
pub struct CommitService<P> {
    stamps: Arc<StampService>,
    sink: Arc<dyn ChronologySink<P>>,
    clock: Clock,
    drop_empty_comments: bool,
    state: Mutex<CommitState<P>>,
    listeners: RwLock<Vec<Arc<dyn CommitListener>>>,
}

impl<P> std::fmt::Debug for CommitService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitService")
            .field("clock", &self.clock)
            .field("pending", &self.state.lock().pending.len())
            .finish_non_exhaustive()
    }
}

impl<P: Clone + Send + Sync + 'static> CommitService<P> {
    /// Create a service with the wall clock.
    pub fn new(stamps: Arc<StampService>, sink: Arc<dyn ChronologySink<P>>) -> Self {
        Self {
            stamps,
            sink,
            clock: Clock::Wall,
            drop_empty_comments: true,
            state: Mutex::new(CommitState::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a service with clock and comment handling from `config`.
    pub fn from_config(
        stamps: Arc<StampService>,
        sink: Arc<dyn ChronologySink<P>>,
        config: &Config,
    ) -> Self {
        let mut service = Self::new(stamps, sink).with_clock(Clock::from_config(config));
        service.drop_empty_comments = config.drop_empty_comments();
        service
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn stamps(&self) -> &Arc<StampService> {
        &self.stamps
    }

    /// Register a listener for successful commits.
    pub fn subscribe(&self, listener: Arc<dyn CommitListener>) {
        self.listeners.write().push(listener);
    }

    /// Stage a version under an existing provisional stamp.
    ///
    /// Staging the same payload twice stages it twice.
    ///
    /// # Errors
    ///
    /// - [`CommitError::Stamp`] if the stamp is unknown
    /// - [`CommitError::NotProvisional`] if the stamp is already committed
    pub fn stage_version(
        &self,
        chronology: ChronologyId,
        payload: P,
        provisional: StampSequence,
    ) -> Result<(), CommitError> {
        if !self.stamps.is_uncommitted(provisional)? {
            return Err(CommitError::NotProvisional(provisional));
        }
        self.state.lock().pending.push(StagedVersion {
            chronology,
            payload,
            provisional,
        });
        tracing::debug!(%chronology, stamp = %provisional, "staged version");
        Ok(())
    }

    /// Intern a provisional stamp and stage a version under it.
    pub fn stage(
        &self,
        chronology: ChronologyId,
        payload: P,
        status: Status,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    ) -> Result<StampSequence, CommitError> {
        let provisional = self.stamps.intern_uncommitted(status, author, module, path)?;
        self.stage_version(chronology, payload, provisional)?;
        Ok(provisional)
    }

    /// Number of staged versions.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Chronologies with staged versions, in id order.
    pub fn pending_chronologies(&self) -> Vec<ChronologyId> {
        let state = self.state.lock();
        let ids: BTreeSet<_> = state.pending.iter().map(|s| s.chronology).collect();
        ids.into_iter().collect()
    }

    /// Lifecycle state of `chronology` as seen by this service.
    ///
    /// `Committed` is remembered until [`CommitService::clear_committed`].
    pub fn state_of(&self, chronology: ChronologyId) -> ChronologyState {
        let state = self.state.lock();
        if state.pending.iter().any(|s| s.chronology == chronology) {
            ChronologyState::Uncommitted
        } else if state.committed.contains(&chronology) {
            ChronologyState::Committed
        } else {
            ChronologyState::NoPendingChanges
        }
    }

    /// Forget which chronologies were committed; they report
    /// `NoPendingChanges` afterwards. Returns how many were forgotten.
    pub fn clear_committed(&self) -> usize {
        let cleared = std::mem::take(&mut self.state.lock().committed).len();
        tracing::debug!(cleared, "cleared committed chronologies");
        cleared
    }

    /// Drop every staged version. Returns how many were dropped.
    ///
    /// No stamp is allocated; provisional stamps stay provisional.
    pub fn cancel(&self) -> usize {
        let dropped = std::mem::take(&mut self.state.lock().pending).len();
        tracing::info!(dropped, "canceled pending commit");
        dropped
    }

    /// Commit every staged version at the clock's current time.
    pub fn commit(&self, comment: Option<&str>) -> Result<CommitRecord, CommitError> {
        self.commit_at(self.clock.now(), comment)
    }

    /// Commit every staged version at `time`.
    ///
    /// # Errors
    ///
    /// - [`CommitError::InvalidTime`] if `time` is a sentinel
    /// - [`CommitError::CommentConflict`] if a final stamp already exists
    ///   with a different comment
    /// - [`CommitError::Stamp`] if a final stamp cannot be interned
    ///
    /// Storage rejections are reported in the returned record instead.
    pub fn commit_at(&self, time: i64, comment: Option<&str>) -> Result<CommitRecord, CommitError> {
        if time == TIME_UNCOMMITTED || time == TIME_CANCELED {
            return Err(CommitError::InvalidTime(time));
        }
        let comment = comment
            .filter(|c| !(self.drop_empty_comments && c.trim().is_empty()))
            .map(str::to_string);

        let record = {
            let mut state = self.state.lock();
            self.commit_locked(&mut state, time, comment)?
        };

        if record.is_success() && !record.is_empty() {
            for listener in self.listeners.read().iter() {
                listener.on_commit(&record);
            }
        }
        Ok(record)
    }

    fn commit_locked(
        &self,
        state: &mut CommitState<P>,
        time: i64,
        comment: Option<String>,
    ) -> Result<CommitRecord, CommitError> {
        let mut record = CommitRecord {
            commit_id: CommitId::new(),
            time,
            comment,
            stamps: Vec::new(),
            committed: Vec::new(),
            failures: Vec::new(),
        };
        if state.pending.is_empty() {
            tracing::debug!("commit with nothing staged");
            return Ok(record);
        }

        // Phase 1: validate
        let mut failed = BTreeSet::new();
        for staged in &state.pending {
            if failed.contains(&staged.chronology) {
                continue;
            }
            if let Err(err) = self.sink.validate_append(staged.chronology, &staged.payload) {
                failed.insert(staged.chronology);
                record.failures.push(failure(staged.chronology, err));
            }
        }
        if !record.failures.is_empty() {
            tracing::warn!(
                commit = %record.commit_id,
                failures = record.failures.len(),
                "commit rejected; batch left pending"
            );
            return Ok(record);
        }

        if let Some(text) = &record.comment {
            self.check_comment(state, time, text)?;
        }

        // Phase 2: finalize stamps and publish
        let mut finals: HashMap<StampSequence, StampSequence> = HashMap::new();
        let mut batch = Vec::with_capacity(state.pending.len());
        for staged in &state.pending {
            let stamp = match finals.get(&staged.provisional) {
                Some(stamp) => *stamp,
                None => {
                    let provisional = self.stamps.stamp(staged.provisional)?;
                    let stamp = self.stamps.intern_stamp(provisional.with_time(time))?;
                    finals.insert(staged.provisional, stamp);
                    record.stamps.push(stamp);
                    stamp
                }
            };
            batch.push((staged.chronology, Version::new(stamp, staged.payload.clone())));
        }

        if let Err(err) = self.sink.append_batch(batch) {
            let chronology = match &err {
                StoreError::Rejected { chronology, .. } => *chronology,
            };
            record.stamps.clear();
            record.failures.push(failure(chronology, err));
            tracing::warn!(commit = %record.commit_id, "append rejected; batch left pending");
            return Ok(record);
        }

        if let Some(text) = &record.comment {
            for stamp in &record.stamps {
                self.stamps.set_comment(*stamp, text.clone())?;
            }
        }

        let committed: BTreeSet<_> = state.pending.drain(..).map(|s| s.chronology).collect();
        state.committed.extend(committed.iter().copied());
        record.committed = committed.into_iter().collect();

        tracing::info!("{}", record.summary());
        Ok(record)
    }

    /// Fail if a final stamp this batch would reuse carries another comment.
    fn check_comment(
        &self,
        state: &CommitState<P>,
        time: i64,
        text: &str,
    ) -> Result<(), CommitError> {
        let provisionals: BTreeSet<_> = state.pending.iter().map(|s| s.provisional).collect();
        for provisional in provisionals {
            let candidate = self.stamps.stamp(provisional)?.with_time(time);
            let Some(stamp) = self.stamps.find(&candidate) else {
                continue;
            };
            if self
                .stamps
                .comment(stamp)
                .is_some_and(|existing| existing != text)
            {
                tracing::warn!(%stamp, time, "commit comment conflicts with existing stamp");
                return Err(CommitError::CommentConflict { stamp });
            }
        }
        Ok(())
    }

    /// Commit on a blocking worker thread.
    ///
    /// Must be called from within a tokio runtime. Staging, resolution and
    /// interning remain safe from other threads while the commit runs.
    pub fn commit_in_background(
        self: &Arc<Self>,
        comment: Option<String>,
    ) -> JoinHandle<Result<CommitRecord, CommitError>> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.commit(comment.as_deref()))
    }

    /// Record that `alias` is equivalent to the committed stamp `stamp`.
    pub fn add_alias(
        &self,
        stamp: StampSequence,
        alias: StampSequence,
        comment: Option<String>,
    ) -> Result<(), CommitError> {
        self.stamps.add_alias(stamp, alias, comment)?;
        Ok(())
    }
}

fn failure(chronology: ChronologyId, err: StoreError) -> CommitFailure {
    CommitFailure {
        chronology,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chronology::{ChronologySource, InMemoryChronologyStore};
    use crate::core::config::{CommitDefaults, StampworkConfig};
    use crate::core::ids::IdentifierRegistry;
    use crate::core::stamp::StampError;

    struct Fixture {
        stamps: Arc<StampService>,
        store: Arc<InMemoryChronologyStore<String>>,
        commits: CommitService<String>,
        author: ConceptId,
        module: ConceptId,
        path: ConceptId,
    }

    fn fixture() -> Fixture {
        let ids = Arc::new(IdentifierRegistry::new());
        let author = ids.assign_name("author");
        let module = ids.assign_name("module");
        let path = ids.assign_name("path");
        let stamps = Arc::new(StampService::new(ids));
        let store: Arc<InMemoryChronologyStore<String>> = Arc::new(InMemoryChronologyStore::new());
        let commits: CommitService<String> =
            CommitService::new(stamps.clone(), store.clone()).with_clock(Clock::Fixed(500));
        Fixture {
            stamps,
            store,
            commits,
            author,
            module,
            path,
        }
    }

    impl Fixture {
        fn stage(&self, id: ChronologyId, payload: &str) -> StampSequence {
            self.commits
                .stage(
                    id,
                    payload.to_string(),
                    Status::Active,
                    self.author,
                    self.module,
                    self.path,
                )
                .unwrap()
        }
    }

    #[test]
    fn state_machine() {
        let f = fixture();
        let id = f.store.allocate_id();
        assert_eq!(f.commits.state_of(id), ChronologyState::NoPendingChanges);

        f.stage(id, "v1");
        assert_eq!(f.commits.state_of(id), ChronologyState::Uncommitted);
        assert_eq!(f.commits.pending_chronologies(), vec![id]);

        let record = f.commits.commit(None).unwrap();
        assert!(record.is_success());
        assert_eq!(record.committed, vec![id]);
        assert_eq!(f.commits.state_of(id), ChronologyState::Committed);
        assert_eq!(f.commits.pending_count(), 0);
    }

    #[test]
    fn one_final_stamp_per_provisional_tuple() {
        let f = fixture();
        let a = f.store.allocate_id();
        let b = f.store.allocate_id();
        let provisional = f.stage(a, "a");
        assert_eq!(f.stage(b, "b"), provisional);

        let record = f.commits.commit_at(700, Some("batch")).unwrap();
        assert_eq!(record.stamps.len(), 1);
        let stamp = record.stamps[0];
        assert_eq!(f.stamps.time_of(stamp).unwrap(), 700);
        assert_eq!(f.stamps.comment(stamp), Some("batch".to_string()));
        assert_eq!(f.store.versions_of(a)[0].stamp, stamp);
        assert_eq!(f.store.versions_of(b)[0].stamp, stamp);
        assert!(f.stamps.is_uncommitted(provisional).unwrap());
    }

    #[test]
    fn cancel_allocates_nothing() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.stage(id, "draft");
        let before = f.stamps.len();

        assert_eq!(f.commits.cancel(), 1);
        assert_eq!(f.stamps.len(), before);
        assert_eq!(f.commits.state_of(id), ChronologyState::NoPendingChanges);
        assert!(f.store.versions_of(id).is_empty());

        let record = f.commits.commit(None).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn rejected_commit_keeps_batch_pending() {
        let f = fixture();
        let good = f.store.allocate_id();
        let bad = f.store.allocate_id();
        f.stage(good, "good");
        f.stage(bad, "bad");
        f.store.reject(bad, "read-only");
        let before = f.stamps.len();

        let record = f.commits.commit(None).unwrap();
        assert!(!record.is_success());
        assert_eq!(record.failures.len(), 1);
        assert_eq!(record.failures[0].chronology, bad);
        assert!(record.stamps.is_empty());
        assert_eq!(f.stamps.len(), before);
        assert!(f.store.versions_of(good).is_empty());
        assert_eq!(f.commits.state_of(good), ChronologyState::Uncommitted);

        f.store.accept(bad);
        let retry = f.commits.commit(None).unwrap();
        assert!(retry.is_success());
        assert_eq!(retry.committed, vec![good, bad]);
    }

    #[test]
    fn committed_stamp_cannot_be_staged() {
        let f = fixture();
        let committed = f
            .stamps
            .intern(Status::Active, 10, f.author, f.module, f.path)
            .unwrap();
        let err = f
            .commits
            .stage_version(ChronologyId(1), "x".into(), committed)
            .unwrap_err();
        assert_eq!(err, CommitError::NotProvisional(committed));
    }

    #[test]
    fn same_time_commits_never_overwrite_comments() {
        let f = fixture();
        let first_id = f.store.allocate_id();
        f.stage(first_id, "first");
        let first = f.commits.commit(Some("first commit")).unwrap();

        let second_id = f.store.allocate_id();
        f.stage(second_id, "second");
        let err = f.commits.commit(Some("second commit")).unwrap_err();
        assert_eq!(
            err,
            CommitError::CommentConflict {
                stamp: first.stamps[0]
            }
        );
        assert_eq!(f.stamps.comment(first.stamps[0]).as_deref(), Some("first commit"));
        assert_eq!(f.commits.state_of(second_id), ChronologyState::Uncommitted);
        assert!(f.store.versions_of(second_id).is_empty());

        // The same comment, or none at all, shares the stamp without conflict
        let shared = f.commits.commit(Some("first commit")).unwrap();
        assert_eq!(shared.stamps, first.stamps);
        let third_id = f.store.allocate_id();
        f.stage(third_id, "third");
        assert!(f.commits.commit(None).unwrap().is_success());
        assert_eq!(f.stamps.comment(first.stamps[0]).as_deref(), Some("first commit"));

        // A later time gets its own stamp and comment
        let fourth_id = f.store.allocate_id();
        f.stage(fourth_id, "fourth");
        let later = f.commits.commit_at(501, Some("second commit")).unwrap();
        assert_ne!(later.stamps, first.stamps);
        assert_eq!(f.stamps.comment(later.stamps[0]).as_deref(), Some("second commit"));
    }

    #[test]
    fn committed_state_can_be_cleared() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.stage(id, "v");
        f.commits.commit(None).unwrap();
        assert_eq!(f.commits.state_of(id), ChronologyState::Committed);

        assert_eq!(f.commits.clear_committed(), 1);
        assert_eq!(f.commits.state_of(id), ChronologyState::NoPendingChanges);
        assert_eq!(f.store.versions_of(id).len(), 1);
    }

    #[test]
    fn sentinel_commit_time_rejected() {
        let f = fixture();
        assert_eq!(
            f.commits.commit_at(i64::MAX, None).unwrap_err(),
            CommitError::InvalidTime(i64::MAX)
        );
        assert!(f.commits.commit_at(i64::MIN, None).is_err());
    }

    #[test]
    fn blank_comments_dropped_by_default() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.stage(id, "v");
        let record = f.commits.commit(Some("   ")).unwrap();
        assert_eq!(record.comment, None);
        assert_eq!(f.stamps.comment(record.stamps[0]), None);
    }

    #[test]
    fn config_controls_clock_and_comments() {
        let f = fixture();
        let config = Config::new(StampworkConfig {
            commit: Some(CommitDefaults {
                clock: Some(ClockMode::Fixed),
                fixed_time: Some(42),
                drop_empty_comments: Some(false),
            }),
            ..Default::default()
        });
        let commits: CommitService<String> =
            CommitService::from_config(f.stamps.clone(), f.store.clone(), &config);
        assert_eq!(commits.clock(), Clock::Fixed(42));

        let id = f.store.allocate_id();
        commits
            .stage(id, "v".into(), Status::Active, f.author, f.module, f.path)
            .unwrap();
        let record = commits.commit(Some("")).unwrap();
        assert_eq!(record.time, 42);
        assert_eq!(record.comment, Some(String::new()));
    }

    #[test]
    fn alias_requires_committed_target() {
        let f = fixture();
        let id = f.store.allocate_id();
        let provisional = f.stage(id, "v");
        let other = f
            .stamps
            .intern(Status::Active, 1, f.author, f.module, f.path)
            .unwrap();

        assert_eq!(
            f.commits.add_alias(provisional, other, None).unwrap_err(),
            CommitError::Stamp(StampError::NotCommitted(provisional))
        );

        let record = f.commits.commit(None).unwrap();
        f.commits
            .add_alias(record.stamps[0], other, Some("merged".into()))
            .unwrap();
        assert_eq!(f.stamps.aliases(other), vec![record.stamps[0]]);
    }

    #[test]
    fn listeners_see_successful_commits() {
        struct Counter(Mutex<Vec<usize>>);
        impl CommitListener for Counter {
            fn on_commit(&self, record: &CommitRecord) {
                self.0.lock().push(record.committed.len());
            }
        }

        let f = fixture();
        let counter = Arc::new(Counter(Mutex::new(Vec::new())));
        f.commits.subscribe(counter.clone());

        f.commits.commit(None).unwrap();
        let id = f.store.allocate_id();
        f.stage(id, "v");
        f.commits.commit(None).unwrap();

        assert_eq!(*counter.0.lock(), vec![1]);
    }

    #[test]
    fn clock_from_config_defaults_to_wall() {
        assert_eq!(Clock::from_config(&Config::default()), Clock::Wall);
        assert!(Clock::Wall.now() > 0);
    }
}
