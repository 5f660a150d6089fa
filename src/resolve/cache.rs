//! resolve::cache
//!
//! Memo table for resolution results.
//!
//! Entries are keyed by `(chronology, resolution digest, history length)`.
//! The resolution digest covers the coordinate and the route bounds it
//! resolved to, so a path graph edit that changes what a coordinate can see
//! also changes the key. Histories only grow, so once a chronology gains a
//! version its length changes and the old entry simply stops being hit.
//! Entries store indices into the history rather than payloads. When full,
//! the oldest entry is evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::calculator::RelativePositionCalculator;
use super::latest::LatestVersion;
use super::ResolveError;
use crate::core::chronology::{ChronologySource, Version};
use crate::core::config::Config;
use crate::core::types::{ChronologyId, CoordinateDigest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    chronology: ChronologyId,
    digest: CoordinateDigest,
    history_len: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, LatestVersion<usize>>,
    order: VecDeque<CacheKey>,
}

/// Bounded, thread-safe memo of resolution results.
#[derive(Debug)]
pub struct ResolutionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_capacity())
    }

    /// Resolve `versions` under the calculator's coordinate, memoized.
    pub fn latest<P: Clone>(
        &self,
        chronology: ChronologyId,
        versions: &[Version<P>],
        calculator: &RelativePositionCalculator<'_>,
    ) -> Result<LatestVersion<Version<P>>, ResolveError> {
        let key = CacheKey {
            chronology,
            digest: calculator.resolution_digest().clone(),
            history_len: versions.len(),
        };

        let cached = self.inner.lock().entries.get(&key).cloned();
        let indices = match cached {
            Some(indices) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                indices
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                // Computed without the lock held; a racing duplicate is harmless.
                let indices = calculator.latest_index(versions)?;
                self.insert(key, indices.clone());
                indices
            }
        };

        Ok(indices.map(|index| versions[index].clone()))
    }

    /// Fetch the history from `source` and resolve it, memoized.
    pub fn latest_from<P, S>(
        &self,
        source: &S,
        chronology: ChronologyId,
        calculator: &RelativePositionCalculator<'_>,
    ) -> Result<LatestVersion<Version<P>>, ResolveError>
    where
        P: Clone,
        S: ChronologySource<P> + ?Sized,
    {
        let versions = source.versions_of(chronology);
        self.latest(chronology, &versions, calculator)
    }

    fn insert(&self, key: CacheKey, value: LatestVersion<usize>) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), value).is_some() {
            return;
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coordinate::StampCoordinate;
    use crate::core::chronology::InMemoryChronologyStore;
    use crate::core::ids::IdentifierRegistry;
    use crate::core::path::{PathGraph, StampPath, StampPosition};
    use crate::core::stamp::StampService;
    use crate::core::types::{Precedence, Status, TIME_LATEST};

    struct Fixture {
        stamps: StampService,
        paths: PathGraph,
        coordinate: StampCoordinate,
        store: InMemoryChronologyStore<u32>,
        author: crate::core::types::ConceptId,
        module: crate::core::types::ConceptId,
        path: crate::core::types::ConceptId,
        branch: crate::core::types::ConceptId,
    }

    fn fixture() -> Fixture {
        let ids = Arc::new(IdentifierRegistry::new());
        let author = ids.assign_name("author");
        let module = ids.assign_name("module");
        let path = ids.assign_name("path");
        let branch = ids.assign_name("branch");
        let mut paths = PathGraph::new();
        paths.add_path(StampPath::root(path));
        paths.add_path(StampPath::root(branch));
        Fixture {
            stamps: StampService::new(ids),
            paths,
            coordinate: StampCoordinate::builder(StampPosition::new(TIME_LATEST, path))
                .precedence(Precedence::Path)
                .build(),
            store: InMemoryChronologyStore::new(),
            author,
            module,
            path,
            branch,
        }
    }

    impl Fixture {
        fn append(&self, id: ChronologyId, time: i64, payload: u32) {
            let seq = self
                .stamps
                .intern(Status::Active, time, self.author, self.module, self.path)
                .unwrap();
            self.store.append(id, Version::new(seq, payload)).unwrap();
        }
    }

    #[test]
    fn repeated_lookup_hits() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.append(id, 100, 1);

        let cache = ResolutionCache::new(8);
        let calc = RelativePositionCalculator::new(&f.coordinate, &f.stamps, &f.paths).unwrap();

        let first = cache.latest_from(&f.store, id, &calc).unwrap();
        let second = cache.latest_from(&f.store, id, &calc).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn growth_invalidates_by_length() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.append(id, 100, 1);

        let cache = ResolutionCache::new(8);
        let calc = RelativePositionCalculator::new(&f.coordinate, &f.stamps, &f.paths).unwrap();
        let before = cache.latest_from(&f.store, id, &calc).unwrap();
        assert_eq!(before.value().map(|v| v.payload), Some(1));

        f.append(id, 200, 2);
        let after = cache.latest_from(&f.store, id, &calc).unwrap();
        assert_eq!(after.value().map(|v| v.payload), Some(2));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn path_graph_edit_is_not_served_from_cache() {
        let f = fixture();
        let id = f.store.allocate_id();
        f.append(id, 100, 1);

        let coordinate = StampCoordinate::builder(StampPosition::new(TIME_LATEST, f.branch))
            .precedence(Precedence::Path)
            .build();
        let cache = ResolutionCache::new(8);

        let calc = RelativePositionCalculator::new(&coordinate, &f.stamps, &f.paths).unwrap();
        assert!(!cache.latest_from(&f.store, id, &calc).unwrap().is_present());

        let mut paths = f.paths.clone();
        paths.add_origin(f.branch, StampPosition::new(500, f.path));
        let calc = RelativePositionCalculator::new(&coordinate, &f.stamps, &paths).unwrap();
        let after = cache.latest_from(&f.store, id, &calc).unwrap();
        assert_eq!(after.value().map(|v| v.payload), Some(1));
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let f = fixture();
        let cache = ResolutionCache::new(2);
        let calc = RelativePositionCalculator::new(&f.coordinate, &f.stamps, &f.paths).unwrap();

        let ids: Vec<_> = (0..3).map(|_| f.store.allocate_id()).collect();
        for (i, id) in ids.iter().enumerate() {
            f.append(*id, 100 + i as i64, i as u32);
            cache.latest_from(&f.store, *id, &calc).unwrap();
        }
        assert_eq!(cache.len(), 2);

        // The first chronology was evicted and must be recomputed.
        cache.latest_from(&f.store, ids[0], &calc).unwrap();
        assert_eq!(cache.misses(), 4);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_from_config() {
        let cache = ResolutionCache::from_config(&Config::default());
        assert_eq!(cache.capacity(), crate::core::config::DEFAULT_CACHE_CAPACITY);
        assert_eq!(ResolutionCache::new(0).capacity(), 1);
    }
}
