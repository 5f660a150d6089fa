//! Property-based tests for interning, coordinates and resolution.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated histories and coordinates.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use stampwork::coordinate::{ModuleFilterMode, StampCoordinate};
use stampwork::core::chronology::Version;
use stampwork::core::ids::IdentifierRegistry;
use stampwork::core::path::{PathGraph, StampPath, StampPosition};
use stampwork::core::stamp::StampService;
use stampwork::core::types::{ConceptId, Precedence, Status};
use stampwork::exchange::{decode, encode, ExchangeRecord, StampRecord};
use stampwork::resolve::RelativePositionCalculator;

struct World {
    stamps: StampService,
    graph: PathGraph,
    author: ConceptId,
    path: ConceptId,
    modules: Vec<ConceptId>,
}

fn world() -> World {
    let ids = Arc::new(IdentifierRegistry::new());
    let author = ids.assign_name("author");
    let path = ids.assign_name("path/main");
    let modules = (0..4)
        .map(|n| ids.assign_name(&format!("module/{n}")))
        .collect();
    let mut graph = PathGraph::new();
    graph.add_path(StampPath::root(path));
    World {
        stamps: StampService::new(ids),
        graph,
        author,
        path,
        modules,
    }
}

/// (status, time, module index) for one version.
type Entry = (Status, i64, usize);

fn status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

fn states() -> impl Strategy<Value = BTreeSet<Status>> {
    prop::collection::btree_set(status(), 0..=4)
}

fn history() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec((status(), 0i64..1_000, 0usize..4), 0..24)
}

impl World {
    fn versions(&self, history: &[Entry]) -> Vec<Version<usize>> {
        history
            .iter()
            .enumerate()
            .map(|(i, (status, time, module))| {
                let seq = self
                    .stamps
                    .intern(*status, *time, self.author, self.modules[*module], self.path)
                    .unwrap();
                Version::new(seq, i)
            })
            .collect()
    }

    fn coordinate(
        &self,
        precedence: Precedence,
        time: i64,
        states: BTreeSet<Status>,
    ) -> StampCoordinate {
        StampCoordinate::builder(StampPosition::new(time, self.path))
            .precedence(precedence)
            .allowed_states(states)
            .build()
    }
}

proptest! {
    /// Equal tuples intern to the same sequence; different tuples never do.
    #[test]
    fn interning_is_idempotent(
        entries in prop::collection::vec((status(), any::<i64>(), 0usize..4), 1..20),
    ) {
        let w = world();
        let mut seen = std::collections::HashMap::new();
        for (status, time, module) in &entries {
            let module_id = w.modules[*module];
            let first = w.stamps.intern(*status, *time, w.author, module_id, w.path).unwrap();
            let again = w.stamps.intern(*status, *time, w.author, module_id, w.path).unwrap();
            prop_assert_eq!(first, again);
            if let Some(previous) = seen.insert(first, (*status, *time, *module)) {
                prop_assert_eq!(previous, (*status, *time, *module));
            }
        }
        prop_assert_eq!(w.stamps.len(), seen.len());
    }

    /// Derivations never modify the source and are deterministic.
    #[test]
    fn derivation_is_pure(time in any::<i64>(), states in states(), module in 0usize..4) {
        let w = world();
        let base = w.coordinate(Precedence::Path, 500, BTreeSet::from([Status::Active]));
        let snapshot = base.clone();

        prop_assert_eq!(base.with_time(time), base.with_time(time));
        prop_assert_eq!(base.with_states(states.clone()), base.with_states(states));
        prop_assert_eq!(
            base.with_module_filter([w.modules[module]], ModuleFilterMode::Additive),
            base.with_module_filter([w.modules[module]], ModuleFilterMode::Additive)
        );
        prop_assert_eq!(base.with_time(time).digest(), base.with_time(time).digest());
        prop_assert_eq!(&base, &snapshot);
        prop_assert_eq!(base.digest(), snapshot.digest());
    }

    /// Under time precedence, moving the position later never yields an
    /// older latest version.
    #[test]
    fn time_precedence_is_monotonic(
        history in history(),
        t1 in 0i64..1_200,
        delta in 0i64..600,
        states in states(),
    ) {
        let w = world();
        let versions = w.versions(&history);
        let early = w.coordinate(Precedence::Time, t1, states.clone());
        let late = early.with_time(t1 + delta);

        let resolve = |coordinate: &StampCoordinate| {
            RelativePositionCalculator::new(coordinate, &w.stamps, &w.graph)
                .unwrap()
                .latest_version(&versions)
                .unwrap()
                .value()
                .map(|v| w.stamps.time_of(v.stamp).unwrap())
        };

        if let Some(before) = resolve(&early) {
            let after = resolve(&late);
            prop_assert!(after.is_some());
            prop_assert!(after.unwrap_or(i64::MIN) >= before);
        }
    }

    /// A version whose status is not allowed never appears in a result.
    #[test]
    fn disallowed_states_never_resolve(
        history in history(),
        time in 0i64..1_200,
        states in states(),
        path_precedence in any::<bool>(),
    ) {
        let w = world();
        let versions = w.versions(&history);
        let precedence = if path_precedence { Precedence::Path } else { Precedence::Time };
        let coordinate = w.coordinate(precedence, time, states.clone());
        let calc = RelativePositionCalculator::new(&coordinate, &w.stamps, &w.graph).unwrap();
        let latest = calc.latest_version(&versions).unwrap();

        for version in latest.versions() {
            let status = w.stamps.status_of(version.stamp).unwrap();
            prop_assert!(states.contains(&status));
            prop_assert!(w.stamps.time_of(version.stamp).unwrap() <= time);
        }
        if states.is_empty() {
            prop_assert!(!latest.is_present());
        }
    }

    /// Equal-time versions from different modules always produce one winner
    /// (the module with the smallest UUID) and the rest as contradictions.
    #[test]
    fn ties_produce_one_deterministic_winner(
        modules in prop::collection::btree_set(0usize..4, 2..=4),
        time in 0i64..1_000,
    ) {
        let w = world();
        let history: Vec<Entry> = modules
            .iter()
            .rev()
            .map(|m| (Status::Active, time, *m))
            .collect();
        let versions = w.versions(&history);
        let coordinate = w.coordinate(Precedence::Path, time, BTreeSet::from([Status::Active]));
        let calc = RelativePositionCalculator::new(&coordinate, &w.stamps, &w.graph).unwrap();
        let latest = calc.latest_version(&versions).unwrap();

        prop_assert!(latest.is_contradicted());
        prop_assert_eq!(latest.contradictions().len(), modules.len() - 1);
        let winner = latest.value().unwrap();
        let ids = w.stamps.identifiers();
        let smallest = modules
            .iter()
            .map(|m| w.modules[*m])
            .min_by_key(|m| ids.uuid_of(*m).unwrap())
            .unwrap();
        prop_assert_eq!(w.stamps.module_of(winner.stamp).unwrap(), smallest);
    }

    /// StampCoordinate survives a JSON round trip structurally.
    #[test]
    fn stamp_coordinate_serde_roundtrip(
        time in any::<i64>(),
        states in states(),
        priority in prop::collection::vec(0usize..4, 0..4),
        filter in prop::collection::btree_set(0usize..4, 0..4),
        path_precedence in any::<bool>(),
    ) {
        let w = world();
        let precedence = if path_precedence { Precedence::Path } else { Precedence::Time };
        let coordinate = w
            .coordinate(precedence, time, states)
            .with_module_priority(priority.iter().map(|m| w.modules[*m]))
            .with_module_filter(filter.iter().map(|m| w.modules[*m]), ModuleFilterMode::Replace);

        let json = serde_json::to_string(&coordinate).unwrap();
        let parsed: StampCoordinate = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed.digest(), coordinate.digest());
        prop_assert_eq!(parsed, coordinate);
    }

    /// Stamp exchange records carry the full 64-bit time.
    #[test]
    fn exchange_time_is_lossless(
        time in any::<i64>(),
        sequence in 1i32..=i32::MAX,
        status in status(),
    ) {
        let record = ExchangeRecord::Stamp(StampRecord {
            sequence,
            status,
            time,
            author: uuid::Uuid::from_u128(1),
            module: uuid::Uuid::from_u128(2),
            path: uuid::Uuid::from_u128(3),
        });
        prop_assert_eq!(decode(&encode(&record).unwrap()).unwrap(), record);
    }
}
