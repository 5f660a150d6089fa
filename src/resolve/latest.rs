//! resolve::latest
//!
//! The outcome of resolving one chronology under a coordinate.

/// Latest visible version(s) of a chronology.
///
/// `Contradicted` always names exactly one winner, chosen
/// deterministically, plus the versions that could not be ranked against
/// it, so callers can surface ambiguity without losing a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LatestVersion<V> {
    /// Nothing is visible under the coordinate.
    #[default]
    Unresolved,
    /// Exactly one version is visible.
    Resolved(V),
    /// A winner plus the competing versions.
    Contradicted { winner: V, contradictions: Vec<V> },
}

impl<V> LatestVersion<V> {
    /// The resolved or winning version.
    pub fn value(&self) -> Option<&V> {
        match self {
            LatestVersion::Unresolved => None,
            LatestVersion::Resolved(v) => Some(v),
            LatestVersion::Contradicted { winner, .. } => Some(winner),
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            LatestVersion::Unresolved => None,
            LatestVersion::Resolved(v) => Some(v),
            LatestVersion::Contradicted { winner, .. } => Some(winner),
        }
    }

    /// Competing versions; empty unless contradicted.
    pub fn contradictions(&self) -> &[V] {
        match self {
            LatestVersion::Contradicted { contradictions, .. } => contradictions,
            _ => &[],
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, LatestVersion::Unresolved)
    }

    pub fn is_contradicted(&self) -> bool {
        matches!(self, LatestVersion::Contradicted { .. })
    }

    /// Every version in the result, winner first.
    pub fn versions(&self) -> Vec<&V> {
        self.value()
            .into_iter()
            .chain(self.contradictions().iter())
            .collect()
    }

    pub fn as_ref(&self) -> LatestVersion<&V> {
        match self {
            LatestVersion::Unresolved => LatestVersion::Unresolved,
            LatestVersion::Resolved(v) => LatestVersion::Resolved(v),
            LatestVersion::Contradicted {
                winner,
                contradictions,
            } => LatestVersion::Contradicted {
                winner,
                contradictions: contradictions.iter().collect(),
            },
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(V) -> U) -> LatestVersion<U> {
        match self {
            LatestVersion::Unresolved => LatestVersion::Unresolved,
            LatestVersion::Resolved(v) => LatestVersion::Resolved(f(v)),
            LatestVersion::Contradicted {
                winner,
                contradictions,
            } => LatestVersion::Contradicted {
                winner: f(winner),
                contradictions: contradictions.into_iter().map(f).collect(),
            },
        }
    }
}
