//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ConceptId`] - Internal handle for a concept (author, module, path, ...)
//! - [`ChronologyId`] - Internal handle for a versioned object
//! - [`StampSequence`] - Interned handle for a stamp tuple
//! - [`Status`] - Stamp status
//! - [`Precedence`] - Visibility rule for coordinates
//! - [`Premise`] - Stated or inferred taxonomy view
//! - [`UtcTimestamp`] - RFC3339 timestamp
//! - [`CoordinateDigest`] - Structural content hash of a coordinate
//!
//! # Time sentinels
//!
//! Stamp times are epoch milliseconds. Two values are reserved:
//! [`TIME_UNCOMMITTED`] (`i64::MAX`) marks a staged, not-yet-committed stamp
//! and doubles as "latest" when used as a coordinate position, and
//! [`TIME_CANCELED`] (`i64::MIN`) marks a retracted stamp.
//!
//! # Examples
//!
//! ```
//! use stampwork::core::types::{ConceptId, Status, StampSequence};
//!
//! let module = ConceptId::new(7).unwrap();
//! assert_eq!(module.get(), 7);
//!
//! assert!(ConceptId::new(0).is_err());
//! assert_eq!("active".parse::<Status>().unwrap(), Status::Active);
//! assert!(StampSequence::new(-1).is_err());
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Time value of a staged stamp; also "as of now" for coordinate positions.
pub const TIME_UNCOMMITTED: i64 = i64::MAX;

/// Time value of a canceled stamp.
pub const TIME_CANCELED: i64 = i64::MIN;

/// Alias for [`TIME_UNCOMMITTED`] when used as a coordinate position.
pub const TIME_LATEST: i64 = TIME_UNCOMMITTED;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid concept id: {0}")]
    InvalidConceptId(i32),

    #[error("invalid stamp sequence: {0}")]
    InvalidStampSequence(i32),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid precedence: {0}")]
    InvalidPrecedence(String),
}

/// Internal handle for a concept.
///
/// Concept ids are positive, dense and assigned by the identifier registry.
/// They are the form in which stamps and coordinates reference authors,
/// modules, paths, languages and the like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ConceptId(i32);

impl ConceptId {
    /// Create a validated concept id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidConceptId` for zero or negative values.
    pub fn new(value: i32) -> Result<Self, TypeError> {
        if value <= 0 {
            return Err(TypeError::InvalidConceptId(value));
        }
        Ok(Self(value))
    }

    /// Raw integer value.
    pub fn get(self) -> i32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as i32 + 1)
    }
}

impl TryFrom<i32> for ConceptId {
    type Error = TypeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConceptId> for i32 {
    fn from(id: ConceptId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Internal handle for a chronology (the history of one durable object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChronologyId(pub u64);

impl std::fmt::Display for ChronologyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chronology:{}", self.0)
    }
}

/// Interned handle for a stamp tuple.
///
/// Sequences start at 1 and are never reused. Equal tuples always map to
/// the same sequence, so two sequences may be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct StampSequence(i32);

impl StampSequence {
    /// Create a validated stamp sequence.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidStampSequence` for zero or negative values.
    pub fn new(value: i32) -> Result<Self, TypeError> {
        if value <= 0 {
            return Err(TypeError::InvalidStampSequence(value));
        }
        Ok(Self(value))
    }

    /// Raw integer value, as written to exchange records.
    pub fn get(self) -> i32 {
        self.0
    }

    /// Zero-based slot in the interning table.
    pub(crate) fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as i32 + 1)
    }
}

impl TryFrom<i32> for StampSequence {
    type Error = TypeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StampSequence> for i32 {
    fn from(seq: StampSequence) -> Self {
        seq.0
    }
}

impl std::fmt::Display for StampSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stamp:{}", self.0)
    }
}

/// Status carried by a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Inactive,
    Canceled,
    Primordial,
}

impl Status {
    /// All statuses in declaration order.
    pub const ALL: [Status; 4] = [
        Status::Active,
        Status::Inactive,
        Status::Canceled,
        Status::Primordial,
    ];

    /// Stable one-byte code used by digests and exchange records.
    pub fn code(self) -> u8 {
        match self {
            Status::Active => 1,
            Status::Inactive => 2,
            Status::Canceled => 3,
            Status::Primordial => 4,
        }
    }

    /// Inverse of [`Status::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Status::Active),
            2 => Some(Status::Inactive),
            3 => Some(Status::Canceled),
            4 => Some(Status::Primordial),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Canceled => "canceled",
            Status::Primordial => "primordial",
        }
    }
}

impl FromStr for Status {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            "canceled" | "cancelled" => Ok(Status::Canceled),
            "primordial" => Ok(Status::Primordial),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule deciding which versions a coordinate can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Branch ancestry and origin times determine visibility.
    Path,
    /// Raw timestamp ordering determines visibility.
    Time,
}

impl Precedence {
    pub fn code(self) -> u8 {
        match self {
            Precedence::Path => 1,
            Precedence::Time => 2,
        }
    }
}

impl FromStr for Precedence {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(Precedence::Path),
            "time" => Ok(Precedence::Time),
            other => Err(TypeError::InvalidPrecedence(other.to_string())),
        }
    }
}

/// Which taxonomy view a manifold reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Premise {
    Stated,
    Inferred,
}

impl Premise {
    pub fn code(self) -> u8 {
        match self {
            Premise::Stated => 1,
            Premise::Inferred => 2,
        }
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use stampwork::core::types::UtcTimestamp;
///
/// let ts = UtcTimestamp::from_epoch_millis(0).unwrap();
/// assert_eq!(ts.to_string(), "1970-01-01T00:00:00+00:00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from epoch milliseconds.
    ///
    /// Returns `None` for values chrono cannot represent, which includes
    /// both time sentinels.
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Epoch milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Render a stamp or position time, naming the sentinels.
pub fn describe_time(time: i64) -> String {
    match time {
        TIME_UNCOMMITTED => "latest".to_string(),
        TIME_CANCELED => "canceled".to_string(),
        t => UtcTimestamp::from_epoch_millis(t)
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| t.to_string()),
    }
}

/// Namespace for coordinate UUIDs derived from digests.
const COORDINATE_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_0c3e_9d0a_4b7e_8a52_7c1d_2e3f_4a5b);

/// A stable hash over the structural fields of a coordinate.
///
/// Equal coordinates built at different call sites produce equal digests,
/// so the digest is usable as a cache or version key.
///
/// # Example
///
/// ```
/// use stampwork::core::types::DigestBuilder;
///
/// let mut a = DigestBuilder::new("example");
/// a.i64(42).str("x");
/// let mut b = DigestBuilder::new("example");
/// b.i64(42).str("x");
/// assert_eq!(a.finish(), b.finish());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordinateDigest(String);

impl CoordinateDigest {
    /// Get the digest as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name-based UUID derived from the digest.
    pub fn to_uuid(&self) -> Uuid {
        Uuid::new_v5(&COORDINATE_NAMESPACE, self.0.as_bytes())
    }
}

impl std::fmt::Display for CoordinateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental builder for [`CoordinateDigest`].
///
/// Every field is written with a fixed width or a length prefix so that
/// distinct field sequences never collide by concatenation.
pub struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    /// Start a digest for the given coordinate kind.
    pub fn new(kind: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.str(kind);
        builder
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.hasher.update([value]);
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn concept(&mut self, id: ConceptId) -> &mut Self {
        self.i32(id.get())
    }

    /// Write a length-prefixed list of concepts, order preserved.
    pub fn concepts<'a>(&mut self, ids: impl ExactSizeIterator<Item = &'a ConceptId>) -> &mut Self {
        self.u64(ids.len() as u64);
        for id in ids {
            self.concept(*id);
        }
        self
    }

    /// Fold a nested digest in.
    pub fn digest(&mut self, digest: &CoordinateDigest) -> &mut Self {
        self.str(digest.as_str())
    }

    pub fn finish(self) -> CoordinateDigest {
        CoordinateDigest(hex::encode(self.hasher.finalize()))
    }
}
