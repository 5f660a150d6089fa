//! exchange
//!
//! Binary stamp, alias and comment records for bulk object exchange.
//!
//! # Modules
//!
//! - [`codec`] - Byte encoding and decoding of records
//! - [`transfer`] - Exporting a stamp table and importing foreign records
//!
//! # Wire format
//!
//! Each record is a one-byte tag followed by its fields, all integers
//! big-endian:
//!
//! | tag | record  | fields |
//! |-----|---------|--------|
//! | 1   | stamp   | seq `i32`, status `u8`, time `i64`, author/module/path UUID (16 bytes each) |
//! | 2   | alias   | stamp `i32`, alias `i32`, comment `opt<str>` |
//! | 3   | comment | stamp `i32`, comment `str` |
//!
//! `str` is a `u32` byte length followed by UTF-8. `opt<str>` is a presence
//! byte (`0` absent, `1` present) followed by a `str` when present.
//!
//! Concepts travel as UUIDs because internal ids are local to one registry.

pub mod codec;
pub mod transfer;

pub use codec::{decode, decode_stream, encode, encode_stream};
pub use transfer::{export_records, Importer};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::ids::IdError;
use crate::core::stamp::StampError;
use crate::core::types::{Status, TypeError};

/// Errors from encoding, decoding or importing exchange records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown record tag: {0}")]
    UnknownTag(u8),

    #[error("unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("invalid presence byte: {0}")]
    InvalidPresence(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("string of {0} bytes exceeds the u32 length prefix")]
    StringTooLong(usize),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    /// An alias or comment record names a sequence no imported stamp record
    /// defined.
    #[error("foreign stamp sequence {0} was never imported")]
    UnmappedSequence(i32),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Identifier(#[from] IdError),

    #[error(transparent)]
    Stamp(#[from] StampError),
}

/// A stamp tuple with portable concept references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampRecord {
    /// Sequence in the exporting table.
    pub sequence: i32,
    pub status: Status,
    pub time: i64,
    pub author: Uuid,
    pub module: Uuid,
    pub path: Uuid,
}

/// Declares `alias` equivalent to `stamp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampAliasRecord {
    pub stamp: i32,
    pub alias: i32,
    pub comment: Option<String>,
}

/// Free-text comment attached to a stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampCommentRecord {
    pub stamp: i32,
    pub comment: String,
}

/// One record in an exchange stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExchangeRecord {
    Stamp(StampRecord),
    Alias(StampAliasRecord),
    Comment(StampCommentRecord),
}

impl ExchangeRecord {
    /// Wire tag of this record kind.
    pub fn tag(&self) -> u8 {
        match self {
            ExchangeRecord::Stamp(_) => codec::TAG_STAMP,
            ExchangeRecord::Alias(_) => codec::TAG_ALIAS,
            ExchangeRecord::Comment(_) => codec::TAG_COMMENT,
        }
    }
}

impl From<StampRecord> for ExchangeRecord {
    fn from(record: StampRecord) -> Self {
        ExchangeRecord::Stamp(record)
    }
}

impl From<StampAliasRecord> for ExchangeRecord {
    fn from(record: StampAliasRecord) -> Self {
        ExchangeRecord::Alias(record)
    }
}

impl From<StampCommentRecord> for ExchangeRecord {
    fn from(record: StampCommentRecord) -> Self {
        ExchangeRecord::Comment(record)
    }
}
