//! exchange::codec
//!
//! Byte encoding of [`ExchangeRecord`]s.
//!
//! # Example
//!
//! ```
//! use stampwork::exchange::{decode, encode, ExchangeRecord, StampCommentRecord};
//!
//! let record = ExchangeRecord::Comment(StampCommentRecord {
//!     stamp: 7,
//!     comment: "bulk load".to_string(),
//! });
//! let bytes = encode(&record).unwrap();
//! assert_eq!(bytes[0], 3);
//! assert_eq!(decode(&bytes).unwrap(), record);
//! ```

use uuid::Uuid;

use super::{ExchangeError, ExchangeRecord, StampAliasRecord, StampCommentRecord, StampRecord};
use crate::core::types::{StampSequence, Status};

pub const TAG_STAMP: u8 = 1;
pub const TAG_ALIAS: u8 = 2;
pub const TAG_COMMENT: u8 = 3;

/// Encode one record.
///
/// # Errors
///
/// Returns [`ExchangeError::StringTooLong`] if a comment does not fit the
/// `u32` length prefix.
pub fn encode(record: &ExchangeRecord) -> Result<Vec<u8>, ExchangeError> {
    let mut out = Vec::new();
    encode_into(record, &mut out)?;
    Ok(out)
}

/// Encode records back to back.
pub fn encode_stream<'a>(
    records: impl IntoIterator<Item = &'a ExchangeRecord>,
) -> Result<Vec<u8>, ExchangeError> {
    let mut out = Vec::new();
    for record in records {
        encode_into(record, &mut out)?;
    }
    Ok(out)
}

/// Append the encoding of `record` to `out`.
pub fn encode_into(record: &ExchangeRecord, out: &mut Vec<u8>) -> Result<(), ExchangeError> {
    out.push(record.tag());
    match record {
        ExchangeRecord::Stamp(stamp) => {
            out.extend_from_slice(&stamp.sequence.to_be_bytes());
            out.push(stamp.status.code());
            out.extend_from_slice(&stamp.time.to_be_bytes());
            out.extend_from_slice(stamp.author.as_bytes());
            out.extend_from_slice(stamp.module.as_bytes());
            out.extend_from_slice(stamp.path.as_bytes());
        }
        ExchangeRecord::Alias(alias) => {
            out.extend_from_slice(&alias.stamp.to_be_bytes());
            out.extend_from_slice(&alias.alias.to_be_bytes());
            match &alias.comment {
                Some(comment) => {
                    out.push(1);
                    put_str(out, comment)?;
                }
                None => out.push(0),
            }
        }
        ExchangeRecord::Comment(comment) => {
            out.extend_from_slice(&comment.stamp.to_be_bytes());
            put_str(out, &comment.comment)?;
        }
    }
    Ok(())
}

fn put_str(out: &mut Vec<u8>, value: &str) -> Result<(), ExchangeError> {
    let len = u32::try_from(value.len()).map_err(|_| ExchangeError::StringTooLong(value.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Decode exactly one record.
///
/// # Errors
///
/// Fails on malformed input, and with [`ExchangeError::TrailingBytes`] if
/// `bytes` holds more than one record.
pub fn decode(bytes: &[u8]) -> Result<ExchangeRecord, ExchangeError> {
    let mut reader = Reader::new(bytes);
    let record = reader.record()?;
    if reader.remaining() > 0 {
        return Err(ExchangeError::TrailingBytes(reader.remaining()));
    }
    Ok(record)
}

/// Decode a stream of back-to-back records.
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<ExchangeRecord>, ExchangeError> {
    let mut reader = Reader::new(bytes);
    let mut records = Vec::new();
    while reader.remaining() > 0 {
        records.push(reader.record()?);
    }
    Ok(records)
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ExchangeError> {
        let slice = self.slice(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn slice(&mut self, len: usize) -> Result<&'a [u8], ExchangeError> {
        if self.remaining() < len {
            return Err(ExchangeError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ExchangeError> {
        Ok(self.take::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, ExchangeError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, ExchangeError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    fn uuid(&mut self) -> Result<Uuid, ExchangeError> {
        Ok(Uuid::from_bytes(self.take()?))
    }

    fn sequence(&mut self) -> Result<i32, ExchangeError> {
        let raw = self.i32()?;
        StampSequence::new(raw)?;
        Ok(raw)
    }

    fn string(&mut self) -> Result<String, ExchangeError> {
        let len = u32::from_be_bytes(self.take()?) as usize;
        let bytes = self.slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ExchangeError::InvalidUtf8)
    }

    fn record(&mut self) -> Result<ExchangeRecord, ExchangeError> {
        match self.u8()? {
            TAG_STAMP => {
                let sequence = self.sequence()?;
                let code = self.u8()?;
                let status = Status::from_code(code).ok_or(ExchangeError::UnknownStatus(code))?;
                Ok(ExchangeRecord::Stamp(StampRecord {
                    sequence,
                    status,
                    time: self.i64()?,
                    author: self.uuid()?,
                    module: self.uuid()?,
                    path: self.uuid()?,
                }))
            }
            TAG_ALIAS => {
                let stamp = self.sequence()?;
                let alias = self.sequence()?;
                let comment = match self.u8()? {
                    0 => None,
                    1 => Some(self.string()?),
                    other => return Err(ExchangeError::InvalidPresence(other)),
                };
                Ok(ExchangeRecord::Alias(StampAliasRecord {
                    stamp,
                    alias,
                    comment,
                }))
            }
            TAG_COMMENT => Ok(ExchangeRecord::Comment(StampCommentRecord {
                stamp: self.sequence()?,
                comment: self.string()?,
            })),
            other => Err(ExchangeError::UnknownTag(other)),
        }
    }
}
