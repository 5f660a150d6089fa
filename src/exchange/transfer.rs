//! exchange::transfer
//!
//! Export a stamp table as exchange records and import records from another
//! table.
//!
//! # Invariants
//!
//! - Exported streams list every stamp record before any comment or alias
//!   record that refers to it
//! - Importing re-interns each foreign stamp, so a tuple already present
//!   locally maps to the existing local sequence
//! - Foreign sequences are only meaningful within one import session

use std::collections::HashMap;

use super::{ExchangeError, ExchangeRecord, StampAliasRecord, StampCommentRecord, StampRecord};
use crate::core::stamp::{Stamp, StampService};
use crate::core::types::StampSequence;

/// Every stamp, then every comment, then every alias record of `stamps`.
///
/// # Errors
///
/// Returns [`ExchangeError::Identifier`] if a stamp references a concept the
/// identifier service cannot map to a UUID.
pub fn export_records(stamps: &StampService) -> Result<Vec<ExchangeRecord>, ExchangeError> {
    let ids = stamps.identifiers();
    let mut records = Vec::with_capacity(stamps.len());

    for seq in stamps.stamp_sequences() {
        let stamp = stamps.stamp(seq)?;
        records.push(ExchangeRecord::Stamp(StampRecord {
            sequence: seq.get(),
            status: stamp.status,
            time: stamp.time,
            author: ids.uuid_of(stamp.author)?,
            module: ids.uuid_of(stamp.module)?,
            path: ids.uuid_of(stamp.path)?,
        }));
    }
    for (seq, comment) in stamps.comments() {
        records.push(ExchangeRecord::Comment(StampCommentRecord {
            stamp: seq.get(),
            comment,
        }));
    }
    for alias in stamps.alias_records() {
        records.push(ExchangeRecord::Alias(StampAliasRecord {
            stamp: alias.stamp.get(),
            alias: alias.alias.get(),
            comment: alias.comment,
        }));
    }

    tracing::debug!(records = records.len(), "exported stamp records");
    Ok(records)
}

/// Applies foreign exchange records to a local stamp service.
#[derive(Debug)]
pub struct Importer<'a> {
    stamps: &'a StampService,
    remap: HashMap<i32, StampSequence>,
}

impl<'a> Importer<'a> {
    pub fn new(stamps: &'a StampService) -> Self {
        Self {
            stamps,
            remap: HashMap::new(),
        }
    }

    /// Local sequence for a foreign sequence imported in this session.
    pub fn local_sequence(&self, foreign: i32) -> Option<StampSequence> {
        self.remap.get(&foreign).copied()
    }

    fn mapped(&self, foreign: i32) -> Result<StampSequence, ExchangeError> {
        self.local_sequence(foreign)
            .ok_or(ExchangeError::UnmappedSequence(foreign))
    }

    /// Apply one record.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::Identifier`] if a stamp references an unknown UUID
    /// - [`ExchangeError::UnmappedSequence`] if a comment or alias precedes
    ///   the stamp record it refers to
    /// - [`ExchangeError::Stamp`] if interning, commenting or aliasing fails
    pub fn import_record(&mut self, record: &ExchangeRecord) -> Result<(), ExchangeError> {
        match record {
            ExchangeRecord::Stamp(stamp) => {
                let ids = self.stamps.identifiers();
                let local = self.stamps.intern_stamp(Stamp::new(
                    stamp.status,
                    stamp.time,
                    ids.id_of(&stamp.author)?,
                    ids.id_of(&stamp.module)?,
                    ids.id_of(&stamp.path)?,
                ))?;
                self.remap.insert(stamp.sequence, local);
            }
            ExchangeRecord::Comment(comment) => {
                let local = self.mapped(comment.stamp)?;
                self.stamps.set_comment(local, comment.comment.clone())?;
            }
            ExchangeRecord::Alias(alias) => {
                let stamp = self.mapped(alias.stamp)?;
                let other = self.mapped(alias.alias)?;
                self.stamps.add_alias(stamp, other, alias.comment.clone())?;
            }
        }
        Ok(())
    }

    /// Apply records in order; stops at the first failure.
    pub fn import_all<'r>(
        &mut self,
        records: impl IntoIterator<Item = &'r ExchangeRecord>,
    ) -> Result<usize, ExchangeError> {
        let mut count = 0;
        for record in records {
            self.import_record(record)?;
            count += 1;
        }
        tracing::debug!(count, "imported exchange records");
        Ok(count)
    }
}
