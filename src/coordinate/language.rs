//! coordinate::language
//!
//! Language coordinates and description selection.
//!
//! # Architecture
//!
//! A [`LanguageCoordinate`] names a language plus three preference lists
//! (dialects, description types, modules) and an optional fallback
//! coordinate tried when the first yields nothing.
//!
//! Selection ([`LanguageCoordinate::description`]) works on the latest
//! active version of each candidate description:
//!
//! 1. Keep candidates in the coordinate's language
//! 2. Dialects: the first dialect in which some candidate is preferred
//!    wins; failing that, the first in which some candidate is acceptable
//! 3. Description types: the first type any remaining candidate has wins
//! 4. Modules: earlier modules in the preference order sort first; ties
//!    fall to text and then stamp sequence
//!
//! An empty preference list does not filter. If step 1, 2 or 3 leaves
//! nothing, the fallback coordinate is tried.
//!
//! # Memoization
//!
//! Derivations keyed by an alternate description-type list live in an
//! external [`DescriptionTypeMemo`] keyed by the source coordinate's
//! digest, so a different coordinate can never observe a stale entry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CoordinateError;
use crate::core::chronology::Version;
use crate::core::concepts;
use crate::core::ids::IdentifierService;
use crate::core::types::{ConceptId, CoordinateDigest, DigestBuilder, StampSequence, Status};
use crate::resolve::{RelativePositionCalculator, ResolveError};

/// Acceptability of a description in a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptability {
    Preferred,
    Acceptable,
}

/// Payload of a description version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptionPayload {
    pub language: ConceptId,
    pub description_type: ConceptId,
    pub text: String,
    /// Acceptability by dialect.
    pub acceptability: BTreeMap<ConceptId, Acceptability>,
}

impl DescriptionPayload {
    pub fn new(language: ConceptId, description_type: ConceptId, text: impl Into<String>) -> Self {
        Self {
            language,
            description_type,
            text: text.into(),
            acceptability: BTreeMap::new(),
        }
    }

    pub fn with_acceptability(mut self, dialect: ConceptId, acceptability: Acceptability) -> Self {
        self.acceptability.insert(dialect, acceptability);
        self
    }
}

/// An immutable language coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageCoordinate {
    language: ConceptId,
    dialect_preferences: Vec<ConceptId>,
    description_type_preferences: Vec<ConceptId>,
    module_preferences: Vec<ConceptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_priority: Option<Box<LanguageCoordinate>>,
}

struct Visible {
    version: Version<DescriptionPayload>,
    module: ConceptId,
}

impl LanguageCoordinate {
    /// A coordinate for `language` with no preferences.
    pub fn new(language: ConceptId) -> Self {
        Self {
            language,
            dialect_preferences: Vec::new(),
            description_type_preferences: Vec::new(),
            module_preferences: Vec::new(),
            next_priority: None,
        }
    }

    /// English, US then GB dialect, regular names first.
    pub fn us_english_regular_name(ids: &dyn IdentifierService) -> Result<Self, CoordinateError> {
        Ok(Self::new(concepts::ENGLISH_LANGUAGE.id(ids)?)
            .with_dialect_preferences([
                concepts::US_ENGLISH_DIALECT.id(ids)?,
                concepts::GB_ENGLISH_DIALECT.id(ids)?,
            ])
            .with_description_type_preferences([
                concepts::REGULAR_NAME.id(ids)?,
                concepts::FULLY_SPECIFIED_NAME.id(ids)?,
                concepts::DEFINITION.id(ids)?,
            ]))
    }

    /// English, US then GB dialect, fully specified names first.
    pub fn us_english_fully_specified(
        ids: &dyn IdentifierService,
    ) -> Result<Self, CoordinateError> {
        let regular = Self::us_english_regular_name(ids)?;
        Ok(regular.with_description_type_preferences([
            concepts::FULLY_SPECIFIED_NAME.id(ids)?,
            concepts::REGULAR_NAME.id(ids)?,
            concepts::DEFINITION.id(ids)?,
        ]))
    }

    pub fn language(&self) -> ConceptId {
        self.language
    }

    pub fn dialect_preferences(&self) -> &[ConceptId] {
        &self.dialect_preferences
    }

    pub fn description_type_preferences(&self) -> &[ConceptId] {
        &self.description_type_preferences
    }

    pub fn module_preferences(&self) -> &[ConceptId] {
        &self.module_preferences
    }

    pub fn next_priority(&self) -> Option<&LanguageCoordinate> {
        self.next_priority.as_deref()
    }

    pub fn with_language(&self, language: ConceptId) -> Self {
        Self {
            language,
            ..self.clone()
        }
    }

    pub fn with_dialect_preferences(&self, dialects: impl IntoIterator<Item = ConceptId>) -> Self {
        Self {
            dialect_preferences: dialects.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_description_type_preferences(
        &self,
        types: impl IntoIterator<Item = ConceptId>,
    ) -> Self {
        Self {
            description_type_preferences: types.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_module_preferences(&self, modules: impl IntoIterator<Item = ConceptId>) -> Self {
        Self {
            module_preferences: modules.into_iter().collect(),
            ..self.clone()
        }
    }

    /// Set or clear the fallback coordinate.
    pub fn with_next_priority(&self, next: Option<LanguageCoordinate>) -> Self {
        Self {
            next_priority: next.map(Box::new),
            ..self.clone()
        }
    }

    /// Replace the description-type preferences on every link of the chain.
    pub fn with_alternate_description_types(&self, types: &[ConceptId]) -> Self {
        Self {
            description_type_preferences: types.to_vec(),
            next_priority: self
                .next_priority
                .as_ref()
                .map(|next| Box::new(next.with_alternate_description_types(types))),
            ..self.clone()
        }
    }

    /// Select the best description among candidate histories.
    ///
    /// Each candidate is the commit-ordered history of one description.
    /// Returns `None` when no coordinate in the chain matches.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures (unknown stamps, path cycles).
    pub fn description(
        &self,
        candidates: &[Vec<Version<DescriptionPayload>>],
        calculator: &RelativePositionCalculator<'_>,
    ) -> Result<Option<Version<DescriptionPayload>>, ResolveError> {
        let mut visible = Vec::with_capacity(candidates.len());
        for history in candidates {
            let Some(version) = calculator.latest_version(history)?.into_value() else {
                continue;
            };
            let stamp = calculator
                .stamps()
                .stamp(version.stamp)
                .map_err(|_| ResolveError::StampNotFound(version.stamp))?;
            if stamp.status == Status::Active {
                visible.push(Visible {
                    version,
                    module: stamp.module,
                });
            }
        }

        let mut current = Some(self);
        while let Some(coordinate) = current {
            if let Some(found) = coordinate.select(&visible) {
                return Ok(Some(found.version.clone()));
            }
            current = coordinate.next_priority();
        }
        Ok(None)
    }

    /// Best description, preferring fully specified names.
    pub fn fully_specified_description(
        &self,
        candidates: &[Vec<Version<DescriptionPayload>>],
        calculator: &RelativePositionCalculator<'_>,
    ) -> Result<Option<Version<DescriptionPayload>>, ResolveError> {
        let ids = calculator.stamps().identifiers();
        let fsn = concepts::FULLY_SPECIFIED_NAME.id(ids.as_ref())?;
        self.with_alternate_description_types(&[fsn])
            .description(candidates, calculator)
    }

    /// Best description, preferring regular names over fully specified ones.
    pub fn preferred_description(
        &self,
        candidates: &[Vec<Version<DescriptionPayload>>],
        calculator: &RelativePositionCalculator<'_>,
    ) -> Result<Option<Version<DescriptionPayload>>, ResolveError> {
        let ids = calculator.stamps().identifiers();
        let regular = concepts::REGULAR_NAME.id(ids.as_ref())?;
        let fsn = concepts::FULLY_SPECIFIED_NAME.id(ids.as_ref())?;
        self.with_alternate_description_types(&[regular, fsn])
            .description(candidates, calculator)
    }

    fn select<'v>(&self, visible: &'v [Visible]) -> Option<&'v Visible> {
        let in_language: Vec<&Visible> = visible
            .iter()
            .filter(|v| v.version.payload.language == self.language)
            .collect();
        let by_dialect = self.filter_by_dialect(in_language)?;
        let by_type = self.filter_by_type(by_dialect)?;

        by_type.into_iter().min_by(|a, b| {
            self.module_rank(a.module)
                .cmp(&self.module_rank(b.module))
                .then_with(|| a.version.payload.text.cmp(&b.version.payload.text))
                .then_with(|| a.version.stamp.cmp(&b.version.stamp))
        })
    }

    fn filter_by_dialect<'v>(&self, candidates: Vec<&'v Visible>) -> Option<Vec<&'v Visible>> {
        if candidates.is_empty() {
            return None;
        }
        if self.dialect_preferences.is_empty() {
            return Some(candidates);
        }
        for wanted in [Acceptability::Preferred, Acceptability::Acceptable] {
            for dialect in &self.dialect_preferences {
                let matching: Vec<&Visible> = candidates
                    .iter()
                    .copied()
                    .filter(|v| v.version.payload.acceptability.get(dialect) == Some(&wanted))
                    .collect();
                if !matching.is_empty() {
                    return Some(matching);
                }
            }
        }
        None
    }

    fn filter_by_type<'v>(&self, candidates: Vec<&'v Visible>) -> Option<Vec<&'v Visible>> {
        if self.description_type_preferences.is_empty() {
            return Some(candidates);
        }
        self.description_type_preferences.iter().find_map(|kind| {
            let matching: Vec<&Visible> = candidates
                .iter()
                .copied()
                .filter(|v| v.version.payload.description_type == *kind)
                .collect();
            (!matching.is_empty()).then_some(matching)
        })
    }

    /// Unlisted modules rank after every listed one.
    fn module_rank(&self, module: ConceptId) -> usize {
        self.module_preferences
            .iter()
            .position(|m| *m == module)
            .unwrap_or(usize::MAX)
    }

    pub fn digest(&self) -> CoordinateDigest {
        let mut builder = DigestBuilder::new("language-coordinate");
        builder
            .concept(self.language)
            .concepts(self.dialect_preferences.iter())
            .concepts(self.description_type_preferences.iter())
            .concepts(self.module_preferences.iter());
        match &self.next_priority {
            Some(next) => {
                builder.u8(1).digest(&next.digest());
            }
            None => {
                builder.u8(0);
            }
        }
        builder.finish()
    }

    pub fn uuid(&self) -> Uuid {
        self.digest().to_uuid()
    }
}

type MemoKey = (CoordinateDigest, Vec<ConceptId>);

/// External memo of alternate description-type derivations.
#[derive(Debug, Default)]
pub struct DescriptionTypeMemo {
    entries: RwLock<HashMap<MemoKey, Arc<LanguageCoordinate>>>,
}

impl DescriptionTypeMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// `coordinate` with its description types replaced by `types`.
    pub fn get_or_derive(
        &self,
        coordinate: &LanguageCoordinate,
        types: &[ConceptId],
    ) -> Arc<LanguageCoordinate> {
        let key = (coordinate.digest(), types.to_vec());
        if let Some(found) = self.entries.read().get(&key) {
            return Arc::clone(found);
        }
        let derived = Arc::new(coordinate.with_alternate_description_types(types));
        Arc::clone(self.entries.write().entry(key).or_insert(derived))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Stamps of every candidate description visible under `calculator`,
/// in candidate order. Useful for diagnosing an empty selection.
pub fn visible_description_stamps(
    candidates: &[Vec<Version<DescriptionPayload>>],
    calculator: &RelativePositionCalculator<'_>,
) -> Result<Vec<StampSequence>, ResolveError> {
    let mut stamps = Vec::new();
    for history in candidates {
        if let Some(version) = calculator.latest_version(history)?.into_value() {
            stamps.push(version.stamp);
        }
    }
    Ok(stamps)
}
