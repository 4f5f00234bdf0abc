//! Fact records and their assembly.
//!
//! A [`FactRecord`] is the flat name→value snapshot one advancement attempt
//! is judged against. It is rebuilt from scratch on every invocation — never
//! cached — so rule evaluation always reflects current external state.

pub mod assembler;
pub mod sources;

use indexmap::IndexMap;
use serde::Serialize;

use crate::rules::FactValue;

pub use assembler::FactAssembler;
pub use sources::{
    AppealsStatus, AppealsStatusSource, FactSources, RegistrantCounter, ReviewStatus,
    ReviewStatusSource, SubmissionCounter,
};

/// Flat mapping of fact names to values for one advancement attempt.
///
/// Insertion order is preserved so failure reports and logs list facts in
/// the order they were computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactRecord {
    values: IndexMap<String, FactValue>,
}

impl FactRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fact, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FactValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Looks up a fact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.values.get(name)
    }

    /// Number of facts in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates facts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
