//! Execution settings that may influence query result semantics.

use ahash::AHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Mixing coefficient applied per position in [`ExecutionSettings::stable_hash`].
const POSITION_COEFFICIENT: u64 = 53;

/// An ordered list of `(name, value)` settings pairs.
///
/// Order matters: settings normally arrive in a canonical order, and the
/// stable hash folds each entry in with a positional coefficient, so two
/// lists with the same pairs in different orders hash (and compare)
/// differently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    entries: Vec<(String, String)>,
}

impl ExecutionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing an existing value in place so the
    /// position of a re-assigned setting is preserved.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parses the value of `name`, returning `None` when the setting is
    /// absent or unparsable.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order-sensitive hash over the full settings list. Each pair's hash is
    /// weighted by a coefficient that grows by a factor of
    /// [`POSITION_COEFFICIENT`] per position.
    pub fn stable_hash(&self) -> u64 {
        let mut hash = 0u64;
        let mut coefficient = 1u64;
        for (name, value) in &self.entries {
            let mut hasher = AHasher::default();
            name.hash(&mut hasher);
            value.hash(&mut hasher);
            hash = hash.wrapping_add(hasher.finish().wrapping_mul(coefficient));
            coefficient = coefficient.wrapping_mul(POSITION_COEFFICIENT);
        }
        hash
    }
}
