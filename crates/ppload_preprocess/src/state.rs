//! Macro definitions shared across preprocessing attempts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The set of macro definitions visible to the next preprocessing attempt.
///
/// Cloning is the snapshot mechanism: the adapter clones the state before an
/// attempt and puts the clone back if the attempt fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroState {
    definitions: BTreeMap<String, String>,
}

impl MacroState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state seeded with `defines`.
    pub fn with_defines<'a>(defines: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        Self {
            definitions: defines
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Defines `name`, replacing any earlier value.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.definitions.insert(name.into(), value.into());
    }

    /// Removes `name`. Returns its previous value.
    pub fn undefine(&mut self, name: &str) -> Option<String> {
        self.definitions.remove(name)
    }

    /// Returns the value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.definitions.get(name).map(String::as_str)
    }

    /// Returns `true` if `name` is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Returns the number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
