//! The player-visible variable bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form story variables, read and written by passage scripts as `s`.
///
/// The engine never looks inside: the bag only changes through scripts,
/// through the host, or wholesale when a save is restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryState {
    vars: Map<String, Value>,
}

impl StoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: Map<String, Value>) -> Self {
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.remove(key)
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.vars
    }

    /// Mutable access to the underlying map, for the script interpreter.
    pub(crate) fn map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.vars
    }
}

impl From<Map<String, Value>> for StoryState {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}
