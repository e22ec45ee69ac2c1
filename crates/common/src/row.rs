use crate::types::Value;
use serde::{Deserialize, Serialize};

// A scanned row is the list of projected cell values, in projection order.
pub type Row = Vec<Value>;

/// Column to value bindings for a subset of a table's columns, kept in the
/// order the columns were first set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialRow {
    values: Vec<(String, Value)>,
}

impl PartialRow {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Binds `column` to `value`, replacing an earlier binding.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
        self
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn is_set(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
