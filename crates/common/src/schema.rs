use crate::error::{Error, Result};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub key: bool,
}

impl ColumnSchema {
    /// A nullable, non-key column.
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self { name: name.to_string(), data_type, nullable: true, key: false }
    }

    /// Marks the column as part of the primary key. Key columns are never nullable.
    pub fn key(mut self, key: bool) -> Self {
        self.key = key;
        if key {
            self.nullable = false;
        }
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable && !self.key;
        self
    }
}

/// Ordered column list of a physical table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key(&self) -> Vec<&ColumnSchema> {
        self.columns.iter().filter(|c| c.key).collect()
    }

    pub fn primary_key_names(&self) -> Vec<String> {
        self.columns.iter().filter(|c| c.key).map(|c| c.name.clone()).collect()
    }

    /// Returns the sub-schema for `names`, in the order given.
    pub fn project(&self, names: &[String]) -> Result<Schema> {
        let columns = names
            .iter()
            .map(|name| self.column(name).cloned().ok_or_else(|| Error::ColumnNotFound(name.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("id", DataType::Int64).key(true),
            ColumnSchema::new("name", DataType::String),
            ColumnSchema::new("score", DataType::Double).nullable(false),
        ])
    }

    #[test]
    fn key_columns_are_not_nullable() {
        let schema = sample();
        let id = schema.column("id").unwrap();
        assert!(id.key);
        assert!(!id.nullable);
        assert_eq!(schema.primary_key_names(), vec!["id".to_string()]);
    }

    #[test]
    fn project_preserves_requested_order() {
        let schema = sample();
        let projected = schema.project(&["score".to_string(), "id".to_string()]).unwrap();
        assert_eq!(projected.column_names(), vec!["score".to_string(), "id".to_string()]);
    }

    #[test]
    fn project_unknown_column_fails() {
        let schema = sample();
        let err = schema.project(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(name) if name == "missing"));
    }
}
