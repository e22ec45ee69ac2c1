//! Mutations submitted to a table store session and the per-row failures
//! the store reports for them.

use crate::row::PartialRow;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Upsert,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
            OperationKind::Upsert => "UPSERT",
        };
        f.write_str(name)
    }
}

/// One mutation against one table. A session consumes it exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    table: String,
    kind: OperationKind,
    row: PartialRow,
}

impl Operation {
    pub fn new(table: &str, kind: OperationKind, row: PartialRow) -> Self {
        Self { table: table.to_string(), kind, row }
    }

    pub fn insert(table: &str, row: PartialRow) -> Self {
        Self::new(table, OperationKind::Insert, row)
    }

    pub fn update(table: &str, row: PartialRow) -> Self {
        Self::new(table, OperationKind::Update, row)
    }

    pub fn delete(table: &str, row: PartialRow) -> Self {
        Self::new(table, OperationKind::Delete, row)
    }

    pub fn upsert(table: &str, row: PartialRow) -> Self {
        Self::new(table, OperationKind::Upsert, row)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn row(&self) -> &PartialRow {
        &self.row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowErrorKind {
    AlreadyPresent,
    NotFound,
    InvalidArgument,
    NoTabletCovering,
    Unavailable,
}

/// A store-reported failure for a single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub operation: Operation,
    pub kind: RowErrorKind,
    pub message: String,
}

impl RowError {
    pub fn new(operation: Operation, kind: RowErrorKind, message: impl Into<String>) -> Self {
        Self { operation, kind, message: message.into() }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} failed ({:?}): {}",
            self.operation.kind(),
            self.operation.table(),
            self.kind,
            self.message
        )
    }
}
