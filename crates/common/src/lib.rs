//! Common crate
//!
//! Shared types and error handling for Tundra: physical column types and
//! values, table schemas, rows, store mutations and the unified error type.
//!
//! # Example
//! ```rust
//! use tundra_common::{DataType, Value};
//! assert!(Value::Int64(3).matches(&DataType::Int64));
//! ```

pub mod error;
pub mod operation;
pub mod row;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
pub use operation::{Operation, OperationKind, RowError, RowErrorKind};
pub use row::{PartialRow, Row};
pub use schema::{ColumnSchema, Schema, SchemaRef};
pub use types::{DataType, Value};
