//! Scan requests, store-side predicates and scan tokens.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tundra_common::{Schema, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Greater,
    GreaterEqual,
    Equal,
    Less,
    LessEqual,
}

impl ComparisonOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Greater => ordering == Ordering::Greater,
            ComparisonOp::GreaterEqual => ordering != Ordering::Less,
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::Less => ordering == Ordering::Less,
            ComparisonOp::LessEqual => ordering != Ordering::Greater,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::Equal => "=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
        }
    }
}

/// A predicate bound to a column and typed with the column's native
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison { column: String, op: ComparisonOp, value: Value },
    InList { column: String, values: Vec<Value> },
    IsNull { column: String },
    IsNotNull { column: String },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Comparison { column, .. }
            | Predicate::InList { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column } => column,
        }
    }

    /// Evaluates against a full table row laid out by `schema`. Comparisons
    /// against null cells never match.
    pub fn evaluate(&self, schema: &Schema, row: &[Value]) -> bool {
        let cell = match schema.column_index(self.column()).and_then(|idx| row.get(idx)) {
            Some(cell) => cell,
            None => return false,
        };
        match self {
            Predicate::IsNull { .. } => cell.is_null(),
            Predicate::IsNotNull { .. } => !cell.is_null(),
            Predicate::Comparison { op, value, .. } => {
                cell.compare(value).map(|ordering| op.accepts(ordering)).unwrap_or(false)
            }
            Predicate::InList { values, .. } => {
                values.iter().any(|v| cell.compare(v) == Some(Ordering::Equal))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison { column, op, value } => write!(f, "{} {} {}", column, op.symbol(), value),
            Predicate::InList { column, values } => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", column, list.join(", "))
            }
            Predicate::IsNull { column } => write!(f, "{} IS NULL", column),
            Predicate::IsNotNull { column } => write!(f, "{} IS NOT NULL", column),
        }
    }
}

/// What a scan reads. An empty projection reads every column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub projection: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaRole {
    Leader,
    Follower,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub host: String,
    pub port: u16,
    pub role: ReplicaRole,
}

impl Replica {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A tablet and the replicas hosting it, leader first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedTablet {
    pub tablet_id: String,
    pub replicas: Vec<Replica>,
}

/// A scan over one tablet. `payload` is self-contained: any client of the
/// same store can turn it back into a scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanToken {
    pub tablet: LocatedTablet,
    pub payload: Vec<u8>,
}

impl ScanToken {
    pub fn serialize(&self) -> Vec<u8> {
        self.payload.clone()
    }
}
