//! Host-side table schema, as handed to the connector by the processing
//! engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tundra_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Varchar,
    Varbinary,
    Decimal { precision: u8, scale: u8 },
    Timestamp { precision: u8 },
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Boolean => f.write_str("BOOLEAN"),
            LogicalType::TinyInt => f.write_str("TINYINT"),
            LogicalType::SmallInt => f.write_str("SMALLINT"),
            LogicalType::Int => f.write_str("INT"),
            LogicalType::BigInt => f.write_str("BIGINT"),
            LogicalType::Float => f.write_str("FLOAT"),
            LogicalType::Double => f.write_str("DOUBLE"),
            LogicalType::Varchar => f.write_str("VARCHAR"),
            LogicalType::Varbinary => f.write_str("VARBINARY"),
            LogicalType::Decimal { precision, scale } => write!(f, "DECIMAL({}, {})", precision, scale),
            LogicalType::Timestamp { precision } => write!(f, "TIMESTAMP({})", precision),
        }
    }
}

/// Parses SQL type names such as `BIGINT`, `VARCHAR`, `DECIMAL(10, 2)` or
/// `TIMESTAMP(3)`. Case and inner whitespace are ignored.
impl FromStr for LogicalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_uppercase();
        let (name, args) = match normalized.find('(') {
            Some(open) if normalized.ends_with(')') => {
                (&normalized[..open], Some(&normalized[open + 1..normalized.len() - 1]))
            }
            Some(_) => return Err(Error::InvalidConfig(format!("malformed type '{}'", s))),
            None => (normalized.as_str(), None),
        };
        let numbers = |args: &str| -> Result<Vec<u8>, Error> {
            args.split(',')
                .map(|n| n.parse::<u8>().map_err(|_| Error::InvalidConfig(format!("malformed type '{}'", s))))
                .collect()
        };
        match (name, args) {
            ("BOOLEAN", None) => Ok(LogicalType::Boolean),
            ("TINYINT", None) => Ok(LogicalType::TinyInt),
            ("SMALLINT", None) => Ok(LogicalType::SmallInt),
            ("INT", None) | ("INTEGER", None) => Ok(LogicalType::Int),
            ("BIGINT", None) => Ok(LogicalType::BigInt),
            ("FLOAT", None) => Ok(LogicalType::Float),
            ("DOUBLE", None) => Ok(LogicalType::Double),
            ("VARCHAR", _) | ("STRING", None) => Ok(LogicalType::Varchar),
            ("VARBINARY", _) | ("BYTES", None) => Ok(LogicalType::Varbinary),
            ("DECIMAL", Some(args)) => match numbers(args)?.as_slice() {
                [precision] => Ok(LogicalType::Decimal { precision: *precision, scale: 0 }),
                [precision, scale] => Ok(LogicalType::Decimal { precision: *precision, scale: *scale }),
                _ => Err(Error::InvalidConfig(format!("malformed type '{}'", s))),
            },
            ("TIMESTAMP", None) => Ok(LogicalType::Timestamp { precision: 6 }),
            ("TIMESTAMP", Some(args)) => match numbers(args)?.as_slice() {
                [precision] => Ok(LogicalType::Timestamp { precision: *precision }),
                _ => Err(Error::InvalidConfig(format!("malformed type '{}'", s))),
            },
            _ => Err(Error::InvalidConfig(format!("unknown type '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl TableColumn {
    pub fn new(name: &str, logical_type: LogicalType) -> Self {
        Self { name: name.to_string(), logical_type, nullable: true }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<TableColumn>,
    pub primary_key: Option<Vec<String>>,
}

impl TableSchema {
    pub fn new(columns: Vec<TableColumn>) -> Self {
        Self { columns, primary_key: None }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}
