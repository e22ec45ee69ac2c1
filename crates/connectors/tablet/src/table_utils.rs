//! Mapping between host table definitions and the tablet store: property
//! keys, type translation and [`TableInfo`] construction.

use crate::coerce::MAX_DECIMAL_DIGITS;
use crate::partition::{parse_range_rules, PartitionPlanner, PartitionProperties};
use crate::schema::{LogicalType, TableColumn, TableSchema};
use crate::table_info::TableInfo;
use std::collections::HashMap;
use tracing::debug;
use tundra_common::{ColumnSchema, DataType, Error, Result, Schema};

pub const MASTERS: &str = "tablet.masters";
pub const TABLE: &str = "tablet.table";
pub const PRIMARY_KEY_COLUMNS: &str = "tablet.primary-key-columns";
pub const HASH_COLUMNS: &str = "tablet.hash-columns";
pub const HASH_PARTITION_NUMS: &str = "tablet.hash-partition-nums";
pub const RANGE_PARTITION_RULE: &str = "tablet.range-partition-rule";
pub const REPLICAS: &str = "tablet.replicas";
pub const FLUSH_MODE: &str = "tablet.flush-mode";
pub const OPERATION_TIMEOUT_MS: &str = "tablet.operation-timeout-ms";
pub const ADMIN_TIMEOUT_MS: &str = "tablet.admin-timeout-ms";
pub const SCAN_ROW_LIMIT: &str = "tablet.scan.row-limit";
pub const SCAN_MIN_SPLITS: &str = "tablet.scan.min-splits";
pub const LOOKUP_CACHE_MAX_ROWS: &str = "tablet.lookup.cache.max-rows";
pub const LOOKUP_CACHE_TTL_MS: &str = "tablet.lookup.cache.ttl-ms";
pub const LOOKUP_MAX_RETRIES: &str = "tablet.lookup.max-retries";

/// Builds the [`TableInfo`] for `name`.
///
/// Creation is requested when the primary key is declared, either through
/// `tablet.primary-key-columns` or on the host schema. The schema and options
/// factories are evaluated lazily, but the partition properties are checked
/// here so malformed configuration fails before any table is touched.
pub fn create_table_info(name: &str, schema: &TableSchema, props: &HashMap<String, String>) -> Result<TableInfo> {
    let info = TableInfo::for_table(name);
    if !props.contains_key(PRIMARY_KEY_COLUMNS) && schema.primary_key.is_none() {
        debug!("Property {} is missing, assuming table {} already exists", PRIMARY_KEY_COLUMNS, name);
        return Ok(info);
    }

    let key_columns = primary_key_columns(props, schema)?;
    let partitioning = PartitionProperties::from_properties(props)?;
    if let Some(rule) = &partitioning.range_rule {
        parse_range_rules(rule)?;
    }

    let host_schema = schema.clone();
    let schema_key = key_columns.clone();
    let options_schema = schema.clone();
    Ok(info.create_table_if_not_exists(
        move || to_store_columns(&host_schema, &schema_key),
        move || {
            let store_schema = to_store_columns(&options_schema, &key_columns)?;
            PartitionPlanner::plan(&partitioning, &key_columns, &store_schema)
        },
    ))
}

/// Key columns from `tablet.primary-key-columns`, falling back to the host
/// schema's primary key.
pub fn primary_key_columns(props: &HashMap<String, String>, schema: &TableSchema) -> Result<Vec<String>> {
    let columns: Vec<String> = match props.get(PRIMARY_KEY_COLUMNS) {
        Some(raw) => raw.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect(),
        None => schema.primary_key.clone().unwrap_or_default(),
    };
    if columns.is_empty() {
        return Err(Error::InvalidConfig("primary key must name at least one column".to_string()));
    }
    if let Some(missing) = columns.iter().find(|c| schema.column(c).is_none()) {
        return Err(Error::ColumnNotFound(missing.clone()));
    }
    Ok(columns)
}

pub fn to_store_type(logical_type: &LogicalType) -> DataType {
    match logical_type {
        LogicalType::Boolean => DataType::Bool,
        LogicalType::TinyInt => DataType::Int8,
        LogicalType::SmallInt => DataType::Int16,
        LogicalType::Int => DataType::Int32,
        LogicalType::BigInt => DataType::Int64,
        LogicalType::Float => DataType::Float,
        LogicalType::Double => DataType::Double,
        LogicalType::Varchar => DataType::String,
        LogicalType::Varbinary => DataType::Binary,
        LogicalType::Decimal { precision, scale } => DataType::Decimal { precision: *precision, scale: *scale },
        LogicalType::Timestamp { .. } => DataType::UnixtimeMicros,
    }
}

pub fn to_logical_type(data_type: &DataType) -> LogicalType {
    match data_type {
        DataType::Bool => LogicalType::Boolean,
        DataType::Int8 => LogicalType::TinyInt,
        DataType::Int16 => LogicalType::SmallInt,
        DataType::Int32 => LogicalType::Int,
        DataType::Int64 => LogicalType::BigInt,
        DataType::Float => LogicalType::Float,
        DataType::Double => LogicalType::Double,
        DataType::String => LogicalType::Varchar,
        DataType::Binary => LogicalType::Varbinary,
        DataType::Decimal { precision, scale } => LogicalType::Decimal { precision: *precision, scale: *scale },
        DataType::UnixtimeMicros => LogicalType::Timestamp { precision: 3 },
    }
}

/// Store columns for a host schema. Key columns are never nullable.
pub fn to_store_columns(schema: &TableSchema, key_columns: &[String]) -> Result<Schema> {
    if let Some(missing) = key_columns.iter().find(|c| schema.column(c).is_none()) {
        return Err(Error::ColumnNotFound(missing.clone()));
    }
    let columns = schema
        .columns
        .iter()
        .map(|column| {
            let data_type = to_store_type(&column.logical_type);
            let key = key_columns.contains(&column.name);
            if let DataType::Decimal { precision, scale } = data_type {
                if precision == 0 || precision > MAX_DECIMAL_DIGITS || scale > precision {
                    return Err(Error::UnsupportedColumnType {
                        column: column.name.clone(),
                        data_type: data_type.to_string(),
                    });
                }
            }
            if key && matches!(data_type, DataType::Bool | DataType::Float | DataType::Double) {
                return Err(Error::UnsupportedColumnType {
                    column: column.name.clone(),
                    data_type: format!("{} as primary key", data_type),
                });
            }
            Ok(ColumnSchema::new(&column.name, data_type).key(key).nullable(!key && column.nullable))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(columns))
}

/// Host view of an existing store table. Every column is reported nullable.
pub fn store_to_table_schema(schema: &Schema) -> TableSchema {
    let columns = schema
        .columns()
        .iter()
        .map(|c| TableColumn::new(&c.name, to_logical_type(&c.data_type)))
        .collect();
    let key = schema.primary_key_names();
    TableSchema { columns, primary_key: if key.is_empty() { None } else { Some(key) } }
}
