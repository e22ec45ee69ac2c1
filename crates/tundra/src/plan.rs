use crate::config::Settings;
use std::fmt::Write;
use tundra_client::{RangePartition, RangePartitionBound};
use tundra_common::PartialRow;

fn bound_row(row: &PartialRow) -> String {
    if row.is_empty() {
        return "unbounded".to_string();
    }
    row.iter().map(|(column, value)| format!("{}={}", column, value)).collect::<Vec<_>>().join(", ")
}

fn range(partition: &RangePartition) -> String {
    let open = match partition.lower_bound {
        RangePartitionBound::Inclusive => '[',
        RangePartitionBound::Exclusive => '(',
    };
    let close = match partition.upper_bound {
        RangePartitionBound::Inclusive => ']',
        RangePartitionBound::Exclusive => ')',
    };
    format!("{}{} .. {}{}", open, bound_row(&partition.lower), bound_row(&partition.upper), close)
}

/// Human readable description of what opening the configured table does.
pub fn describe(settings: &Settings) -> anyhow::Result<String> {
    let info = settings.table_info()?;
    let mut out = String::new();
    let (schema, options) = match (info.schema(), info.create_table_options()) {
        (Some(schema), Some(options)) => (schema?, options?),
        _ => {
            writeln!(out, "Table {} must already exist; no primary key is configured.", info.name())?;
            return Ok(out);
        }
    };

    writeln!(out, "Table {} (created if missing)", info.name())?;
    writeln!(out, "Columns:")?;
    for column in schema.columns() {
        let mut flags = Vec::new();
        if column.key {
            flags.push("KEY");
        }
        if !column.nullable {
            flags.push("NOT NULL");
        }
        let line = format!("  {} {} {}", column.name, column.data_type, flags.join(" "));
        writeln!(out, "{}", line.trim_end())?;
    }
    writeln!(out, "Replicas: {}", options.num_replicas())?;
    for hash in options.hash_partitions() {
        writeln!(out, "Hash partition: ({}) into {} buckets", hash.columns.join(", "), hash.buckets)?;
    }
    if !options.range_partition_columns().is_empty() {
        writeln!(out, "Range partition columns: ({})", options.range_partition_columns().join(", "))?;
    }
    for partition in options.range_partitions() {
        writeln!(out, "  range {}", range(partition))?;
    }
    Ok(out)
}
