//! Round trip against an in-process cluster: write generated rows through
//! the sink, scan them back split by split, then probe one key through the
//! lookup function.

use crate::config::Settings;
use anyhow::{anyhow, Context};
use futures::future::try_join_all;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use tundra_client::{MemoryCluster, StoreConnector};
use tundra_common::{Row, Value};
use tundra_connector_tablet::table_utils::primary_key_columns;
use tundra_connector_tablet::{
    LogicalType, LoggingFailureHandler, RowOperationMapper, TableInfo, TableSchema, TabletSink, TabletTableSource,
};

/// Base of generated timestamps, in milliseconds.
const EPOCH_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
pub struct SplitReport {
    pub index: usize,
    pub locations: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub rows_stored: usize,
    pub tablets: usize,
    pub splits: Vec<SplitReport>,
    pub lookup_key: Vec<Value>,
    pub lookup_rows: Vec<Row>,
}

impl DemoReport {
    pub fn rows_scanned(&self) -> usize {
        self.splits.iter().map(|s| s.rows).sum()
    }
}

/// Deterministic values for row `n`.
pub fn sample_row(schema: &TableSchema, n: u64) -> Row {
    let i = n as i64;
    schema
        .columns
        .iter()
        .map(|column| match column.logical_type {
            LogicalType::Boolean => Value::Bool(i % 2 == 0),
            LogicalType::TinyInt => Value::Int8((i % 128) as i8),
            LogicalType::SmallInt => Value::Int16((i % 32_768) as i16),
            LogicalType::Int => Value::Int32(i as i32),
            LogicalType::BigInt => Value::Int64(i),
            LogicalType::Float => Value::Float(i as f32 / 2.0),
            LogicalType::Double => Value::Double(i as f64 / 4.0),
            LogicalType::Varchar => Value::String(format!("{}-{}", column.name, i)),
            LogicalType::Varbinary => Value::Binary(i.to_be_bytes().to_vec()),
            LogicalType::Decimal { scale, .. } => Value::Decimal(Decimal::new(i, u32::from(scale))),
            LogicalType::Timestamp { .. } => Value::TimestampMillis(EPOCH_MS + i * 1000),
        })
        .collect()
}

pub async fn run(settings: &Settings, rows: u64) -> anyhow::Result<DemoReport> {
    let cluster = MemoryCluster::new(settings.tablet_servers);
    let connector: Arc<dyn StoreConnector> = Arc::new(cluster.clone());
    let schema = settings.table_schema()?;
    let table_info = settings.table_info()?;

    let mapper = RowOperationMapper::upsert(schema.field_names());
    let mut sink: TabletSink<Row> = TabletSink::new(
        table_info,
        settings.writer_config()?,
        Arc::clone(&connector),
        Box::new(mapper),
        Box::new(LoggingFailureHandler::new()),
    );
    sink.open().await.context("opening sink")?;
    for n in 0..rows {
        sink.invoke(&sample_row(&schema, n)).await?;
    }
    sink.snapshot_state(1).await?;
    sink.close().await?;
    let rows_stored = cluster.row_count(&settings.table.name);
    info!("Stored {} of {} generated row(s)", rows_stored, rows);

    let source = Arc::new(TabletTableSource::new(
        settings.reader_config()?,
        TableInfo::for_table(settings.table.name.clone()),
        schema.clone(),
        settings.lookup_options()?,
    ));
    let splits = source.create_splits(connector.as_ref()).await?;
    let tasks = splits.into_iter().map(|split| {
        let source = Arc::clone(&source);
        let connector = Arc::clone(&connector);
        tokio::spawn(async move {
            let iter = source.open_split(connector.as_ref(), &split).await?;
            let rows: Vec<Row> = iter.into_stream().try_collect().await?;
            Ok::<_, tundra_common::Error>(SplitReport {
                index: split.index(),
                locations: split.locations().to_vec(),
                rows: rows.len(),
            })
        })
    });
    let splits = try_join_all(tasks)
        .await?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let key_names = primary_key_columns(&settings.properties(), &schema)?;
    let first = sample_row(&schema, 0);
    let lookup_key = key_names
        .iter()
        .map(|name| {
            schema
                .columns
                .iter()
                .position(|c| &c.name == name)
                .map(|i| first[i].clone())
                .ok_or_else(|| anyhow!("key column {} missing from schema", name))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut lookup = source.lookup_function(connector.as_ref(), key_names).await?;
    let lookup_rows = lookup.eval(&lookup_key).await;
    lookup.close().await;
    let lookup_rows = lookup_rows?;

    Ok(DemoReport { rows_stored, tablets: cluster.tablet_count(&settings.table.name), splits, lookup_key, lookup_rows })
}
