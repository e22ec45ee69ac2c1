use crate::config::ReaderConfig;
use crate::filter::FilterInfo;
use crate::handle::TableHandle;
use crate::table_info::TableInfo;
use async_stream::try_stream;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, warn};
use tundra_client::{ScanRequest, ScanToken, StoreClient, StoreConnector, StoreScanner, TableMeta};
use tundra_common::{Error, Result, Row, SchemaRef};

/// An independently schedulable unit of a scan: one serialized scan token
/// and the addresses of the replicas holding its tablet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    index: usize,
    token: Vec<u8>,
    locations: Vec<String>,
}

impl Split {
    pub fn new(index: usize, token: Vec<u8>, locations: Vec<String>) -> Self {
        Self { index, token, locations }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// `host:port` of every replica, used as locality hints.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Plans scans of one table into [`Split`]s.
pub struct ScanPlanner {
    handle: TableHandle,
    config: ReaderConfig,
}

impl ScanPlanner {
    pub async fn open(table_info: &TableInfo, config: ReaderConfig, connector: &dyn StoreConnector) -> Result<Self> {
        config.validate()?;
        let handle = TableHandle::open_for_read(connector, &config.masters, table_info).await?;
        Ok(Self { handle, config })
    }

    pub fn table(&self) -> &TableMeta {
        self.handle.table()
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Tokens for a scan with `filters` pushed down. An empty or absent
    /// projection reads every column. `row_limit` overrides the configured
    /// limit; 0 means unlimited.
    pub async fn scan_tokens(
        &self,
        filters: &[FilterInfo],
        projection: Option<&[String]>,
        row_limit: Option<u64>,
    ) -> Result<Vec<ScanToken>> {
        let table = self.handle.table();
        let predicates = filters.iter().map(|f| f.to_predicate(&table.schema)).collect::<Result<Vec<_>>>()?;
        let limit = match row_limit {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => self.config.effective_row_limit(),
        };
        let request = ScanRequest { projection: projection.map(|p| p.to_vec()).unwrap_or_default(), predicates, limit };
        debug!("Planning scan of {}: {:?}", table.name, request);
        self.handle.client().scan_tokens(table, &request).await
    }

    /// One split per token. `min_splits` is a hint: when the table has fewer
    /// tablets, fewer splits are returned.
    pub async fn build_splits(
        &self,
        filters: &[FilterInfo],
        projection: Option<&[String]>,
        row_limit: Option<u64>,
        min_splits: usize,
    ) -> Result<Vec<Split>> {
        let tokens = self.scan_tokens(filters, projection, row_limit).await?;
        let splits: Vec<Split> = tokens
            .into_iter()
            .enumerate()
            .map(|(index, token)| {
                let locations = token.tablet.replicas.iter().map(|r| r.address()).collect();
                Split::new(index, token.serialize(), locations)
            })
            .collect();
        if splits.len() < min_splits {
            warn!(
                "Table {} yields {} split(s), fewer than the {} requested",
                self.handle.table().name,
                splits.len(),
                min_splits
            );
        }
        Ok(splits)
    }

    /// Opens `split` on the planner's own connection.
    pub async fn scanner(&self, split: &Split) -> Result<ScanIterator> {
        ScanIterator::open(self.handle.client(), split).await
    }

    pub async fn close(&mut self) {
        self.handle.close().await;
    }
}

/// Row-at-a-time cursor over one split.
///
/// Reaching the end releases the underlying scanner, and the connection too
/// when the iterator opened its own.
pub struct ScanIterator {
    scanner: Option<Box<dyn StoreScanner>>,
    owned_client: Option<Arc<dyn StoreClient>>,
    schema: SchemaRef,
    buffer: VecDeque<Row>,
    split_index: usize,
}

impl ScanIterator {
    pub async fn open(client: Arc<dyn StoreClient>, split: &Split) -> Result<Self> {
        let scanner = client.open_scanner(split.token()).await?;
        Ok(Self::from_scanner(scanner, None, split.index()))
    }

    /// Opens `split` on a dedicated connection, as a worker that only
    /// received the split would.
    pub async fn connect(connector: &dyn StoreConnector, masters: &[String], split: &Split) -> Result<Self> {
        let client = connector.connect(masters).await?;
        match client.open_scanner(split.token()).await {
            Ok(scanner) => Ok(Self::from_scanner(scanner, Some(client), split.index())),
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    error!("Error while closing client: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn from_scanner(scanner: Box<dyn StoreScanner>, owned_client: Option<Arc<dyn StoreClient>>, split_index: usize) -> Self {
        let schema = scanner.projected_schema();
        Self { scanner: Some(scanner), owned_client, schema, buffer: VecDeque::new(), split_index }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn is_exhausted(&self) -> bool {
        self.scanner.is_none() && self.buffer.is_empty()
    }

    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            let scanner = match self.scanner.as_mut() {
                Some(scanner) => scanner,
                None => return Ok(None),
            };
            match scanner.next_batch().await? {
                Some(batch) => self.buffer.extend(batch),
                None => {
                    debug!("Split {} exhausted", self.split_index);
                    self.release().await?;
                    return Ok(None);
                }
            }
        }
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Result<Row>> + Send {
        try_stream! {
            while let Some(row) = self.next_row().await? {
                yield row;
            }
        }
    }

    /// Releases the cursor early.
    pub async fn close(mut self) -> Result<()> {
        self.buffer.clear();
        self.release().await
    }

    async fn release(&mut self) -> Result<()> {
        let scanned = match self.scanner.take() {
            Some(mut scanner) => scanner.close().await,
            None => Ok(()),
        };
        if let Some(client) = self.owned_client.take() {
            if let Err(e) = client.close().await {
                error!("Error while closing client: {}", e);
            }
        }
        scanned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tundra_client::{CreateTableOptions, FlushMode, MemoryCluster};
    use tundra_common::{ColumnSchema, DataType, Operation, PartialRow, Schema, Value};

    fn masters() -> Vec<String> {
        vec!["m:7051".to_string()]
    }

    async fn seeded(rows: i64, buckets: u32) -> MemoryCluster {
        let cluster = MemoryCluster::default();
        let client = cluster.connect(&masters()).await.unwrap();
        let schema = Schema::new(vec![
            ColumnSchema::new("id", DataType::Int64).key(true),
            ColumnSchema::new("name", DataType::String),
        ]);
        let mut options = CreateTableOptions::new();
        if buckets > 1 {
            options.add_hash_partitions(vec!["id".to_string()], buckets);
        }
        client.create_table("items", &schema, &options).await.unwrap();
        let mut session = client.new_session(FlushMode::AutoFlushSync).await.unwrap();
        for id in 0..rows {
            let row = PartialRow::new().with("id", id).with("name", format!("item-{}", id));
            session.apply(Operation::insert("items", row)).await.unwrap();
        }
        session.close().await.unwrap();
        client.close().await.unwrap();
        cluster
    }

    fn config() -> ReaderConfig {
        ReaderConfig::builder(masters()).build().unwrap()
    }

    #[tokio::test]
    async fn one_split_per_tablet() {
        let cluster = seeded(12, 4).await;
        let mut planner = ScanPlanner::open(&TableInfo::for_table("items"), config(), &cluster).await.unwrap();
        let splits = planner.build_splits(&[], None, None, 10).await.unwrap();
        assert_eq!(splits.len(), 4);
        assert_eq!(splits.iter().map(|s| s.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let mut total = 0;
        for split in splits.iter() {
            let mut rows = planner.scanner(split).await.unwrap();
            while rows.next_row().await.unwrap().is_some() {
                total += 1;
            }
            assert!(rows.is_exhausted());
        }
        assert_eq!(total, 12);
        assert_eq!(cluster.open_scanners(), 0);
        planner.close().await;
    }

    #[tokio::test]
    async fn filters_and_projection_are_pushed_down() {
        let cluster = seeded(10, 1).await;
        cluster.set_batch_size(2);
        let mut planner = ScanPlanner::open(&TableInfo::for_table("items"), config(), &cluster).await.unwrap();
        let filters = vec![FilterInfo::builder("id").greater_or_equal_to(6i64)];
        let projection = vec!["name".to_string()];
        let splits = planner.build_splits(&filters, Some(projection.as_slice()), None, 1).await.unwrap();
        let iter = planner.scanner(&splits[0]).await.unwrap();
        assert_eq!(iter.schema().column_names(), vec!["name".to_string()]);
        let rows: Vec<Row> = iter.into_stream().try_collect().await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![Value::from("item-6")]);
        planner.close().await;
    }

    #[tokio::test]
    async fn row_limit_caps_each_split() {
        let cluster = seeded(10, 1).await;
        let limited = ReaderConfig::builder(masters()).row_limit(3).build().unwrap();
        let mut planner = ScanPlanner::open(&TableInfo::for_table("items"), limited, &cluster).await.unwrap();
        let splits = planner.build_splits(&[], None, None, 1).await.unwrap();
        let rows: Vec<Row> = planner.scanner(&splits[0]).await.unwrap().into_stream().try_collect().await.unwrap();
        assert_eq!(rows.len(), 3);
        let splits = planner.build_splits(&[], None, Some(0), 1).await.unwrap();
        let rows: Vec<Row> = planner.scanner(&splits[0]).await.unwrap().into_stream().try_collect().await.unwrap();
        assert_eq!(rows.len(), 10);
        planner.close().await;
    }

    #[tokio::test]
    async fn early_close_releases_scanner() {
        let cluster = seeded(5, 1).await;
        cluster.set_batch_size(1);
        let mut planner = ScanPlanner::open(&TableInfo::for_table("items"), config(), &cluster).await.unwrap();
        let splits = planner.build_splits(&[], None, None, 1).await.unwrap();
        let mut iter = planner.scanner(&splits[0]).await.unwrap();
        assert!(iter.next_row().await.unwrap().is_some());
        assert_eq!(cluster.open_scanners(), 1);
        iter.close().await.unwrap();
        assert_eq!(cluster.open_scanners(), 0);
        planner.close().await;
    }
}
