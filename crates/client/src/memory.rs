//! In-process tablet cluster.
//!
//! Tables are split into tablets, one per hash bucket combination and range
//! partition, and every tablet is placed on `num_replicas` tablet servers in
//! round-robin order with the first replica as leader. Sessions honor the
//! three flush modes:
//!
//! * `AutoFlushSync` applies each operation immediately and returns the
//!   response.
//! * `AutoFlushBackground` sends the previously buffered operations when the
//!   next one arrives, so a row error becomes a pending error one call after
//!   the operation that caused it.
//! * `ManualFlush` holds everything until `flush`.
//!
//! The cluster also exposes fault hooks used by tests and the demo:
//! unreachable masters, forced row rejection, a concurrent creator racing
//! table creation and failing scanner opens.

use crate::partition::{CreateTableOptions, RangePartition, RangePartitionBound};
use crate::scan::{LocatedTablet, Replica, ReplicaRole, ScanRequest, ScanToken};
use crate::{FlushMode, OperationResponse, StoreClient, StoreConnector, StoreScanner, StoreSession, TableMeta};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info};
use tundra_common::{
    Error, Operation, OperationKind, PartialRow, Result, Row, RowError, RowErrorKind, Schema, SchemaRef, Value,
};
use uuid::Uuid;

const TABLET_SERVER_PORT: u16 = 7050;
const DEFAULT_BATCH_SIZE: usize = 1024;

/// Handle to a shared in-memory cluster. Clones observe the same state.
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

struct ClusterState {
    tablet_servers: Vec<(String, u16)>,
    batch_size: AtomicUsize,
    tables: DashMap<String, Arc<MemTable>>,
    reachable: AtomicBool,
    race_next_create: AtomicBool,
    rejections: DashMap<String, Vec<Value>>,
    failing_scans: AtomicUsize,
    open_clients: AtomicUsize,
    open_sessions: AtomicUsize,
    open_scanners: AtomicUsize,
    scanners_opened: AtomicUsize,
}

struct MemTable {
    meta: TableMeta,
    options: CreateTableOptions,
    tablets: Vec<LocatedTablet>,
    rows: DashMap<String, StoredRow>,
}

#[derive(Clone)]
struct StoredRow {
    tablet: usize,
    key: Vec<Value>,
    cells: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    table: String,
    table_id: String,
    tablet: usize,
    request: ScanRequest,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MemoryCluster {
    /// A reachable cluster with `num_tablet_servers` servers named
    /// `tserver-<n>`.
    pub fn new(num_tablet_servers: usize) -> Self {
        let tablet_servers = (0..num_tablet_servers.max(1))
            .map(|i| (format!("tserver-{}", i), TABLET_SERVER_PORT))
            .collect();
        Self {
            state: Arc::new(ClusterState {
                tablet_servers,
                batch_size: AtomicUsize::new(DEFAULT_BATCH_SIZE),
                tables: DashMap::new(),
                reachable: AtomicBool::new(true),
                race_next_create: AtomicBool::new(false),
                rejections: DashMap::new(),
                failing_scans: AtomicUsize::new(0),
                open_clients: AtomicUsize::new(0),
                open_sessions: AtomicUsize::new(0),
                open_scanners: AtomicUsize::new(0),
                scanners_opened: AtomicUsize::new(0),
            }),
        }
    }

    pub fn tablet_servers(&self) -> Vec<String> {
        self.state.tablet_servers.iter().map(|(h, p)| format!("{}:{}", h, p)).collect()
    }

    /// Rows handed out per scanner batch.
    pub fn set_batch_size(&self, batch_size: usize) {
        self.state.batch_size.store(batch_size.max(1), AtomicOrdering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, AtomicOrdering::SeqCst);
    }

    /// The next `create_table` loses a race: the table gets created by
    /// someone else and the caller sees `TableAlreadyExists`.
    pub fn race_next_create(&self) {
        self.state.race_next_create.store(true, AtomicOrdering::SeqCst);
    }

    /// Every operation binding `column` to `value` is rejected by the tablet
    /// server.
    pub fn reject_rows_where(&self, column: &str, value: impl Into<Value>) {
        self.state.rejections.entry(column.to_string()).or_default().push(value.into());
    }

    /// The next `count` scanner opens fail with a store error.
    pub fn fail_next_scans(&self, count: usize) {
        self.state.failing_scans.store(count, AtomicOrdering::SeqCst);
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn tablet_count(&self, table: &str) -> usize {
        self.state.tables.get(table).map(|t| t.tablets.len()).unwrap_or(0)
    }

    pub fn table_options(&self, table: &str) -> Option<CreateTableOptions> {
        self.state.tables.get(table).map(|t| t.options.clone())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Full rows of `table`, in primary key order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        match self.state.tables.get(table) {
            Some(t) => {
                let mut rows: Vec<StoredRow> = t.rows.iter().map(|e| e.value().clone()).collect();
                rows.sort_by(|a, b| compare_keys(&a.key, &b.key));
                rows.into_iter().map(|r| r.cells).collect()
            }
            None => Vec::new(),
        }
    }

    pub fn open_clients(&self) -> usize {
        self.state.open_clients.load(AtomicOrdering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(AtomicOrdering::SeqCst)
    }

    pub fn open_scanners(&self) -> usize {
        self.state.open_scanners.load(AtomicOrdering::SeqCst)
    }

    /// Scanners opened successfully since the cluster started.
    pub fn scanners_opened(&self) -> usize {
        self.state.scanners_opened.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryCluster {
    async fn connect(&self, masters: &[String]) -> Result<Arc<dyn StoreClient>> {
        if masters.is_empty() {
            return Err(Error::InvalidConfig("no master addresses given".to_string()));
        }
        if !self.state.reachable.load(AtomicOrdering::SeqCst) {
            return Err(Error::connection(masters, "no master responded"));
        }
        self.state.open_clients.fetch_add(1, AtomicOrdering::SeqCst);
        debug!("Connected to in-memory cluster via {}", masters.join(","));
        Ok(Arc::new(MemoryClient { cluster: Arc::clone(&self.state), closed: AtomicBool::new(false) }))
    }
}

struct MemoryClient {
    cluster: Arc<ClusterState>,
    closed: AtomicBool,
}

impl MemoryClient {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<Arc<MemTable>> {
        self.cluster
            .tables
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }
}

#[async_trait]
impl StoreClient for MemoryClient {
    async fn table_exists(&self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.cluster.tables.contains_key(name))
    }

    async fn open_table(&self, name: &str) -> Result<TableMeta> {
        self.ensure_open()?;
        Ok(self.table(name)?.meta.clone())
    }

    async fn create_table(&self, name: &str, schema: &Schema, options: &CreateTableOptions) -> Result<TableMeta> {
        self.ensure_open()?;
        let table = Arc::new(self.cluster.build_table(name, schema, options)?);
        let meta = table.meta.clone();
        match self.cluster.tables.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(Error::TableAlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(table);
            }
        }
        if self.cluster.race_next_create.swap(false, AtomicOrdering::SeqCst) {
            debug!("Table {} was created by a concurrent creator", name);
            return Err(Error::TableAlreadyExists(name.to_string()));
        }
        info!("Created table {} with {} tablet(s)", name, self.cluster.tables.get(name).map(|t| t.tablets.len()).unwrap_or(0));
        Ok(meta)
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.cluster
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    async fn new_session(&self, flush_mode: FlushMode) -> Result<Box<dyn StoreSession>> {
        self.ensure_open()?;
        self.cluster.open_sessions.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemorySession {
            cluster: Arc::clone(&self.cluster),
            flush_mode,
            buffer: Vec::new(),
            pending: Vec::new(),
            closed: false,
        }))
    }

    async fn scan_tokens(&self, table: &TableMeta, request: &ScanRequest) -> Result<Vec<ScanToken>> {
        self.ensure_open()?;
        let mem = self.table(&table.name)?;
        for column in request.projection.iter() {
            if mem.meta.schema.column(column).is_none() {
                return Err(Error::ColumnNotFound(column.clone()));
            }
        }
        for predicate in request.predicates.iter() {
            if mem.meta.schema.column(predicate.column()).is_none() {
                return Err(Error::ColumnNotFound(predicate.column().to_string()));
            }
        }
        mem.tablets
            .iter()
            .enumerate()
            .map(|(idx, tablet)| {
                let payload = TokenPayload {
                    table: mem.meta.name.clone(),
                    table_id: mem.meta.id.clone(),
                    tablet: idx,
                    request: request.clone(),
                };
                let payload = bincode::serialize(&payload).map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(ScanToken { tablet: tablet.clone(), payload })
            })
            .collect()
    }

    async fn open_scanner(&self, token: &[u8]) -> Result<Box<dyn StoreScanner>> {
        self.ensure_open()?;
        let failing = self
            .cluster
            .failing_scans
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::store("tablet server unavailable"));
        }
        let payload: TokenPayload =
            bincode::deserialize(token).map_err(|e| Error::Serialization(e.to_string()))?;
        let mem = self.table(&payload.table)?;
        if mem.meta.id != payload.table_id {
            return Err(Error::TableNotFound(payload.table));
        }

        let schema = &mem.meta.schema;
        let projected: SchemaRef = if payload.request.projection.is_empty() {
            Arc::clone(schema)
        } else {
            Arc::new(schema.project(&payload.request.projection)?)
        };
        let indices: Vec<usize> = projected
            .columns()
            .iter()
            .filter_map(|c| schema.column_index(&c.name))
            .collect();

        let mut matching: Vec<StoredRow> = mem
            .rows
            .iter()
            .filter(|e| e.value().tablet == payload.tablet)
            .filter(|e| payload.request.predicates.iter().all(|p| p.evaluate(schema, &e.value().cells)))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| compare_keys(&a.key, &b.key));
        let limit = payload.request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows: VecDeque<Row> = matching
            .into_iter()
            .take(limit)
            .map(|r| indices.iter().map(|&i| r.cells[i].clone()).collect())
            .collect();

        self.cluster.open_scanners.fetch_add(1, AtomicOrdering::SeqCst);
        self.cluster.scanners_opened.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemoryScanner {
            cluster: Arc::clone(&self.cluster),
            projected,
            rows,
            batch_size: self.cluster.batch_size.load(AtomicOrdering::SeqCst),
            closed: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, AtomicOrdering::SeqCst) {
            self.cluster.open_clients.fetch_sub(1, AtomicOrdering::SeqCst);
        }
        Ok(())
    }
}

struct MemorySession {
    cluster: Arc<ClusterState>,
    flush_mode: FlushMode,
    buffer: Vec<Operation>,
    pending: Vec<RowError>,
    closed: bool,
}

impl MemorySession {
    fn send_buffered(&mut self) {
        for operation in std::mem::take(&mut self.buffer) {
            if let Some(err) = self.cluster.execute(operation) {
                self.pending.push(err);
            }
        }
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cluster.open_sessions.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    async fn apply(&mut self, operation: Operation) -> Result<Option<OperationResponse>> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.flush_mode {
            FlushMode::AutoFlushSync => {
                let row_error = self.cluster.execute(operation);
                Ok(Some(OperationResponse { row_error }))
            }
            FlushMode::AutoFlushBackground => {
                self.send_buffered();
                self.buffer.push(operation);
                Ok(None)
            }
            FlushMode::ManualFlush => {
                self.buffer.push(operation);
                Ok(None)
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.send_buffered();
        Ok(())
    }

    fn count_pending_errors(&self) -> usize {
        self.pending.len()
    }

    fn take_pending_errors(&mut self) -> Vec<RowError> {
        std::mem::take(&mut self.pending)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.send_buffered();
            self.release();
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

struct MemoryScanner {
    cluster: Arc<ClusterState>,
    projected: SchemaRef,
    rows: VecDeque<Row>,
    batch_size: usize,
    closed: bool,
}

impl MemoryScanner {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cluster.open_scanners.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

#[async_trait]
impl StoreScanner for MemoryScanner {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = self.batch_size.min(self.rows.len());
        Ok(Some(self.rows.drain(..take).collect()))
    }

    fn projected_schema(&self) -> SchemaRef {
        Arc::clone(&self.projected)
    }

    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryScanner {
    fn drop(&mut self) {
        self.release();
    }
}

impl ClusterState {
    fn build_table(&self, name: &str, schema: &Schema, options: &CreateTableOptions) -> Result<MemTable> {
        let key_names = schema.primary_key_names();
        if key_names.is_empty() {
            return Err(Error::store(format!("table {} must have a primary key", name)));
        }
        let replicas = options.num_replicas() as usize;
        if replicas == 0 || replicas > self.tablet_servers.len() {
            return Err(Error::store(format!(
                "cannot place {} replica(s) on {} tablet server(s)",
                replicas,
                self.tablet_servers.len()
            )));
        }
        for hash in options.hash_partitions() {
            if hash.buckets < 2 {
                return Err(Error::store(format!("hash partition needs at least 2 buckets, got {}", hash.buckets)));
            }
            for column in hash.columns.iter() {
                if !key_names.contains(column) {
                    return Err(Error::store(format!("hash column {} is not a primary key column", column)));
                }
            }
        }
        for column in options.range_partition_columns() {
            if !key_names.contains(column) {
                return Err(Error::store(format!("range column {} is not a primary key column", column)));
            }
        }
        for range in options.range_partitions() {
            for (column, value) in range.lower.iter().chain(range.upper.iter()) {
                if !options.range_partition_columns().iter().any(|c| c == column) {
                    return Err(Error::store(format!("range bound sets non-range column {}", column)));
                }
                let data_type = schema.column(column).map(|c| c.data_type);
                if value.is_null() || !data_type.map(|t| value.matches(&t)).unwrap_or(false) {
                    return Err(Error::store(format!("range bound {} is not valid for column {}", value, column)));
                }
            }
        }
        check_ranges_disjoint(options.range_partition_columns(), options.range_partitions())?;

        let hash_tablets: usize = options.hash_partitions().iter().map(|h| h.buckets as usize).product();
        let range_tablets = options.range_partitions().len().max(1);
        let servers = self.tablet_servers.len();
        let tablets = (0..hash_tablets * range_tablets)
            .map(|t| LocatedTablet {
                tablet_id: Uuid::new_v4().simple().to_string(),
                replicas: (0..replicas)
                    .map(|r| {
                        let (host, port) = &self.tablet_servers[(t + r) % servers];
                        Replica {
                            host: host.clone(),
                            port: *port,
                            role: if r == 0 { ReplicaRole::Leader } else { ReplicaRole::Follower },
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(MemTable {
            meta: TableMeta {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                schema: Arc::new(schema.clone()),
                num_replicas: options.num_replicas(),
            },
            options: options.clone(),
            tablets,
            rows: DashMap::new(),
        })
    }

    fn rejected(&self, operation: &Operation) -> bool {
        operation.row().iter().any(|(column, value)| {
            self.rejections
                .get(column)
                .map(|values| values.iter().any(|v| v == value))
                .unwrap_or(false)
        })
    }

    /// Applies one operation, returning the row error the tablet server
    /// would report.
    fn execute(&self, operation: Operation) -> Option<RowError> {
        let table = match self.tables.get(operation.table()) {
            Some(t) => Arc::clone(t.value()),
            None => {
                let msg = format!("table {} not found", operation.table());
                return Some(RowError::new(operation, RowErrorKind::NotFound, msg));
            }
        };
        if self.rejected(&operation) {
            return Some(RowError::new(operation, RowErrorKind::InvalidArgument, "row rejected by tablet server"));
        }
        match table.apply(&operation) {
            Ok(()) => None,
            Err((kind, message)) => Some(RowError::new(operation, kind, message)),
        }
    }
}

impl MemTable {
    fn apply(&self, operation: &Operation) -> std::result::Result<(), (RowErrorKind, String)> {
        let schema = &self.meta.schema;
        let row = operation.row();
        for (name, value) in row.iter() {
            let column = schema
                .column(name)
                .ok_or_else(|| (RowErrorKind::InvalidArgument, format!("unknown column {}", name)))?;
            if !value.matches(&column.data_type) {
                return Err((
                    RowErrorKind::InvalidArgument,
                    format!("value {} does not fit column {} of type {}", value, name, column.data_type),
                ));
            }
            if value.is_null() && !column.nullable {
                return Err((RowErrorKind::InvalidArgument, format!("column {} is not nullable", name)));
            }
        }

        let mut key = Vec::new();
        for column in schema.primary_key() {
            match row.get(&column.name) {
                Some(v) if !v.is_null() => key.push(v.clone()),
                _ => {
                    return Err((RowErrorKind::InvalidArgument, format!("primary key column {} is not set", column.name)))
                }
            }
        }
        let key_string = encode_key(&key);

        let build_cells = |existing: Option<&Vec<Value>>| -> Vec<Value> {
            schema
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| match row.get(&column.name) {
                    Some(v) => v.clone(),
                    None => existing.map(|cells| cells[idx].clone()).unwrap_or(Value::Null),
                })
                .collect()
        };
        let check_required = || -> std::result::Result<(), (RowErrorKind, String)> {
            match schema.columns().iter().find(|c| !c.nullable && !row.is_set(&c.name)) {
                Some(c) => Err((RowErrorKind::InvalidArgument, format!("column {} must be set", c.name))),
                None => Ok(()),
            }
        };

        match operation.kind() {
            OperationKind::Delete => self
                .rows
                .remove(&key_string)
                .map(|_| ())
                .ok_or((RowErrorKind::NotFound, "key not found".to_string())),
            OperationKind::Update => match self.rows.get_mut(&key_string) {
                Some(mut stored) => {
                    let cells = build_cells(Some(&stored.cells));
                    stored.cells = cells;
                    Ok(())
                }
                None => Err((RowErrorKind::NotFound, "key not found".to_string())),
            },
            OperationKind::Insert => {
                check_required()?;
                let tablet = self.locate(row)?;
                match self.rows.entry(key_string) {
                    Entry::Occupied(_) => Err((RowErrorKind::AlreadyPresent, "key already present".to_string())),
                    Entry::Vacant(slot) => {
                        slot.insert(StoredRow { tablet, key, cells: build_cells(None) });
                        Ok(())
                    }
                }
            }
            OperationKind::Upsert => {
                let tablet = self.locate(row)?;
                match self.rows.entry(key_string) {
                    Entry::Occupied(mut slot) => {
                        let cells = build_cells(Some(&slot.get().cells));
                        slot.get_mut().cells = cells;
                        Ok(())
                    }
                    Entry::Vacant(slot) => {
                        check_required()?;
                        slot.insert(StoredRow { tablet, key, cells: build_cells(None) });
                        Ok(())
                    }
                }
            }
        }
    }

    fn locate(&self, row: &PartialRow) -> std::result::Result<usize, (RowErrorKind, String)> {
        let mut hash_index = 0usize;
        for hash in self.options.hash_partitions() {
            let mut hasher = DefaultHasher::new();
            for column in hash.columns.iter() {
                format!("{:?}", row.get(column)).hash(&mut hasher);
            }
            let bucket = (hasher.finish() % hash.buckets as u64) as usize;
            hash_index = hash_index * hash.buckets as usize + bucket;
        }

        let ranges = self.options.range_partitions();
        if ranges.is_empty() {
            return Ok(hash_index);
        }
        let columns = self.options.range_partition_columns();
        match ranges.iter().position(|range| range_contains(columns, range, row)) {
            Some(range_index) => Ok(hash_index * ranges.len() + range_index),
            None => Err((RowErrorKind::NoTabletCovering, "no tablet covers the row's range key".to_string())),
        }
    }
}

// Compares the row against a bound in range column order. A column the
// bound leaves unset is the column's minimum. `None` means the values are
// not comparable.
fn compare_to_bound(columns: &[String], bound: &PartialRow, row: &PartialRow) -> Option<Ordering> {
    for column in columns {
        let row_value = row.get(column)?;
        let bound_value = match bound.get(column) {
            Some(value) => value,
            None => return Some(Ordering::Greater),
        };
        let ordering = row_value.compare(bound_value)?;
        if ordering != Ordering::Equal {
            return Some(ordering);
        }
    }
    Some(Ordering::Equal)
}

enum Edge<'a> {
    Min,
    Max,
    Key(&'a PartialRow),
}

impl<'a> Edge<'a> {
    fn lower(range: &'a RangePartition) -> Self {
        if range.lower.is_empty() {
            Edge::Min
        } else {
            Edge::Key(&range.lower)
        }
    }

    fn upper(range: &'a RangePartition) -> Self {
        if range.upper.is_empty() {
            Edge::Max
        } else {
            Edge::Key(&range.upper)
        }
    }
}

fn compare_edges(columns: &[String], a: &Edge, b: &Edge) -> Ordering {
    match (a, b) {
        (Edge::Min, Edge::Min) | (Edge::Max, Edge::Max) => Ordering::Equal,
        (Edge::Min, _) | (_, Edge::Max) => Ordering::Less,
        (Edge::Max, _) | (_, Edge::Min) => Ordering::Greater,
        (Edge::Key(x), Edge::Key(y)) => columns
            .iter()
            .map(|column| match (x.get(column), y.get(column)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
    }
}

// True when some key lies at or above `lower` and below `upper` of the
// given ranges.
fn starts_before_end(columns: &[String], lower_of: &RangePartition, upper_of: &RangePartition) -> bool {
    match compare_edges(columns, &Edge::lower(lower_of), &Edge::upper(upper_of)) {
        Ordering::Less => true,
        Ordering::Equal => {
            lower_of.lower_bound == RangePartitionBound::Inclusive
                && upper_of.upper_bound == RangePartitionBound::Inclusive
        }
        Ordering::Greater => false,
    }
}

fn check_ranges_disjoint(columns: &[String], ranges: &[RangePartition]) -> Result<()> {
    for (i, range) in ranges.iter().enumerate() {
        if !starts_before_end(columns, range, range) {
            return Err(Error::store(format!("range partition #{} is empty", i)));
        }
        for (j, other) in ranges.iter().enumerate().skip(i + 1) {
            if starts_before_end(columns, range, other) && starts_before_end(columns, other, range) {
                return Err(Error::store(format!("range partitions #{} and #{} overlap", i, j)));
            }
        }
    }
    Ok(())
}

fn range_contains(columns: &[String], range: &RangePartition, row: &PartialRow) -> bool {
    let above_lower = range.lower.is_empty()
        || match compare_to_bound(columns, &range.lower, row) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => range.lower_bound == RangePartitionBound::Inclusive,
            _ => false,
        };
    let below_upper = range.upper.is_empty()
        || match compare_to_bound(columns, &range.upper, row) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => range.upper_bound == RangePartitionBound::Inclusive,
            _ => false,
        };
    above_lower && below_upper
}

fn encode_key(key: &[Value]) -> String {
    key.iter().map(|v| format!("{:?}", v)).collect::<Vec<_>>().join("\u{1}")
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.compare(y).unwrap_or(Ordering::Equal))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
