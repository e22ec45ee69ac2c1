//! Client crate
//!
//! The table store as seen by the connector: a connection to the masters,
//! mutation sessions, table metadata, scan tokens and scanners. The traits
//! here are the whole surface the connector relies on; `memory` provides an
//! in-process tablet cluster that implements them.

pub mod memory;
pub mod partition;
pub mod scan;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tundra_common::{Error, Operation, Result, Row, RowError, Schema, SchemaRef};

pub use memory::MemoryCluster;
pub use partition::{CreateTableOptions, HashPartition, RangePartition, RangePartitionBound};
pub use scan::{ComparisonOp, LocatedTablet, Predicate, Replica, ReplicaRole, ScanRequest, ScanToken};

/// When a session acknowledges applied operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlushMode {
    /// Every `apply` is sent and acknowledged before it returns.
    AutoFlushSync,
    /// Operations are sent in the background; row errors are collected as
    /// pending errors on the session.
    #[default]
    AutoFlushBackground,
    /// Operations are buffered until `flush` is called.
    ManualFlush,
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushMode::AutoFlushSync => "AUTO_FLUSH_SYNC",
            FlushMode::AutoFlushBackground => "AUTO_FLUSH_BACKGROUND",
            FlushMode::ManualFlush => "MANUAL_FLUSH",
        };
        f.write_str(name)
    }
}

impl FromStr for FlushMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "AUTO_FLUSH_SYNC" => Ok(FlushMode::AutoFlushSync),
            "AUTO_FLUSH_BACKGROUND" => Ok(FlushMode::AutoFlushBackground),
            "MANUAL_FLUSH" => Ok(FlushMode::ManualFlush),
            other => Err(Error::InvalidConfig(format!("unknown flush mode '{}'", other))),
        }
    }
}

/// Metadata of an opened table.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub id: String,
    pub name: String,
    pub schema: SchemaRef,
    pub num_replicas: u32,
}

/// Synchronous acknowledgement of one applied operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationResponse {
    pub row_error: Option<RowError>,
}

impl OperationResponse {
    pub fn ok() -> Self {
        Self { row_error: None }
    }

    pub fn has_row_error(&self) -> bool {
        self.row_error.is_some()
    }
}

/// Entry point to a store deployment.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connects to the masters. Fails with `ConnectionFailure` when none of
    /// them can be reached.
    async fn connect(&self, masters: &[String]) -> Result<Arc<dyn StoreClient>>;
}

#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn table_exists(&self, name: &str) -> Result<bool>;

    async fn open_table(&self, name: &str) -> Result<TableMeta>;

    /// Fails with `TableAlreadyExists` if another creator got there first.
    async fn create_table(&self, name: &str, schema: &Schema, options: &CreateTableOptions) -> Result<TableMeta>;

    async fn delete_table(&self, name: &str) -> Result<()>;

    async fn new_session(&self, flush_mode: FlushMode) -> Result<Box<dyn StoreSession>>;

    /// One token per tablet the request may touch.
    async fn scan_tokens(&self, table: &TableMeta, request: &ScanRequest) -> Result<Vec<ScanToken>>;

    /// Rebuilds a scanner from serialized token bytes.
    async fn open_scanner(&self, token: &[u8]) -> Result<Box<dyn StoreScanner>>;

    async fn close(&self) -> Result<()>;
}

/// A mutation session. Not shared between writers.
#[async_trait]
pub trait StoreSession: Send + Sync {
    fn flush_mode(&self) -> FlushMode;

    /// Returns the acknowledgement when the session is synchronous, `None`
    /// when the operation was buffered.
    async fn apply(&mut self, operation: Operation) -> Result<Option<OperationResponse>>;

    async fn flush(&mut self) -> Result<()>;

    fn count_pending_errors(&self) -> usize;

    /// Drains the row errors collected from asynchronous flushes.
    fn take_pending_errors(&mut self) -> Vec<RowError>;

    async fn close(&mut self) -> Result<()>;
}

/// Forward-only cursor over one scan token.
#[async_trait]
pub trait StoreScanner: Send {
    /// Next batch of projected rows, `None` once exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;

    fn projected_schema(&self) -> SchemaRef;

    async fn close(&mut self) -> Result<()>;
}
