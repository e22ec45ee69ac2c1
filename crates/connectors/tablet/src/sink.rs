use crate::config::WriterConfig;
use crate::failure::FailureHandler;
use crate::mapper::OperationMapper;
use crate::table_info::TableInfo;
use crate::writer::WriteEngine;
use std::sync::Arc;
use tracing::{debug, info};
use tundra_client::StoreConnector;
use tundra_common::{Error, Result};

/// Sink lifecycle around a [`WriteEngine`]: configured up front, connected
/// on `open`, flushed on every checkpoint.
pub struct TabletSink<T> {
    table_info: TableInfo,
    config: WriterConfig,
    connector: Arc<dyn StoreConnector>,
    pending: Option<(Box<dyn OperationMapper<T>>, Box<dyn FailureHandler>)>,
    writer: Option<WriteEngine<T>>,
}

impl<T: Send + Sync> TabletSink<T> {
    pub fn new(
        table_info: TableInfo,
        config: WriterConfig,
        connector: Arc<dyn StoreConnector>,
        mapper: Box<dyn OperationMapper<T>>,
        failure_handler: Box<dyn FailureHandler>,
    ) -> Self {
        Self { table_info, config, connector, pending: Some((mapper, failure_handler)), writer: None }
    }

    pub async fn open(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let (mapper, handler) = self.pending.take().ok_or(Error::Closed)?;
        let writer =
            WriteEngine::open(&self.table_info, self.config.clone(), self.connector.as_ref(), mapper, handler).await?;
        self.writer = Some(writer);
        Ok(())
    }

    pub async fn invoke(&mut self, input: &T) -> Result<()> {
        self.writer_mut()?.write(input).await
    }

    /// Everything written before the checkpoint is flushed and verified
    /// before it completes.
    pub async fn snapshot_state(&mut self, checkpoint_id: u64) -> Result<()> {
        debug!("Flushing table {} for checkpoint {}", self.table_info.name(), checkpoint_id);
        self.writer_mut()?.flush_and_verify().await
    }

    pub async fn close(&mut self) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => {
                let result = writer.close().await;
                info!("Closed sink for table {}", self.table_info.name());
                result
            }
            None => {
                self.pending = None;
                Ok(())
            }
        }
    }

    fn writer_mut(&mut self) -> Result<&mut WriteEngine<T>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None if self.pending.is_some() => Err(Error::NotOpen),
            None => Err(Error::Closed),
        }
    }
}
