use crate::config::WriterConfig;
use crate::failure::FailureHandler;
use crate::handle::TableHandle;
use crate::mapper::OperationMapper;
use crate::table_info::TableInfo;
use tokio::time::timeout;
use tracing::{debug, error, info};
use tundra_client::{OperationResponse, StoreConnector, TableMeta};
use tundra_common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Closing,
    Closed,
}

/// Applies mapped records to one table through a single mutation session.
///
/// Row errors are handed to the [`FailureHandler`] as soon as the session
/// reports them. In `AutoFlushSync` mode that is the `write` that produced
/// the error. In the buffered modes the store reports a rejected row only
/// after the batch holding it was sent, so the error surfaces on the next
/// `write`, or at the latest on `flush_and_verify` or `close`. The lag is at
/// most one call.
pub struct WriteEngine<T> {
    handle: TableHandle,
    config: WriterConfig,
    mapper: Box<dyn OperationMapper<T>>,
    failure_handler: Box<dyn FailureHandler>,
    state: WriterState,
}

impl<T: Send + Sync> WriteEngine<T> {
    /// Connects and resolves the table, creating it when `table_info` asks
    /// for it.
    pub async fn open(
        table_info: &TableInfo,
        config: WriterConfig,
        connector: &dyn StoreConnector,
        mapper: Box<dyn OperationMapper<T>>,
        failure_handler: Box<dyn FailureHandler>,
    ) -> Result<Self> {
        config.validate()?;
        let opening = TableHandle::open(connector, &config.masters, table_info, config.flush_mode);
        let handle = timeout(config.admin_timeout(), opening)
            .await
            .map_err(|_| Error::store(format!("opening table {} timed out", table_info.name())))??;
        info!(
            "Opened writer for table {} with flush mode {}",
            handle.table().name,
            config.flush_mode
        );
        Ok(Self { handle, config, mapper, failure_handler, state: WriterState::Open })
    }

    pub fn table(&self) -> &TableMeta {
        self.handle.table()
    }

    pub fn is_closed(&self) -> bool {
        self.state != WriterState::Open
    }

    /// Maps `input` and applies the resulting operations in order.
    pub async fn write(&mut self, input: &T) -> Result<()> {
        self.ensure_open()?;
        self.check_async_errors()?;

        let operations = match self.mapper.create_operations(input, self.handle.table()) {
            Ok(operations) => operations,
            Err(e @ Error::TypeMismatch(_)) => return self.failure_handler.on_type_mismatch(e),
            Err(e) => return Err(e),
        };
        for operation in operations {
            let response = self.handle.session_mut()?.apply(operation).await?;
            self.check_response(response)?;
        }
        Ok(())
    }

    /// Sends everything buffered and fails if any operation so far was
    /// rejected and the failure handler did not absorb it.
    pub async fn flush_and_verify(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_inner().await
    }

    /// Flushes, then releases the session and the connection. Release always
    /// happens; the flush outcome is returned. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state != WriterState::Open {
            return Ok(());
        }
        self.state = WriterState::Closing;
        let flushed = self.flush_inner().await;
        if let Err(e) = &flushed {
            error!("Final flush of table {} failed: {}", self.handle.table().name, e);
        }
        self.handle.close().await;
        self.state = WriterState::Closed;
        debug!("Closed writer for table {}", self.handle.table().name);
        flushed
    }

    async fn flush_inner(&mut self) -> Result<()> {
        self.check_async_errors()?;
        let operation_timeout = self.config.operation_timeout();
        let session = self.handle.session_mut()?;
        timeout(operation_timeout, session.flush())
            .await
            .map_err(|_| Error::store(format!("flush timed out after {:?}", operation_timeout)))??;
        self.check_async_errors()
    }

    fn check_response(&mut self, response: Option<OperationResponse>) -> Result<()> {
        match response.and_then(|r| r.row_error) {
            Some(row_error) => self.failure_handler.on_failure(vec![row_error]),
            None => self.check_async_errors(),
        }
    }

    fn check_async_errors(&mut self) -> Result<()> {
        let session = self.handle.session_mut()?;
        if session.count_pending_errors() == 0 {
            return Ok(());
        }
        let errors = session.take_pending_errors();
        debug!("Session of table {} reported {} row error(s)", self.handle.table().name, errors.len());
        self.failure_handler.on_failure(errors)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closing | WriterState::Closed => Err(Error::Closed),
        }
    }
}
