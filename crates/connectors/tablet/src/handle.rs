use crate::table_info::TableInfo;
use std::sync::Arc;
use tracing::{debug, error, info};
use tundra_client::{FlushMode, StoreClient, StoreConnector, StoreSession, TableMeta};
use tundra_common::{Error, Result};

/// A connection, an optional mutation session and one resolved table.
pub struct TableHandle {
    client: Arc<dyn StoreClient>,
    session: Option<Box<dyn StoreSession>>,
    table: TableMeta,
    closed: bool,
}

impl TableHandle {
    /// Connects, opens a session with `flush_mode` and resolves the table.
    pub async fn open(
        connector: &dyn StoreConnector,
        masters: &[String],
        table_info: &TableInfo,
        flush_mode: FlushMode,
    ) -> Result<Self> {
        let client = connector.connect(masters).await?;
        let session = match client.new_session(flush_mode).await {
            Ok(session) => session,
            Err(e) => {
                close_client(client.as_ref()).await;
                return Err(e);
            }
        };
        Self::finish_open(client, Some(session), table_info).await
    }

    /// Connects and resolves the table without a mutation session.
    pub async fn open_for_read(connector: &dyn StoreConnector, masters: &[String], table_info: &TableInfo) -> Result<Self> {
        let client = connector.connect(masters).await?;
        Self::finish_open(client, None, table_info).await
    }

    async fn finish_open(
        client: Arc<dyn StoreClient>,
        session: Option<Box<dyn StoreSession>>,
        table_info: &TableInfo,
    ) -> Result<Self> {
        match Self::resolve(client.as_ref(), table_info).await {
            Ok(table) => Ok(Self { client, session, table, closed: false }),
            Err(e) => {
                if let Some(mut session) = session {
                    if let Err(close_err) = session.close().await {
                        error!("Error while closing session: {}", close_err);
                    }
                }
                close_client(client.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Opens the table, creating it first when it is missing and creation
    /// was requested. Losing a creation race to another creator counts as
    /// success.
    pub async fn resolve(client: &dyn StoreClient, table_info: &TableInfo) -> Result<TableMeta> {
        let name = table_info.name();
        if client.table_exists(name).await? {
            return client.open_table(name).await;
        }
        let (schema, options) = match (table_info.schema(), table_info.create_table_options()) {
            (Some(schema), Some(options)) => (schema?, options?),
            _ => return Err(Error::TableNotFound(name.to_string())),
        };
        match client.create_table(name, &schema, &options).await {
            Ok(table) => {
                info!("Created table {} ({} replica(s))", name, options.num_replicas());
                Ok(table)
            }
            Err(Error::TableAlreadyExists(_)) => {
                debug!("Table {} was created concurrently, opening it", name);
                client.open_table(name).await
            }
            Err(e) => Err(e),
        }
    }

    pub fn table(&self) -> &TableMeta {
        &self.table
    }

    pub fn client(&self) -> Arc<dyn StoreClient> {
        Arc::clone(&self.client)
    }

    pub fn session_mut(&mut self) -> Result<&mut dyn StoreSession> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(Error::NotOpen),
        }
    }

    pub async fn delete_table(&self) -> Result<()> {
        self.client.delete_table(&self.table.name).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the session, then the connection. Failures are logged, never
    /// returned.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.close().await {
                error!("Error while closing session of table {}: {}", self.table.name, e);
            }
        }
        close_client(self.client.as_ref()).await;
    }
}

async fn close_client(client: &dyn StoreClient) {
    if let Err(e) = client.close().await {
        error!("Error while closing client: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tundra_client::{CreateTableOptions, MemoryCluster};
    use tundra_common::{ColumnSchema, DataType, Schema};

    fn masters() -> Vec<String> {
        vec!["master-0:7051".to_string()]
    }

    fn creatable(name: &str) -> TableInfo {
        TableInfo::for_table(name).create_table_if_not_exists(
            || Ok(Schema::new(vec![ColumnSchema::new("id", DataType::Int64).key(true)])),
            || Ok(CreateTableOptions::new()),
        )
    }

    #[tokio::test]
    async fn missing_table_without_creation_fails_and_releases() {
        let cluster = MemoryCluster::default();
        let err = TableHandle::open(&cluster, &masters(), &TableInfo::for_table("nope"), FlushMode::AutoFlushSync)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::TableNotFound(name) if name == "nope"));
        assert_eq!(cluster.open_clients(), 0);
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[tokio::test]
    async fn creates_then_reuses_existing_table() {
        let cluster = MemoryCluster::default();
        let mut first = TableHandle::open(&cluster, &masters(), &creatable("events"), FlushMode::AutoFlushSync)
            .await
            .unwrap();
        let mut second = TableHandle::open_for_read(&cluster, &masters(), &TableInfo::for_table("events"))
            .await
            .unwrap();
        assert_eq!(first.table().id, second.table().id);
        assert!(matches!(second.session_mut(), Err(Error::NotOpen)));
        first.close().await;
        second.close().await;
        assert_eq!(cluster.open_clients(), 0);
        assert!(matches!(first.session_mut(), Err(Error::Closed)));
    }

    #[tokio::test]
    async fn creation_race_is_success() {
        let cluster = MemoryCluster::default();
        cluster.race_next_create();
        let mut handle = TableHandle::open(&cluster, &masters(), &creatable("events"), FlushMode::AutoFlushSync)
            .await
            .unwrap();
        assert_eq!(handle.table().name, "events");
        handle.close().await;
    }

    #[tokio::test]
    async fn unreachable_masters_surface_connection_failure() {
        let cluster = MemoryCluster::default();
        cluster.set_reachable(false);
        let err = TableHandle::open(&cluster, &masters(), &creatable("events"), FlushMode::AutoFlushSync)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ConnectionFailure { .. }));
    }
}
