pub mod config;

use crate::core::{Document, DocumentId, Filter, StoreError, StoreResult, UpdateOutcome};
use crate::storage::{DocumentStore, FileStore, MemoryStore};
use config::{StoreConfig, StoreUri};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Store connection handle
///
/// Every call is bounded by the configured operation timeout. A connection
/// that is dropped without [`Connection::close`] is closed by `Drop`, which
/// also discards any open transaction.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Redacted URI, safe to print
    target: String,
    store: Arc<dyn DocumentStore>,
    operation_timeout: Option<Duration>,
    state: ConnectionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

/// Open a connection described by `config`.
///
/// Fails fast: a missing URI, an unsupported scheme, an unreachable store
/// and an elapsed connect timeout are all reported without retrying.
pub async fn connect(config: &StoreConfig) -> StoreResult<Connection> {
    config.validate().map_err(StoreError::Connection)?;
    let location = config.location()?;
    let target = config.redacted_uri();

    let open = async {
        let store: Arc<dyn DocumentStore> = match &location {
            StoreUri::Memory { name } => MemoryStore::named(name),
            StoreUri::File { path } => {
                let path = path.clone();
                let store = tokio::task::spawn_blocking(move || FileStore::open(path))
                    .await
                    .map_err(|e| StoreError::Connection(format!("store open panicked: {}", e)))??;
                Arc::new(store)
            }
        };
        store.ping().await?;
        Ok::<_, StoreError>(store)
    };

    let store = tokio::time::timeout(config.connect_timeout, open)
        .await
        .map_err(|_| StoreError::Timeout {
            operation: "connect",
            timeout: config.connect_timeout,
        })?
        .map_err(|e| match e {
            StoreError::Connection(_) | StoreError::UnsupportedScheme(_) => e,
            other => StoreError::Connection(other.to_string()),
        })?;

    let connection = Connection::new(store, target, config.operation_timeout);
    info!(id = connection.id, target = %connection.target, kind = connection.store.kind(), "connected");
    Ok(connection)
}

impl Connection {
    /// Wrap an already opened store
    pub fn new(
        store: Arc<dyn DocumentStore>,
        target: impl Into<String>,
        operation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            target: target.into(),
            store,
            operation_timeout,
            state: ConnectionState::Active,
        }
    }

    /// Redacted URI of the store
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    pub fn supports_transactions(&self) -> bool {
        self.store.supports_transactions()
    }

    /// Check if connection is in a transaction
    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    /// Check if connection is active
    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        self.ensure_open()?;
        match self.operation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| StoreError::Timeout { operation, timeout })?,
            None => call.await,
        }
    }

    pub async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        debug!(collection, %filter, "find");
        self.guarded("find", self.store.find(collection, filter)).await
    }

    pub async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        debug!(collection, %filter, "count");
        self.guarded("count", self.store.count(collection, filter)).await
    }

    pub async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId> {
        debug!(collection, "insert_one");
        self.guarded("insert_one", self.store.insert_one(collection, document)).await
    }

    pub async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<UpdateOutcome> {
        debug!(collection, %filter, field, "set_field");
        self.guarded("set_field", self.store.set_field(collection, filter, field, value))
            .await
    }

    pub async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        debug!(collection, %filter, "delete_many");
        self.guarded("delete_many", self.store.delete_many(collection, filter)).await
    }

    /// Begin a multi-document transaction
    pub async fn begin(&mut self) -> StoreResult<()> {
        if self.state == ConnectionState::InTransaction {
            return Err(StoreError::Transaction("Transaction already active".into()));
        }
        self.guarded("begin", self.store.begin_transaction()).await?;
        self.state = ConnectionState::InTransaction;
        Ok(())
    }

    /// Commit the current transaction
    pub async fn commit(&mut self) -> StoreResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(StoreError::Transaction("No active transaction".into()));
        }
        let result = self.guarded("commit", self.store.commit_transaction()).await;
        if result.is_err() {
            self.store.discard_transaction();
        }
        self.state = ConnectionState::Active;
        result
    }

    /// Rollback the current transaction
    pub async fn rollback(&mut self) -> StoreResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(StoreError::Transaction("No active transaction".into()));
        }
        let result = self.guarded("rollback", self.store.abort_transaction()).await;
        if result.is_err() {
            self.store.discard_transaction();
        }
        self.state = ConnectionState::Active;
        result
    }

    /// Close the connection, rolling back an open transaction
    pub async fn close(&mut self) -> StoreResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        if self.state == ConnectionState::InTransaction {
            warn!(id = self.id, "closing connection with an open transaction; rolling back");
            if let Err(e) = self.rollback().await {
                warn!(id = self.id, error = %e, "rollback during close failed");
            }
        }
        let result = self.guarded("close", self.store.close()).await;
        self.state = ConnectionState::Closed;
        debug!(id = self.id, "connection closed");
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state == ConnectionState::InTransaction {
            warn!(id = self.id, "connection dropped with an open transaction; discarding it");
            self.store.discard_transaction();
        }
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn memory_config(tag: &str) -> StoreConfig {
        StoreConfig::new(&format!("memory://{}-{}", tag, DocumentId::generate()))
    }

    /// Store whose calls never complete.
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        fn kind(&self) -> &'static str {
            "stalled"
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
        async fn find(&self, _: &str, _: &Filter) -> StoreResult<Vec<Document>> {
            std::future::pending().await
        }
        async fn count(&self, _: &str, _: &Filter) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn insert_one(&self, _: &str, _: Document) -> StoreResult<DocumentId> {
            std::future::pending().await
        }
        async fn set_field(&self, _: &str, _: &Filter, _: &str, _: Value) -> StoreResult<UpdateOutcome> {
            std::future::pending().await
        }
        async fn delete_many(&self, _: &str, _: &Filter) -> StoreResult<u64> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let mut conn = connect(&memory_config("conn")).await.unwrap();
        assert!(conn.is_active());
        assert_eq!(conn.store_kind(), "memory");
        assert!(conn.supports_transactions());

        conn.insert_one("jobs", json!({"t": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(conn.count("jobs", &Filter::new()).await.unwrap(), 1);

        conn.close().await.unwrap();
        assert!(!conn.is_active());
        assert!(matches!(conn.count("jobs", &Filter::new()).await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_fails_fast() {
        assert!(matches!(
            connect(&StoreConfig::new("")).await,
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            connect(&StoreConfig::new("postgres://localhost/db")).await,
            Err(StoreError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            connect(&StoreConfig::new("file:///definitely/not/here/store.json")).await,
            Err(StoreError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_operation_timeout() {
        let conn = Connection::new(
            Arc::new(StalledStore),
            "stalled://",
            Some(Duration::from_millis(20)),
        );
        let result = conn.find("jobs", &Filter::new()).await;
        assert!(matches!(result, Err(StoreError::Timeout { operation: "find", .. })));
    }

    #[tokio::test]
    async fn test_transaction_lifecycle() {
        let mut conn = connect(&memory_config("txn")).await.unwrap();

        assert!(conn.commit().await.is_err());
        conn.begin().await.unwrap();
        assert!(conn.is_in_transaction());
        assert!(conn.begin().await.is_err());

        conn.insert_one("blogs", json!({"author": "x"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        conn.rollback().await.unwrap();
        assert!(!conn.is_in_transaction());
        assert_eq!(conn.count("blogs", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_transactions() {
        let mut conn = Connection::new(Arc::new(StalledStore), "stalled://", None);
        assert!(!conn.supports_transactions());
        assert!(matches!(conn.begin().await, Err(StoreError::Unsupported(_))));
        assert!(!conn.is_in_transaction());
    }

    #[tokio::test]
    async fn test_drop_discards_open_transaction() {
        let config = memory_config("drop");
        {
            let mut conn = connect(&config).await.unwrap();
            conn.begin().await.unwrap();
            conn.insert_one("jobs", json!({}).as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        let conn = connect(&config).await.unwrap();
        assert_eq!(conn.count("jobs", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_survives_failed_rollback() {
        let name = format!("close-{}", DocumentId::generate());
        let mut conn = connect(&StoreConfig::new(&format!("memory://{}", name))).await.unwrap();
        conn.begin().await.unwrap();

        // the store forgets the transaction behind the connection's back
        MemoryStore::named(&name).abort_transaction().await.unwrap();

        conn.close().await.unwrap();
        assert!(!conn.is_active());
        assert!(!conn.is_in_transaction());
    }
}
