pub mod file;
pub mod memory;
pub mod persistence;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use persistence::{SnapshotFile, SnapshotFormat, StoreSnapshot};

use crate::core::{Document, DocumentId, Filter, StoreError, StoreResult, UpdateOutcome};
use async_trait::async_trait;
use serde_json::Value;

/// Document store trait - allows pluggable storage backends
///
/// Collections are created implicitly on first insert. Reading or writing a
/// collection that does not exist behaves like reading an empty one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs and reports
    fn kind(&self) -> &'static str;

    /// Cheap reachability check issued right after connecting
    async fn ping(&self) -> StoreResult<()>;

    /// Return every document matching the filter, in insertion order
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Count documents matching the filter
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Insert one document, assigning `_id` when it is absent
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId>;

    /// Set `field = value` on every document matching the filter
    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<UpdateOutcome>;

    /// Delete every document matching the filter, returning the count
    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Whether multi-document transactions are available
    fn supports_transactions(&self) -> bool {
        false
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!(
            "{} store has no transactions",
            self.kind()
        )))
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!(
            "{} store has no transactions",
            self.kind()
        )))
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!(
            "{} store has no transactions",
            self.kind()
        )))
    }

    /// Best-effort synchronous abort, used when a connection is dropped
    /// without being closed
    fn discard_transaction(&self) {}

    /// Release backend resources; called once per connection
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
