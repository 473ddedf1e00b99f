use super::memory::{Collections, MemoryStore};
use super::persistence::{SnapshotFile, StoreSnapshot};
use super::DocumentStore;
use crate::core::{Document, DocumentId, Filter, StoreError, StoreResult, UpdateOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Memory store whose committed state is written to a snapshot file after
/// every mutation outside a transaction, and on commit.
pub struct FileStore {
    inner: MemoryStore,
    file: SnapshotFile,
}

impl FileStore {
    /// Open (or start) the store at `path`.
    ///
    /// The parent directory must exist. A missing or empty file starts an
    /// empty store; an unreadable one is a connection error.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(StoreError::Connection(format!(
                    "directory '{}' does not exist",
                    parent.display()
                )));
            }
        }
        if path.is_dir() {
            return Err(StoreError::Connection(format!(
                "'{}' is a directory",
                path.display()
            )));
        }

        let file = SnapshotFile::new(path);
        let collections = file
            .load()
            .map_err(|e| StoreError::Connection(format!("cannot load '{}': {}", path.display(), e)))?
            .map(|snapshot| snapshot.collections)
            .unwrap_or_default();

        debug!(
            path = %path.display(),
            collections = collections.len(),
            "opened file store"
        );

        Ok(Self {
            inner: MemoryStore::with_collections(path.display().to_string(), collections),
            file,
        })
    }

    /// Committed state to fall back on if the next save fails. Inside a
    /// transaction nothing is saved until commit, so there is none.
    async fn checkpoint(&self) -> Option<Collections> {
        if self.inner.in_transaction().await {
            None
        } else {
            Some(self.inner.export().await)
        }
    }

    /// Save the committed state. When the save fails, memory is put back
    /// to `checkpoint` so it never holds a change the file does not.
    async fn persist(&self, checkpoint: Option<Collections>) -> StoreResult<()> {
        let Some(previous) = checkpoint else {
            return Ok(());
        };
        if let Err(e) = self.flush().await {
            warn!(
                path = %self.file.path().display(),
                error = %e,
                "snapshot save failed, reverting in-memory change"
            );
            self.inner.restore(previous).await;
            return Err(e);
        }
        Ok(())
    }

    async fn flush(&self) -> StoreResult<()> {
        let snapshot = StoreSnapshot::new(self.inner.export().await);
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(|e| StoreError::Io(format!("snapshot writer panicked: {}", e)))?
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn ping(&self) -> StoreResult<()> {
        // a store that was never written has no file yet; create it now so
        // an unwritable location fails at connect time
        if !self.file.exists() {
            self.flush().await?;
        }
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId> {
        let checkpoint = self.checkpoint().await;
        let id = self.inner.insert_one(collection, document).await?;
        self.persist(checkpoint).await?;
        Ok(id)
    }

    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<UpdateOutcome> {
        let checkpoint = self.checkpoint().await;
        let outcome = self.inner.set_field(collection, filter, field, value).await?;
        if outcome.modified > 0 {
            self.persist(checkpoint).await?;
        }
        Ok(outcome)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let checkpoint = self.checkpoint().await;
        let deleted = self.inner.delete_many(collection, filter).await?;
        if deleted > 0 {
            self.persist(checkpoint).await?;
        }
        Ok(deleted)
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        self.inner.begin_transaction().await
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        let previous = self.inner.export().await;
        self.inner.commit_transaction().await?;
        self.persist(Some(previous)).await
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        self.inner.abort_transaction().await
    }

    fn discard_transaction(&self) {
        self.inner.discard_transaction();
    }
}
