use super::DocumentStore;
use crate::core::{
    Document, DocumentId, Filter, ID_FIELD, StoreError, StoreResult, UpdateOutcome,
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Collection name -> documents in insertion order
pub type Collections = BTreeMap<String, Vec<Document>>;

// Process-wide registry behind memory:// URIs, so every connection to the
// same name sees the same data.
lazy_static! {
    static ref NAMED_STORES: Mutex<HashMap<String, Arc<MemoryStore>>> = Mutex::new(HashMap::new());
}

pub struct MemoryStore {
    name: String,
    committed: RwLock<Collections>,
    /// Working copy while a transaction is open
    staged: RwLock<Option<Collections>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_collections(name, Collections::new())
    }

    pub fn with_collections(name: impl Into<String>, collections: Collections) -> Self {
        Self {
            name: name.into(),
            committed: RwLock::new(collections),
            staged: RwLock::new(None),
        }
    }

    /// Get or create the shared store registered under `name`
    pub fn named(name: &str) -> Arc<MemoryStore> {
        let mut stores = NAMED_STORES.lock().unwrap_or_else(|e| e.into_inner());
        stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(name)))
            .clone()
    }

    /// Forget a shared store. Existing handles keep working on their copy.
    pub fn remove_named(name: &str) -> bool {
        let mut stores = NAMED_STORES.lock().unwrap_or_else(|e| e.into_inner());
        stores.remove(name).is_some()
    }

    pub async fn in_transaction(&self) -> bool {
        self.staged.read().await.is_some()
    }

    /// Clone of the committed state (what a snapshot should contain)
    pub async fn export(&self) -> Collections {
        self.committed.read().await.clone()
    }

    /// Replace the committed state, e.g. with an earlier `export()`
    pub(crate) async fn restore(&self, collections: Collections) {
        *self.committed.write().await = collections;
    }

    fn no_transaction(&self) -> StoreError {
        StoreError::Transaction(format!("no active transaction on '{}'", self.name))
    }

    async fn read<T>(&self, op: impl FnOnce(&Collections) -> T) -> T {
        let staged = self.staged.read().await;
        match staged.as_ref() {
            Some(collections) => op(collections),
            None => {
                let committed = self.committed.read().await;
                op(&committed)
            }
        }
    }

    async fn write<T>(&self, op: impl FnOnce(&mut Collections) -> StoreResult<T>) -> StoreResult<T> {
        let mut staged = self.staged.write().await;
        match staged.as_mut() {
            Some(collections) => op(collections),
            None => {
                let mut committed = self.committed.write().await;
                op(&mut committed)
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("default")
    }
}

fn find_in(collections: &Collections, collection: &str, filter: &Filter) -> Vec<Document> {
    collections
        .get(collection)
        .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
        .unwrap_or_default()
}

fn insert_into(
    collections: &mut Collections,
    collection: &str,
    mut document: Document,
) -> StoreResult<DocumentId> {
    let id = match document.get(ID_FIELD) {
        None => {
            let id = DocumentId::generate();
            document.insert(ID_FIELD.to_string(), id.to_value());
            id
        }
        Some(_) => DocumentId::of(&document).ok_or_else(|| {
            StoreError::InvalidDocument(format!("{} must be a non-empty string", ID_FIELD))
        })?,
    };

    let docs = collections.entry(collection.to_string()).or_default();
    if docs.iter().any(|d| DocumentId::of(d).as_ref() == Some(&id)) {
        return Err(StoreError::DuplicateId {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }
    docs.push(document);
    Ok(id)
}

fn set_in(
    collections: &mut Collections,
    collection: &str,
    filter: &Filter,
    field: &str,
    value: Value,
) -> StoreResult<UpdateOutcome> {
    if field == ID_FIELD {
        return Err(StoreError::InvalidDocument(format!("{} cannot be rewritten", ID_FIELD)));
    }

    let mut outcome = UpdateOutcome::default();
    let Some(docs) = collections.get_mut(collection) else {
        return Ok(outcome);
    };

    for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
        outcome.matched += 1;
        if doc.get(field) != Some(&value) {
            doc.insert(field.to_string(), value.clone());
            outcome.modified += 1;
        }
    }
    Ok(outcome)
}

fn delete_from(collections: &mut Collections, collection: &str, filter: &Filter) -> u64 {
    let Some(docs) = collections.get_mut(collection) else {
        return 0;
    };
    let before = docs.len();
    docs.retain(|d| !filter.matches(d));
    (before - docs.len()) as u64
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self.read(|c| find_in(c, collection, filter)).await)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        Ok(self
            .read(|c| {
                c.get(collection)
                    .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
                    .unwrap_or(0)
            })
            .await)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId> {
        self.write(|c| insert_into(c, collection, document)).await
    }

    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<UpdateOutcome> {
        self.write(|c| set_in(c, collection, filter, field, value)).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.write(|c| Ok(delete_from(c, collection, filter))).await
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        let mut staged = self.staged.write().await;
        if staged.is_some() {
            return Err(StoreError::Transaction(format!(
                "transaction already active on '{}'",
                self.name
            )));
        }
        *staged = Some(self.committed.read().await.clone());
        Ok(())
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        let mut staged = self.staged.write().await;
        let collections = staged
            .take()
            .ok_or_else(|| self.no_transaction())?;
        *self.committed.write().await = collections;
        Ok(())
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        let mut staged = self.staged.write().await;
        if staged.take().is_none() {
            return Err(self.no_transaction());
        }
        Ok(())
    }

    fn discard_transaction(&self) {
        if let Ok(mut staged) = self.staged.try_write() {
            *staged = None;
        }
    }
}
