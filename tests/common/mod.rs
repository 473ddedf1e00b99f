//! Shared helpers for the workflow integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use content_admin::storage::DocumentStore;
use content_admin::{
    AppConfig, Connection, Document, DocumentId, Filter, MemoryStore, StoreError, StoreResult,
    UpdateOutcome,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const SEED_PASSWORD: &str = "integration-secret-42";

/// A `memory://` URI no other test uses
pub fn unique_uri(tag: &str) -> String {
    format!("memory://{}-{}", tag, DocumentId::generate())
}

/// Config for `uri` with a cheap bcrypt cost and a seed password
pub fn test_config(uri: &str, extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("STORE_URI".to_string(), uri.to_string()),
        ("BCRYPT_COST".to_string(), "4".to_string()),
        ("SUPER_ADMIN_PASSWORD".to_string(), SEED_PASSWORD.to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

/// Insert an owner record directly, bypassing the reset workflow
pub async fn insert_owner(store: &dyn DocumentStore, email: &str) -> DocumentId {
    store
        .insert_one(
            "users",
            doc(json!({
                "name": "Existing Admin",
                "email": email,
                "password": "$2b$04$abcdefghijklmnopqrstuuNDfGoOVrWzXhGWKqoMNzBzwXWdAWu6",
                "role": "super_admin",
                "status": "approved",
            })),
        )
        .await
        .unwrap()
}

pub async fn count(store: &dyn DocumentStore, collection: &str, filter: Filter) -> u64 {
    store.count(collection, &filter).await.unwrap()
}

/// Memory store wrapper that fails chosen operations on chosen collections
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub fail_updates_on: Option<&'static str>,
    pub fail_inserts_on: Option<&'static str>,
    pub transactions: bool,
    pub fail_commit: bool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_updates_on: None,
            fail_inserts_on: None,
            transactions: true,
            fail_commit: false,
        }
    }

    pub fn failing_updates_on(mut self, collection: &'static str) -> Self {
        self.fail_updates_on = Some(collection);
        self
    }

    pub fn failing_inserts_on(mut self, collection: &'static str) -> Self {
        self.fail_inserts_on = Some(collection);
        self
    }

    pub fn without_transactions(mut self) -> Self {
        self.transactions = false;
        self
    }

    /// Commits abort the staged changes and report an error
    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn into_connection(self) -> Connection {
        Connection::new(Arc::new(self), "flaky://test", Some(Duration::from_secs(5)))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<DocumentId> {
        if self.fail_inserts_on.is_some_and(|c| c == collection) {
            return Err(StoreError::Io(format!("injected insert failure on {}", collection)));
        }
        self.inner.insert_one(collection, document).await
    }

    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<UpdateOutcome> {
        if self.fail_updates_on.is_some_and(|c| c == collection) {
            return Err(StoreError::Io(format!("injected update failure on {}", collection)));
        }
        self.inner.set_field(collection, filter, field, value).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.inner.delete_many(collection, filter).await
    }

    fn supports_transactions(&self) -> bool {
        self.transactions
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        self.inner.begin_transaction().await
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        if self.fail_commit {
            self.inner.abort_transaction().await?;
            return Err(StoreError::Transaction("injected commit failure".into()));
        }
        self.inner.commit_transaction().await
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        self.inner.abort_transaction().await
    }

    fn discard_transaction(&self) {
        self.inner.discard_transaction();
    }
}
