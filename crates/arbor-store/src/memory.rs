//! In-memory storage for tests and development.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use arbor_model::Object;

use crate::error::Result;
use crate::query::{Query, SearchResults};
use crate::storage::{require_id, Store};

#[derive(Debug, Clone)]
struct MembershipRow {
    row_id: String,
    collection: String,
    object: Object,
}

/// A [`Store`] holding everything in process memory. Writes are always
/// immediately visible, so the `refresh` flag is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, Object>>>,
    accounts: Arc<RwLock<HashMap<String, Object>>>,
    rows: Arc<RwLock<Vec<MembershipRow>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh store behind an `Arc<dyn Store>`, ready for injection.
    pub fn shared() -> Arc<dyn Store> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn store(&self, object: &Object, _refresh: bool) -> Result<()> {
        let id = require_id(object)?.to_string();
        let mut stored = object.clone();
        stored.strip_private_extras();
        self.objects.write().await.insert(id, stored);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Object>> {
        Ok(self.objects.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.objects.write().await.remove(id);
        Ok(())
    }

    async fn add(&self, collection: &str, object: &Object, _refresh: bool) -> Result<String> {
        let row_id = Uuid::new_v4().simple().to_string();
        let mut copy = object.clone();
        copy.strip_private_extras();
        self.rows.write().await.push(MembershipRow {
            row_id: row_id.clone(),
            collection: collection.to_string(),
            object: copy,
        });
        Ok(row_id)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        self.rows
            .write()
            .await
            .retain(|row| !(row.collection == collection && row.object.id.as_deref() == Some(id)));
        Ok(())
    }

    async fn search(&self, query: &Query) -> Result<SearchResults> {
        let started = Instant::now();
        let rows = self.rows.read().await;
        let candidates = rows
            .iter()
            .map(|row| (row.collection.clone(), row.object.clone()))
            .collect::<Vec<_>>();
        Ok(query.evaluate(candidates, started))
    }

    async fn store_account(&self, account: &Object) -> Result<()> {
        let id = require_id(account)?.to_string();
        self.accounts.write().await.insert(id, account.clone());
        Ok(())
    }

    async fn load_account(&self, id: &str) -> Result<Option<Object>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn clear_namespace(&self) -> Result<()> {
        self.objects.write().await.clear();
        self.accounts.write().await.clear();
        self.rows.write().await.clear();
        Ok(())
    }
}
