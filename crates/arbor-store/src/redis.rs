//! Redis-backed storage.
//!
//! Canonical documents and account records are plain JSON values under
//! namespaced keys. Membership rows live under generated row ids, indexed
//! by a per-collection sorted set scored with the row's update time; search
//! walks the index newest-first and applies the shared [`Query`] semantics
//! client-side.

use std::time::Instant;

use ::redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use arbor_model::Object;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::query::{Query, SearchResults, SortKey, COLLECTION_TAG};
use crate::storage::{require_id, Kind, Store, TESTING_NAMESPACE};

/// A membership row as persisted: the denormalized member document plus the
/// owning collection's address.
#[derive(Debug, Serialize, Deserialize)]
struct MembershipRow {
    collection: String,
    object: Object,
}

/// A [`Store`] over a shared Redis connection.
pub struct RedisStore {
    conn: tokio::sync::Mutex<ConnectionManager>,
    config: StoreConfig,
}

impl RedisStore {
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let client = ::redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: tokio::sync::Mutex::new(conn),
            config,
        })
    }

    fn key(&self, kind: Kind, id: &str) -> String {
        format!("{}{}:{}", self.config.namespace, kind.index(), id)
    }

    /// The sorted-set index for one collection's rows, or the global index.
    fn index_key(&self, collection: Option<&str>) -> String {
        match collection {
            Some(collection) => format!("{}collections-index:{}", self.config.namespace, collection),
            None => format!("{}collections-index", self.config.namespace),
        }
    }

    async fn row_ids(&self, collection: Option<&str>) -> Result<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let ids: Vec<String> = conn.zrevrange(self.index_key(collection), 0, -1).await?;
        Ok(ids)
    }

    async fn load_row(&self, row_id: &str) -> Result<Option<MembershipRow>> {
        let key = self.key(Kind::Collections, row_id);
        let mut conn = self.conn.lock().await;
        let payload: Option<String> = conn.get(&key).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn store(&self, object: &Object, _refresh: bool) -> Result<()> {
        let id = require_id(object)?;
        let mut stored = object.clone();
        stored.strip_private_extras();
        let payload = serde_json::to_string(&stored)?;
        debug!(id, "storing document");
        let mut conn = self.conn.lock().await;
        let _: () = conn.set(self.key(Kind::Objects, id), payload).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Object>> {
        let mut conn = self.conn.lock().await;
        let payload: Option<String> = conn.get(self.key(Kind::Objects, id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let _: () = conn.del(self.key(Kind::Objects, id)).await?;
        Ok(())
    }

    async fn add(&self, collection: &str, object: &Object, _refresh: bool) -> Result<String> {
        let row_id = Uuid::new_v4().simple().to_string();
        let mut copy = object.clone();
        copy.strip_private_extras();
        let score = SortKey::of(&copy).updated as f64;
        let payload = serde_json::to_string(&MembershipRow {
            collection: collection.to_string(),
            object: copy,
        })?;

        let mut conn = self.conn.lock().await;
        let _: () = conn.set(self.key(Kind::Collections, &row_id), payload).await?;
        let _: () = conn.zadd(self.index_key(Some(collection)), &row_id, score).await?;
        let _: () = conn.zadd(self.index_key(None), &row_id, score).await?;
        Ok(row_id)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        for row_id in self.row_ids(Some(collection)).await? {
            let Some(row) = self.load_row(&row_id).await? else {
                continue;
            };
            if row.object.id.as_deref() != Some(id) {
                continue;
            }
            let mut conn = self.conn.lock().await;
            let _: () = conn.del(self.key(Kind::Collections, &row_id)).await?;
            let _: () = conn.zrem(self.index_key(Some(collection)), &row_id).await?;
            let _: () = conn.zrem(self.index_key(None), &row_id).await?;
        }
        Ok(())
    }

    async fn search(&self, query: &Query) -> Result<SearchResults> {
        let started = Instant::now();
        let keywords = query.gather_keywords();
        let collection = keywords.get(COLLECTION_TAG).map(String::as_str);

        let mut candidates = Vec::new();
        for row_id in self.row_ids(collection).await? {
            if let Some(row) = self.load_row(&row_id).await? {
                candidates.push((row.collection, row.object));
            }
        }
        Ok(query.evaluate(candidates, started))
    }

    async fn store_account(&self, account: &Object) -> Result<()> {
        let id = require_id(account)?;
        let payload = serde_json::to_string(account)?;
        let mut conn = self.conn.lock().await;
        let _: () = conn.set(self.key(Kind::Accounts, id), payload).await?;
        Ok(())
    }

    async fn load_account(&self, id: &str) -> Result<Option<Object>> {
        let mut conn = self.conn.lock().await;
        let payload: Option<String> = conn.get(self.key(Kind::Accounts, id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn refresh(&self) -> Result<()> {
        // Redis writes are visible as soon as they return.
        Ok(())
    }

    async fn setup(&self) -> Result<()> {
        info!(namespace = %self.config.namespace, "redis backend is schemaless, nothing to provision");
        Ok(())
    }

    async fn clear_namespace(&self) -> Result<()> {
        if self.config.namespace != TESTING_NAMESPACE {
            return Err(StoreError::Internal(
                "can only clear the testing namespace".to_string(),
            ));
        }
        let pattern = format!("{}*", self.config.namespace);
        let mut conn = self.conn.lock().await;
        let keys: Vec<String> = conn.keys(&pattern).await?;
        info!(count = keys.len(), "wiping testing namespace");
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}
