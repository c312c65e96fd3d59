//! The storage contract shared by the bus and worker.

use async_trait::async_trait;

use arbor_model::Object;

use crate::error::{Result, StoreError};
use crate::query::{Query, SearchResults};

/// Namespace prefix whose records may be wiped wholesale.
pub const TESTING_NAMESPACE: &str = "testing-";

/// The logical record kinds, each its own key space under the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Canonical documents keyed by identifier.
    Objects,
    /// Denormalized collection-membership rows; no fixed key, several rows
    /// may exist per document.
    Collections,
    /// Account records keyed by identifier.
    Accounts,
}

impl Kind {
    pub fn index(&self) -> &'static str {
        match self {
            Kind::Objects => "objects",
            Kind::Collections => "collections",
            Kind::Accounts => "accounts",
        }
    }
}

pub(crate) fn require_id(object: &Object) -> Result<&str> {
    match object.id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StoreError::Validation(
            "object must have an id to be stored".to_string(),
        )),
    }
}

/// Search-backed document storage.
///
/// Writes take a `refresh` flag: `true` makes the write visible to
/// immediately following searches (read-after-write), at a latency cost.
/// `search` runs over membership rows; canonical documents are reached by
/// exact key through `load`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert the full document by identifier. Fails with a validation
    /// error when the identifier is missing.
    async fn store(&self, object: &Object, refresh: bool) -> Result<()>;

    /// Exact-key fetch; a missing key yields `None`, not an error.
    async fn load(&self, id: &str) -> Result<Option<Object>>;

    /// Remove the canonical record; idempotent.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Insert a membership row tagging the collection; returns the
    /// generated row id. Repeated adds produce duplicate rows.
    async fn add(&self, collection: &str, object: &Object, refresh: bool) -> Result<String>;

    /// Delete every membership row matching both the collection and the
    /// member's identifier; removing a non-matching id is a no-op.
    async fn remove(&self, collection: &str, id: &str) -> Result<()>;

    /// Evaluate a structured query over membership rows.
    async fn search(&self, query: &Query) -> Result<SearchResults>;

    /// Upsert an account record by identifier.
    async fn store_account(&self, account: &Object) -> Result<()>;

    async fn load_account(&self, id: &str) -> Result<Option<Object>>;

    /// Make all pending writes visible to searches.
    async fn refresh(&self) -> Result<()>;

    /// Provision indexes/schemas; used by environment bootstrap only.
    async fn setup(&self) -> Result<()>;

    /// Wipe every record in the namespace. Refuses to run outside the
    /// testing namespace.
    async fn clear_namespace(&self) -> Result<()>;
}
