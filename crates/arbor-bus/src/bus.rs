//! The identity-scoped accessor.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use tracing::debug;
use uuid::Uuid;

use arbor_model::{address, contains_id, is_public, Node, Object};
use arbor_store::{Cursor, Query, SearchResults, Store};

use crate::error::{BusError, Result};
use crate::stock;

/// The unconditional-access principal used by internal rule execution.
pub const SYS_IDENTITY: &str = "sys";

/// Identity-scoped access to the document graph.
///
/// All reads flow through [`Bus::dereference`], which resolves an address
/// against the stock table and the canonical store and enforces the
/// recursive read check. Writes are submitted as activities via
/// [`Bus::send`] and executed by the worker, never applied directly.
#[derive(Clone)]
pub struct Bus {
    identity: Option<String>,
    store: Arc<dyn Store>,
    stock: Arc<HashMap<String, Object>>,
}

impl Bus {
    pub fn new(identity: Option<&str>, store: Arc<dyn Store>) -> Self {
        Self {
            identity: identity.map(|id| {
                address::canonical(id).trim_end_matches('/').to_string()
            }),
            store,
            stock: Arc::new(stock::defaults()),
        }
    }

    /// A bus scoped to the superuser sentinel.
    pub fn system(store: Arc<dyn Store>) -> Self {
        Self::new(Some(SYS_IDENTITY), store)
    }

    pub fn anonymous(store: Arc<dyn Store>) -> Self {
        Self::new(None, store)
    }

    /// Replace the bootstrap document table.
    pub fn with_stock(mut self, stock: HashMap<String, Object>) -> Self {
        self.stock = Arc::new(stock);
        self
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Resolve a reference to its canonical document: the stock table
    /// first, then the store by identifier. `Ok(None)` when nothing lives
    /// at the address; `Forbidden` when the document fails the read check.
    pub async fn dereference(&self, node: &Node) -> Result<Option<Object>> {
        let address = node
            .id()
            .ok_or_else(|| BusError::Validation("node has no identifier".to_string()))?;
        let address = address::canonical(address);

        let object = match self
            .stock
            .get(address::path(&address))
            .or_else(|| self.stock.get(address.as_str()))
        {
            Some(object) => Some(object.clone()),
            None => self.store.load(&address).await?,
        };

        let Some(object) = object else {
            return Ok(None);
        };
        if !self.can_read(&object).await? {
            debug!(identity = ?self.identity, address, "read denied");
            return Err(BusError::Forbidden);
        }
        Ok(Some(object))
    }

    /// The recursive read check: `sys` always passes, a public audience
    /// passes, the identity appearing in `attributedTo` or `audience`
    /// passes, and otherwise readability is inherited from the nearest
    /// addressable ancestor. A document at the root with none of these is
    /// unreadable.
    pub fn can_read<'a>(&'a self, object: &'a Object) -> BoxFuture<'a, Result<bool>> {
        async move {
            if self.identity.as_deref() == Some(SYS_IDENTITY) {
                return Ok(true);
            }
            if is_public(&object.audience) {
                return Ok(true);
            }
            if let Some(identity) = self.identity.as_deref() {
                if contains_id(&object.attributed_to, identity)
                    || contains_id(&object.audience, identity)
                {
                    return Ok(true);
                }
            }

            let address = object.id.as_deref().unwrap_or("/");
            if address::is_root(address) {
                return Ok(false);
            }
            let Some(parent) = address::parent(address) else {
                return Ok(false);
            };
            match self.dereference(&Node::Id(parent)).await? {
                Some(ancestor) => self.can_read(&ancestor).await,
                None => Ok(false),
            }
        }
        .boxed()
    }

    /// The recursive write check, on the address itself rather than an
    /// already-known document: writing to a not-yet-existing child address
    /// is authorized by the nearest existing ancestor's attribution.
    pub async fn can_write(&self, node: &Node) -> Result<bool> {
        let Some(address) = node.id() else {
            return Ok(false);
        };
        self.write_allowed(address::canonical(address)).await
    }

    fn write_allowed(&self, address: String) -> BoxFuture<'_, Result<bool>> {
        async move {
            let Some(identity) = self.identity.as_deref() else {
                return Ok(false);
            };
            if identity == SYS_IDENTITY {
                return Ok(true);
            }

            if let Some(object) = self.dereference(&Node::Id(address.clone())).await? {
                if contains_id(&object.attributed_to, identity) {
                    return Ok(true);
                }
            }

            if address::is_root(&address) {
                return Ok(false);
            }
            match address::parent(&address) {
                Some(parent) => self.write_allowed(parent).await,
                None => Ok(false),
            }
        }
        .boxed()
    }

    /// Stamp provenance onto an activity, assign it an address under the
    /// actor's outbox and append it to the outbox listing. Processing is a
    /// separate, explicit hand-off to the worker, so the outbox records the
    /// submission even before processing completes.
    pub async fn send(&self, activity: &mut Object) -> Result<()> {
        let Some(identity) = self.identity.as_deref() else {
            return Err(BusError::Forbidden);
        };
        let outbox = address::join(identity, "outbox");
        activity.id = Some(address::join(&outbox, &Uuid::new_v4().simple().to_string()));
        activity.attributed_to = vec![Node::Id(identity.to_string())];
        activity.actor = vec![Node::Id(identity.to_string())];
        let now = Utc::now();
        activity.published = Some(now);
        activity.updated = Some(now);

        debug!(identity, id = ?activity.id, "activity submitted");
        self.store.add(&outbox, activity, true).await?;
        Ok(())
    }

    /// One page of a collection's membership listing, sorted update time
    /// descending then identifier ascending. The address is dereferenced
    /// first for the authorization check; rows of a collection document
    /// that does not itself exist still list (membership is independent of
    /// the canonical record).
    pub async fn load_collection_page(
        &self,
        address: &str,
        size: usize,
        after: Option<&str>,
    ) -> Result<Object> {
        let address = address::canonical(address);
        self.dereference(&Node::Id(address.clone())).await?;

        let after = match after {
            None | Some("") => None,
            Some(token) => Some(Cursor::decode(token).map_err(BusError::Store)?),
        };
        let query = Query::collection(address.clone())
            .with_size(size)
            .with_after(after);
        let results = self.store.search(&query).await?;

        let mut page = Object::new(["CollectionPage"]);
        page.part_of = Some(Node::Id(address.clone()));
        page.total_items = Some(results.total);
        if results.total == 0 {
            return Ok(page);
        }

        let next = results
            .sort
            .as_ref()
            .map(|key| Cursor::new(key.clone()).encode());
        page.items = results.hits.into_iter().map(Node::from).collect();
        page.first = Some(Node::Id(address::with_query(&address, "after", "")));
        if let Some(token) = next {
            page.next = Some(Node::Id(address::with_query(&address, "after", &token)));
        }
        Ok(page)
    }

    /// Run a structured query against the shared store.
    pub async fn query(&self, query: &Query) -> Result<SearchResults> {
        Ok(self.store.search(query).await?)
    }
}
