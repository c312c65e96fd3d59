//! The rule registry and the built-in rules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use arbor_model::{first_id, Node, Object};
use arbor_store::Store;

use crate::bus::Bus;
use crate::error::{BusError, Result};

/// A handler bound to one activity type label. Returned documents are
/// appended to the activity's result by the worker.
#[async_trait]
pub trait Rule: Send + Sync {
    async fn apply(&self, store: &Arc<dyn Store>, activity: &Object) -> Result<Vec<Object>>;
}

/// An explicit mapping from type label to ordered handler list, built at
/// startup and handed to the worker. Independent registries per worker
/// keep tests isolated.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Vec<Arc<dyn Rule>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules: `Create` and `Add`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("Create", Arc::new(Create));
        registry.register("Add", Arc::new(Add));
        registry
    }

    pub fn register(&mut self, label: impl Into<String>, rule: Arc<dyn Rule>) {
        self.rules.entry(label.into()).or_default().push(rule);
    }

    /// Handlers for every given label, in registration order; unknown
    /// labels contribute none.
    pub fn rules_for(&self, labels: &[String]) -> Vec<Arc<dyn Rule>> {
        labels
            .iter()
            .flat_map(|label| self.rules.get(label).into_iter().flatten())
            .cloned()
            .collect()
    }
}

/// The bus scoped to an activity's actor, for authorization inside rules.
fn actor_bus(store: &Arc<dyn Store>, activity: &Object) -> Bus {
    Bus::new(first_id(&activity.actor), store.clone())
}

/// Writes each of the activity's objects to the canonical store.
///
/// Every object must carry an identifier and the actor must hold write
/// authorization at that address. Attribution and audience default to the
/// activity's own when the object declares none.
pub struct Create;

#[async_trait]
impl Rule for Create {
    async fn apply(&self, store: &Arc<dyn Store>, activity: &Object) -> Result<Vec<Object>> {
        let bus = actor_bus(store, activity);
        let mut documents = Vec::new();

        for node in &activity.objects {
            let mut object = node.clone().into_object();
            let id = object
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| BusError::Validation("object has no id".to_string()))?;
            if !bus.can_write(&Node::Id(id.clone())).await? {
                return Err(BusError::Forbidden);
            }
            if object.attributed_to.is_empty() {
                object.attributed_to = activity.actor.clone();
            }
            if object.audience.is_empty() {
                object.audience = activity.audience.clone();
            }
            object.touch();
            debug!(id, "create");
            documents.push(object);
        }

        for document in &documents {
            store.store(document, false).await?;
        }
        Ok(documents)
    }
}

/// Links each of the activity's objects into each target collection.
///
/// Targets must dereference to a Collection or OrderedCollection the actor
/// may write to. Membership writes are immediately visible so a following
/// listing read sees them. Nothing deduplicates repeated adds; retries
/// produce duplicate rows.
pub struct Add;

#[async_trait]
impl Rule for Add {
    async fn apply(&self, store: &Arc<dyn Store>, activity: &Object) -> Result<Vec<Object>> {
        let bus = actor_bus(store, activity);

        for target in &activity.targets {
            let collection = bus.dereference(target).await?.ok_or_else(|| {
                BusError::Validation(format!("target not found: {:?}", target.id()))
            })?;
            if !collection.is_collection() {
                return Err(BusError::Validation(format!(
                    "target is not a collection: {:?}",
                    collection.id
                )));
            }
            let address = collection
                .id
                .clone()
                .ok_or_else(|| BusError::Validation("collection has no id".to_string()))?;
            if !bus.can_write(&Node::Id(address.clone())).await? {
                return Err(BusError::Forbidden);
            }

            for node in &activity.objects {
                let object = node.clone().into_object();
                debug!(collection = address, id = ?object.id, "add");
                store.add(&address, &object, true).await?;
            }
        }
        Ok(Vec::new())
    }
}
