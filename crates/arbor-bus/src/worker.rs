//! The rule-dispatch pipeline.

use std::backtrace::Backtrace;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use arbor_model::{Node, Object};
use arbor_store::Store;

use crate::error::{BusError, Result};
use crate::rules::RuleRegistry;

/// Overridable pre- and post-processing stages around rule dispatch.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Pre-check stage; no-op by default.
    async fn audit(&self, _activity: &Object) -> Result<()> {
        Ok(())
    }

    /// Post-processing stage; no-op by default. The extension point for a
    /// future delivery fan-out to remote systems.
    async fn deliver(&self, _activity: &Object) -> Result<()> {
        Ok(())
    }
}

struct NoopHooks;

#[async_trait]
impl Hooks for NoopHooks {}

/// Executes activities through the audit/process/deliver stages and
/// guarantees every attempt is durably recorded.
///
/// In the default lenient mode a failing stage is captured into an
/// Error-typed document on the activity's result and the activity still
/// counts as completed; in strict mode the error propagates to the caller.
/// Either way the activity is stamped and persisted before `run` returns.
pub struct Worker {
    store: Arc<dyn Store>,
    registry: RuleRegistry,
    hooks: Arc<dyn Hooks>,
    strict: bool,
}

impl Worker {
    pub fn new(store: Arc<dyn Store>, registry: RuleRegistry) -> Self {
        Self {
            store,
            registry,
            hooks: Arc::new(NoopHooks),
            strict: false,
        }
    }

    /// Propagate stage errors to the caller instead of capturing them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub async fn run(&self, mut activity: Object) -> Result<Object> {
        activity.start_time = Some(Utc::now());

        if let Err(err) = self.stages(&mut activity).await {
            if self.strict {
                self.finish(&mut activity).await?;
                return Err(err);
            }
            warn!(id = ?activity.id, error = %err, "activity failed, capturing error");
            activity.result.push(Node::from(error_document(&err)));
        }

        self.finish(&mut activity).await?;
        Ok(activity)
    }

    async fn stages(&self, activity: &mut Object) -> Result<()> {
        self.hooks.audit(activity).await?;
        self.process(activity).await?;
        self.hooks.deliver(activity).await?;
        Ok(())
    }

    /// Dispatch to every handler registered for the activity's type
    /// labels, in registration order, accumulating each non-empty return
    /// into the result. Unknown labels contribute nothing.
    async fn process(&self, activity: &mut Object) -> Result<()> {
        let labels = activity.types.clone();
        for rule in self.registry.rules_for(&labels) {
            let produced = rule.apply(&self.store, activity).await?;
            activity.result.extend(produced.into_iter().map(Node::from));
        }
        Ok(())
    }

    /// Stamp the processing timestamps and persist the activity; every
    /// attempt becomes a permanent audit record.
    async fn finish(&self, activity: &mut Object) -> Result<()> {
        let end = Utc::now();
        activity.end_time = Some(end);
        if let Some(start) = activity.start_time {
            activity.duration = Some((end - start).num_milliseconds() as f64 / 1000.0);
        }
        debug!(id = ?activity.id, duration = ?activity.duration, "activity recorded");
        self.store.store(activity, false).await?;
        Ok(())
    }

    /// Explicitly mark an activity dead: tombstone its type list, attach a
    /// result and persist. Distinct from automatic error capture; meant
    /// for rules that detect unrecoverable conditions.
    pub async fn fail(&self, activity: Object, result: Vec<Node>) -> Result<Object> {
        let mut dead = activity.into_tombstone();
        if !result.is_empty() {
            dead.result = result;
        }
        self.store.store(&dead, false).await?;
        Ok(dead)
    }
}

fn error_document(err: &BusError) -> Object {
    let trace = Backtrace::force_capture().to_string();
    Object::error(err.name(), err.to_string(), trace)
}
