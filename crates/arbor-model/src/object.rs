//! The flat wire document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::Node;

/// An addressable document.
///
/// Plain objects, activities, collections and collection pages all share
/// this one field set; the `type` labels distinguish the roles. Every field
/// is optional on the wire, and unknown attributes are captured verbatim in
/// `extra` so foreign documents round-trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        rename = "type",
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<String>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub name: Vec<String>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub summary: Vec<String>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub content: Vec<Value>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attributed_to: Vec<Node>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub audience: Vec<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Processing time in seconds, stamped by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub actor: Vec<Node>,

    #[serde(
        rename = "object",
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub objects: Vec<Node>,

    #[serde(
        rename = "target",
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub targets: Vec<Node>,

    #[serde(
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub result: Vec<Node>,

    /// Set by [`Object::into_tombstone`] when a document is dead-lettered.
    #[serde(
        rename = "formerType",
        default,
        with = "crate::wire::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub former_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,

    // A page of members always serializes as a list, never as a scalar.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Extension attributes preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Object {
    /// A new document with the given type labels.
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Object {
            types: types.into_iter().map(Into::into).collect(),
            ..Object::default()
        }
    }

    /// A new document with an identifier and type labels.
    pub fn with_id<I, S>(id: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Object {
            id: Some(id.into()),
            ..Object::new(types)
        }
    }

    /// An Error document carrying an error's name, message and a captured
    /// trace, as attached to an activity's result by the worker.
    pub fn error(
        name: impl Into<String>,
        summary: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Object {
            name: vec![name.into()],
            summary: vec![summary.into()],
            content: vec![Value::String(trace.into())],
            published: Some(Utc::now()),
            media_type: Some("text/plain".to_string()),
            ..Object::new(["Error"])
        }
    }

    pub fn has_type(&self, label: &str) -> bool {
        self.types.iter().any(|t| t == label)
    }

    /// Collection or OrderedCollection.
    pub fn is_collection(&self) -> bool {
        self.has_type("Collection") || self.has_type("OrderedCollection")
    }

    /// The identifier, if this document carries nothing else. Such documents
    /// collapse to a bare string on the wire.
    pub fn bare_id(&self) -> Option<&str> {
        let id = self.id.as_deref()?;
        let bare = Object {
            id: self.id.clone(),
            ..Object::default()
        };
        (*self == bare).then_some(id)
    }

    /// Stamp `published` and `updated` with the current time.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.published = Some(now);
        self.updated = Some(now);
    }

    /// Replace the type list with `Tombstone`, recording the former types
    /// and the deletion time. Used by the explicit dead-letter operation.
    pub fn into_tombstone(mut self) -> Self {
        self.former_types = std::mem::take(&mut self.types);
        self.types = vec!["Tombstone".to_string()];
        self.deleted = Some(Utc::now());
        self
    }

    /// Drop extension attributes whose keys start with an underscore; search
    /// backends tag membership rows with such keys and they must not leak
    /// back onto the wire.
    pub fn strip_private_extras(&mut self) {
        self.extra.retain(|key, _| !key.starts_with('_'));
    }
}
