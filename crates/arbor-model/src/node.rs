//! Reference values: an identifier string or an inline document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::object::Object;

/// A reference to a document: either an opaque identifier or an inline
/// document carrying at least an identifier.
///
/// On the wire a node that is nothing but an identifier collapses to a bare
/// string; everything else serializes as the full document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Id(String),
    Object(Box<Object>),
}

impl Node {
    /// The identifier, whichever form the node takes.
    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Id(id) => Some(id),
            Node::Object(object) => object.id.as_deref(),
        }
    }

    /// Convert into a full document. An `Id` becomes a document with only
    /// the identifier set.
    pub fn into_object(self) -> Object {
        match self {
            Node::Id(id) => Object {
                id: Some(id),
                ..Object::default()
            },
            Node::Object(object) => *object,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Node::Id(_) => None,
            Node::Object(object) => Some(object),
        }
    }
}

impl From<Object> for Node {
    fn from(object: Object) -> Self {
        Node::Object(Box::new(object))
    }
}

impl From<String> for Node {
    fn from(id: String) -> Self {
        Node::Id(id)
    }
}

impl From<&str> for Node {
    fn from(id: &str) -> Self {
        Node::Id(id.to_string())
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Id(id) => serializer.serialize_str(id),
            Node::Object(object) => match object.bare_id() {
                Some(id) => serializer.serialize_str(id),
                None => object.serialize(serializer),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Id(String),
            Object(Box<Object>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Id(id) => Node::Id(id),
            Repr::Object(object) => Node::Object(object),
        })
    }
}

/// Collect every identifier present in a slice of nodes.
pub fn gather_ids(values: &[Node]) -> Vec<&str> {
    values.iter().filter_map(Node::id).collect()
}

/// First identifier present, if any.
pub fn first_id(values: &[Node]) -> Option<&str> {
    values.iter().find_map(Node::id)
}

/// Whether any node in the slice carries the given identifier.
pub fn contains_id(values: &[Node], id: &str) -> bool {
    values.iter().any(|node| node.id() == Some(id))
}

/// Equivalent literal audience values treated as "world-readable".
const PUBLIC_MARKERS: [&str; 4] = [
    "https://www.w3.org/ns/activitystreams#Public",
    "Public",
    "as:Public",
    "public",
];

/// Whether an audience list contains one of the public markers.
pub fn is_public(audience: &[Node]) -> bool {
    gather_ids(audience)
        .iter()
        .any(|id| PUBLIC_MARKERS.contains(id))
}
