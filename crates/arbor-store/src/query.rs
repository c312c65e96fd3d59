//! Structured queries, sort keys and search-after cursors.
//!
//! Both backends evaluate the same [`Query`] semantics: keyword equality
//! terms (including the collection tag and type label), an optional
//! free-text term, a sort specification defaulting to update time
//! descending then identifier ascending, a size cap, and resumption from an
//! opaque cursor equal to the previous page's last sort key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use arbor_model::Object;

use crate::error::{Result, StoreError};

/// Default page size for collection listings.
pub const DEFAULT_PAGE_SIZE: usize = 42;

/// Keyword under which membership rows carry their owning collection.
pub const COLLECTION_TAG: &str = "_collection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort term; the supported fields are `updated` and `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

fn default_sort() -> Vec<SortSpec> {
    vec![
        SortSpec::new("updated", SortOrder::Desc),
        SortSpec::new("id", SortOrder::Asc),
    ]
}

/// The sort key of one hit: update time in epoch milliseconds plus the
/// identifier as a tie-breaker. Consecutive pages visit every distinct key
/// exactly once as long as no concurrent update changes keys mid-scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub updated: i64,
    pub id: String,
}

impl SortKey {
    /// The sort key of a document: `updated` falling back to `published`,
    /// missing timestamps sorting before everything.
    pub fn of(object: &Object) -> Self {
        let updated = object
            .updated
            .or(object.published)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);
        Self {
            updated,
            id: object.id.clone().unwrap_or_default(),
        }
    }
}

/// An opaque pagination cursor wrapping a [`SortKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(SortKey);

impl Cursor {
    pub fn new(key: SortKey) -> Self {
        Self(key)
    }

    pub fn key(&self) -> &SortKey {
        &self.0
    }

    /// Hex-encoded `millis:id` pair; opaque to callers.
    pub fn encode(&self) -> String {
        hex::encode(format!("{}:{}", self.0.updated, self.0.id))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let raw = hex::decode(token).map_err(|e| StoreError::Cursor(e.to_string()))?;
        let raw = String::from_utf8(raw).map_err(|e| StoreError::Cursor(e.to_string()))?;
        let (updated, id) = raw
            .split_once(':')
            .ok_or_else(|| StoreError::Cursor(format!("malformed cursor: {raw:?}")))?;
        let updated = updated
            .parse()
            .map_err(|_| StoreError::Cursor(format!("malformed cursor: {raw:?}")))?;
        Ok(Self(SortKey {
            updated,
            id: id.to_string(),
        }))
    }
}

/// A structured search over membership rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Free-text term matched against name, summary and content.
    pub text: Option<String>,
    /// Exact-equality keyword terms.
    pub keywords: BTreeMap<String, String>,
    /// Shorthand for the `type` keyword term.
    pub doc_type: Option<String>,
    /// Shorthand for the collection tag keyword term.
    pub collection: Option<String>,
    pub sort: Vec<SortSpec>,
    pub size: usize,
    pub after: Option<Cursor>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            text: None,
            keywords: BTreeMap::new(),
            doc_type: None,
            collection: None,
            sort: default_sort(),
            size: DEFAULT_PAGE_SIZE,
            after: None,
        }
    }
}

impl Query {
    /// A query for the membership rows of one collection.
    pub fn collection(address: impl Into<String>) -> Self {
        Self {
            collection: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_after(mut self, after: Option<Cursor>) -> Self {
        self.after = after;
        self
    }

    /// Fold the `collection` and `doc_type` shorthands into the keyword map.
    pub fn gather_keywords(&self) -> BTreeMap<String, String> {
        let mut keywords = self.keywords.clone();
        if let Some(collection) = &self.collection {
            keywords.insert(COLLECTION_TAG.to_string(), collection.clone());
        }
        if let Some(doc_type) = &self.doc_type {
            keywords.insert("type".to_string(), doc_type.clone());
        }
        keywords
    }

    /// Whether a membership row (collection tag plus document) matches the
    /// filter terms.
    pub fn matches(&self, collection_tag: &str, object: &Object) -> bool {
        for (key, value) in self.gather_keywords() {
            let hit = match key.as_str() {
                COLLECTION_TAG => collection_tag == value,
                "type" => object.types.iter().any(|t| *t == value),
                "id" => object.id.as_deref() == Some(value.as_str()),
                _ => object
                    .extra
                    .get(&key)
                    .and_then(Value::as_str)
                    .map(|v| v == value)
                    .unwrap_or(false),
            };
            if !hit {
                return false;
            }
        }

        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let found = object
                .name
                .iter()
                .chain(object.summary.iter())
                .map(String::as_str)
                .chain(object.content.iter().filter_map(Value::as_str))
                .any(|field| field.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }

        true
    }

    /// Total order over sort keys per this query's sort specification.
    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        for spec in &self.sort {
            let ord = match spec.field.as_str() {
                "updated" => a.updated.cmp(&b.updated),
                "id" => a.id.cmp(&b.id),
                _ => Ordering::Equal,
            };
            let ord = match spec.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Evaluate the query over candidate rows. Shared by both backends so
    /// filter, sort and cursor semantics cannot drift apart.
    pub fn evaluate(
        &self,
        rows: impl IntoIterator<Item = (String, Object)>,
        started: Instant,
    ) -> SearchResults {
        let mut matched: Vec<(SortKey, Object)> = rows
            .into_iter()
            .filter(|(tag, object)| self.matches(tag, object))
            .map(|(_, object)| (SortKey::of(&object), object))
            .collect();
        matched.sort_by(|(a, _), (b, _)| self.compare(a, b));

        let total = matched.len() as u64;

        let skipped = match &self.after {
            Some(cursor) => matched
                .iter()
                .position(|(key, _)| self.compare(key, cursor.key()) == Ordering::Greater)
                .unwrap_or(matched.len()),
            None => 0,
        };

        let mut hits = Vec::new();
        let mut sort = None;
        for (key, mut object) in matched.into_iter().skip(skipped).take(self.size) {
            object.strip_private_extras();
            hits.push(object);
            sort = Some(key);
        }

        SearchResults {
            query: self.clone(),
            hits,
            sort,
            elapsed: started.elapsed(),
            total,
        }
    }
}

/// One page of search hits.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub query: Query,
    pub hits: Vec<Object>,
    /// Last hit's sort key; the next page's cursor.
    pub sort: Option<SortKey>,
    pub elapsed: Duration,
    pub total: u64,
}

impl SearchResults {
    pub fn first(&self) -> Option<&Object> {
        self.hits.first()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The query for the page after this one.
    pub fn more(&self) -> Query {
        Query {
            after: self.sort.clone().map(Cursor::new),
            ..self.query.clone()
        }
    }
}
