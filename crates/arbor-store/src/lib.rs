//! Search-backed document storage.
//!
//! Three logical record kinds live under a configurable namespace prefix:
//! canonical documents keyed by identifier, denormalized collection
//! membership rows, and account records. The [`Store`] trait is the
//! contract consumed by the bus and worker; [`MemoryStore`] backs tests and
//! development, [`RedisStore`] backs deployments.

pub mod config;
pub mod error;
pub mod memory;
pub mod query;
pub mod redis;
pub mod storage;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{Cursor, Query, SearchResults, SortKey, SortOrder, SortSpec};
pub use crate::redis::RedisStore;
pub use storage::{Kind, Store, TESTING_NAMESPACE};
