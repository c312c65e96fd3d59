use serde::{Deserialize, Serialize};

use crate::storage::TESTING_NAMESPACE;

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL.
    pub url: String,

    /// Key-space prefix isolating this deployment's records; the testing
    /// prefix additionally unlocks the full-wipe operation.
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: String::new(),
        }
    }
}

impl StoreConfig {
    /// Settings pointed at the test namespace.
    pub fn testing() -> Self {
        Self {
            namespace: TESTING_NAMESPACE.to_string(),
            ..Self::default()
        }
    }
}
