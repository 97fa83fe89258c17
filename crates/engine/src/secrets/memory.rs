use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::SecretStore;

/// Secret store backed by an in-process map.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one secret.
    pub fn with_secret(id: impl Into<String>, secret: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), secret.into());
        store
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, id: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn set(&self, id: &str, secret: &str) -> bool {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), secret.to_string());
        true
    }

    fn delete(&self, id: &str) -> bool {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let store = MemorySecretStore::new();
        assert_eq!(store.get("prod"), None);

        assert!(store.set("prod", "hunter2"));
        assert_eq!(store.get("prod"), Some("hunter2".to_string()));

        assert!(store.delete("prod"));
        assert!(!store.delete("prod"));
        assert_eq!(store.get("prod"), None);
    }

    #[test]
    fn test_with_secret() {
        let store = MemorySecretStore::with_secret("db", "s3cret");
        assert_eq!(store.get("db").as_deref(), Some("s3cret"));
    }
}
