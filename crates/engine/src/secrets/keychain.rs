//! Keychain-backed secret store.
//!
//! This module provides cross-platform keychain access using the `keyring` crate:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (via D-Bus)

use thiserror::Error;

use super::SecretStore;

/// The service name used for keychain entries.
const SERVICE_NAME: &str = "sshterm";

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// The requested entry was not found in the keychain.
    #[error("Entry not found in keychain: {0}")]
    NotFound(String),

    /// Access to the keychain was denied.
    #[error("Keychain access denied: {0}")]
    AccessDenied(String),

    /// The keychain service is unavailable.
    #[error("Keychain service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The secret could not be encoded for storage.
    #[error("Secret encoding error: {0}")]
    EncodingError(String),

    /// A platform-specific keychain error occurred.
    #[error("Keychain error: {0}")]
    PlatformError(String),
}

/// Result type for keychain operations.
pub type KeychainResult<T> = Result<T, KeychainError>;

/// Trait for keychain backend implementations.
///
/// This trait allows for different keychain implementations, including
/// a mock backend for testing purposes.
pub trait KeychainBackend: Send + Sync {
    /// Retrieve a secret from the keychain.
    fn get_secret(&self, service: &str, key: &str) -> KeychainResult<String>;

    /// Store a secret in the keychain.
    fn set_secret(&self, service: &str, key: &str, value: &str) -> KeychainResult<()>;

    /// Delete a secret from the keychain.
    fn delete_secret(&self, service: &str, key: &str) -> KeychainResult<()>;
}

impl KeychainError {
    /// Classifies a `keyring` failure for entry `key`.
    fn from_keyring(key: &str, error: keyring::Error) -> Self {
        use keyring::Error;

        match error {
            Error::NoEntry => Self::NotFound(key.to_string()),
            Error::NoStorageAccess(e) => Self::AccessDenied(e.to_string()),
            Error::PlatformFailure(e) => Self::ServiceUnavailable(e.to_string()),
            Error::BadEncoding(_) => Self::EncodingError(format!("secret for {key} is not UTF-8")),
            Error::TooLong(attribute, limit) => {
                Self::EncodingError(format!("{attribute} exceeds {limit} characters"))
            }
            other => Self::PlatformError(other.to_string()),
        }
    }
}

/// The OS keychain, one `keyring` entry per `(service, key)`.
pub struct SystemKeychain;

impl SystemKeychain {
    fn entry(service: &str, key: &str) -> KeychainResult<keyring::Entry> {
        keyring::Entry::new(service, key).map_err(|e| KeychainError::from_keyring(key, e))
    }
}

impl KeychainBackend for SystemKeychain {
    fn get_secret(&self, service: &str, key: &str) -> KeychainResult<String> {
        Self::entry(service, key)?
            .get_password()
            .map_err(|e| KeychainError::from_keyring(key, e))
    }

    fn set_secret(&self, service: &str, key: &str, value: &str) -> KeychainResult<()> {
        Self::entry(service, key)?
            .set_password(value)
            .map_err(|e| KeychainError::from_keyring(key, e))
    }

    fn delete_secret(&self, service: &str, key: &str) -> KeychainResult<()> {
        Self::entry(service, key)?
            .delete_credential()
            .map_err(|e| KeychainError::from_keyring(key, e))
    }
}

/// Mock keychain backend for testing.
#[cfg(test)]
pub struct MockKeychain {
    storage: std::sync::Mutex<std::collections::HashMap<String, String>>,
    deny_access: bool,
}

#[cfg(test)]
impl MockKeychain {
    /// Create a new mock keychain.
    pub fn new() -> Self {
        Self {
            storage: std::sync::Mutex::new(std::collections::HashMap::new()),
            deny_access: false,
        }
    }

    /// Create a mock keychain that rejects every operation.
    pub fn locked() -> Self {
        Self {
            deny_access: true,
            ..Self::new()
        }
    }

    fn make_key(service: &str, key: &str) -> String {
        format!("{}:{}", service, key)
    }

    fn check_access(&self) -> KeychainResult<()> {
        if self.deny_access {
            return Err(KeychainError::AccessDenied("locked".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeychainBackend for MockKeychain {
    fn get_secret(&self, service: &str, key: &str) -> KeychainResult<String> {
        self.check_access()?;
        let storage = self.storage.lock().unwrap();
        storage
            .get(&Self::make_key(service, key))
            .cloned()
            .ok_or_else(|| KeychainError::NotFound(key.to_string()))
    }

    fn set_secret(&self, service: &str, key: &str, value: &str) -> KeychainResult<()> {
        self.check_access()?;
        let mut storage = self.storage.lock().unwrap();
        storage.insert(Self::make_key(service, key), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, service: &str, key: &str) -> KeychainResult<()> {
        self.check_access()?;
        let mut storage = self.storage.lock().unwrap();
        if storage.remove(&Self::make_key(service, key)).is_some() {
            Ok(())
        } else {
            Err(KeychainError::NotFound(key.to_string()))
        }
    }
}

/// [`SecretStore`] over a keychain backend.
///
/// Backend errors are logged and reported as absence.
pub struct KeyringStore<B: KeychainBackend = SystemKeychain> {
    backend: B,
    service: String,
}

impl<B: KeychainBackend> KeyringStore<B> {
    /// Create a store with the given backend and the default service name.
    pub fn new(backend: B) -> Self {
        Self::with_service(backend, SERVICE_NAME)
    }

    /// Create a store with a custom service name.
    pub fn with_service(backend: B, service: impl Into<String>) -> Self {
        Self {
            backend,
            service: service.into(),
        }
    }

    /// The keychain service entries are stored under.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl KeyringStore<SystemKeychain> {
    /// Create a store over the system keychain.
    pub fn system() -> Self {
        Self::new(SystemKeychain)
    }
}

impl<B: KeychainBackend> SecretStore for KeyringStore<B> {
    fn get(&self, id: &str) -> Option<String> {
        match self.backend.get_secret(&self.service, id) {
            Ok(secret) => Some(secret),
            Err(KeychainError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to read secret from keychain");
                None
            }
        }
    }

    fn set(&self, id: &str, secret: &str) -> bool {
        match self.backend.set_secret(&self.service, id, secret) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to store secret in keychain");
                false
            }
        }
    }

    fn delete(&self, id: &str) -> bool {
        match self.backend.delete_secret(&self.service, id) {
            Ok(()) => true,
            Err(KeychainError::NotFound(_)) => false,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to delete secret from keychain");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> KeyringStore<MockKeychain> {
        KeyringStore::new(MockKeychain::new())
    }

    #[test]
    fn test_store_and_get() {
        let store = create_test_store();

        assert!(store.set("conn-1", "p@ss"));
        assert_eq!(store.get("conn-1"), Some("p@ss".to_string()));
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = create_test_store();
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        store.set("conn-1", "p@ss");

        assert!(store.delete("conn-1"));
        assert_eq!(store.get("conn-1"), None);
        assert!(!store.delete("conn-1"));
    }

    #[test]
    fn test_overwrite_existing() {
        let store = create_test_store();
        store.set("conn-1", "first");
        store.set("conn-1", "second");

        assert_eq!(store.get("conn-1"), Some("second".to_string()));
    }

    #[test]
    fn test_backend_errors_become_absence() {
        let store = KeyringStore::new(MockKeychain::locked());

        assert_eq!(store.get("conn-1"), None);
        assert!(!store.set("conn-1", "p@ss"));
        assert!(!store.delete("conn-1"));
    }

    #[test]
    fn test_keyring_error_mapping() {
        assert!(matches!(
            KeychainError::from_keyring("conn-1", keyring::Error::NoEntry),
            KeychainError::NotFound(key) if key == "conn-1"
        ));
        assert!(matches!(
            KeychainError::from_keyring("conn-1", keyring::Error::BadEncoding(vec![0xff])),
            KeychainError::EncodingError(_)
        ));
        assert!(matches!(
            KeychainError::from_keyring("conn-1", keyring::Error::TooLong("password".into(), 256)),
            KeychainError::EncodingError(msg) if msg == "password exceeds 256 characters"
        ));
        assert!(matches!(
            KeychainError::from_keyring(
                "conn-1",
                keyring::Error::Invalid("service".into(), "empty".into())
            ),
            KeychainError::PlatformError(_)
        ));
    }

    #[test]
    fn test_service_names_are_isolated() {
        let store = KeyringStore::with_service(MockKeychain::new(), "custom-service");
        assert_eq!(store.service(), "custom-service");

        store.set("conn-1", "value");
        assert_eq!(
            store.backend.get_secret("sshterm", "conn-1").ok(),
            None,
            "entries must live under the configured service"
        );
    }
}
