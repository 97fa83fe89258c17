//! Password storage collaborator.
//!
//! Sessions resolve passwords by session id through the [`SecretStore`]
//! trait. The store is injected when a session is created; there is no
//! process-wide instance.
//!
//! - [`KeyringStore`]: the OS keychain via the `keyring` crate
//! - [`MemorySecretStore`]: in-process map, for tests and one-shot use

pub mod keychain;
mod memory;

pub use keychain::{KeychainBackend, KeychainError, KeychainResult, KeyringStore, SystemKeychain};
pub use memory::MemorySecretStore;

/// Get/set/delete a password by session id.
///
/// Failures are reported as absence (`None` / `false`), never as errors:
/// a missing secret is an expected state for callers.
pub trait SecretStore: Send + Sync {
    /// Returns the stored secret, or `None` if absent or unreadable.
    fn get(&self, id: &str) -> Option<String>;

    /// Stores a secret. Returns `false` if it could not be stored.
    fn set(&self, id: &str, secret: &str) -> bool;

    /// Removes a secret. Returns `false` if nothing was removed.
    fn delete(&self, id: &str) -> bool;
}
