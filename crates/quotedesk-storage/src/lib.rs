//! Credential persistence for the quotedesk client.
//!
//! A flat key/value store holds the string-serialized session
//! (access token, refresh token, user snapshot) plus the UI preference
//! map. The default backend is a single JSON file under the client's
//! base directory; an in-memory backend serves tests and ephemeral
//! sessions.

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::CredentialStorage;
pub use vault::{CredentialVault, StoredCredentials};

use quotedesk_core::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default storage implementation (file-backed, under the
/// client's base directory).
pub fn create_storage(paths: &Paths) -> Box<dyn CredentialStorage> {
    Box::new(FileStorage::for_paths(paths))
}

/// Create a CredentialVault over the default storage.
pub fn create_credential_vault(paths: &Paths) -> CredentialVault {
    CredentialVault::new(create_storage(paths))
}
