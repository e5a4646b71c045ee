//! High-level API for the persisted session.

use crate::{CredentialStorage, StorageKeys, StorageResult};
use tracing::debug;

/// Credentials as last saved to the store.
///
/// `user_json` stays string-typed here; the session layer owns the
/// profile schema and decides what a corrupt snapshot means.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub user_json: Option<String>,
}

/// High-level API for storing and retrieving the session.
pub struct CredentialVault {
    storage: Box<dyn CredentialStorage>,
}

impl CredentialVault {
    /// Create a new vault with the given storage backend
    pub fn new(storage: Box<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Session
    // ==========================================

    /// Store a complete session (tokens + user snapshot) in one commit.
    pub fn save_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        user_json: &str,
    ) -> StorageResult<()> {
        debug!("persisting session");
        self.storage.set_many(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
            (StorageKeys::USER, user_json),
        ])
    }

    /// Store a refreshed access token, leaving the rest of the session intact.
    pub fn save_access_token(&self, access_token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)
    }

    /// Store a refreshed token pair in one commit (refresh token rotation).
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        self.storage.set_many(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
        ])
    }

    /// Store the user profile snapshot alone (profile update).
    pub fn save_user(&self, user_json: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::USER, user_json)
    }

    /// Load whatever session was last saved.
    ///
    /// Returns `None` unless both tokens are present and non-empty; a
    /// missing user snapshot is fine (the server copy is authoritative).
    pub fn load_session(&self) -> StorageResult<Option<StoredCredentials>> {
        let access_token = self.storage.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh_token = self.storage.get(StorageKeys::REFRESH_TOKEN)?;

        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token))
                if !access_token.is_empty() && !refresh_token.is_empty() =>
            {
                let user_json = self.storage.get(StorageKeys::USER)?;
                Ok(Some(StoredCredentials {
                    access_token,
                    refresh_token,
                    user_json,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Check if a session exists
    pub fn has_session(&self) -> StorageResult<bool> {
        let has_access = self.storage.has(StorageKeys::ACCESS_TOKEN)?;
        let has_refresh = self.storage.has(StorageKeys::REFRESH_TOKEN)?;
        Ok(has_access && has_refresh)
    }

    /// Clear the session keys in one commit. Preferences are kept.
    /// Idempotent.
    pub fn clear_session(&self) -> StorageResult<()> {
        debug!("clearing persisted session");
        self.storage.delete_many(&[
            StorageKeys::ACCESS_TOKEN,
            StorageKeys::REFRESH_TOKEN,
            StorageKeys::USER,
        ])
    }

    // ==========================================
    // Preferences
    // ==========================================

    /// Store the UI preference map (JSON). Survives logout.
    pub fn save_preferences(&self, preferences_json: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::PREFERENCES, preferences_json)
    }

    /// Retrieve the UI preference map (JSON)
    pub fn load_preferences(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::PREFERENCES)
    }
}
