//! Session data types shared across the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form preference map attached to a user profile.
///
/// The dashboard treats this as opaque key/value data (theme, layout,
/// default watchlists); the server is the authority on its contents.
pub type Preferences = serde_json::Map<String, serde_json::Value>;

/// Snapshot of the signed-in user.
///
/// A cached copy of what the server last told us. It is refreshed on
/// login, on session validation, and whenever a profile call confirms
/// a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session; unauthenticated requests only
    Anonymous,
    /// A login or registration call is in flight
    Authenticating,
    /// Session holds a server-accepted access token
    Authenticated,
    /// Access token was rejected; a refresh is in flight
    Refreshing,
    /// Refresh failed; forced logout is imminent
    Expired,
}

impl SessionStatus {
    /// Check if the session currently holds tokens
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated | SessionStatus::Refreshing)
    }

    /// Check if the status is a short-lived in-between state
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionStatus::Authenticating | SessionStatus::Refreshing)
    }
}

/// The in-memory session for the running client.
///
/// Either both tokens and the user are present (an authenticated
/// session) or all three are `None` (anonymous). The controller keeps
/// that pairing atomic: tokens are never cleared while the user
/// snapshot stays behind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub status: SessionStatus,
}

impl Session {
    /// The empty session every process starts from.
    pub fn anonymous() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user: None,
            status: SessionStatus::Anonymous,
        }
    }
}

/// Payload for session state change notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    /// New session status
    pub status: SessionStatus,
    /// User ID if a user is signed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if a user is signed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Callback type for session state change notifications
pub type SessionCallback = Box<dyn Fn(SessionChangedPayload) + Send + Sync>;
