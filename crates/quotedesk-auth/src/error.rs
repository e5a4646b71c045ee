use thiserror::Error;

/// Session and authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The server rejected the supplied credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Internal expiry signal raised when a request comes back 401.
    /// Routed to the refresh coordinator; callers never see it.
    #[error("Access token expired")]
    TokenExpired,

    /// The session could not be recovered and the caller must re-login
    #[error("Session expired")]
    SessionExpired,

    /// The refresh endpoint rejected the refresh token
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// A stored session failed server-side validation
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// The operation requires an authenticated session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Session state machine rejected a transition
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// The server answered with an unexpected status
    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The credential store could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] quotedesk_storage::StorageError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Check if the error is transient (the operation may succeed later)
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable | AuthError::Timeout => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    true
                } else {
                    e.status().map(|s| s.is_server_error()).unwrap_or(false)
                }
            }
            AuthError::Api { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Result type for session operations
pub type AuthResult<T> = Result<T, AuthError>;
