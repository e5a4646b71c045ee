//! Typed client for the auth endpoints.
//!
//! These calls go straight through `HttpSender`, not through the
//! request pipeline: login, refresh, and verification must not be held
//! or replayed by the very machinery they feed.

use crate::http::{error_detail, ApiRequest, HttpSender};
use crate::types::UserProfile;
use crate::{AuthError, AuthResult};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub(crate) const LOGIN_PATH: &str = "/auth/login";
pub(crate) const REGISTER_PATH: &str = "/auth/register";
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";
pub(crate) const VERIFY_PATH: &str = "/auth/verify";
pub(crate) const PROFILE_PATH: &str = "/auth/profile";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderLoginRequest<'a> {
    provider_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    access_token: &'a str,
}

/// Token grant returned by login, registration, and provider exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenGrant {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh outcome. The refresh token is only present when the server
/// rotates it; otherwise the old one stays valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: UserProfile,
}

/// Thin typed wrapper over the auth endpoints.
#[derive(Clone)]
pub(crate) struct AuthApi {
    sender: HttpSender,
}

impl AuthApi {
    pub(crate) fn new(sender: HttpSender) -> Self {
        Self { sender }
    }

    pub(crate) async fn login(&self, email: &str, password: &str) -> AuthResult<TokenGrant> {
        let body = serde_json::to_value(LoginRequest { email, password })?;
        self.credential_exchange(LOGIN_PATH, body).await
    }

    pub(crate) async fn login_with_provider(&self, provider_token: &str) -> AuthResult<TokenGrant> {
        let body = serde_json::to_value(ProviderLoginRequest { provider_token })?;
        self.credential_exchange(LOGIN_PATH, body).await
    }

    pub(crate) async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<TokenGrant> {
        let body = serde_json::to_value(RegisterRequest {
            email,
            password,
            display_name,
        })?;
        self.credential_exchange(REGISTER_PATH, body).await
    }

    /// POST credentials and parse the grant. 4xx rejections come back
    /// as `InvalidCredentials` with the server's detail.
    async fn credential_exchange(&self, path: &str, body: Value) -> AuthResult<TokenGrant> {
        let request = ApiRequest::post(path, body);
        let response = self.sender.send(&request, None).await?;

        if !response.status.is_success() {
            warn!(status = %response.status, path, "credential exchange rejected");
            if response.status.is_client_error() {
                return Err(AuthError::InvalidCredentials(error_detail(&response.body)));
            }
            return Err(AuthError::Api {
                status: response.status,
                message: error_detail(&response.body),
            });
        }

        response.json()
    }

    /// Exchange the refresh token for a new access token. One attempt,
    /// no retry; the coordinator decides what a failure means.
    pub(crate) async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshedTokens> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let request = ApiRequest::post(REFRESH_PATH, body);

        debug!("exchanging refresh token");
        let response = self.sender.send(&request, None).await?;

        if !response.status.is_success() {
            warn!(status = %response.status, "token refresh rejected");
            return Err(AuthError::TokenRefresh(format!(
                "HTTP {}: {}",
                response.status,
                error_detail(&response.body)
            )));
        }

        response.json()
    }

    /// Check a stored access token against the server. Returns the
    /// server's copy of the user when the token is still accepted.
    /// Only a 4xx means the token itself was rejected; a server error
    /// classifies as transient so restore can fall back to local data.
    pub(crate) async fn verify(&self, access_token: &str) -> AuthResult<UserProfile> {
        let body = serde_json::to_value(VerifyRequest { access_token })?;
        let request = ApiRequest::post(VERIFY_PATH, body);

        let response = self.sender.send(&request, None).await?;

        if !response.status.is_success() {
            if response.status.is_client_error() {
                return Err(AuthError::SessionInvalid(format!(
                    "HTTP {}: {}",
                    response.status,
                    error_detail(&response.body)
                )));
            }
            return Err(AuthError::Api {
                status: response.status,
                message: error_detail(&response.body),
            });
        }

        let envelope: UserEnvelope = response.json()?;
        Ok(envelope.user)
    }

    /// Server-side logout. Callers treat failures as advisory.
    pub(crate) async fn logout(&self, access_token: &str) -> AuthResult<()> {
        let request = ApiRequest::new(Method::POST, LOGOUT_PATH);
        let response = self.sender.send(&request, Some(access_token)).await?;
        response.error_for_status()?;
        Ok(())
    }
}
