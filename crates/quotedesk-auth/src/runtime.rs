//! Client runtime composition.
//!
//! `SessionRuntime` wires the credential vault, the session
//! controller, the refresh coordinator, and the request pipeline into
//! the one surface the dashboard talks to.

use crate::auth_api::{AuthApi, UserEnvelope, PROFILE_PATH};
use crate::controller::SessionController;
use crate::coordinator::RefreshCoordinator;
use crate::http::{ApiRequest, ApiResponse, HttpSender};
use crate::pipeline::RequestPipeline;
use crate::types::{Preferences, Session, SessionCallback, SessionStatus, UserProfile};
use crate::{AuthError, AuthResult};
use quotedesk_core::Config;
use quotedesk_storage::{CredentialStorage, CredentialVault};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// A partial profile update. Only fields that are present are sent to
/// the server; the rest of the profile is untouched.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

pub struct SessionRuntime {
    controller: Arc<SessionController>,
    pipeline: RequestPipeline,
}

impl SessionRuntime {
    /// Build a runtime from configuration and a storage backend.
    pub fn new(config: &Config, storage: Box<dyn CredentialStorage>) -> AuthResult<Self> {
        let base_url = config
            .api_base_url()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        Self::with_base_url(base_url, storage)
    }

    /// Build a runtime against an explicit base URL.
    pub fn with_base_url(base_url: Url, storage: Box<dyn CredentialStorage>) -> AuthResult<Self> {
        let sender = HttpSender::new(base_url)?;
        let api = AuthApi::new(sender.clone());
        let vault = CredentialVault::new(storage);
        let controller = Arc::new(SessionController::new(vault, api.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(
            api,
            sender.clone(),
            controller.clone(),
        ));
        let pipeline = RequestPipeline::new(sender, controller.clone(), coordinator);

        Ok(Self {
            controller,
            pipeline,
        })
    }

    // ==========================================
    // Session lifecycle
    // ==========================================

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.controller.login(email, password).await
    }

    pub async fn login_with_provider(&self, provider_token: &str) -> AuthResult<Session> {
        self.controller.login_with_provider(provider_token).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Session> {
        self.controller.register(email, password, display_name).await
    }

    pub async fn logout(&self) -> AuthResult<()> {
        self.controller.logout().await
    }

    /// Restore a persisted session, validating it with the server when
    /// the server is reachable.
    pub async fn restore_session(&self) -> AuthResult<bool> {
        self.controller.restore_session().await
    }

    // ==========================================
    // Requests
    // ==========================================

    /// Send a request through the authorized pipeline.
    pub async fn request(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.pipeline.send(request).await
    }

    // ==========================================
    // Profile
    // ==========================================

    /// Fetch the server's copy of the profile and refresh the local
    /// snapshot with it.
    pub async fn fetch_profile(&self) -> AuthResult<UserProfile> {
        let response = self
            .pipeline
            .send(ApiRequest::get(PROFILE_PATH))
            .await?
            .error_for_status()?;

        let envelope: UserEnvelope = response.json()?;
        self.controller.apply_confirmed_profile(envelope.user.clone());
        Ok(envelope.user)
    }

    /// Update the profile. The local snapshot changes only after the
    /// server confirms; a rejected update leaves it untouched.
    pub async fn update_profile(&self, patch: ProfilePatch) -> AuthResult<UserProfile> {
        let body = serde_json::to_value(&patch)?;
        let response = self
            .pipeline
            .send(ApiRequest::put(PROFILE_PATH, body))
            .await?
            .error_for_status()?;

        let envelope: UserEnvelope = response.json()?;
        self.controller.apply_confirmed_profile(envelope.user.clone());
        Ok(envelope.user)
    }

    /// Replace the preference map on the server, then locally.
    pub async fn update_preferences(&self, preferences: Preferences) -> AuthResult<UserProfile> {
        self.update_profile(ProfilePatch {
            preferences: Some(preferences),
            ..Default::default()
        })
        .await
    }

    /// Local preference cache. Survives logout so the next sign-in
    /// starts from familiar dashboard settings.
    pub fn cached_preferences(&self) -> Option<Preferences> {
        self.controller.cached_preferences()
    }

    // ==========================================
    // Observation
    // ==========================================

    pub fn session(&self) -> Session {
        self.controller.session()
    }

    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.controller.user()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.controller.subscribe_status()
    }

    pub fn set_state_callback(&self, callback: SessionCallback) {
        self.controller.set_state_callback(callback)
    }
}
