//! Session lifecycle controller.
//!
//! Owns the in-memory session, the state machine, and the credential
//! vault. Every mutation of session state in the process goes through
//! this type; the pipeline and the refresh coordinator only read from
//! it or drive it through the `pub(crate)` refresh hooks.
//!
//! Storage is treated as a cache of the in-memory session. When a
//! write fails the session keeps working for the life of the process
//! and the failure is logged; it is never surfaced to login or refresh
//! callers as a hard error.

use crate::auth_api::{AuthApi, TokenGrant};
use crate::session_fsm::{SessionMachine, SessionMachineInput};
use crate::types::{
    Preferences, Session, SessionCallback, SessionChangedPayload, SessionStatus, UserProfile,
};
use crate::{AuthError, AuthResult};
use quotedesk_storage::CredentialVault;
use std::sync::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct SessionController {
    vault: CredentialVault,
    api: AuthApi,
    /// In-memory session; authoritative for this process.
    session: RwLock<Session>,
    /// State machine guarding every status change.
    fsm: Mutex<SessionMachine>,
    /// Status fan-out for the pipeline and UI subscribers.
    status_tx: watch::Sender<SessionStatus>,
    /// Optional callback invoked on every status change.
    state_callback: Mutex<Option<SessionCallback>>,
}

impl SessionController {
    pub fn new(vault: CredentialVault, api: AuthApi) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Anonymous);
        Self {
            vault,
            api,
            session: RwLock::new(Session::anonymous()),
            fsm: Mutex::new(SessionMachine::new()),
            status_tx,
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionCallback) {
        let mut cb = self.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Subscribe to status changes. The receiver always reports the
    /// latest status, including the value current at subscribe time.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        self.session.read().unwrap().status
    }

    /// Snapshot of the in-memory session.
    pub fn session(&self) -> Session {
        self.session.read().unwrap().clone()
    }

    /// Current user snapshot, if signed in.
    pub fn user(&self) -> Option<UserProfile> {
        self.session.read().unwrap().user.clone()
    }

    /// Access token as of this instant. The pipeline reads this at
    /// send time rather than caching it per request.
    pub fn access_token(&self) -> Option<String> {
        self.session.read().unwrap().access_token.clone()
    }

    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.session.read().unwrap().refresh_token.clone()
    }

    /// Apply a state machine input and publish the resulting status.
    ///
    /// The status field and the watch channel are updated while the
    /// machine lock is held, so subscribers never observe transitions
    /// out of order.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionStatus> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_status = SessionStatus::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_status = SessionStatus::from(fsm.state());
        let changed = old_status != new_status;
        if changed {
            self.session.write().unwrap().status = new_status;
            let _ = self.status_tx.send(new_status);
        }
        drop(fsm);

        if changed {
            debug!(old_status = ?old_status, new_status = ?new_status, "session state transition");
            self.notify_state_change(new_status);
        }

        Ok(new_status)
    }

    fn notify_state_change(&self, status: SessionStatus) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            let (user_id, email) = {
                let session = self.session.read().unwrap();
                match &session.user {
                    Some(user) => (Some(user.id.clone()), Some(user.email.clone())),
                    None => (None, None),
                }
            };
            callback(SessionChangedPayload {
                status,
                user_id,
                email,
            });
        }
    }

    // ==========================================
    // Login and registration
    // ==========================================

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        debug!(email = %email, "attempting login");

        match self.api.login(email, password).await {
            Ok(grant) => self.complete_login(grant),
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                Err(e)
            }
        }
    }

    /// Log in by exchanging a federated provider token.
    pub async fn login_with_provider(&self, provider_token: &str) -> AuthResult<Session> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        debug!("attempting provider login");

        match self.api.login_with_provider(provider_token).await {
            Ok(grant) => self.complete_login(grant),
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                Err(e)
            }
        }
    }

    /// Create an account and sign in with it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Session> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        debug!(email = %email, "attempting registration");

        match self.api.register(email, password, display_name).await {
            Ok(grant) => self.complete_login(grant),
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                Err(e)
            }
        }
    }

    /// Install a server-issued token grant: update the in-memory
    /// session, persist it, then transition.
    pub(crate) fn complete_login(&self, grant: TokenGrant) -> AuthResult<Session> {
        {
            let mut session = self.session.write().unwrap();
            session.access_token = Some(grant.access_token.clone());
            session.refresh_token = Some(grant.refresh_token.clone());
            session.user = Some(grant.user.clone());
        }

        self.persist_session(&grant.access_token, &grant.refresh_token, &grant.user);
        self.transition(&SessionMachineInput::LoginSucceeded)?;

        info!(user_id = %grant.user.id, "login successful");
        Ok(self.session())
    }

    // ==========================================
    // Logout
    // ==========================================

    /// Log out: best-effort server notification, then local teardown.
    ///
    /// The server call never blocks teardown; a failure is logged and
    /// swallowed. Logging out while anonymous is a no-op.
    pub async fn logout(&self) -> AuthResult<()> {
        let access_token = {
            let session = self.session.read().unwrap();
            if session.status == SessionStatus::Anonymous {
                debug!("logout requested while anonymous, nothing to do");
                return Ok(());
            }
            session.access_token.clone()
        };

        if let Some(token) = access_token {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "server logout failed, clearing local session anyway");
            }
        }

        self.teardown_local_session();
        info!("logged out");
        Ok(())
    }

    /// Clear tokens, user, and persisted credentials in one sweep.
    fn teardown_local_session(&self) {
        if let Err(e) = self.vault.clear_session() {
            warn!(error = %e, "could not clear persisted session");
        }

        {
            let mut session = self.session.write().unwrap();
            session.access_token = None;
            session.refresh_token = None;
            session.user = None;
        }

        let _ = self.transition(&SessionMachineInput::Logout);
    }

    // ==========================================
    // Restore
    // ==========================================

    /// Restore the persisted session at process start.
    ///
    /// Returns `Ok(true)` when a session was restored and `Ok(false)`
    /// when none exists, including when the stored data is corrupt or
    /// the store cannot be read. Server rejection of the stored token
    /// clears it like a logout; an unreachable server keeps the local
    /// session so the dashboard works offline.
    pub async fn restore_session(&self) -> AuthResult<bool> {
        let stored = match self.vault.load_session() {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                info!("no stored session found");
                return Ok(false);
            }
            Err(e) => {
                warn!(error = %e, "credential store unavailable, starting anonymous");
                return Ok(false);
            }
        };

        // A corrupt user snapshot degrades to "no snapshot"; server
        // verification below repopulates it when it can.
        let stored_user: Option<UserProfile> = stored
            .user_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok());

        match self.api.verify(&stored.access_token).await {
            Ok(user) => {
                {
                    let mut session = self.session.write().unwrap();
                    session.access_token = Some(stored.access_token.clone());
                    session.refresh_token = Some(stored.refresh_token.clone());
                    session.user = Some(user.clone());
                }
                self.persist_session(&stored.access_token, &stored.refresh_token, &user);
                self.transition(&SessionMachineInput::Restored)?;
                info!(user_id = %user.id, "session restored");
                Ok(true)
            }
            Err(AuthError::SessionInvalid(reason)) => {
                warn!(reason = %reason, "stored session rejected by server, clearing");
                self.teardown_local_session();
                Ok(false)
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "could not verify stored session, restoring from local data");
                {
                    let mut session = self.session.write().unwrap();
                    session.access_token = Some(stored.access_token);
                    session.refresh_token = Some(stored.refresh_token);
                    session.user = stored_user;
                }
                self.transition(&SessionMachineInput::Restored)?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    // ==========================================
    // Refresh hooks (driven by the coordinator)
    // ==========================================

    /// Enter the refreshing state. Fails when no refresh is possible,
    /// either because there is no refresh token or because the machine
    /// is not in a state that accepts an expiry signal.
    pub(crate) fn begin_refresh(&self) -> AuthResult<()> {
        if self.refresh_token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        self.transition(&SessionMachineInput::TokenRejected)?;
        Ok(())
    }

    /// Commit a successful refresh: persist first, then swap the
    /// in-memory tokens, then leave the refreshing state. The storage
    /// write completes before any caller can observe the new token.
    pub(crate) fn commit_refresh(
        &self,
        access_token: &str,
        rotated_refresh_token: Option<&str>,
    ) -> AuthResult<()> {
        if self.status() != SessionStatus::Refreshing {
            return Err(AuthError::InvalidStateTransition(
                "refresh commit outside refreshing state".to_string(),
            ));
        }

        let persisted = match rotated_refresh_token {
            Some(refresh_token) => self.vault.save_tokens(access_token, refresh_token),
            None => self.vault.save_access_token(access_token),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "refreshed token persist failed, continuing in memory only");
        }

        {
            let mut session = self.session.write().unwrap();
            session.access_token = Some(access_token.to_string());
            if let Some(refresh_token) = rotated_refresh_token {
                session.refresh_token = Some(refresh_token.to_string());
            }
        }

        self.transition(&SessionMachineInput::RefreshSucceeded)?;
        info!(rotated = rotated_refresh_token.is_some(), "access token refreshed");
        Ok(())
    }

    /// Record a failed refresh. The session sits in `Expired` until
    /// the forced logout lands.
    pub(crate) fn mark_refresh_failed(&self) {
        let _ = self.transition(&SessionMachineInput::RefreshFailed);
    }

    /// Forced logout after a failed refresh. Same teardown as a user
    /// logout, server notification included.
    pub(crate) async fn force_logout(&self) {
        if let Some(token) = self.access_token() {
            if let Err(e) = self.api.logout(&token).await {
                debug!(error = %e, "server logout after failed refresh did not land");
            }
        }
        self.teardown_local_session();
        info!("session expired, forced logout complete");
    }

    // ==========================================
    // Profile
    // ==========================================

    /// Apply a server-confirmed profile to the session and the vault.
    /// Only called with responses the server has already accepted;
    /// there is no optimistic local mutation to roll back.
    pub(crate) fn apply_confirmed_profile(&self, user: UserProfile) {
        {
            let mut session = self.session.write().unwrap();
            session.user = Some(user.clone());
        }
        self.persist_user_snapshot(&user);
    }

    /// Local preference cache. Populated from server responses and
    /// kept across logouts.
    pub fn cached_preferences(&self) -> Option<Preferences> {
        self.vault
            .load_preferences()
            .ok()
            .flatten()
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    // ==========================================
    // Persistence helpers
    // ==========================================

    fn persist_session(&self, access_token: &str, refresh_token: &str, user: &UserProfile) {
        let user_json = serde_json::to_string(user).unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = self.vault.save_session(access_token, refresh_token, &user_json) {
            warn!(error = %e, "session persist failed, continuing in memory only");
        }
        self.cache_preferences(user);
    }

    fn persist_user_snapshot(&self, user: &UserProfile) {
        let user_json = serde_json::to_string(user).unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = self.vault.save_user(&user_json) {
            warn!(error = %e, "profile snapshot persist failed");
        }
        self.cache_preferences(user);
    }

    fn cache_preferences(&self, user: &UserProfile) {
        if user.preferences.is_empty() {
            return;
        }
        if let Ok(json) = serde_json::to_string(&user.preferences) {
            if let Err(e) = self.vault.save_preferences(&json) {
                warn!(error = %e, "preference cache update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpSender;
    use quotedesk_storage::MemoryStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_controller() -> SessionController {
        // Port 9 is never listening; unit tests only exercise paths
        // that stay off the network.
        let base_url = url::Url::parse("http://127.0.0.1:9").unwrap();
        let sender = HttpSender::new(base_url).unwrap();
        let api = AuthApi::new(sender);
        let vault = CredentialVault::new(Box::new(MemoryStorage::new()));
        SessionController::new(vault, api)
    }

    fn test_grant() -> TokenGrant {
        let user: UserProfile = serde_json::from_value(json!({
            "id": "user-1",
            "email": "trader@example.com",
            "displayName": "Trader One",
            "preferences": {"theme": "dark"}
        }))
        .unwrap();

        TokenGrant {
            user,
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
        }
    }

    fn authenticated_controller() -> SessionController {
        let controller = test_controller();
        controller
            .transition(&SessionMachineInput::LoginAttempt)
            .unwrap();
        controller.complete_login(test_grant()).unwrap();
        controller
    }

    #[test]
    fn test_initial_status_is_anonymous() {
        let controller = test_controller();
        assert_eq!(controller.status(), SessionStatus::Anonymous);
        assert!(controller.access_token().is_none());
        assert!(controller.user().is_none());
    }

    #[test]
    fn test_transition_updates_status_and_watch() {
        let controller = test_controller();
        let rx = controller.subscribe_status();

        controller
            .transition(&SessionMachineInput::LoginAttempt)
            .unwrap();

        assert_eq!(controller.status(), SessionStatus::Authenticating);
        assert_eq!(*rx.borrow(), SessionStatus::Authenticating);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let controller = test_controller();
        let result = controller.transition(&SessionMachineInput::RefreshSucceeded);
        assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));
        assert_eq!(controller.status(), SessionStatus::Anonymous);
    }

    #[test]
    fn test_complete_login_installs_session() {
        let controller = authenticated_controller();

        assert_eq!(controller.status(), SessionStatus::Authenticated);
        assert_eq!(controller.access_token().as_deref(), Some("access-1"));
        assert_eq!(controller.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(controller.user().unwrap().id, "user-1");
    }

    #[test]
    fn test_complete_login_caches_preferences() {
        let controller = authenticated_controller();
        let preferences = controller.cached_preferences().unwrap();
        assert_eq!(preferences["theme"], json!("dark"));
    }

    #[test]
    fn test_begin_refresh_requires_refresh_token() {
        let controller = test_controller();
        assert!(matches!(
            controller.begin_refresh(),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_begin_refresh_then_commit() {
        let controller = authenticated_controller();

        controller.begin_refresh().unwrap();
        assert_eq!(controller.status(), SessionStatus::Refreshing);

        controller.commit_refresh("access-2", None).unwrap();
        assert_eq!(controller.status(), SessionStatus::Authenticated);
        assert_eq!(controller.access_token().as_deref(), Some("access-2"));
        // Without rotation the old refresh token stays.
        assert_eq!(controller.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_commit_refresh_applies_rotation() {
        let controller = authenticated_controller();

        controller.begin_refresh().unwrap();
        controller
            .commit_refresh("access-2", Some("refresh-2"))
            .unwrap();

        assert_eq!(controller.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_commit_refresh_outside_refreshing_is_rejected() {
        let controller = authenticated_controller();
        let result = controller.commit_refresh("access-2", None);
        assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));
    }

    #[test]
    fn test_second_begin_refresh_is_rejected() {
        let controller = authenticated_controller();

        controller.begin_refresh().unwrap();
        assert!(matches!(
            controller.begin_refresh(),
            Err(AuthError::InvalidStateTransition(_))
        ));
        assert_eq!(controller.status(), SessionStatus::Refreshing);
    }

    #[test]
    fn test_mark_refresh_failed_enters_expired() {
        let controller = authenticated_controller();

        controller.begin_refresh().unwrap();
        controller.mark_refresh_failed();

        assert_eq!(controller.status(), SessionStatus::Expired);
        // Tokens are still in memory until the forced logout runs.
        assert!(controller.access_token().is_some());
    }

    #[test]
    fn test_teardown_clears_everything() {
        let controller = authenticated_controller();

        controller.teardown_local_session();

        assert_eq!(controller.status(), SessionStatus::Anonymous);
        assert!(controller.access_token().is_none());
        assert!(controller.refresh_token().is_none());
        assert!(controller.user().is_none());
    }

    #[test]
    fn test_teardown_keeps_preference_cache() {
        let controller = authenticated_controller();
        controller.teardown_local_session();
        assert!(controller.cached_preferences().is_some());
    }

    #[test]
    fn test_state_callback_fires_on_change() {
        let controller = test_controller();
        let count = Arc::new(AtomicUsize::new(0));

        let cb_count = count.clone();
        controller.set_state_callback(Box::new(move |_payload| {
            cb_count.fetch_add(1, Ordering::SeqCst);
        }));

        controller
            .transition(&SessionMachineInput::LoginAttempt)
            .unwrap();
        controller
            .transition(&SessionMachineInput::LoginFailed)
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_state_callback_payload_carries_user() {
        let controller = test_controller();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let cb_seen = seen.clone();
        controller.set_state_callback(Box::new(move |payload| {
            cb_seen.lock().unwrap().push(payload);
        }));

        controller
            .transition(&SessionMachineInput::LoginAttempt)
            .unwrap();
        controller.complete_login(test_grant()).unwrap();

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.status, SessionStatus::Authenticated);
        assert_eq!(last.user_id.as_deref(), Some("user-1"));
        assert_eq!(last.email.as_deref(), Some("trader@example.com"));
    }

    #[tokio::test]
    async fn test_logout_while_anonymous_is_noop() {
        let controller = test_controller();
        controller.logout().await.unwrap();
        assert_eq!(controller.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_restore_with_empty_store_is_false() {
        let controller = test_controller();
        let restored = controller.restore_session().await.unwrap();
        assert!(!restored);
        assert_eq!(controller.status(), SessionStatus::Anonymous);
    }
}
