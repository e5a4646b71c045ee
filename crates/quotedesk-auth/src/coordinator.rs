//! Single-flight refresh coordination.
//!
//! At most one token refresh is in flight at any time. The first
//! expiry signal starts it; signals that arrive while it runs attach
//! to it instead of starting another. Queued requests are replayed in
//! arrival order after a successful refresh, and all fail with
//! `SessionExpired` after a failed one.
//!
//! Lock order is always queue before controller state; the controller
//! never takes the queue lock.

use crate::auth_api::AuthApi;
use crate::controller::SessionController;
use crate::http::{ApiRequest, ApiResponse, HttpSender};
use crate::types::SessionStatus;
use crate::{AuthError, AuthResult};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A request parked while its access token is re-minted.
struct PendingRequest {
    id: Uuid,
    request: ApiRequest,
    reply: oneshot::Sender<AuthResult<ApiResponse>>,
}

pub struct RefreshCoordinator {
    api: AuthApi,
    sender: HttpSender,
    controller: Arc<SessionController>,
    /// Requests awaiting replay. The same lock serializes the
    /// start-versus-attach decision, so two simultaneous expiry
    /// signals cannot both start a refresh.
    pending: Mutex<VecDeque<PendingRequest>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        api: AuthApi,
        sender: HttpSender,
        controller: Arc<SessionController>,
    ) -> Self {
        Self {
            api,
            sender,
            controller,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Recover from an expiry signal: park the request, start or join
    /// the refresh, and deliver the replay outcome. The caller never
    /// sees the 401 that brought us here.
    pub(crate) async fn recover(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let id = Uuid::new_v4();

        let drives_refresh = {
            let mut pending = self.pending.lock().await;

            match self.controller.begin_refresh() {
                Ok(()) => {
                    debug!(request_id = %id, "expiry signal, starting refresh");
                    pending.push_back(PendingRequest {
                        id,
                        request,
                        reply: reply_tx,
                    });
                    true
                }
                Err(_) if self.controller.status() == SessionStatus::Refreshing => {
                    debug!(
                        request_id = %id,
                        queued = pending.len() + 1,
                        "expiry signal, attaching to refresh in flight"
                    );
                    pending.push_back(PendingRequest {
                        id,
                        request,
                        reply: reply_tx,
                    });
                    false
                }
                Err(e) => {
                    debug!(request_id = %id, error = %e, "expiry signal with no refreshable session");
                    return Err(AuthError::SessionExpired);
                }
            }
        };

        if drives_refresh {
            self.run_refresh().await;
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            // The driver went away mid-teardown; nothing left to wait for.
            Err(_) => Err(AuthError::SessionExpired),
        }
    }

    /// Drive one refresh attempt end to end. Exactly one task runs
    /// this per refresh cycle.
    async fn run_refresh(&self) {
        let result = match self.controller.refresh_token() {
            Some(token) => self.api.refresh(&token).await,
            // Torn down between the signal and now (concurrent logout).
            None => Err(AuthError::NotAuthenticated),
        };

        match result {
            Ok(tokens) => {
                // Commit and drain under the queue lock: a signal that
                // arrives after the commit starts a fresh cycle instead
                // of attaching to this finished one.
                let (committed, drained) = {
                    let mut pending = self.pending.lock().await;
                    let committed = self
                        .controller
                        .commit_refresh(&tokens.access_token, tokens.refresh_token.as_deref());
                    (committed, pending.drain(..).collect::<Vec<_>>())
                };

                match committed {
                    Ok(()) => {
                        info!(replaying = drained.len(), "refresh succeeded, replaying held requests");
                        self.replay(drained, &tokens.access_token).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh commit rejected, failing held requests");
                        self.fail_queued(drained);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, expiring session");
                let drained: Vec<_> = {
                    let mut pending = self.pending.lock().await;
                    self.controller.mark_refresh_failed();
                    pending.drain(..).collect()
                };

                self.fail_queued(drained);
                self.controller.force_logout().await;
            }
        }
    }

    /// Replay in arrival order, delivering each result to its caller.
    /// A replay that is rejected again resolves that caller with
    /// `SessionExpired`; it never starts a second refresh.
    async fn replay(&self, drained: Vec<PendingRequest>, access_token: &str) {
        for pending in drained {
            let outcome = match self.sender.send(&pending.request, Some(access_token)).await {
                Ok(response) if response.status == StatusCode::UNAUTHORIZED => {
                    warn!(request_id = %pending.id, "replayed request rejected again");
                    Err(AuthError::SessionExpired)
                }
                other => other,
            };

            // A closed receiver means the caller gave up waiting.
            let _ = pending.reply.send(outcome);
        }
    }

    fn fail_queued(&self, drained: Vec<PendingRequest>) {
        for pending in drained {
            debug!(request_id = %pending.id, "failing held request");
            let _ = pending.reply.send(Err(AuthError::SessionExpired));
        }
    }
}
