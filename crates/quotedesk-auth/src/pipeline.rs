//! The authorized request pipeline.
//!
//! Every dashboard request flows through here. The pipeline attaches
//! the current access token at the moment of sending, parks new sends
//! while a refresh is in flight, and turns 401 responses into refresh
//! work instead of caller-visible failures. Callers either get their
//! response (possibly after a transparent refresh and replay) or a
//! terminal error such as `SessionExpired`.

use crate::coordinator::RefreshCoordinator;
use crate::controller::SessionController;
use crate::http::{ApiRequest, ApiResponse, HttpSender};
use crate::types::SessionStatus;
use crate::{AuthError, AuthResult};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

pub struct RequestPipeline {
    sender: HttpSender,
    controller: Arc<SessionController>,
    coordinator: Arc<RefreshCoordinator>,
}

impl RequestPipeline {
    pub(crate) fn new(
        sender: HttpSender,
        controller: Arc<SessionController>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            sender,
            controller,
            coordinator,
        }
    }

    /// Send a request through the session.
    ///
    /// Non-auth failures (server errors, validation errors, transport
    /// errors) pass through untouched; only the expiry signal triggers
    /// recovery.
    pub async fn send(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.wait_while_refreshing().await;

        match self.send_once(&request).await {
            Err(AuthError::TokenExpired) => self.coordinator.recover(request).await,
            other => other,
        }
    }

    /// One send with the token read at send time, not at call time. A
    /// 401 becomes the internal expiry signal and never reaches the
    /// caller.
    async fn send_once(&self, request: &ApiRequest) -> AuthResult<ApiResponse> {
        let token = self.controller.access_token();
        let response = self.sender.send(request, token.as_deref()).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            debug!(path = %request.path, "access token rejected");
            return Err(AuthError::TokenExpired);
        }

        Ok(response)
    }

    /// Park while a refresh is in flight. Released on any status move
    /// out of `Refreshing`, including teardown.
    async fn wait_while_refreshing(&self) {
        let mut status_rx = self.controller.subscribe_status();
        loop {
            if *status_rx.borrow_and_update() != SessionStatus::Refreshing {
                return;
            }
            if status_rx.changed().await.is_err() {
                return;
            }
        }
    }
}
