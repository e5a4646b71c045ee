//! Session and credential lifecycle for the quotedesk client.
//!
//! This crate owns everything between "user typed a password" and
//! "authorized request hit the wire":
//!
//! - `SessionController`: login, logout, restore, and the state
//!   machine behind the session status
//! - `RequestPipeline`: attaches the access token at send time and
//!   keeps 401s away from callers
//! - `RefreshCoordinator`: single-flight token refresh with ordered
//!   replay of held requests
//! - `SessionRuntime`: the composed, client-facing surface
//!
//! Tokens are opaque strings end to end; nothing here inspects or
//! decodes them.

mod auth_api;
mod controller;
mod coordinator;
mod error;
mod http;
mod pipeline;
mod runtime;
mod session_fsm;
mod types;

#[cfg(test)]
mod tests;

pub use controller::SessionController;
pub use coordinator::RefreshCoordinator;
pub use error::{AuthError, AuthResult};
pub use http::{ApiRequest, ApiResponse};
pub use pipeline::RequestPipeline;
pub use runtime::{ProfilePatch, SessionRuntime};
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState};
pub use types::{
    Preferences, Session, SessionCallback, SessionChangedPayload, SessionStatus, UserProfile,
};
