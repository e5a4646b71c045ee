//! Integration tests for the session lifecycle.
//!
//! Every test here drives a real `SessionRuntime` against a scripted
//! HTTP server on a loopback port, so the full reqwest stack is
//! exercised end to end.
//!
//! - `harness.rs`       - mock auth server with scripted responses
//! - `login.rs`         - login, registration, provider exchange
//! - `logout.rs`        - logout and its failure tolerance
//! - `restore.rs`       - persisted session restore and validation
//! - `refresh.rs`       - single-flight refresh, replay, forced logout
//! - `pipeline_flow.rs` - bearer attachment, holds, pass-through
//! - `profile.rs`       - confirm-then-apply profile updates

mod refresh;
