//! Session lifecycle state machine using rust-fsm
//!
//! Every status change in the client goes through this machine; there
//! is no other way to move the session between states. Holding the
//! transitions in one table keeps the single-flight refresh honest:
//! `TokenRejected` is only accepted from `Authenticated`, so a second
//! expiry signal cannot start a second refresh.
//!
//! State diagram:
//!
//! ```text
//! Anonymous ──LoginAttempt──► Authenticating ──LoginSucceeded──► Authenticated
//!     ▲                             │                                │
//!     │                             └──LoginFailed──► Anonymous      │
//!     │                                                      TokenRejected
//!     ├──◄─Restored (straight to Authenticated on restore)           │
//!     │                                                              ▼
//!     │             Authenticated ◄──RefreshSucceeded── Refreshing ──┤
//!     │                                                              │
//!     │                              Expired ◄──RefreshFailed────────┘
//!     │                                 │
//!     └──Logout (from any state)────────┴──LoginAttempt──► Authenticating
//! ```

use crate::types::SessionStatus;
use rust_fsm::*;

// The macro expands to a `session_machine` module holding the State and
// Input enums plus the StateMachine type alias re-exported below.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Anonymous)

    Anonymous => {
        LoginAttempt => Authenticating,
        Restored => Authenticated,
        Logout => Anonymous
    },
    Authenticating => {
        LoginSucceeded => Authenticated,
        LoginFailed => Anonymous
    },
    Authenticated => {
        TokenRejected => Refreshing,
        Logout => Anonymous
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshFailed => Expired,
        Logout => Anonymous
    },
    Expired => {
        LoginAttempt => Authenticating,
        Logout => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Anonymous => SessionStatus::Anonymous,
            SessionMachineState::Authenticating => SessionStatus::Authenticating,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Refreshing => SessionStatus::Refreshing,
            SessionMachineState::Expired => SessionStatus::Expired,
        }
    }
}
