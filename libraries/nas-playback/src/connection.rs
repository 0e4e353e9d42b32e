//! Connection lifecycle
//!
//! Binding the native resource is asynchronous and can be superseded by a
//! newer attempt. Each attempt gets a token from a monotonically increasing
//! counter; a completion (or loss report) only counts if its token is the
//! latest one, everything else is stale and dropped.
//!
//! ```text
//! Disconnected ──begin──▶ Connecting(t) ──complete(t, Ok)──▶ Connected(t, h)
//!      ▲                     │    ▲                              │
//!      │             complete(t, Err)  begin                 lose(t)
//!      │                     ▼    │                              │
//!      │                  Failed ─┘                              │
//!      └─────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{BackendHandle, ConnectError};
use crate::types::ConnectionStatus;

/// Identifies one connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectToken(u64);

impl fmt::Display for ConnectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Full connection state, including the handle when bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState<H> {
    /// Nothing bound, nothing pending
    Disconnected,

    /// Attempt `token` is in flight
    Connecting(ConnectToken),

    /// Bound through attempt `token`
    Connected {
        /// Attempt that produced the handle
        token: ConnectToken,
        /// Command handle
        handle: H,
    },

    /// Latest attempt failed
    Failed(String),
}

/// Outcome of reporting a bind completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Handle accepted
    Connected,

    /// Failure recorded
    Failed,

    /// Superseded attempt; nothing changed
    Stale,
}

/// Token-guarded connection state machine
#[derive(Debug)]
pub struct ConnectionLifecycle<H> {
    state: ConnectionState<H>,
    last_token: u64,
}

impl<H> ConnectionLifecycle<H> {
    /// Start disconnected
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_token: 0,
        }
    }

    /// Start a new attempt, invalidating any previous token
    pub fn begin(&mut self) -> ConnectToken {
        self.last_token += 1;
        let token = ConnectToken(self.last_token);
        self.state = ConnectionState::Connecting(token);
        token
    }

    /// Report the result of attempt `token`
    pub fn complete(&mut self, token: ConnectToken, result: Result<H, ConnectError>) -> Completion {
        if !matches!(self.state, ConnectionState::Connecting(pending) if pending == token) {
            return Completion::Stale;
        }

        match result {
            Ok(handle) => {
                self.state = ConnectionState::Connected { token, handle };
                Completion::Connected
            }
            Err(e) => {
                self.state = ConnectionState::Failed(e.to_string());
                Completion::Failed
            }
        }
    }

    /// Report that the session bound by `token` went away
    ///
    /// Returns `false` if `token` is not the live connection.
    pub fn lose(&mut self, token: ConnectToken) -> bool {
        match self.state {
            ConnectionState::Connected { token: live, .. } if live == token => {
                self.state = ConnectionState::Disconnected;
                true
            }
            _ => false,
        }
    }

    /// Drop the connection or pending attempt unconditionally
    ///
    /// Any in-flight completion becomes stale.
    pub fn disconnect(&mut self) -> Option<H> {
        match std::mem::replace(&mut self.state, ConnectionState::Disconnected) {
            ConnectionState::Connected { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Handle of the live connection
    pub fn handle(&self) -> Option<&H> {
        match &self.state {
            ConnectionState::Connected { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Full state
    pub fn state(&self) -> &ConnectionState<H> {
        &self.state
    }

    /// Failure reason of the last attempt, if it failed
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Token of the attempt in flight or the live connection
    pub fn current_token(&self) -> Option<ConnectToken> {
        match self.state {
            ConnectionState::Connecting(token) | ConnectionState::Connected { token, .. } => {
                Some(token)
            }
            _ => None,
        }
    }

    /// UI-facing projection of the state
    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting(_) => ConnectionStatus::Connecting,
            ConnectionState::Connected { .. } => ConnectionStatus::Connected,
            ConnectionState::Failed(_) => ConnectionStatus::Failed,
        }
    }
}

impl<H> Default for ConnectionLifecycle<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle shared between the coordinator, its tasks and the sampler
pub(crate) type SharedConnection = Arc<Mutex<ConnectionLifecycle<Arc<dyn BackendHandle>>>>;

/// Clone the live handle out of the lock
///
/// Backend calls are made without holding the lifecycle lock.
pub(crate) fn live_handle(connection: &SharedConnection) -> Option<Arc<dyn BackendHandle>> {
    connection
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .handle()
        .cloned()
}
