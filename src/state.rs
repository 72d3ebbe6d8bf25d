//! Peer connection state, as reported by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::engine::StateSink;
use crate::util::MutexExt;
use crate::WebRtcError;

/// State of the peer connection.
///
/// The state is driven exclusively by the engine. We never set it ourselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Initial state, before any negotiation.
    #[default]
    New,

    /// ICE/DTLS negotiation is in progress.
    Connecting,

    /// Media can flow.
    Connected,

    /// Connectivity was lost. This may resolve back into `Connected`.
    Disconnected,

    /// The connection failed and will not recover.
    Failed,

    /// The connection was closed.
    Closed,
}

impl ConnectionState {
    /// Tells if this state is a connected state.
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }

    /// Tells if waiting for a connection is pointless in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }

    /// Whether the engine is expected to move from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Failed) | (_, Closed) => true,
            (New, Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, Disconnected) => true,
            (Disconnected, Connecting) | (Disconnected, Connected) => true,
            _ => false,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared cell holding the current [`ConnectionState`].
///
/// The engine writes to it from a thread we don't own, via the [`StateSink`] from
/// [`StateCell::sink()`]. Readers either peek with [`StateCell::get()`] or block in
/// [`StateCell::wait_until_connected()`], which is woken on every change.
#[derive(Debug, Default)]
pub struct StateCell {
    state: Mutex<ConnectionState>,
    changed: Condvar,
}

impl StateCell {
    /// Creates a new cell in [`ConnectionState::New`].
    pub fn new() -> Arc<Self> {
        Arc::new(StateCell::default())
    }

    /// The current state.
    pub fn get(&self) -> ConnectionState {
        *self.state.lock_unpoisoned()
    }

    /// Callback to register with the engine.
    pub fn sink(self: &Arc<Self>) -> StateSink {
        let cell = Arc::clone(self);
        Arc::new(move |state| cell.notify(state))
    }

    pub(crate) fn notify(&self, next: ConnectionState) {
        let mut state = self.state.lock_unpoisoned();

        let prev = *state;
        if prev == next {
            return;
        }

        if !prev.can_transition_to(next) {
            warn!("Unexpected connection state change {} -> {}", prev, next);
        }
        debug!("Connection state changed from {} to {}", prev, next);

        *state = next;
        drop(state);

        self.changed.notify_all();
    }

    /// Block until the connection is connected.
    ///
    /// Returns [`WebRtcError::ConnectionFailed`] as soon as the state is failed or closed,
    /// and [`WebRtcError::Timeout`] if neither happens within `timeout`.
    pub fn wait_until_connected(&self, timeout: Duration) -> Result<(), WebRtcError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock_unpoisoned();

        loop {
            if state.is_connected() {
                return Ok(());
            }

            if state.is_terminal() {
                return Err(WebRtcError::ConnectionFailed(*state));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WebRtcError::Timeout(timeout));
            }

            trace!("Waiting for connection ({})", *state);

            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}
