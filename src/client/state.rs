//! Connection lifecycle state machine for remote clients.

use crate::errors::{InvokeResult, InvokerError};
use parking_lot::Mutex;
use std::fmt;

/// Lifecycle state of a remote client connection.
///
/// ```text
/// Created -> Opening -> Opened -> Closed
///               |          |
///               +-> Faulted <+
/// ```
///
/// `Closed` and `Faulted` are terminal. An aborted client that was not faulted
/// ends in `Closed`; an aborted faulted client stays `Faulted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Returned by the factory, no connection yet
    Created,
    /// Handshake in progress
    Opening,
    /// Connection established, operations may run
    Opened,
    /// Connection shut down
    Closed,
    /// Connection failed and must not be reused
    Faulted,
}

/// An event that moves a client between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Handshake started
    BeginOpen,
    /// Handshake completed
    Opened,
    /// Connection failed
    Fault,
    /// Graceful shutdown completed
    Close,
    /// Forced shutdown
    Abort,
}

impl ClientState {
    /// Applies `event` to this state, returning the next state.
    ///
    /// Illegal transitions (closing a faulted client, reopening a closed one)
    /// are rejected with [`InvokerError::InvalidState`].
    pub fn transition(self, event: ClientEvent) -> InvokeResult<ClientState> {
        use ClientEvent as E;
        use ClientState as S;

        let next = match (self, event) {
            (S::Created, E::BeginOpen) => S::Opening,
            (S::Opening, E::Opened) => S::Opened,
            (S::Opening | S::Opened, E::Fault) => S::Faulted,
            (S::Opened | S::Closed, E::Close) => S::Closed,
            (S::Created | S::Opening | S::Opened | S::Closed, E::Abort) => S::Closed,
            (S::Faulted, E::Abort | E::Fault) => S::Faulted,
            (state, event) => {
                return Err(InvokerError::InvalidState {
                    message: format!("cannot apply {event:?} to a client in state {state}"),
                })
            }
        };

        Ok(next)
    }

    /// Returns true once the client has been shut down and must be discarded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Closed | ClientState::Faulted)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Created => "created",
            ClientState::Opening => "opening",
            ClientState::Opened => "opened",
            ClientState::Closed => "closed",
            ClientState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Thread-safe holder for a client's lifecycle state.
///
/// Remote client implementations embed one of these and route every
/// transition through [`ConnectionLifecycle::apply`].
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: Mutex<ClientState>,
}

impl ConnectionLifecycle {
    /// Creates a lifecycle in the `Created` state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClientState::Created),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Applies an event atomically, returning the new state.
    pub fn apply(&self, event: ClientEvent) -> InvokeResult<ClientState> {
        let mut state = self.state.lock();
        let next = state.transition(event)?;
        tracing::trace!(from = %*state, to = %next, ?event, "client state transition");
        *state = next;
        Ok(next)
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
