//! Session connection state.
//!
//! The session moves through a small state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                     |             |
//!                     +-------------+-------> Disconnected (failure)
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Connection state for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Not connected to the device.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and subscribed to notifications.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (*self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Connected, Disconnected)
                | (Disconnecting, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Shared, observable connection state.
///
/// Readers never block on the session lock; only the session owner writes.
#[derive(Debug, Clone, Default)]
pub struct StateCell {
    state: Arc<RwLock<ConnectionState>>,
}

impl StateCell {
    /// Create a cell in the `Disconnected` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    pub fn get(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Returns `false` and leaves the state untouched otherwise. Setting the
    /// current state again is a no-op that succeeds.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        let current = *state;

        if current == next {
            return true;
        }

        if !current.can_transition_to(next) {
            warn!("Refusing connection state change: {} -> {}", current, next);
            return false;
        }

        *state = next;
        debug!("Connection state changed: {} -> {}", current, next);
        true
    }
}
