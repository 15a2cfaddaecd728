//! Lifecycle State
//!
//! Four-state connection lifecycle machine and its thread-safe manager.
//! Transitions are driven exclusively by transport signals or explicit caller
//! action; observers are notified on every transition instead of polling.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Represents the possible states of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No transport is held
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// The open handshake completed and no close/error has been signaled
    Connected,
    /// The transport signaled an error; a fresh connect may be issued
    Errored,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Connecting => write!(f, "Connecting"),
            LinkState::Connected => write!(f, "Connected"),
            LinkState::Errored => write!(f, "Errored"),
        }
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: LinkState,
    pub to: LinkState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

type StateListener = Arc<dyn Fn(LinkState) + Send + Sync>;

/// Internal state data
struct LinkStateInner {
    current: LinkState,
    last_connected: Option<DateTime<Utc>>,
    connection_attempts: u32,
    transitions: Vec<StateTransition>,
    listener: Option<StateListener>,
}

/// Thread-safe lifecycle state manager. Exactly one state is active at any
/// instant; a single registered listener is notified on each transition.
#[derive(Clone)]
pub struct LinkStateManager {
    inner: Arc<RwLock<LinkStateInner>>,
}

impl LinkStateManager {
    /// Create a new state manager starting in Disconnected state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(LinkStateInner {
                current: LinkState::Disconnected,
                last_connected: None,
                connection_attempts: 0,
                transitions: Vec::new(),
                listener: None,
            })),
        }
    }

    /// Get the current state
    pub fn current_state(&self) -> LinkState {
        self.inner.read().current
    }

    /// Get the last connected timestamp
    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_connected
    }

    /// Get the number of connection attempts since the last successful open
    pub fn connection_attempts(&self) -> u32 {
        self.inner.read().connection_attempts
    }

    /// Register the state-change listener, replacing any previous one.
    /// Presentation surfaces subscribe through this publish point.
    pub fn on_state_change(&self, listener: impl Fn(LinkState) + Send + Sync + 'static) {
        self.inner.write().listener = Some(Arc::new(listener));
    }

    /// Transition to a new state. Returns false and leaves the state
    /// untouched when the transition is not permitted.
    pub fn transition_to(&self, new_state: LinkState, reason: Option<String>) -> bool {
        let listener = {
            let mut inner = self.inner.write();

            if !Self::is_valid_transition(inner.current, new_state) {
                tracing::warn!(
                    from = %inner.current,
                    to = %new_state,
                    "Rejected invalid state transition"
                );
                return false;
            }

            let transition = StateTransition {
                from: inner.current,
                to: new_state,
                timestamp: Utc::now(),
                reason,
            };

            let old_state = inner.current;
            inner.current = new_state;

            match new_state {
                LinkState::Connected => {
                    inner.last_connected = Some(Utc::now());
                    inner.connection_attempts = 0;
                }
                LinkState::Connecting => {
                    inner.connection_attempts += 1;
                }
                _ => {}
            }

            inner.transitions.push(transition);

            // Keep only last 100 transitions
            if inner.transitions.len() > 100 {
                inner.transitions.remove(0);
            }

            tracing::info!(
                from = %old_state,
                to = %new_state,
                attempts = inner.connection_attempts,
                "Link state transition"
            );

            inner.listener.clone()
        };

        // Notify outside the lock so the listener may read back state
        if let Some(listener) = listener {
            listener(new_state);
        }

        true
    }

    /// Check if a state transition is valid. Every connection must pass
    /// through Connecting; there is no Disconnected -> Connected shortcut.
    fn is_valid_transition(from: LinkState, to: LinkState) -> bool {
        // Self-transition is always allowed
        if from == to {
            return true;
        }

        matches!(
            (from, to),
            // From Disconnected
            (LinkState::Disconnected, LinkState::Connecting) |
            // From Connecting
            (LinkState::Connecting, LinkState::Connected) |
            (LinkState::Connecting, LinkState::Disconnected) |
            (LinkState::Connecting, LinkState::Errored) |
            // From Connected
            (LinkState::Connected, LinkState::Disconnected) |
            (LinkState::Connected, LinkState::Errored) |
            // From Errored
            (LinkState::Errored, LinkState::Connecting) |
            (LinkState::Errored, LinkState::Disconnected)
        )
    }

    /// Set state to connecting
    pub fn set_connecting(&self) {
        self.transition_to(LinkState::Connecting, Some("Initiating connection".to_string()));
    }

    /// Set state to connected
    pub fn set_connected(&self) {
        self.transition_to(LinkState::Connected, Some("Connection established".to_string()));
    }

    /// Set state to disconnected
    pub fn set_disconnected(&self, reason: Option<String>) {
        self.transition_to(LinkState::Disconnected, reason);
    }

    /// Set state to errored
    pub fn set_errored(&self, reason: Option<String>) {
        self.transition_to(LinkState::Errored, reason);
    }

    /// Get recent state transitions
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        let inner = self.inner.read();
        inner.transitions.iter().rev().take(count).cloned().collect()
    }

    /// Check if the link is connected
    pub fn is_connected(&self) -> bool {
        self.current_state() == LinkState::Connected
    }
}

impl Default for LinkStateManager {
    fn default() -> Self {
        Self::new()
    }
}
