//! Wireline
//!
//! Client-side realtime connection manager: a connection lifecycle state
//! machine and message-event pipeline shared by two client variants, one
//! speaking a multiplexed-event protocol with transport fallback and bounded
//! auto-reconnect, the other a raw bidirectional WebSocket stream.

pub mod cli;
pub mod connection;
pub mod error;
pub mod session;

// Re-exports for convenience
pub use cli::config::{Config, LoggingConfig};
pub use connection::event::EventTransport;
pub use connection::handle::ConnectionHandle;
pub use connection::protocol::{ClientEvent, Presence, ServerEvent, FAREWELL};
pub use connection::socket::SocketTransport;
pub use connection::transport::{
    ConnectOptions, OutboundFrame, Transport, TransportKind, TransportLink, TransportSignal,
};
pub use error::ClientError;
pub use session::log::{Direction, LogEntry, MessageLog};
pub use session::state::{LinkState, LinkStateManager, StateTransition};
