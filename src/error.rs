//! Error taxonomy
//!
//! None of these are fatal to the host process: transport-side failures are
//! also recorded in the message log and reflected in the lifecycle state, and
//! the caller may always retry with a fresh connect.

use thiserror::Error;

use crate::session::state::LinkState;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not establish or complete its open handshake
    #[error("connection failed: {0}")]
    Connection(String),

    /// The transport reported a failure after the link was established
    #[error("transport error: {0}")]
    Transport(String),

    /// Send attempted while the link is not connected
    #[error("send rejected: link is {0}")]
    NotConnected(LinkState),

    /// Send attempted with an empty or whitespace-only payload
    #[error("send rejected: payload is empty")]
    EmptyPayload,
}

impl ClientError {
    /// True for the synchronous send precondition violations; these never
    /// reach the transport and the caller may simply correct and retry.
    pub fn is_send_rejection(&self) -> bool {
        matches!(self, ClientError::NotConnected(_) | ClientError::EmptyPayload)
    }
}
