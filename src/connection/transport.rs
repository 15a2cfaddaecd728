//! Transport capability
//!
//! Defines the common interface the connection handle drives: a transport
//! opens a link, delivers lifecycle signals over it in emission order, and
//! accepts outbound frames. The two variants (multiplexed-event, raw socket)
//! implement this seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// A lifecycle or data signal emitted by the transport. Signals are delivered
/// to the handle in the order the transport emits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The open handshake completed
    Open,
    /// Inbound payload, forwarded verbatim
    Inbound(String),
    /// A reconnection attempt is about to start (multiplexed variant only)
    Retrying { attempt: u32 },
    /// The transport closed, gracefully or not
    Closed { reason: Option<String> },
    /// The transport failed; the description is recorded in the log
    Error(String),
}

/// An outbound frame handed to the transport. `event` names the logical
/// channel for the multiplexed variant; the raw variant ignores it and writes
/// the payload directly to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub event: Option<String>,
    pub payload: Option<String>,
}

impl OutboundFrame {
    /// Plain text frame with no channel
    pub fn text(payload: &str) -> Self {
        Self {
            event: None,
            payload: Some(payload.to_string()),
        }
    }

    /// Named event frame, with or without a payload
    pub fn event(name: &str, payload: Option<&str>) -> Self {
        Self {
            event: Some(name.to_string()),
            payload: payload.map(|p| p.to_string()),
        }
    }
}

/// Candidate protocols for the multiplexed-event transport, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Upgrade-capable WebSocket connection
    WebSocket,
    /// Plain request/response HTTP long-poll fallback
    Polling,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::Polling => write!(f, "polling"),
        }
    }
}

/// Connect options for the multiplexed-event variant. The raw socket variant
/// ignores these: it either opens or fails once per explicit connect call.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Preferred protocol ordering, first match wins
    pub transports: Vec<TransportKind>,
    /// Whether the transport reconnects on its own after a failure or close
    pub reconnection: bool,
    /// Maximum reconnection attempts before giving up with an error signal
    pub reconnection_attempts: u32,
    /// Delay between reconnection attempts
    pub reconnection_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection: true,
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
        }
    }
}

/// The live end of an opened transport: a signal subscription plus an
/// outbound frame queue. Dropping the link discards the subscription (stale
/// signals can no longer be delivered) and lets the transport task close the
/// underlying stream gracefully.
pub struct TransportLink {
    signals: mpsc::UnboundedReceiver<TransportSignal>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl TransportLink {
    /// Wire up a link and hand the transport its halves: a signal sender and
    /// an outbound frame receiver.
    pub fn channel() -> (
        Self,
        mpsc::UnboundedSender<TransportSignal>,
        mpsc::UnboundedReceiver<OutboundFrame>,
    ) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                signals: signal_rx,
                outbound: outbound_tx,
            },
            signal_tx,
            outbound_rx,
        )
    }

    /// Queue a frame for the transport. Best-effort: returns false when the
    /// transport task is already gone.
    pub fn dispatch(&self, frame: OutboundFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Receive the next signal. Returns None once the transport task exits.
    pub async fn recv(&mut self) -> Option<TransportSignal> {
        self.signals.recv().await
    }
}

/// Transport capability trait - common interface for both client variants
#[async_trait]
pub trait Transport: Send {
    /// Open a link to `address`. Must return without waiting for the
    /// handshake: the outcome arrives later as an `Open` or `Error` signal.
    async fn open(
        &mut self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<TransportLink, ClientError>;

    /// Payload dispatched automatically right after the open handshake, if
    /// any (the raw variant's presence record). Logged as a Sent entry.
    fn greeting(&self) -> Option<String> {
        None
    }

    /// Payload attempted, best-effort, on a closing transport (the raw
    /// variant's fixed farewell notice). Never logged.
    fn farewell(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_client_defaults() {
        let options = ConnectOptions::default();
        assert_eq!(
            options.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
        assert!(options.reconnection);
        assert_eq!(options.reconnection_attempts, 5);
        assert_eq!(options.reconnection_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_link_dispatch_after_transport_exit() {
        let (link, signal_tx, outbound_rx) = TransportLink::channel();
        drop(outbound_rx);
        drop(signal_tx);
        assert!(!link.dispatch(OutboundFrame::text("late")));
    }

    #[tokio::test]
    async fn test_link_signal_order_preserved() {
        let (mut link, signal_tx, _outbound_rx) = TransportLink::channel();
        signal_tx.send(TransportSignal::Open).unwrap();
        signal_tx
            .send(TransportSignal::Inbound("hello".to_string()))
            .unwrap();

        assert_eq!(link.recv().await, Some(TransportSignal::Open));
        assert_eq!(
            link.recv().await,
            Some(TransportSignal::Inbound("hello".to_string()))
        );
    }

    #[test]
    fn test_transport_kind_round_trip() {
        let kinds: Vec<TransportKind> =
            serde_json::from_str(r#"["websocket", "polling"]"#).unwrap();
        assert_eq!(kinds, vec![TransportKind::WebSocket, TransportKind::Polling]);
    }
}
