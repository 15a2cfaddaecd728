//! Raw Socket Transport
//!
//! Single bidirectional WebSocket stream with no multiplexing and no
//! reconnection: it either opens or fails once per explicit connect call.
//! Sends the presence record right after open and attempts the fixed
//! farewell notice on close.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

use async_trait::async_trait;

use crate::connection::protocol::{Presence, FAREWELL};
use crate::connection::transport::{
    ConnectOptions, OutboundFrame, Transport, TransportLink, TransportSignal,
};
use crate::error::ClientError;

/// Grace window for draining a last frame (the farewell) once the stream is
/// already closing.
const CLOSE_DRAIN: Duration = Duration::from_millis(100);

/// Raw WebSocket client transport
pub struct SocketTransport {
    user_id: String,
}

impl SocketTransport {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn open(
        &mut self,
        address: &str,
        _options: &ConnectOptions,
    ) -> Result<TransportLink, ClientError> {
        if address.trim().is_empty() {
            return Err(ClientError::Connection("address is empty".to_string()));
        }

        let (link, signals, outbound) = TransportLink::channel();
        tokio::spawn(run_socket(address.to_string(), signals, outbound));
        Ok(link)
    }

    fn greeting(&self) -> Option<String> {
        Presence::now(&self.user_id).to_json().ok()
    }

    fn farewell(&self) -> Option<String> {
        Some(FAREWELL.to_string())
    }
}

async fn run_socket(
    address: String,
    signals: mpsc::UnboundedSender<TransportSignal>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let ws_stream = match connect_async(&address).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            let _ = signals.send(TransportSignal::Error(format!("connection failed: {}", e)));
            return;
        }
    };

    info!(address = %address, "WebSocket connection established");
    if signals.send(TransportSignal::Open).is_err() {
        // Link already released; nothing to serve
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if signals.send(TransportSignal::Inbound(text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        let _ = signals.send(TransportSignal::Closed { reason });
                        drain_last_frame(&mut write, &mut outbound).await;
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!("Received non-text message (ignored)");
                    }
                    Some(Err(e)) => {
                        let _ = signals.send(TransportSignal::Error(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = signals.send(TransportSignal::Closed {
                            reason: Some("stream ended".to_string()),
                        });
                        drain_last_frame(&mut write, &mut outbound).await;
                        break;
                    }
                }
            }

            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        // No multiplexing here: the payload goes straight to
                        // the stream, any channel name is ignored.
                        if let Some(payload) = frame.payload {
                            if write.send(Message::Text(payload)).await.is_err() {
                                let _ = signals.send(TransportSignal::Error(
                                    "write failed".to_string(),
                                ));
                                break;
                            }
                        }
                    }
                    None => {
                        // Link released by the handle: graceful close
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}

/// The handle reacts to a close signal by queueing the farewell notice. Give
/// it a short grace window and write whatever arrived; the stream is already
/// closing, so failures are silently ignored.
async fn drain_last_frame<S>(
    write: &mut S,
    outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
) where
    S: SinkExt<Message> + Unpin,
{
    if let Ok(Some(frame)) = tokio::time::timeout(CLOSE_DRAIN, outbound.recv()).await {
        if let Some(payload) = frame.payload {
            let _ = write.send(Message::Text(payload)).await;
        }
    }
    let _ = write.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_blank_address() {
        let mut transport = SocketTransport::new("u1");
        let result = transport.open("  ", &ConnectOptions::default()).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }

    #[test]
    fn test_greeting_carries_user_id() {
        let transport = SocketTransport::new("u1");
        let greeting = transport.greeting().unwrap();
        assert!(greeting.contains(r#""userID":"u1""#));
        assert!(greeting.contains("updatedAt"));
    }

    #[test]
    fn test_farewell_is_fixed_notice() {
        let transport = SocketTransport::new("u1");
        assert_eq!(transport.farewell().as_deref(), Some(FAREWELL));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_surfaces_error_signal() {
        let mut transport = SocketTransport::new("u1");
        // Discard port on loopback: refused immediately
        let mut link = transport
            .open("ws://127.0.0.1:9/ws", &ConnectOptions::default())
            .await
            .unwrap();

        match link.recv().await {
            Some(TransportSignal::Error(_)) => {}
            other => panic!("expected error signal, got {:?}", other),
        }
    }
}
