//! Multiplexed-Event Transport
//!
//! Named logical channels over one physical connection. Tries the
//! upgrade-capable WebSocket protocol first and falls back to a plain
//! request/response long-poll, per the configured ordering. Reconnection
//! lives entirely here: bounded attempts with a fixed delay, each retry
//! surfaced as a Retrying signal, each success as an ordinary Open, each
//! exhaustion as an ordinary Error.
//!
//! Wire contract: WebSocket upgrade at `{base}/events`; long-poll
//! `GET {base}/events/poll` returning a JSON array of event frames (or 204),
//! `POST {base}/events/emit` accepting one frame.

use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::connection::protocol::{ClientEvent, ServerEvent};
use crate::connection::transport::{
    ConnectOptions, OutboundFrame, Transport, TransportKind, TransportLink, TransportSignal,
};
use crate::error::ClientError;

/// Multiplexed-event client transport
pub struct EventTransport;

impl EventTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EventTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for EventTransport {
    async fn open(
        &mut self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<TransportLink, ClientError> {
        if address.trim().is_empty() {
            return Err(ClientError::Connection("address is empty".to_string()));
        }
        if options.transports.is_empty() {
            return Err(ClientError::Connection(
                "no transport candidates configured".to_string(),
            ));
        }

        let (link, signals, outbound) = TransportLink::channel();
        tokio::spawn(run_event_client(
            address.to_string(),
            options.clone(),
            signals,
            outbound,
        ));
        Ok(link)
    }
}

/// How a served session ended
enum SessionEnd {
    /// The handle released the link; stop entirely
    LinkDropped,
    /// The server closed the connection
    Closed(Option<String>),
    /// The connection failed mid-session
    Failed(String),
}

async fn run_event_client(
    address: String,
    options: ConnectOptions,
    signals: mpsc::UnboundedSender<TransportSignal>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let mut attempt: u32 = 0;
    let mut last_failure: Option<String> = None;

    loop {
        match open_candidate(&address, &options.transports).await {
            Ok(io) => {
                attempt = 0;
                if signals.send(TransportSignal::Open).is_err() {
                    return;
                }

                match io.serve(&signals, &mut outbound).await {
                    SessionEnd::LinkDropped => return,
                    SessionEnd::Closed(reason) => {
                        if signals.send(TransportSignal::Closed { reason }).is_err() {
                            return;
                        }
                    }
                    SessionEnd::Failed(description) => {
                        last_failure = Some(description.clone());
                        if signals.send(TransportSignal::Error(description)).is_err() {
                            return;
                        }
                    }
                }

                if !options.reconnection {
                    return;
                }
            }
            Err(description) => {
                if !options.reconnection {
                    let _ = signals.send(TransportSignal::Error(description));
                    return;
                }
                debug!(error = %description, "Connection attempt failed");
                last_failure = Some(description);
            }
        }

        attempt += 1;
        if attempt > options.reconnection_attempts {
            let detail = match last_failure.as_deref() {
                Some(failure) => format!("reconnection attempts exhausted: {}", failure),
                None => "reconnection attempts exhausted".to_string(),
            };
            let _ = signals.send(TransportSignal::Error(detail));
            return;
        }
        if signals
            .send(TransportSignal::Retrying { attempt })
            .is_err()
        {
            return;
        }
        tokio::time::sleep(options.reconnection_delay).await;
    }
}

/// One live physical connection, whichever candidate protocol won
enum EventIo {
    Ws(WebSocketStream<MaybeTlsStream<TcpStream>>),
    Poll(PollIo),
}

impl EventIo {
    async fn serve(
        self,
        signals: &mpsc::UnboundedSender<TransportSignal>,
        outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
    ) -> SessionEnd {
        match self {
            EventIo::Ws(stream) => serve_ws(stream, signals, outbound).await,
            EventIo::Poll(io) => io.serve(signals, outbound).await,
        }
    }
}

/// Try each candidate protocol in the configured order; first open wins.
async fn open_candidate(address: &str, candidates: &[TransportKind]) -> Result<EventIo, String> {
    let mut last_error = String::from("no transport candidates configured");

    for kind in candidates {
        match kind {
            TransportKind::WebSocket => {
                let url = ws_endpoint(address);
                match connect_async(&url).await {
                    Ok((stream, _)) => {
                        info!(url = %url, "Connected via websocket");
                        return Ok(EventIo::Ws(stream));
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "WebSocket candidate failed");
                        last_error = format!("websocket: {}", e);
                    }
                }
            }
            TransportKind::Polling => {
                let base = http_endpoint(address);
                match PollIo::open(&base).await {
                    Ok(io) => {
                        info!(url = %base, "Connected via long-poll fallback");
                        return Ok(EventIo::Poll(io));
                    }
                    Err(e) => {
                        warn!(url = %base, error = %e, "Polling candidate failed");
                        last_error = format!("polling: {}", e);
                    }
                }
            }
        }
    }

    Err(last_error)
}

async fn serve_ws(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    signals: &mpsc::UnboundedSender<TransportSignal>,
    outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(payload) = decode_inbound(&text) {
                            if signals.send(TransportSignal::Inbound(payload)).is_err() {
                                return SessionEnd::LinkDropped;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        return SessionEnd::Closed(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Failed(e.to_string()),
                    None => return SessionEnd::Closed(Some("stream ended".to_string())),
                }
            }

            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        let text = encode_frame(&frame);
                        if write.send(Message::Text(text)).await.is_err() {
                            return SessionEnd::Failed("write failed".to_string());
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::LinkDropped;
                    }
                }
            }
        }
    }
}

/// Plain request/response fallback: repeated long-poll GETs for inbound
/// frames, one POST per outbound frame.
struct PollIo {
    client: reqwest::Client,
    base: String,
}

impl PollIo {
    async fn open(base: &str) -> Result<Self, String> {
        let client = reqwest::Client::new();

        // The first poll doubles as the open handshake
        let response = client
            .get(format!("{}/poll", base))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("handshake status {}", response.status()));
        }

        Ok(Self {
            client,
            base: base.to_string(),
        })
    }

    async fn serve(
        self,
        signals: &mpsc::UnboundedSender<TransportSignal>,
        outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
    ) -> SessionEnd {
        // A long-poll server dequeues pending frames into the in-flight
        // response, so the request must survive losing a select race to an
        // outbound frame; it is re-armed only once it completes.
        let mut poll = Box::pin(self.start_poll());

        loop {
            tokio::select! {
                response = &mut poll => {
                    poll = Box::pin(self.start_poll());
                    match response {
                        Ok(r) if r.status() == StatusCode::NO_CONTENT => {}
                        Ok(r) if r.status().is_success() => {
                            let frames = match r.json::<Vec<serde_json::Value>>().await {
                                Ok(frames) => frames,
                                Err(e) => return SessionEnd::Failed(e.to_string()),
                            };
                            for value in frames {
                                let Some(payload) = decode_inbound(&value.to_string()) else {
                                    continue;
                                };
                                if signals.send(TransportSignal::Inbound(payload)).is_err() {
                                    return SessionEnd::LinkDropped;
                                }
                            }
                        }
                        Ok(r) => return SessionEnd::Closed(Some(format!("poll status {}", r.status()))),
                        Err(e) => return SessionEnd::Failed(e.to_string()),
                    }
                }

                frame = outbound.recv() => {
                    match frame {
                        Some(frame) => {
                            let result = self
                                .client
                                .post(format!("{}/emit", self.base))
                                .header("content-type", "application/json")
                                .body(encode_frame(&frame))
                                .send()
                                .await;
                            if let Err(e) = result {
                                return SessionEnd::Failed(e.to_string());
                            }
                        }
                        None => return SessionEnd::LinkDropped,
                    }
                }
            }
        }
    }

    fn start_poll(&self) -> impl std::future::Future<Output = reqwest::Result<reqwest::Response>> {
        self.client.get(format!("{}/poll", self.base)).send()
    }
}

/// Only the `reply` event is recognized; anything else is skipped.
fn decode_inbound(text: &str) -> Option<String> {
    match ServerEvent::from_json(text) {
        Ok(ServerEvent::Reply(payload)) => Some(payload),
        Err(_) => {
            debug!(frame = %text, "Skipping unrecognized inbound frame");
            None
        }
    }
}

/// Encode an outbound frame as an event message. Known channels go through
/// the typed events; unknown names are passed along generically; a frame
/// with no channel defaults to `notice`.
fn encode_frame(frame: &OutboundFrame) -> String {
    let value = match (frame.event.as_deref(), frame.payload.as_deref()) {
        (Some("bye"), _) => serde_json::to_value(ClientEvent::Bye),
        (Some("notice") | None, Some(payload)) => {
            serde_json::to_value(ClientEvent::Notice(payload.to_string()))
        }
        (Some(other), Some(payload)) => {
            Ok(serde_json::json!({ "event": other, "data": payload }))
        }
        (Some(other), None) => Ok(serde_json::json!({ "event": other })),
        (None, None) => Ok(serde_json::json!({})),
    };
    value
        .unwrap_or_else(|_| serde_json::json!({}))
        .to_string()
}

/// WebSocket endpoint for a caller-supplied base address
fn ws_endpoint(address: &str) -> String {
    let base = address.trim_end_matches('/');
    let swapped = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/events", swapped)
}

/// HTTP endpoint base for the long-poll fallback
fn http_endpoint(address: &str) -> String {
    let base = address.trim_end_matches('/');
    let swapped = if let Some(rest) = base.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/events", swapped)
}
