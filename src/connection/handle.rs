//! Connection Handle
//!
//! Owns the single live transport link, mediates all signal subscriptions,
//! and guarantees clean teardown. Signals are processed one at a time by the
//! pump, so no two reactions ever overlap and the message log needs no
//! locking of its own.

use tracing::{debug, info, warn};

use crate::connection::transport::{
    ConnectOptions, OutboundFrame, Transport, TransportLink, TransportSignal,
};
use crate::error::ClientError;
use crate::session::log::{Direction, LogEntry, MessageLog};
use crate::session::state::{LinkState, LinkStateManager};

/// Connection handle generic over the transport variant. Holds at most one
/// live link at a time; a new connect releases the prior link first so stale
/// signals can never fire after replacement.
pub struct ConnectionHandle<T: Transport> {
    transport: T,
    link: Option<TransportLink>,
    state: LinkStateManager,
    log: MessageLog,
    address: Option<String>,
}

impl<T: Transport> ConnectionHandle<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            link: None,
            state: LinkStateManager::new(),
            log: MessageLog::new(),
            address: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.state.current_state()
    }

    /// Clone of the state manager, for observers that outlive a borrow
    pub fn state_manager(&self) -> LinkStateManager {
        self.state.clone()
    }

    /// Register the single state-change listener
    pub fn on_state_change(&self, listener: impl Fn(LinkState) + Send + Sync + 'static) {
        self.state.on_state_change(listener);
    }

    /// Ordered, read-only view of the session log
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Target address of the most recent connect call
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Connect to `address`, releasing any previously held link first. The
    /// state moves to Connecting synchronously, before any asynchronous
    /// signal can arrive; the outcome is delivered later as an Open or Error
    /// signal through the pump.
    pub async fn connect(
        &mut self,
        address: &str,
        options: ConnectOptions,
    ) -> Result<(), ClientError> {
        if self.link.is_some() {
            self.release_link("releasing previous connection");
        }

        self.state.set_connecting();
        self.address = Some(address.to_string());

        info!(address = %address, "Connecting");

        match self.transport.open(address, &options).await {
            Ok(link) => {
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                self.state.set_errored(Some(e.to_string()));
                self.log.append(Direction::System, &format!("error: {}", e));
                Err(e)
            }
        }
    }

    /// Request a graceful close and discard the link. Idempotent: a no-op
    /// when no link is held, safe while a connection attempt is in flight.
    pub fn disconnect(&mut self) {
        if self.link.is_none() {
            return;
        }
        // Same best-effort farewell as a transport-driven close, but only
        // once the link actually opened; a mid-attempt disconnect has no
        // stream to write to.
        if self.state.current_state() == LinkState::Connected {
            if let Some(farewell) = self.transport.farewell() {
                if let Some(link) = &self.link {
                    let _ = link.dispatch(OutboundFrame::text(&farewell));
                }
            }
        }
        self.release_link("disconnected");
    }

    /// Dispatch `payload` on the named logical channel (multiplexed variant)
    /// or directly to the stream (raw variant, channel ignored). Rejected
    /// synchronously unless the link is Connected and the payload is
    /// non-blank; on success the Sent entry's sequence number is returned.
    pub fn send(&mut self, channel: Option<&str>, payload: &str) -> Result<u64, ClientError> {
        let state = self.state.current_state();
        if state != LinkState::Connected {
            return Err(ClientError::NotConnected(state));
        }
        if payload.trim().is_empty() {
            return Err(ClientError::EmptyPayload);
        }

        let link = self
            .link
            .as_ref()
            .ok_or(ClientError::NotConnected(state))?;

        let frame = match channel {
            Some(name) => OutboundFrame::event(name, Some(payload)),
            None => OutboundFrame::text(payload),
        };
        if !link.dispatch(frame) {
            return Err(ClientError::Transport("transport task is gone".to_string()));
        }

        Ok(self.log.append(Direction::Sent, payload))
    }

    /// Dispatch a payload-less named event (the multiplexed variant's `bye`)
    /// while Connected. Recorded as a System entry.
    pub fn emit(&mut self, event: &str) -> Result<(), ClientError> {
        let state = self.state.current_state();
        if state != LinkState::Connected {
            return Err(ClientError::NotConnected(state));
        }

        let link = self
            .link
            .as_ref()
            .ok_or(ClientError::NotConnected(state))?;

        if !link.dispatch(OutboundFrame::event(event, None)) {
            return Err(ClientError::Transport("transport task is gone".to_string()));
        }

        self.log
            .append(Direction::System, &format!("sent \"{}\" event", event));
        Ok(())
    }

    /// Process the next transport signal. Returns false when no link is held
    /// or the transport task has exited; the caller decides what comes next
    /// (typically disconnect or a fresh connect).
    pub async fn pump(&mut self) -> bool {
        let signal = match self.link.as_mut() {
            Some(link) => link.recv().await,
            None => return false,
        };

        match signal {
            Some(signal) => {
                self.handle_signal(signal);
                true
            }
            None => false,
        }
    }

    /// Release the held transport exactly once and consume the handle. The
    /// Drop impl covers every other exit path, including the one where
    /// connect was never called.
    pub fn dispose(mut self) {
        self.link.take();
        debug!("Connection handle disposed");
    }

    /// Internal signal reactions; not callable by outside code.
    fn handle_signal(&mut self, signal: TransportSignal) {
        match signal {
            TransportSignal::Open => {
                // Greeting first: for the raw variant the presence record is
                // the first thing on the wire and the first entry in the log.
                if let Some(greeting) = self.transport.greeting() {
                    if let Some(link) = &self.link {
                        if link.dispatch(OutboundFrame::text(&greeting)) {
                            self.log.append(Direction::Sent, &greeting);
                        }
                    }
                }
                self.state.set_connected();
                self.log.append(Direction::System, "connected");
            }
            TransportSignal::Inbound(payload) => {
                self.log.append(Direction::Received, &payload);
            }
            TransportSignal::Retrying { attempt } => {
                self.state.set_connecting();
                self.log.append(
                    Direction::System,
                    &format!("reconnecting (attempt {})", attempt),
                );
            }
            TransportSignal::Closed { reason } => {
                // Farewell on the closing link is best-effort; the transport
                // is already going away and failure is silently ignored.
                if let Some(farewell) = self.transport.farewell() {
                    if let Some(link) = &self.link {
                        let _ = link.dispatch(OutboundFrame::text(&farewell));
                    }
                }
                let entry = match &reason {
                    Some(r) => format!("connection closed: {}", r),
                    None => "connection closed".to_string(),
                };
                self.state.set_disconnected(reason);
                self.log.append(Direction::System, &entry);
            }
            TransportSignal::Error(description) => {
                warn!(error = %description, "Transport error");
                self.state.set_errored(Some(description.clone()));
                self.log
                    .append(Direction::System, &format!("error: {}", description));
            }
        }
    }

    /// Drop the link, discarding its signal subscription, and record why.
    fn release_link(&mut self, reason: &str) {
        if self.link.take().is_some() {
            self.state.set_disconnected(Some(reason.to_string()));
            self.log.append(Direction::System, reason);
        }
    }
}

impl<T: Transport> Drop for ConnectionHandle<T> {
    fn drop(&mut self) {
        // Dropping the link closes the outbound queue; the transport task
        // sees it and shuts the stream down gracefully.
        self.link.take();
    }
}

/// Entries accumulated since `seen`, alongside the next watermark. Small
/// helper for presentation loops that print the log incrementally.
pub fn entries_after(log: &MessageLog, seen: u64) -> (&[LogEntry], u64) {
    let entries = log.entries_since(seen);
    let next = entries.last().map(|e| e.sequence + 1).unwrap_or(seen);
    (entries, next)
}
