//! In-memory transport for handle tests: every opened link is tapped so
//! tests can inject signals and observe outbound frames deterministically.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use async_trait::async_trait;

use crate::connection::transport::{
    ConnectOptions, OutboundFrame, Transport, TransportLink, TransportSignal,
};
use crate::error::ClientError;

struct LinkTap {
    signals: mpsc::UnboundedSender<TransportSignal>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

/// Test-side view of every link a MockTransport has opened, in open order.
#[derive(Clone)]
pub struct MockTaps {
    links: Arc<Mutex<Vec<LinkTap>>>,
}

impl MockTaps {
    /// Number of links opened so far
    pub fn link_count(&self) -> usize {
        self.links.lock().len()
    }

    /// Inject a signal on the nth link. Returns false when the handle has
    /// already dropped its subscription.
    pub fn emit(&self, index: usize, signal: TransportSignal) -> bool {
        self.links.lock()[index].signals.send(signal).is_ok()
    }

    /// Drain every frame the handle has dispatched on the nth link
    pub fn drain_outbound(&self, index: usize) -> Vec<OutboundFrame> {
        let mut links = self.links.lock();
        let mut frames = Vec::new();
        while let Ok(frame) = links[index].outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

pub struct MockTransport {
    greeting: Option<String>,
    farewell: Option<String>,
    taps: MockTaps,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            greeting: None,
            farewell: None,
            taps: MockTaps {
                links: Arc::new(Mutex::new(Vec::new())),
            },
        }
    }

    pub fn with_greeting(mut self, greeting: &str) -> Self {
        self.greeting = Some(greeting.to_string());
        self
    }

    pub fn with_farewell(mut self, farewell: &str) -> Self {
        self.farewell = Some(farewell.to_string());
        self
    }

    pub fn taps(&self) -> MockTaps {
        self.taps.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &mut self,
        _address: &str,
        _options: &ConnectOptions,
    ) -> Result<TransportLink, ClientError> {
        let (link, signals, outbound) = TransportLink::channel();
        self.taps.links.lock().push(LinkTap { signals, outbound });
        Ok(link)
    }

    fn greeting(&self) -> Option<String> {
        self.greeting.clone()
    }

    fn farewell(&self) -> Option<String> {
        self.farewell.clone()
    }
}
