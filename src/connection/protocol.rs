//! Wire payloads
//!
//! Event frames for the multiplexed-event transport and the application-level
//! payloads the raw socket variant sends around open and close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed farewell text attempted on a closing raw socket, best-effort
pub const FAREWELL: &str = "Client Closed!";

/// Events dispatched by the client on the multiplexed transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Caller-composed free text
    Notice(String),
    /// Goodbye marker, no payload
    Bye,
}

/// Events recognized from the server on the multiplexed transport. Anything
/// else is skipped by the transport with a debug log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Reply(String),
}

impl ClientEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerEvent {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Caller-identity presence record the raw socket variant sends right after a
/// successful open. Flat key/value payload; the identifier is passed through
/// opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Presence {
    pub fn now(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
