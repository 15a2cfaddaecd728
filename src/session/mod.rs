//! Session tracking
//!
//! Lifecycle state machine and the append-only message log that together
//! describe what happened on a connection.

pub mod log;
pub mod state;
