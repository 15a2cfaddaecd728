//! Connection management
//!
//! The connection handle, the transport capability seam, and the two client
//! variants that implement it.

pub mod event;
pub mod handle;
pub mod protocol;
pub mod socket;
pub mod transport;

#[cfg(test)]
pub mod mock;
