//! Network Infrastructure
//!
//! Peer identities and per-peer session dispatch for a single physical
//! transport. The socket/event-loop layer feeds bytes and outbound messages in;
//! this crate decides which application session handles them.

pub mod error;
pub mod identity;
pub mod message;
pub mod transports;

// Re-export commonly used types
pub use error::{Result, Sec, TransportError};
pub use identity::{IpEndpoint, NodeId, PeerId};
pub use message::EndpointMessage;
pub use transports::{
    Application, ApplicationFactory, ResolveListener, Resolved, TransportContext,
    TransportWorker, TransportWorkerDispatcher, WorkerContext, WorkerParent,
};

// Utility functions
use std::sync::atomic::{AtomicU64, Ordering};
static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique message ID
pub fn generate_message_id() -> u64 {
    MESSAGE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
