//! Transport-side session dispatch
//!
//! One physical transport (a socket, a connection pool) serves many peers.
//! The [`TransportWorkerDispatcher`] splits it into one application session
//! per [`PeerId`], each wrapped in a [`TransportWorker`].
//!
//! ```text
//!            ┌──────────────────────── dispatcher ───────────────────────┐
//!  bytes ──▶ │ peer P0 ─▶ worker(P0) ─▶ session                          │
//!  (peer)    │ peer P1 ─▶ worker(P1) ─▶ session      (created on demand) │
//!            │ peer P2 ─▶ worker(P2) ─▶ session                          │
//!            └───────────────────────────────────────────────────────────┘
//! ```

use crate::error::{Result, Sec};
use crate::identity::{NodeId, PeerId};
use crate::message::EndpointMessage;
use bytes::Bytes;
use tokio::sync::oneshot;

pub mod dispatcher;
pub mod worker;

pub use dispatcher::TransportWorkerDispatcher;
pub use worker::{TransportWorker, WorkerParent};

/// The physical transport as seen by the dispatcher
pub trait TransportContext<K: PeerId> {
    /// Queue bytes for the given peer
    fn write_packet(&mut self, peer: &K, bytes: Bytes) -> Result<()>;

    /// Node this process runs as
    fn local_node(&self) -> &NodeId;
}

/// What a session sees of the transport: writes go to its own peer
pub trait WorkerContext {
    /// Queue bytes for the peer owning this session
    fn write_packet(&mut self, bytes: Bytes) -> Result<()>;

    /// Node this process runs as
    fn local_node(&self) -> &NodeId;
}

/// Answer to a path resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub node: NodeId,
    pub path: String,
}

/// Receives the outcome of [`Application::resolve`]
pub type ResolveListener = oneshot::Sender<Result<Resolved>>;

/// Per-peer protocol state
pub trait Application: Send {
    /// Called once before the first data, message or timeout reaches the session
    fn init(&mut self, parent: &mut dyn WorkerContext) -> Result<()>;

    /// Bytes received from the peer
    fn handle_data(&mut self, parent: &mut dyn WorkerContext, data: &[u8]) -> Result<()>;

    /// Message to send to the peer
    fn write_message(
        &mut self,
        parent: &mut dyn WorkerContext,
        message: EndpointMessage,
    ) -> Result<()>;

    /// Look up `path` on the peer and report to `listener`
    fn resolve(&mut self, parent: &mut dyn WorkerContext, path: &str, listener: ResolveListener);

    /// A timeout registered for this session fired
    fn timeout(&mut self, parent: &mut dyn WorkerContext, kind: &str, id: u64);

    /// Transport-wide error notification
    fn handle_error(&mut self, code: Sec);

    /// Encode an outbound message for the wire
    fn serialize(message: &EndpointMessage) -> Result<Vec<u8>>
    where
        Self: Sized,
    {
        Ok(bincode::serialize(message)?)
    }
}

/// Builds sessions for previously unseen peers
pub trait ApplicationFactory {
    type Application: Application;

    /// Must not fail; validate factory state before handing it to a dispatcher
    fn make(&mut self) -> Self::Application;
}
