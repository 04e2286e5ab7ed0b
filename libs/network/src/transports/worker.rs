//! Transport Worker
//!
//! Binds one application session to the peer it talks to. Every call into the
//! session goes through a [`WorkerParent`], so sessions write to "their" peer
//! without knowing its key.

use super::{Application, ResolveListener, TransportContext, WorkerContext};
use crate::error::{Result, Sec};
use crate::identity::{NodeId, PeerId};
use crate::message::EndpointMessage;
use bytes::Bytes;
use tracing::{debug, error};

/// Transport context narrowed to a single peer
pub struct WorkerParent<'a, T, K> {
    transport: &'a mut T,
    peer: &'a K,
}

impl<'a, T, K> WorkerParent<'a, T, K>
where
    T: TransportContext<K>,
    K: PeerId,
{
    pub fn new(transport: &'a mut T, peer: &'a K) -> Self {
        Self { transport, peer }
    }

    pub fn peer(&self) -> &K {
        self.peer
    }

    pub fn transport(&mut self) -> &mut T {
        self.transport
    }
}

impl<T, K> WorkerContext for WorkerParent<'_, T, K>
where
    T: TransportContext<K>,
    K: PeerId,
{
    fn write_packet(&mut self, bytes: Bytes) -> Result<()> {
        self.transport.write_packet(self.peer, bytes)
    }

    fn local_node(&self) -> &NodeId {
        self.transport.local_node()
    }
}

/// Session plus the identity of its peer
pub struct TransportWorker<A, K> {
    application: A,
    peer: K,
    initialized: bool,
}

impl<A, K> std::fmt::Debug for TransportWorker<A, K>
where
    K: PeerId,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWorker")
            .field("peer", &self.peer)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl<A, K> TransportWorker<A, K>
where
    A: Application,
    K: PeerId,
{
    pub fn new(application: A, peer: K) -> Self {
        Self {
            application,
            peer,
            initialized: false,
        }
    }

    pub fn peer(&self) -> &K {
        &self.peer
    }

    pub fn application(&self) -> &A {
        &self.application
    }

    pub fn application_mut(&mut self) -> &mut A {
        &mut self.application
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the session's `init` unless it already ran
    pub fn ensure_init<T: TransportContext<K>>(&mut self, transport: &mut T) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let mut parent = WorkerParent::new(transport, &self.peer);
        self.application.init(&mut parent)?;
        self.initialized = true;
        debug!(peer = ?self.peer, "Transport worker initialized");
        Ok(())
    }

    pub fn handle_data<T: TransportContext<K>>(&mut self, transport: &mut T, data: &[u8]) -> Result<()> {
        self.ensure_init(transport)?;
        let mut parent = WorkerParent::new(transport, &self.peer);
        self.application.handle_data(&mut parent, data)
    }

    pub fn write_message<T: TransportContext<K>>(
        &mut self,
        transport: &mut T,
        message: EndpointMessage,
    ) -> Result<()> {
        self.ensure_init(transport)?;
        let mut parent = WorkerParent::new(transport, &self.peer);
        self.application.write_message(&mut parent, message)
    }

    pub fn resolve<T: TransportContext<K>>(
        &mut self,
        transport: &mut T,
        path: &str,
        listener: ResolveListener,
    ) {
        if let Err(e) = self.ensure_init(transport) {
            let _ = listener.send(Err(e));
            return;
        }
        let mut parent = WorkerParent::new(transport, &self.peer);
        self.application.resolve(&mut parent, path, listener);
    }

    pub fn timeout<T: TransportContext<K>>(&mut self, transport: &mut T, kind: &str, id: u64) {
        if let Err(e) = self.ensure_init(transport) {
            error!(peer = ?self.peer, timeout_id = id, "Dropping timeout, session init failed: {}", e);
            return;
        }
        let mut parent = WorkerParent::new(transport, &self.peer);
        self.application.timeout(&mut parent, kind, id);
    }

    pub fn handle_error(&mut self, code: Sec) {
        self.application.handle_error(code);
    }
}
