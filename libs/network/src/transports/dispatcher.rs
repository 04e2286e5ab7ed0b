//! Transport Worker Dispatcher
//!
//! Demultiplexes one physical transport into per-peer sessions. The worker
//! table organizes itself from observed traffic: the first bytes from, or the
//! first message to, an unknown peer create its session. Inserting is
//! idempotent, so explicit setup and first-data-arrival may both "ensure" a
//! worker without coordinating.
//!
//! The dispatcher does not lock. It is driven by the single task that owns
//! the transport; cross-thread callers must bring their own synchronization.

use super::{ApplicationFactory, ResolveListener, TransportContext, TransportWorker};
use crate::error::{Result, Sec, TransportError};
use crate::identity::PeerId;
use crate::message::EndpointMessage;
use routing_config::DispatcherSettings;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Worker type produced for factory `F` and key `K`
pub type WorkerOf<F, K> = TransportWorker<<F as ApplicationFactory>::Application, K>;

/// Routes transport events to the session owning each peer
pub struct TransportWorkerDispatcher<F: ApplicationFactory, K: PeerId> {
    factory: F,
    workers: HashMap<K, WorkerOf<F, K>>,
    /// Timeout id -> peer whose session registered it
    timeouts: HashMap<u64, K>,
}

impl<F, K> std::fmt::Debug for TransportWorkerDispatcher<F, K>
where
    F: ApplicationFactory,
    K: PeerId,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWorkerDispatcher")
            .field("workers", &self.workers.len())
            .field("pending_timeouts", &self.timeouts.len())
            .finish()
    }
}

impl<F, K> TransportWorkerDispatcher<F, K>
where
    F: ApplicationFactory,
    K: PeerId,
{
    pub fn new(factory: F) -> Self {
        Self::with_settings(factory, &DispatcherSettings::default())
    }

    pub fn with_settings(factory: F, settings: &DispatcherSettings) -> Self {
        Self {
            factory,
            workers: HashMap::with_capacity(settings.worker_capacity),
            timeouts: HashMap::new(),
        }
    }

    /// Initialize every worker that has not been initialized yet
    pub fn init<T: TransportContext<K>>(&mut self, transport: &mut T) -> Result<()> {
        for worker in self.workers.values_mut() {
            worker.ensure_init(transport)?;
        }
        Ok(())
    }

    /// Ensure a session exists for `peer`.
    ///
    /// Returns the existing worker untouched if there is one; the factory runs
    /// only for previously unseen peers.
    pub fn add_new_worker(&mut self, peer: K) -> &mut WorkerOf<F, K> {
        let factory = &mut self.factory;
        self.workers.entry(peer).or_insert_with_key(|peer| {
            debug!(?peer, "Creating transport worker");
            TransportWorker::new(factory.make(), peer.clone())
        })
    }

    /// Route bytes received from `peer` to its session, creating it if needed
    pub fn handle_data<T: TransportContext<K>>(
        &mut self,
        transport: &mut T,
        data: &[u8],
        peer: &K,
    ) -> Result<()> {
        let worker = self.add_new_worker(peer.clone());
        worker.handle_data(transport, data).map_err(|e| {
            debug!(?peer, category = e.category(), "Session rejected inbound data: {}", e);
            e
        })
    }

    /// Route an outbound message to the session of its destination
    pub fn write_message<T: TransportContext<K>>(
        &mut self,
        transport: &mut T,
        message: EndpointMessage,
    ) -> Result<()> {
        let Some(peer) = K::destination(&message) else {
            return Err(TransportError::protocol(format!(
                "message {} carries no destination for this transport",
                message.id
            )));
        };
        self.add_new_worker(peer).write_message(transport, message)
    }

    /// Forward a path lookup to the session of `peer`.
    ///
    /// Lookups never create sessions; an unknown peer is reported to the
    /// listener as a resolution error.
    pub fn resolve<T: TransportContext<K>>(
        &mut self,
        transport: &mut T,
        peer: &K,
        path: &str,
        listener: ResolveListener,
    ) {
        match self.workers.get_mut(peer) {
            Some(worker) => worker.resolve(transport, path, listener),
            None => {
                let _ = listener.send(Err(TransportError::resolution(
                    format!("could not resolve '{}': no session", path),
                    Some(peer as &dyn std::fmt::Debug),
                )));
            }
        }
    }

    /// Record that timeout `timeout_id` belongs to the session of `peer`
    pub fn set_timeout(&mut self, timeout_id: u64, peer: K) {
        self.timeouts.insert(timeout_id, peer);
    }

    /// Deliver a fired timeout to its owner, once
    pub fn timeout<T: TransportContext<K>>(&mut self, transport: &mut T, kind: &str, timeout_id: u64) {
        let Some(peer) = self.timeouts.remove(&timeout_id) else {
            debug!(timeout_id, kind, "Ignoring unknown timeout");
            return;
        };
        match self.workers.get_mut(&peer) {
            Some(worker) => worker.timeout(transport, kind, timeout_id),
            None => debug!(timeout_id, ?peer, "Timeout owner already gone"),
        }
    }

    /// Notify every session of a transport-wide error
    pub fn handle_error(&mut self, code: Sec) {
        warn!(%code, sessions = self.workers.len(), "Broadcasting transport error");
        for worker in self.workers.values_mut() {
            worker.handle_error(code);
        }
    }

    /// Drop the session of a departed peer along with its pending timeouts
    pub fn remove_worker(&mut self, peer: &K) -> bool {
        let removed = self.workers.remove(peer).is_some();
        if removed {
            self.timeouts.retain(|_, owner| owner != peer);
            debug!(?peer, "Removed transport worker");
        }
        removed
    }

    pub fn find_worker(&self, peer: &K) -> Option<&WorkerOf<F, K>> {
        self.workers.get(peer)
    }

    pub fn find_worker_mut(&mut self, peer: &K) -> Option<&mut WorkerOf<F, K>> {
        self.workers.get_mut(peer)
    }

    pub fn contains(&self, peer: &K) -> bool {
        self.workers.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Known peers in key order
    pub fn peers(&self) -> Vec<K> {
        let mut peers: Vec<K> = self.workers.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}
