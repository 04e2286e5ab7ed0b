//! Group Tunnel
//!
//! Local proxy for a group hosted on another node. A tunnel starts out
//! unconnected and buffers publishes until it is handed an intermediary, the
//! remote actor that relays traffic for the group. From then on publishes go
//! straight upstream and messages coming back are fanned out to local
//! subscribers.
//!
//! ## States
//!
//! - **Unconnected**: publishes are queued, up to `max_pending`
//! - **Connected**: publishes are forwarded to the intermediary
//! - **Stopped**: terminal; every operation fails
//!
//! A tunnel never reconnects on its own. When the intermediary's mailbox
//! closes the tunnel stops and the owning module replaces it on the next
//! lookup.

use crate::actor::{ActorId, ActorRef};
use crate::error::{GroupError, Result};
use crate::messages::GroupMessage;
use bytes::Bytes;
use network::NodeId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, warn};

/// Connection state of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Unconnected,
    Connected,
    Stopped,
}

enum Link {
    Unconnected { pending: VecDeque<GroupMessage> },
    Connected { intermediary: ActorRef },
    Stopped,
}

impl Link {
    fn state(&self) -> TunnelState {
        match self {
            Link::Unconnected { .. } => TunnelState::Unconnected,
            Link::Connected { .. } => TunnelState::Connected,
            Link::Stopped => TunnelState::Stopped,
        }
    }
}

struct Inner {
    link: Link,
    subscribers: HashMap<ActorId, ActorRef>,
    /// Queued publishes that never reached an intermediary
    discarded: usize,
}

impl Inner {
    /// Send upstream; a closed intermediary stops the tunnel
    fn send_upstream(&mut self, message: GroupMessage) -> std::result::Result<(), ()> {
        let Link::Connected { intermediary } = &self.link else {
            return Err(());
        };
        if intermediary.send(message).is_err() {
            self.link = Link::Stopped;
            self.subscribers.clear();
            return Err(());
        }
        Ok(())
    }
}

/// Proxy for one (origin node, group) pair
pub struct GroupTunnel {
    origin: NodeId,
    identifier: String,
    max_pending: usize,
    inner: Mutex<Inner>,
}

impl GroupTunnel {
    /// Create an unconnected tunnel
    pub fn new(origin: NodeId, identifier: impl Into<String>, max_pending: usize) -> Self {
        Self {
            origin,
            identifier: identifier.into(),
            max_pending,
            inner: Mutex::new(Inner {
                link: Link::Unconnected {
                    pending: VecDeque::new(),
                },
                subscribers: HashMap::new(),
                discarded: 0,
            }),
        }
    }

    /// Create a tunnel that is already connected to `intermediary`
    pub fn connected(intermediary: ActorRef, identifier: impl Into<String>, max_pending: usize) -> Self {
        let tunnel = Self::new(intermediary.node().clone(), identifier, max_pending);
        tunnel.connect(intermediary);
        tunnel
    }

    pub fn origin(&self) -> &NodeId {
        &self.origin
    }

    /// Group name on the origin node
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn state(&self) -> TunnelState {
        self.inner.lock().link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == TunnelState::Connected
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == TunnelState::Stopped
    }

    /// Publishes waiting for the connection
    pub fn pending_len(&self) -> usize {
        match &self.inner.lock().link {
            Link::Unconnected { pending } => pending.len(),
            _ => 0,
        }
    }

    /// Queued publishes dropped because the tunnel stopped before they were
    /// delivered upstream
    pub fn discarded(&self) -> usize {
        self.inner.lock().discarded
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn intermediary(&self) -> Option<ActorRef> {
        match &self.inner.lock().link {
            Link::Connected { intermediary } => Some(intermediary.clone()),
            _ => None,
        }
    }

    /// Transition to connected.
    ///
    /// Queued publishes are flushed in arrival order, followed by a `Join` if
    /// local subscribers are waiting. Returns false if the tunnel was already
    /// connected or stopped; the intermediary is ignored in that case.
    pub fn connect(&self, intermediary: ActorRef) -> bool {
        let mut inner = self.inner.lock();
        let pending = match std::mem::replace(&mut inner.link, Link::Stopped) {
            Link::Unconnected { pending } => pending,
            other => {
                inner.link = other;
                return false;
            }
        };

        debug!(
            origin = %self.origin,
            group = %self.identifier,
            intermediary = %intermediary,
            flushed = pending.len(),
            "Group tunnel connected"
        );
        inner.link = Link::Connected { intermediary };

        let queued = pending.len();
        for (sent, message) in pending.into_iter().enumerate() {
            if inner.send_upstream(message).is_err() {
                let discarded = queued - sent;
                inner.discarded += discarded;
                warn!(
                    origin = %self.origin,
                    group = %self.identifier,
                    discarded,
                    "Intermediary closed while flushing queued messages, remainder discarded"
                );
                return true;
            }
        }

        if !inner.subscribers.is_empty() {
            let join = GroupMessage::Join {
                group: self.identifier.clone(),
            };
            if inner.send_upstream(join).is_err() {
                warn!(origin = %self.origin, group = %self.identifier, "Intermediary closed before join");
            }
        }
        true
    }

    /// Publish `payload` to the remote group
    pub fn publish(&self, payload: Bytes, sender: Option<ActorId>) -> Result<()> {
        let message = GroupMessage::publish(&self.identifier, sender, payload);
        let mut inner = self.inner.lock();
        if let Link::Unconnected { pending } = &mut inner.link {
            if pending.len() >= self.max_pending {
                return Err(GroupError::QueueFull {
                    group: self.identifier.clone(),
                    limit: self.max_pending,
                });
            }
            pending.push_back(message);
            return Ok(());
        }
        if matches!(inner.link, Link::Stopped) {
            return Err(self.stopped_error());
        }
        inner.send_upstream(message).map_err(|()| self.unreachable())
    }

    /// Add a local subscriber. Returns false if it was already subscribed.
    pub fn subscribe(&self, actor: ActorRef) -> Result<bool> {
        let mut inner = self.inner.lock();
        if matches!(inner.link, Link::Stopped) {
            return Err(self.stopped_error());
        }

        let first = inner.subscribers.is_empty();
        if inner.subscribers.insert(actor.id(), actor).is_some() {
            return Ok(false);
        }

        if first && matches!(inner.link, Link::Connected { .. }) {
            let join = GroupMessage::Join {
                group: self.identifier.clone(),
            };
            inner.send_upstream(join).map_err(|()| self.unreachable())?;
        }
        Ok(true)
    }

    /// Remove a local subscriber. The last one leaving sends `Leave` upstream.
    pub fn unsubscribe(&self, actor: ActorId) -> bool {
        let mut inner = self.inner.lock();
        if inner.subscribers.remove(&actor).is_none() {
            return false;
        }
        if inner.subscribers.is_empty() && matches!(inner.link, Link::Connected { .. }) {
            let leave = GroupMessage::Leave {
                group: self.identifier.clone(),
            };
            let _ = inner.send_upstream(leave);
        }
        true
    }

    /// Fan a message from the intermediary out to local subscribers.
    ///
    /// Subscribers whose mailbox has closed are pruned. Returns the number of
    /// subscribers that received the message.
    pub fn deliver(&self, message: &GroupMessage) -> usize {
        let mut inner = self.inner.lock();
        if matches!(inner.link, Link::Stopped) {
            return 0;
        }

        let mut delivered = 0;
        inner.subscribers.retain(|_, subscriber| {
            let alive = subscriber.send(message.clone()).is_ok();
            delivered += alive as usize;
            alive
        });
        delivered
    }

    /// Stop the tunnel.
    ///
    /// Queued publishes are discarded and their count returned. A connected
    /// tunnel with subscribers sends a best-effort `Leave`. Idempotent.
    pub fn stop(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = match std::mem::replace(&mut inner.link, Link::Stopped) {
            Link::Unconnected { pending } => pending.len(),
            Link::Connected { intermediary } => {
                if !inner.subscribers.is_empty() {
                    let _ = intermediary.send(GroupMessage::Leave {
                        group: self.identifier.clone(),
                    });
                }
                0
            }
            Link::Stopped => return 0,
        };
        inner.subscribers.clear();
        inner.discarded += discarded;

        if discarded > 0 {
            warn!(
                origin = %self.origin,
                group = %self.identifier,
                discarded,
                "Group tunnel stopped before connecting, queued messages discarded"
            );
        } else {
            debug!(origin = %self.origin, group = %self.identifier, "Group tunnel stopped");
        }
        discarded
    }

    fn stopped_error(&self) -> GroupError {
        GroupError::TunnelStopped {
            node: self.origin.clone(),
            group: self.identifier.clone(),
        }
    }

    fn unreachable(&self) -> GroupError {
        warn!(origin = %self.origin, group = %self.identifier, "Intermediary unreachable, tunnel stopped");
        GroupError::IntermediaryUnreachable {
            node: self.origin.clone(),
            group: self.identifier.clone(),
        }
    }
}

impl fmt::Debug for GroupTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupTunnel")
            .field("origin", &self.origin)
            .field("identifier", &self.identifier)
            .field("state", &self.state())
            .finish()
    }
}
