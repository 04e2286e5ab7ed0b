//! Test helpers: an in-memory middleman whose connection attempts are
//! completed by hand

use crate::actor::{ActorRef, Mailbox};
use crate::error::{GroupError, Result};
use crate::middleman::{split_group_address, ConnectCallback, Middleman};
use network::NodeId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Connection attempt waiting to be completed
pub struct PendingConnect {
    pub origin: NodeId,
    pub group: String,
    callback: ConnectCallback,
}

impl PendingConnect {
    /// Complete with a fresh intermediary on the origin node and return its
    /// mailbox
    pub fn succeed(self) -> Mailbox {
        let (intermediary, mailbox) = ActorRef::with_mailbox(self.origin.clone());
        (self.callback)(Ok(intermediary));
        mailbox
    }

    pub fn fail(self, reason: &str) {
        let err = GroupError::connection(&self.origin, &self.group, reason);
        (self.callback)(Err(err));
    }
}

/// Middleman that resolves `group@node` addresses and records every
/// connection attempt.
///
/// Attempts are held until the test completes them, unless the middleman was
/// built with [`TestMiddleman::immediate`], in which case they succeed inside
/// `connect_lazily`.
#[derive(Default)]
pub struct TestMiddleman {
    attempts: AtomicUsize,
    immediate: AtomicBool,
    pending: Mutex<Vec<PendingConnect>>,
    mailboxes: Mutex<Vec<(NodeId, String, Mailbox)>>,
}

impl TestMiddleman {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleman that connects synchronously
    pub fn immediate() -> Self {
        let middleman = Self::default();
        middleman.immediate.store(true, Ordering::SeqCst);
        middleman
    }

    /// Number of `connect_lazily` calls so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn take_pending(&self) -> Vec<PendingConnect> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Mailboxes of intermediaries created by an immediate middleman
    pub fn take_mailboxes(&self) -> Vec<(NodeId, String, Mailbox)> {
        std::mem::take(&mut *self.mailboxes.lock())
    }
}

impl Middleman for TestMiddleman {
    fn resolve_group_name(&self, name: &str) -> Result<(NodeId, String)> {
        split_group_address(name)
    }

    fn connect_lazily(&self, origin: &NodeId, group_name: &str, callback: ConnectCallback) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let attempt = PendingConnect {
            origin: origin.clone(),
            group: group_name.to_string(),
            callback,
        };
        if self.immediate.load(Ordering::SeqCst) {
            let mailbox = attempt.succeed();
            self.mailboxes
                .lock()
                .push((origin.clone(), group_name.to_string(), mailbox));
        } else {
            self.pending.lock().push(attempt);
        }
    }
}
