//! Actor Identity and References
//!
//! An [`ActorRef`] is the handle a group tunnel talks to: an identifier, the
//! node the actor lives on, and a mailbox. Mailbox scheduling itself belongs
//! to the runtime; here it is just an unbounded channel.

use crate::messages::GroupMessage;
use network::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId {
    id: Uuid,
}

impl ActorId {
    /// Create new actor ID
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Get UUID
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.id.simple())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of an actor mailbox
pub type Mailbox = mpsc::UnboundedReceiver<GroupMessage>;

/// Location-transparent reference to an actor
#[derive(Clone)]
pub struct ActorRef {
    id: ActorId,
    node: NodeId,
    sender: mpsc::UnboundedSender<GroupMessage>,
}

impl ActorRef {
    /// Wrap an existing mailbox sender
    pub fn new(node: NodeId, sender: mpsc::UnboundedSender<GroupMessage>) -> Self {
        Self {
            id: ActorId::new(),
            node,
            sender,
        }
    }

    /// Create a reference together with the mailbox it delivers to
    pub fn with_mailbox(node: NodeId) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(node, sender), receiver)
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Node hosting the actor
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Enqueue a message; hands it back if the mailbox is closed
    pub fn send(&self, message: GroupMessage) -> std::result::Result<(), GroupMessage> {
        self.sender.send(message).map_err(|e| e.0)
    }

    /// True once the receiving side is gone
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}
