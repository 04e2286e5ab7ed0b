//! Group Messages
//!
//! What travels between a tunnel, its intermediary and local subscribers.

use crate::actor::ActorId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupMessage {
    /// Ask the intermediary to forward the group's traffic to this node
    Join { group: String },
    /// Stop forwarding the group's traffic to this node
    Leave { group: String },
    /// Payload published to the group
    Publish {
        group: String,
        sender: Option<ActorId>,
        payload: Bytes,
    },
}

impl GroupMessage {
    pub fn publish(group: &str, sender: Option<ActorId>, payload: Bytes) -> Self {
        GroupMessage::Publish {
            group: group.to_string(),
            sender,
            payload,
        }
    }

    /// Name of the group this message belongs to
    pub fn group(&self) -> &str {
        match self {
            GroupMessage::Join { group }
            | GroupMessage::Leave { group }
            | GroupMessage::Publish { group, .. } => group,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            GroupMessage::Publish { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
