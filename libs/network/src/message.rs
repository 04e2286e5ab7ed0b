//! Endpoint Message
//!
//! Outbound unit handed to a transport dispatcher. Only carries what routing
//! needs (who sent it, which node or endpoint receives it) plus opaque payload
//! bytes; interpreting the payload is the session's business.

use crate::identity::{IpEndpoint, NodeId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Message queued for delivery to a remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMessage {
    /// Process-unique message id
    pub id: u64,
    /// Originating node, if known
    pub sender: Option<NodeId>,
    /// Node the message is addressed to
    pub receiver: NodeId,
    /// Endpoint of the receiver, for transports keyed by address
    pub endpoint: Option<IpEndpoint>,
    /// Opaque payload
    pub payload: Bytes,
}

impl EndpointMessage {
    /// Create a message for `receiver` with a fresh id
    pub fn new(receiver: NodeId, payload: Bytes) -> Self {
        Self {
            id: crate::generate_message_id(),
            sender: None,
            receiver,
            endpoint: None,
            payload,
        }
    }

    pub fn with_sender(mut self, sender: NodeId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_endpoint(mut self, endpoint: IpEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Payload size in bytes
    pub fn byte_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let node = NodeId::from_uri("tcp://a:1").unwrap();
        let a = EndpointMessage::new(node.clone(), Bytes::new());
        let b = EndpointMessage::new(node, Bytes::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_builder_sets_routing_metadata() {
        let receiver = NodeId::from_uri("tcp://b:2").unwrap();
        let sender = NodeId::from_uri("tcp://a:1").unwrap();
        let ep: IpEndpoint = "127.0.0.1:9".parse().unwrap();
        let msg = EndpointMessage::new(receiver.clone(), Bytes::from_static(b"hello"))
            .with_sender(sender.clone())
            .with_endpoint(ep);

        assert_eq!(msg.receiver, receiver);
        assert_eq!(msg.sender, Some(sender));
        assert_eq!(msg.endpoint, Some(ep));
        assert_eq!(msg.byte_size(), 5);
    }

    #[test]
    fn test_json_shape() {
        let msg = EndpointMessage::new(NodeId::from_uri("tcp://b:2").unwrap(), Bytes::new());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["receiver"], "tcp://b:2");
        assert!(json["sender"].is_null());
    }
}
