//! Peer Identities
//!
//! Keys that distinguish one remote counterpart from another. Before a
//! handshake only the network endpoint is known (`IpEndpoint`); afterwards the
//! logical node on the other end (`NodeId`). Both are immutable lookup keys.

use crate::error::{Result, TransportError};
use crate::message::EndpointMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::net::SocketAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Key type a dispatcher can demultiplex on
pub trait PeerId: Clone + Eq + Ord + Hash + fmt::Debug + Send + 'static {
    /// Destination of an outbound message in this identity domain, if the
    /// message's routing metadata carries one
    fn destination(message: &EndpointMessage) -> Option<Self>;
}

/// Opaque identifier of a node (one running process of the runtime)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Derive a node id from a locator URI such as `tcp://host:4242`
    pub fn from_uri(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(TransportError::configuration(
                "node URI must not be empty",
                Some("node_id"),
            ));
        }
        if !trimmed.contains(':') {
            return Err(TransportError::configuration(
                format!("node URI '{}' has no scheme", trimmed),
                Some("node_id"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generate a process-unique node id
    pub fn random() -> Self {
        Self(format!("node:{}", Uuid::new_v4().simple()))
    }

    /// Raw textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_uri(s)
    }
}

impl PeerId for NodeId {
    fn destination(message: &EndpointMessage) -> Option<Self> {
        Some(message.receiver.clone())
    }
}

/// Network endpoint (address + port) of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IpEndpoint(SocketAddr);

impl IpEndpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl From<SocketAddr> for IpEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for IpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for IpEndpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<SocketAddr>().map(Self).map_err(|e| {
            TransportError::configuration(
                format!("invalid endpoint '{}': {}", s, e),
                Some("endpoint"),
            )
        })
    }
}

impl PeerId for IpEndpoint {
    fn destination(message: &EndpointMessage) -> Option<Self> {
        message.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_endpoint_parsing() {
        let ep: IpEndpoint = "[::1]:1".parse().unwrap();
        assert_eq!(ep.port(), 1);
        assert!(ep.addr().is_ipv6());

        let v4: IpEndpoint = "10.0.0.1:4242".parse().unwrap();
        assert_eq!(v4.to_string(), "10.0.0.1:4242");

        assert!("not-an-endpoint".parse::<IpEndpoint>().is_err());
    }

    #[test]
    fn test_node_id_equality_is_by_value() {
        let a = NodeId::from_uri("http:file?a=1&b=2").unwrap();
        let b: NodeId = "http:file?a=1&b=2".parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, NodeId::from_uri("http:file#42").unwrap());
        assert_ne!(NodeId::random(), NodeId::random());
    }

    #[test]
    fn test_node_id_rejects_garbage() {
        assert!(NodeId::from_uri("").is_err());
        assert!(NodeId::from_uri("plainname").is_err());
    }

    #[test]
    fn test_destination_per_domain() {
        let receiver = NodeId::from_uri("tcp://peer:1").unwrap();
        let msg = EndpointMessage::new(receiver.clone(), Bytes::from_static(b"x"));
        assert_eq!(NodeId::destination(&msg), Some(receiver.clone()));
        assert_eq!(IpEndpoint::destination(&msg), None);

        let ep: IpEndpoint = "[fe80::2:34]:12345".parse().unwrap();
        let msg = msg.with_endpoint(ep);
        assert_eq!(IpEndpoint::destination(&msg), Some(ep));
    }
}
