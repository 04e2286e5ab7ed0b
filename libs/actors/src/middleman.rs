//! Middleman Boundary
//!
//! The middleman owns the real transport and knows which node hosts which
//! group. Group modules only ever ask it two things: resolve a name, and
//! connect a tunnel in the background.

use crate::actor::ActorRef;
use crate::error::{GroupError, Result};
use network::NodeId;

/// Completion of a lazy connection attempt.
///
/// Invoked exactly once, from whatever thread the middleman's event loop runs
/// on. It may also be invoked synchronously from inside `connect_lazily`.
pub type ConnectCallback = Box<dyn FnOnce(Result<ActorRef>) + Send + 'static>;

pub trait Middleman: Send + Sync {
    /// Map a locally addressed group name to its origin node and the group's
    /// name on that node
    fn resolve_group_name(&self, name: &str) -> Result<(NodeId, String)>;

    /// Start connecting to `group_name` on `origin` without blocking.
    /// `callback` receives the intermediary or the reason the attempt failed.
    fn connect_lazily(&self, origin: &NodeId, group_name: &str, callback: ConnectCallback);
}

/// Split a `group@node-uri` address into node and group name
pub fn split_group_address(address: &str) -> Result<(NodeId, String)> {
    let (group, node) = address
        .split_once('@')
        .ok_or_else(|| GroupError::resolution(address, "expected '<group>@<node>'"))?;
    if group.is_empty() {
        return Err(GroupError::resolution(address, "empty group name"));
    }
    let node = NodeId::from_uri(node).map_err(|e| GroupError::resolution(address, e.to_string()))?;
    Ok((node, group.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_group_address() {
        let (node, group) = split_group_address("chat@tcp://host:7000").unwrap();
        assert_eq!(node.as_str(), "tcp://host:7000");
        assert_eq!(group, "chat");
    }

    #[test]
    fn test_split_group_address_rejects_malformed() {
        for bad in ["chat", "@tcp://host:7000", "chat@"] {
            let err = split_group_address(bad).unwrap_err();
            assert!(matches!(err, GroupError::Resolution { .. }), "{bad}");
        }
    }
}
