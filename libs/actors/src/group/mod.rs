//! Distributed Groups
//!
//! A group is a named publish/subscribe channel. Groups hosted elsewhere are
//! reached through a [`GroupTunnel`]; callers only ever see the [`Group`]
//! handle.

pub mod manager;
pub mod remote;
pub mod tunnel;

pub use manager::GroupManager;
pub use remote::RemoteGroupModule;
pub use tunnel::{GroupTunnel, TunnelState};

use crate::actor::{ActorId, ActorRef};
use crate::error::Result;
use bytes::Bytes;
use network::NodeId;
use std::fmt;
use std::sync::Arc;

/// Source of group handles, addressed by module name
pub trait GroupModule: Send + Sync {
    fn name(&self) -> &str;

    /// Handle for `group_name`, creating whatever backs it on first use
    fn get(&self, group_name: &str) -> Result<Group>;

    /// Release every group and refuse further `get` calls
    fn stop(&self);
}

/// Handle to a group, shared with every other holder of the same tunnel
#[derive(Clone)]
pub struct Group {
    module_name: String,
    tunnel: Arc<GroupTunnel>,
}

impl Group {
    pub fn new(module_name: impl Into<String>, tunnel: Arc<GroupTunnel>) -> Self {
        Self {
            module_name: module_name.into(),
            tunnel,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn identifier(&self) -> &str {
        self.tunnel.identifier()
    }

    pub fn origin(&self) -> &NodeId {
        self.tunnel.origin()
    }

    pub fn tunnel(&self) -> &Arc<GroupTunnel> {
        &self.tunnel
    }

    pub fn publish(&self, payload: impl Into<Bytes>, sender: Option<ActorId>) -> Result<()> {
        self.tunnel.publish(payload.into(), sender)
    }

    pub fn subscribe(&self, actor: ActorRef) -> Result<bool> {
        self.tunnel.subscribe(actor)
    }

    pub fn unsubscribe(&self, actor: ActorId) -> bool {
        self.tunnel.unsubscribe(actor)
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.module_name == other.module_name && Arc::ptr_eq(&self.tunnel, &other.tunnel)
    }
}

impl Eq for Group {}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.module_name, self.identifier(), self.origin())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("module", &self.module_name)
            .field("tunnel", &self.tunnel)
            .finish()
    }
}
