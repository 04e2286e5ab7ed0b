//! Group Error Types
//!
//! Failures surfaced to callers of the group modules and group handles.

use network::NodeId;
use thiserror::Error;

/// Result type alias for group operations
pub type Result<T> = std::result::Result<T, GroupError>;

/// Stage of a group operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Mapping a group name to its origin node
    Resolution,
    /// Establishing or using the connection to the intermediary
    Connection,
    /// Module or tunnel lifecycle (stopped, shut down, misconfigured)
    Lifecycle,
}

#[derive(Error, Debug, Clone)]
pub enum GroupError {
    #[error("Cannot resolve group '{name}': {reason}")]
    Resolution { name: String, reason: String },

    #[error("Group module '{module}' is stopped")]
    ModuleStopped { module: String },

    #[error("Connection to group '{group}' on {node} failed: {reason}")]
    Connection {
        node: NodeId,
        group: String,
        reason: String,
    },

    #[error("Tunnel to group '{group}' on {node} is stopped")]
    TunnelStopped { node: NodeId, group: String },

    #[error("Intermediary for group '{group}' on {node} is unreachable")]
    IntermediaryUnreachable { node: NodeId, group: String },

    #[error("Tunnel to group '{group}' buffers at most {limit} messages while connecting")]
    QueueFull { group: String, limit: usize },

    #[error("Middleman is no longer available")]
    MiddlemanUnavailable,

    #[error("No group module named '{0}'")]
    UnknownModule(String),

    #[error("Invalid group locator '{0}', expected '<module>:<group>'")]
    InvalidLocator(String),
}

impl GroupError {
    pub fn resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GroupError::Resolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(node: &NodeId, group: &str, reason: impl Into<String>) -> Self {
        GroupError::Connection {
            node: node.clone(),
            group: group.to_string(),
            reason: reason.into(),
        }
    }

    /// Which stage of a `get` or a publish failed
    pub fn stage(&self) -> FailureStage {
        match self {
            GroupError::Resolution { .. } | GroupError::InvalidLocator(_) | GroupError::UnknownModule(_) => {
                FailureStage::Resolution
            }
            GroupError::Connection { .. }
            | GroupError::IntermediaryUnreachable { .. }
            | GroupError::QueueFull { .. } => FailureStage::Connection,
            GroupError::ModuleStopped { .. }
            | GroupError::TunnelStopped { .. }
            | GroupError::MiddlemanUnavailable => FailureStage::Lifecycle,
        }
    }

    /// Whether a fresh `get` may succeed later. Nothing in this layer retries
    /// on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GroupError::Connection { .. }
                | GroupError::IntermediaryUnreachable { .. }
                | GroupError::TunnelStopped { .. }
                | GroupError::QueueFull { .. }
        )
    }
}
