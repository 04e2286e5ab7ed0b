//! Transport Error Types
//!
//! Error handling for per-peer session dispatch: protocol violations,
//! unresolvable peers, session failures and payload serialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Protocol and routing errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A peer or path could not be mapped to a session
    #[error("Resolution error: {message} (peer: {peer:?})")]
    Resolution {
        message: String,
        peer: Option<String>,
    },

    /// A session rejected an operation
    #[error("Session error for {peer}: {message}")]
    Session { peer: String, message: String },

    /// Payload encoding errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a resolution error, optionally naming the peer
    pub fn resolution(message: impl Into<String>, peer: Option<&dyn fmt::Debug>) -> Self {
        Self::Resolution {
            message: message.into(),
            peer: peer.map(|p| format!("{:?}", p)),
        }
    }

    /// Create a session error
    pub fn session(peer: &dyn fmt::Debug, message: impl Into<String>) -> Self {
        Self::Session {
            peer: format!("{:?}", peer),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Protocol { .. } => "protocol",
            TransportError::Resolution { .. } => "resolution",
            TransportError::Session { .. } => "session",
            TransportError::Serialization { .. } => "serialization",
            TransportError::Configuration { .. } => "configuration",
        }
    }
}

// Custom Clone implementation since Box<dyn Error> doesn't implement Clone
impl Clone for TransportError {
    fn clone(&self) -> Self {
        match self {
            TransportError::Protocol { message } => TransportError::Protocol {
                message: message.clone(),
            },
            TransportError::Resolution { message, peer } => TransportError::Resolution {
                message: message.clone(),
                peer: peer.clone(),
            },
            TransportError::Session { peer, message } => TransportError::Session {
                peer: peer.clone(),
                message: message.clone(),
            },
            TransportError::Serialization { message, .. } => TransportError::Serialization {
                message: message.clone(),
                source: None,
            },
            TransportError::Configuration { message, field } => TransportError::Configuration {
                message: message.clone(),
                field: field.clone(),
            },
        }
    }
}

/// Convert bincode errors to transport errors
impl From<bincode::Error> for TransportError {
    fn from(error: bincode::Error) -> Self {
        TransportError::Serialization {
            message: "Binary serialization failed".to_string(),
            source: Some(Box::new(error)),
        }
    }
}

/// System error codes broadcast to every session of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sec {
    /// The remote side closed the socket
    SocketDisconnected,
    /// A read or write on the socket failed
    SocketOperationFailed,
    /// Incoming bytes did not form a valid message
    MalformedMessage,
    /// A message arrived that the protocol state did not expect
    UnexpectedMessage,
    /// A connection attempt or handshake timed out
    ConnectionTimeout,
    /// The transport shuts down
    Shutdown,
    /// Anything else
    RuntimeError,
}

impl Sec {
    /// Whether the physical connection is unusable after this error
    pub fn is_fatal_for_transport(&self) -> bool {
        matches!(
            self,
            Sec::SocketDisconnected | Sec::SocketOperationFailed | Sec::Shutdown
        )
    }
}

impl fmt::Display for Sec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Sec::SocketDisconnected => "socket_disconnected",
            Sec::SocketOperationFailed => "socket_operation_failed",
            Sec::MalformedMessage => "malformed_message",
            Sec::UnexpectedMessage => "unexpected_message",
            Sec::ConnectionTimeout => "connection_timeout",
            Sec::Shutdown => "shutdown",
            Sec::RuntimeError => "runtime_error",
        };
        f.write_str(text)
    }
}
