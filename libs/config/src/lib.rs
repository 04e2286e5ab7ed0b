//! # Routing Configuration
//!
//! Typed settings for the transport worker dispatcher and the remote group
//! module, plus the tracing bootstrap used by the processes embedding them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use routing_config::{init_tracing, RoutingConfig};
//!
//! let config = RoutingConfig::load(None).unwrap();
//! init_tracing(&config.logging);
//! assert!(config.groups.max_pending_messages > 0);
//! ```

pub mod logging;
pub mod routing_config;

// Re-export commonly used types
pub use logging::init_tracing;
pub use routing_config::{DispatcherSettings, GroupSettings, LogSettings, RoutingConfig, ENV_PREFIX};
