//! Distributed Groups for the Actor Runtime
//!
//! Turns the local publish/subscribe group abstraction into proxies for the
//! same-named groups on remote nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌─────────────────────┐      ┌──────────────┐
//! │  GroupManager    │      │  RemoteGroupModule  │      │  Middleman   │
//! │  "remote:chat@…" │─────▶│  (node, group) ->   │─────▶│  resolve,    │
//! └──────────────────┘      │  Arc<GroupTunnel>   │ weak │  connect     │
//!                           └─────────┬───────────┘      └──────┬───────┘
//!                                     │                         │ callback
//!                           ┌─────────▼───────────┐             │
//!                           │  GroupTunnel        │◀────────────┘
//!                           │  queue -> upstream  │────▶ intermediary
//!                           └─────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use messaging_actors::test_utils::TestMiddleman;
//! use messaging_actors::RemoteGroupModule;
//! use std::sync::Arc;
//!
//! let middleman = Arc::new(TestMiddleman::new());
//! let module = RemoteGroupModule::new(&middleman);
//!
//! // Published before the connection exists; flushed once it does
//! let group = module.get("chat@tcp://node-a:7000").unwrap();
//! group.publish("hello", None).unwrap();
//!
//! let mut intermediary = middleman.take_pending().remove(0).succeed();
//! assert!(intermediary.try_recv().is_ok());
//!
//! module.stop();
//! ```

pub mod actor;
pub mod error;
pub mod group;
pub mod messages;
pub mod middleman;
pub mod test_utils;

pub use actor::{ActorId, ActorRef, Mailbox};
pub use error::{FailureStage, GroupError, Result};
pub use group::{Group, GroupManager, GroupModule, GroupTunnel, RemoteGroupModule, TunnelState};
pub use messages::GroupMessage;
pub use middleman::{split_group_address, ConnectCallback, Middleman};
