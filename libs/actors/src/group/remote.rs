//! Remote Group Module
//!
//! Hands out [`Group`] handles for groups hosted on other nodes. Each
//! (origin node, group) pair maps to at most one live [`GroupTunnel`]; the
//! tunnel is created unconnected and the middleman connects it in the
//! background.
//!
//! ## Locking
//!
//! The tunnel registry and the stop flag live behind one mutex, entered only
//! through `critical_section`. Lock order is module then tunnel. The middleman is never called with the registry locked, so a
//! middleman that completes synchronously can re-enter the module.
//!
//! ## Shutdown order
//!
//! The module holds the middleman weakly. The runtime must call
//! [`RemoteGroupModule::stop`] before dropping the middleman; a module that
//! outlives its middleman fails every `get` with
//! [`GroupError::MiddlemanUnavailable`].

use super::tunnel::GroupTunnel;
use super::{Group, GroupModule};
use crate::actor::ActorRef;
use crate::error::{GroupError, Result};
use crate::middleman::{ConnectCallback, Middleman};
use network::NodeId;
use parking_lot::Mutex;
use routing_config::GroupSettings;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

type TunnelMap = HashMap<NodeId, HashMap<String, Arc<GroupTunnel>>>;

/// Registry state guarded by the module mutex
#[derive(Default)]
struct ModuleState {
    stopped: bool,
    instances: TunnelMap,
}

impl ModuleState {
    fn find(&self, origin: &NodeId, group_name: &str) -> Option<&Arc<GroupTunnel>> {
        self.instances.get(origin)?.get(group_name)
    }

    fn find_live(&self, origin: &NodeId, group_name: &str) -> Option<Arc<GroupTunnel>> {
        self.find(origin, group_name)
            .filter(|tunnel| !tunnel.is_stopped())
            .cloned()
    }

    fn holds(&self, tunnel: &Arc<GroupTunnel>) -> bool {
        self.find(tunnel.origin(), tunnel.identifier())
            .is_some_and(|registered| Arc::ptr_eq(registered, tunnel))
    }

    fn insert(&mut self, tunnel: Arc<GroupTunnel>) {
        self.instances
            .entry(tunnel.origin().clone())
            .or_default()
            .insert(tunnel.identifier().to_string(), tunnel);
    }

    fn remove(&mut self, tunnel: &Arc<GroupTunnel>) -> bool {
        if !self.holds(tunnel) {
            return false;
        }
        if let Some(groups) = self.instances.get_mut(tunnel.origin()) {
            groups.remove(tunnel.identifier());
            if groups.is_empty() {
                self.instances.remove(tunnel.origin());
            }
        }
        true
    }
}

pub struct RemoteGroupModule {
    name: String,
    max_pending: usize,
    middleman: Weak<dyn Middleman>,
    this: Weak<RemoteGroupModule>,
    state: Mutex<ModuleState>,
}

impl RemoteGroupModule {
    pub fn new<M: Middleman + 'static>(middleman: &Arc<M>) -> Arc<Self> {
        Self::with_settings(middleman, &GroupSettings::default())
    }

    pub fn with_settings<M: Middleman + 'static>(middleman: &Arc<M>, settings: &GroupSettings) -> Arc<Self> {
        let middleman: Weak<M> = Arc::downgrade(middleman);
        Self::from_weak(middleman, settings)
    }

    /// Build from an already type-erased middleman reference
    pub fn from_weak(middleman: Weak<dyn Middleman>, settings: &GroupSettings) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: settings.module_name.clone(),
            max_pending: settings.max_pending_messages,
            middleman,
            this: this.clone(),
            state: Mutex::new(ModuleState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stopped(&self) -> bool {
        self.critical_section(|state| state.stopped)
    }

    /// Number of registered tunnels across all nodes
    pub fn tunnel_count(&self) -> usize {
        self.critical_section(|state| state.instances.values().map(HashMap::len).sum())
    }

    /// Run `f` with the registry locked. The guard is released on every exit
    /// path, including panics in `f`.
    fn critical_section<R>(&self, f: impl FnOnce(&mut ModuleState) -> R) -> R {
        let mut guard = self.state.lock();
        f(&mut guard)
    }

    /// Resolve `group_name` through the middleman and return a handle to its
    /// tunnel
    pub fn get(&self, group_name: &str) -> Result<Group> {
        if self.is_stopped() {
            return Err(self.stopped_error());
        }
        let middleman = self.middleman()?;
        let (origin, name) = middleman.resolve_group_name(group_name)?;
        drop(middleman);

        let tunnel = self.get_impl(&origin, &name)?;
        Ok(Group::new(self.name.clone(), tunnel))
    }

    /// Tunnel for `group_name` on `origin`, created unconnected if missing.
    ///
    /// A new tunnel triggers exactly one `connect_lazily` on the middleman;
    /// the call returns without waiting for it.
    pub fn get_impl(&self, origin: &NodeId, group_name: &str) -> Result<Arc<GroupTunnel>> {
        let middleman = self.middleman.upgrade();

        let (tunnel, created) = self.critical_section(|state| {
            if state.stopped {
                return Err(self.stopped_error());
            }
            if let Some(tunnel) = state.find_live(origin, group_name) {
                return Ok((tunnel, false));
            }
            if middleman.is_none() {
                return Err(GroupError::MiddlemanUnavailable);
            }
            let tunnel = Arc::new(GroupTunnel::new(origin.clone(), group_name, self.max_pending));
            state.insert(Arc::clone(&tunnel));
            Ok((tunnel, true))
        })
        .inspect_err(|e| {
            if matches!(e, GroupError::MiddlemanUnavailable) {
                error!(module = %self.name, "Group module used after its middleman was dropped");
            }
        })?;

        if created {
            debug!(module = %self.name, %origin, group = group_name, "Created group tunnel");
            if let Some(middleman) = middleman {
                middleman.connect_lazily(origin, group_name, self.make_callback(&tunnel));
            }
        }
        Ok(tunnel)
    }

    /// Tunnel for `group_name` on the intermediary's node, connected to
    /// `intermediary`
    pub fn get_impl_connected(&self, intermediary: &ActorRef, group_name: &str) -> Result<Arc<GroupTunnel>> {
        let origin = intermediary.node();
        self.critical_section(|state| {
            if state.stopped {
                return Err(self.stopped_error());
            }
            if let Some(tunnel) = state.find_live(origin, group_name) {
                tunnel.connect(intermediary.clone());
                return Ok(tunnel);
            }
            let tunnel = Arc::new(GroupTunnel::connected(
                intermediary.clone(),
                group_name,
                self.max_pending,
            ));
            state.insert(Arc::clone(&tunnel));
            debug!(module = %self.name, %origin, group = group_name, "Created connected group tunnel");
            Ok(tunnel)
        })
    }

    /// Registered tunnel for the pair, if any. Never creates.
    pub fn lookup(&self, origin: &NodeId, group_name: &str) -> Option<Arc<GroupTunnel>> {
        self.critical_section(|state| state.find(origin, group_name).cloned())
    }

    /// Set the stop flag and tear down every registered tunnel
    pub fn stop(&self) {
        let dropped = self.critical_section(|state| {
            if state.stopped {
                return 0;
            }
            state.stopped = true;
            let mut dropped = 0;
            for (_, groups) in state.instances.drain() {
                for (_, tunnel) in groups {
                    tunnel.stop();
                    dropped += 1;
                }
            }
            dropped
        });
        debug!(module = %self.name, dropped, "Group module stopped");
    }

    /// Tear down every tunnel to `origin`, e.g. after the peer went away
    pub fn drop_node(&self, origin: &NodeId) -> usize {
        let dropped = self.critical_section(|state| {
            let groups = state.instances.remove(origin).unwrap_or_default();
            for tunnel in groups.values() {
                tunnel.stop();
            }
            groups.len()
        });
        if dropped > 0 {
            debug!(module = %self.name, %origin, dropped, "Dropped tunnels of departed node");
        }
        dropped
    }

    /// Stop `tunnel` and unregister it if the registry still maps its key to
    /// this exact instance. A newer tunnel under the same key is left alone.
    pub fn drop_tunnel(&self, tunnel: &Arc<GroupTunnel>) {
        let removed = self.critical_section(|state| state.remove(tunnel));
        tunnel.stop();
        if removed {
            debug!(
                module = %self.name,
                origin = %tunnel.origin(),
                group = tunnel.identifier(),
                "Dropped group tunnel"
            );
        }
    }

    /// Connect `tunnel` to `intermediary` if it is still registered.
    /// Detached tunnels are left untouched.
    pub fn connect(&self, tunnel: &Arc<GroupTunnel>, intermediary: ActorRef) -> bool {
        self.critical_section(|state| state.holds(tunnel) && tunnel.connect(intermediary))
    }

    /// Completion for a lazy connection attempt on `tunnel`.
    ///
    /// Keeps the tunnel alive on its own; the registry entry may be gone by
    /// the time it runs.
    fn make_callback(&self, tunnel: &Arc<GroupTunnel>) -> ConnectCallback {
        let tunnel = Arc::clone(tunnel);
        let module = self.this.clone();
        Box::new(move |result| {
            let Some(module) = module.upgrade() else {
                tunnel.stop();
                return;
            };
            match result {
                Ok(intermediary) => {
                    if !module.connect(&tunnel, intermediary) {
                        debug!(
                            module = %module.name,
                            origin = %tunnel.origin(),
                            group = tunnel.identifier(),
                            "Connection completed for detached tunnel"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        module = %module.name,
                        origin = %tunnel.origin(),
                        group = tunnel.identifier(),
                        error = %e,
                        "Group connection attempt failed"
                    );
                    module.drop_tunnel(&tunnel);
                }
            }
        })
    }

    fn middleman(&self) -> Result<Arc<dyn Middleman>> {
        self.middleman.upgrade().ok_or_else(|| {
            error!(module = %self.name, "Group module used after its middleman was dropped");
            GroupError::MiddlemanUnavailable
        })
    }

    fn stopped_error(&self) -> GroupError {
        GroupError::ModuleStopped {
            module: self.name.clone(),
        }
    }
}

impl GroupModule for RemoteGroupModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, group_name: &str) -> Result<Group> {
        RemoteGroupModule::get(self, group_name)
    }

    fn stop(&self) {
        RemoteGroupModule::stop(self)
    }
}

impl std::fmt::Debug for RemoteGroupModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGroupModule")
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .field("tunnels", &self.tunnel_count())
            .finish()
    }
}
