//! Group Manager
//!
//! Looks up group modules by name and routes `module:group` locators to them.

use super::{Group, GroupModule};
use crate::error::{GroupError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
pub struct GroupManager {
    modules: RwLock<HashMap<String, Arc<dyn GroupModule>>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its own name, returning any module it replaces
    pub fn add_module(&self, module: Arc<dyn GroupModule>) -> Option<Arc<dyn GroupModule>> {
        let name = module.name().to_string();
        debug!(module = %name, "Registered group module");
        self.modules.write().insert(name, module)
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn GroupModule>> {
        self.modules.read().get(name).cloned()
    }

    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Group `group_name` from the module called `module_name`
    pub fn get(&self, module_name: &str, group_name: &str) -> Result<Group> {
        let module = self
            .module(module_name)
            .ok_or_else(|| GroupError::UnknownModule(module_name.to_string()))?;
        module.get(group_name)
    }

    /// Group addressed as `<module>:<group>`
    pub fn get_locator(&self, locator: &str) -> Result<Group> {
        match locator.split_once(':') {
            Some((module, group)) if !module.is_empty() && !group.is_empty() => self.get(module, group),
            _ => Err(GroupError::InvalidLocator(locator.to_string())),
        }
    }

    /// Stop every registered module
    pub fn stop(&self) {
        let modules: Vec<_> = self.modules.read().values().cloned().collect();
        for module in &modules {
            module.stop();
        }
        info!(modules = modules.len(), "Stopped group modules");
    }
}

impl std::fmt::Debug for GroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupManager")
            .field("modules", &self.module_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::RemoteGroupModule;
    use crate::test_utils::TestMiddleman;

    #[test]
    fn test_routes_to_named_module() {
        let middleman = Arc::new(TestMiddleman::new());
        let manager = GroupManager::new();
        assert!(manager.add_module(RemoteGroupModule::new(&middleman)).is_none());

        let group = manager.get("remote", "chat@tcp://host:7000").unwrap();
        assert_eq!(group.module_name(), "remote");
        assert_eq!(group.identifier(), "chat");

        let same = manager.get_locator("remote:chat@tcp://host:7000").unwrap();
        assert_eq!(group, same);
        assert_eq!(middleman.attempts(), 1);
    }

    #[test]
    fn test_unknown_module_and_bad_locator() {
        let manager = GroupManager::new();
        assert!(matches!(
            manager.get("local", "chat"),
            Err(GroupError::UnknownModule(name)) if name == "local"
        ));
        for bad in ["chat", ":chat", "remote:"] {
            assert!(matches!(manager.get_locator(bad), Err(GroupError::InvalidLocator(_))));
        }
    }

    #[test]
    fn test_stop_reaches_every_module() {
        let middleman = Arc::new(TestMiddleman::new());
        let module = RemoteGroupModule::new(&middleman);
        let manager = GroupManager::new();
        manager.add_module(module.clone());

        manager.stop();
        assert!(module.is_stopped());
        assert!(matches!(
            manager.get("remote", "chat@tcp://host:7000"),
            Err(GroupError::ModuleStopped { .. })
        ));
    }
}
