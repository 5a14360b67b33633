//! Group Registry
//!
//! Process-scoped lookup of groups by name. Created once at startup and shared
//! by reference with whatever needs to resolve a namespace.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::group::Group;
use crate::loader::Loader;

// == Group Registry ==
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == New Group ==
    /// Creates a group and registers it under `name`.
    ///
    /// Registering a name that is already taken replaces the earlier group,
    /// cache contents included. Holders of the old `Arc<Group>` keep a working
    /// but unreachable group.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: usize,
        loader: Arc<dyn Loader>,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), cache_bytes, loader));

        let mut groups = self.groups.write();
        if groups.insert(name.clone(), group.clone()).is_some() {
            debug!("Group {} re-registered, previous group replaced", name);
        } else {
            info!("Group {} registered with {} cache bytes", name, cache_bytes);
        }
        group
    }

    // == Get Group ==
    /// Looks a group up by name.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Returns all registered group names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns all registered groups, sorted by name.
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }
}
