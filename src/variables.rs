//! Variable store.
//!
//! Two tiers: a global map shared by every client and a per-client map.
//! Client-scoped values shadow global ones; deleting a client value reveals
//! the global one again.

use crate::state::ClientId;
use crate::template::VariableResolver;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Variable store with global fallback.
#[derive(Default)]
pub struct VariableStore {
    global: RwLock<HashMap<String, String>>,
    clients: DashMap<ClientId, HashMap<String, String>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with global variables.
    pub fn with_globals(globals: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            global: RwLock::new(globals.into_iter().collect()),
            clients: DashMap::new(),
        }
    }

    pub fn set_global(&self, name: &str, value: &str) {
        self.global.write().insert(name.to_string(), value.to_string());
        debug!(name, "Global variable set");
    }

    pub fn set_for_client(&self, client: &ClientId, name: &str, value: &str) {
        self.clients
            .entry(client.clone())
            .or_default()
            .insert(name.to_string(), value.to_string());
        debug!(client = %client, name, "Client variable set");
    }

    /// Remove a global variable. Absent names are ignored.
    pub fn delete_global(&self, name: &str) {
        if self.global.write().remove(name).is_some() {
            debug!(name, "Global variable deleted");
        }
    }

    /// Remove a client-scoped variable. Absent names are ignored and the
    /// global tier is never touched.
    pub fn delete_for_client(&self, client: &ClientId, name: &str) {
        if let Some(mut vars) = self.clients.get_mut(client) {
            if vars.value_mut().remove(name).is_some() {
                debug!(client = %client, name, "Client variable deleted");
            }
        }
    }

    /// Drop every client-scoped variable of a client.
    pub fn clear_client(&self, client: &ClientId) {
        self.clients.remove(client);
    }

    /// Client value, else global value, else `None`.
    pub fn resolve(&self, client: &ClientId, name: &str) -> Option<String> {
        if let Some(value) = self
            .clients
            .get(client)
            .and_then(|vars| vars.value().get(name).cloned())
        {
            return Some(value);
        }
        self.global.read().get(name).cloned()
    }

    /// Merged effective view for a client.
    pub fn snapshot(&self, client: &ClientId) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = self
            .global
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(vars) = self.clients.get(client) {
            merged.extend(vars.value().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// Resolver bound to one client, for template rendering.
    pub fn resolver<'a>(&'a self, client: &'a ClientId) -> ClientVariables<'a> {
        ClientVariables {
            store: self,
            client,
        }
    }
}

/// A [`VariableStore`] viewed from one client.
pub struct ClientVariables<'a> {
    store: &'a VariableStore,
    client: &'a ClientId,
}

impl VariableResolver for ClientVariables<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.store.resolve(self.client, name)
    }
}
