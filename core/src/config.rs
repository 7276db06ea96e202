//! Shared configuration and the context handle models sync through.
//!
//! # Design
//! There is no process-global singleton. A [`Context`] is built once at
//! startup and cloned into every model and collection; clones share one
//! `Config` by reference, and every sync reads it at call time. Calling
//! [`Context::configure`] therefore affects instances that already exist.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::http::Transport;

/// Origin, default headers and identity field name used by every sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub origin: String,
    pub headers: BTreeMap<String, String>,
    pub id_attribute: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            origin: String::new(),
            headers,
            id_attribute: "id".to_string(),
        }
    }
}

/// A partial configuration merged by [`Config::apply`].
///
/// Deserializes from `{"origin": .., "headers": {..}, "idAttribute": ..}`
/// with every key optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub origin: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub id_attribute: Option<String>,
}

impl ConfigUpdate {
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(id_attribute.into());
        self
    }
}

impl Config {
    /// Merge `update` into this configuration.
    ///
    /// Empty strings are ignored rather than clearing a field. Headers are
    /// merged key by key, comparing names case-insensitively; existing keys
    /// not named in the update survive.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(origin) = update.origin.filter(|o| !o.is_empty()) {
            self.origin = origin;
        }
        for (name, value) in update.headers.into_iter().flatten() {
            merge_header(&mut self.headers, name, value);
        }
        if let Some(id_attribute) = update.id_attribute.filter(|a| !a.is_empty()) {
            self.id_attribute = id_attribute;
        }
    }
}

/// Insert `name`, replacing any entry whose name differs only in case.
///
/// The most recent spelling of the name is the one kept.
fn merge_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// Cheaply cloneable handle to the shared configuration and transport.
#[derive(Clone)]
pub struct Context {
    config: Arc<RwLock<Config>>,
    transport: Arc<dyn Transport>,
}

impl Context {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(Config::default(), transport)
    }

    pub fn with_config(config: Config, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            transport: Arc::new(transport),
        }
    }

    /// Merge `update` into the shared configuration.
    pub fn configure(&self, update: ConfigUpdate) {
        let mut config = self.config.write();
        config.apply(update);
        tracing::debug!(
            target: "restbind::config",
            origin = %config.origin,
            headers = config.headers.len(),
            id_attribute = %config.id_attribute,
            "configuration updated"
        );
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub(crate) fn origin(&self) -> String {
        self.config.read().origin.clone()
    }

    pub(crate) fn id_attribute(&self) -> String {
        self.config.read().id_attribute.clone()
    }

    /// Configured headers overlaid with per-call `overrides`.
    pub(crate) fn headers_with(&self, overrides: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let mut headers = self.config.read().headers.clone();
        for (name, value) in overrides {
            merge_header(&mut headers, name.clone(), value.clone());
        }
        headers.into_iter().collect()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}
