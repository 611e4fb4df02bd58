//! A loaded configuration tied to the loader it came from.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::loader::ConfigurationLoader;
use crate::node::ConfigNode;
use crate::path::Key;

type Subscriber = Arc<dyn Fn(&ConfigNode) + Send + Sync>;

/// Holds the current root node of a configuration together with its loader,
/// so it can be reloaded and saved without threading the loader around.
///
/// The reference can be shared between threads; readers get snapshots and
/// writers go through [`update`](Self::update).
pub struct ConfigReference<L> {
    loader: L,
    node: RwLock<ConfigNode>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl<L: ConfigurationLoader> ConfigReference<L> {
    /// Loads the configuration once and wraps it.
    pub fn load(loader: L) -> Result<Self> {
        let node = loader.load()?;
        Ok(ConfigReference {
            loader,
            node: RwLock::new(node),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// A snapshot of the current root node.
    pub fn node(&self) -> ConfigNode {
        self.node.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Deserializes the node at `path`. Missing nodes read as null.
    pub fn get<T, P>(&self, path: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: IntoIterator,
        P::Item: Into<Key>,
    {
        let guard = self.node.read().unwrap_or_else(PoisonError::into_inner);
        match guard.node(path) {
            Some(node) => node.get(),
            None => guard.create_detached().get(),
        }
    }

    /// Serializes `value` into the node at `path`, creating it if needed.
    pub fn set<T, P>(&self, path: P, value: T) -> Result<()>
    where
        T: Serialize,
        P: IntoIterator,
        P::Item: Into<Key>,
    {
        let mut guard = self.node.write().unwrap_or_else(PoisonError::into_inner);
        guard.node_mut(path).set(value)?;
        Ok(())
    }

    /// Runs `f` with exclusive access to the root node.
    pub fn update<R>(&self, f: impl FnOnce(&mut ConfigNode) -> R) -> R {
        let mut guard = self.node.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Loads the configuration again and notifies subscribers.
    pub fn reload(&self) -> Result<()> {
        let node = self.loader.load()?;
        debug!("Configuration reloaded");
        self.replace(node);
        Ok(())
    }

    /// Saves the current root node through the loader.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.node();
        self.loader.save(&snapshot)
    }

    /// Saves `node` and, once that succeeded, makes it the current root.
    pub fn save_node(&self, node: ConfigNode) -> Result<()> {
        self.loader.save(&node)?;
        self.replace(node);
        Ok(())
    }

    /// Registers a callback invoked with the new root after every reload or
    /// replacement.
    pub fn subscribe(&self, callback: impl Fn(&ConfigNode) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    fn replace(&self, node: ConfigNode) {
        {
            let mut guard = self.node.write().unwrap_or_else(PoisonError::into_inner);
            *guard = node.clone();
        }

        // Callbacks run without the lock held, so they may subscribe too.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in &subscribers {
            subscriber(&node);
        }
    }
}

impl<L: fmt::Debug> fmt::Debug for ConfigReference<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigReference")
            .field("loader", &self.loader)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
