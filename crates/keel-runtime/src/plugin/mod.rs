//! Plugin hooks around grouped table applications.

mod log;

pub use log::OperationLogPlugin;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use keel_core::{KeelError, Operation, OperationKind, Result};

/// Type alias for a boxed hook callback. Hooks receive the operation and the open
/// transaction's connection.
pub type BoxedHook<C> = Arc<
    dyn for<'a> Fn(&'a Operation, &'a mut C) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
        + Send
        + Sync,
>;

/// When a hook fires relative to the DDL of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

/// Registry of hooks keyed by operation kind and phase, in registration order.
pub struct HookRegistry<C> {
    hooks: HashMap<(OperationKind, HookPhase), Vec<BoxedHook<C>>>,
}

impl<C> Default for HookRegistry<C> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<C> Clone for HookRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<C: Send> HookRegistry<C> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `kind` in `phase`.
    pub fn tap<F>(&mut self, kind: OperationKind, phase: HookPhase, hook: F)
    where
        F: for<'a> Fn(&'a Operation, &'a mut C) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks
            .entry((kind, phase))
            .or_default()
            .push(Arc::new(hook));
    }

    /// Register the same callback for every operation kind.
    pub fn tap_all<F>(&mut self, phase: HookPhase, hook: F)
    where
        F: for<'a> Fn(&'a Operation, &'a mut C) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        let hook: BoxedHook<C> = Arc::new(hook);
        for kind in OperationKind::ALL {
            self.hooks.entry((kind, phase)).or_default().push(hook.clone());
        }
    }

    /// Hooks registered for `kind` in `phase`.
    pub fn hooks(&self, kind: OperationKind, phase: HookPhase) -> &[BoxedHook<C>] {
        self.hooks
            .get(&(kind, phase))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run the hooks for `operation` in order. The first failure stops the chain.
    pub async fn fire(&self, phase: HookPhase, operation: &Operation, conn: &mut C) -> Result<()> {
        for hook in self.hooks(operation.kind(), phase) {
            hook(operation, &mut *conn).await.map_err(|e| match e {
                KeelError::Hook { .. } => e,
                other => KeelError::hook(operation.kind(), other),
            })?;
        }
        Ok(())
    }

    /// Get the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// A plugin taps into the migration run by registering hooks.
pub trait Plugin<C>: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, hooks: &mut HookRegistry<C>);
}

/// Plugins available by name, from which the configured list is resolved.
pub struct PluginCatalog<C> {
    plugins: HashMap<String, Arc<dyn Plugin<C>>>,
}

impl<C> Default for PluginCatalog<C> {
    fn default() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }
}

impl<C: Send + 'static> PluginCatalog<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the plugins shipped with keel.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.add(Arc::new(OperationLogPlugin));
        catalog
    }

    pub fn add(&mut self, plugin: Arc<dyn Plugin<C>>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Build a registry from the named plugins, in the given order.
    pub fn resolve(&self, names: &[String]) -> Result<HookRegistry<C>> {
        let mut hooks = HookRegistry::new();
        for name in names {
            let plugin = self
                .plugins
                .get(name)
                .ok_or_else(|| KeelError::Config(format!("Unknown plugin: {}", name)))?;
            plugin.register(&mut hooks);
        }
        Ok(hooks)
    }
}
