//! Plugin trait and the dependency-ordered plugin loader
//!
//! A plugin is a one-shot builder that registers component types,
//! resources, and systems into the app. Plugins declare dependencies by
//! name and are built in topological order.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::app::App;
use crate::error::{EcsError, Result};

/// Plugin trait for modular application composition
pub trait Plugin {
    /// Unique plugin name
    fn name(&self) -> &str;

    /// Names of plugins that must build before this one
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Register types, resources, and systems into the app
    fn build(&self, app: &mut App) -> Result<()>;

    /// Called after every plugin has built, in build order
    fn on_enable(&self, _app: &mut App) {}

    /// Called when the plugin is disabled after build
    fn on_disable(&self, _app: &mut App) {}
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Dependency-ordered registry of one-shot plugin builders
pub struct PluginManager {
    plugins: Vec<PluginEntry>,
    built: bool,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            built: false,
        }
    }

    /// Register a plugin; fails on a duplicate name
    pub fn add(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name();
        if self.index_of(name).is_some() {
            return Err(EcsError::DuplicatePluginName(name.to_string()));
        }
        self.plugins.push(PluginEntry {
            plugin,
            enabled: false,
        });
        Ok(())
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Whether `build` has already run
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Whether the named plugin is currently enabled
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.index_of(name).map(|i| self.plugins[i].enabled)
    }

    /// Build every plugin in dependency order, then fire `on_enable` in
    /// the same order
    ///
    /// One-shot: fails on a second call, on an unknown dependency, on a
    /// dependency cycle, and on any plugin-reported error.
    pub(crate) fn build(&mut self, app: &mut App) -> Result<()> {
        if self.built {
            return Err(EcsError::PluginsAlreadyBuilt);
        }
        let order = self.sorted_order()?;

        for &index in &order {
            let plugin = &self.plugins[index].plugin;
            log::info!("building plugin `{}`", plugin.name());
            plugin.build(app)?;
        }
        for &index in &order {
            self.plugins[index].plugin.on_enable(app);
            self.plugins[index].enabled = true;
        }

        self.built = true;
        Ok(())
    }

    /// Toggle a plugin after build, firing its enable/disable hook
    ///
    /// Returns false when no plugin has this name or the state did not
    /// change.
    pub(crate) fn set_enabled(&mut self, name: &str, enabled: bool, app: &mut App) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        if self.plugins[index].enabled == enabled {
            return false;
        }
        self.plugins[index].enabled = enabled;
        if enabled {
            self.plugins[index].plugin.on_enable(app);
        } else {
            self.plugins[index].plugin.on_disable(app);
        }
        true
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.plugins
            .iter()
            .position(|entry| entry.plugin.name() == name)
    }

    /// Topological sort over declared dependencies (Kahn's algorithm)
    ///
    /// Edges run dependency -> dependent, so dependencies build first.
    /// Ties break by insertion order.
    fn sorted_order(&self) -> Result<Vec<usize>> {
        let count = self.plugins.len();
        let mut edges: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let mut in_degree = vec![0usize; count];

        for (index, entry) in self.plugins.iter().enumerate() {
            for dependency in entry.plugin.dependencies() {
                let dep_index = self.index_of(dependency).ok_or_else(|| {
                    EcsError::UnknownPluginDependency {
                        plugin: entry.plugin.name().to_string(),
                        dependency: dependency.to_string(),
                    }
                })?;
                edges.entry(dep_index).or_default().push(index);
                in_degree[index] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(index) = queue.pop_front() {
            order.push(index);
            if let Some(dependents) = edges.get(&index) {
                for &dependent in dependents {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != count {
            let stuck: Vec<&str> = (0..count)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.plugins[i].plugin.name())
                .collect();
            return Err(EcsError::PluginDependencyCycle(stuck.join(", ")));
        }

        Ok(order)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
