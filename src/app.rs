//! Main application entry point
//!
//! The app owns the world, the resource store, the system scheduler, and
//! the plugin loader, and is the surface the external frame driver talks
//! to: `build()` once, then `update(dt)` every frame.

use crate::error::Result;
use crate::plugin::{Plugin, PluginManager};
use crate::resources::ResourceManager;
use crate::system::{BoxedSystem, Stage, SystemManager};
use crate::time::Time;
use crate::world::World;

/// Main application: world, resources, systems, plugins
pub struct App {
    pub world: World,
    pub resources: ResourceManager,
    pub systems: SystemManager,
    pub plugins: PluginManager,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    /// Create a new application with a frame clock installed
    pub fn new() -> Self {
        let mut app = Self {
            world: World::new(),
            resources: ResourceManager::new(),
            systems: SystemManager::new(),
            plugins: PluginManager::new(),
        };
        app.resources.insert(Time::new());
        app
    }

    /// Register a plugin for the next `build`
    pub fn add_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> Result<&mut Self> {
        self.plugins.add(Box::new(plugin))?;
        Ok(self)
    }

    /// Register a system in a lifecycle stage
    pub fn add_system(&mut self, system: BoxedSystem, stage: Stage) -> Result<&mut Self> {
        self.systems.add(system, stage)?;
        Ok(self)
    }

    /// Store an owned resource
    pub fn insert_resource<T: 'static>(&mut self, value: T) -> &mut Self {
        self.resources.insert(value);
        self
    }

    /// Build all plugins in dependency order, then init every system
    ///
    /// Called once before the first `update`.
    pub fn build(&mut self) -> Result<()> {
        // Plugins and systems receive `&mut App` while their own manager
        // iterates its list. Sound under the dispatch contract: build and
        // init bodies must not add or remove plugins/systems; they may
        // freely touch the world, resources, and enable flags.
        let plugins: *mut PluginManager = &mut self.plugins;
        unsafe { (*plugins).build(self) }?;

        let systems: *mut SystemManager = &mut self.systems;
        unsafe { (*systems).init_all(self) }
    }

    /// Run one tick: advance the frame clock, then dispatch every enabled
    /// system in stage order
    ///
    /// A system error aborts the tick and propagates.
    pub fn update(&mut self, dt: f64) -> Result<()> {
        if let Some(time) = self.resources.get_mut::<Time>() {
            time.advance(dt);
        }
        // Same aliasing contract as `build`.
        let systems: *mut SystemManager = &mut self.systems;
        unsafe { (*systems).update_all(self, dt) }
    }

    /// Toggle a built plugin, firing its enable/disable hook
    pub fn set_plugin_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let plugins: *mut PluginManager = &mut self.plugins;
        unsafe { (*plugins).set_enabled(name, enabled, self) }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
