//! System trait and the staged per-tick dispatcher

use crate::app::App;
use crate::error::{EcsError, Result};

/// Lifecycle stage of a tick, executed in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PreUpdate,
    Update,
    PostUpdate,
    Render,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [
        Stage::PreUpdate,
        Stage::Update,
        Stage::PostUpdate,
        Stage::Render,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::PreUpdate => "pre_update",
            Stage::Update => "update",
            Stage::PostUpdate => "post_update",
            Stage::Render => "render",
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::PreUpdate => 0,
            Stage::Update => 1,
            Stage::PostUpdate => 2,
            Stage::Render => 3,
        }
    }
}

/// A named processor invoked once per tick within its stage
pub trait System {
    /// Unique name, used for toggling and error reporting
    fn name(&self) -> &str;

    /// One-time setup, called once after the app is built
    ///
    /// Runs even for systems that are currently disabled.
    fn init(&mut self, _app: &mut App) -> Result<()> {
        Ok(())
    }

    /// Per-tick work
    fn update(&mut self, app: &mut App, dt: f64) -> Result<()>;
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

struct SystemEntry {
    system: BoxedSystem,
    enabled: bool,
}

/// Ordered registry of systems grouped into lifecycle stages
///
/// Within a stage, systems run in insertion order; stages run in
/// [`Stage::ALL`] order. Dispatch is single-threaded and cooperative.
pub struct SystemManager {
    stages: [Vec<SystemEntry>; 4],
}

impl SystemManager {
    pub fn new() -> Self {
        Self {
            stages: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Append a system to a stage; fails on a duplicate name
    pub fn add(&mut self, system: BoxedSystem, stage: Stage) -> Result<()> {
        let name = system.name();
        if self.find(name).is_some() {
            return Err(EcsError::DuplicateSystemName(name.to_string()));
        }
        log::debug!("registered system `{}` in {}", name, stage.name());
        self.stages[stage.index()].push(SystemEntry {
            system,
            enabled: true,
        });
        Ok(())
    }

    /// Run every system's `init` exactly once, in stage then insertion
    /// order
    pub(crate) fn init_all(&mut self, app: &mut App) -> Result<()> {
        for stage in Stage::ALL {
            let entries = &mut self.stages[stage.index()];
            for entry in entries.iter_mut() {
                entry.system.init(app)?;
            }
        }
        Ok(())
    }

    /// Run one tick: every enabled system in stage then insertion order
    ///
    /// The first error aborts the tick; remaining systems do not run.
    pub(crate) fn update_all(&mut self, app: &mut App, dt: f64) -> Result<()> {
        for stage in Stage::ALL {
            let entries = &mut self.stages[stage.index()];
            for entry in entries.iter_mut() {
                if !entry.enabled {
                    continue;
                }
                if let Err(err) = entry.system.update(app, dt) {
                    log::error!(
                        "system `{}` failed in {}: {err}",
                        entry.system.name(),
                        stage.name()
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Enable or disable a system by name
    ///
    /// Disabled systems are skipped by `update_all` but still receive
    /// `init`. Returns false when no system has this name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        for entries in &mut self.stages {
            for entry in entries.iter_mut() {
                if entry.system.name() == name {
                    entry.enabled = enabled;
                    return true;
                }
            }
        }
        false
    }

    /// Whether the named system is currently enabled
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.find(name).map(|entry| entry.enabled)
    }

    /// Total number of registered systems
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    fn find(&self, name: &str) -> Option<&SystemEntry> {
        self.stages
            .iter()
            .flat_map(|entries| entries.iter())
            .find(|entry| entry.system.name() == name)
    }
}

impl Default for SystemManager {
    fn default() -> Self {
        Self::new()
    }
}
