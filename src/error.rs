// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Component type was never registered with the world
    UnregisteredComponent(&'static str),

    /// Bundle or add targets a component the entity already has
    DuplicateComponent(&'static str),

    /// Entity handle is stale or never existed
    EntityNotFound,

    /// Remove targets a component the entity does not have
    ComponentNotFound(&'static str),

    /// A system with this name is already registered
    DuplicateSystemName(String),

    /// A plugin with this name is already registered
    DuplicatePluginName(String),

    /// Plugin declares a dependency that was never added
    UnknownPluginDependency {
        plugin: String,
        dependency: String,
    },

    /// Plugin dependency graph contains a cycle
    PluginDependencyCycle(String),

    /// Plugin build was already run for this app
    PluginsAlreadyBuilt,

    /// Opaque error raised by a system body; aborts the current tick
    SystemUpdate {
        system: String,
        message: String,
    },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::UnregisteredComponent(name) => {
                write!(f, "Component type not registered: {name}")
            }
            EcsError::DuplicateComponent(name) => {
                write!(f, "Duplicate component: {name}")
            }
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::ComponentNotFound(name) => {
                write!(f, "Component not found: {name}")
            }
            EcsError::DuplicateSystemName(name) => {
                write!(f, "Duplicate system name: {name}")
            }
            EcsError::DuplicatePluginName(name) => {
                write!(f, "Duplicate plugin name: {name}")
            }
            EcsError::UnknownPluginDependency { plugin, dependency } => {
                write!(f, "Plugin `{plugin}` depends on unknown plugin `{dependency}`")
            }
            EcsError::PluginDependencyCycle(detail) => {
                write!(f, "Plugin dependency cycle: {detail}")
            }
            EcsError::PluginsAlreadyBuilt => write!(f, "Plugins were already built"),
            EcsError::SystemUpdate { system, message } => {
                write!(f, "System `{system}` failed: {message}")
            }
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
