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

//! Archetype-based Entity Component System
//!
//! Entities are grouped by their exact component set into column-store
//! archetypes, with cached structural queries and a staged single-threaded
//! app runtime (resources, systems, plugins) on top.

pub mod app;
pub mod archetype;
pub mod component;
pub mod entity;
pub mod error;
pub mod plugin;
pub mod query;
pub mod resources;
pub mod system;
pub mod time;
pub mod world;

pub mod prelude;

// Re-exports for convenience
pub use app::App;
pub use archetype::{Archetype, ArchetypeId};
pub use component::{Bundle, Component, ComponentTypeId, TypeRegistry};
pub use entity::{EntityHandle, EntityManager, EntityRecord};
pub use error::{EcsError, Result};
pub use plugin::{Plugin, PluginManager};
pub use query::{QueryIter, QueryResult, QuerySystem};
pub use resources::ResourceManager;
pub use system::{BoxedSystem, Stage, System, SystemManager};
pub use time::Time;
pub use world::World;
