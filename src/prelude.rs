//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use hearth_ecs::prelude::*;
//! ```

pub use crate::app::App;
pub use crate::archetype::ArchetypeId;
pub use crate::component::{Bundle, Component, ComponentTypeId};
pub use crate::entity::EntityHandle;
pub use crate::error::{EcsError, Result};
pub use crate::plugin::Plugin;
pub use crate::query::{QueryResult, QuerySystem};
pub use crate::system::{Stage, System};
pub use crate::time::Time;
pub use crate::world::World;
