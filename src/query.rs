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

//! Cached structural queries
//!
//! A [`QuerySystem`] holds a required component set and a cached list of
//! matching archetypes. The cache is soft: it may still list archetypes
//! that have since emptied (their rows simply do not yield), but any
//! growth of the archetype set advances the world's topology version and
//! forces a re-resolve, so no matching archetype is ever skipped.

use crate::archetype::{ArchetypeId, ArchetypeSignature};
use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityHandle;
use crate::world::World;

/// True when `signature` contains every id in `required`
///
/// Both slices must be sorted.
pub(crate) fn matches_signature(
    signature: &[ComponentTypeId],
    required: &[ComponentTypeId],
) -> bool {
    required
        .iter()
        .all(|id| signature.binary_search(id).is_ok())
}

/// One matched row: the entity and its physical location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResult {
    pub entity: EntityHandle,
    pub archetype_id: ArchetypeId,
    pub row: usize,
}

impl QueryResult {
    /// Resolve one of the matched entity's components
    ///
    /// Re-checks that the row still belongs to this entity, so results
    /// staled by a structural change return `None` instead of another
    /// entity's data.
    pub fn get<'w, T: Component>(&self, world: &'w World) -> Option<&'w T> {
        let type_id = world.registry().id_of::<T>()?;
        let archetype = world.archetype(self.archetype_id)?;
        if archetype.entities().get(self.row) != Some(&self.entity) {
            return None;
        }
        unsafe { archetype.column(type_id)?.get::<T>(self.row) }
    }

    /// Mutable counterpart of [`get`](Self::get)
    pub fn get_mut<'w, T: Component>(&self, world: &'w mut World) -> Option<&'w mut T> {
        let type_id = world.registry().id_of::<T>()?;
        let archetype = world.archetype_mut(self.archetype_id)?;
        if archetype.entities().get(self.row) != Some(&self.entity) {
            return None;
        }
        unsafe { archetype.column_mut(type_id)?.get_mut::<T>(self.row) }
    }
}

/// Row iterator over a resolved list of archetypes
pub struct QueryIter<'w> {
    world: &'w World,
    archetype_ids: Vec<ArchetypeId>,
    cursor: usize,
    row: usize,
}

impl<'w> QueryIter<'w> {
    pub(crate) fn new(world: &'w World, archetype_ids: Vec<ArchetypeId>) -> Self {
        Self {
            world,
            archetype_ids,
            cursor: 0,
            row: 0,
        }
    }
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = QueryResult;

    fn next(&mut self) -> Option<QueryResult> {
        loop {
            let archetype_id = *self.archetype_ids.get(self.cursor)?;
            if let Some(archetype) = self.world.archetype(archetype_id) {
                if self.row < archetype.len() {
                    let result = QueryResult {
                        entity: archetype.entities()[self.row],
                        archetype_id,
                        row: self.row,
                    };
                    self.row += 1;
                    return Some(result);
                }
            }
            self.cursor += 1;
            self.row = 0;
        }
    }
}

/// A cached archetype selector
///
/// Holds a sorted required set and the archetypes known to match it. The
/// cache re-resolves lazily when it was never populated, was explicitly
/// invalidated, or the world's archetype topology has changed since.
pub struct QuerySystem {
    required: ArchetypeSignature,
    cached: Option<Vec<ArchetypeId>>,
    seen_version: u64,
}

impl QuerySystem {
    /// Build a selector for archetypes containing every given type
    pub fn new(required: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let mut set: ArchetypeSignature = required.into_iter().collect();
        set.sort_unstable();
        set.dedup();
        Self {
            required: set,
            cached: None,
            seen_version: 0,
        }
    }

    /// The sorted required component set
    pub fn required(&self) -> &[ComponentTypeId] {
        &self.required
    }

    /// Mark the cache stale; the next query re-scans the world
    pub fn invalidate_cache(&mut self) {
        self.cached = None;
    }

    /// Whether the cache currently holds a resolved archetype list
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Iterate every row of every matching archetype
    ///
    /// Refreshes the cache first if it is stale.
    pub fn query<'w>(&mut self, world: &'w World) -> QueryIter<'w> {
        let stale = self.cached.is_none() || self.seen_version != world.topology_version();
        if stale {
            let matches: Vec<ArchetypeId> = world
                .archetypes()
                .filter(|archetype| matches_signature(archetype.signature(), &self.required))
                .map(|archetype| archetype.id())
                .collect();
            self.cached = Some(matches);
            self.seen_version = world.topology_version();
        }
        // Hand the iterator its own copy so it stays detached from the cache
        let matches = self.cached.as_deref().unwrap_or(&[]).to_vec();
        QueryIter::new(world, matches)
    }
}
