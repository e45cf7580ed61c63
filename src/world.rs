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

//! World: central entity and archetype storage
//!
//! Owns the type registry, the entity manager, the archetype table keyed
//! by canonical archetype id, and the entity directory. Structural changes
//! (spawn, despawn, component add/remove) migrate rows between archetypes
//! and advance a topology version that query caches compare against.

use ahash::AHashMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeSignature, RowPart};
use crate::component::{Bundle, Component, ComponentTypeId, TypeRegistry, MAX_BUNDLE_COMPONENTS};
use crate::entity::{EntityHandle, EntityManager, EntityRecord};
use crate::error::{EcsError, Result};
use crate::query::{matches_signature, QueryIter};

/// Central ECS world
///
/// The world exclusively owns all archetypes, all column storage, and the
/// type registry. Entity handles are plain values carrying no ownership.
pub struct World {
    registry: TypeRegistry,

    entities: EntityManager,

    /// All archetypes, keyed by the canonical hash of their signature
    archetypes: AHashMap<ArchetypeId, Archetype>,

    /// Directory: every live entity's physical location, exactly once
    entity_index: AHashMap<EntityHandle, EntityRecord>,

    /// Bumped whenever the archetype set changes; query caches built
    /// against an older version are stale
    topology_version: u64,
}

impl World {
    /// Create a new, empty world
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::new(),
            entities: EntityManager::new(),
            // Start with reasonable defaults to avoid resize spikes
            archetypes: AHashMap::with_capacity(64),
            entity_index: AHashMap::with_capacity(256),
            topology_version: 0,
        }
    }

    /// Register a component type for use in this world
    pub fn register_component<T: Component>(&mut self) -> ComponentTypeId {
        self.registry.register::<T>()
    }

    /// Dense id of a registered component type
    pub fn component_id<T: Component>(&self) -> Option<ComponentTypeId> {
        self.registry.id_of::<T>()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Current archetype-topology version
    ///
    /// Advances whenever an archetype comes into existence (or the world
    /// is cleared); query caches remember the version they resolved
    /// against.
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// Spawn an entity with no components
    pub fn spawn_empty(&mut self) -> EntityHandle {
        let archetype_id = self.get_or_create_archetype(ArchetypeSignature::new());
        let entity = self.entities.create();
        let row = self
            .archetypes
            .get_mut(&archetype_id)
            .unwrap()
            .allocate_row(entity);
        self.entity_index
            .insert(entity, EntityRecord { archetype_id, row });
        entity
    }

    /// Spawn a new entity with the given bundle of components
    ///
    /// Fails when a bundle type was never registered or appears twice.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<EntityHandle> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.spawn", archetype_count = self.archetypes.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let (ids, archetype_id) = self.resolve_bundle::<B>()?;

        let entity = self.entities.create();
        let archetype = self.archetypes.get_mut(&archetype_id).unwrap();
        let row = archetype.allocate_row(entity);
        write_bundle(archetype, row, &ids, bundle);

        self.entity_index
            .insert(entity, EntityRecord { archetype_id, row });
        Ok(entity)
    }

    /// Spawn many entities with the same bundle shape in one batch
    ///
    /// Resolves the bundle and reserves archetype rows once, so this is
    /// cheaper than repeated `spawn` calls.
    pub fn spawn_batch<B, I>(&mut self, bundles: I) -> Result<Vec<EntityHandle>>
    where
        B: Bundle,
        I: IntoIterator<Item = B>,
        I::IntoIter: ExactSizeIterator,
    {
        let bundles = bundles.into_iter();
        let count = bundles.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let (ids, archetype_id) = self.resolve_bundle::<B>()?;
        self.archetypes
            .get_mut(&archetype_id)
            .unwrap()
            .reserve_rows(count);

        let mut spawned = Vec::with_capacity(count);
        for bundle in bundles {
            let entity = self.entities.create();
            let archetype = self.archetypes.get_mut(&archetype_id).unwrap();
            let row = archetype.allocate_row(entity);
            write_bundle(archetype, row, &ids, bundle);
            self.entity_index
                .insert(entity, EntityRecord { archetype_id, row });
            spawned.push(entity);
        }
        Ok(spawned)
    }

    /// Check if an entity handle is live
    pub fn is_alive(&self, entity: EntityHandle) -> bool {
        self.entities.is_alive(entity)
    }

    /// Despawn an entity, dropping all its components
    ///
    /// Returns false for stale or unknown handles.
    pub fn despawn(&mut self, entity: EntityHandle) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let record = match self.entity_index.remove(&entity) {
            Some(record) => record,
            None => return false,
        };
        if let Some(archetype) = self.archetypes.get_mut(&record.archetype_id) {
            if let Some(moved) = archetype.swap_remove_row(record.row) {
                // The tail entity took the freed row; its directory entry
                // must follow.
                if let Some(rec) = self.entity_index.get_mut(&moved) {
                    rec.row = record.row;
                }
            }
        }
        self.entities.destroy(entity);
        true
    }

    /// Get immutable reference to a component on an entity
    pub fn get_component<T: Component>(&self, entity: EntityHandle) -> Option<&T> {
        let type_id = self.registry.id_of::<T>()?;
        let record = self.entity_index.get(&entity)?;
        let column = self.archetypes.get(&record.archetype_id)?.column(type_id)?;
        unsafe { column.get::<T>(record.row) }
    }

    /// Get mutable reference to a component on an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityHandle) -> Option<&mut T> {
        let type_id = self.registry.id_of::<T>()?;
        let record = self.entity_index.get(&entity)?;
        let column = self
            .archetypes
            .get_mut(&record.archetype_id)?
            .column_mut(type_id)?;
        unsafe { column.get_mut::<T>(record.row) }
    }

    /// Check if entity has a specific component
    pub fn has_component<T: Component>(&self, entity: EntityHandle) -> bool {
        let Some(type_id) = self.registry.id_of::<T>() else {
            return false;
        };
        if let Some(record) = self.entity_index.get(&entity) {
            if let Some(archetype) = self.archetypes.get(&record.archetype_id) {
                return archetype.has_component_type(type_id);
            }
        }
        false
    }

    /// Add a component to an entity, migrating it to the neighbor
    /// archetype
    ///
    /// Returns false if the entity is dead, the type is unregistered, or
    /// the component is already present.
    pub fn add_component<T: Component>(&mut self, entity: EntityHandle, component: T) -> bool {
        self.add_component_inner(entity, component).is_some()
    }

    fn add_component_inner<T: Component>(
        &mut self,
        entity: EntityHandle,
        component: T,
    ) -> Option<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.add_component");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let type_id = self.registry.id_of::<T>()?;
        if !self.entities.is_alive(entity) {
            return None;
        }
        let record = self.entity_index.get(&entity).copied()?;
        let src_id = record.archetype_id;
        if self.archetypes.get(&src_id)?.has_component_type(type_id) {
            return None;
        }

        // All failure checks are done; from here the migration cannot
        // fail and the entity is never stranded between archetypes.
        let dest_id = self.add_target(src_id, type_id)?;

        let (mut staged, moved) = self.archetypes.get_mut(&src_id)?.extract_row(record.row);
        if let Some(moved) = moved {
            if let Some(rec) = self.entity_index.get_mut(&moved) {
                rec.row = record.row;
            }
        }
        staged.insert(RowPart::from_value(type_id, component));

        let row = self
            .archetypes
            .get_mut(&dest_id)
            .unwrap()
            .push_row(entity, staged);
        self.entity_index.insert(
            entity,
            EntityRecord {
                archetype_id: dest_id,
                row,
            },
        );
        Some(())
    }

    /// Remove a component from an entity, migrating it to the neighbor
    /// archetype
    ///
    /// Returns false if the entity is dead, the type is unregistered, or
    /// the component is absent.
    pub fn remove_component<T: Component>(&mut self, entity: EntityHandle) -> bool {
        self.remove_component_inner::<T>(entity).is_some()
    }

    fn remove_component_inner<T: Component>(&mut self, entity: EntityHandle) -> Option<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.remove_component");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let type_id = self.registry.id_of::<T>()?;
        if !self.entities.is_alive(entity) {
            return None;
        }
        let record = self.entity_index.get(&entity).copied()?;
        let src_id = record.archetype_id;
        if !self.archetypes.get(&src_id)?.has_component_type(type_id) {
            return None;
        }

        let dest_id = self.remove_target(src_id, type_id)?;

        let (mut staged, moved) = self.archetypes.get_mut(&src_id)?.extract_row(record.row);
        if let Some(moved) = moved {
            if let Some(rec) = self.entity_index.get_mut(&moved) {
                rec.row = record.row;
            }
        }
        // Dropping the taken part releases the removed component value.
        drop(staged.take(type_id));

        let row = self
            .archetypes
            .get_mut(&dest_id)
            .unwrap()
            .push_row(entity, staged);
        self.entity_index.insert(
            entity,
            EntityRecord {
                archetype_id: dest_id,
                row,
            },
        );
        Some(())
    }

    /// One-shot uncached query over every archetype whose signature is a
    /// superset of `required`
    pub fn query(&self, required: &[ComponentTypeId]) -> QueryIter<'_> {
        let mut req: ArchetypeSignature = SmallVec::from_slice(required);
        req.sort_unstable();
        req.dedup();
        let matches: Vec<ArchetypeId> = self
            .archetypes
            .values()
            .filter(|archetype| matches_signature(archetype.signature(), &req))
            .map(|archetype| archetype.id())
            .collect();
        QueryIter::new(self, matches)
    }

    /// Physical location of a live entity
    pub fn entity_record(&self, entity: EntityHandle) -> Option<EntityRecord> {
        self.entity_index.get(&entity).copied()
    }

    /// Archetype lookup by canonical id
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(&id)
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(&id)
    }

    /// Iterate all archetypes
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entity_index.len()
    }

    /// Drop all entities, archetypes, and directory entries
    ///
    /// Registered component types survive; outstanding handles become
    /// non-live; query caches see a topology change and refresh.
    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.entity_index.clear();
        self.entities.clear();
        self.topology_version = self.topology_version.wrapping_add(1);
    }

    // ---- internals -----------------------------------------------------

    /// Resolve a bundle's dense ids and target archetype
    fn resolve_bundle<B: Bundle>(
        &mut self,
    ) -> Result<(SmallVec<[ComponentTypeId; MAX_BUNDLE_COMPONENTS]>, ArchetypeId)> {
        let type_ids = B::type_ids();
        let names = B::type_names();

        let mut ids: SmallVec<[ComponentTypeId; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        for (&type_id, &name) in type_ids.iter().zip(names.iter()) {
            let id = self
                .registry
                .id_of_raw(type_id)
                .ok_or(EcsError::UnregisteredComponent(name))?;
            if ids.contains(&id) {
                return Err(EcsError::DuplicateComponent(name));
            }
            ids.push(id);
        }

        let mut signature = ids.clone();
        signature.sort_unstable();
        let archetype_id = self.get_or_create_archetype(signature);
        Ok((ids, archetype_id))
    }

    /// Destination archetype for adding `type_id`, via the edge cache
    fn add_target(&mut self, src_id: ArchetypeId, type_id: ComponentTypeId) -> Option<ArchetypeId> {
        let src = self.archetypes.get(&src_id)?;
        if let Some(target) = src.get_add_edge(type_id) {
            return Some(target);
        }
        let mut signature: ArchetypeSignature = SmallVec::from_slice(src.signature());
        match signature.binary_search(&type_id) {
            Ok(_) => return None,
            Err(pos) => signature.insert(pos, type_id),
        }
        let target = self.get_or_create_archetype(signature);
        if let Some(src) = self.archetypes.get_mut(&src_id) {
            src.set_add_edge(type_id, target);
        }
        if let Some(dest) = self.archetypes.get_mut(&target) {
            dest.set_remove_edge(type_id, src_id);
        }
        Some(target)
    }

    /// Destination archetype for removing `type_id`, via the edge cache
    fn remove_target(
        &mut self,
        src_id: ArchetypeId,
        type_id: ComponentTypeId,
    ) -> Option<ArchetypeId> {
        let src = self.archetypes.get(&src_id)?;
        if let Some(target) = src.get_remove_edge(type_id) {
            return Some(target);
        }
        let mut signature: ArchetypeSignature = SmallVec::from_slice(src.signature());
        match signature.binary_search(&type_id) {
            Ok(pos) => {
                signature.remove(pos);
            }
            Err(_) => return None,
        }
        let target = self.get_or_create_archetype(signature);
        if let Some(src) = self.archetypes.get_mut(&src_id) {
            src.set_remove_edge(type_id, target);
        }
        if let Some(dest) = self.archetypes.get_mut(&target) {
            dest.set_add_edge(type_id, src_id);
        }
        Some(target)
    }

    /// Get or create the archetype for a sorted signature
    fn get_or_create_archetype(&mut self, signature: ArchetypeSignature) -> ArchetypeId {
        let id = ArchetypeId::of(&signature);
        if let Some(existing) = self.archetypes.get(&id) {
            // Canonical hashing must be injective over realized signatures.
            debug_assert_eq!(existing.signature(), &signature[..], "archetype id collision");
            return id;
        }
        log::trace!(
            "creating archetype {:?} with {} component types",
            id,
            signature.len()
        );
        let archetype = Archetype::new(id, signature, &self.registry);
        self.archetypes.insert(id, archetype);
        self.topology_version = self.topology_version.wrapping_add(1);
        id
    }
}

/// Write a bundle into a freshly allocated row
fn write_bundle<B: Bundle>(
    archetype: &mut Archetype,
    row: usize,
    ids: &[ComponentTypeId],
    bundle: B,
) {
    let mut ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
    for &id in ids {
        let ptr = archetype
            .column(id)
            .and_then(|column| column.get_ptr(row))
            .unwrap();
        ptrs.push(ptr.as_ptr());
    }
    unsafe {
        bundle.write_components(&ptrs);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(dead_code)]
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    struct Tag;

    #[test]
    fn test_spawn_despawn() {
        let mut world = World::new();
        world.register_component::<Position>();

        let entity = world.spawn((Position { x: 1.0, y: 2.0 },)).unwrap();
        assert!(world.is_alive(entity));
        assert!(world.entity_record(entity).is_some());

        assert!(world.despawn(entity));
        assert!(!world.is_alive(entity));
        assert!(world.entity_record(entity).is_none());

        // Double despawn fails softly
        assert!(!world.despawn(entity));
    }

    #[test]
    fn test_spawn_unregistered_fails() {
        let mut world = World::new();
        let result = world.spawn((Position { x: 0.0, y: 0.0 },));
        assert!(matches!(result, Err(EcsError::UnregisteredComponent(_))));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_spawn_duplicate_component_fails() {
        let mut world = World::new();
        world.register_component::<Position>();
        let result = world.spawn((Position { x: 0.0, y: 0.0 }, Position { x: 1.0, y: 1.0 }));
        assert!(matches!(result, Err(EcsError::DuplicateComponent(_))));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_archetype_segregation() {
        let mut world = World::new();
        struct A;
        struct B;
        struct C;
        world.register_component::<A>();
        world.register_component::<B>();
        world.register_component::<C>();

        world.spawn((A, B)).unwrap();
        world.spawn((A, C)).unwrap();
        world.spawn((B, C)).unwrap();
        world.spawn((A, B, C)).unwrap();

        assert_eq!(world.archetype_count(), 4);
        assert_eq!(world.entity_count(), 4);
    }

    #[test]
    fn test_bundle_order_is_canonical() {
        let mut world = World::new();
        world.register_component::<Position>();
        world.register_component::<Velocity>();

        let a = world
            .spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.0 }))
            .unwrap();
        let b = world
            .spawn((Velocity { x: 2.0, y: 0.0 }, Position { x: 3.0, y: 0.0 }))
            .unwrap();

        let rec_a = world.entity_record(a).unwrap();
        let rec_b = world.entity_record(b).unwrap();
        assert_eq!(rec_a.archetype_id, rec_b.archetype_id);
        assert_eq!(world.get_component::<Velocity>(b).unwrap().x, 2.0);
        assert_eq!(world.get_component::<Position>(b).unwrap().x, 3.0);
    }

    #[test]
    fn test_empty_archetype_is_lazy() {
        let mut world = World::new();
        assert_eq!(world.archetype_count(), 0);
        let e = world.spawn_empty();
        assert_eq!(world.archetype_count(), 1);
        assert!(world.is_alive(e));
        assert_eq!(world.entity_record(e).unwrap().row, 0);
    }

    #[test]
    fn test_add_remove_component_migrates() {
        let mut world = World::new();
        world.register_component::<Position>();
        world.register_component::<Velocity>();

        let e = world.spawn((Position { x: 7.0, y: 0.0 },)).unwrap();
        let plain = world.entity_record(e).unwrap().archetype_id;

        assert!(world.add_component(e, Velocity { x: 9.0, y: 0.0 }));
        assert_eq!(world.get_component::<Position>(e).unwrap().x, 7.0);
        assert_eq!(world.get_component::<Velocity>(e).unwrap().x, 9.0);
        assert_ne!(world.entity_record(e).unwrap().archetype_id, plain);

        // Adding again fails: the component is present
        assert!(!world.add_component(e, Velocity { x: 1.0, y: 1.0 }));
        assert_eq!(world.get_component::<Velocity>(e).unwrap().x, 9.0);

        assert!(world.remove_component::<Velocity>(e));
        assert!(!world.has_component::<Velocity>(e));
        assert_eq!(world.get_component::<Position>(e).unwrap().x, 7.0);
        assert_eq!(world.entity_record(e).unwrap().archetype_id, plain);

        // Removing again fails: the component is gone
        assert!(!world.remove_component::<Velocity>(e));
    }

    #[test]
    fn test_migration_reuses_edges() {
        let mut world = World::new();
        world.register_component::<Position>();
        world.register_component::<Velocity>();

        let e1 = world.spawn((Position { x: 1.0, y: 0.0 },)).unwrap();
        let e2 = world.spawn((Position { x: 2.0, y: 0.0 },)).unwrap();
        let src_id = world.entity_record(e1).unwrap().archetype_id;
        let vel = world.component_id::<Velocity>().unwrap();

        world.add_component(e1, Velocity { x: 0.0, y: 0.0 });
        let dest_id = world.entity_record(e1).unwrap().archetype_id;
        assert_eq!(world.archetype(src_id).unwrap().get_add_edge(vel), Some(dest_id));
        assert_eq!(world.archetype(dest_id).unwrap().get_remove_edge(vel), Some(src_id));

        // Second migration takes the memoized edge
        let version = world.topology_version();
        world.add_component(e2, Velocity { x: 0.0, y: 0.0 });
        assert_eq!(world.topology_version(), version);
        assert_eq!(world.entity_record(e2).unwrap().archetype_id, dest_id);
    }

    #[test]
    fn test_spawn_batch_shares_archetype() {
        let mut world = World::new();
        world.register_component::<Position>();

        let spawned = world
            .spawn_batch((0..32).map(|i| {
                (Position {
                    x: i as f32,
                    y: 0.0,
                },)
            }))
            .unwrap();
        assert_eq!(spawned.len(), 32);
        assert_eq!(world.archetype_count(), 1);
        assert_eq!(world.get_component::<Position>(spawned[31]).unwrap().x, 31.0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut world = World::new();
        world.register_component::<Position>();
        let e = world.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();
        let version = world.topology_version();

        world.clear();
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.archetype_count(), 0);
        assert!(!world.is_alive(e));
        assert!(world.get_component::<Position>(e).is_none());
        assert_ne!(world.topology_version(), version);

        // Registered types survive a clear
        assert!(world.component_id::<Position>().is_some());
        world.spawn((Position { x: 1.0, y: 1.0 },)).unwrap();
    }

    #[test]
    fn test_zero_sized_components() {
        let mut world = World::new();
        world.register_component::<Tag>();
        world.register_component::<Position>();

        let e = world.spawn((Tag, Position { x: 4.0, y: 0.0 },)).unwrap();
        assert!(world.has_component::<Tag>(e));
        assert!(world.remove_component::<Tag>(e));
        assert!(!world.has_component::<Tag>(e));
        assert_eq!(world.get_component::<Position>(e).unwrap().x, 4.0);
    }
}
