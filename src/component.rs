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

//! Component identity, the type registry, and spawn bundles
//!
//! Components are plain data attached to entities. The registry maps each
//! language-level type to a dense per-world id so archetype signatures stay
//! cheap to sort, hash, and compare.

use std::any::{type_name, TypeId};

use ahash::AHashMap;
use smallvec::{smallvec, SmallVec};

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Dense component type id, unique within one world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Index into registry-ordered tables
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Layout and drop metadata captured when a type is registered
pub struct ComponentInfo {
    name: &'static str,
    size: usize,
    align: usize,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

impl ComponentInfo {
    fn of<T: Component>() -> Self {
        Self {
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(|ptr| unsafe {
                    std::ptr::drop_in_place(ptr as *mut T);
                })
            } else {
                None
            },
        }
    }

    /// Display name of the registered type
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size of one component value in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment of the component type
    pub fn align(&self) -> usize {
        self.align
    }

    pub(crate) fn drop_fn(&self) -> Option<unsafe fn(*mut u8)> {
        self.drop_fn
    }
}

/// Maps language-level type identity to dense component ids
///
/// Ids are assigned sequentially on first registration and are never
/// removed. A component's size is fixed at registration.
pub struct TypeRegistry {
    ids: AHashMap<TypeId, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            ids: AHashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Register a component type, returning its dense id
    ///
    /// Idempotent: repeated calls for the same type return the same id.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.ids.get(&type_id) {
            return id;
        }
        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo::of::<T>());
        self.ids.insert(type_id, id);
        id
    }

    /// Dense id for a registered type
    pub fn id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    pub(crate) fn id_of_raw(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.ids.get(&type_id).copied()
    }

    /// Metadata for a registered id
    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Number of registered component types
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Bundle of components
///
/// Allows spawning entities with multiple components at once.
pub trait Bundle: 'static {
    /// Get type IDs of all components in bundle
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Display names parallel to `type_ids`, for error reporting
    fn type_names() -> SmallVec<[&'static str; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Write components to raw pointers, one per entry of `type_ids`
    ///
    /// # Safety
    /// Caller must ensure pointers are valid, properly aligned for each
    /// component type, and in `type_ids` order. Ownership of every value
    /// moves into the destination slots.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

// Implement only for tuples; a blanket impl for T: Component would
// conflict with the tuple implementations.
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn type_names() -> SmallVec<[&'static str; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(type_name::<$T>()),*]
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
                let _ = i; // Suppress unused warning
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
