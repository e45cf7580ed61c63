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

//! Archetype storage: Structure-of-Arrays columns keyed by a sorted
//! component signature, with row allocation, swap-removal, and memoized
//! neighbor edges for single-component transitions.

use std::alloc::{self, Layout};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ptr::{self, NonNull};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::{ComponentInfo, ComponentTypeId, TypeRegistry, MAX_BUNDLE_COMPONENTS};
use crate::entity::EntityHandle;

/// Sorted, duplicate-free component signature
pub type ArchetypeSignature = SmallVec<[ComponentTypeId; MAX_BUNDLE_COMPONENTS]>;

/// Canonical archetype identifier
///
/// A deterministic hash of the sorted signature, so any permutation of the
/// same component set resolves to the same archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// Canonical id for a sorted signature
    pub fn of(signature: &[ComponentTypeId]) -> Self {
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));
        let mut hasher = DefaultHasher::new();
        for id in signature {
            id.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// Type-erased component column
///
/// A manually managed allocation whose layout matches the stored component
/// type, so typed references handed out by the world are always properly
/// aligned. The element count is driven by the archetype's row bookkeeping.
pub struct ComponentColumn {
    data: *mut u8,
    len: usize,
    capacity: usize,
    item_size: usize,
    item_align: usize,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

// Columns only ever hold component values, which are Send + Sync by the
// Component trait bound.
unsafe impl Send for ComponentColumn {}
unsafe impl Sync for ComponentColumn {}

impl ComponentColumn {
    /// Create new, empty column for the type described by `info`
    pub fn new(info: &ComponentInfo) -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
            item_size: info.size(),
            item_align: info.align(),
            drop_fn: info.drop_fn(),
        }
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn item_size(&self) -> usize {
        self.item_size
    }

    fn layout_for(&self, capacity: usize) -> Option<Layout> {
        if self.item_size == 0 || capacity == 0 {
            return None;
        }
        Layout::from_size_align(self.item_size * capacity, self.item_align).ok()
    }

    fn grow_to(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity > self.capacity);
        if self.item_size == 0 {
            self.capacity = new_capacity;
            return;
        }
        let new_layout = self
            .layout_for(new_capacity)
            .expect("column layout overflow");
        unsafe {
            let new_data = if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                let old_layout = self
                    .layout_for(self.capacity)
                    .expect("live column has a valid layout");
                alloc::realloc(self.data, old_layout, new_layout.size())
            };
            if new_data.is_null() {
                alloc::handle_alloc_error(new_layout);
            }
            self.data = new_data;
        }
        self.capacity = new_capacity;
    }

    fn grow_if_needed(&mut self) {
        if self.len == self.capacity {
            let new_capacity = if self.capacity == 0 { 4 } else { self.capacity * 2 };
            self.grow_to(new_capacity);
        }
    }

    /// Make room for `additional` more elements
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed > self.capacity {
            let new_capacity = needed.max(self.capacity * 2);
            self.grow_to(new_capacity);
        }
    }

    /// Pointer to the element at `index`
    ///
    /// For zero-sized types this is a dangling but well-aligned pointer.
    fn ptr_at(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.len);
        if self.item_size == 0 {
            return self.item_align as *mut u8;
        }
        unsafe { self.data.add(index * self.item_size) }
    }

    /// Append an uninitialized slot and return its pointer
    ///
    /// The caller must fully initialize the slot before the column is read,
    /// dropped, or swap-removed at that index.
    pub(crate) fn push_uninit(&mut self) -> *mut u8 {
        self.grow_if_needed();
        self.len += 1;
        self.ptr_at(self.len - 1)
    }

    /// Raw pointer to the element at `index`, bounds-checked
    pub(crate) fn get_ptr(&self, index: usize) -> Option<NonNull<u8>> {
        if index >= self.len {
            return None;
        }
        NonNull::new(self.ptr_at(index))
    }

    /// Typed reference to the element at `index`
    ///
    /// # Safety
    /// `T` must be the concrete type this column was created for.
    pub(crate) unsafe fn get<T>(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        Some(&*(self.ptr_at(index) as *const T))
    }

    /// Typed mutable reference to the element at `index`
    ///
    /// # Safety
    /// `T` must be the concrete type this column was created for.
    pub(crate) unsafe fn get_mut<T>(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        Some(&mut *(self.ptr_at(index) as *mut T))
    }

    /// Swap-remove the element at `index`, dropping it in place
    pub(crate) fn swap_remove(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let last = self.len - 1;
        if let Some(drop_fn) = self.drop_fn {
            unsafe { drop_fn(self.ptr_at(index)) };
        }
        if self.item_size > 0 && index != last {
            unsafe {
                ptr::copy_nonoverlapping(self.ptr_at(last), self.ptr_at(index), self.item_size);
            }
        }
        self.len -= 1;
    }

    /// Swap-remove the element at `index`, moving its bytes to `out`
    /// instead of dropping
    ///
    /// # Safety
    /// `out` must have room for `item_size` bytes and be properly aligned
    /// for the component type. The caller takes ownership of the value.
    pub(crate) unsafe fn swap_remove_into(&mut self, index: usize, out: *mut u8) {
        debug_assert!(index < self.len);
        let last = self.len - 1;
        if self.item_size > 0 {
            ptr::copy_nonoverlapping(self.ptr_at(index), out, self.item_size);
            if index != last {
                ptr::copy_nonoverlapping(self.ptr_at(last), self.ptr_at(index), self.item_size);
            }
        }
        self.len -= 1;
    }
}

impl Drop for ComponentColumn {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            for i in 0..self.len {
                unsafe { drop_fn(self.ptr_at(i)) };
            }
        }
        if let Some(layout) = self.layout_for(self.capacity) {
            unsafe { alloc::dealloc(self.data, layout) };
        }
    }
}

/// One extracted component value in an aligned owned buffer
pub(crate) struct RowPart {
    type_id: ComponentTypeId,
    data: *mut u8,
    size: usize,
    align: usize,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

impl RowPart {
    fn alloc(size: usize, align: usize) -> *mut u8 {
        if size == 0 {
            return align as *mut u8;
        }
        let layout = Layout::from_size_align(size, align).expect("valid component layout");
        let data = unsafe { alloc::alloc(layout) };
        if data.is_null() {
            alloc::handle_alloc_error(layout);
        }
        data
    }

    /// Stage a freshly supplied component value
    pub(crate) fn from_value<T: crate::component::Component>(
        type_id: ComponentTypeId,
        value: T,
    ) -> Self {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        let data = Self::alloc(size, align);
        unsafe { ptr::write(data as *mut T, value) };
        Self {
            type_id,
            data,
            size,
            align,
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(|ptr| unsafe { ptr::drop_in_place(ptr as *mut T) })
            } else {
                None
            },
        }
    }

    pub(crate) fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Mark the value as moved out; dropping the part then only frees the
    /// buffer.
    fn disarm(&mut self) {
        self.drop_fn = None;
    }
}

impl Drop for RowPart {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            unsafe { drop_fn(self.data) };
        }
        if self.size > 0 {
            let layout =
                Layout::from_size_align(self.size, self.align).expect("valid component layout");
            unsafe { alloc::dealloc(self.data, layout) };
        }
    }
}

/// A full row extracted from an archetype, owned component-by-component
///
/// Used to carry an entity's components between archetypes during
/// migration. Any part still present when the row is dropped is released
/// properly, so no path leaks component values.
pub(crate) struct StagedRow {
    // Kept sorted by type id, matching signature order.
    parts: SmallVec<[RowPart; MAX_BUNDLE_COMPONENTS]>,
}

impl StagedRow {
    pub(crate) fn new() -> Self {
        Self {
            parts: SmallVec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }

    /// Stage one more component; the type must not already be present
    pub(crate) fn insert(&mut self, part: RowPart) {
        match self.parts.binary_search_by_key(&part.type_id(), |p| p.type_id()) {
            Ok(_) => debug_assert!(false, "component staged twice"),
            Err(pos) => self.parts.insert(pos, part),
        }
    }

    /// Remove and return the part for `type_id`, if staged
    pub(crate) fn take(&mut self, type_id: ComponentTypeId) -> Option<RowPart> {
        match self.parts.binary_search_by_key(&type_id, |p| p.type_id()) {
            Ok(pos) => Some(self.parts.remove(pos)),
            Err(_) => None,
        }
    }

    pub(crate) fn types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.parts.iter().map(|p| p.type_id())
    }
}

/// Column store for all entities sharing one exact component set
///
/// The `i`-th element of each column belongs to the entity at row `i`.
/// Neighbor archetypes reached by adding or removing exactly one component
/// are memoized in the edge caches; the caches are never authoritative.
pub struct Archetype {
    id: ArchetypeId,
    signature: ArchetypeSignature,
    columns: Vec<ComponentColumn>,
    column_of: FxHashMap<ComponentTypeId, usize>,
    entities: Vec<EntityHandle>,
    row_of: FxHashMap<EntityHandle, usize>,
    add_edges: FxHashMap<ComponentTypeId, ArchetypeId>,
    remove_edges: FxHashMap<ComponentTypeId, ArchetypeId>,
}

impl Archetype {
    /// Build the archetype and one column per signature entry
    ///
    /// Every id in `signature` must have been minted by `registry`.
    pub(crate) fn new(
        id: ArchetypeId,
        signature: ArchetypeSignature,
        registry: &TypeRegistry,
    ) -> Self {
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));
        let mut columns = Vec::with_capacity(signature.len());
        let mut column_of = FxHashMap::default();
        for (index, &type_id) in signature.iter().enumerate() {
            let info = registry
                .info(type_id)
                .expect("signature ids are minted by this registry");
            columns.push(ComponentColumn::new(info));
            column_of.insert(type_id, index);
        }
        Self {
            id,
            signature,
            columns,
            column_of,
            entities: Vec::new(),
            row_of: FxHashMap::default(),
            add_edges: FxHashMap::default(),
            remove_edges: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Sorted component signature
    pub fn signature(&self) -> &[ComponentTypeId] {
        &self.signature
    }

    /// All entities, indexed by row
    pub fn entities(&self) -> &[EntityHandle] {
        &self.entities
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Membership test on the signature
    pub fn has_component_type(&self, type_id: ComponentTypeId) -> bool {
        self.signature.binary_search(&type_id).is_ok()
    }

    /// Row currently occupied by `entity`
    pub fn row_of(&self, entity: EntityHandle) -> Option<usize> {
        self.row_of.get(&entity).copied()
    }

    pub(crate) fn column(&self, type_id: ComponentTypeId) -> Option<&ComponentColumn> {
        let index = *self.column_of.get(&type_id)?;
        self.columns.get(index)
    }

    pub(crate) fn column_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut ComponentColumn> {
        let index = *self.column_of.get(&type_id)?;
        self.columns.get_mut(index)
    }

    /// Raw pointer to one component of `entity`
    ///
    /// Stable only until the next structural change touching this
    /// archetype: row growth may reallocate the column.
    pub fn component_ptr(
        &self,
        entity: EntityHandle,
        type_id: ComponentTypeId,
    ) -> Option<NonNull<u8>> {
        let row = self.row_of(entity)?;
        self.column(type_id)?.get_ptr(row)
    }

    /// Reserve space for additional rows in every column
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Append an uninitialized row for `entity` and return its index
    ///
    /// Every column slot must be written before the row is read or
    /// removed.
    pub(crate) fn allocate_row(&mut self, entity: EntityHandle) -> usize {
        let row = self.entities.len();
        for column in &mut self.columns {
            column.push_uninit();
        }
        self.entities.push(entity);
        self.row_of.insert(entity, row);
        row
    }

    /// Append one row from a staged migration payload
    ///
    /// The staged type set must equal this archetype's signature; the
    /// caller (the world's migration path) establishes that before
    /// extraction.
    pub(crate) fn push_row(&mut self, entity: EntityHandle, mut staged: StagedRow) -> usize {
        debug_assert_eq!(staged.len(), self.signature.len());
        debug_assert!(staged.types().zip(self.signature.iter()).all(|(a, &b)| a == b));

        let row = self.allocate_row(entity);
        for (column, part) in self.columns.iter_mut().zip(staged.parts.iter_mut()) {
            if column.item_size() > 0 {
                unsafe {
                    // Freshly allocated slot; ownership of the bytes moves
                    // into the column.
                    ptr::copy_nonoverlapping(part.data, column.ptr_at(row), column.item_size());
                }
            }
            part.disarm();
        }
        row
    }

    /// Swap-remove the row, dropping its components
    ///
    /// Returns the entity that was relocated into `row`, if any; the
    /// caller must update that entity's directory entry.
    pub(crate) fn swap_remove_row(&mut self, row: usize) -> Option<EntityHandle> {
        debug_assert!(row < self.entities.len());
        let entity = self.entities[row];
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.row_of.remove(&entity);
        if row < self.entities.len() {
            let moved = self.entities[row];
            self.row_of.insert(moved, row);
            Some(moved)
        } else {
            None
        }
    }

    /// Swap-remove the row, transferring ownership of every component to
    /// the returned staged payload
    ///
    /// Also returns the entity relocated into `row`, if any.
    pub(crate) fn extract_row(&mut self, row: usize) -> (StagedRow, Option<EntityHandle>) {
        debug_assert!(row < self.entities.len());
        let entity = self.entities[row];
        let mut staged = StagedRow::new();
        for (&type_id, column) in self.signature.iter().zip(self.columns.iter_mut()) {
            let part = RowPart {
                type_id,
                data: RowPart::alloc(column.item_size, column.item_align),
                size: column.item_size,
                align: column.item_align,
                drop_fn: column.drop_fn,
            };
            unsafe { column.swap_remove_into(row, part.data) };
            // Signature order keeps the staged parts sorted.
            staged.parts.push(part);
        }
        self.entities.swap_remove(row);
        self.row_of.remove(&entity);
        let moved = if row < self.entities.len() {
            let moved = self.entities[row];
            self.row_of.insert(moved, row);
            Some(moved)
        } else {
            None
        };
        (staged, moved)
    }

    /// Memoized neighbor reached by adding `type_id`
    pub fn get_add_edge(&self, type_id: ComponentTypeId) -> Option<ArchetypeId> {
        self.add_edges.get(&type_id).copied()
    }

    pub fn set_add_edge(&mut self, type_id: ComponentTypeId, target: ArchetypeId) {
        self.add_edges.insert(type_id, target);
    }

    /// Memoized neighbor reached by removing `type_id`
    pub fn get_remove_edge(&self, type_id: ComponentTypeId) -> Option<ArchetypeId> {
        self.remove_edges.get(&type_id).copied()
    }

    pub fn set_remove_edge(&mut self, type_id: ComponentTypeId, target: ArchetypeId) {
        self.remove_edges.insert(type_id, target);
    }
}
