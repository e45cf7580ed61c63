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

//! Entity identifiers, location metadata, and the handle allocator

use std::fmt;

use crate::archetype::ArchetypeId;

/// Opaque 64-bit entity handle carrying a slot index and a generation
///
/// Two handles compare equal only if both fields match. A handle is live
/// iff the manager's generation for its index still equals the handle's
/// generation and the slot is allocated.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the entity manager
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single u64 (generation in the high bits)
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Reconstruct a handle previously packed with [`to_bits`](Self::to_bits)
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Entity location: (archetype, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    pub archetype_id: ArchetypeId,
    pub row: usize,
}

/// Issues and recycles entity handles
///
/// A freelist of released indices plus a per-slot generation counter.
/// Generations guarantee that a recycled index never aliases a stale
/// handle.
pub struct EntityManager {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    live: usize,
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Mint a fresh live handle, reusing a released slot when possible
    pub fn create(&mut self) -> EntityHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.alive[index as usize] = true;
            return EntityHandle::new(index, self.generations[index as usize]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        EntityHandle::new(index, 0)
    }

    /// Release a handle's slot; stale and dead handles are ignored
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        let index = handle.index() as usize;
        self.alive[index] = false;
        self.live -= 1;
        // A saturated generation retires the slot instead of wrapping, so
        // outstanding handles for it can never come back to life.
        if self.generations[index] == u32::MAX {
            return true;
        }
        self.generations[index] += 1;
        self.free.push(handle.index());
        true
    }

    /// True iff the slot is allocated and the generations match
    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        let index = handle.index() as usize;
        index < self.generations.len()
            && self.alive[index]
            && self.generations[index] == handle.generation()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Drop all slots; every outstanding handle becomes non-live
    pub fn clear(&mut self) {
        self.generations.clear();
        self.alive.clear();
        self.free.clear();
        self.live = 0;
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
