//! Type-keyed singleton resources
//!
//! A process-scoped bag of singletons looked up by type, so shared state
//! (frame clock, score, a host-owned render context) does not have to be
//! threaded through every system signature.

use std::any::{Any, TypeId};
use std::ptr::NonNull;

use ahash::AHashMap;

enum ResourceSlot {
    /// Heap-owned value, dropped with the manager
    Owned(Box<dyn Any>),
    /// Non-owning pointer to a host-managed value
    Shared(NonNull<()>),
}

/// Type-keyed mapping of singletons with value or reference semantics
///
/// No `Send`/`Sync` bounds: the scheduler is single-threaded, and host
/// resources such as rendering contexts are typically neither.
pub struct ResourceManager {
    slots: AHashMap<TypeId, ResourceSlot>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self {
            slots: AHashMap::new(),
        }
    }

    /// Store an owned resource, replacing any prior value of this type
    pub fn insert<T: 'static>(&mut self, value: T) {
        self.slots
            .insert(TypeId::of::<T>(), ResourceSlot::Owned(Box::new(value)));
    }

    /// Store a non-owning pointer to a host-managed resource
    ///
    /// # Safety
    /// The caller must guarantee `value` outlives this manager (or is
    /// removed first) and is not mutated elsewhere while systems read it
    /// through [`get_ref`](Self::get_ref).
    pub unsafe fn insert_ref<T: 'static>(&mut self, value: &T) {
        self.slots.insert(
            TypeId::of::<T>(),
            ResourceSlot::Shared(NonNull::from(value).cast()),
        );
    }

    /// Look up an owned resource
    pub fn get<T: 'static>(&self) -> Option<&T> {
        match self.slots.get(&TypeId::of::<T>())? {
            ResourceSlot::Owned(value) => value.downcast_ref(),
            ResourceSlot::Shared(_) => None,
        }
    }

    /// Look up an owned resource mutably
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match self.slots.get_mut(&TypeId::of::<T>())? {
            ResourceSlot::Owned(value) => value.downcast_mut(),
            ResourceSlot::Shared(_) => None,
        }
    }

    /// Look up a host-managed resource stored via `insert_ref`
    ///
    /// Owned slots are served too, so callers need not care how the
    /// resource was published.
    pub fn get_ref<T: 'static>(&self) -> Option<&T> {
        match self.slots.get(&TypeId::of::<T>())? {
            ResourceSlot::Owned(value) => value.downcast_ref(),
            // Valid per the insert_ref contract: the host keeps the value
            // alive for the manager's whole lifetime.
            ResourceSlot::Shared(ptr) => Some(unsafe { ptr.cast::<T>().as_ref() }),
        }
    }

    /// Whether a resource of this type is present (owned or shared)
    pub fn has<T: 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    /// Drop the slot for this type; returns whether one existed
    pub fn remove<T: 'static>(&mut self) -> bool {
        self.slots.remove(&TypeId::of::<T>()).is_some()
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Score(u32);

    struct RenderContext {
        frame: u64,
    }

    #[test]
    fn test_insert_get_replace() {
        let mut resources = ResourceManager::new();
        resources.insert(Score(10));
        assert_eq!(resources.get::<Score>(), Some(&Score(10)));

        resources.insert(Score(20));
        assert_eq!(resources.get::<Score>(), Some(&Score(20)));
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn test_get_mut() {
        let mut resources = ResourceManager::new();
        resources.insert(Score(1));
        resources.get_mut::<Score>().unwrap().0 += 5;
        assert_eq!(resources.get::<Score>(), Some(&Score(6)));
    }

    #[test]
    fn test_missing_resource() {
        let resources = ResourceManager::new();
        assert!(resources.get::<Score>().is_none());
        assert!(!resources.has::<Score>());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut resources = ResourceManager::new();
        resources.insert(Score(3));
        assert!(resources.remove::<Score>());
        assert!(!resources.remove::<Score>());

        resources.insert(Score(4));
        resources.clear();
        assert!(resources.is_empty());
    }

    #[test]
    fn test_insert_ref_shares_host_value() {
        let context = RenderContext { frame: 42 };
        let mut resources = ResourceManager::new();
        unsafe { resources.insert_ref(&context) };

        assert!(resources.has::<RenderContext>());
        assert_eq!(resources.get_ref::<RenderContext>().unwrap().frame, 42);
        // A shared slot is not served as an owned value
        assert!(resources.get::<RenderContext>().is_none());
    }
}
