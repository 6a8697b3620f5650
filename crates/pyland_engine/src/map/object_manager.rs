//! Registry of game object identities
//!
//! Ids are allocated under a mutex so scripted entities running on worker
//! threads can create objects safely. The object table is behind an
//! `RwLock`; lookups hand out `Arc`s so callers never hold the lock while
//! using an object.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Identity of a game object; `0` is never allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Anything the object manager can hold
pub trait GameObject: Any + Send + Sync {
    /// Allocated identity
    fn id(&self) -> ObjectId;

    /// Display name
    fn name(&self) -> &str;

    /// Upcast for typed lookups
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Thread-safe object registry
pub struct ObjectManager {
    next_id: Mutex<u32>,
    objects: RwLock<HashMap<ObjectId, Arc<dyn GameObject>>>,
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectManager {
    /// Empty registry; the first allocated id is 1
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Hand out a fresh id. The returned id is the one assigned; the
    /// counter moves past it.
    pub fn allocate_id(&self) -> ObjectId {
        let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ObjectId(*next);
        *next += 1;
        id
    }

    /// Whether `id` was ever allocated: `0 < id < next`
    pub fn is_valid_object_id(&self, id: ObjectId) -> bool {
        let next = *self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        0 < id.0 && id.0 < next
    }

    /// Register `object` under its id. Objects with an id that was never
    /// allocated are rejected.
    pub fn add_object(&self, object: Arc<dyn GameObject>) -> bool {
        let id = object.id();
        if !self.is_valid_object_id(id) {
            log::error!("ObjectManager::add_object: Object id is invalid; id: {}", id.0);
            return false;
        }
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, object);
        true
    }

    /// Unregister an object, returning it
    pub fn remove_object(&self, id: ObjectId) -> Option<Arc<dyn GameObject>> {
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_none() {
            log::error!("Trying to remove {id}, which does not exist");
        }
        removed
    }

    /// Registered object `id`, if it is a `T`
    pub fn get_object<T: GameObject>(&self, id: ObjectId) -> Option<Arc<T>> {
        let object = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()?;
        object.as_any_arc().downcast::<T>().ok()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
