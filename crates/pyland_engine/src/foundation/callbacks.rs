//! Broadcast callback registries with scoped registration handles
//!
//! A [`CallbackRegistry`] holds any number of callbacks taking `&T`. Each
//! registration hands back a [`Lifeline`]; dropping the lifeline unregisters
//! the callback. Lifelines only hold a weak link to the registry, so they are
//! safe to keep around after the registry (and the window owning it) is gone.

use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

new_key_type! {
    /// Key identifying one registered callback
    pub struct CallbackKey;
}

type SharedCallback<T> = Rc<RefCell<dyn FnMut(&T)>>;
type CallbackTable<T> = RefCell<SlotMap<CallbackKey, SharedCallback<T>>>;

/// Registry of callbacks that all receive the same broadcast value
pub struct CallbackRegistry<T: 'static> {
    callbacks: Rc<CallbackTable<T>>,
}

impl<T: 'static> CallbackRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            callbacks: Rc::new(RefCell::new(SlotMap::with_key())),
        }
    }

    /// Register a callback; it stays registered while the returned lifeline lives
    #[must_use = "dropping the lifeline immediately unregisters the callback"]
    pub fn register<F>(&self, callback: F) -> Lifeline
    where
        F: FnMut(&T) + 'static,
    {
        let shared: SharedCallback<T> = Rc::new(RefCell::new(callback));
        let key = self.callbacks.borrow_mut().insert(shared);
        let table: Weak<CallbackTable<T>> = Rc::downgrade(&self.callbacks);

        Lifeline::new(move || {
            if let Some(table) = table.upgrade() {
                table.borrow_mut().remove(key);
            }
        })
    }

    /// Call every registered callback with `value`
    ///
    /// Callbacks may register or unregister callbacks (including themselves)
    /// while the broadcast runs. Callbacks unregistered mid-broadcast are not
    /// called; callbacks registered mid-broadcast wait for the next one.
    pub fn broadcast(&self, value: &T) {
        let snapshot: Vec<(CallbackKey, SharedCallback<T>)> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(key, callback)| (key, Rc::clone(callback)))
            .collect();

        for (key, callback) in snapshot {
            if !self.callbacks.borrow().contains_key(key) {
                continue;
            }
            // Re-entrant broadcast of the same callback is skipped.
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)(value);
            }
        }
    }

    /// Drop every registered callback; outstanding lifelines become inert
    pub fn clear(&self) {
        self.callbacks.borrow_mut().clear();
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Whether no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.borrow().is_empty()
    }
}

impl<T: 'static> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped registration handle
///
/// Runs its release action exactly once, when dropped.
pub struct Lifeline {
    release: Option<Box<dyn FnOnce()>>,
}

impl Lifeline {
    /// Create a lifeline running `release` when dropped
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Keep the registration alive for the lifetime of its registry
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Lifeline {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Lifeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifeline")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_broadcast_reaches_registered_callbacks() {
        let registry = CallbackRegistry::<u32>::new();
        let total = Rc::new(Cell::new(0));

        let sink = Rc::clone(&total);
        let _a = registry.register(move |value| sink.set(sink.get() + value));
        let sink = Rc::clone(&total);
        let _b = registry.register(move |value| sink.set(sink.get() + value * 10));

        registry.broadcast(&2);
        assert_eq!(total.get(), 22);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dropping_lifeline_unregisters() {
        let registry = CallbackRegistry::<()>::new();
        let calls = Rc::new(Cell::new(0));

        let sink = Rc::clone(&calls);
        let lifeline = registry.register(move |_| sink.set(sink.get() + 1));
        registry.broadcast(&());
        drop(lifeline);
        registry.broadcast(&());

        assert_eq!(calls.get(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detached_lifeline_keeps_callback() {
        let registry = CallbackRegistry::<()>::new();
        let calls = Rc::new(Cell::new(0));

        let sink = Rc::clone(&calls);
        registry.register(move |_| sink.set(sink.get() + 1)).detach();
        registry.broadcast(&());
        registry.broadcast(&());

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_lifeline_outliving_registry_is_inert() {
        let registry = CallbackRegistry::<()>::new();
        let lifeline = registry.register(|_| {});
        drop(registry);
        drop(lifeline);
    }

    #[test]
    fn test_callback_can_unregister_sibling_mid_broadcast() {
        let registry = CallbackRegistry::<()>::new();
        let second_calls = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Option<Lifeline>>> = Rc::new(RefCell::new(None));

        let held_for_first = Rc::clone(&held);
        let _first = registry.register(move |_| {
            held_for_first.borrow_mut().take();
        });
        let sink = Rc::clone(&second_calls);
        *held.borrow_mut() = Some(registry.register(move |_| sink.set(sink.get() + 1)));

        registry.broadcast(&());
        assert_eq!(second_calls.get(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_disables_everything() {
        let registry = CallbackRegistry::<()>::new();
        let calls = Rc::new(Cell::new(0));
        let sink = Rc::clone(&calls);
        let _lifeline = registry.register(move |_| sink.set(sink.get() + 1));

        registry.clear();
        registry.broadcast(&());

        assert_eq!(calls.get(), 0);
        assert!(registry.is_empty());
    }
}
