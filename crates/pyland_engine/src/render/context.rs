//! Graphics context identity and teardown hooks

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a graphics context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

/// One native graphics context, as seen by the resources living in it.
///
/// Resources tied to the context (shader caches, for one) register a
/// releaser; all releasers run once, in registration order, when the context
/// is dropped.
pub struct GraphicsContext {
    id: ContextId,
    releasers: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl GraphicsContext {
    /// Create a context with a fresh id
    pub fn new() -> Self {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        log::debug!("Graphics context {} created", id.0);
        Self {
            id,
            releasers: RefCell::new(Vec::new()),
        }
    }

    /// Context id
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Run `releaser` when this context is torn down
    pub fn register_resource_releaser<F>(&self, releaser: F)
    where
        F: FnOnce() + 'static,
    {
        self.releasers.borrow_mut().push(Box::new(releaser));
    }
}

impl Default for GraphicsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        let releasers = std::mem::take(self.releasers.get_mut());
        log::debug!(
            "Graphics context {} torn down, running {} releasers",
            self.id.0,
            releasers.len()
        );
        for release in releasers {
            release();
        }
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("id", &self.id)
            .field("releasers", &self.releasers.borrow().len())
            .finish()
    }
}
