//! Sprites and map objects
//!
//! Both are game objects with a tile position and a renderable component.
//! Position and renderable sit behind mutexes so scripts on other threads
//! can move entities while the render thread reads them.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::math::Vec2;
use crate::map::object_manager::{GameObject, ObjectId, ObjectManager};
use crate::render::renderable::RenderableComponent;

/// State shared by every map entity
#[derive(Debug)]
pub struct EntityState {
    id: ObjectId,
    name: String,
    position: Mutex<Vec2>,
    renderable: Mutex<RenderableComponent>,
}

impl EntityState {
    /// State at `position` with an empty renderable
    pub fn new(id: ObjectId, name: impl Into<String>, position: Vec2) -> Self {
        Self {
            id,
            name: name.into(),
            position: Mutex::new(position),
            renderable: Mutex::new(RenderableComponent::new()),
        }
    }
}

/// An object placed on a map
pub trait MapEntity: GameObject {
    /// Shared entity state
    fn state(&self) -> &EntityState;

    /// Position in tiles
    fn position(&self) -> Vec2 {
        *self
            .state()
            .position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `position` (tiles)
    fn set_position(&self, position: Vec2) {
        *self
            .state()
            .position
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = position;
    }

    /// Locked renderable component
    fn renderable(&self) -> MutexGuard<'_, RenderableComponent> {
        self.state()
            .renderable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

macro_rules! map_entity {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            state: EntityState,
        }

        impl $name {
            /// Entity with an already allocated id
            pub fn new(id: ObjectId, name: impl Into<String>, position: Vec2) -> Self {
                Self {
                    state: EntityState::new(id, name, position),
                }
            }

            /// Allocate an id, create the entity and register it
            pub fn spawn(manager: &ObjectManager, name: impl Into<String>, position: Vec2) -> Arc<Self> {
                let entity = Arc::new(Self::new(manager.allocate_id(), name, position));
                manager.add_object(entity.clone());
                entity
            }
        }

        impl GameObject for $name {
            fn id(&self) -> ObjectId {
                self.state.id
            }

            fn name(&self) -> &str {
                &self.state.name
            }

            fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }

        impl MapEntity for $name {
            fn state(&self) -> &EntityState {
                &self.state
            }
        }
    };
}

map_entity!(
    /// A moving character, candidate camera focus
    Sprite
);

map_entity!(
    /// A static object placed on the map
    MapObject
);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_spawn_registers_entity() {
        let manager = ObjectManager::new();
        let sprite = Sprite::spawn(&manager, "player", Vec2::new(2.0, 3.0));

        let found = manager.get_object::<Sprite>(sprite.id()).unwrap();
        assert_eq!(found.name(), "player");
        assert!(manager.get_object::<MapObject>(sprite.id()).is_none());
    }

    #[test]
    fn test_position_updates_across_threads() {
        let manager = ObjectManager::new();
        let sprite = Sprite::spawn(&manager, "walker", Vec2::zeros());

        let mover = Arc::clone(&sprite);
        thread::spawn(move || mover.set_position(Vec2::new(4.5, 1.0)))
            .join()
            .unwrap();

        let position = sprite.position();
        assert_relative_eq!(position.x, 4.5);
        assert_relative_eq!(position.y, 1.0);
    }

    #[test]
    fn test_renderable_is_mutable_through_lock() {
        let object = MapObject::new(ObjectId(1), "chest", Vec2::new(1.0, 1.0));
        object.renderable().set_num_vertices_render(6);
        assert_eq!(object.renderable().num_vertices_render(), 6);
    }
}
