//! Input management system
//!
//! Every window owns one [`InputManager`]. The window registry cleans it at
//! the start of a pump cycle, feeds it the key events routed to that window,
//! and runs its keyboard callbacks once the batch has been drained.

use std::collections::HashSet;

use crate::foundation::callbacks::{CallbackRegistry, Lifeline};

/// One key transition delivered to keyboard callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardInputEvent {
    /// Key that changed
    pub key: KeyCode,
    /// `true` on press, `false` on release
    pub pressed: bool,
}

/// Per-window keyboard state
pub struct InputManager {
    keys_down: HashSet<KeyCode>,
    pressed_this_frame: HashSet<KeyCode>,
    released_this_frame: HashSet<KeyCode>,
    pending: Vec<KeyboardInputEvent>,
    keyboard_callbacks: CallbackRegistry<KeyboardInputEvent>,
}

impl InputManager {
    /// Create a new input manager
    pub fn new() -> Self {
        Self {
            keys_down: HashSet::new(),
            pressed_this_frame: HashSet::new(),
            released_this_frame: HashSet::new(),
            pending: Vec::new(),
            keyboard_callbacks: CallbackRegistry::new(),
        }
    }

    /// Forget the previous frame's transitions; held keys stay held
    pub fn clean(&mut self) {
        self.pressed_this_frame.clear();
        self.released_this_frame.clear();
        self.pending.clear();
    }

    /// Record a key transition
    pub fn handle_event(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.keys_down.insert(key) {
                self.pressed_this_frame.insert(key);
            }
        } else if self.keys_down.remove(&key) {
            self.released_this_frame.insert(key);
        }
        self.pending.push(KeyboardInputEvent { key, pressed });
    }

    /// Broadcast this frame's transitions, in arrival order
    pub fn run_callbacks(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            self.keyboard_callbacks.broadcast(&event);
        }
    }

    /// Whether `key` is currently held
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether `key` went down during the current frame
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_this_frame.contains(&key)
    }

    /// Whether `key` went up during the current frame
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.released_this_frame.contains(&key)
    }

    /// Register a callback receiving every key transition
    #[must_use = "dropping the lifeline immediately unregisters the callback"]
    pub fn register_keyboard_handler<F>(&self, callback: F) -> Lifeline
    where
        F: FnMut(&KeyboardInputEvent) + 'static,
    {
        self.keyboard_callbacks.register(callback)
    }

    /// Drop all callbacks; used when the owning window goes away
    pub fn disable_callbacks(&mut self) {
        self.keyboard_callbacks.clear();
        self.pending.clear();
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Left shift
    LeftShift,
    /// Right shift
    RightShift,
    /// Anything without a dedicated code
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_key_state_tracking() {
        let mut input = InputManager::new();
        input.handle_event(KeyCode::W, true);

        assert!(input.is_key_down(KeyCode::W));
        assert!(input.is_key_pressed(KeyCode::W));

        input.clean();
        assert!(input.is_key_down(KeyCode::W));
        assert!(!input.is_key_pressed(KeyCode::W));

        input.handle_event(KeyCode::W, false);
        assert!(!input.is_key_down(KeyCode::W));
        assert!(input.is_key_released(KeyCode::W));
    }

    #[test]
    fn test_callbacks_run_once_per_frame_in_order() {
        let mut input = InputManager::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _lifeline = input.register_keyboard_handler(move |event| sink.borrow_mut().push(*event));

        input.handle_event(KeyCode::Left, true);
        input.handle_event(KeyCode::Left, false);
        input.run_callbacks();
        input.run_callbacks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].pressed);
        assert!(!seen[1].pressed);
    }

    #[test]
    fn test_disabled_callbacks_stay_silent() {
        let mut input = InputManager::new();
        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        let _lifeline = input.register_keyboard_handler(move |_| *sink.borrow_mut() += 1);

        input.disable_callbacks();
        input.handle_event(KeyCode::Space, true);
        input.run_callbacks();

        assert_eq!(*calls.borrow(), 0);
    }
}
