use std::collections::HashSet;

use glam::Vec2;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::event::Event;

/// Polling-style input queries used by per-frame controllers.
pub trait InputSource {
    /// Returns true while the key is held.
    fn is_key_down(&self, key: KeyCode) -> bool;
    /// Returns true while the mouse button is held.
    fn is_mouse_down(&self, button: MouseButton) -> bool;
    /// Current cursor position in window coordinates.
    fn cursor_position(&self) -> Vec2;
}

/// Held keys, held buttons and cursor position, folded from [`Event`]s.
#[derive(Debug, Clone)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    cursor_position: Vec2,
    scroll_delta: Vec2,
    focused: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            keys_down: HashSet::new(),
            mouse_buttons_down: HashSet::new(),
            cursor_position: Vec2::ZERO,
            scroll_delta: Vec2::ZERO,
            focused: true,
        }
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state.
    pub fn handle_event(&mut self, event: &Event) {
        match *event {
            Event::KeyPressed { key, .. } => self.set_key(key, true),
            Event::KeyReleased { key } => self.set_key(key, false),
            Event::MouseButtonPressed(button) => self.set_mouse_button(button, true),
            Event::MouseButtonReleased(button) => self.set_mouse_button(button, false),
            Event::CursorMoved(position) => self.cursor_position = position,
            Event::MouseScrolled(delta) => self.scroll_delta += delta,
            Event::WindowFocused(focused) => {
                self.focused = focused;
                // Releases are not delivered to unfocused windows.
                if !focused {
                    self.keys_down.clear();
                    self.mouse_buttons_down.clear();
                }
            }
            Event::WindowResized { .. } | Event::WindowClosed => {}
        }
    }

    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        if down {
            self.keys_down.insert(key);
        } else {
            self.keys_down.remove(&key);
        }
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.mouse_buttons_down.insert(button);
        } else {
            self.mouse_buttons_down.remove(&button);
        }
    }

    pub fn set_cursor_position(&mut self, position: Vec2) {
        self.cursor_position = position;
    }

    /// Scroll accumulated since the last call, in lines.
    pub fn take_scroll_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.scroll_delta)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

impl InputSource for InputState {
    fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    fn cursor_position(&self) -> Vec2 {
        self.cursor_position
    }
}
