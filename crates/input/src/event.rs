use glam::Vec2;
use lumen_common::log::CORE;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Window lifecycle and input events delivered to the application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Framebuffer resized to the given size in physical pixels.
    WindowResized { width: u32, height: u32 },
    /// User asked to close the window.
    WindowClosed,
    /// Window gained (`true`) or lost (`false`) focus.
    WindowFocused(bool),
    KeyPressed { key: KeyCode, repeat: bool },
    KeyReleased { key: KeyCode },
    MouseButtonPressed(MouseButton),
    MouseButtonReleased(MouseButton),
    /// Cursor position in window coordinates.
    CursorMoved(Vec2),
    /// Scroll amount in lines.
    MouseScrolled(Vec2),
}

/// Pixel deltas are converted to lines at this rate.
const PIXELS_PER_LINE: f32 = 120.0;

impl Event {
    /// Translate a winit window event. Events with no counterpart yield `None`.
    pub fn from_window_event(event: &WindowEvent) -> Option<Self> {
        match event {
            WindowEvent::Resized(size) => Some(Self::WindowResized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::CloseRequested => Some(Self::WindowClosed),
            WindowEvent::Focused(focused) => Some(Self::WindowFocused(*focused)),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return None;
                };
                Some(match event.state {
                    ElementState::Pressed => Self::KeyPressed {
                        key,
                        repeat: event.repeat,
                    },
                    ElementState::Released => Self::KeyReleased { key },
                })
            }
            WindowEvent::MouseInput { state, button, .. } => Some(match state {
                ElementState::Pressed => Self::MouseButtonPressed(*button),
                ElementState::Released => Self::MouseButtonReleased(*button),
            }),
            WindowEvent::CursorMoved { position, .. } => Some(Self::CursorMoved(Vec2::new(
                position.x as f32,
                position.y as f32,
            ))),
            WindowEvent::MouseWheel { delta, .. } => Some(Self::MouseScrolled(match delta {
                MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                MouseScrollDelta::PixelDelta(pos) => {
                    Vec2::new(pos.x as f32, pos.y as f32) / PIXELS_PER_LINE
                }
            })),
            _ => None,
        }
    }
}

/// Callback invoked for every dispatched event.
pub type EventCallback = Box<dyn FnMut(&Event)>;

/// Routes events to the single registered callback.
///
/// Registering a new callback replaces the previous one.
#[derive(Default)]
pub struct EventDispatcher {
    callback: Option<EventCallback>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&mut self, callback: impl FnMut(&Event) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Deliver an event. Returns `false` when no callback is registered.
    pub fn dispatch(&mut self, event: &Event) -> bool {
        match self.callback.as_mut() {
            Some(callback) => {
                callback(event);
                true
            }
            None => {
                tracing::trace!(target: CORE, "dropped {event:?}: no callback registered");
                false
            }
        }
    }

    /// Translate and deliver a winit event. Returns `true` if it was delivered.
    pub fn dispatch_window_event(&mut self, event: &WindowEvent) -> bool {
        Event::from_window_event(event).is_some_and(|e| self.dispatch(&e))
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use winit::dpi::PhysicalSize;

    #[test]
    fn translate_resize_and_close() {
        let resized = WindowEvent::Resized(PhysicalSize::new(1280, 720));
        assert_eq!(
            Event::from_window_event(&resized),
            Some(Event::WindowResized {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(
            Event::from_window_event(&WindowEvent::CloseRequested),
            Some(Event::WindowClosed)
        );
        assert_eq!(
            Event::from_window_event(&WindowEvent::Focused(false)),
            Some(Event::WindowFocused(false))
        );
    }

    #[test]
    fn untranslated_events_are_ignored() {
        assert_eq!(Event::from_window_event(&WindowEvent::RedrawRequested), None);
    }

    #[test]
    fn dispatch_without_callback() {
        let mut dispatcher = EventDispatcher::new();
        assert!(!dispatcher.has_callback());
        assert!(!dispatcher.dispatch(&Event::WindowClosed));
    }

    #[test]
    fn dispatch_reaches_latest_callback() {
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));

        let mut dispatcher = EventDispatcher::new();
        let sink = first.clone();
        dispatcher.set_callback(move |e| sink.borrow_mut().push(*e));
        assert!(dispatcher.dispatch(&Event::WindowFocused(true)));

        let sink = second.clone();
        dispatcher.set_callback(move |e| sink.borrow_mut().push(*e));
        assert!(dispatcher.dispatch(&Event::WindowClosed));

        assert_eq!(*first.borrow(), vec![Event::WindowFocused(true)]);
        assert_eq!(*second.borrow(), vec![Event::WindowClosed]);
    }

    #[test]
    fn dispatch_translated_window_event() {
        let count = Rc::new(RefCell::new(0));
        let mut dispatcher = EventDispatcher::new();
        let sink = count.clone();
        dispatcher.set_callback(move |_| *sink.borrow_mut() += 1);

        assert!(dispatcher.dispatch_window_event(&WindowEvent::CloseRequested));
        assert!(!dispatcher.dispatch_window_event(&WindowEvent::RedrawRequested));
        assert_eq!(*count.borrow(), 1);
    }
}
