//! Window and input boundary.
//!
//! The windowing layer turns OS events into [`Event`]s and hands them to a
//! single registered callback through [`EventDispatcher`]. Frame logic does not
//! consume events directly: it polls an [`InputSource`] (usually an
//! [`InputState`] folded from those events) and reads time from a [`Clock`].
//!
//! # Invariants
//! - Exactly one event callback is registered at a time.
//! - Polled state reflects every event folded so far, nothing more.

pub mod clock;
pub mod event;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{Event, EventDispatcher};
pub use state::{InputSource, InputState};

pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

pub fn crate_info() -> &'static str {
    "lumen-input v0.1.0"
}
