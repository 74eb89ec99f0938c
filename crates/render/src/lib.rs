//! Camera math and the input-driven fly camera.
//!
//! A [`CameraController`] polls input once per frame and moves or turns its
//! [`Camera`]; consumers read the camera's matrices and upload them to a
//! shader program.
//!
//! # Invariants
//! - `view_projection == projection * view` after every camera mutation.
//! - Pitch stays within ±89°.
//! - Camera motion never touches GPU state.

mod camera;
mod controller;

pub use camera::{Camera, CameraConfig, PITCH_LIMIT_DEGREES, Projection, WORLD_UP};
pub use controller::{CameraController, ConfigError, ControllerConfig, KeyBindings};

pub fn crate_info() -> &'static str {
    "lumen-render v0.1.0"
}
