use std::path::Path;

use glam::{Vec2, Vec3};
use lumen_common::log::CORE;
use lumen_input::{Clock, Event, InputSource, KeyCode, MouseButton, SystemClock};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Errors from loading controller configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys driving each movement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub backward: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub up: KeyCode,
    pub down: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            backward: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            up: KeyCode::Space,
            down: KeyCode::ShiftLeft,
        }
    }
}

/// Fly-camera tuning. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// World units per second, before the boost factor.
    pub movement_speed: f32,
    /// Degrees of rotation per pixel of cursor travel.
    pub mouse_sensitivity: f32,
    /// Multiplier applied on top of `movement_speed`.
    pub boost_factor: f32,
    /// Upper bound on a single frame's delta time, in seconds.
    pub max_frame_delta: f32,
    /// Mouse button that must be held to look around.
    pub look_button: MouseButton,
    pub bindings: KeyBindings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            movement_speed: 5.0,
            mouse_sensitivity: 0.1,
            boost_factor: 5.0,
            max_frame_delta: 0.25,
            look_button: MouseButton::Left,
            bindings: KeyBindings::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Turns per-frame input samples into camera motion.
///
/// Keyboard keys translate the camera; dragging with the look button held
/// rotates it. Call [`on_update`](Self::on_update) once per frame from the
/// render thread.
#[derive(Debug)]
pub struct CameraController<C = SystemClock> {
    camera: Camera,
    config: ControllerConfig,
    clock: C,
    last_frame_time: Option<f64>,
    last_mouse_position: Vec2,
    first_mouse_sample: bool,
}

impl CameraController<SystemClock> {
    /// Perspective fly camera with default tuning and the system clock.
    pub fn new(fov_y_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::with_clock(
            Camera::perspective(fov_y_degrees, aspect_ratio, near, far),
            ControllerConfig::default(),
            SystemClock::new(),
        )
    }
}

impl<C: Clock> CameraController<C> {
    pub fn with_clock(camera: Camera, config: ControllerConfig, clock: C) -> Self {
        Self {
            camera,
            config,
            clock,
            last_frame_time: None,
            last_mouse_position: Vec2::ZERO,
            first_mouse_sample: true,
        }
    }

    /// Advance one frame using the controller's clock. Returns the delta used.
    ///
    /// The first call uses a zero delta; later deltas are capped at
    /// `max_frame_delta` so a stall does not fling the camera.
    pub fn on_update(&mut self, input: &impl InputSource) -> f32 {
        let dt = self.frame_delta();
        self.update(dt, input);
        dt
    }

    /// Advance one frame with an explicit delta time in seconds.
    pub fn update(&mut self, dt: f32, input: &impl InputSource) {
        let _span = tracing::trace_span!(target: CORE, "camera_update", dt).entered();
        self.handle_keyboard(dt, input);
        self.handle_mouse(input);
    }

    /// React to window events the controller cares about (resizes).
    pub fn on_event(&mut self, event: &Event) {
        if let Event::WindowResized { width, height } = *event {
            self.on_resize(width, height);
        }
    }

    /// Match the projection to a new framebuffer size. Zero-height sizes
    /// (minimized windows) are ignored.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::trace!(target: CORE, "ignoring degenerate resize {width}x{height}");
            return;
        }
        self.camera.set_aspect_ratio(width as f32 / height as f32);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ControllerConfig) {
        self.config = config;
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn frame_delta(&mut self) -> f32 {
        let now = self.clock.now();
        match self.last_frame_time.replace(now) {
            Some(last) => ((now - last) as f32).min(self.config.max_frame_delta).max(0.0),
            None => 0.0,
        }
    }

    fn handle_keyboard(&mut self, dt: f32, input: &impl InputSource) {
        let keys = &self.config.bindings;
        let axis = |positive: KeyCode, negative: KeyCode| {
            let mut value = 0.0;
            if input.is_key_down(positive) {
                value += 1.0;
            }
            if input.is_key_down(negative) {
                value -= 1.0;
            }
            value
        };

        let direction = Vec3::new(
            axis(keys.right, keys.left),
            axis(keys.up, keys.down),
            axis(keys.forward, keys.backward),
        );

        if direction != Vec3::ZERO {
            let distance = self.config.movement_speed * dt * self.config.boost_factor;
            self.camera.move_along(distance, direction);
        }
    }

    fn handle_mouse(&mut self, input: &impl InputSource) {
        if !input.is_mouse_down(self.config.look_button) {
            self.first_mouse_sample = true;
            return;
        }

        let current = input.cursor_position();
        if self.first_mouse_sample {
            // Reference capture only; the cursor may have jumped while released.
            self.last_mouse_position = current;
            self.first_mouse_sample = false;
            return;
        }

        let offset = (current - self.last_mouse_position) * self.config.mouse_sensitivity;
        self.last_mouse_position = current;

        if offset != Vec2::ZERO {
            // Vertical cursor travel drives pitch, horizontal drives yaw.
            self.camera.rotate(offset.y, offset.x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_input::{InputState, ManualClock};
    use std::io::Write;

    const EPS: f32 = 1e-5;

    fn controller() -> CameraController<ManualClock> {
        CameraController::with_clock(
            Camera::perspective(45.0, 16.0 / 9.0, 0.1, 100.0),
            ControllerConfig::default(),
            ManualClock::new(),
        )
    }

    #[test]
    fn drag_rotates_after_reference_frame() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_mouse_button(MouseButton::Left, true);

        input.set_cursor_position(Vec2::new(0.0, 0.0));
        ctl.update(0.016, &input);
        assert_eq!(ctl.camera().yaw(), -90.0);
        assert_eq!(ctl.camera().pitch(), 0.0);

        input.set_cursor_position(Vec2::new(10.0, 5.0));
        ctl.update(0.016, &input);
        let sensitivity = ctl.config().mouse_sensitivity;
        assert!((ctl.camera().yaw() - (-90.0 + 10.0 * sensitivity)).abs() < EPS);
        assert!((ctl.camera().pitch() - (-5.0 * sensitivity)).abs() < EPS);

        let (yaw, pitch) = (ctl.camera().yaw(), ctl.camera().pitch());
        ctl.update(0.016, &input);
        assert_eq!(ctl.camera().yaw(), yaw);
        assert_eq!(ctl.camera().pitch(), pitch);
    }

    #[test]
    fn release_resets_reference() {
        let mut ctl = controller();
        let mut input = InputState::new();

        input.set_mouse_button(MouseButton::Left, true);
        ctl.update(0.016, &input);
        input.set_mouse_button(MouseButton::Left, false);
        ctl.update(0.016, &input);

        // Cursor travels far while released, then the button is pressed again.
        input.set_cursor_position(Vec2::new(500.0, 300.0));
        input.set_mouse_button(MouseButton::Left, true);
        ctl.update(0.016, &input);
        assert_eq!(ctl.camera().yaw(), -90.0);
        assert_eq!(ctl.camera().pitch(), 0.0);
    }

    #[test]
    fn cursor_motion_without_button_is_ignored() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_cursor_position(Vec2::new(40.0, 40.0));
        ctl.update(0.016, &input);
        input.set_cursor_position(Vec2::new(80.0, 90.0));
        ctl.update(0.016, &input);
        assert_eq!(ctl.camera().yaw(), -90.0);
    }

    #[test]
    fn forward_key_moves_along_view() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);

        let start = ctl.camera().position();
        ctl.update(0.1, &input);
        // speed 5 * dt 0.1 * boost 5
        assert!(ctl.camera().position().abs_diff_eq(start + Vec3::new(0.0, 0.0, -2.5), EPS));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        input.set_key(KeyCode::KeyS, true);
        input.set_key(KeyCode::KeyA, true);
        input.set_key(KeyCode::KeyD, true);

        let start = ctl.camera().position();
        ctl.update(0.1, &input);
        assert_eq!(ctl.camera().position(), start);
    }

    #[test]
    fn vertical_and_strafe_keys() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_key(KeyCode::Space, true);

        let start = ctl.camera().position();
        ctl.update(0.1, &input);
        assert!(ctl.camera().position().abs_diff_eq(start + Vec3::new(0.0, 2.5, 0.0), EPS));

        input.set_key(KeyCode::Space, false);
        input.set_key(KeyCode::KeyD, true);
        ctl.update(0.1, &input);
        assert!(ctl.camera().position().abs_diff_eq(start + Vec3::new(2.5, 2.5, 0.0), EPS));
    }

    #[test]
    fn first_update_has_zero_delta() {
        let mut ctl = controller();
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        ctl.clock().advance(3.0);

        let start = ctl.camera().position();
        assert_eq!(ctl.on_update(&input), 0.0);
        assert_eq!(ctl.camera().position(), start);

        ctl.clock().advance(0.1);
        let dt = ctl.on_update(&input);
        assert!((dt - 0.1).abs() < EPS);
        assert!(ctl.camera().position().z < start.z);
    }

    #[test]
    fn long_frames_are_clamped() {
        let mut ctl = controller();
        let input = InputState::new();
        ctl.on_update(&input);
        ctl.clock().advance(10.0);
        assert_eq!(ctl.on_update(&input), ctl.config().max_frame_delta);
    }

    #[test]
    fn custom_bindings_and_look_button() {
        let mut ctl = controller();
        let mut config = ControllerConfig::default();
        config.bindings.forward = KeyCode::ArrowUp;
        config.look_button = MouseButton::Right;
        ctl.set_config(config);

        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        input.set_mouse_button(MouseButton::Left, true);
        let start = ctl.camera().position();
        ctl.update(0.1, &input);
        input.set_cursor_position(Vec2::new(50.0, 50.0));
        ctl.update(0.1, &input);
        assert_eq!(ctl.camera().position(), start);
        assert_eq!(ctl.camera().yaw(), -90.0);

        input.set_key(KeyCode::ArrowUp, true);
        ctl.update(0.1, &input);
        assert!(ctl.camera().position().z < start.z);
    }

    #[test]
    fn resize_updates_aspect() {
        let mut ctl = controller();
        ctl.on_event(&Event::WindowResized {
            width: 800,
            height: 800,
        });
        assert_eq!(ctl.camera().projection().aspect_ratio(), 1.0);

        ctl.on_resize(1024, 0);
        assert_eq!(ctl.camera().projection().aspect_ratio(), 1.0);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = ControllerConfig::from_json_str(r#"{ "movement_speed": 12.0 }"#).unwrap();
        assert_eq!(config.movement_speed, 12.0);
        assert_eq!(config.boost_factor, 5.0);
        assert_eq!(config.bindings, KeyBindings::default());
    }

    #[test]
    fn load_config_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let config = ControllerConfig {
            mouse_sensitivity: 0.25,
            look_button: MouseButton::Right,
            ..ControllerConfig::default()
        };
        write!(tmp, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = ControllerConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(
            ControllerConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
