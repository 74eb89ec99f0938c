use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// World-space up axis.
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Pitch is kept strictly inside ±90° so the view basis never degenerates.
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;

/// Camera projection. Matrices follow OpenGL clip conventions (right-handed,
/// depth in [-1, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    Perspective {
        fov_y_degrees: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Visible height in world units; width follows from the aspect ratio.
        height: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(45.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::Perspective {
            fov_y_degrees,
            aspect_ratio,
            near,
            far,
        }
    }

    pub fn orthographic(height: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::Orthographic {
            height,
            aspect_ratio,
            near,
            far,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        match *self {
            Self::Perspective { aspect_ratio, .. } | Self::Orthographic { aspect_ratio, .. } => {
                aspect_ratio
            }
        }
    }

    /// Same projection with a different aspect ratio.
    pub fn with_aspect_ratio(self, aspect: f32) -> Self {
        match self {
            Self::Perspective {
                fov_y_degrees,
                near,
                far,
                ..
            } => Self::perspective(fov_y_degrees, aspect, near, far),
            Self::Orthographic {
                height, near, far, ..
            } => Self::orthographic(height, aspect, near, far),
        }
    }

    /// Near and far clip distances.
    pub fn clip_planes(&self) -> (f32, f32) {
        match *self {
            Self::Perspective { near, far, .. } | Self::Orthographic { near, far, .. } => {
                (near, far)
            }
        }
    }

    pub fn matrix(&self) -> Mat4 {
        self.debug_validate();
        match *self {
            Self::Perspective {
                fov_y_degrees,
                aspect_ratio,
                near,
                far,
            } => Mat4::perspective_rh_gl(fov_y_degrees.to_radians(), aspect_ratio, near, far),
            Self::Orthographic {
                height,
                aspect_ratio,
                near,
                far,
            } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect_ratio;
                Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    fn debug_validate(&self) {
        let (near, far) = self.clip_planes();
        debug_assert!(near < far, "near clip {near} must be closer than far clip {far}");
        debug_assert!(
            self.aspect_ratio() > 0.0,
            "aspect ratio must be positive, got {}",
            self.aspect_ratio()
        );
        if let Self::Perspective { near, .. } = *self {
            debug_assert!(near > 0.0, "perspective near clip must be positive, got {near}");
        }
    }
}

/// Initial camera pose and projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    /// Degrees. -90 looks down -Z.
    pub yaw: f32,
    /// Degrees, clamped to ±[`PITCH_LIMIT_DEGREES`].
    pub pitch: f32,
    pub projection: Projection,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 14.0, 27.0),
            yaw: -90.0,
            pitch: 0.0,
            projection: Projection::default(),
        }
    }
}

/// Fly camera: position plus yaw/pitch orientation, with cached matrices.
///
/// Every mutator recomputes the derived matrices before returning, so
/// `view_projection_matrix() == projection_matrix() * view_matrix()` holds
/// whenever the camera is observable.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    position: Vec3,
    forward: Vec3,
    yaw: f32,
    pitch: f32,
    projection_matrix: Mat4,
    view_matrix: Mat4,
    view_projection_matrix: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl Camera {
    /// Camera at the default pose with the given projection.
    pub fn new(projection: Projection) -> Self {
        Self::from_config(&CameraConfig {
            projection,
            ..CameraConfig::default()
        })
    }

    /// Perspective camera at the default pose.
    pub fn perspective(fov_y_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::perspective(fov_y_degrees, aspect_ratio, near, far))
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mut camera = Self {
            projection: config.projection,
            position: config.position,
            forward: Vec3::NEG_Z,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
            projection_matrix: config.projection.matrix(),
            view_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
        };
        camera.recalculate_forward();
        camera.recalculate_view();
        camera
    }

    /// Switch to a perspective projection.
    pub fn set_projection(&mut self, fov_y_degrees: f32, aspect_ratio: f32, near: f32, far: f32) {
        self.set_projection_kind(Projection::perspective(
            fov_y_degrees,
            aspect_ratio,
            near,
            far,
        ));
    }

    /// Switch to an orthographic projection `height` world units tall.
    pub fn set_orthographic(&mut self, height: f32, aspect_ratio: f32, near: f32, far: f32) {
        self.set_projection_kind(Projection::orthographic(height, aspect_ratio, near, far));
    }

    pub fn set_projection_kind(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Change only the aspect ratio, keeping the projection kind.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.set_projection_kind(self.projection.with_aspect_ratio(aspect_ratio));
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recalculate_view();
    }

    /// Move `distance` along a camera-relative axis.
    ///
    /// `axis.z` moves along the view direction, `axis.y` along world up and
    /// `axis.x` sideways (+x is to the right). The axis is normalized first;
    /// a zero axis leaves the camera untouched.
    pub fn move_along(&mut self, distance: f32, axis: Vec3) {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return;
        }

        self.position += self.forward * distance * axis.z;
        self.position += WORLD_UP * distance * axis.y;
        // up × forward points left, hence the negated x.
        self.position += WORLD_UP.cross(self.forward) * distance * -axis.x;

        self.recalculate_view();
    }

    /// Rotate by the given deltas in degrees.
    ///
    /// A positive pitch delta tilts the view down; a positive yaw delta turns
    /// it right. Pitch is clamped to ±[`PITCH_LIMIT_DEGREES`].
    pub fn rotate(&mut self, pitch_delta: f32, yaw_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch - pitch_delta).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);

        self.recalculate_forward();
        self.recalculate_view();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Unit vector to the right of the view direction, parallel to the ground.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(WORLD_UP).normalize()
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    fn recalculate_forward(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.forward = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
    }

    fn recalculate_view(&mut self) {
        // Re-derive up from right so it stays orthogonal to forward at steep pitch.
        let right = self.forward.cross(WORLD_UP).normalize();
        let up = right.cross(self.forward).normalize();

        self.view_matrix = Mat4::look_at_rh(self.position, self.position + self.forward, up);
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }
}
