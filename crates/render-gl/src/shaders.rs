/// GLSL vertex stage for lit, untextured meshes.
///
/// Uniforms: `u_view_projection`, `u_model` (both `mat4`).
pub const BASIC_VERTEX: &str = include_str!("../shaders/basic.vert");

/// GLSL fragment stage paired with [`BASIC_VERTEX`].
///
/// Uniforms: `u_light_direction` (`vec3`), `u_color` (`vec4`), `u_ambient` (`float`).
pub const BASIC_FRAGMENT: &str = include_str!("../shaders/basic.frag");
