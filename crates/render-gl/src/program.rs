use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, Vec2, Vec3, Vec4};
use lumen_common::fs::read_file;
use lumen_common::log::{CLIENT, CORE};

use crate::backend::{GraphicsApi, ShaderStage};
use crate::uniform::UniformValue;

/// Errors from building a shader program.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to create {stage} shader object: {reason}")]
    CreateStage { stage: ShaderStage, reason: String },
    #[error("{stage} shader compilation failed: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("failed to create program object: {0}")]
    CreateProgram(String),
    #[error("shader link failed: {log}")]
    Link { log: String },
}

/// Deletes a shader stage object on drop.
struct StageGuard<'gl, G: GraphicsApi> {
    gl: &'gl G,
    shader: G::Shader,
}

impl<G: GraphicsApi> Drop for StageGuard<'_, G> {
    fn drop(&mut self) {
        self.gl.delete_shader(self.shader);
    }
}

/// Deletes a program object on drop unless released.
struct ProgramGuard<'gl, G: GraphicsApi> {
    gl: &'gl G,
    program: G::Program,
    armed: bool,
}

impl<'gl, G: GraphicsApi> ProgramGuard<'gl, G> {
    fn new(gl: &'gl G, program: G::Program) -> Self {
        Self {
            gl,
            program,
            armed: true,
        }
    }

    fn release(mut self) -> G::Program {
        self.armed = false;
        self.program
    }
}

impl<G: GraphicsApi> Drop for ProgramGuard<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            self.gl.delete_program(self.program);
        }
    }
}

fn compile_stage<'gl, G: GraphicsApi>(
    gl: &'gl G,
    stage: ShaderStage,
    source: &str,
) -> Result<StageGuard<'gl, G>, ShaderError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|reason| ShaderError::CreateStage { stage, reason })?;
    let guard = StageGuard { gl, shader };

    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.shader_compile_status(shader) {
        return Err(ShaderError::Compile {
            stage,
            log: gl.shader_info_log(shader),
        });
    }
    Ok(guard)
}

/// Compile both stages and link them into a program.
///
/// Every object created along the way is owned by a guard, so each early
/// return releases exactly what exists at that point. On success only the
/// linked program survives.
fn build_program<G: GraphicsApi>(
    gl: &G,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<G::Program, ShaderError> {
    let vertex = compile_stage(gl, ShaderStage::Vertex, vertex_source)?;
    let fragment = compile_stage(gl, ShaderStage::Fragment, fragment_source)?;

    let program = ProgramGuard::new(
        gl,
        gl.create_program().map_err(ShaderError::CreateProgram)?,
    );
    gl.attach_shader(program.program, vertex.shader);
    gl.attach_shader(program.program, fragment.shader);
    gl.link_program(program.program);

    if !gl.program_link_status(program.program) {
        return Err(ShaderError::Link {
            log: gl.program_info_log(program.program),
        });
    }

    gl.detach_shader(program.program, vertex.shader);
    gl.detach_shader(program.program, fragment.shader);
    Ok(program.release())
}

/// A linked GPU program that owns its handle.
///
/// The program is deleted exactly once, when the value is dropped. Moving the
/// value moves ownership; there is no way to duplicate it.
///
/// Uniform uploads look the name up first and touch no GPU state when the
/// uniform does not exist. Otherwise the program is bound for the upload and
/// the previous bind state is restored afterwards.
pub struct ShaderProgram<G: GraphicsApi> {
    gl: Rc<G>,
    program: G::Program,
    bound: Cell<bool>,
}

impl<G: GraphicsApi> ShaderProgram<G> {
    /// Compile and link a program from vertex and fragment source text.
    pub fn new(
        gl: Rc<G>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let _span = tracing::debug_span!(target: CORE, "shader_compile").entered();
        let program = build_program(&*gl, vertex_source, fragment_source)
            .inspect_err(|e| tracing::error!(target: CORE, "{e}"))?;
        Ok(Self {
            gl,
            program,
            bound: Cell::new(false),
        })
    }

    /// Compile and link from source files. Unreadable files are treated as
    /// empty sources and therefore fail to compile.
    pub fn from_files(
        gl: Rc<G>,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = read_file(vertex_path);
        let fragment_source = read_file(fragment_path);
        Self::new(gl, &vertex_source, &fragment_source)
    }

    /// Rebuild from new sources, keeping the current program if that fails.
    ///
    /// On success the old program is deleted and, if this program was bound,
    /// the replacement becomes current.
    pub fn reload(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), ShaderError> {
        let _span = tracing::debug_span!(target: CORE, "shader_reload").entered();
        let program = build_program(&*self.gl, vertex_source, fragment_source).inspect_err(|e| {
            tracing::error!(target: CORE, "reload failed, keeping previous program: {e}")
        })?;

        let old = std::mem::replace(&mut self.program, program);
        if self.is_bound() {
            self.gl.use_program(Some(self.program));
        }
        self.gl.delete_program(old);
        Ok(())
    }

    pub fn reload_from_files(
        &mut self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<(), ShaderError> {
        let vertex_source = read_file(vertex_path);
        let fragment_source = read_file(fragment_path);
        self.reload(&vertex_source, &fragment_source)
    }

    /// Underlying program handle.
    pub fn handle(&self) -> G::Program {
        self.program
    }

    /// Whether this program's own `bind` was the last of its `bind`/`unbind`
    /// calls. The flag is per instance and is not cleared when another
    /// program is bound, so it can report `true` while a different program is
    /// current. Uploads stay correct either way because they always bind this
    /// program first; only the restore step after the upload reads the flag.
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    pub fn bind(&self) {
        self.gl.use_program(Some(self.program));
        self.bound.set(true);
    }

    pub fn unbind(&self) {
        self.gl.use_program(None);
        self.bound.set(false);
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.gl.uniform_location(self.program, name).is_some()
    }

    /// Upload a value to the named uniform. Returns `false`, after a trace
    /// log, when the program has no such uniform.
    pub fn upload(&self, name: &str, value: UniformValue<'_>) -> bool {
        let Some(location) = self.gl.uniform_location(self.program, name) else {
            tracing::trace!(target: CLIENT, "uniform location not found: {name}");
            return false;
        };

        let _bind = ScopedBind::new(self);
        self.gl.upload_uniform(&location, &value);
        true
    }

    pub fn upload_float(&self, name: &str, value: f32) -> bool {
        self.upload(name, UniformValue::Float(value))
    }

    pub fn upload_float2(&self, name: &str, value: Vec2) -> bool {
        self.upload(name, UniformValue::Vec2(value))
    }

    pub fn upload_float3(&self, name: &str, value: Vec3) -> bool {
        self.upload(name, UniformValue::Vec3(value))
    }

    pub fn upload_float4(&self, name: &str, value: Vec4) -> bool {
        self.upload(name, UniformValue::Vec4(value))
    }

    pub fn upload_mat3(&self, name: &str, value: Mat3) -> bool {
        self.upload(name, UniformValue::Mat3(value))
    }

    pub fn upload_mat4(&self, name: &str, value: Mat4) -> bool {
        self.upload(name, UniformValue::Mat4(value))
    }

    pub fn upload_int(&self, name: &str, value: i32) -> bool {
        self.upload(name, UniformValue::Int(value))
    }

    pub fn upload_int2(&self, name: &str, value: IVec2) -> bool {
        self.upload(name, UniformValue::IVec2(value))
    }

    pub fn upload_int3(&self, name: &str, value: IVec3) -> bool {
        self.upload(name, UniformValue::IVec3(value))
    }

    pub fn upload_int4(&self, name: &str, value: IVec4) -> bool {
        self.upload(name, UniformValue::IVec4(value))
    }

    pub fn upload_uint(&self, name: &str, value: u32) -> bool {
        self.upload(name, UniformValue::UInt(value))
    }

    pub fn upload_bool(&self, name: &str, value: bool) -> bool {
        self.upload(name, UniformValue::Bool(value))
    }

    pub fn upload_float_array(&self, name: &str, values: &[f32]) -> bool {
        self.upload(name, UniformValue::FloatArray(values))
    }

    pub fn upload_float2_array(&self, name: &str, values: &[Vec2]) -> bool {
        self.upload(name, UniformValue::Vec2Array(values))
    }

    pub fn upload_float3_array(&self, name: &str, values: &[Vec3]) -> bool {
        self.upload(name, UniformValue::Vec3Array(values))
    }

    pub fn upload_float4_array(&self, name: &str, values: &[Vec4]) -> bool {
        self.upload(name, UniformValue::Vec4Array(values))
    }

    pub fn upload_mat3_array(&self, name: &str, values: &[Mat3]) -> bool {
        self.upload(name, UniformValue::Mat3Array(values))
    }

    pub fn upload_mat4_array(&self, name: &str, values: &[Mat4]) -> bool {
        self.upload(name, UniformValue::Mat4Array(values))
    }

    pub fn upload_int_array(&self, name: &str, values: &[i32]) -> bool {
        self.upload(name, UniformValue::IntArray(values))
    }

    pub fn upload_int2_array(&self, name: &str, values: &[IVec2]) -> bool {
        self.upload(name, UniformValue::IVec2Array(values))
    }

    pub fn upload_int3_array(&self, name: &str, values: &[IVec3]) -> bool {
        self.upload(name, UniformValue::IVec3Array(values))
    }

    pub fn upload_int4_array(&self, name: &str, values: &[IVec4]) -> bool {
        self.upload(name, UniformValue::IVec4Array(values))
    }

    pub fn upload_uint_array(&self, name: &str, values: &[u32]) -> bool {
        self.upload(name, UniformValue::UIntArray(values))
    }

    pub fn upload_bool_array(&self, name: &str, values: &[bool]) -> bool {
        self.upload(name, UniformValue::BoolArray(values))
    }
}

impl<G: GraphicsApi> Drop for ShaderProgram<G> {
    fn drop(&mut self) {
        self.gl.delete_program(self.program);
    }
}

impl<G: GraphicsApi> fmt::Debug for ShaderProgram<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("program", &self.program)
            .field("bound", &self.bound.get())
            .finish()
    }
}

/// Binds a program for a scope and unbinds it on exit if it was not bound before.
struct ScopedBind<'a, G: GraphicsApi> {
    program: &'a ShaderProgram<G>,
    restore: bool,
}

impl<'a, G: GraphicsApi> ScopedBind<'a, G> {
    fn new(program: &'a ShaderProgram<G>) -> Self {
        let restore = !program.is_bound();
        program.bind();
        Self { program, restore }
    }
}

impl<G: GraphicsApi> Drop for ScopedBind<'_, G> {
    fn drop(&mut self) {
        if self.restore {
            self.program.unbind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGl;
    use crate::shaders::{BASIC_FRAGMENT, BASIC_VERTEX};
    use crate::uniform::UniformData;

    const BROKEN: &str = "#version 450 core\nthis is not glsl\n";

    fn gl() -> Rc<HeadlessGl> {
        Rc::new(HeadlessGl::new())
    }

    #[test]
    fn compile_keeps_only_the_program() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        assert_eq!(gl.live_program_count(), 1);
        assert_eq!(gl.live_shader_count(), 0);
        assert!(!program.is_bound());
    }

    #[test]
    fn drop_releases_program_once() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let moved = program;
        drop(moved);
        assert_eq!(gl.live_program_count(), 0);
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn vertex_failure_leaks_nothing() {
        let gl = gl();
        let err = ShaderProgram::new(gl.clone(), BROKEN, BASIC_FRAGMENT).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(gl.live_shader_count(), 0);
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn fragment_failure_leaks_nothing() {
        let gl = gl();
        let err = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BROKEN).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("main"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_shader_count(), 0);
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn link_failure_leaks_nothing() {
        let gl = gl();
        let vertex = "uniform vec4 u_tint;\nvoid main() {}\n";
        let fragment = "uniform float u_tint;\nvoid main() {}\n";
        let err = ShaderProgram::new(gl.clone(), vertex, fragment).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(log.contains("u_tint")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_shader_count(), 0);
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn missing_uniform_touches_nothing() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let binds_before = gl.use_program_calls();

        assert!(!program.upload_float("u_does_not_exist", 1.0));
        assert_eq!(gl.use_program_calls(), binds_before);
        assert!(!program.is_bound());
        assert_eq!(gl.current_program(), None);
        assert!(gl.uploads().is_empty());

        program.bind();
        assert!(!program.upload_mat4("u_nope", Mat4::IDENTITY));
        assert!(program.is_bound());
        assert_eq!(gl.current_program(), Some(program.handle()));
    }

    #[test]
    fn upload_restores_unbound_state() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();

        assert!(program.upload_float4("u_color", Vec4::new(1.0, 0.5, 0.25, 1.0)));
        assert!(!program.is_bound());
        assert_eq!(gl.current_program(), None);
        assert!(gl.errors().is_empty());
        assert_eq!(
            gl.uniform_value(program.handle(), "u_color"),
            Some(UniformData::Float(vec![1.0, 0.5, 0.25, 1.0]))
        );
    }

    #[test]
    fn upload_keeps_bound_program_bound() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        program.bind();

        assert!(program.upload_mat4("u_model", Mat4::from_scale(Vec3::splat(2.0))));
        assert!(program.is_bound());
        assert_eq!(gl.current_program(), Some(program.handle()));
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn bind_and_unbind() {
        let gl = gl();
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        program.bind();
        assert!(program.is_bound());
        assert_eq!(gl.current_program(), Some(program.handle()));
        program.unbind();
        assert!(!program.is_bound());
        assert_eq!(gl.current_program(), None);
    }

    #[test]
    fn bound_flag_is_tracked_per_program() {
        let gl = gl();
        let a = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let b = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        a.bind();
        b.bind();
        assert!(a.is_bound());
        assert!(b.is_bound());
        assert_eq!(gl.current_program(), Some(b.handle()));

        // `a` still believes it is bound, so its upload rebinds it and leaves
        // it current instead of restoring `b`.
        assert!(a.upload_float("u_ambient", 0.5));
        assert!(gl.errors().is_empty());
        assert_eq!(gl.current_program(), Some(a.handle()));
        assert_eq!(
            gl.uniform_value(a.handle(), "u_ambient"),
            Some(UniformData::Float(vec![0.5]))
        );
        assert_eq!(gl.uniform_value(b.handle(), "u_ambient"), None);
    }

    #[test]
    fn initialized_uniform_is_reachable_by_name() {
        let gl = gl();
        let fragment = "\
#version 450 core
uniform vec3 u_tint = vec3(1.0, 0.5, 0.2);
out vec4 o_color;
void main() { o_color = vec4(u_tint, 1.0); }
";
        let program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, fragment).unwrap();
        assert!(program.has_uniform("u_tint"));
        assert!(program.upload_float3("u_tint", Vec3::ONE));
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn typed_uploads_reach_the_program() {
        let gl = gl();
        let vertex = "\
uniform int u_mode;
uniform uint u_frame;
uniform bool u_debug;
uniform ivec3 u_cell;
uniform mat3 u_normal_matrix;
uniform vec2 u_offsets[4];
uniform bool u_flags[3];
void main() {}
";
        let program = ShaderProgram::new(gl.clone(), vertex, BASIC_FRAGMENT).unwrap();
        let handle = program.handle();

        assert!(program.upload_int("u_mode", 3));
        assert!(program.upload_uint("u_frame", 42));
        assert!(program.upload_bool("u_debug", true));
        assert!(program.upload_int3("u_cell", IVec3::new(1, -2, 3)));
        assert!(program.upload_mat3("u_normal_matrix", Mat3::IDENTITY));
        assert!(program.upload_float2_array("u_offsets", &[Vec2::X, Vec2::Y]));
        assert!(program.upload_bool_array("u_flags", &[true, false, true]));
        assert!(program.upload_float("u_ambient", 0.2));

        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
        assert_eq!(gl.uniform_value(handle, "u_mode"), Some(UniformData::Int(vec![3])));
        assert_eq!(gl.uniform_value(handle, "u_frame"), Some(UniformData::UInt(vec![42])));
        assert_eq!(gl.uniform_value(handle, "u_debug"), Some(UniformData::Int(vec![1])));
        assert_eq!(
            gl.uniform_value(handle, "u_offsets"),
            Some(UniformData::Float(vec![1.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(
            gl.uniform_value(handle, "u_flags"),
            Some(UniformData::Int(vec![1, 0, 1]))
        );
        assert_eq!(gl.uploads().len(), 8);
    }

    #[test]
    fn reload_failure_keeps_previous_program() {
        let gl = gl();
        let mut program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let before = program.handle();

        assert!(program.reload(BASIC_VERTEX, BROKEN).is_err());
        assert_eq!(program.handle(), before);
        assert_eq!(gl.live_program_count(), 1);
        assert_eq!(gl.live_shader_count(), 0);
        assert!(program.has_uniform("u_color"));
    }

    #[test]
    fn reload_swaps_and_rebinds() {
        let gl = gl();
        let mut program = ShaderProgram::new(gl.clone(), BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let before = program.handle();
        program.bind();

        let fragment = "uniform vec3 u_fog_color;\nvoid main() {}\n";
        program.reload(BASIC_VERTEX, fragment).unwrap();

        assert_ne!(program.handle(), before);
        assert_eq!(gl.live_program_count(), 1);
        assert_eq!(gl.current_program(), Some(program.handle()));
        assert!(program.has_uniform("u_fog_color"));
        assert!(!program.has_uniform("u_color"));
    }

    #[test]
    fn missing_source_files_fail_to_compile() {
        let gl = gl();
        let dir = tempfile::tempdir().unwrap();
        let err = ShaderProgram::from_files(
            gl.clone(),
            dir.path().join("missing.vert"),
            dir.path().join("missing.frag"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(gl.live_shader_count(), 0);
    }
}
