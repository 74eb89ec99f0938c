use std::fmt;

use crate::uniform::UniformValue;

/// Programmable pipeline stage of a shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The slice of an immediate-mode graphics API that shader programs need.
///
/// Implementations must be driven from the thread that owns the context.
/// Object handles are plain copies; ownership and release are tracked by
/// [`ShaderProgram`](crate::ShaderProgram), not by the handle types.
pub trait GraphicsApi {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + PartialEq + fmt::Debug;
    type UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);

    /// Make `program` current, or clear the current program with `None`.
    fn use_program(&self, program: Option<Self::Program>);

    /// Location of an active uniform, or `None` if the linked program has no
    /// such uniform (unused uniforms are often optimized away).
    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    /// Upload to a location of the current program.
    fn upload_uniform(&self, location: &Self::UniformLocation, value: &UniformValue<'_>);
}
