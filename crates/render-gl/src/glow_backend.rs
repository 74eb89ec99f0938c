//! [`GraphicsApi`] over a live OpenGL context loaded with `glow`.
//!
//! The context must be current on the calling thread for every call.

use glow::HasContext;

use crate::backend::{GraphicsApi, ShaderStage};
use crate::uniform::{UniformValue, bools_to_ints};

type Gl = glow::Context;

impl GraphicsApi for Gl {
    type Shader = <Gl as HasContext>::Shader;
    type Program = <Gl as HasContext>::Program;
    type UniformLocation = <Gl as HasContext>::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, kind) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn upload_uniform(&self, location: &Self::UniformLocation, value: &UniformValue<'_>) {
        let loc = Some(location);
        unsafe {
            match *value {
                UniformValue::Float(x) => self.uniform_1_f32(loc, x),
                UniformValue::Vec2(v) => self.uniform_2_f32(loc, v.x, v.y),
                UniformValue::Vec3(v) => self.uniform_3_f32(loc, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.uniform_4_f32(loc, v.x, v.y, v.z, v.w),
                UniformValue::Int(x) => self.uniform_1_i32(loc, x),
                UniformValue::IVec2(v) => self.uniform_2_i32(loc, v.x, v.y),
                UniformValue::IVec3(v) => self.uniform_3_i32(loc, v.x, v.y, v.z),
                UniformValue::IVec4(v) => self.uniform_4_i32(loc, v.x, v.y, v.z, v.w),
                UniformValue::UInt(x) => self.uniform_1_u32(loc, x),
                UniformValue::Bool(b) => self.uniform_1_i32(loc, i32::from(b)),
                UniformValue::Mat3(m) => {
                    self.uniform_matrix_3_f32_slice(loc, false, &m.to_cols_array())
                }
                UniformValue::Mat4(m) => {
                    self.uniform_matrix_4_f32_slice(loc, false, &m.to_cols_array())
                }
                UniformValue::FloatArray(v) => self.uniform_1_f32_slice(loc, v),
                UniformValue::Vec2Array(v) => {
                    self.uniform_2_f32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::Vec3Array(v) => {
                    self.uniform_3_f32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::Vec4Array(v) => {
                    self.uniform_4_f32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::IntArray(v) => self.uniform_1_i32_slice(loc, v),
                UniformValue::IVec2Array(v) => {
                    self.uniform_2_i32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::IVec3Array(v) => {
                    self.uniform_3_i32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::IVec4Array(v) => {
                    self.uniform_4_i32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::UIntArray(v) => self.uniform_1_u32_slice(loc, v),
                UniformValue::BoolArray(v) => self.uniform_1_i32_slice(loc, &bools_to_ints(v)),
                UniformValue::Mat3Array(v) => {
                    self.uniform_matrix_3_f32_slice(loc, false, bytemuck::cast_slice(v))
                }
                UniformValue::Mat4Array(v) => {
                    self.uniform_matrix_4_f32_slice(loc, false, bytemuck::cast_slice(v))
                }
            }
        }
    }
}
