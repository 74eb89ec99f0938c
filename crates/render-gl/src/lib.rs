//! OpenGL shader programs for the renderer.
//!
//! Every GPU call goes through [`GraphicsApi`], implemented for a live
//! `glow::Context` and for [`HeadlessGl`], a recording driver used when no
//! window or context exists.
//!
//! # Invariants
//! - A [`ShaderProgram`] deletes its program handle exactly once.
//! - Failed compile or link leaves no shader or program objects behind.
//! - Uploading to a uniform the program does not have changes no GPU state.
//! - All objects belong to the context's thread; nothing here is `Send`.

mod backend;
mod glow_backend;
mod headless;
mod program;
mod registry;
mod shaders;
mod uniform;

pub use backend::{GraphicsApi, ShaderStage};
pub use headless::{
    ActiveUniform, HeadlessGl, HeadlessProgram, HeadlessShader, HeadlessUniformLocation,
    UploadRecord,
};
pub use program::{ShaderError, ShaderProgram};
pub use registry::ShaderRegistry;
pub use shaders::{BASIC_FRAGMENT, BASIC_VERTEX};
pub use uniform::{UniformData, UniformKind, UniformValue};

pub fn crate_info() -> &'static str {
    "lumen-render-gl v0.1.0"
}
