use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use lumen_common::log::CORE;

use crate::backend::GraphicsApi;
use crate::program::{ShaderError, ShaderProgram};

/// Named cache of shader programs.
///
/// Registration is create-or-reuse: the first program registered under a
/// name is kept for the registry's lifetime and later requests for the same
/// name return it unchanged. Dropping the registry releases every program.
pub struct ShaderRegistry<G: GraphicsApi> {
    gl: Rc<G>,
    shaders: HashMap<String, ShaderProgram<G>>,
}

impl<G: GraphicsApi> ShaderRegistry<G> {
    pub fn new(gl: Rc<G>) -> Self {
        Self {
            gl,
            shaders: HashMap::new(),
        }
    }

    /// Compile the two source files into a program named `name`, or return
    /// the program already registered under that name.
    pub fn create_shader(
        &mut self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        name: &str,
    ) -> Result<&ShaderProgram<G>, ShaderError> {
        self.create_with(name, |gl| {
            ShaderProgram::from_files(gl, vertex_path, fragment_path)
        })
    }

    /// Like [`create_shader`](Self::create_shader), from in-memory sources.
    pub fn create_shader_from_source(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<&ShaderProgram<G>, ShaderError> {
        self.create_with(name, |gl| {
            ShaderProgram::new(gl, vertex_source, fragment_source)
        })
    }

    fn create_with(
        &mut self,
        name: &str,
        build: impl FnOnce(Rc<G>) -> Result<ShaderProgram<G>, ShaderError>,
    ) -> Result<&ShaderProgram<G>, ShaderError> {
        match self.shaders.entry(name.to_owned()) {
            Entry::Occupied(entry) => {
                tracing::trace!(target: CORE, "shader already exists: {name}");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let program = build(Rc::clone(&self.gl))?;
                tracing::trace!(target: CORE, "created shader: {name}");
                Ok(entry.insert(program))
            }
        }
    }

    pub fn get_shader(&self, name: &str) -> Option<&ShaderProgram<G>> {
        let shader = self.shaders.get(name);
        if shader.is_none() {
            tracing::trace!(target: CORE, "shader not found: {name}");
        }
        shader
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<G: GraphicsApi> fmt::Debug for ShaderRegistry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderRegistry")
            .field("shaders", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::headless::HeadlessGl;
    use crate::shaders::{BASIC_FRAGMENT, BASIC_VERTEX};

    fn registry() -> (Rc<HeadlessGl>, ShaderRegistry<HeadlessGl>) {
        let gl = Rc::new(HeadlessGl::new());
        (gl.clone(), ShaderRegistry::new(gl))
    }

    fn write_sources(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let vertex = dir.join("basic.vert");
        let fragment = dir.join("basic.frag");
        fs::write(&vertex, BASIC_VERTEX).unwrap();
        fs::write(&fragment, BASIC_FRAGMENT).unwrap();
        (vertex, fragment)
    }

    #[test]
    fn creates_from_files() {
        let (gl, mut registry) = registry();
        let dir = tempfile::tempdir().unwrap();
        let (vertex, fragment) = write_sources(dir.path());

        let program = registry.create_shader(&vertex, &fragment, "basic").unwrap();
        assert!(program.has_uniform("u_view_projection"));
        assert!(registry.contains("basic"));
        assert_eq!(gl.live_program_count(), 1);
    }

    #[test]
    fn first_registration_wins() {
        let (gl, mut registry) = registry();
        let dir = tempfile::tempdir().unwrap();
        let (vertex, fragment) = write_sources(dir.path());

        let first = registry
            .create_shader(&vertex, &fragment, "basic")
            .unwrap()
            .handle();
        let second = registry
            .create_shader(dir.path().join("other.vert"), dir.path().join("other.frag"), "basic")
            .unwrap()
            .handle();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(gl.live_program_count(), 1);
        assert_eq!(registry.get_shader("basic").map(|s| s.handle()), Some(first));
    }

    #[test]
    fn missing_name_is_none() {
        let (_gl, registry) = registry();
        assert!(registry.get_shader("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_compile_inserts_nothing() {
        let (gl, mut registry) = registry();
        let err = registry
            .create_shader_from_source("broken", BASIC_VERTEX, "void not_main() {}")
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));
        assert!(!registry.contains("broken"));
        assert_eq!(gl.live_shader_count(), 0);
        assert_eq!(gl.live_program_count(), 0);

        registry
            .create_shader_from_source("broken", BASIC_VERTEX, BASIC_FRAGMENT)
            .unwrap();
        assert!(registry.contains("broken"));
    }

    #[test]
    fn names_are_sorted() {
        let (_gl, mut registry) = registry();
        for name in ["sky", "basic", "grid"] {
            registry
                .create_shader_from_source(name, BASIC_VERTEX, BASIC_FRAGMENT)
                .unwrap();
        }
        assert_eq!(registry.names(), ["basic", "grid", "sky"]);
    }

    #[test]
    fn drop_releases_every_program() {
        let (gl, mut registry) = registry();
        registry
            .create_shader_from_source("a", BASIC_VERTEX, BASIC_FRAGMENT)
            .unwrap();
        registry
            .create_shader_from_source("b", BASIC_VERTEX, BASIC_FRAGMENT)
            .unwrap();
        assert_eq!(gl.live_program_count(), 2);

        drop(registry);
        assert_eq!(gl.live_program_count(), 0);
        assert!(gl.errors().is_empty());
    }
}
