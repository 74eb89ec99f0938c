//! A recording, context-free implementation of [`GraphicsApi`].
//!
//! `HeadlessGl` follows GL object lifetime rules closely enough to catch
//! leaks and double frees: a shader deleted while attached lingers until it
//! is detached, and a program deleted while current lingers until another
//! program is made current. Stage sources are checked for an entry point and
//! scanned for `uniform` declarations, which become the linked program's
//! active uniforms.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::backend::{GraphicsApi, ShaderStage};
use crate::uniform::{UniformData, UniformKind, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessShader(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessProgram(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessUniformLocation {
    program: HeadlessProgram,
    index: usize,
    /// First array element written through this location.
    element: usize,
}

/// A uniform declared by a compiled stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub kind: UniformKind,
    /// `None` for a plain uniform, the declared length for an array.
    pub array_len: Option<usize>,
}

/// One accepted uniform upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub program: HeadlessProgram,
    pub uniform: String,
    pub data: UniformData,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    info_log: String,
    uniforms: Vec<ActiveUniform>,
    attachments: usize,
    delete_pending: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<HeadlessShader>,
    linked: bool,
    info_log: String,
    uniforms: Vec<ActiveUniform>,
    values: HashMap<String, UniformData>,
    delete_pending: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<HeadlessShader, ShaderObject>,
    programs: HashMap<HeadlessProgram, ProgramObject>,
    current: Option<HeadlessProgram>,
    use_program_calls: usize,
    uploads: Vec<UploadRecord>,
    errors: Vec<String>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn error(&mut self, message: String) {
        tracing::warn!(target: lumen_common::log::CORE, "headless gl: {message}");
        self.errors.push(message);
    }

    fn detach(&mut self, program: HeadlessProgram, shader: HeadlessShader) {
        let Some(object) = self.programs.get_mut(&program) else {
            self.error(format!("detach from unknown program {program:?}"));
            return;
        };
        let Some(pos) = object.attached.iter().position(|s| *s == shader) else {
            self.error(format!("{shader:?} is not attached to {program:?}"));
            return;
        };
        object.attached.remove(pos);
        self.release_attachment(shader);
    }

    fn release_attachment(&mut self, shader: HeadlessShader) {
        let Some(object) = self.shaders.get_mut(&shader) else {
            return;
        };
        object.attachments = object.attachments.saturating_sub(1);
        if object.attachments == 0 && object.delete_pending {
            self.shaders.remove(&shader);
        }
    }

    fn destroy_program(&mut self, program: HeadlessProgram) {
        if let Some(object) = self.programs.remove(&program) {
            for shader in object.attached {
                self.release_attachment(shader);
            }
        }
    }
}

/// Software stand-in for a GL context. Single-threaded, like the real thing.
#[derive(Debug, Default)]
pub struct HeadlessGl {
    state: RefCell<State>,
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shader objects that still exist, including ones pending deletion.
    pub fn live_shader_count(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// Program objects that still exist, including ones pending deletion.
    pub fn live_program_count(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.borrow().current
    }

    pub fn use_program_calls(&self) -> usize {
        self.state.borrow().use_program_calls
    }

    /// Active uniforms of a linked program, in declaration order.
    pub fn active_uniforms(&self, program: HeadlessProgram) -> Vec<ActiveUniform> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    /// Last value uploaded to a uniform.
    pub fn uniform_value(&self, program: HeadlessProgram, name: &str) -> Option<UniformData> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .and_then(|p| p.values.get(name).cloned())
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.state.borrow().uploads.clone()
    }

    /// API misuse recorded so far, such as uploading without the owning
    /// program bound or deleting an unknown object.
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }
}

impl GraphicsApi for HeadlessGl {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type UniformLocation = HeadlessUniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<HeadlessShader, String> {
        let mut state = self.state.borrow_mut();
        let id = HeadlessShader(state.next_id());
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
                uniforms: Vec::new(),
                attachments: 0,
                delete_pending: false,
            },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: HeadlessShader, source: &str) {
        let mut state = self.state.borrow_mut();
        match state.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_owned(),
            None => state.error(format!("source for unknown shader {shader:?}")),
        }
    }

    fn compile_shader(&self, shader: HeadlessShader) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader) else {
            state.error(format!("compile of unknown shader {shader:?}"));
            return;
        };
        match compile_source(&object.source) {
            Ok(uniforms) => {
                object.compiled = true;
                object.info_log.clear();
                object.uniforms = uniforms;
            }
            Err(log) => {
                object.compiled = false;
                object.info_log = log;
                object.uniforms.clear();
            }
        }
    }

    fn shader_compile_status(&self, shader: HeadlessShader) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: HeadlessShader) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: HeadlessShader) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader) else {
            state.error(format!("delete of unknown shader {shader:?}"));
            return;
        };
        if object.delete_pending {
            state.error(format!("shader {shader:?} deleted twice"));
        } else if object.attachments > 0 {
            object.delete_pending = true;
        } else {
            state.shaders.remove(&shader);
        }
    }

    fn create_program(&self) -> Result<HeadlessProgram, String> {
        let mut state = self.state.borrow_mut();
        let id = HeadlessProgram(state.next_id());
        state.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&self, program: HeadlessProgram, shader: HeadlessShader) {
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader) {
            state.error(format!("attach of unknown shader {shader:?}"));
            return;
        }
        let Some(object) = state.programs.get_mut(&program) else {
            state.error(format!("attach to unknown program {program:?}"));
            return;
        };
        if object.attached.contains(&shader) {
            state.error(format!("{shader:?} already attached to {program:?}"));
            return;
        }
        object.attached.push(shader);
        if let Some(shader) = state.shaders.get_mut(&shader) {
            shader.attachments += 1;
        }
    }

    fn detach_shader(&self, program: HeadlessProgram, shader: HeadlessShader) {
        self.state.borrow_mut().detach(program, shader);
    }

    fn link_program(&self, program: HeadlessProgram) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.programs.get(&program) else {
            state.error(format!("link of unknown program {program:?}"));
            return;
        };
        let result = {
            let stages: Vec<&ShaderObject> = object
                .attached
                .iter()
                .filter_map(|s| state.shaders.get(s))
                .collect();
            link_stages(&stages)
        };

        if let Some(object) = state.programs.get_mut(&program) {
            object.values.clear();
            match result {
                Ok(uniforms) => {
                    object.linked = true;
                    object.info_log.clear();
                    object.uniforms = uniforms;
                }
                Err(log) => {
                    object.linked = false;
                    object.info_log = log;
                    object.uniforms.clear();
                }
            }
        }
    }

    fn program_link_status(&self, program: HeadlessProgram) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: HeadlessProgram) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: HeadlessProgram) {
        let mut state = self.state.borrow_mut();
        let is_current = state.current == Some(program);
        let Some(object) = state.programs.get_mut(&program) else {
            state.error(format!("delete of unknown program {program:?}"));
            return;
        };
        if object.delete_pending {
            state.error(format!("program {program:?} deleted twice"));
        } else if is_current {
            object.delete_pending = true;
        } else {
            state.destroy_program(program);
        }
    }

    fn use_program(&self, program: Option<HeadlessProgram>) {
        let mut state = self.state.borrow_mut();
        state.use_program_calls += 1;

        if let Some(program) = program {
            let usable = state
                .programs
                .get(&program)
                .map(|p| p.linked && !p.delete_pending);
            match usable {
                Some(true) => {}
                Some(false) => {
                    state.error(format!("use of unlinked program {program:?}"));
                    return;
                }
                None => {
                    state.error(format!("use of unknown program {program:?}"));
                    return;
                }
            }
        }

        let previous = std::mem::replace(&mut state.current, program);
        if let Some(previous) = previous.filter(|p| Some(*p) != program) {
            if state.programs.get(&previous).is_some_and(|p| p.delete_pending) {
                state.destroy_program(previous);
            }
        }
    }

    fn uniform_location(
        &self,
        program: HeadlessProgram,
        name: &str,
    ) -> Option<HeadlessUniformLocation> {
        let (name, element) = match name.strip_suffix(']').and_then(|n| n.split_once('[')) {
            Some((base, element)) => (base, Some(element.parse::<usize>().ok()?)),
            None => (name, None),
        };
        let state = self.state.borrow();
        let object = state.programs.get(&program).filter(|p| p.linked)?;
        let index = object.uniforms.iter().position(|u| u.name == name)?;
        // `name[i]` only resolves for array uniforms and in-range elements.
        let element = match (element, object.uniforms[index].array_len) {
            (None, _) => 0,
            (Some(element), Some(len)) if element < len => element,
            (Some(_), _) => return None,
        };
        Some(HeadlessUniformLocation {
            program,
            index,
            element,
        })
    }

    fn upload_uniform(&self, location: &HeadlessUniformLocation, value: &UniformValue<'_>) {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        if current != Some(location.program) {
            state.error(format!(
                "upload to {:?} while {current:?} is current",
                location.program
            ));
            return;
        }
        let Some(uniform) = state
            .programs
            .get(&location.program)
            .and_then(|p| p.uniforms.get(location.index))
            .cloned()
        else {
            state.error(format!("stale uniform location {location:?}"));
            return;
        };

        let kind_ok = match uniform.kind {
            UniformKind::Bool => matches!(value.kind(), UniformKind::Bool | UniformKind::Int),
            kind => value.kind() == kind,
        };
        if !kind_ok {
            state.error(format!(
                "{} upload to {} uniform {}",
                value.kind().glsl_name(),
                uniform.kind.glsl_name(),
                uniform.name
            ));
            return;
        }
        let count = value.count();
        if location.element + count > uniform.array_len.unwrap_or(1) {
            state.error(format!(
                "{count} elements uploaded to {} at element {}",
                uniform.name, location.element
            ));
            return;
        }

        let data = value.to_data();
        let offset = match count {
            0 => 0,
            count => location.element * (data.len() / count),
        };
        if let Some(object) = state.programs.get_mut(&location.program) {
            let previous = object.values.remove(&uniform.name);
            let stored = store_at(previous, offset, data.clone());
            object.values.insert(uniform.name.clone(), stored);
        }
        state.uploads.push(UploadRecord {
            program: location.program,
            uniform: uniform.name,
            data,
        });
    }
}

/// Check a stage source and collect its uniform declarations.
fn compile_source(source: &str) -> Result<Vec<ActiveUniform>, String> {
    if source.trim().is_empty() {
        return Err("ERROR: 0:1: '' : syntax error: empty source".to_owned());
    }
    let compact: String = source.split_whitespace().collect();
    if !compact.contains("voidmain(") {
        return Err("ERROR: 0:1: 'main' : function not defined".to_owned());
    }

    let mut uniforms: Vec<ActiveUniform> = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let line = line.split("//").next().unwrap_or_default().trim();
        let line = match line.strip_prefix("layout") {
            Some(rest) => rest.split_once(')').map_or("", |(_, after)| after.trim()),
            None => line,
        };
        let Some(decl) = line.strip_prefix("uniform ") else {
            continue;
        };
        let decl = decl.split(';').next().unwrap_or_default();
        // Interface blocks are not reported as plain uniforms.
        if decl.split('=').next().is_some_and(|head| head.contains('{')) {
            continue;
        }
        let Some((type_name, declarators)) = split_type(decl) else {
            continue;
        };
        let kind = UniformKind::from_glsl(type_name).ok_or_else(|| {
            format!(
                "ERROR: 0:{}: '{type_name}' : unsupported uniform type",
                line_no + 1
            )
        })?;

        for declarator in split_top_level(declarators) {
            // Initializers do not affect the active uniform list.
            let compact: String = declarator
                .split('=')
                .next()
                .unwrap_or_default()
                .split_whitespace()
                .collect();
            if compact.is_empty() {
                continue;
            }
            let declarator = compact.as_str();
            let (name, array_len) = match declarator.split_once('[') {
                Some((name, len)) => {
                    let len = len
                        .trim_end_matches(']')
                        .parse::<usize>()
                        .map_err(|_| {
                            format!(
                                "ERROR: 0:{}: '{declarator}' : array size must be a constant",
                                line_no + 1
                            )
                        })?;
                    (name, Some(len))
                }
                None => (declarator, None),
            };
            if uniforms.iter().any(|u| u.name == name) {
                return Err(format!(
                    "ERROR: 0:{}: '{name}' : redefinition",
                    line_no + 1
                ));
            }
            uniforms.push(ActiveUniform {
                name: name.to_owned(),
                kind,
                array_len,
            });
        }
    }
    Ok(uniforms)
}

/// Split `highp vec3 a, b[2]` into the type name and the declarator list.
fn split_type(decl: &str) -> Option<(&str, &str)> {
    let mut rest = decl;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        let (token, tail) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        if !matches!(token, "lowp" | "mediump" | "highp") {
            return Some((token, tail));
        }
        rest = tail;
    }
}

/// Split on commas that are not nested inside parentheses or brackets.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// Write `src` into `dst` starting at scalar `offset`, growing `dst` as needed.
fn splice<T: Copy + Default>(dst: &mut Vec<T>, offset: usize, src: &[T]) {
    if dst.len() < offset + src.len() {
        dst.resize(offset + src.len(), T::default());
    }
    dst[offset..offset + src.len()].copy_from_slice(src);
}

/// Merge an upload into a uniform's stored value. Elements outside the
/// written range keep their previous contents, as in GL.
fn store_at(existing: Option<UniformData>, offset: usize, data: UniformData) -> UniformData {
    use UniformData::{Float, Int, UInt};
    match (existing, data) {
        (Some(Float(mut dst)), Float(src)) => {
            splice(&mut dst, offset, &src);
            Float(dst)
        }
        (Some(Int(mut dst)), Int(src)) => {
            splice(&mut dst, offset, &src);
            Int(dst)
        }
        (Some(UInt(mut dst)), UInt(src)) => {
            splice(&mut dst, offset, &src);
            UInt(dst)
        }
        (_, Float(src)) => {
            let mut dst = Vec::new();
            splice(&mut dst, offset, &src);
            Float(dst)
        }
        (_, Int(src)) => {
            let mut dst = Vec::new();
            splice(&mut dst, offset, &src);
            Int(dst)
        }
        (_, UInt(src)) => {
            let mut dst = Vec::new();
            splice(&mut dst, offset, &src);
            UInt(dst)
        }
    }
}

/// Merge the uniforms of the attached stages, or explain why linking fails.
fn link_stages(stages: &[&ShaderObject]) -> Result<Vec<ActiveUniform>, String> {
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        if !stages.iter().any(|s| s.stage == stage) {
            return Err(format!("error: no {stage} shader attached"));
        }
    }
    if let Some(stage) = stages.iter().find(|s| !s.compiled) {
        return Err(format!("error: {} shader is not compiled", stage.stage));
    }

    let mut merged: Vec<ActiveUniform> = Vec::new();
    for uniform in stages.iter().flat_map(|s| s.uniforms.iter()) {
        match merged.iter().find(|u| u.name == uniform.name) {
            Some(existing) if existing != uniform => {
                return Err(format!(
                    "error: uniform '{}' declared as {} and {} in different stages",
                    uniform.name,
                    existing.kind.glsl_name(),
                    uniform.kind.glsl_name()
                ));
            }
            Some(_) => {}
            None => merged.push(uniform.clone()),
        }
    }
    Ok(merged)
}
