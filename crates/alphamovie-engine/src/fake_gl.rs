//! Recording `GlApi` for tests.
//!
//! Behaves like a minimal, strict driver: shaders compile, programs link, and a uniform or
//! attribute only has a location when an attached shader declares it. Uniform locations
//! remember the program they came from; uploading through a location while another
//! program is bound raises `GL_INVALID_OPERATION`, the way a real driver would misbehave
//! with stale handles. Failures can be injected per stage, per link, or per call.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::gpu::{GlApi, ShaderStage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLocation {
    pub program: u32,
    pub name: String,
}

#[derive(Debug)]
struct FakeShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct FakeProgram {
    shaders: Vec<u32>,
    linked: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, FakeShader>,
    programs: HashMap<u32, FakeProgram>,
    textures: HashSet<u32>,
    buffers: HashSet<u32>,
    bound_program: Option<u32>,
    bound_texture: Option<(u32, u32)>,

    calls: Vec<&'static str>,
    errors: VecDeque<u32>,
    error_on: HashMap<&'static str, u32>,
    fail_stage: Option<ShaderStage>,
    fail_link: bool,
    hidden: HashSet<String>,

    programs_created: usize,
    programs_deleted: usize,
    shaders_deleted: usize,
    uniform_uploads: usize,
    matrices: Vec<[f32; 16]>,
    tex_uploads: Vec<(i32, i32, usize)>,
    viewports: Vec<(i32, i32, i32, i32)>,
}

#[derive(Debug, Default)]
pub struct FakeGl {
    state: RefCell<State>,
}

impl FakeGl {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &'static str) {
        let mut st = self.state.borrow_mut();
        st.calls.push(call);
        if let Some(code) = st.error_on.remove(call) {
            st.errors.push_back(code);
        }
    }

    fn alloc(&self) -> u32 {
        let mut st = self.state.borrow_mut();
        st.next_id += 1;
        st.next_id
    }

    fn declares(&self, program: u32, keyword: &str, name: &str) -> bool {
        let st = self.state.borrow();
        if st.hidden.contains(name) {
            return false;
        }
        let Some(p) = st.programs.get(&program) else {
            return false;
        };
        if !p.linked {
            return false;
        }
        let suffix = format!(" {name};");
        p.shaders.iter().filter_map(|id| st.shaders.get(id)).any(|s| {
            s.source
                .lines()
                .any(|l| l.trim_start().starts_with(keyword) && l.trim_end().ends_with(&suffix))
        })
    }

    fn check_location(&self, loc: &FakeLocation) {
        let mut st = self.state.borrow_mut();
        st.uniform_uploads += 1;
        if st.bound_program != Some(loc.program) {
            st.errors.push_back(glow::INVALID_OPERATION);
        }
    }

    // ---- knobs ----

    pub fn fail_compile(&self, stage: ShaderStage) {
        self.state.borrow_mut().fail_stage = Some(stage);
    }

    pub fn fail_link(&self) {
        self.state.borrow_mut().fail_link = true;
    }

    pub fn clear_failures(&self) {
        let mut st = self.state.borrow_mut();
        st.fail_stage = None;
        st.fail_link = false;
        st.hidden.clear();
        st.error_on.clear();
    }

    /// Pretend the driver optimized `name` away.
    pub fn hide_uniform(&self, name: &str) {
        self.state.borrow_mut().hidden.insert(name.to_string());
    }

    /// Queue `code` for `glGetError` the next time `call` runs.
    pub fn error_on(&self, call: &'static str, code: u32) {
        self.state.borrow_mut().error_on.insert(call, code);
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == call).count()
    }

    pub fn programs_created(&self) -> usize {
        self.state.borrow().programs_created
    }

    pub fn programs_deleted(&self) -> usize {
        self.state.borrow().programs_deleted
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn shaders_deleted(&self) -> usize {
        self.state.borrow().shaders_deleted
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn uniform_uploads(&self) -> usize {
        self.state.borrow().uniform_uploads
    }

    pub fn matrices(&self) -> Vec<[f32; 16]> {
        self.state.borrow().matrices.clone()
    }

    pub fn tex_uploads(&self) -> Vec<(i32, i32, usize)> {
        self.state.borrow().tex_uploads.clone()
    }

    pub fn last_viewport(&self) -> Option<(i32, i32, i32, i32)> {
        self.state.borrow().viewports.last().copied()
    }

    pub fn bound_texture(&self) -> Option<(u32, u32)> {
        self.state.borrow().bound_texture
    }

    /// Fragment source of the program currently bound, if any.
    pub fn bound_fragment_source(&self) -> Option<String> {
        let st = self.state.borrow();
        let p = st.programs.get(&st.bound_program?)?;
        p.shaders
            .iter()
            .filter_map(|id| st.shaders.get(id))
            .find(|s| s.stage == ShaderStage::Fragment)
            .map(|s| s.source.clone())
    }

    /// Compile and link a program outside the renderer.
    pub fn link_sources(&self, vs: &str, fs: &str) -> u32 {
        let v = self.create_shader(ShaderStage::Vertex).unwrap();
        self.shader_source(v, vs);
        self.compile_shader(v);
        let f = self.create_shader(ShaderStage::Fragment).unwrap();
        self.shader_source(f, fs);
        self.compile_shader(f);
        let p = self.create_program().unwrap();
        self.attach_shader(p, v);
        self.attach_shader(p, f);
        self.link_program(p);
        p
    }
}

impl GlApi for FakeGl {
    type Shader = u32;
    type Program = u32;
    type Texture = u32;
    type Buffer = u32;
    type UniformLocation = FakeLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        self.record("create_shader");
        let id = self.alloc();
        self.state.borrow_mut().shaders.insert(
            id,
            FakeShader {
                stage,
                source: String::new(),
                compiled: false,
            },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        self.record("shader_source");
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: u32) {
        self.record("compile_shader");
        let mut st = self.state.borrow_mut();
        let fail = st.fail_stage;
        if let Some(s) = st.shaders.get_mut(&shader) {
            s.compiled = Some(s.stage) != fail && !s.source.is_empty();
        }
    }

    fn get_shader_compile_status(&self, shader: u32) -> bool {
        self.state.borrow().shaders.get(&shader).map(|s| s.compiled).unwrap_or(false)
    }

    fn get_shader_info_log(&self, shader: u32) -> String {
        match self.state.borrow().shaders.get(&shader) {
            Some(s) if !s.compiled => format!("0:1: error: {} stage rejected", s.stage.as_str()),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.record("delete_shader");
        let mut st = self.state.borrow_mut();
        if st.shaders.remove(&shader).is_some() {
            st.shaders_deleted += 1;
        }
    }

    fn create_program(&self) -> Result<u32, String> {
        self.record("create_program");
        let id = self.alloc();
        let mut st = self.state.borrow_mut();
        st.programs.insert(id, FakeProgram::default());
        st.programs_created += 1;
        Ok(id)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.record("attach_shader");
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.shaders.push(shader);
        }
    }

    fn link_program(&self, program: u32) {
        self.record("link_program");
        let mut st = self.state.borrow_mut();
        let fail = st.fail_link;
        let all_compiled = st
            .programs
            .get(&program)
            .map(|p| p.shaders.iter().all(|id| st.shaders.get(id).map(|s| s.compiled).unwrap_or(false)))
            .unwrap_or(false);
        if let Some(p) = st.programs.get_mut(&program) {
            p.linked = all_compiled && !fail;
        }
    }

    fn get_program_link_status(&self, program: u32) -> bool {
        self.state.borrow().programs.get(&program).map(|p| p.linked).unwrap_or(false)
    }

    fn get_program_info_log(&self, program: u32) -> String {
        if self.get_program_link_status(program) {
            String::new()
        } else {
            "error: program link rejected".to_string()
        }
    }

    fn delete_program(&self, program: u32) {
        self.record("delete_program");
        let mut st = self.state.borrow_mut();
        if st.programs.remove(&program).is_some() {
            st.programs_deleted += 1;
        }
        if st.bound_program == Some(program) {
            st.bound_program = None;
        }
    }

    fn use_program(&self, program: Option<u32>) {
        self.record("use_program");
        let mut st = self.state.borrow_mut();
        match program {
            Some(p) if !st.programs.get(&p).map(|p| p.linked).unwrap_or(false) => {
                st.errors.push_back(glow::INVALID_OPERATION);
            }
            _ => st.bound_program = program,
        }
    }

    fn get_attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record("get_attrib_location");
        if self.declares(program, "attribute", name) {
            Some(name.len() as u32)
        } else {
            None
        }
    }

    fn get_uniform_location(&self, program: u32, name: &str) -> Option<FakeLocation> {
        self.record("get_uniform_location");
        if self.declares(program, "uniform", name) {
            Some(FakeLocation {
                program,
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    fn uniform_1_f32(&self, location: &FakeLocation, _x: f32) {
        self.record("uniform_1_f32");
        self.check_location(location);
    }

    fn uniform_3_f32(&self, location: &FakeLocation, _x: f32, _y: f32, _z: f32) {
        self.record("uniform_3_f32");
        self.check_location(location);
    }

    fn uniform_matrix_4_f32(&self, location: &FakeLocation, m: &[f32; 16]) {
        self.record("uniform_matrix_4_f32");
        self.check_location(location);
        self.state.borrow_mut().matrices.push(*m);
    }

    fn create_texture(&self) -> Result<u32, String> {
        self.record("create_texture");
        let id = self.alloc();
        self.state.borrow_mut().textures.insert(id);
        Ok(id)
    }

    fn active_texture(&self, _unit: u32) {
        self.record("active_texture");
    }

    fn bind_texture(&self, target: u32, texture: Option<u32>) {
        self.record("bind_texture");
        self.state.borrow_mut().bound_texture = texture.map(|t| (target, t));
    }

    fn tex_parameter_i32(&self, _target: u32, _parameter: u32, _value: i32) {
        self.record("tex_parameter_i32");
    }

    fn tex_image_rgba8(&self, _target: u32, width: i32, height: i32, pixels: &[u8]) {
        self.record("tex_image_rgba8");
        let mut st = self.state.borrow_mut();
        if pixels.len() != (width * height * 4) as usize {
            st.errors.push_back(glow::INVALID_VALUE);
        }
        st.tex_uploads.push((width, height, pixels.len()));
    }

    fn delete_texture(&self, texture: u32) {
        self.record("delete_texture");
        self.state.borrow_mut().textures.remove(&texture);
    }

    fn create_buffer(&self) -> Result<u32, String> {
        self.record("create_buffer");
        let id = self.alloc();
        self.state.borrow_mut().buffers.insert(id);
        Ok(id)
    }

    fn bind_array_buffer(&self, _buffer: Option<u32>) {
        self.record("bind_array_buffer");
    }

    fn array_buffer_data_f32(&self, _data: &[f32]) {
        self.record("array_buffer_data_f32");
    }

    fn delete_buffer(&self, buffer: u32) {
        self.record("delete_buffer");
        self.state.borrow_mut().buffers.remove(&buffer);
    }

    fn vertex_attrib_pointer_f32(&self, _index: u32, _size: i32, _stride: i32, _offset: i32) {
        self.record("vertex_attrib_pointer_f32");
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {
        self.record("enable_vertex_attrib_array");
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record("viewport");
        self.state.borrow_mut().viewports.push((x, y, width, height));
    }

    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {
        self.record("clear_color");
    }

    fn clear(&self, _mask: u32) {
        self.record("clear");
    }

    fn enable(&self, _cap: u32) {
        self.record("enable");
    }

    fn blend_func(&self, _src: u32, _dst: u32) {
        self.record("blend_func");
    }

    fn draw_arrays(&self, _mode: u32, _first: i32, _count: i32) {
        self.record("draw_arrays");
    }

    fn finish(&self) {
        self.record("finish");
    }

    fn get_error(&self) -> u32 {
        self.state.borrow_mut().errors.pop_front().unwrap_or(glow::NO_ERROR)
    }
}
