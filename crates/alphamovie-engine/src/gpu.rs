//! The slice of OpenGL ES 2.0 the renderer talks to.
//!
//! `GlApi` mirrors the `glow::HasContext` calls the engine needs, one to one, so the
//! production implementation below is pure forwarding. Keeping the surface this narrow is
//! what lets the render loop be exercised without a driver.
//!
//! Every method must be called on the thread that owns the current GL context.

use glow::HasContext;

use crate::error::EngineError;

/// `GL_TEXTURE_EXTERNAL_OES` from `GL_OES_EGL_image_external`.
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Where decoded frames land.
///
/// `ExternalOes` is the zero-copy path used with platform decoders (EGLImage backed);
/// `Texture2D` is a plain texture the producer uploads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureTarget {
    ExternalOes,
    #[default]
    #[serde(rename = "texture_2d")]
    Texture2D,
}

impl TextureTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureTarget::ExternalOes => TEXTURE_EXTERNAL_OES,
            TextureTarget::Texture2D => glow::TEXTURE_2D,
        }
    }

    /// GLSL sampler type for `sTexture`.
    pub fn sampler_type(self) -> &'static str {
        match self {
            TextureTarget::ExternalOes => "samplerExternalOES",
            TextureTarget::Texture2D => "sampler2D",
        }
    }

    /// Lines that must precede everything else in a fragment shader sampling this target.
    pub fn fragment_preamble(self) -> &'static str {
        match self {
            TextureTarget::ExternalOes => "#extension GL_OES_EGL_image_external : require\n",
            TextureTarget::Texture2D => "",
        }
    }
}

pub trait GlApi {
    type Shader: Copy + std::fmt::Debug;
    type Program: Copy + std::fmt::Debug + PartialEq;
    type Texture: Copy + std::fmt::Debug;
    type Buffer: Copy + std::fmt::Debug;
    type UniformLocation: Clone + std::fmt::Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn get_program_link_status(&self, program: Self::Program) -> bool;
    fn get_program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn get_uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn uniform_1_f32(&self, location: &Self::UniformLocation, x: f32);
    fn uniform_3_f32(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32);
    fn uniform_matrix_4_f32(&self, location: &Self::UniformLocation, m: &[f32; 16]);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    /// Uploads tightly packed RGBA8 pixels into the texture bound to `target`.
    fn tex_image_rgba8(&self, target: u32, width: i32, height: i32, pixels: &[u8]);
    fn delete_texture(&self, texture: Self::Texture);

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>);
    fn array_buffer_data_f32(&self, data: &[f32]);
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, stride: i32, offset: i32);
    fn enable_vertex_attrib_array(&self, index: u32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, cap: u32);
    fn blend_func(&self, src: u32, dst: u32);
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    fn finish(&self);
    fn get_error(&self) -> u32;
}

/// Any pending driver error becomes fatal for `op`.
pub fn check_gl<G: GlApi + ?Sized>(gl: &G, op: &str) -> Result<(), EngineError> {
    let code = gl.get_error();
    if code != glow::NO_ERROR {
        return Err(EngineError::Gl { op: op.to_string(), code });
    }
    Ok(())
}

pub fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::NO_ERROR => "GL_NO_ERROR",
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "unknown error",
    }
}

// NOTE: glow marks every call unsafe; the contract (current context on this thread) is
// documented on the trait and upheld by the Renderer owning the context's thread.
impl GlApi for glow::Context {
    type Shader = glow::NativeShader;
    type Program = glow::NativeProgram;
    type Texture = glow::NativeTexture;
    type Buffer = glow::NativeBuffer;
    type UniformLocation = glow::NativeUniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { HasContext::create_shader(self, stage.gl_enum()) }
    }
    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }
    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { HasContext::get_shader_compile_status(self, shader) }
    }
    fn get_shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { HasContext::get_shader_info_log(self, shader) }
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
    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }
    fn get_program_link_status(&self, program: Self::Program) -> bool {
        unsafe { HasContext::get_program_link_status(self, program) }
    }
    fn get_program_info_log(&self, program: Self::Program) -> String {
        unsafe { HasContext::get_program_info_log(self, program) }
    }
    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }
    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { HasContext::get_attrib_location(self, program, name) }
    }
    fn get_uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        unsafe { HasContext::get_uniform_location(self, program, name) }
    }
    fn uniform_1_f32(&self, location: &Self::UniformLocation, x: f32) {
        unsafe { HasContext::uniform_1_f32(self, Some(location), x) }
    }
    fn uniform_3_f32(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32) {
        unsafe { HasContext::uniform_3_f32(self, Some(location), x, y, z) }
    }
    fn uniform_matrix_4_f32(&self, location: &Self::UniformLocation, m: &[f32; 16]) {
        unsafe { HasContext::uniform_matrix_4_f32_slice(self, Some(location), false, m) }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { HasContext::create_texture(self) }
    }
    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, unit) }
    }
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>) {
        unsafe { HasContext::bind_texture(self, target, texture) }
    }
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { HasContext::tex_parameter_i32(self, target, parameter, value) }
    }
    fn tex_image_rgba8(&self, target: u32, width: i32, height: i32, pixels: &[u8]) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                target,
                0,
                glow::RGBA as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            )
        }
    }
    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }
    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, glow::ARRAY_BUFFER, buffer) }
    }
    fn array_buffer_data_f32(&self, data: &[f32]) {
        let bytes: Vec<u8> = data.iter().flat_map(|f| f.to_ne_bytes()).collect();
        unsafe { HasContext::buffer_data_u8_slice(self, glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW) }
    }
    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }
    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, stride: i32, offset: i32) {
        unsafe { HasContext::vertex_attrib_pointer_f32(self, index, size, glow::FLOAT, false, stride, offset) }
    }
    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { HasContext::clear_color(self, r, g, b, a) }
    }
    fn clear(&self, mask: u32) {
        unsafe { HasContext::clear(self, mask) }
    }
    fn enable(&self, cap: u32) {
        unsafe { HasContext::enable(self, cap) }
    }
    fn blend_func(&self, src: u32, dst: u32) {
        unsafe { HasContext::blend_func(self, src, dst) }
    }
    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, mode, first, count) }
    }
    fn finish(&self) {
        unsafe { HasContext::finish(self) }
    }
    fn get_error(&self) -> u32 {
        unsafe { HasContext::get_error(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_target_needs_the_extension() {
        assert!(TextureTarget::ExternalOes
            .fragment_preamble()
            .contains("GL_OES_EGL_image_external"));
        assert_eq!(TextureTarget::ExternalOes.gl_enum(), 0x8D65);
        assert_eq!(TextureTarget::Texture2D.fragment_preamble(), "");
        assert_eq!(TextureTarget::Texture2D.sampler_type(), "sampler2D");
    }

    #[test]
    fn texture_target_deserializes_snake_case() {
        let t: TextureTarget = serde_json::from_str("\"external_oes\"").unwrap();
        assert_eq!(t, TextureTarget::ExternalOes);
        let t: TextureTarget = serde_json::from_str("\"texture_2d\"").unwrap();
        assert_eq!(t, TextureTarget::Texture2D);
    }
}
