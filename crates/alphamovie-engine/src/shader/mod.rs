//! Fragment-shader strategies.
//!
//! Every strategy shares the same vertex stage (a full-screen quad transformed by the
//! MVP and texture matrices) and differs only in what the fragment stage does with the
//! sampled texel. Exactly one strategy is active per renderer; it is stored by value in
//! [`Shader`] and swapped as a whole.
//!
//! Uniform locations are never stored on a strategy. They are resolved against a freshly
//! linked program into a [`UniformHandles`] that lives and dies with that program, so a
//! relink can never leave stale locations behind.

mod advanced;
mod basic;
mod invert;
mod passthrough;

pub use advanced::AdvancedChromaKeyShader;
pub use basic::BasicChromaKeyShader;
pub use invert::InvertColorsShader;
pub use passthrough::PassthroughShader;

use crate::error::EngineError;
use crate::gpu::{check_gl, GlApi, TextureTarget};

pub const A_POSITION: &str = "aPosition";
pub const A_TEXTURE_COORD: &str = "aTextureCoord";
pub const U_MVP_MATRIX: &str = "uMVPMatrix";
pub const U_ST_MATRIX: &str = "uSTMatrix";

pub const VERTEX_SHADER: &str = "uniform mat4 uMVPMatrix;
uniform mat4 uSTMatrix;
attribute vec4 aPosition;
attribute vec4 aTextureCoord;
varying vec2 vTextureCoord;
void main() {
  gl_Position = uMVPMatrix * aPosition;
  vTextureCoord = (uSTMatrix * aTextureCoord).xy;
}
";

/// Declarations every fragment stage starts with: the sampler extension (if any),
/// precision, the interpolated texture coordinate and the frame sampler.
pub fn fragment_header(target: TextureTarget) -> String {
    format!(
        "{}precision mediump float;\nvarying vec2 vTextureCoord;\nuniform {} sTexture;\n",
        target.fragment_preamble(),
        target.sampler_type()
    )
}

/// A value pushed to a strategy-specific uniform each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
}

/// Uniform locations resolved against one linked program.
#[derive(Debug, Clone)]
pub struct UniformHandles<L> {
    handles: Vec<(&'static str, L)>,
}

impl<L> UniformHandles<L> {
    pub fn empty() -> Self {
        Self { handles: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&L> {
        self.handles.iter().find(|(n, _)| *n == name).map(|(_, l)| l)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handles.iter().map(|(n, _)| *n)
    }
}

/// The contract every keying/effect strategy satisfies.
pub trait ShaderProgram {
    /// Short stable identifier, used in logs and config.
    fn name(&self) -> &'static str;

    fn vertex_source(&self) -> &'static str {
        VERTEX_SHADER
    }

    fn fragment_source(&self, target: TextureTarget) -> String;

    /// Uniforms the fragment stage declares beyond `uMVPMatrix` / `uSTMatrix`.
    fn uniform_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Current values for `uniform_names`, recomputed on every call.
    fn uniform_values(&self) -> Vec<(&'static str, UniformValue)> {
        Vec::new()
    }

    /// CPU mirror of the fragment stage for one RGBA texel in `[0, 1]`.
    fn shade(&self, texel: [f32; 4]) -> [f32; 4];

    /// Looks up every strategy uniform in `program`.
    ///
    /// A missing location means the strategy and its own source disagree, which is a
    /// programming error: it is reported, never retried.
    fn resolve_uniforms<G: GlApi>(
        &self,
        gl: &G,
        program: G::Program,
    ) -> Result<UniformHandles<G::UniformLocation>, EngineError>
    where
        Self: Sized,
    {
        let mut handles = Vec::with_capacity(self.uniform_names().len());
        for &name in self.uniform_names() {
            let loc = gl.get_uniform_location(program, name);
            check_gl(gl, &format!("glGetUniformLocation {name}"))?;
            match loc {
                Some(loc) => handles.push((name, loc)),
                None => return Err(EngineError::MissingUniform(name)),
            }
        }
        Ok(UniformHandles { handles })
    }

    /// Pushes the current parameter values to the bound program. Must run on every draw.
    fn apply_uniforms<G: GlApi>(
        &self,
        gl: &G,
        handles: &UniformHandles<G::UniformLocation>,
    ) -> Result<(), EngineError>
    where
        Self: Sized,
    {
        for (name, value) in self.uniform_values() {
            let loc = handles.get(name).ok_or(EngineError::MissingUniform(name))?;
            match value {
                UniformValue::Float(x) => gl.uniform_1_f32(loc, x),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, x, y, z),
            }
            let code = gl.get_error();
            if code != glow::NO_ERROR {
                return Err(EngineError::Gl { op: format!("glUniform {name}"), code });
            }
        }
        Ok(())
    }
}

/// The active strategy, stored by value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Passthrough(PassthroughShader),
    InvertColors(InvertColorsShader),
    BasicChromaKey(BasicChromaKeyShader),
    AdvancedChromaKey(AdvancedChromaKeyShader),
}

impl Default for Shader {
    fn default() -> Self {
        Shader::Passthrough(PassthroughShader)
    }
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Shader::Passthrough($s) => $body,
            Shader::InvertColors($s) => $body,
            Shader::BasicChromaKey($s) => $body,
            Shader::AdvancedChromaKey($s) => $body,
        }
    };
}

impl ShaderProgram for Shader {
    fn name(&self) -> &'static str {
        dispatch!(self, s => s.name())
    }

    fn vertex_source(&self) -> &'static str {
        dispatch!(self, s => s.vertex_source())
    }

    fn fragment_source(&self, target: TextureTarget) -> String {
        dispatch!(self, s => s.fragment_source(target))
    }

    fn uniform_names(&self) -> &'static [&'static str] {
        dispatch!(self, s => s.uniform_names())
    }

    fn uniform_values(&self) -> Vec<(&'static str, UniformValue)> {
        dispatch!(self, s => s.uniform_values())
    }

    fn shade(&self, texel: [f32; 4]) -> [f32; 4] {
        dispatch!(self, s => s.shade(texel))
    }
}

impl Shader {
    /// True when switching from `self` to `next` needs a new GPU program, i.e. the
    /// generated sources differ. Uniform-only changes do not.
    pub fn requires_relink(&self, next: &Shader) -> bool {
        self.vertex_source() != next.vertex_source()
            || self.fragment_source(TextureTarget::Texture2D)
                != next.fragment_source(TextureTarget::Texture2D)
    }

    pub fn as_advanced_mut(&mut self) -> Option<&mut AdvancedChromaKeyShader> {
        match self {
            Shader::AdvancedChromaKey(s) => Some(s),
            _ => None,
        }
    }
}

impl From<PassthroughShader> for Shader {
    fn from(s: PassthroughShader) -> Self {
        Shader::Passthrough(s)
    }
}

impl From<InvertColorsShader> for Shader {
    fn from(s: InvertColorsShader) -> Self {
        Shader::InvertColors(s)
    }
}

impl From<BasicChromaKeyShader> for Shader {
    fn from(s: BasicChromaKeyShader) -> Self {
        Shader::BasicChromaKey(s)
    }
}

impl From<AdvancedChromaKeyShader> for Shader {
    fn from(s: AdvancedChromaKeyShader) -> Self {
        Shader::AdvancedChromaKey(s)
    }
}
