use super::{fragment_header, ShaderProgram};
use crate::gpu::TextureTarget;

/// Draws the frame unchanged; alpha comes straight from the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassthroughShader;

impl ShaderProgram for PassthroughShader {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn fragment_source(&self, target: TextureTarget) -> String {
        format!(
            "{}void main() {{\n  gl_FragColor = texture2D(sTexture, vTextureCoord);\n}}\n",
            fragment_header(target)
        )
    }

    fn shade(&self, texel: [f32; 4]) -> [f32; 4] {
        texel
    }
}
