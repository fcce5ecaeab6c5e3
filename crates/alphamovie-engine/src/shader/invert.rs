use super::{fragment_header, ShaderProgram};
use crate::gpu::TextureTarget;

/// `rgb -> 1 - rgb`, alpha preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvertColorsShader;

impl ShaderProgram for InvertColorsShader {
    fn name(&self) -> &'static str {
        "invert_colors"
    }

    fn fragment_source(&self, target: TextureTarget) -> String {
        format!(
            "{}void main() {{\n  vec4 color = texture2D(sTexture, vTextureCoord);\n  color.rgb = 1.0 - color.rgb;\n  gl_FragColor = color;\n}}\n",
            fragment_header(target)
        )
    }

    fn shade(&self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        [1.0 - r, 1.0 - g, 1.0 - b, a]
    }
}
