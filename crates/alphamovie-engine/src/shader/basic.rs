use super::{fragment_header, ShaderProgram};
use crate::color::{clamp_unit, Rgb};
use crate::gpu::TextureTarget;

/// Hard chroma key: a texel within `accuracy` of the key on all three channels becomes
/// fully transparent, everything else fully opaque.
///
/// The key and tolerance are baked into the fragment source as float literals when the
/// value is constructed, so there are no uniforms and no setters. To change the key,
/// build a new `BasicChromaKeyShader` and hand it to the renderer; that swap relinks.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicChromaKeyShader {
    key: [f32; 3],
    accuracy: f32,
    body: String,
}

impl BasicChromaKeyShader {
    pub fn new(key_color: Rgb, accuracy: f32) -> Self {
        let [r, g, b] = key_color.to_unit();
        Self::from_unit(r, g, b, accuracy)
    }

    /// Key channels in `[0, 1]`. All four inputs are clamped to `[0, 1]` (NaN to 0) so
    /// the substituted literals are always valid GLSL.
    pub fn from_unit(red: f32, green: f32, blue: f32, accuracy: f32) -> Self {
        let key = [clamp_unit(red), clamp_unit(green), clamp_unit(blue)];
        let accuracy = clamp_unit(accuracy);
        let body = render_body(key, accuracy);
        Self { key, accuracy, body }
    }

    pub fn key(&self) -> [f32; 3] {
        self.key
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    fn is_keyed(&self, texel: [f32; 4]) -> bool {
        (0..3).all(|i| (texel[i] - self.key[i]).abs() <= self.accuracy)
    }
}

fn render_body(key: [f32; 3], accuracy: f32) -> String {
    format!(
        "void main() {{
  vec4 color = texture2D(sTexture, vTextureCoord);
  float red = {:.6};
  float green = {:.6};
  float blue = {:.6};
  float accuracy = {:.6};
  if (abs(color.r - red) <= accuracy && abs(color.g - green) <= accuracy && abs(color.b - blue) <= accuracy) {{
      gl_FragColor = vec4(color.r, color.g, color.b, 0.0);
  }} else {{
      gl_FragColor = vec4(color.r, color.g, color.b, 1.0);
  }}
}}
",
        key[0], key[1], key[2], accuracy
    )
}

impl ShaderProgram for BasicChromaKeyShader {
    fn name(&self) -> &'static str {
        "basic_chroma_key"
    }

    fn fragment_source(&self, target: TextureTarget) -> String {
        format!("{}{}", fragment_header(target), self.body)
    }

    fn shade(&self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        let alpha = if self.is_keyed([r, g, b, a]) { 0.0 } else { 1.0 };
        [r, g, b, alpha]
    }
}
