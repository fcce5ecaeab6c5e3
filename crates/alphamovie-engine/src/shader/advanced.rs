use super::{fragment_header, ShaderProgram, UniformValue};
use crate::color::{clamp_unit, smoothstep, Rgb, YCrCb};
use crate::gpu::TextureTarget;

pub const U_THRESHOLD_SENSITIVITY: &str = "uThresholdSensitivity";
pub const U_SMOOTHING: &str = "uSmoothing";
pub const U_MASK_YCRCB: &str = "uMaskYCrCb";

const UNIFORMS: &[&str] = &[U_THRESHOLD_SENSITIVITY, U_SMOOTHING, U_MASK_YCRCB];

const BODY: &str = "uniform mediump float uThresholdSensitivity;
uniform mediump float uSmoothing;
uniform vec3 uMaskYCrCb;

void main() {
  vec4 textureColor = texture2D(sTexture, vTextureCoord);

  float Y = 0.2989 * textureColor.r + 0.5866 * textureColor.g + 0.1145 * textureColor.b;
  float Cr = 0.7132 * (textureColor.r - Y);
  float Cb = 0.5647 * (textureColor.b - Y);

  float d = distance(vec2(Cr, Cb), vec2(uMaskYCrCb.g, uMaskYCrCb.b));
  float blendValue = uSmoothing > 0.0
      ? smoothstep(uThresholdSensitivity, uThresholdSensitivity + uSmoothing, d)
      : float(d > uThresholdSensitivity);
  gl_FragColor = vec4(textureColor.rgb, textureColor.a * blendValue);
}
";

/// Soft chroma key in YCrCb space.
///
/// Distance is measured in the (Cr, Cb) plane only, so the same hue at different
/// brightness keys alike. Alpha ramps from 0 at `threshold_sensitivity` to 1 at
/// `threshold_sensitivity + smoothing`. Parameters live in uniforms, so changing them
/// never relinks.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedChromaKeyShader {
    key_color: Rgb,
    threshold_sensitivity: f32,
    smoothing: f32,
}

impl AdvancedChromaKeyShader {
    pub fn new(key_color: Rgb) -> Self {
        Self {
            key_color,
            threshold_sensitivity: 0.0,
            smoothing: 0.0,
        }
    }

    pub fn with_threshold_sensitivity(mut self, v: f32) -> Self {
        self.set_threshold_sensitivity(v);
        self
    }

    pub fn with_smoothing(mut self, v: f32) -> Self {
        self.set_smoothing(v);
        self
    }

    pub fn key_color(&self) -> Rgb {
        self.key_color
    }

    pub fn set_key_color(&mut self, c: Rgb) {
        self.key_color = c;
    }

    pub fn threshold_sensitivity(&self) -> f32 {
        self.threshold_sensitivity
    }

    /// Clamped to `[0, 1]`; never rejected.
    pub fn set_threshold_sensitivity(&mut self, v: f32) {
        self.threshold_sensitivity = clamp_unit(v);
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Clamped to `[0, 1]`; never rejected.
    pub fn set_smoothing(&mut self, v: f32) {
        self.smoothing = clamp_unit(v);
    }

    /// Key color in YCrCb. Derived on demand from `key_color`.
    pub fn key_ycrcb(&self) -> YCrCb {
        YCrCb::from_color(self.key_color)
    }

    /// Chroma distance between a texel (normalized RGB) and the key.
    pub fn chroma_distance(&self, r: f32, g: f32, b: f32) -> f32 {
        YCrCb::from_rgb(r, g, b).chroma_distance(self.key_ycrcb())
    }

    /// Alpha multiplier for a texel at chroma distance `d`.
    pub fn blend_value(&self, d: f32) -> f32 {
        if self.smoothing > 0.0 {
            smoothstep(self.threshold_sensitivity, self.threshold_sensitivity + self.smoothing, d)
        } else if d > self.threshold_sensitivity {
            1.0
        } else {
            0.0
        }
    }
}

impl ShaderProgram for AdvancedChromaKeyShader {
    fn name(&self) -> &'static str {
        "advanced_chroma_key"
    }

    fn fragment_source(&self, target: TextureTarget) -> String {
        format!("{}{}", fragment_header(target), BODY)
    }

    fn uniform_names(&self) -> &'static [&'static str] {
        UNIFORMS
    }

    fn uniform_values(&self) -> Vec<(&'static str, UniformValue)> {
        vec![
            (U_THRESHOLD_SENSITIVITY, UniformValue::Float(self.threshold_sensitivity)),
            (U_SMOOTHING, UniformValue::Float(self.smoothing)),
            (U_MASK_YCRCB, UniformValue::Vec3(self.key_ycrcb().to_array())),
        ]
    }

    fn shade(&self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        [r, g, b, a * self.blend_value(self.chroma_distance(r, g, b))]
    }
}
