//! Color math shared by the keying strategies.
//!
//! Everything here mirrors what the fragment shaders compute on the GPU, so the CPU
//! reference shading in `shader` and the GLSL stay in lockstep.

use std::fmt;
use std::str::FromStr;

pub const COLOR_MAX_VALUE: f32 = 255.0;

/// Luma weights and chroma scales used by the YCrCb key.
pub const LUMA_R: f32 = 0.2989;
pub const LUMA_G: f32 = 0.5866;
pub const LUMA_B: f32 = 0.1145;
pub const CR_SCALE: f32 = 0.7132;
pub const CB_SCALE: f32 = 0.5647;

/// 8-bit RGB color, as handed out by color pickers and `#RRGGBB` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Android-style packed `0xAARRGGBB`; alpha is dropped.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xff) as u8,
            g: ((argb >> 8) & 0xff) as u8,
            b: (argb & 0xff) as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        0xff00_0000 | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Channels normalized to `[0, 1]`.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.r as f32 / COLOR_MAX_VALUE,
            self.g as f32 / COLOR_MAX_VALUE,
            self.b as f32 / COLOR_MAX_VALUE,
        ]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}' (expected #RRGGBB)", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        let v = u32::from_str_radix(hex, 16).map_err(|_| ParseColorError(s.to_string()))?;
        Ok(Rgb::from_argb(v))
    }
}

/// Luma plus the two color-difference channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YCrCb {
    pub y: f32,
    pub cr: f32,
    pub cb: f32,
}

impl YCrCb {
    /// Converts normalized RGB.
    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        let y = LUMA_R * r + LUMA_G * g + LUMA_B * b;
        Self {
            y,
            cr: CR_SCALE * (r - y),
            cb: CB_SCALE * (b - y),
        }
    }

    pub fn from_color(c: Rgb) -> Self {
        let [r, g, b] = c.to_unit();
        Self::from_rgb(r, g, b)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.y, self.cr, self.cb]
    }

    /// Euclidean distance in the (Cr, Cb) plane. Luma does not participate.
    pub fn chroma_distance(self, other: YCrCb) -> f32 {
        let dcr = self.cr - other.cr;
        let dcb = self.cb - other.cb;
        (dcr * dcr + dcb * dcb).sqrt()
    }
}

/// GLSL `smoothstep`: 0 at or below `edge0`, 1 at or above `edge1`, cubic Hermite between.
///
/// With `edge0 == edge1` this degrades to a hard step at the edge.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if x <= edge0 {
        return 0.0;
    }
    if x >= edge1 {
        return 1.0;
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Clamp to `[0, 1]`; NaN maps to 0.
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
