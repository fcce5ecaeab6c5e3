use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::assets::{read_to_string_result, AssetsRoot};
use crate::color::Rgb;
use crate::error::EngineError;
use crate::gpu::TextureTarget;
use crate::shader::{
    AdvancedChromaKeyShader, BasicChromaKeyShader, InvertColorsShader, PassthroughShader, Shader,
};

/// How strictly to interpret config files.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing optional
///   keys fall back to defaults.
/// - `Strict` is fail-fast: unknown top-level fields and unsupported versions are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// The strategy section of `render.json`, tagged by `kind`.
///
/// ```json
/// { "kind": "advanced_chroma_key", "key_color": "#00ff00",
///   "threshold_sensitivity": 0.1, "smoothing": 0.05 }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShaderConfig {
    #[default]
    Passthrough,
    InvertColors,
    BasicChromaKey {
        #[serde(deserialize_with = "de_key_color")]
        key_color: Rgb,
        accuracy: f32,
    },
    AdvancedChromaKey {
        #[serde(deserialize_with = "de_key_color")]
        key_color: Rgb,
        #[serde(default)]
        threshold_sensitivity: f32,
        #[serde(default)]
        smoothing: f32,
    },
}

impl ShaderConfig {
    /// Build the strategy. Out-of-range numbers are clamped here, never rejected.
    pub fn to_shader(&self) -> Shader {
        match *self {
            ShaderConfig::Passthrough => PassthroughShader.into(),
            ShaderConfig::InvertColors => InvertColorsShader.into(),
            ShaderConfig::BasicChromaKey { key_color, accuracy } => {
                BasicChromaKeyShader::new(key_color, accuracy).into()
            }
            ShaderConfig::AdvancedChromaKey {
                key_color,
                threshold_sensitivity,
                smoothing,
            } => AdvancedChromaKeyShader::new(key_color)
                .with_threshold_sensitivity(threshold_sensitivity)
                .with_smoothing(smoothing)
                .into(),
        }
    }
}

/// `"#RRGGBB"` or `[r, g, b]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyColorRepr {
    Hex(String),
    Bytes([u8; 3]),
}

fn de_key_color<'de, D: Deserializer<'de>>(d: D) -> Result<Rgb, D::Error> {
    match KeyColorRepr::deserialize(d)? {
        KeyColorRepr::Hex(s) => s.parse().map_err(serde::de::Error::custom),
        KeyColorRepr::Bytes([r, g, b]) => Ok(Rgb::new(r, g, b)),
    }
}

/// Typed view of `assets/render.json`.
///
/// Versioning: `version` defaults to 1 when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderJson {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub shader: ShaderConfig,

    #[serde(default)]
    pub texture_target: TextureTarget,
}

/// `RenderJson` that fails on unknown fields, used for `ConfigMode::Strict`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenderJsonStrict {
    #[serde(default = "default_version")]
    version: u32,

    #[serde(default)]
    shader: ShaderConfig,

    #[serde(default)]
    texture_target: TextureTarget,
}

impl From<RenderJsonStrict> for RenderJson {
    fn from(s: RenderJsonStrict) -> Self {
        Self {
            version: s.version,
            shader: s.shader,
            texture_target: s.texture_target,
        }
    }
}

fn default_version() -> u32 {
    1
}

impl Default for RenderJson {
    fn default() -> Self {
        Self {
            version: default_version(),
            shader: ShaderConfig::default(),
            texture_target: TextureTarget::default(),
        }
    }
}

/// What the renderer should start with, plus where it came from.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// `None` when no `render.json` exists and defaults are used.
    pub path: Option<PathBuf>,
    pub shader: ShaderConfig,
    pub texture_target: TextureTarget,
}

impl RenderSettings {
    pub fn shader(&self) -> Shader {
        self.shader.to_shader()
    }
}

pub fn parse_render_json(path: &Path, src: &str, mode: ConfigMode) -> Result<RenderJson, EngineError> {
    let json_err = |e: serde_json::Error| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    };
    let rj: RenderJson = match mode {
        ConfigMode::Lenient => serde_json::from_str::<RenderJson>(src).map_err(json_err)?,
        ConfigMode::Strict => serde_json::from_str::<RenderJsonStrict>(src)
            .map_err(json_err)?
            .into(),
    };

    if mode == ConfigMode::Strict && rj.version != 1 {
        return Err(EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg: format!("unsupported render.json version {} (expected 1)", rj.version),
        });
    }
    Ok(rj)
}

/// Load `render(.<os>).json` from the assets root.
///
/// A missing file is not an error: the renderer then starts with passthrough on a
/// `texture_2d` target.
pub fn load_render_settings(assets: &AssetsRoot, mode: ConfigMode) -> Result<RenderSettings, EngineError> {
    let path = assets.pick_platform_json("render");
    if !path.exists() {
        logi!("CONFIG", "{} not found; using defaults", path.display());
        let d = RenderJson::default();
        return Ok(RenderSettings {
            path: None,
            shader: d.shader,
            texture_target: d.texture_target,
        });
    }

    let src = read_to_string_result(&path)?;
    let rj = parse_render_json(&path, &src, mode)?;
    logi!(
        "CONFIG",
        "loaded {} (v{}, shader={:?}, target={:?})",
        path.display(),
        rj.version,
        rj.shader,
        rj.texture_target
    );
    Ok(RenderSettings {
        path: Some(path),
        shader: rj.shader,
        texture_target: rj.texture_target,
    })
}

/// Discover the assets root from `start_dir` and load render settings.
pub fn load_render_settings_from(
    start_dir: &Path,
    mode: ConfigMode,
) -> Result<(AssetsRoot, RenderSettings), EngineError> {
    let assets = AssetsRoot::discover(start_dir)?;
    let settings = load_render_settings(&assets, mode)?;
    Ok((assets, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testdir::TestDir;
    use crate::shader::ShaderProgram;

    fn parse(src: &str, mode: ConfigMode) -> Result<RenderJson, EngineError> {
        parse_render_json(Path::new("render.json"), src, mode)
    }

    #[test]
    fn empty_object_means_passthrough() {
        let rj = parse("{}", ConfigMode::Strict).unwrap();
        assert_eq!(rj.version, 1);
        assert_eq!(rj.shader, ShaderConfig::Passthrough);
        assert_eq!(rj.texture_target, TextureTarget::Texture2D);
    }

    #[test]
    fn advanced_key_accepts_hex_and_byte_colors() {
        let rj = parse(
            r##"{ "shader": { "kind": "advanced_chroma_key", "key_color": "#00ff00",
                  "threshold_sensitivity": 0.1, "smoothing": 0.05 },
                  "texture_target": "external_oes" }"##,
            ConfigMode::Lenient,
        )
        .unwrap();
        assert_eq!(
            rj.shader,
            ShaderConfig::AdvancedChromaKey {
                key_color: Rgb::GREEN,
                threshold_sensitivity: 0.1,
                smoothing: 0.05,
            }
        );
        assert_eq!(rj.texture_target, TextureTarget::ExternalOes);

        let rj = parse(
            r#"{ "shader": { "kind": "basic_chroma_key", "key_color": [0, 0, 255], "accuracy": 0.2 } }"#,
            ConfigMode::Lenient,
        )
        .unwrap();
        assert_eq!(
            rj.shader,
            ShaderConfig::BasicChromaKey {
                key_color: Rgb::new(0, 0, 255),
                accuracy: 0.2
            }
        );
    }

    #[test]
    fn bad_color_is_a_json_error() {
        let err = parse(
            r#"{ "shader": { "kind": "advanced_chroma_key", "key_color": "green" } }"#,
            ConfigMode::Lenient,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Json { .. }));
    }

    #[test]
    fn strict_rejects_unknown_fields_and_versions() {
        let src = r#"{ "version": 1, "frag": "shaders/default.frag" }"#;
        assert!(parse(src, ConfigMode::Lenient).is_ok());
        assert!(matches!(parse(src, ConfigMode::Strict), Err(EngineError::Json { .. })));

        let src = r#"{ "version": 2 }"#;
        assert!(parse(src, ConfigMode::Lenient).is_ok());
        assert!(matches!(
            parse(src, ConfigMode::Strict),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_clamped_when_built() {
        let cfg = ShaderConfig::AdvancedChromaKey {
            key_color: Rgb::GREEN,
            threshold_sensitivity: 1.5,
            smoothing: -0.2,
        };
        match cfg.to_shader() {
            Shader::AdvancedChromaKey(a) => {
                assert_eq!(a.threshold_sensitivity(), 1.0);
                assert_eq!(a.smoothing(), 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TestDir::new("config-missing");
        let s = load_render_settings(&AssetsRoot::at(dir.path()), ConfigMode::Strict).unwrap();
        assert!(s.path.is_none());
        assert_eq!(s.shader().name(), "passthrough");
    }

    #[test]
    fn loads_from_the_assets_root() {
        let dir = TestDir::new("config-load");
        dir.write(
            "render.json",
            r#"{ "shader": { "kind": "invert_colors" }, "texture_target": "texture_2d" }"#,
        );
        let s = load_render_settings(&AssetsRoot::at(dir.path()), ConfigMode::Strict).unwrap();
        assert_eq!(s.path.as_deref(), Some(dir.path().join("render.json").as_path()));
        assert_eq!(s.shader().name(), "invert_colors");
    }
}
