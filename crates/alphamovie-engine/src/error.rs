use std::{fmt, path::PathBuf};

use crate::gpu::ShaderStage;

#[derive(Debug)]
pub enum EngineError {
    /// The `assets/` folder could not be found.
    AssetsNotFound { start_dir: PathBuf },
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse or deserialize error for a file.
    Json { path: PathBuf, source: serde_json::Error },
    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// Shader compile failed; `log` is the driver info log.
    ShaderCompile { stage: ShaderStage, log: String },
    /// Program link failed; carries the driver info log.
    Link(String),
    /// A vertex attribute the renderer needs is not active in the linked program.
    MissingAttribute(&'static str),
    /// A uniform the renderer or the active strategy needs is not active in the program.
    MissingUniform(&'static str),
    /// `glGetError` reported something after `op`.
    Gl { op: String, code: u32 },
    /// The driver refused to create an object (shader, program, texture, buffer).
    GlCreate(String),

    /// The frame producer failed.
    Source(String),
}

impl EngineError {
    /// Errors that leave the renderer without a program: build failures and driver
    /// errors alike. Rendering resumes only after a later successful rebuild.
    pub fn stops_rendering(&self) -> bool {
        matches!(
            self,
            EngineError::ShaderCompile { .. }
                | EngineError::Link(_)
                | EngineError::MissingAttribute(_)
                | EngineError::MissingUniform(_)
                | EngineError::GlCreate(_)
                | EngineError::Gl { .. }
        )
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AssetsNotFound { start_dir } => {
                write!(f, "Could not locate assets/ starting from {}", start_dir.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
            EngineError::ShaderCompile { stage, log } => {
                write!(f, "Could not compile {} shader:\n{}", stage.as_str(), log)
            }
            EngineError::Link(log) => write!(f, "Could not link program:\n{log}"),
            EngineError::MissingAttribute(name) => {
                write!(f, "Could not get attrib location for {name}")
            }
            EngineError::MissingUniform(name) => {
                write!(f, "Could not get uniform location for {name}")
            }
            EngineError::Gl { op, code } => {
                write!(f, "{op}: glError 0x{code:04x} ({})", crate::gpu::gl_error_name(*code))
            }
            EngineError::GlCreate(msg) => write!(f, "GL object creation failed: {msg}"),
            EngineError::Source(msg) => write!(f, "frame source error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_error_display_names_the_code() {
        let e = EngineError::Gl { op: "glUseProgram".into(), code: 0x0502 };
        assert_eq!(e.to_string(), "glUseProgram: glError 0x0502 (GL_INVALID_OPERATION)");
    }

    #[test]
    fn build_and_driver_errors_both_stop_rendering() {
        assert!(EngineError::Link("boom".into()).stops_rendering());
        assert!(EngineError::MissingUniform("uSmoothing").stops_rendering());
        assert!(EngineError::Gl { op: "glDrawArrays".into(), code: 0x0500 }.stops_rendering());
        assert!(!EngineError::Source("decoder stalled".into()).stops_rendering());
    }
}
