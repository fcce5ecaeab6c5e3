//! Alpha-channel video rendering on OpenGL ES 2.0.
//!
//! Frames from a producer (platform decoder, test pattern) land in one texture and are
//! drawn as a full-screen quad through a swappable fragment strategy: passthrough, color
//! inversion, or one of two chroma keys that turn a background color transparent.

#[macro_use]
pub mod logging;

pub mod assets;
pub mod bridge;
pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod gpu;
pub mod layout;
pub mod program;
pub mod renderer;
pub mod shader;
pub mod source;

#[cfg(test)]
mod fake_gl;

pub use bridge::{FrameSignal, Mat4, RenderHandle, IDENTITY};
pub use color::Rgb;
pub use error::EngineError;
pub use events::RenderEvent;
pub use gpu::{GlApi, TextureTarget};
pub use renderer::{DrawOutcome, Renderer, SkipReason};
pub use shader::{
    AdvancedChromaKeyShader, BasicChromaKeyShader, InvertColorsShader, PassthroughShader, Shader,
    ShaderProgram,
};
pub use source::FrameSource;
