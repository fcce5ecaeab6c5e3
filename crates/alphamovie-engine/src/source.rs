//! Frame producers.

use crate::bridge::{FrameSignal, Mat4};
use crate::error::EngineError;
use crate::gpu::{GlApi, TextureTarget};

/// Something that fills the renderer's texture with decoded frames.
///
/// The producer side runs on its own thread and announces frames through the
/// [`FrameSignal`] it receives in `attach`. Every method here runs on the render thread
/// with the GL context current.
pub trait FrameSource<G: GlApi> {
    /// Bind to the texture the renderer created. Called once per surface.
    fn attach(
        &mut self,
        gl: &G,
        texture: G::Texture,
        target: TextureTarget,
        signal: FrameSignal,
    ) -> Result<(), EngineError>;

    /// Latch the most recent frame into the attached texture.
    fn update_tex_image(&mut self, gl: &G) -> Result<(), EngineError>;

    /// Texture-coordinate transform for the frame latched by the last `update_tex_image`.
    fn transform_matrix(&self) -> Mat4;

    /// Stop producing and drop the binding to the texture. Called after the renderer's
    /// GPU resources are gone.
    fn release(&mut self);
}
