use std::path::PathBuf;

/// Lifecycle notifications from the renderer, for hosts and UI clients.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A program for `shader` was built and is now used by every draw.
    ProgramLinked { shader: &'static str },

    /// Building `shader` failed; draws are skipped until a later build succeeds.
    ProgramFailed { shader: &'static str, error: String },

    /// `render.json` was reloaded and applied.
    ConfigReloaded { path: PathBuf },

    /// The surface and every GPU resource tied to it were released.
    SurfaceReleased,
}
