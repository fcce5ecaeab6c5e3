//! State shared between the render thread and everyone else.
//!
//! The producer (decoder callback) and control code (UI, config reload) never touch the
//! GPU. They record intent in two flags under one mutex; the render thread consumes both
//! at the start of its next draw. The render thread keeps the lock while it rebuilds the
//! program and pulls the new frame, so callers may wait out one of those.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::shader::{Shader, ShaderProgram};

pub type Mat4 = [f32; 16];

#[rustfmt::skip]
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug)]
pub(crate) struct Shared {
    /// The strategy the next build (and every draw) uses.
    pub shader: Shader,
    /// A new strategy was installed and the program must be rebuilt before drawing.
    pub pending_shader_swap: bool,
    /// The producer has a new frame ready for `update_tex_image`.
    pub pending_frame_update: bool,
    /// Texture-coordinate transform reported with the last consumed frame.
    pub texture_transform: Mat4,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panic while holding the lock leaves plain flags behind; keep going with them.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable, thread-safe handle for installing and tweaking the active strategy.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    shared: Arc<Mutex<Shared>>,
}

impl RenderHandle {
    pub(crate) fn new(shader: Shader) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                shader,
                pending_shader_swap: false,
                pending_frame_update: false,
                texture_transform: IDENTITY,
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Install `shader` and schedule a program rebuild for the next draw.
    ///
    /// Several calls before a draw collapse into one rebuild using the last strategy.
    pub fn set_shader(&self, shader: impl Into<Shader>) {
        let shader = shader.into();
        logi!("SHADER", "swap requested: {}", shader.name());
        let mut sh = self.lock();
        sh.shader = shader;
        sh.pending_shader_swap = true;
    }

    /// Mutate the installed strategy in place.
    ///
    /// Uniform-only edits (threshold, smoothing, key color of the advanced key) take
    /// effect on the next draw without a rebuild. Edits that change the generated source
    /// schedule a rebuild automatically.
    pub fn update_shader<R>(&self, f: impl FnOnce(&mut Shader) -> R) -> R {
        let mut sh = self.lock();
        let before = sh.shader.clone();
        let out = f(&mut sh.shader);
        if before.requires_relink(&sh.shader) {
            logi!("SHADER", "edit of '{}' changes its source; rebuild scheduled", sh.shader.name());
            sh.pending_shader_swap = true;
        }
        out
    }

    /// Snapshot of the installed strategy.
    pub fn shader(&self) -> Shader {
        self.lock().shader.clone()
    }

    pub fn is_swap_pending(&self) -> bool {
        self.lock().pending_shader_swap
    }

    pub fn is_frame_pending(&self) -> bool {
        self.lock().pending_frame_update
    }

    pub fn texture_transform(&self) -> Mat4 {
        self.lock().texture_transform
    }

    /// A producer-side handle that can only announce frames.
    pub fn frame_signal(&self) -> FrameSignal {
        FrameSignal {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Handed to a frame source; safe to call from any thread.
#[derive(Debug, Clone)]
pub struct FrameSignal {
    shared: Arc<Mutex<Shared>>,
}

impl FrameSignal {
    /// Mark that a new frame is ready. Repeated calls before the next draw coalesce.
    pub fn frame_available(&self) {
        lock(&self.shared).pending_frame_update = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::shader::{AdvancedChromaKeyShader, BasicChromaKeyShader, InvertColorsShader};
    use std::thread;

    #[test]
    fn set_shader_schedules_one_swap() {
        let h = RenderHandle::new(Shader::default());
        assert!(!h.is_swap_pending());
        h.set_shader(InvertColorsShader);
        h.set_shader(BasicChromaKeyShader::new(Rgb::GREEN, 0.2));
        assert!(h.is_swap_pending());
        assert_eq!(h.shader().name(), "basic_chroma_key");
    }

    #[test]
    fn uniform_edits_do_not_schedule_a_swap() {
        let h = RenderHandle::new(AdvancedChromaKeyShader::new(Rgb::GREEN).into());
        let applied = h.update_shader(|s| match s.as_advanced_mut() {
            Some(adv) => {
                adv.set_threshold_sensitivity(0.4);
                adv.set_smoothing(0.1);
                adv.set_key_color(Rgb::new(0, 0, 255));
                true
            }
            None => false,
        });
        assert!(applied);
        assert!(!h.is_swap_pending());
        match h.shader() {
            Shader::AdvancedChromaKey(a) => assert_eq!(a.threshold_sensitivity(), 0.4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn source_changing_edits_schedule_a_swap() {
        let h = RenderHandle::new(Shader::default());
        h.update_shader(|s| *s = InvertColorsShader.into());
        assert!(h.is_swap_pending());
    }

    #[test]
    fn frames_coalesce_across_threads() {
        let h = RenderHandle::new(Shader::default());
        let signal = h.frame_signal();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let s = signal.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.frame_available();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(h.is_frame_pending());
        h.lock().pending_frame_update = false;
        assert!(!h.is_frame_pending());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let h = RenderHandle::new(Shader::default());
        let h2 = h.clone();
        let _ = thread::spawn(move || {
            let _guard = h2.lock();
            panic!("boom");
        })
        .join();
        h.frame_signal().frame_available();
        assert!(h.is_frame_pending());
    }
}
