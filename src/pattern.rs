//! Synthetic green-screen producer.
//!
//! A worker thread paints RGBA frames (a moving disc with a soft edge over pure green, and
//! a gray ramp along the bottom) and announces each one through the renderer's
//! `FrameSignal`. The render thread uploads only the newest frame when it draws.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TrySendError};

use alphamovie_engine::gpu::check_gl;
use alphamovie_engine::{logd, logi, logw};
use alphamovie_engine::{EngineError, FrameSignal, FrameSource, GlApi, Mat4, TextureTarget};

/// Rows arrive top-first while GL samples bottom-up: `v' = 1 - v`.
#[rustfmt::skip]
pub const FLIP_Y: Mat4 = [
    1.0,  0.0, 0.0, 0.0,
    0.0, -1.0, 0.0, 0.0,
    0.0,  0.0, 1.0, 0.0,
    0.0,  1.0, 0.0, 1.0,
];

const BACKGROUND: [u8; 3] = [0, 255, 0];
const DISC: [u8; 3] = [230, 60, 160];
const EDGE_PX: f32 = 4.0;

struct Frame {
    index: u64,
    pixels: Vec<u8>,
}

pub struct TestPatternSource {
    width: u32,
    height: u32,
    fps: u32,
    texture: Option<glow::NativeTexture>,
    target: TextureTarget,
    rx: Option<Receiver<Frame>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    last_index: Option<u64>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps: fps.max(1),
            texture: None,
            target: TextureTarget::Texture2D,
            rx: None,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            last_index: None,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stop_worker(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.rx = None;
        if let Some(w) = self.worker.take() {
            if w.join().is_err() {
                logw!("SOURCE", "pattern worker panicked");
            }
        }
    }
}

impl FrameSource<glow::Context> for TestPatternSource {
    fn attach(
        &mut self,
        _gl: &glow::Context,
        texture: glow::NativeTexture,
        target: TextureTarget,
        signal: FrameSignal,
    ) -> Result<(), EngineError> {
        if target != TextureTarget::Texture2D {
            return Err(EngineError::Source(format!(
                "test pattern uploads pixels and needs a texture_2d target (got {target:?})"
            )));
        }
        self.stop_worker();

        let (tx, rx) = bounded::<Frame>(2);
        let stop = Arc::new(AtomicBool::new(false));
        let (w, h, fps) = (self.width, self.height, self.fps);
        let worker_stop = Arc::clone(&stop);

        let worker = thread::Builder::new()
            .name("pattern".into())
            .spawn(move || {
                let interval = Duration::from_secs_f64(1.0 / fps as f64);
                let start = Instant::now();
                let mut index = 0u64;
                while !worker_stop.load(Ordering::Relaxed) {
                    let t = start.elapsed().as_secs_f32();
                    let frame = Frame {
                        index,
                        pixels: render_pattern(w, h, t),
                    };
                    match tx.try_send(frame) {
                        Ok(()) => signal.frame_available(),
                        // The renderer is behind; it will pick up a newer frame.
                        Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                    index += 1;
                    thread::sleep(interval);
                }
            })
            .map_err(|e| EngineError::Source(format!("spawn pattern worker: {e}")))?;

        logi!("SOURCE", "test pattern {w}x{h} @ {fps} fps attached");
        self.texture = Some(texture);
        self.target = target;
        self.rx = Some(rx);
        self.stop = stop;
        self.worker = Some(worker);
        Ok(())
    }

    fn update_tex_image(&mut self, gl: &glow::Context) -> Result<(), EngineError> {
        let (Some(rx), Some(texture)) = (&self.rx, self.texture) else {
            return Err(EngineError::Source("frame update before attach".into()));
        };
        let Some(frame) = rx.try_iter().last() else {
            return Ok(());
        };

        if let Some(prev) = self.last_index {
            if frame.index > prev + 1 {
                logd!("SOURCE", "skipped {} frames", frame.index - prev - 1);
            }
        }
        self.last_index = Some(frame.index);

        let target = self.target.gl_enum();
        gl.bind_texture(target, Some(texture));
        gl.tex_image_rgba8(target, self.width as i32, self.height as i32, &frame.pixels);
        check_gl(gl, "glTexImage2D")
    }

    fn transform_matrix(&self) -> Mat4 {
        FLIP_Y
    }

    fn release(&mut self) {
        self.stop_worker();
        self.texture = None;
        logi!("SOURCE", "test pattern released");
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// One RGBA frame at time `t` seconds.
pub fn render_pattern(width: u32, height: u32, t: f32) -> Vec<u8> {
    let (w, h) = (width as f32, height as f32);
    let cx = w * (0.5 + 0.3 * t.sin());
    let cy = h * 0.45;
    let radius = h * 0.25;
    let ramp_top = (h * 0.85) as u32;

    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let rgb = if y >= ramp_top {
                let g = (x as f32 / (w - 1.0).max(1.0) * 255.0) as u8;
                [g, g, g]
            } else {
                let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
                let k = ((d - radius) / EDGE_PX).clamp(0.0, 1.0);
                mix(DISC, BACKGROUND, k)
            };
            out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }
    out
}

fn mix(a: [u8; 3], b: [u8; 3], k: f32) -> [u8; 3] {
    let m = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * k).round() as u8;
    [m(a[0], b[0]), m(a[1], b[1]), m(a[2], b[2])]
}
