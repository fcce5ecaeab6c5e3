//! # alphamovie desktop host
//!
//! Opens a transparent window with an OpenGL ES 2.0 context and plays a synthetic
//! green-screen clip through the alpha renderer, so keying strategies can be tried live.
//!
//! ## Mental model
//! - **Renderer** (engine crate): owns the program, the producer texture and the quad. The
//!   host only forwards surface lifecycle calls and draws once per redraw.
//! - **Producer**: `TestPatternSource` paints frames on its own thread and signals each one;
//!   the renderer latches the newest at the start of the next draw.
//! - **Control**: keys and `render.json` edits go through a `RenderHandle`, which never
//!   touches the GPU. Strategy swaps rebuild the program at the next draw.
//!
//! ## Keys
//! - `1` passthrough, `2` invert colors, `3` basic chroma key, `4` advanced chroma key
//! - `Up`/`Down` threshold sensitivity, `Left`/`Right` smoothing (advanced key only)
//! - `R` reload `render.json`, `Esc` quit
//!
//! ## Environment
//! - `ALPHAMOVIE_ASSETS`: assets directory (otherwise searched upward from the cwd)
//! - `ALPHAMOVIE_LOG`: `debug|info|warn|error`
//! - `ALPHAMOVIE_LOG_FILE`: also append log lines to this file
//! - `ALPHAMOVIE_STRICT=1`: strict `render.json` parsing

mod hotreload;
mod pattern;
mod validate;

use std::ffi::CStr;
use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::{anyhow, Context as _};

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;

use raw_window_handle::HasRawWindowHandle;

use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::Window;

use crossbeam_channel::{Receiver, Sender};

use alphamovie_engine::assets::AssetsRoot;
use alphamovie_engine::config::{load_render_settings, ConfigMode, RenderSettings, ShaderConfig};
use alphamovie_engine::{logd, logging, loge, logi, logw};
use alphamovie_engine::{
    AdvancedChromaKeyShader, BasicChromaKeyShader, DrawOutcome, InvertColorsShader, PassthroughShader,
    RenderEvent, RenderHandle, Renderer, Rgb, Shader, ShaderProgram, SkipReason, TextureTarget,
};

use hotreload::HotReload;
use pattern::TestPatternSource;

const WINDOW_W: u32 = 1280;
const WINDOW_H: u32 = 720;
const PATTERN_W: u32 = 320;
const PATTERN_H: u32 = 180;
const PATTERN_FPS: u32 = 30;

const THRESHOLD_STEP: f32 = 0.02;
const SMOOTHING_STEP: f32 = 0.01;

fn main() -> anyhow::Result<()> {
    logging::init(std::env::var_os("ALPHAMOVIE_LOG_FILE").map(PathBuf::from));
    logi!("INIT", "alphamovie {}", env!("CARGO_PKG_VERSION"));

    self_check()?;

    let mode = match std::env::var("ALPHAMOVIE_STRICT").as_deref() {
        Ok("1") | Ok("true") => ConfigMode::Strict,
        _ => ConfigMode::Lenient,
    };

    let cwd = std::env::current_dir().context("current directory")?;
    let assets = match AssetsRoot::discover(&cwd) {
        Ok(a) => {
            logi!("CONFIG", "assets: {}", a.path().display());
            Some(a)
        }
        Err(e) => {
            logw!("CONFIG", "{e}; running with defaults and no hot reload");
            None
        }
    };

    let settings = match &assets {
        Some(a) => {
            validate_on_disk(a);
            load_render_settings(a, mode).context("loading render.json")?
        }
        None => RenderSettings {
            path: None,
            shader: ShaderConfig::default(),
            texture_target: TextureTarget::Texture2D,
        },
    };

    let target = if settings.texture_target == TextureTarget::Texture2D {
        settings.texture_target
    } else {
        logw!(
            "CONFIG",
            "texture_target {:?} needs a platform decoder; the test pattern uses texture_2d",
            settings.texture_target
        );
        TextureTarget::Texture2D
    };

    let hot = match &assets {
        Some(a) => match HotReload::new(a.path()) {
            Ok(h) => {
                logi!("WATCH", "watching {}", a.path().display());
                Some(h)
            }
            Err(e) => {
                logw!("WATCH", "hot reload disabled: {e:#}");
                None
            }
        },
        None => None,
    };

    let event_loop = EventLoop::new().context("creating event loop")?;
    let window_builder = winit::window::WindowBuilder::new()
        .with_title("alphamovie")
        .with_transparent(true)
        .with_inner_size(PhysicalSize::new(WINDOW_W, WINDOW_H));

    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_transparency(true)
        .with_api(glutin::config::Api::GLES2);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            // Prefer a config that can actually show through the window.
            configs
                .reduce(|a, b| {
                    let transparent = |c: &glutin::config::Config| c.supports_transparency().unwrap_or(false);
                    if transparent(&b) && !transparent(&a) {
                        b
                    } else {
                        a
                    }
                })
                .expect("glutin only calls the picker with at least one config")
        })
        .map_err(|e| anyhow!("failed to build display: {e}"))?;
    let window = window.ok_or_else(|| anyhow!("no window created"))?;

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::Gles(Some(Version::new(2, 0))))
        .build(Some(raw_window_handle));

    let not_current: NotCurrentContext = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .context("creating GLES 2.0 context")?
    };

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        non_zero(size.width),
        non_zero(size.height),
    );
    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .context("creating window surface")?
    };
    let gl_context = not_current.make_current(&gl_surface).context("make_current")?;

    if let Err(e) = gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN)) {
        logw!("INIT", "vsync unavailable: {e}");
    }

    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|s: &CStr| gl_display.get_proc_address(s) as *const _)
    };

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let source = TestPatternSource::new(PATTERN_W, PATTERN_H, PATTERN_FPS);
    let renderer = Renderer::new(source, target)
        .with_shader(settings.shader())
        .with_events(events_tx.clone());

    let mut app = App {
        window,
        gl_surface,
        gl_context,
        gl,
        handle: renderer.handle(),
        renderer,
        assets,
        mode,
        settings,
        hot,
        events_tx,
        events_rx,
        last_skip: None,
    };
    app.start()?;

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => target.exit(),

                    WindowEvent::KeyboardInput { event, .. } => {
                        if !event.state.is_pressed() {
                            return;
                        }
                        if let PhysicalKey::Code(code) = event.physical_key {
                            if code == KeyCode::Escape {
                                target.exit();
                            } else {
                                app.on_key(code);
                            }
                        }
                    }

                    WindowEvent::Resized(new_size) => {
                        if let Err(e) = app.resize(new_size) {
                            loge!("SURFACE", "{e}");
                            target.exit();
                        }
                    }

                    WindowEvent::RedrawRequested => {
                        if let Err(e) = app.redraw() {
                            loge!("RENDER", "{e:#}");
                            target.exit();
                        }
                    }

                    _ => {}
                },

                Event::AboutToWait => {
                    app.poll_hot_reload();
                    app.drain_events();
                    app.window.request_redraw();
                }

                Event::LoopExiting => app.shutdown(),

                _ => {}
            }
        })
        .context("event loop failed")?;

    Ok(())
}

struct App {
    window: Window,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    gl: glow::Context,
    renderer: Renderer<glow::Context, TestPatternSource>,
    handle: RenderHandle,
    assets: Option<AssetsRoot>,
    mode: ConfigMode,
    settings: RenderSettings,
    hot: Option<HotReload>,
    events_tx: Sender<RenderEvent>,
    events_rx: Receiver<RenderEvent>,
    /// Last skip reason logged, so a stalled renderer logs once instead of every frame.
    last_skip: Option<SkipReason>,
}

impl App {
    fn start(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.renderer.on_surface_created(&self.gl) {
            if !e.stops_rendering() {
                return Err(anyhow!(e)).context("surface setup");
            }
            logw!("SURFACE", "starting without a program: {e}; press 1-4 to retry");
        }
        let size = self.window.inner_size();
        self.renderer
            .on_surface_changed(&self.gl, size.width as i32, size.height as i32)?;
        let (w, h) = self.renderer.source().size();
        self.renderer.set_content_size(&self.gl, w as i32, h as i32)?;
        self.update_title();
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> anyhow::Result<()> {
        self.gl_surface
            .resize(&self.gl_context, non_zero(size.width), non_zero(size.height));
        self.renderer
            .on_surface_changed(&self.gl, size.width as i32, size.height as i32)?;
        Ok(())
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        match self.renderer.on_draw_frame(&self.gl) {
            Ok(DrawOutcome::Drawn) => self.last_skip = None,
            Ok(DrawOutcome::Skipped(reason)) => {
                if self.last_skip != Some(reason) {
                    logd!("RENDER", "draw skipped: {reason:?}");
                    self.last_skip = Some(reason);
                }
            }
            // Already reported as ProgramFailed; keep the window alive for another swap.
            Err(e) if e.stops_rendering() => {}
            Err(e) => return Err(anyhow!(e)).context("draw"),
        }
        self.gl_surface
            .swap_buffers(&self.gl_context)
            .context("swap_buffers")?;
        Ok(())
    }

    fn on_key(&mut self, code: KeyCode) {
        let key = self.key_color();
        match code {
            KeyCode::Digit1 | KeyCode::Numpad1 => self.handle.set_shader(PassthroughShader),
            KeyCode::Digit2 | KeyCode::Numpad2 => self.handle.set_shader(InvertColorsShader),
            KeyCode::Digit3 | KeyCode::Numpad3 => {
                let accuracy = match self.settings.shader {
                    ShaderConfig::BasicChromaKey { accuracy, .. } => accuracy,
                    _ => 0.3,
                };
                self.handle.set_shader(BasicChromaKeyShader::new(key, accuracy));
            }
            KeyCode::Digit4 | KeyCode::Numpad4 => {
                let (threshold, smoothing) = match self.settings.shader {
                    ShaderConfig::AdvancedChromaKey {
                        threshold_sensitivity,
                        smoothing,
                        ..
                    } => (threshold_sensitivity, smoothing),
                    _ => (0.25, 0.1),
                };
                self.handle.set_shader(
                    AdvancedChromaKeyShader::new(key)
                        .with_threshold_sensitivity(threshold)
                        .with_smoothing(smoothing),
                );
            }
            KeyCode::ArrowUp => self.nudge(THRESHOLD_STEP, 0.0),
            KeyCode::ArrowDown => self.nudge(-THRESHOLD_STEP, 0.0),
            KeyCode::ArrowRight => self.nudge(0.0, SMOOTHING_STEP),
            KeyCode::ArrowLeft => self.nudge(0.0, -SMOOTHING_STEP),
            KeyCode::KeyR => self.reload_config(),
            _ => return,
        }
        self.update_title();
    }

    fn nudge(&mut self, d_threshold: f32, d_smoothing: f32) {
        let changed = self.handle.update_shader(|s| {
            s.as_advanced_mut().map(|a| {
                a.set_threshold_sensitivity(a.threshold_sensitivity() + d_threshold);
                a.set_smoothing(a.smoothing() + d_smoothing);
                (a.threshold_sensitivity(), a.smoothing())
            })
        });
        match changed {
            Some((t, s)) => logi!("SHADER", "threshold={t:.2} smoothing={s:.2}"),
            None => logi!("SHADER", "arrow keys tune the advanced key only (press 4)"),
        }
    }

    fn key_color(&self) -> Rgb {
        match self.settings.shader {
            ShaderConfig::BasicChromaKey { key_color, .. }
            | ShaderConfig::AdvancedChromaKey { key_color, .. } => key_color,
            _ => Rgb::GREEN,
        }
    }

    fn poll_hot_reload(&mut self) {
        let changed = self.hot.as_ref().and_then(|h| h.take_render_change());
        if let Some(path) = changed {
            logi!("WATCH", "{} changed", path.display());
            self.reload_config();
        }
    }

    fn reload_config(&mut self) {
        let Some(assets) = &self.assets else {
            logw!("CONFIG", "no assets directory; nothing to reload");
            return;
        };
        validate_on_disk(assets);
        match load_render_settings(assets, self.mode) {
            Ok(settings) => {
                if settings.texture_target != self.renderer.target() {
                    logw!(
                        "CONFIG",
                        "texture_target {:?} ignored until restart",
                        settings.texture_target
                    );
                }
                self.handle.set_shader(settings.shader());
                if let Some(path) = &settings.path {
                    let _ = self.events_tx.try_send(RenderEvent::ConfigReloaded { path: path.clone() });
                }
                self.settings = settings;
                self.update_title();
            }
            // Keep running with the current strategy.
            Err(e) => loge!("CONFIG", "reload failed: {e}"),
        }
    }

    fn drain_events(&mut self) {
        for ev in self.events_rx.try_iter() {
            match ev {
                RenderEvent::ProgramLinked { shader } => {
                    logi!("RENDER", "now drawing with '{shader}'");
                }
                RenderEvent::ProgramFailed { shader, .. } => {
                    logw!("RENDER", "'{shader}' unavailable; press 1-4 to pick another strategy");
                }
                RenderEvent::ConfigReloaded { path } => {
                    logi!("CONFIG", "applied {}", path.display());
                }
                RenderEvent::SurfaceReleased => {}
            }
        }
    }

    fn update_title(&self) {
        let title = match self.handle.shader() {
            Shader::AdvancedChromaKey(a) => format!(
                "alphamovie: advanced_chroma_key {} t={:.2} s={:.2}",
                a.key_color(),
                a.threshold_sensitivity(),
                a.smoothing()
            ),
            Shader::BasicChromaKey(b) => {
                format!("alphamovie: basic_chroma_key accuracy={:.2}", b.accuracy())
            }
            other => format!("alphamovie: {}", other.name()),
        };
        self.window.set_title(&title);
    }

    fn shutdown(&mut self) {
        self.renderer.on_surface_destroyed(&self.gl);
        logi!("INIT", "{} frames drawn", self.renderer.frames_drawn());
    }
}

/// Run `render.json` through the friendly validator before loading it.
fn validate_on_disk(assets: &AssetsRoot) {
    let path = assets.pick_platform_json("render");
    let Ok(src) = std::fs::read_to_string(&path) else {
        return;
    };
    // Parse errors are left to the loader, which reports them with a location.
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&src) {
        let issues = validate::validate_render_json(&v);
        validate::emit_issues("CONFIG", &issues);
        validate::emit_summary("CONFIG", &path.display().to_string(), &issues);
    }
}

/// CPU mirror of the keying math on known texels; refuses to start if it disagrees.
fn self_check() -> anyhow::Result<()> {
    let adv: Shader = AdvancedChromaKeyShader::new(Rgb::GREEN)
        .with_threshold_sensitivity(0.1)
        .with_smoothing(0.05)
        .into();
    let basic: Shader = BasicChromaKeyShader::new(Rgb::GREEN, 0.1).into();

    let green = [0.0, 1.0, 0.0, 1.0];
    let magenta = [1.0, 0.0, 1.0, 1.0];
    for s in [&adv, &basic] {
        let keyed = s.shade(green)[3];
        let kept = s.shade(magenta)[3];
        if keyed != 0.0 || kept != 1.0 {
            return Err(anyhow!(
                "self-check failed for {}: green alpha {keyed}, magenta alpha {kept}",
                s.name()
            ));
        }
    }
    logi!("INIT", "keying self-check passed");
    Ok(())
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}
