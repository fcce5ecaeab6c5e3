//! The render engine.
//!
//! `Renderer` owns every GPU object (program, shaders, texture, vertex buffer) and is
//! driven by the surface host from the thread that owns the GL context:
//!
//!   on_surface_created -> on_surface_changed -> on_draw_frame* -> on_surface_destroyed
//!
//! Program state moves `NoProgram -> Linked -> (rebuild) -> Linked -> Destroyed`. A failed
//! build leaves `NoProgram`, and draws are skipped until a later swap builds successfully.
//! A destroyed renderer comes back on the next `on_surface_created`.

use std::marker::PhantomData;
use std::mem;

use crossbeam_channel::Sender;

use crate::bridge::{Mat4, RenderHandle, IDENTITY};
use crate::error::EngineError;
use crate::events::RenderEvent;
use crate::gpu::{check_gl, GlApi, TextureTarget};
use crate::layout::{self, Viewport};
use crate::program::LinkedProgram;
use crate::shader::{Shader, ShaderProgram};
use crate::source::FrameSource;

const FLOAT_SIZE_BYTES: i32 = 4;
const VERTEX_STRIDE_BYTES: i32 = 5 * FLOAT_SIZE_BYTES;
const POSITION_OFFSET_BYTES: i32 = 0;
const UV_OFFSET_BYTES: i32 = 3 * FLOAT_SIZE_BYTES;

/// Full-screen quad as a triangle strip: X, Y, Z, U, V per vertex.
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 20] = [
    -1.0, -1.0, 0.0, 0.0, 0.0,
     1.0, -1.0, 0.0, 1.0, 0.0,
    -1.0,  1.0, 0.0, 0.0, 1.0,
     1.0,  1.0, 0.0, 1.0, 1.0,
];

pub enum ProgramState<G: GlApi> {
    NoProgram,
    Linked(LinkedProgram<G>),
    Destroyed,
}

impl<G: GlApi> ProgramState<G> {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramState::NoProgram => "no_program",
            ProgramState::Linked(_) => "linked",
            ProgramState::Destroyed => "destroyed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The last build failed (or none happened yet).
    NoProgram,
    /// `on_surface_created` has not run.
    NoSurface,
    /// `on_surface_destroyed` ran and no new surface exists.
    Destroyed,
}

pub struct Renderer<G: GlApi, S: FrameSource<G>> {
    handle: RenderHandle,
    target: TextureTarget,
    source: S,
    /// Render-thread copy of the installed strategy, refreshed at the start of each draw.
    shader: Shader,
    program: ProgramState<G>,
    texture: Option<G::Texture>,
    vertex_buffer: Option<G::Buffer>,
    surface_size: Option<(i32, i32)>,
    content_size: Option<(i32, i32)>,
    viewport: Option<Viewport>,
    events: Option<Sender<RenderEvent>>,
    builds: u64,
    frames_drawn: u64,
    // GL objects belong to the context's thread.
    _not_send: PhantomData<*const ()>,
}

impl<G: GlApi, S: FrameSource<G>> Renderer<G, S> {
    pub fn new(source: S, target: TextureTarget) -> Self {
        Self {
            handle: RenderHandle::new(Shader::default()),
            target,
            source,
            shader: Shader::default(),
            program: ProgramState::NoProgram,
            texture: None,
            vertex_buffer: None,
            surface_size: None,
            content_size: None,
            viewport: None,
            events: None,
            builds: 0,
            frames_drawn: 0,
            _not_send: PhantomData,
        }
    }

    /// Start with `shader` instead of passthrough. It is built by `on_surface_created`.
    pub fn with_shader(self, shader: impl Into<Shader>) -> Self {
        let shader = shader.into();
        self.handle.lock().shader = shader.clone();
        Self { shader, ..self }
    }

    pub fn with_events(mut self, tx: Sender<RenderEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Thread-safe handle for swapping or tweaking the strategy from any thread.
    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn program_state(&self) -> &ProgramState<G> {
        &self.program
    }

    pub fn is_program_linked(&self) -> bool {
        matches!(self.program, ProgramState::Linked(_))
    }

    /// The strategy the current program was built from (or failed to build from).
    pub fn active_shader(&self) -> &Shader {
        &self.shader
    }

    pub fn texture(&self) -> Option<G::Texture> {
        self.texture
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Successful program builds since construction.
    pub fn build_count(&self) -> u64 {
        self.builds
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Build the program for the installed strategy and create the producer texture and
    /// vertex buffer, then hand the texture to the frame source.
    ///
    /// Texture and buffer are created even when the build fails, so a later swap can
    /// render without a new surface. The build error is still returned.
    pub fn on_surface_created(&mut self, gl: &G) -> Result<(), EngineError> {
        logi!("SURFACE", "created (target={:?}, state={})", self.target, self.program.as_str());

        if self.texture.is_some() || self.vertex_buffer.is_some() {
            logw!("SURFACE", "surface created twice without teardown; releasing old resources");
            self.release_gpu_objects(gl);
        }
        if matches!(self.program, ProgramState::Destroyed) {
            self.program = ProgramState::NoProgram;
        }

        {
            let mut sh = self.handle.lock();
            sh.pending_shader_swap = false;
            self.shader.clone_from(&sh.shader);
        }
        let built = self.rebuild_program(gl);

        self.prepare_surface(gl)?;
        built
    }

    pub fn on_surface_changed(&mut self, gl: &G, width: i32, height: i32) -> Result<(), EngineError> {
        logi!("SURFACE", "changed {width}x{height}");
        self.surface_size = Some((width, height));
        self.apply_layout(gl)
    }

    /// Size of the decoded video. With a known size the viewport covers the surface while
    /// keeping the video's aspect ratio.
    pub fn set_content_size(&mut self, gl: &G, width: i32, height: i32) -> Result<(), EngineError> {
        self.content_size = Some((width, height));
        if self.surface_size.is_some() {
            self.apply_layout(gl)?;
        }
        Ok(())
    }

    /// Use an explicit viewport until the next surface change.
    pub fn set_viewport(&mut self, gl: &G, vp: Viewport) -> Result<(), EngineError> {
        gl.viewport(vp.x, vp.y, vp.width, vp.height);
        check_gl(gl, "glViewport")?;
        self.viewport = Some(vp);
        Ok(())
    }

    /// Render one frame.
    ///
    /// Pending swap and pending frame are consumed under the shared lock first. A build
    /// failure during the swap, or a driver error while drawing, is returned from this
    /// call; later draws report `Skipped(NoProgram)` until another swap succeeds.
    pub fn on_draw_frame(&mut self, gl: &G) -> Result<DrawOutcome, EngineError> {
        if matches!(self.program, ProgramState::Destroyed) {
            return Ok(DrawOutcome::Skipped(SkipReason::Destroyed));
        }
        let (Some(texture), Some(vertex_buffer)) = (self.texture, self.vertex_buffer) else {
            return Ok(DrawOutcome::Skipped(SkipReason::NoSurface));
        };

        let handle = self.handle.clone();
        let (rebuilt, st_matrix) = {
            let mut sh = handle.lock();
            self.shader.clone_from(&sh.shader);

            let rebuilt = if sh.pending_shader_swap {
                sh.pending_shader_swap = false;
                Some(self.rebuild_program(gl))
            } else {
                None
            };

            if sh.pending_frame_update {
                sh.pending_frame_update = false;
                self.source.update_tex_image(gl)?;
                sh.texture_transform = self.source.transform_matrix();
            }

            (rebuilt, sh.texture_transform)
        };
        if let Some(Err(e)) = rebuilt {
            return Err(e);
        }

        let ProgramState::Linked(program) = &self.program else {
            return Ok(DrawOutcome::Skipped(SkipReason::NoProgram));
        };

        let drawn = draw_quad(
            gl,
            program,
            &self.shader,
            QuadBinding {
                target: self.target,
                texture,
                vertex_buffer,
                st_matrix: &st_matrix,
            },
        );
        if let Err(e) = drawn {
            self.abandon_program(gl, &e);
            return Err(e);
        }
        self.frames_drawn += 1;
        Ok(DrawOutcome::Drawn)
    }

    /// Delete every GPU object, then release the frame source. No draw happens afterwards
    /// until the next `on_surface_created`.
    pub fn on_surface_destroyed(&mut self, gl: &G) {
        logi!("SURFACE", "destroyed after {} frames", self.frames_drawn);
        self.release_gpu_objects(gl);
        self.program = ProgramState::Destroyed;
        self.source.release();
        self.handle.lock().pending_frame_update = false;
        self.emit(RenderEvent::SurfaceReleased);
    }

    fn rebuild_program(&mut self, gl: &G) -> Result<(), EngineError> {
        if let ProgramState::Linked(old) = mem::replace(&mut self.program, ProgramState::NoProgram) {
            old.delete(gl);
        }

        match LinkedProgram::build(gl, &self.shader, self.target) {
            Ok(p) => {
                self.builds += 1;
                logi!(
                    "PROGRAM",
                    "built '{}' ({} strategy uniforms, build #{})",
                    self.shader.name(),
                    p.uniforms.len(),
                    self.builds
                );
                self.program = ProgramState::Linked(p);
                self.emit(RenderEvent::ProgramLinked { shader: self.shader.name() });
                Ok(())
            }
            Err(e) => {
                loge!("PROGRAM", "could not build '{}': {e}", self.shader.name());
                self.emit(RenderEvent::ProgramFailed {
                    shader: self.shader.name(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// A driver error mid-draw is as fatal as a failed build: drop the program so no
    /// draw happens until the next swap rebuilds one.
    fn abandon_program(&mut self, gl: &G, e: &EngineError) {
        loge!("RENDER", "draw failed with '{}': {e}", self.shader.name());
        if let ProgramState::Linked(p) = mem::replace(&mut self.program, ProgramState::NoProgram) {
            p.delete(gl);
        }
        self.emit(RenderEvent::ProgramFailed {
            shader: self.shader.name(),
            error: e.to_string(),
        });
    }

    fn prepare_surface(&mut self, gl: &G) -> Result<(), EngineError> {
        let texture = gl
            .create_texture()
            .map_err(|e| EngineError::GlCreate(format!("texture: {e}")))?;
        self.texture = Some(texture);

        let target = self.target.gl_enum();
        gl.bind_texture(target, Some(texture));
        check_gl(gl, "glBindTexture")?;
        gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        check_gl(gl, "glTexParameter")?;

        let buffer = gl
            .create_buffer()
            .map_err(|e| EngineError::GlCreate(format!("vertex buffer: {e}")))?;
        self.vertex_buffer = Some(buffer);
        gl.bind_array_buffer(Some(buffer));
        gl.array_buffer_data_f32(&QUAD_VERTICES);
        gl.bind_array_buffer(None);
        check_gl(gl, "glBufferData")?;

        self.source.attach(gl, texture, self.target, self.handle.frame_signal())?;

        // Frames announced before the source was attached refer to no texture.
        let mut sh = self.handle.lock();
        sh.pending_frame_update = false;
        sh.texture_transform = IDENTITY;
        Ok(())
    }

    fn apply_layout(&mut self, gl: &G) -> Result<(), EngineError> {
        let Some((sw, sh)) = self.surface_size else {
            return Ok(());
        };
        let vp = match self.content_size {
            Some((vw, vh)) => layout::cover(sw, sh, vw, vh),
            None => Viewport::full(sw, sh),
        };
        self.set_viewport(gl, vp)
    }

    fn release_gpu_objects(&mut self, gl: &G) {
        if let ProgramState::Linked(p) = mem::replace(&mut self.program, ProgramState::NoProgram) {
            p.delete(gl);
        }
        if let Some(t) = self.texture.take() {
            gl.delete_texture(t);
        }
        if let Some(b) = self.vertex_buffer.take() {
            gl.delete_buffer(b);
        }
    }

    fn emit(&self, ev: RenderEvent) {
        if let Some(tx) = &self.events {
            if tx.try_send(ev).is_err() {
                logd!("RENDER", "event dropped (receiver full or gone)");
            }
        }
    }
}

struct QuadBinding<'a, G: GlApi> {
    target: TextureTarget,
    texture: G::Texture,
    vertex_buffer: G::Buffer,
    st_matrix: &'a Mat4,
}

fn draw_quad<G: GlApi>(
    gl: &G,
    program: &LinkedProgram<G>,
    shader: &Shader,
    quad: QuadBinding<'_, G>,
) -> Result<(), EngineError> {
    gl.clear_color(0.0, 0.0, 0.0, 0.0);
    gl.clear(glow::DEPTH_BUFFER_BIT | glow::COLOR_BUFFER_BIT);
    gl.enable(glow::BLEND);
    gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);

    gl.use_program(Some(program.program));
    check_gl(gl, "glUseProgram")?;

    gl.active_texture(glow::TEXTURE0);
    gl.bind_texture(quad.target.gl_enum(), Some(quad.texture));

    gl.bind_array_buffer(Some(quad.vertex_buffer));
    gl.vertex_attrib_pointer_f32(program.a_position, 3, VERTEX_STRIDE_BYTES, POSITION_OFFSET_BYTES);
    check_gl(gl, "glVertexAttribPointer aPosition")?;
    gl.enable_vertex_attrib_array(program.a_position);
    check_gl(gl, "glEnableVertexAttribArray aPosition")?;

    gl.vertex_attrib_pointer_f32(program.a_texture_coord, 2, VERTEX_STRIDE_BYTES, UV_OFFSET_BYTES);
    check_gl(gl, "glVertexAttribPointer aTextureCoord")?;
    gl.enable_vertex_attrib_array(program.a_texture_coord);
    check_gl(gl, "glEnableVertexAttribArray aTextureCoord")?;

    gl.uniform_matrix_4_f32(&program.u_mvp_matrix, &IDENTITY);
    gl.uniform_matrix_4_f32(&program.u_st_matrix, quad.st_matrix);
    check_gl(gl, "glUniformMatrix4fv")?;

    shader.apply_uniforms(gl, &program.uniforms)?;

    gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
    check_gl(gl, "glDrawArrays")?;
    gl.finish();
    Ok(())
}
