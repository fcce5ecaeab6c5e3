//! GPU program construction for one shader strategy.

use crate::error::EngineError;
use crate::gpu::{check_gl, GlApi, ShaderStage, TextureTarget};
use crate::shader::{
    ShaderProgram, UniformHandles, A_POSITION, A_TEXTURE_COORD, U_MVP_MATRIX, U_ST_MATRIX,
};

/// A linked program together with every location resolved against it.
///
/// Locations never outlive their program: both are created by [`LinkedProgram::build`]
/// and released together by [`LinkedProgram::delete`].
pub struct LinkedProgram<G: GlApi> {
    pub program: G::Program,
    vertex_shader: G::Shader,
    fragment_shader: G::Shader,
    pub a_position: u32,
    pub a_texture_coord: u32,
    pub u_mvp_matrix: G::UniformLocation,
    pub u_st_matrix: G::UniformLocation,
    pub uniforms: UniformHandles<G::UniformLocation>,
}

impl<G: GlApi> LinkedProgram<G> {
    /// Compile, link and resolve. Nothing leaks on failure: any shader or program created
    /// along the way is deleted before the error is returned.
    pub fn build<S: ShaderProgram>(gl: &G, shader: &S, target: TextureTarget) -> Result<Self, EngineError> {
        let vs = compile_shader(gl, ShaderStage::Vertex, shader.vertex_source())?;
        let fs = match compile_shader(gl, ShaderStage::Fragment, &shader.fragment_source(target)) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let program = match link_program(gl, vs, fs) {
            Ok(p) => p,
            Err(e) => {
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(e);
            }
        };

        match resolve(gl, program, shader) {
            Ok((a_position, a_texture_coord, u_mvp_matrix, u_st_matrix, uniforms)) => Ok(Self {
                program,
                vertex_shader: vs,
                fragment_shader: fs,
                a_position,
                a_texture_coord,
                u_mvp_matrix,
                u_st_matrix,
                uniforms,
            }),
            Err(e) => {
                gl.delete_program(program);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                Err(e)
            }
        }
    }

    pub fn delete(self, gl: &G) {
        gl.delete_program(self.program);
        gl.delete_shader(self.vertex_shader);
        gl.delete_shader(self.fragment_shader);
    }
}

type Resolved<G> = (
    u32,
    u32,
    <G as GlApi>::UniformLocation,
    <G as GlApi>::UniformLocation,
    UniformHandles<<G as GlApi>::UniformLocation>,
);

fn resolve<G: GlApi, S: ShaderProgram>(gl: &G, program: G::Program, shader: &S) -> Result<Resolved<G>, EngineError> {
    let a_position = attrib_location(gl, program, A_POSITION)?;
    let a_texture_coord = attrib_location(gl, program, A_TEXTURE_COORD)?;
    let u_mvp_matrix = uniform_location(gl, program, U_MVP_MATRIX)?;
    let u_st_matrix = uniform_location(gl, program, U_ST_MATRIX)?;
    let uniforms = shader.resolve_uniforms(gl, program)?;
    Ok((a_position, a_texture_coord, u_mvp_matrix, u_st_matrix, uniforms))
}

fn compile_shader<G: GlApi>(gl: &G, stage: ShaderStage, source: &str) -> Result<G::Shader, EngineError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|e| EngineError::GlCreate(format!("{} shader: {e}", stage.as_str())))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(EngineError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

fn link_program<G: GlApi>(gl: &G, vs: G::Shader, fs: G::Shader) -> Result<G::Program, EngineError> {
    let program = gl
        .create_program()
        .map_err(|e| EngineError::GlCreate(format!("program: {e}")))?;
    gl.attach_shader(program, vs);
    if let Err(e) = check_gl(gl, "glAttachShader") {
        gl.delete_program(program);
        return Err(e);
    }
    gl.attach_shader(program, fs);
    if let Err(e) = check_gl(gl, "glAttachShader") {
        gl.delete_program(program);
        return Err(e);
    }
    gl.link_program(program);
    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::Link(log));
    }
    Ok(program)
}

fn attrib_location<G: GlApi>(gl: &G, program: G::Program, name: &'static str) -> Result<u32, EngineError> {
    let loc = gl.get_attrib_location(program, name);
    check_gl(gl, &format!("glGetAttribLocation {name}"))?;
    loc.ok_or(EngineError::MissingAttribute(name))
}

fn uniform_location<G: GlApi>(
    gl: &G,
    program: G::Program,
    name: &'static str,
) -> Result<G::UniformLocation, EngineError> {
    let loc = gl.get_uniform_location(program, name);
    check_gl(gl, &format!("glGetUniformLocation {name}"))?;
    loc.ok_or(EngineError::MissingUniform(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::fake_gl::FakeGl;
    use crate::shader::{AdvancedChromaKeyShader, PassthroughShader, Shader};

    #[test]
    fn builds_and_resolves_every_location() {
        let gl = FakeGl::new();
        let shader: Shader = AdvancedChromaKeyShader::new(Rgb::GREEN).into();
        let linked = LinkedProgram::build(&gl, &shader, TextureTarget::ExternalOes).unwrap();
        assert_eq!(linked.uniforms.len(), 3);
        assert_eq!(gl.live_programs(), 1);
        assert_eq!(gl.live_shaders(), 2);

        linked.delete(&gl);
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_shaders(), 0);
    }

    #[test]
    fn fragment_compile_failure_reports_log_and_cleans_up() {
        let gl = FakeGl::new();
        gl.fail_compile(ShaderStage::Fragment);
        let err = LinkedProgram::build(&gl, &PassthroughShader, TextureTarget::Texture2D)
            .err()
            .unwrap();
        match err {
            EngineError::ShaderCompile { stage: ShaderStage::Fragment, log } => {
                assert!(log.contains("fragment"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.programs_created(), 0);
    }

    #[test]
    fn link_failure_deletes_program_and_shaders() {
        let gl = FakeGl::new();
        gl.fail_link();
        let err = LinkedProgram::build(&gl, &PassthroughShader, TextureTarget::Texture2D)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Link(_)));
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_shaders(), 0);
    }

    #[test]
    fn missing_matrix_uniform_aborts_setup() {
        let gl = FakeGl::new();
        gl.hide_uniform(U_ST_MATRIX);
        let err = LinkedProgram::build(&gl, &PassthroughShader, TextureTarget::Texture2D)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::MissingUniform("uSTMatrix")));
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn driver_error_during_attach_is_fatal() {
        let gl = FakeGl::new();
        gl.error_on("attach_shader", glow::INVALID_OPERATION);
        let err = LinkedProgram::build(&gl, &PassthroughShader, TextureTarget::Texture2D)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Gl { code: glow::INVALID_OPERATION, .. }));
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_shaders(), 0);
    }
}
