//! `glow` plumbing for the full-screen fragment program: compile, link,
//! quad upload, per-frame uniform push and draw.

use glow::HasContext;

use crate::controls::FrameUniforms;
use crate::error::{RenderError, ShaderStage};
use crate::shader::{self, ShaderMode, ShaderSources};

type Program = <glow::Context as HasContext>::Program;
type Shader = <glow::Context as HasContext>::Shader;
type Buffer = <glow::Context as HasContext>::Buffer;
type UniformLocation = <glow::Context as HasContext>::UniformLocation;

/// Two triangles covering clip space, drawn as a strip.
pub const FULLSCREEN_QUAD: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

/// Tries each capability mode in preference order and keeps the first
/// context `open` returns.
pub fn probe_context<T>(
    mut open: impl FnMut(ShaderMode) -> Option<T>,
) -> Result<(T, ShaderMode), RenderError> {
    for mode in ShaderMode::PREFERENCE {
        if let Some(context) = open(mode) {
            log::info!("acquired {} context", mode.name());
            return Ok((context, mode));
        }
        log::warn!("{} context unavailable", mode.name());
    }
    Err(RenderError::Unsupported)
}

struct UniformSlots {
    time: Option<UniformLocation>,
    resolution: Option<UniformLocation>,
    zoom: Option<UniformLocation>,
    yaw: Option<UniformLocation>,
    pitch: Option<UniformLocation>,
    hover: Option<UniformLocation>,
}

/// A linked program with its vertex buffer. Only ever constructed fully
/// linked.
pub struct CompiledProgram {
    program: Program,
    quad: Buffer,
    position: Option<u32>,
    uniforms: UniformSlots,
}

pub struct GlDevice {
    gl: glow::Context,
    mode: ShaderMode,
}

impl GlDevice {
    pub fn new(gl: glow::Context, mode: ShaderMode) -> Self {
        Self { gl, mode }
    }

    pub fn mode(&self) -> ShaderMode {
        self.mode
    }

    pub fn build(&self, sources: &ShaderSources) -> Result<CompiledProgram, RenderError> {
        let gl = &self.gl;
        unsafe {
            let vertex = compile(gl, glow::VERTEX_SHADER, ShaderStage::Vertex, &sources.vertex)?;
            let fragment =
                match compile(gl, glow::FRAGMENT_SHADER, ShaderStage::Fragment, &sources.fragment) {
                    Ok(shader) => shader,
                    Err(err) => {
                        gl.delete_shader(vertex);
                        return Err(err);
                    }
                };

            let linked = link(gl, vertex, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            let program = linked?;

            let quad = match gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(msg) => {
                    gl.delete_program(program);
                    return Err(RenderError::Resource(msg));
                }
            };
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(quad));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&FULLSCREEN_QUAD),
                glow::STATIC_DRAW,
            );

            let position = gl.get_attrib_location(program, shader::ATTR_POSITION);
            if position.is_none() {
                log::warn!("attribute {} not active", shader::ATTR_POSITION);
            }
            let uniforms = UniformSlots {
                time: gl.get_uniform_location(program, shader::UNIFORM_TIME),
                resolution: gl.get_uniform_location(program, shader::UNIFORM_RESOLUTION),
                zoom: gl.get_uniform_location(program, shader::UNIFORM_ZOOM),
                yaw: gl.get_uniform_location(program, shader::UNIFORM_YAW),
                pitch: gl.get_uniform_location(program, shader::UNIFORM_PITCH),
                hover: gl.get_uniform_location(program, shader::UNIFORM_HOVER),
            };

            Ok(CompiledProgram { program, quad, position, uniforms })
        }
    }

    pub fn release(&self, program: CompiledProgram) {
        unsafe {
            self.gl.use_program(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.delete_buffer(program.quad);
            self.gl.delete_program(program.program);
        }
    }

    pub fn viewport(&self, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
    }

    /// Pushes this frame's uniforms and issues the single draw call.
    pub fn draw(&self, program: &CompiledProgram, frame: &FrameUniforms) {
        let gl = &self.gl;
        let slots = &program.uniforms;
        let c = &frame.controls;
        unsafe {
            gl.use_program(Some(program.program));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(program.quad));
            if let Some(position) = program.position {
                gl.enable_vertex_attrib_array(position);
                gl.vertex_attrib_pointer_f32(position, 2, glow::FLOAT, false, 0, 0);
            }

            gl.uniform_1_f32(slots.time.as_ref(), frame.time);
            gl.uniform_2_f32(slots.resolution.as_ref(), frame.resolution[0], frame.resolution[1]);
            gl.uniform_1_f32(slots.zoom.as_ref(), c.camera_zoom);
            gl.uniform_1_f32(slots.yaw.as_ref(), c.view_yaw);
            gl.uniform_1_f32(slots.pitch.as_ref(), c.view_pitch);
            gl.uniform_1_f32(slots.hover.as_ref(), c.hover_intensity);

            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, FULLSCREEN_QUAD.len() as i32);
        }
    }
}

unsafe fn compile(
    gl: &glow::Context,
    kind: u32,
    stage: ShaderStage,
    source: &str,
) -> Result<Shader, RenderError> {
    let shader = gl.create_shader(kind).map_err(RenderError::Resource)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if gl.get_shader_compile_status(shader) {
        return Ok(shader);
    }
    let err = RenderError::shader_compile(stage, &gl.get_shader_info_log(shader));
    log::error!("{}", err);
    gl.delete_shader(shader);
    Err(err)
}

unsafe fn link(gl: &glow::Context, vertex: Shader, fragment: Shader) -> Result<Program, RenderError> {
    let program = gl.create_program().map_err(RenderError::Resource)?;
    gl.attach_shader(program, vertex);
    gl.attach_shader(program, fragment);
    gl.link_program(program);
    gl.detach_shader(program, vertex);
    gl.detach_shader(program, fragment);
    if gl.get_program_link_status(program) {
        return Ok(program);
    }
    let err = RenderError::program_link(&gl.get_program_info_log(program));
    log::error!("{}", err);
    gl.delete_program(program);
    Err(err)
}
