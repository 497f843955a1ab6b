//! Narrow GPU interface used by the layer compositor.
//!
//! The compositor only needs a handful of WebGL1-level primitives. Keeping them behind
//! [`GlApi`] lets the same compositor drive a real context (see
//! [`crate::glow_backend::GlowApi`]) or the software implementation in [`crate::soft_gl`],
//! which also counts every primitive for tests.

use crate::canvas::Raster;
use crate::surface::SurfaceSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    Points,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlError {
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("shader compile failed: {0}")]
    ShaderCompile(String),
    #[error("program link failed: {0}")]
    ProgramLink(String),
    #[error("GPU allocation failed: {0}")]
    Allocation(String),
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
}

/// The primitives a WebGL1-class context must provide.
///
/// Location queries are the expensive driver round-trips; callers are expected to cache
/// their results per program (see `compositor::LocationCache`).
pub trait GlApi {
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GlError>;
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: ProgramId);

    fn create_buffer(&mut self) -> Result<BufferId, GlError>;
    fn upload_buffer(&mut self, buffer: BufferId, data: &[f32], usage: BufferUsage);
    fn delete_buffer(&mut self, buffer: BufferId);
    /// Binds `buffer` and points attribute `location` at it with `components` floats per vertex.
    fn bind_attribute(&mut self, buffer: BufferId, location: AttribLocation, components: u8);

    fn create_texture(&mut self, raster: &Raster) -> Result<TextureId, GlError>;
    fn bind_texture(&mut self, texture: TextureId);
    fn delete_texture(&mut self, texture: TextureId);

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);
    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32);
    fn set_uniform_vec2(&mut self, location: UniformLocation, x: f32, y: f32);

    fn viewport(&mut self, size: SurfaceSize);
    /// Clears color to transparent black.
    fn clear(&mut self);
    fn enable_alpha_blending(&mut self);
    fn draw(&mut self, primitive: Primitive, vertex_count: usize);
}
