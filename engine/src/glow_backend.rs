//! [`GlApi`] over a real OpenGL ES 2 / WebGL1 context via `glow`.

use std::collections::HashMap;

use glow::{HasContext, PixelUnpackData};
use log::warn;

use crate::canvas::Raster;
use crate::gl::{
    AttribLocation, BufferId, BufferUsage, GlApi, GlError, Primitive, ProgramId, TextureId,
    UniformLocation,
};
use crate::surface::SurfaceSize;

/// Native handles indexed by opaque id. Deleted ids go on a free list and are handed out
/// again, so a theme switch that frees its textures does not grow the table.
#[derive(Debug)]
struct HandleSlab<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Default for HandleSlab<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> HandleSlab<T> {
    fn insert(&mut self, handle: T) -> u32 {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(handle);
            return id;
        }
        self.slots.push(Some(handle));
        (self.slots.len() - 1) as u32
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize)?.as_ref()
    }

    fn remove(&mut self, id: u32) -> Option<T> {
        let handle = self.slots.get_mut(id as usize)?.take()?;
        self.free.push(id);
        Some(handle)
    }
}

/// Owns a `glow::Context` and maps its native handles to the compositor's opaque ids.
pub struct GlowApi {
    gl: glow::Context,
    programs: HandleSlab<glow::Program>,
    buffers: HandleSlab<glow::Buffer>,
    textures: HandleSlab<glow::Texture>,
    uniforms: Vec<glow::UniformLocation>,
    /// One id per `(program, name)`, so repeated lookups reuse the slot.
    uniform_ids: HashMap<(u32, String), u32>,
}

impl GlowApi {
    pub fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            programs: HandleSlab::default(),
            buffers: HandleSlab::default(),
            textures: HandleSlab::default(),
            uniforms: Vec::new(),
            uniform_ids: HashMap::new(),
        }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn program(&self, id: ProgramId) -> Option<glow::Program> {
        let program = self.programs.get(id.0).copied();
        if program.is_none() {
            warn!("{}", GlError::UnknownHandle { kind: "program", id: id.0 });
        }
        program
    }

    fn buffer(&self, id: BufferId) -> Option<glow::Buffer> {
        let buffer = self.buffers.get(id.0).copied();
        if buffer.is_none() {
            warn!("{}", GlError::UnknownHandle { kind: "buffer", id: id.0 });
        }
        buffer
    }

    fn uniform(&self, location: UniformLocation) -> Option<&glow::UniformLocation> {
        self.uniforms.get(location.0 as usize)
    }

    fn compile_shader(&self, kind: u32, source: &str) -> Result<glow::Shader, GlError> {
        unsafe {
            let shader = self.gl.create_shader(kind).map_err(GlError::Allocation)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(GlError::ShaderCompile(log));
            }
            Ok(shader)
        }
    }
}

fn gl_dim(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl GlApi for GlowApi {
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GlError> {
        let vertex = self.compile_shader(glow::VERTEX_SHADER, vertex_src)?;
        let fragment = match self.compile_shader(glow::FRAGMENT_SHADER, fragment_src) {
            Ok(shader) => shader,
            Err(err) => {
                unsafe { self.gl.delete_shader(vertex) };
                return Err(err);
            }
        };

        unsafe {
            let program = self.gl.create_program().map_err(GlError::Allocation)?;
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            for shader in [vertex, fragment] {
                self.gl.detach_shader(program, shader);
                self.gl.delete_shader(shader);
            }
            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(GlError::ProgramLink(log));
            }
            Ok(ProgramId(self.programs.insert(program)))
        }
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        let program = self.program(program)?;
        unsafe { self.gl.get_attrib_location(program, name) }.map(AttribLocation)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let key = (program.0, name.to_string());
        if let Some(&id) = self.uniform_ids.get(&key) {
            return Some(UniformLocation(id));
        }
        let native = self.program(program)?;
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        self.uniforms.push(location);
        let id = (self.uniforms.len() - 1) as u32;
        self.uniform_ids.insert(key, id);
        Some(UniformLocation(id))
    }

    fn use_program(&mut self, program: ProgramId) {
        if let Some(program) = self.program(program) {
            unsafe { self.gl.use_program(Some(program)) };
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, GlError> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(GlError::Allocation)?;
        Ok(BufferId(self.buffers.insert(buffer)))
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[f32], usage: BufferUsage) {
        let Some(buffer) = self.buffer(buffer) else {
            return;
        };
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        };
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), usage);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(buffer.0) {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn bind_attribute(&mut self, buffer: BufferId, location: AttribLocation, components: u8) {
        let Some(buffer) = self.buffer(buffer) else {
            return;
        };
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.enable_vertex_attrib_array(location.0);
            self.gl.vertex_attrib_pointer_f32(
                location.0,
                components as i32,
                glow::FLOAT,
                false,
                0,
                0,
            );
        }
    }

    fn create_texture(&mut self, raster: &Raster) -> Result<TextureId, GlError> {
        unsafe {
            let texture = self.gl.create_texture().map_err(GlError::Allocation)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            for (param, value) in [
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
                (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
            ] {
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, param, value as i32);
            }
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                gl_dim(raster.width()),
                gl_dim(raster.height()),
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(raster.pixels())),
            );
            Ok(TextureId(self.textures.insert(texture)))
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        let Some(texture) = self.textures.get(texture.0).copied() else {
            warn!("{}", GlError::UnknownHandle { kind: "texture", id: texture.0 });
            return;
        };
        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(texture.0) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(self.uniform(location), value) };
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(self.uniform(location), value) };
    }

    fn set_uniform_vec2(&mut self, location: UniformLocation, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(self.uniform(location), x, y) };
    }

    fn viewport(&mut self, size: SurfaceSize) {
        unsafe {
            self.gl
                .viewport(0, 0, gl_dim(size.width), gl_dim(size.height))
        };
    }

    fn clear(&mut self) {
        unsafe {
            self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
            self.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn enable_alpha_blending(&mut self) {
        unsafe {
            self.gl.enable(glow::BLEND);
            self.gl
                .blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
    }

    fn draw(&mut self, primitive: Primitive, vertex_count: usize) {
        let mode = match primitive {
            Primitive::Triangles => glow::TRIANGLES,
            Primitive::Points => glow::POINTS,
        };
        let count = i32::try_from(vertex_count).unwrap_or(i32::MAX);
        unsafe { self.gl.draw_arrays(mode, 0, count) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_reused() {
        let mut slab = HandleSlab::default();
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!((a, b), (0, 1));

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.get(a), None, "deleted ids no longer resolve");
        assert_eq!(slab.remove(a), None, "double delete is a no-op");

        let c = slab.insert("c");
        assert_eq!(c, a, "the freed slot is handed out again");
        assert_eq!(slab.get(c), Some(&"c"));
        assert_eq!(slab.slots.len(), 2);
        assert!(slab.free.is_empty());
    }

    #[test]
    fn churn_keeps_the_table_bounded() {
        let mut slab = HandleSlab::default();
        for round in 0..50u32 {
            let ids: Vec<u32> = (0..6).map(|i| slab.insert(round * 10 + i)).collect();
            for id in ids {
                slab.remove(id);
            }
        }
        assert_eq!(slab.slots.len(), 6);
        assert_eq!(slab.free.len(), 6);
    }
}
