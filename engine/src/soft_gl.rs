//! Software [`GlApi`] for headless runs and tests.
//!
//! `SoftGl` rasterizes the two program shapes the compositor uses, picked by attribute name:
//! programs declaring `a_texcoord` draw textured triangles, programs declaring `a_size` draw
//! square point sprites. Every driver-level call is counted in [`SoftGlStats`].

use std::collections::HashMap;

use log::warn;

use crate::canvas::Raster;
use crate::gl::{
    AttribLocation, BufferId, BufferUsage, GlApi, GlError, Primitive, ProgramId, TextureId,
    UniformLocation,
};
use crate::surface::SurfaceSize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftGlStats {
    pub programs_linked: u64,
    pub attrib_queries: u64,
    pub uniform_queries: u64,
    pub buffer_uploads: u64,
    pub texture_uploads: u64,
    pub draw_calls: u64,
}

impl SoftGlStats {
    pub fn location_queries(&self) -> u64 {
        self.attrib_queries + self.uniform_queries
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(f32, f32),
}

#[derive(Debug, Clone)]
struct SoftProgram {
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

impl SoftProgram {
    fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .position(|a| a == name)
            .map(|i| i as u32)
    }
}

/// Names declared with `qualifier` (`attribute` / `uniform`) in GLSL ES 1.0 source.
fn declared_names(source: &str, qualifier: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix(qualifier)?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let decl = rest.split(';').next()?;
            decl.split_whitespace().last().map(str::to_owned)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct AttribBinding {
    buffer: usize,
    components: usize,
}

pub struct SoftGl {
    available: bool,
    stats: SoftGlStats,
    programs: Vec<SoftProgram>,
    current_program: Option<usize>,
    buffers: Vec<Option<Vec<f32>>>,
    /// Live buffers past this count fail to allocate.
    buffer_limit: Option<usize>,
    textures: Vec<Option<Raster>>,
    bound_texture: Option<usize>,
    bindings: HashMap<u32, AttribBinding>,
    uniform_slots: Vec<(usize, String)>,
    uniform_values: HashMap<u32, UniformValue>,
    blending: bool,
    frame: Option<Raster>,
}

impl Default for SoftGl {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftGl {
    pub fn new() -> Self {
        Self {
            available: true,
            stats: SoftGlStats::default(),
            programs: Vec::new(),
            current_program: None,
            buffers: Vec::new(),
            buffer_limit: None,
            textures: Vec::new(),
            bound_texture: None,
            bindings: HashMap::new(),
            uniform_slots: Vec::new(),
            uniform_values: HashMap::new(),
            blending: false,
            frame: None,
        }
    }

    /// A context that fails program creation, like a browser without WebGL.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A context whose GPU memory runs out after `limit` live buffers.
    pub fn with_buffer_limit(limit: usize) -> Self {
        Self {
            buffer_limit: Some(limit),
            ..Self::new()
        }
    }

    pub fn stats(&self) -> SoftGlStats {
        self.stats
    }

    /// The color buffer as of the last draw.
    pub fn frame(&self) -> Option<&Raster> {
        self.frame.as_ref()
    }

    /// Textures created and not yet deleted.
    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    /// Buffers created and not yet deleted.
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn attribute_data(&self, program: &SoftProgram, name: &str) -> Option<(&[f32], usize)> {
        let location = program.attribute(name)?;
        let binding = self.bindings.get(&location)?;
        let data = self.buffers.get(binding.buffer)?.as_ref()?;
        Some((data.as_slice(), binding.components))
    }

    fn uniform_value(&self, program: usize, name: &str) -> Option<UniformValue> {
        let slot = self
            .uniform_slots
            .iter()
            .position(|(p, n)| *p == program && n == name)?;
        self.uniform_values.get(&(slot as u32)).copied()
    }

    fn draw_textured_triangles(&mut self, program: usize, vertex_count: usize) {
        let Some(texture) = self
            .bound_texture
            .and_then(|t| self.textures.get(t))
            .and_then(Option::as_ref)
        else {
            return;
        };
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        let program_ref = &self.programs[program];
        let (Some((positions, pos_n)), Some((texcoords, uv_n))) = (
            self.attribute_data(program_ref, "a_position"),
            self.attribute_data(program_ref, "a_texcoord"),
        ) else {
            return;
        };

        let (fw, fh) = (frame.width() as f32, frame.height() as f32);
        let mut vertices = Vec::with_capacity(vertex_count);
        for i in 0..vertex_count {
            let (Some(p), Some(uv)) = (
                positions.get(i * pos_n..i * pos_n + 2),
                texcoords.get(i * uv_n..i * uv_n + 2),
            ) else {
                break;
            };
            let x = (p[0] + 1.0) * 0.5 * fw;
            let y = (1.0 - p[1]) * 0.5 * fh;
            vertices.push([x, y, uv[0], uv[1]]);
        }

        let mut spans = Vec::new();
        for tri in vertices.chunks_exact(3) {
            rasterize_triangle(tri, fw as u32, fh as u32, |px, py, u, v| {
                let tx = ((u * texture.width() as f32) as u32).min(texture.width() - 1);
                let ty = ((v * texture.height() as f32) as u32).min(texture.height() - 1);
                if let Some(texel) = texture.pixel(tx, ty) {
                    spans.push((px, py, texel));
                }
            });
        }
        for (x, y, texel) in spans {
            self.blend_pixel(x, y, texel);
        }
    }

    fn draw_points(&mut self, program: usize, vertex_count: usize) {
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);
        let resolution = match self.uniform_value(program, "u_resolution") {
            Some(UniformValue::Vec2(w, h)) if w > 0.0 && h > 0.0 => (w, h),
            _ => (fw, fh),
        };
        let program_ref = &self.programs[program];
        let (Some((positions, pos_n)), Some((sizes, _)), Some((alphas, _))) = (
            self.attribute_data(program_ref, "a_position"),
            self.attribute_data(program_ref, "a_size"),
            self.attribute_data(program_ref, "a_alpha"),
        ) else {
            return;
        };

        let mut sprites = Vec::with_capacity(vertex_count);
        for i in 0..vertex_count {
            let (Some(p), Some(&size), Some(&alpha)) =
                (positions.get(i * pos_n..i * pos_n + 2), sizes.get(i), alphas.get(i))
            else {
                break;
            };
            let cx = p[0] / resolution.0 * fw;
            let cy = p[1] / resolution.1 * fh;
            sprites.push((cx, cy, size.max(1.0), alpha.clamp(0.0, 1.0)));
        }

        for (cx, cy, size, alpha) in sprites {
            let half = size * 0.5;
            let x0 = (cx - half).round().max(0.0) as u32;
            let y0 = (cy - half).round().max(0.0) as u32;
            let x1 = ((cx + half).round().max(0.0) as u32).min(fw as u32);
            let y1 = ((cy + half).round().max(0.0) as u32).min(fh as u32);
            let texel = [255, 255, 255, (alpha * 255.0).round() as u8];
            for y in y0..y1 {
                for x in x0..x1 {
                    self.blend_pixel(x, y, texel);
                }
            }
        }
    }

    fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let blending = self.blending;
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let width = frame.width();
        let i = (y as usize * width as usize + x as usize) * 4;
        let Some(dst) = frame.pixels_mut().get_mut(i..i + 4) else {
            return;
        };
        if !blending {
            dst.copy_from_slice(&src);
            return;
        }
        // SRC_ALPHA, ONE_MINUS_SRC_ALPHA on all four channels.
        let a = src[3] as f32 / 255.0;
        for (d, s) in dst.iter_mut().zip(src) {
            let value = s as f32 * a + *d as f32 * (1.0 - a);
            *d = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Calls `plot(x, y, u, v)` for every pixel whose center lies inside the triangle.
fn rasterize_triangle(
    tri: &[[f32; 4]],
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32, f32, f32),
) {
    let [a, b, c] = [tri[0], tri[1], tri[2]];
    let (pa, pb, pc) = ([a[0], a[1]], [b[0], b[1]], [c[0], c[1]]);
    let area = edge(pa, pb, pc);
    if area.abs() < f32::EPSILON {
        return;
    }

    let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
    let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
    let max_x = (a[0].max(b[0]).max(c[0]).ceil().max(0.0) as u32).min(width);
    let max_y = (a[1].max(b[1]).max(c[1]).ceil().max(0.0) as u32).min(height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let w0 = edge(pb, pc, p) / area;
            let w1 = edge(pc, pa, p) / area;
            let w2 = edge(pa, pb, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let u = w0 * a[2] + w1 * b[2] + w2 * c[2];
            let v = w0 * a[3] + w1 * b[3] + w2 * c[3];
            plot(x, y, u.clamp(0.0, 1.0), v.clamp(0.0, 1.0));
        }
    }
}

impl GlApi for SoftGl {
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GlError> {
        if !self.available {
            return Err(GlError::ContextUnavailable(
                "software context created as unavailable".to_string(),
            ));
        }
        let attributes = declared_names(vertex_src, "attribute");
        if attributes.is_empty() {
            return Err(GlError::ShaderCompile(
                "vertex shader declares no attributes".to_string(),
            ));
        }
        let mut uniforms = declared_names(vertex_src, "uniform");
        for name in declared_names(fragment_src, "uniform") {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }
        self.programs.push(SoftProgram {
            attributes,
            uniforms,
        });
        self.stats.programs_linked += 1;
        Ok(ProgramId((self.programs.len() - 1) as u32))
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        self.stats.attrib_queries += 1;
        self.programs
            .get(program.0 as usize)?
            .attribute(name)
            .map(AttribLocation)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.stats.uniform_queries += 1;
        let index = program.0 as usize;
        if !self.programs.get(index)?.uniforms.iter().any(|u| u == name) {
            return None;
        }
        let slot = match self
            .uniform_slots
            .iter()
            .position(|(p, n)| *p == index && n == name)
        {
            Some(slot) => slot,
            None => {
                self.uniform_slots.push((index, name.to_string()));
                self.uniform_slots.len() - 1
            }
        };
        Some(UniformLocation(slot as u32))
    }

    fn use_program(&mut self, program: ProgramId) {
        if (program.0 as usize) < self.programs.len() {
            self.current_program = Some(program.0 as usize);
        } else {
            warn!("{}", GlError::UnknownHandle { kind: "program", id: program.0 });
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, GlError> {
        if !self.available {
            return Err(GlError::ContextUnavailable("no buffers without a context".to_string()));
        }
        if self.buffer_limit.is_some_and(|limit| self.live_buffers() >= limit) {
            return Err(GlError::Allocation("out of buffer memory".to_string()));
        }
        self.buffers.push(Some(Vec::new()));
        Ok(BufferId((self.buffers.len() - 1) as u32))
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[f32], _usage: BufferUsage) {
        self.stats.buffer_uploads += 1;
        match self.buffers.get_mut(buffer.0 as usize).and_then(Option::as_mut) {
            Some(slot) => {
                slot.clear();
                slot.extend_from_slice(data);
            }
            None => warn!("{}", GlError::UnknownHandle { kind: "buffer", id: buffer.0 }),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            *slot = None;
        }
    }

    fn bind_attribute(&mut self, buffer: BufferId, location: AttribLocation, components: u8) {
        self.bindings.insert(
            location.0,
            AttribBinding {
                buffer: buffer.0 as usize,
                components: components.max(1) as usize,
            },
        );
    }

    fn create_texture(&mut self, raster: &Raster) -> Result<TextureId, GlError> {
        if !self.available {
            return Err(GlError::ContextUnavailable("no textures without a context".to_string()));
        }
        self.stats.texture_uploads += 1;
        self.textures.push(Some(raster.clone()));
        Ok(TextureId((self.textures.len() - 1) as u32))
    }

    fn bind_texture(&mut self, texture: TextureId) {
        if matches!(self.textures.get(texture.0 as usize), Some(Some(_))) {
            self.bound_texture = Some(texture.0 as usize);
        } else {
            warn!("{}", GlError::UnknownHandle { kind: "texture", id: texture.0 });
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0 as usize) {
            *slot = None;
        }
        if self.bound_texture == Some(texture.0 as usize) {
            self.bound_texture = None;
        }
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.uniform_values.insert(location.0, UniformValue::Int(value));
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        self.uniform_values.insert(location.0, UniformValue::Float(value));
    }

    fn set_uniform_vec2(&mut self, location: UniformLocation, x: f32, y: f32) {
        self.uniform_values.insert(location.0, UniformValue::Vec2(x, y));
    }

    fn viewport(&mut self, size: SurfaceSize) {
        if self.frame.as_ref().map(Raster::size) == Some(size) {
            return;
        }
        match Raster::new(size) {
            Ok(frame) => self.frame = Some(frame),
            Err(err) => {
                warn!("software viewport {size} rejected: {err}");
                self.frame = None;
            }
        }
    }

    fn clear(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.clear();
        }
    }

    fn enable_alpha_blending(&mut self) {
        self.blending = true;
    }

    fn draw(&mut self, primitive: Primitive, vertex_count: usize) {
        self.stats.draw_calls += 1;
        let Some(program) = self.current_program else {
            warn!("draw call without a program in use");
            return;
        };
        let is_textured = self.programs[program].attribute("a_texcoord").is_some();
        let is_sprite = self.programs[program].attribute("a_size").is_some();
        match primitive {
            Primitive::Triangles if is_textured => self.draw_textured_triangles(program, vertex_count),
            Primitive::Points if is_sprite => self.draw_points(program, vertex_count),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "
        attribute vec3 a_position;
        attribute vec2 a_texcoord;
        varying vec2 v_texcoord;
        void main() {}
    ";
    const FS: &str = "
        precision mediump float;
        uniform sampler2D u_texture;
        void main() {}
    ";

    #[test]
    fn parses_declared_names() {
        assert_eq!(declared_names(VS, "attribute"), vec!["a_position", "a_texcoord"]);
        assert_eq!(declared_names(FS, "uniform"), vec!["u_texture"]);
        assert!(declared_names("uniforms_like_name x;", "uniform").is_empty());
    }

    #[test]
    fn unavailable_context_fails_program_creation() {
        let mut gl = SoftGl::unavailable();
        assert!(matches!(
            gl.create_program(VS, FS),
            Err(GlError::ContextUnavailable(_))
        ));
    }

    #[test]
    fn counts_location_queries_including_misses() {
        let mut gl = SoftGl::new();
        let program = gl.create_program(VS, FS).expect("program");
        assert_eq!(gl.attrib_location(program, "a_texcoord"), Some(AttribLocation(1)));
        assert_eq!(gl.attrib_location(program, "a_missing"), None);
        assert!(gl.uniform_location(program, "u_texture").is_some());
        assert_eq!(gl.stats().location_queries(), 3);
    }

    #[test]
    fn full_screen_quad_copies_texture() {
        let size = SurfaceSize::new(4, 4);
        let mut gl = SoftGl::new();
        let program = gl.create_program(VS, FS).expect("program");
        let mut texture = Raster::new(size).expect("raster");
        for px in texture.pixels_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[10, 20, 30, 255]);
        }
        let tex = gl.create_texture(&texture).expect("texture");

        let pos = gl.create_buffer().expect("buffer");
        let uv = gl.create_buffer().expect("buffer");
        gl.upload_buffer(
            pos,
            &[-1., -1., 0., 1., -1., 0., -1., 1., 0., -1., 1., 0., 1., -1., 0., 1., 1., 0.],
            BufferUsage::Static,
        );
        gl.upload_buffer(
            uv,
            &[0., 1., 1., 1., 0., 0., 0., 0., 1., 1., 1., 0.],
            BufferUsage::Static,
        );

        gl.viewport(size);
        gl.clear();
        gl.enable_alpha_blending();
        gl.use_program(program);
        gl.bind_attribute(pos, AttribLocation(0), 3);
        gl.bind_attribute(uv, AttribLocation(1), 2);
        gl.bind_texture(tex);
        gl.draw(Primitive::Triangles, 6);

        let frame = gl.frame().expect("frame");
        assert_eq!(frame.covered_pixels(), 16);
        assert_eq!(frame.pixel(3, 3), Some([10, 20, 30, 255]));
    }
}
