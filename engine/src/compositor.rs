//! Layer compositor: pre-rendered rasters as depth-ordered textured quads, plus point-sprite
//! particle systems on top.
//!
//! Quads draw in painter's order by ascending z (no depth test), so translucent layers blend
//! over the ones behind them. When the GPU context or its programs cannot be created the
//! compositor runs disabled: layers and particles are skipped without error, and DOM-side
//! scene content keeps working.

use std::collections::HashMap;

use log::{debug, warn};

use crate::canvas::Raster;
use crate::gl::{
    AttribLocation, BufferId, BufferUsage, GlApi, GlError, Primitive, ProgramId, TextureId,
    UniformLocation,
};
use crate::particles::{ParticleConfig, ParticleSystem};
use crate::surface::SurfaceSize;

pub const TEXTURE_VERTEX_SHADER: &str = r#"
attribute vec3 a_position;
attribute vec2 a_texcoord;

varying vec2 v_texcoord;

void main() {
    gl_Position = vec4(a_position.xy, a_position.z, 1.0);
    v_texcoord = a_texcoord;
}
"#;

pub const TEXTURE_FRAGMENT_SHADER: &str = r#"
precision mediump float;

varying vec2 v_texcoord;
uniform sampler2D u_texture;

void main() {
    gl_FragColor = texture2D(u_texture, v_texcoord);
}
"#;

pub const PARTICLE_VERTEX_SHADER: &str = r#"
attribute vec2 a_position;
attribute float a_size;
attribute float a_alpha;

varying float v_alpha;

uniform vec2 u_resolution;
uniform float u_zIndex;

void main() {
    vec2 clip = (a_position / u_resolution) * 2.0 - 1.0;
    gl_Position = vec4(clip * vec2(1, -1), u_zIndex, 1);
    gl_PointSize = a_size;
    v_alpha = a_alpha;
}
"#;

pub const PARTICLE_FRAGMENT_SHADER: &str = r#"
precision mediump float;

varying float v_alpha;

void main() {
    gl_FragColor = vec4(1.0, 1.0, 1.0, v_alpha);
}
"#;

/// Full-screen quad as two triangles; texcoord v=0 is the raster's top row.
const QUAD_TEXCOORDS: [f32; 12] = [0., 1., 1., 1., 0., 0., 0., 0., 1., 1., 1., 0.];

fn quad_positions(z: f32) -> [f32; 18] {
    [
        -1., -1., z, 1., -1., z, -1., 1., z, //
        -1., 1., z, 1., -1., z, 1., 1., z,
    ]
}

/// Creates `N` buffers or none at all: on failure the ones already made are deleted.
fn create_buffers<const N: usize>(gl: &mut impl GlApi) -> Result<[BufferId; N], GlError> {
    let mut ids = [BufferId(0); N];
    for i in 0..N {
        match gl.create_buffer() {
            Ok(id) => ids[i] = id,
            Err(err) => {
                for &made in &ids[..i] {
                    gl.delete_buffer(made);
                }
                return Err(err);
            }
        }
    }
    Ok(ids)
}

/// Attribute and uniform locations of one program, queried from the driver at most once per
/// name. Names the program does not declare are remembered as absent.
#[derive(Debug)]
pub struct LocationCache {
    program: ProgramId,
    attribs: HashMap<&'static str, Option<AttribLocation>>,
    uniforms: HashMap<&'static str, Option<UniformLocation>>,
}

impl LocationCache {
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            attribs: HashMap::new(),
            uniforms: HashMap::new(),
        }
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn attrib<G: GlApi + ?Sized>(&mut self, gl: &mut G, name: &'static str) -> Option<AttribLocation> {
        let program = self.program;
        *self
            .attribs
            .entry(name)
            .or_insert_with(|| gl.attrib_location(program, name))
    }

    pub fn uniform<G: GlApi + ?Sized>(&mut self, gl: &mut G, name: &'static str) -> Option<UniformLocation> {
        let program = self.program;
        *self
            .uniforms
            .entry(name)
            .or_insert_with(|| gl.uniform_location(program, name))
    }

    /// Names resolved so far, present or not.
    pub fn len(&self) -> usize {
        self.attribs.len() + self.uniforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct TexturedQuad {
    texture: TextureId,
    position_buffer: BufferId,
    texcoord_buffer: BufferId,
    z_index: f32,
}

#[derive(Debug)]
struct ParticleLayer {
    system: ParticleSystem,
    position_buffer: BufferId,
    size_buffer: BufferId,
    alpha_buffer: BufferId,
}

struct Backend<G> {
    gl: G,
    texture_locations: LocationCache,
    particle_locations: LocationCache,
}

pub struct Compositor<G: GlApi> {
    backend: Option<Backend<G>>,
    size: SurfaceSize,
    quads: Vec<TexturedQuad>,
    particles: Vec<ParticleLayer>,
    frames: u64,
}

impl<G: GlApi> Compositor<G> {
    /// Builds both programs on `gl`, failing on the first GPU error.
    pub fn try_new(mut gl: G, size: SurfaceSize) -> Result<Self, GlError> {
        let texture_program = gl.create_program(TEXTURE_VERTEX_SHADER, TEXTURE_FRAGMENT_SHADER)?;
        let particle_program =
            gl.create_program(PARTICLE_VERTEX_SHADER, PARTICLE_FRAGMENT_SHADER)?;
        gl.viewport(size);
        Ok(Self {
            backend: Some(Backend {
                gl,
                texture_locations: LocationCache::new(texture_program),
                particle_locations: LocationCache::new(particle_program),
            }),
            size,
            quads: Vec::new(),
            particles: Vec::new(),
            frames: 0,
        })
    }

    /// Like [`Compositor::try_new`], but degrades to a disabled compositor instead of failing.
    pub fn new(gl: Option<G>, size: SurfaceSize) -> Self {
        let Some(gl) = gl else {
            warn!("no GPU context; canvas-composited layers are disabled");
            return Self::disabled(size);
        };
        match Self::try_new(gl, size) {
            Ok(compositor) => compositor,
            Err(err) => {
                warn!("compositor disabled: {err}");
                Self::disabled(size)
            }
        }
    }

    pub fn disabled(size: SurfaceSize) -> Self {
        Self {
            backend: None,
            size,
            quads: Vec::new(),
            particles: Vec::new(),
            frames: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn gl(&self) -> Option<&G> {
        self.backend.as_ref().map(|b| &b.gl)
    }

    pub fn layer_count(&self) -> usize {
        self.quads.len()
    }

    pub fn particle_system_count(&self) -> usize {
        self.particles.len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Z values of the registered layers in draw order.
    pub fn layer_order(&self) -> Vec<f32> {
        self.quads.iter().map(|q| q.z_index).collect()
    }

    /// Uploads `raster` as a texture and registers it at depth `z_index`.
    ///
    /// A disabled compositor accepts and drops the layer.
    pub fn add_layer(&mut self, raster: &Raster, z_index: f32) -> Result<(), GlError> {
        let Some(backend) = self.backend.as_mut() else {
            debug!("compositor disabled; skipping layer at z={z_index}");
            return Ok(());
        };
        let gl = &mut backend.gl;

        let texture = gl.create_texture(raster)?;
        let [position_buffer, texcoord_buffer] = match create_buffers(gl) {
            Ok(buffers) => buffers,
            Err(err) => {
                gl.delete_texture(texture);
                return Err(err);
            }
        };
        gl.upload_buffer(position_buffer, &quad_positions(z_index), BufferUsage::Static);
        gl.upload_buffer(texcoord_buffer, &QUAD_TEXCOORDS, BufferUsage::Static);

        self.quads.push(TexturedQuad {
            texture,
            position_buffer,
            texcoord_buffer,
            z_index,
        });
        self.quads.sort_by(|a, b| a.z_index.total_cmp(&b.z_index));
        Ok(())
    }

    pub fn add_particles(&mut self, config: ParticleConfig) -> Result<(), GlError> {
        let Some(backend) = self.backend.as_mut() else {
            debug!("compositor disabled; skipping {} particles", config.count);
            return Ok(());
        };
        let gl = &mut backend.gl;
        let [position_buffer, size_buffer, alpha_buffer] = create_buffers(gl)?;
        self.particles.push(ParticleLayer {
            system: ParticleSystem::new(config, self.size),
            position_buffer,
            size_buffer,
            alpha_buffer,
        });
        Ok(())
    }

    /// Drops every layer and particle system and frees their GPU resources.
    pub fn clear_scene(&mut self) {
        let quads = std::mem::take(&mut self.quads);
        let particles = std::mem::take(&mut self.particles);
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let gl = &mut backend.gl;
        for quad in quads {
            gl.delete_texture(quad.texture);
            gl.delete_buffer(quad.position_buffer);
            gl.delete_buffer(quad.texcoord_buffer);
        }
        for layer in particles {
            gl.delete_buffer(layer.position_buffer);
            gl.delete_buffer(layer.size_buffer);
            gl.delete_buffer(layer.alpha_buffer);
        }
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        for layer in &mut self.particles {
            layer.system.resize(size);
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.gl.viewport(size);
        }
    }

    /// Clears, draws every quad back to front, then advances and draws each particle system.
    pub fn render_frame(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let Backend {
            gl,
            texture_locations,
            particle_locations,
        } = backend;

        gl.clear();
        gl.enable_alpha_blending();

        gl.use_program(texture_locations.program());
        let u_texture = texture_locations.uniform(gl, "u_texture");
        let a_position = texture_locations.attrib(gl, "a_position");
        let a_texcoord = texture_locations.attrib(gl, "a_texcoord");
        if let Some(u_texture) = u_texture {
            gl.set_uniform_i32(u_texture, 0);
        }
        for quad in &self.quads {
            if let Some(location) = a_position {
                gl.bind_attribute(quad.position_buffer, location, 3);
            }
            if let Some(location) = a_texcoord {
                gl.bind_attribute(quad.texcoord_buffer, location, 2);
            }
            gl.bind_texture(quad.texture);
            gl.draw(Primitive::Triangles, 6);
        }

        gl.use_program(particle_locations.program());
        let u_resolution = particle_locations.uniform(gl, "u_resolution");
        let u_z_index = particle_locations.uniform(gl, "u_zIndex");
        let a_position = particle_locations.attrib(gl, "a_position");
        let a_size = particle_locations.attrib(gl, "a_size");
        let a_alpha = particle_locations.attrib(gl, "a_alpha");
        if let Some(u_resolution) = u_resolution {
            gl.set_uniform_vec2(
                u_resolution,
                self.size.width as f32,
                self.size.height as f32,
            );
        }
        for layer in &mut self.particles {
            if let Some(u_z_index) = u_z_index {
                gl.set_uniform_f32(u_z_index, layer.system.z_index());
            }
            layer.system.update();

            gl.upload_buffer(layer.position_buffer, layer.system.positions(), BufferUsage::Dynamic);
            if let Some(location) = a_position {
                gl.bind_attribute(layer.position_buffer, location, 2);
            }
            if layer.system.take_size_dirty() {
                gl.upload_buffer(layer.size_buffer, layer.system.sizes(), BufferUsage::Dynamic);
            }
            if let Some(location) = a_size {
                gl.bind_attribute(layer.size_buffer, location, 1);
            }
            gl.upload_buffer(layer.alpha_buffer, layer.system.alphas(), BufferUsage::Dynamic);
            if let Some(location) = a_alpha {
                gl.bind_attribute(layer.alpha_buffer, location, 1);
            }
            gl.draw(Primitive::Points, layer.system.len());
        }

        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_gl::SoftGl;

    #[test]
    fn location_cache_queries_each_name_once() {
        let mut gl = SoftGl::new();
        let program = gl
            .create_program(TEXTURE_VERTEX_SHADER, TEXTURE_FRAGMENT_SHADER)
            .expect("program");
        let mut cache = LocationCache::new(program);
        for _ in 0..5 {
            assert!(cache.attrib(&mut gl, "a_position").is_some());
            assert!(cache.uniform(&mut gl, "u_missing").is_none());
        }
        assert_eq!(gl.stats().location_queries(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_layer_upload_frees_its_partial_resources() {
        let mut compositor =
            Compositor::try_new(SoftGl::with_buffer_limit(3), SurfaceSize::new(4, 4))
                .expect("compositor");
        let raster = Raster::new(SurfaceSize::new(4, 4)).expect("raster");
        compositor.add_layer(&raster, -0.5).expect("first layer fits");

        let err = compositor.add_layer(&raster, -0.4).expect_err("second layer runs out");
        assert!(matches!(err, GlError::Allocation(_)));
        assert_eq!(compositor.layer_count(), 1);
        let gl = compositor.gl().expect("enabled");
        assert_eq!(gl.live_textures(), 1, "the orphaned texture is deleted");
        assert_eq!(gl.live_buffers(), 2, "the orphaned position buffer is deleted");
    }

    #[test]
    fn failed_particle_upload_frees_its_partial_buffers() {
        let mut compositor =
            Compositor::try_new(SoftGl::with_buffer_limit(2), SurfaceSize::new(4, 4))
                .expect("compositor");
        let config = ParticleConfig {
            count: 4,
            speed: 0.0,
            min_size: 1.0,
            max_size: 2.0,
            min_alpha: 0.5,
            max_alpha: 1.0,
            lifetime: 10.0,
            z_index: -0.5,
            seed: 3,
        };
        assert!(compositor.add_particles(config).is_err());
        assert_eq!(compositor.particle_system_count(), 0);
        assert_eq!(compositor.gl().expect("enabled").live_buffers(), 0);
    }

    #[test]
    fn quad_positions_carry_depth() {
        let positions = quad_positions(-0.7);
        assert!(positions.chunks_exact(3).all(|v| v[2] == -0.7));
    }
}
