//! Game-agnostic rendering plumbing: deterministic randomness, an offscreen 2D canvas, a
//! layer compositor over a narrow GL interface, and `pixels`/`winit` presentation.

pub mod app;
pub mod canvas;
pub mod compositor;
pub mod gl;
pub mod glow_backend;
pub mod graphics;
pub mod particles;
pub mod pixels_renderer;
pub mod regression;
pub mod rng;
pub mod soft_gl;
pub mod surface;
pub mod ui;

pub use canvas::{Canvas2d, CanvasError, Raster, Rgba};
pub use compositor::Compositor;
pub use gl::{GlApi, GlError};
pub use particles::{ParticleConfig, ParticleSystem};
pub use rng::{SeededRandom, seeded_random};
pub use surface::SurfaceSize;
