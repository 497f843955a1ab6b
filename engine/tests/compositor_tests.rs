use engine::canvas::{Canvas2d, Raster, Rgba};
use engine::compositor::Compositor;
use engine::particles::ParticleConfig;
use engine::soft_gl::SoftGl;
use engine::surface::SurfaceSize;

const SIZE: SurfaceSize = SurfaceSize::new(32, 24);

fn solid_layer(color: Rgba) -> Raster {
    let mut canvas = Canvas2d::new(SIZE).expect("canvas");
    canvas.set_fill(color);
    canvas.fill_rect(0.0, 0.0, SIZE.width as f32, SIZE.height as f32);
    canvas.into_raster()
}

fn still_particles(count: usize) -> ParticleConfig {
    ParticleConfig {
        count,
        speed: 0.0,
        min_size: 1.0,
        max_size: 2.0,
        min_alpha: 0.5,
        max_alpha: 1.0,
        lifetime: 1.0e9,
        z_index: -0.5,
        seed: 4242,
    }
}

#[test]
fn location_queries_do_not_grow_with_frames() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    compositor
        .add_layer(&solid_layer(Rgba::hex(0x223344)), -0.7)
        .expect("layer");
    compositor.add_particles(still_particles(8)).expect("particles");

    compositor.render_frame();
    let after_one = compositor.gl().expect("enabled").stats().location_queries();
    assert_eq!(after_one, 8, "3 texture-program names + 5 particle-program names");

    for _ in 0..50 {
        compositor.render_frame();
    }
    let stats = compositor.gl().expect("enabled").stats();
    assert_eq!(stats.location_queries(), 8, "locations are resolved once per program");
    assert_eq!(compositor.frames_rendered(), 51);
}

#[test]
fn size_buffer_uploads_only_when_dirty() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    compositor.add_particles(still_particles(8)).expect("particles");
    let base = compositor.gl().expect("enabled").stats().buffer_uploads;

    compositor.render_frame();
    let first = compositor.gl().expect("enabled").stats().buffer_uploads - base;
    assert_eq!(first, 3, "positions, sizes (initial spawn) and alphas");

    compositor.render_frame();
    compositor.render_frame();
    let total = compositor.gl().expect("enabled").stats().buffer_uploads - base;
    assert_eq!(total, 3 + 2 * 2, "no respawns, so sizes stay on the GPU");
}

#[test]
fn layers_draw_back_to_front_by_z() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    compositor
        .add_layer(&solid_layer(Rgba::hex(0xff0000)), -0.2)
        .expect("front layer");
    compositor
        .add_layer(&solid_layer(Rgba::hex(0x0000ff)), -0.9)
        .expect("back layer");
    assert_eq!(compositor.layer_order(), vec![-0.9, -0.2]);

    compositor.render_frame();
    let frame = compositor.gl().expect("enabled").frame().expect("frame");
    assert_eq!(
        frame.pixel(5, 5),
        Some([255, 0, 0, 255]),
        "the nearer (larger z) opaque layer ends up on top"
    );
}

#[test]
fn translucent_layer_blends_over_the_one_behind() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    compositor
        .add_layer(&solid_layer(Rgba::hex(0x0000ff)), -0.9)
        .expect("back");
    compositor
        .add_layer(&solid_layer(Rgba::new(255, 255, 255, 0.5)), -0.1)
        .expect("front");
    compositor.render_frame();

    let [r, g, b, _] = compositor
        .gl()
        .expect("enabled")
        .frame()
        .expect("frame")
        .pixel(10, 10)
        .expect("pixel");
    assert!(r > 100 && r < 160, "red {r}");
    assert_eq!(r, g);
    assert!(b > 200, "blue {b}");
}

#[test]
fn unavailable_context_degrades_without_error() {
    let mut compositor = Compositor::new(Some(SoftGl::unavailable()), SIZE);
    assert!(!compositor.is_enabled());

    compositor
        .add_layer(&solid_layer(Rgba::WHITE), -0.5)
        .expect("disabled compositor accepts layers");
    compositor.add_particles(still_particles(4)).expect("particles");
    compositor.render_frame();

    assert_eq!(compositor.layer_count(), 0);
    assert_eq!(compositor.particle_system_count(), 0);
    assert_eq!(compositor.frames_rendered(), 0);
}

#[test]
fn missing_context_degrades_without_error() {
    let compositor: Compositor<SoftGl> = Compositor::new(None, SIZE);
    assert!(!compositor.is_enabled());
    assert!(compositor.gl().is_none());
}

#[test]
fn clear_scene_releases_textures() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    for z in [-0.9, -0.8, -0.7] {
        compositor.add_layer(&solid_layer(Rgba::WHITE), z).expect("layer");
    }
    assert_eq!(compositor.gl().expect("enabled").live_textures(), 3);

    compositor.clear_scene();
    assert_eq!(compositor.layer_count(), 0);
    assert_eq!(compositor.gl().expect("enabled").live_textures(), 0);

    compositor.render_frame();
    let frame = compositor.gl().expect("enabled").frame().expect("frame");
    assert_eq!(frame.covered_pixels(), 0);
}

#[test]
fn resize_reallocates_the_color_buffer() {
    let mut compositor = Compositor::try_new(SoftGl::new(), SIZE).expect("compositor");
    compositor.resize(SurfaceSize::new(40, 30));
    compositor.render_frame();
    let frame = compositor.gl().expect("enabled").frame().expect("frame");
    assert_eq!(frame.size(), SurfaceSize::new(40, 30));
}
