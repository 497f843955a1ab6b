use engine::canvas::{Canvas2d, Composite, Gradient, Path, Rgba};
use engine::graphics::{CpuRenderer, Renderer2d};
use engine::surface::SurfaceSize;
use engine::ui::Rect;

#[test]
fn fill_rect_clips_to_frame() {
    let size = SurfaceSize::new(4, 4);
    let mut frame = vec![0u8; size.rgba_len()];
    let mut gfx = CpuRenderer::new(&mut frame, size);
    gfx.fill_rect(Rect::new(2, 2, 10, 10), [1, 2, 3, 255]);

    assert_eq!(&frame[0..4], &[0, 0, 0, 0]);
    let last = size.rgba_len() - 4;
    assert_eq!(&frame[last..], &[1, 2, 3, 255]);
}

#[test]
fn blend_rect_mixes_with_background() {
    let size = SurfaceSize::new(2, 2);
    let mut frame = vec![0u8; size.rgba_len()];
    let mut gfx = CpuRenderer::new(&mut frame, size);
    gfx.clear([0, 0, 0, 255]);
    gfx.blend_rect(Rect::from_size(2, 2), [255, 255, 255, 255], 51);
    assert_eq!(&frame[0..4], &[51, 51, 51, 255]);
}

#[test]
fn blit_raster_respects_source_alpha() {
    let mut canvas = Canvas2d::new(SurfaceSize::new(3, 1)).expect("canvas");
    canvas.set_fill(Rgba::new(255, 0, 0, 1.0));
    canvas.fill_rect(0.0, 0.0, 1.0, 1.0);
    canvas.set_fill(Rgba::new(255, 0, 0, 0.2));
    canvas.fill_rect(1.0, 0.0, 1.0, 1.0);
    let raster = canvas.into_raster();

    let size = SurfaceSize::new(3, 1);
    let mut frame = vec![0u8; size.rgba_len()];
    let mut gfx = CpuRenderer::new(&mut frame, size);
    gfx.clear([0, 0, 255, 255]);
    gfx.blit_raster(0, 0, &raster);

    assert_eq!(&frame[0..4], &[255, 0, 0, 255]);
    assert_eq!(&frame[4..8], &[51, 0, 204, 255]);
    assert_eq!(&frame[8..12], &[0, 0, 255, 255], "transparent texels leave the frame alone");
}

#[test]
fn rect_outline_draws_only_edges() {
    let size = SurfaceSize::new(5, 5);
    let mut frame = vec![0u8; size.rgba_len()];
    let mut gfx = CpuRenderer::new(&mut frame, size);
    gfx.rect_outline(Rect::from_size(5, 5), [9, 9, 9, 255]);

    let at = |x: usize, y: usize| &frame[(y * 5 + x) * 4..(y * 5 + x) * 4 + 4];
    assert_eq!(at(0, 0), &[9, 9, 9, 255]);
    assert_eq!(at(4, 2), &[9, 9, 9, 255]);
    assert_eq!(at(2, 2), &[0, 0, 0, 0]);
}

#[test]
fn canvas_draw_calls_count_every_primitive() {
    let mut canvas = Canvas2d::new(SurfaceSize::new(16, 16)).expect("canvas");
    canvas.set_fill(Gradient::radial(8.0, 8.0, 8.0).stop(0.0, Rgba::WHITE).stop(1.0, Rgba::TRANSPARENT));
    canvas.fill_circle(8.0, 8.0, 6.0);
    canvas.fill_path(&Path::polygon(&[[0.0, 0.0], [16.0, 0.0], [8.0, 8.0]]));
    canvas.stroke_path(&Path::segment(0.0, 15.0, 15.0, 15.0));
    canvas.set_composite(Composite::DestinationOut);
    canvas.fill_rect(0.0, 0.0, 16.0, 4.0);
    assert_eq!(canvas.draw_calls(), 4);
    assert!(canvas.to_raster().pixel(8, 1).map(|px| px[3]) == Some(0), "erased by destination-out");
}
