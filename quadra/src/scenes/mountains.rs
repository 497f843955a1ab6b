//! Himalayan peaks: jagged sine ridges with snow caps, drifting clouds, prayer flags and
//! sun rays.

use std::f32::consts::PI;

use engine::canvas::{Canvas2d, Path, Rgba};
use engine::rng::SeededRandom;

use super::{GenerationContext, SceneOutput, composited_layer, decoration, fixed_width, round4};
use crate::theme::{Geometry, LayerConfig, ThemeDefinition, ThemeError};

const PEAK_WIDTH: u32 = 2048;
const PEAK_MAX_HEIGHT: u32 = 1080;
const SNOW: Rgba = Rgba::new(240, 245, 255, 0.9);
const FLAG_COLORS: [&str; 5] = ["#00a8ff", "#9c88ff", "#fbc531", "#4cd137", "#e84118"];

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    let working = fixed_width(PEAK_WIDTH, ctx.viewport, PEAK_MAX_HEIGHT);
    for (i, layer) in def.layers.iter().enumerate() {
        composited_layer(ctx, out, def.id, i, layer, working, draw_peaks)?;
    }

    if let Some(group) = def.decoration("clouds") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("top", round4(60.0 + rng.next_f64() * 30.0));
            let duration = rng.next_f64() * 100.0 + 120.0;
            el.set_seconds("animation-duration", round4(duration));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * duration));
        });
    }
    if let Some(group) = def.decoration("prayer-flags") {
        decoration(ctx, out, def.id, group, |_, i, el| {
            el.set("background-color", FLAG_COLORS[i % FLAG_COLORS.len()]);
            el.set_percent("left", 5.0 + i as f64 * 6.0);
            el.set_seconds("animation-delay", round4(-(i as f64) * 0.1));
        });
    }
    if let Some(group) = def.decoration("sun-rays") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set("transform", format!("rotate({}deg)", round4(rng.next_f64() * 360.0)));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 12.0));
        });
    }
    Ok(())
}

/// One ridge: a column per pixel, jittered by `jaggedness`, capped with snow above the line.
fn draw_peaks(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let Geometry::Peaks {
        jaggedness,
        snow_line,
    } = layer.geometry
    else {
        return;
    };
    let (w, h) = (canvas.width(), canvas.height());
    let color = layer.color(0);

    let mut ridge = Path::new();
    ridge.move_to(0.0, h);
    for col in 0..canvas.size().width {
        let x = col as f32;
        let angle = x / w * PI * 4.0;
        let mut y = h * 0.7 - angle.sin() * 100.0 - (angle * 0.5).cos() * 50.0;
        y += rng.centered() as f32 * jaggedness * 20.0;
        ridge.line_to(x, y);

        if y < h * snow_line {
            canvas.set_fill(SNOW);
            canvas.fill_rect(x, y - 5.0, 1.0, 10.0);
        }
    }
    ridge.line_to(w, h).close();
    canvas.set_fill(color);
    canvas.fill_path(&ridge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::surface::SurfaceSize;

    #[test]
    fn ridge_draws_one_jitter_per_column() {
        let layer = LayerConfig::builder(
            "peaks",
            Geometry::Peaks {
                jaggedness: 0.5,
                snow_line: 0.3,
            },
        )
        .z_index(-0.8)
        .colors(&[Rgba::new(80, 90, 110, 0.8)])
        .seed(23456)
        .build()
        .expect("layer");
        let mut canvas = Canvas2d::new(SurfaceSize::new(64, 40)).expect("canvas");
        let mut rng = SeededRandom::new(layer.seed);
        draw_peaks(&mut canvas, &mut rng, &layer);
        assert_eq!(rng.draws(), 64);
        assert!(canvas.to_raster().covered_pixels() > 0);
        let bottom = canvas.to_raster().pixel(10, 39).expect("pixel");
        assert!(bottom[3] > 0, "the ridge is filled down to the bottom edge");
    }
}
