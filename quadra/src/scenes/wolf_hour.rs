//! Wolf hour: a grey nebula sky and a dark mountain ridge, both delivered as container
//! backgrounds.

use engine::canvas::{Canvas2d, Gradient, Path};
use engine::rng::SeededRandom;
use engine::surface::SurfaceSize;

use super::{GenerationContext, SceneOutput, background_layer};
use crate::theme::{Geometry, LayerConfig, ThemeDefinition, ThemeError};

const NEBULA_SIZE: SurfaceSize = SurfaceSize::new(2000, 800);
const RIDGE_DISPLAY_WIDTH: u32 = 2000;
const NEBULA_CONTAINER: &str = "wolf-hour-nebula";
const MOUNTAIN_CONTAINER: &str = "wolf-hour-mountains";

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    for (i, layer) in def.layers.iter().enumerate() {
        match layer.geometry {
            Geometry::Nebula => background_layer(
                ctx,
                out,
                def.id,
                i,
                layer,
                NEBULA_CONTAINER,
                NEBULA_SIZE,
                NEBULA_SIZE,
                draw_nebula,
            )?,
            Geometry::Ridge { .. } => {
                let working = ctx.viewport;
                let display = SurfaceSize::new(RIDGE_DISPLAY_WIDTH, ctx.viewport.height);
                background_layer(
                    ctx,
                    out,
                    def.id,
                    i,
                    layer,
                    MOUNTAIN_CONTAINER,
                    working,
                    display,
                    draw_ridge,
                )?
            }
            _ => {}
        }
    }
    Ok(())
}

/// Soft radial blobs whose palette alphas are scaled by a per-blob opacity.
fn draw_nebula(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let (w, h) = (canvas.width(), canvas.height());
    for _ in 0..layer.count {
        let x = rng.next_f32() * w;
        let y = rng.next_f32() * h;
        let radius = rng.range_f32(layer.min_size, layer.max_size);
        let opacity = rng.next_f32() * 0.15 + 0.05;

        let mut gradient = Gradient::radial(x, y, radius);
        for (k, offset) in [0.0, 0.5, 1.0].into_iter().enumerate() {
            let color = layer.color(k);
            gradient = gradient.stop(offset, color.with_alpha(color.a * opacity));
        }
        canvas.set_fill(gradient);
        // Outside the radius the gradient is fully transparent.
        canvas.fill_rect(x - radius, y - radius, radius * 2.0, radius * 2.0);
    }
}

fn draw_ridge(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let Geometry::Ridge { step } = layer.geometry else {
        return;
    };
    let (w, h) = (canvas.width(), canvas.height());
    let mut ridge = Path::new();
    ridge.move_to(0.0, h);
    let mut x = 0.0;
    while x < w {
        let rise = rng.range_f32(layer.min_size, layer.max_size);
        ridge.line_to(x, h - rise - (x * 0.01).sin() * 100.0);
        x += step.max(1.0);
    }
    ridge.line_to(w, h).close();
    canvas.set_fill(layer.color(0));
    canvas.fill_path(&ridge);
}
