//! Moonlit forest: three wide tree silhouettes delivered as layer backgrounds, plus mushrooms,
//! moonbeams, wildlife and a few falling leaves.

use engine::canvas::{Canvas2d, Composite, Gradient, Path, Rgba};
use engine::rng::SeededRandom;
use engine::surface::SurfaceSize;

use super::{GenerationContext, SceneOutput, background_layer, decoration, round4};
use crate::theme::{Geometry, LayerConfig, ThemeDefinition, ThemeError};

const FOREST_WIDTH: u32 = 4096;
/// Fraction of the layer, from the top, that fades into the sky.
const FADE_FRACTION: f32 = 0.35;

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    for (i, layer) in def.layers.iter().enumerate() {
        let Geometry::Trees { height_factor } = layer.geometry else {
            continue;
        };
        let height = ((ctx.viewport.height as f32 * height_factor).round() as u32).max(1);
        let working = SurfaceSize::new(FOREST_WIDTH, height);
        background_layer(ctx, out, def.id, i, layer, layer.name, working, working, draw_forest)?;
    }

    if let Some(group) = def.decoration("mushrooms") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("left", round4(rng.next_f64() * 98.0));
            el.set_percent("bottom", round4(rng.next_f64() * 90.0));
            el.set("transform", format!("scale({})", round4(rng.next_f64() * 0.4 + 0.6)));
            el.set_seconds("--delay", round4(-rng.next_f64() * 12.0));
        });
    }
    if let Some(group) = def.decoration("moonbeams") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            let angle = rng.next_f64() * 20.0 - 10.0;
            el.set_percent("left", round4(rng.next_f64() * 100.0));
            el.set_deg("--r-start", round4(angle - 8.0));
            el.set_deg("--r-end", round4(angle + 8.0));
            el.set("--opacity", round4(rng.next_f64() * 0.3 + 0.1).to_string());
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 45.0));
        });
    }
    if let Some(group) = def.decoration("eyes") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("left", round4(rng.next_f64() * 95.0));
            el.set_percent("bottom", round4(rng.next_f64() * 40.0));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 12.0));
        });
    }
    if let Some(group) = def.decoration("owl") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 45.0));
        });
    }
    if let Some(group) = def.decoration("leaves") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            let x_start = rng.next_f64() * 100.0;
            el.set("--x-start", format!("{}vw", round4(x_start)));
            el.set(
                "--x-end",
                format!("{}vw", round4(x_start + rng.next_f64() * 15.0 - 7.5)),
            );
            el.set_deg("--r-start", round4(rng.next_f64() * 360.0));
            el.set_deg("--r-end", round4(rng.next_f64() * 540.0 - 270.0));
            let duration = rng.next_f64() * 12.0 + 12.0;
            el.set_seconds("animation-duration", round4(duration));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * duration));
        });
    }
    Ok(())
}

fn draw_forest(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let (w, h) = (canvas.width(), canvas.height());
    let trunk = layer.color(0);
    let foliage = layer.color(1);
    canvas.set_stroke(trunk);

    let mut ground = Path::new();
    ground.move_to(0.0, h);
    let mut ground_y = h * 0.95;
    for col in 0..canvas.size().width {
        ground_y += rng.centered() as f32 * 2.0;
        ground.line_to(col as f32, ground_y);
    }
    ground.line_to(w, h).close();
    canvas.set_fill(foliage);
    canvas.fill_path(&ground);

    for _ in 0..layer.count {
        let x = rng.next_f32() * w;
        let y = h * (0.95 + rng.next_f32() * 0.05);
        let len = h * (0.2 + rng.next_f32() * 0.3);
        let angle = -90.0 + rng.range_f32(-10.0, 10.0);
        let width = 10.0 + rng.next_f32() * (h / 30.0);
        let mut tree = Branching {
            canvas: &mut *canvas,
            rng: &mut *rng,
            foliage,
        };
        tree.branch(x, y, len, angle, width);
    }

    let fade_h = h * FADE_FRACTION;
    canvas.set_composite(Composite::DestinationOut);
    canvas.set_fill(
        Gradient::linear(0.0, 0.0, 0.0, fade_h)
            .stop(0.0, Rgba::new(0, 0, 0, 1.0))
            .stop(0.6, Rgba::new(0, 0, 0, 0.3))
            .stop(1.0, Rgba::new(0, 0, 0, 0.0)),
    );
    canvas.fill_rect(0.0, 0.0, w, fade_h);
    canvas.set_composite(Composite::SourceOver);
}

struct Branching<'a> {
    canvas: &'a mut Canvas2d,
    rng: &'a mut SeededRandom,
    foliage: Rgba,
}

impl Branching<'_> {
    /// Strokes one limb, then continues it and forks two thinner side limbs while it is thick.
    /// Thin short limbs end in a translucent leaf cluster.
    fn branch(&mut self, x: f32, y: f32, len: f32, angle: f32, width: f32) {
        if width < 1.0 && len < 20.0 {
            let radius = self.rng.range_f32(5.0, 15.0);
            let alpha = self.rng.range_f32(0.3, 0.6);
            self.canvas.set_fill(self.foliage);
            self.canvas.set_global_alpha(alpha);
            self.canvas.fill_circle(x, y, radius);
            self.canvas.set_global_alpha(1.0);
            return;
        }
        if len < 10.0 {
            return;
        }

        let rad = angle.to_radians();
        let (x2, y2) = (x + len * rad.cos(), y + len * rad.sin());
        self.canvas.set_line_width(width);
        self.canvas.stroke_path(&Path::segment(x, y, x2, y2));

        let next_len = len * (0.7 + self.rng.next_f32() * 0.15);
        let next_width = width * 0.75;
        let bend = self.rng.range_f32(-15.0, 15.0);
        self.branch(x2, y2, next_len, angle + bend, next_width);
        if width > 1.0 {
            let left = self.rng.range_f32(20.0, 50.0);
            self.branch(x2, y2, next_len * 0.8, angle + left, next_width * 0.8);
            let right = self.rng.range_f32(20.0, 50.0);
            self.branch(x2, y2, next_len * 0.8, angle - right, next_width * 0.8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_erases_the_top_edge() {
        let layer = LayerConfig::builder("forest", Geometry::Trees { height_factor: 1.0 })
            .z_index(0.0)
            .count(6)
            .colors(&[Rgba::hex(0x1A2820), Rgba::hex(0x2F4A3A)])
            .seed(7403)
            .build()
            .expect("layer");
        let mut canvas = Canvas2d::new(SurfaceSize::new(160, 90)).expect("canvas");
        draw_forest(&mut canvas, &mut SeededRandom::new(layer.seed), &layer);
        let raster = canvas.to_raster();
        assert!(
            (0..160).all(|x| raster.pixel(x, 0).map(|p| p[3]).unwrap_or(0) <= 8),
            "top edge is almost fully erased"
        );
        assert!(
            raster.pixel(0, 89).map(|p| p[3]).unwrap_or(0) > 0,
            "ground stays opaque"
        );
    }
}
