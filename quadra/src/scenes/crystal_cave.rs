//! Crystal cave: massive and regular pentagonal crystals from ceiling and floor with a soft
//! inner glow, plus glowing clusters, moss on the walls and refraction rays.

use engine::canvas::{Canvas2d, Gradient, Path, Rgba};
use engine::rng::SeededRandom;

use super::{GenerationContext, SceneOutput, composited_layer, decoration, fixed_width, round4};
use crate::theme::{Geometry, LayerConfig, ThemeDefinition, ThemeError};

const CAVE_WIDTH: u32 = 2048;
const FACET_EDGE: Rgba = Rgba::new(180, 200, 255, 0.15);
const CLUSTER_COLORS: [&str; 6] = [
    "#9b59b6", "#d896ff", "#10ac84", "#1dd1a1", "#3742fa", "#5f27cd",
];

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    let working = fixed_width(CAVE_WIDTH, ctx.viewport, u32::MAX);
    for (i, layer) in def.layers.iter().enumerate() {
        composited_layer(ctx, out, def.id, i, layer, working, draw_crystals)?;
    }

    if let Some(group) = def.decoration("glow-clusters") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            let color = rng.pick(&CLUSTER_COLORS).copied().unwrap_or(CLUSTER_COLORS[0]);
            el.set("--glow-color", color);
            el.set_percent("left", round4(rng.next_f64() * 95.0 + 2.5));
            el.set_percent("top", round4(rng.next_f64() * 90.0 + 5.0));
            let size = round4(rng.next_f64() * 60.0 + 35.0);
            el.set_px("width", size).set_px("height", size);
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 8.0));
        });
    }
    if let Some(group) = def.decoration("moss") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            // Patches hug the side walls 40% of the time, otherwise the floor or ceiling.
            if rng.next_f64() < 0.4 {
                let left = if rng.chance_above(0.5) {
                    rng.next_f64() * 15.0
                } else {
                    85.0 + rng.next_f64() * 15.0
                };
                el.set_percent("left", round4(left));
                el.set_percent("top", round4(rng.next_f64() * 100.0));
            } else {
                let top = if rng.chance_above(0.5) {
                    rng.next_f64() * 20.0
                } else {
                    80.0 + rng.next_f64() * 20.0
                };
                el.set_percent("top", round4(top));
                el.set_percent("left", round4(rng.next_f64() * 100.0));
            }
            let size = round4(rng.next_f64() * 150.0 + 100.0);
            el.set_px("width", size).set_px("height", size);
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 6.0));
        });
    }
    if let Some(group) = def.decoration("refraction") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("left", round4(rng.next_f64() * 100.0));
            el.set_percent("top", round4(rng.next_f64() * 100.0));
            el.set("transform", format!("rotate({}deg)", round4(rng.next_f64() * 360.0)));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 15.0));
            el.set("opacity", round4(rng.next_f64() * 0.4 + 0.6).to_string());
        });
    }
    Ok(())
}

fn inner_glow(x0: f32, y0: f32, x1: f32, y1: f32) -> Gradient {
    Gradient::linear(x0, y0, x1, y1)
        .stop(0.0, Rgba::new(200, 220, 255, 0.05))
        .stop(0.5, Rgba::new(180, 200, 255, 0.1))
        .stop(1.0, Rgba::new(150, 180, 255, 0.02))
}

fn draw_crystals(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let Geometry::CaveCrystals { height_factor } = layer.geometry else {
        return;
    };
    let (w, h) = (canvas.width(), canvas.height());
    canvas.set_stroke(FACET_EDGE);
    canvas.set_line_width(2.0);

    for _ in 0..layer.count {
        let x = rng.next_f32() * w;
        let color = layer.color(rng.index(layer.colors.len()));
        let massive = rng.chance_above(0.6);
        let base_w = if massive {
            rng.next_f32() * 150.0 + 100.0
        } else {
            rng.next_f32() * 80.0 + 40.0
        };
        let base_h = (rng.next_f32() * 0.4 + 0.4) * h * height_factor;

        if rng.chance_above(0.3) {
            let ceiling = Path::polygon(&[
                [x - base_w / 2.0, 0.0],
                [x - base_w / 4.0, base_h * 0.3],
                [x, base_h],
                [x + base_w / 4.0, base_h * 0.4],
                [x + base_w / 2.0, 0.0],
            ]);
            canvas.set_fill(color);
            canvas.fill_path(&ceiling);
            canvas.stroke_path(&ceiling);
            canvas.set_fill(inner_glow(x, 0.0, x, base_h));
            canvas.fill_path(&ceiling);
        }

        if rng.chance_above(0.3) {
            let fx = rng.next_f32() * w;
            let fw = if massive {
                rng.next_f32() * 140.0 + 90.0
            } else {
                rng.next_f32() * 70.0 + 35.0
            };
            let fh = (rng.next_f32() * 0.4 + 0.35) * h * height_factor;
            let floor = Path::polygon(&[
                [fx - fw / 2.0, h],
                [fx - fw / 4.0, h - fh * 0.4],
                [fx, h - fh],
                [fx + fw / 4.0, h - fh * 0.35],
                [fx + fw / 2.0, h],
            ]);
            canvas.set_fill(color);
            canvas.fill_path(&floor);
            canvas.stroke_path(&floor);
            canvas.set_fill(inner_glow(fx, h, fx, h - fh));
            canvas.fill_path(&floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::surface::SurfaceSize;

    fn layer(seed: u32) -> LayerConfig {
        LayerConfig::builder("cave", Geometry::CaveCrystals { height_factor: 0.75 })
            .z_index(-0.8)
            .count(10)
            .colors(&[
                Rgba::new(60, 40, 100, 0.7),
                Rgba::new(30, 60, 90, 0.7),
                Rgba::new(50, 80, 100, 0.7),
            ])
            .seed(seed)
            .build()
            .expect("layer")
    }

    #[test]
    fn same_seed_draws_identical_pixels() {
        let render = |seed| {
            let mut canvas = Canvas2d::new(SurfaceSize::new(128, 48)).expect("canvas");
            draw_crystals(&mut canvas, &mut SeededRandom::new(seed), &layer(seed));
            canvas.into_raster()
        };
        assert_eq!(render(6302).sha256_hex(), render(6302).sha256_hex());
        assert_ne!(render(6302).sha256_hex(), render(6303).sha256_hex());
    }

    #[test]
    fn every_drawn_crystal_costs_three_primitives() {
        let mut canvas = Canvas2d::new(SurfaceSize::new(128, 48)).expect("canvas");
        draw_crystals(&mut canvas, &mut SeededRandom::new(99), &layer(99));
        assert_eq!(canvas.draw_calls() % 3, 0);
        assert!(canvas.draw_calls() <= 10 * 6);
    }
}
