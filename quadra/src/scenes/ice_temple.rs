//! Ice temple: crystal spikes hanging from the ceiling and rising from the floor, with
//! aurora curtains, frozen waterfalls, refraction rays and two ice sculptures.

use engine::canvas::{Canvas2d, Path, Rgba};
use engine::rng::SeededRandom;

use super::{GenerationContext, SceneOutput, composited_layer, decoration, round4};
use crate::theme::{LayerConfig, ThemeDefinition, ThemeError};

const EDGE: Rgba = Rgba::new(255, 255, 255, 0.2);
const AURORA_COLORS: [&str; 3] = ["#74b9ff", "#55efc4", "#a29bfe"];
const SCULPTURE_PATHS: [&str; 2] = [
    "M50 0 L100 100 L0 100 Z",
    "M50 0 C0 50, 100 50, 50 100 C100 50, 0 50, 50 0",
];

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    let working = ctx.viewport;
    for (i, layer) in def.layers.iter().enumerate() {
        composited_layer(ctx, out, def.id, i, layer, working, draw_crystals)?;
    }

    if let Some(group) = def.decoration("aurora") {
        decoration(ctx, out, def.id, group, |_, i, el| {
            el.set("--aurora-color", AURORA_COLORS[i % AURORA_COLORS.len()]);
            el.set_seconds("animation-duration", 20.0 + i as f64 * 5.0);
            if i % 2 == 1 {
                el.set("animation-direction", "alternate-reverse");
            }
        });
    }
    if let Some(group) = def.decoration("waterfalls") {
        decoration(ctx, out, def.id, group, |rng, i, el| {
            el.set_percent("left", round4(10.0 + i as f64 * 22.0 + rng.next_f64() * 5.0));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 10.0));
        });
    }
    if let Some(group) = def.decoration("refraction") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("left", round4(rng.next_f64() * 100.0));
            el.set_percent("top", round4(rng.next_f64() * 100.0));
            el.set("transform", format!("rotate({}deg)", round4(rng.next_f64() * 360.0)));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * 10.0));
        });
    }
    if let Some(group) = def.decoration("sculptures") {
        decoration(ctx, out, def.id, group, |_, i, el| {
            let path = SCULPTURE_PATHS[i % SCULPTURE_PATHS.len()];
            el.svg = Some(format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><path d="{path}" fill="rgba(200, 220, 255, 0.3)"/></svg>"#
            ));
            el.set_percent("left", 20.0 + i as f64 * 60.0);
        });
    }
    Ok(())
}

fn draw_crystals(canvas: &mut Canvas2d, rng: &mut SeededRandom, layer: &LayerConfig) {
    let (w, h) = (canvas.width(), canvas.height());
    canvas.set_stroke(EDGE);
    canvas.set_line_width(0.5);
    canvas.set_fill(layer.color(0));

    for _ in 0..layer.count {
        let x = rng.next_f32() * w;
        let spike = rng.next_f32() * h * 0.6 + h * 0.2;
        let half = rng.next_f32() * 60.0 + 30.0;

        let left = spike * (rng.next_f32() * 0.3 + 0.2);
        let right = spike * (rng.next_f32() * 0.3 + 0.2);
        let ceiling = Path::polygon(&[[x, 0.0], [x - half, left], [x + half, right]]);
        canvas.fill_path(&ceiling);
        canvas.stroke_path(&ceiling);

        let left = h - spike * (rng.next_f32() * 0.3 + 0.2);
        let right = h - spike * (rng.next_f32() * 0.3 + 0.2);
        let floor = Path::polygon(&[[x, h], [x - half, left], [x + half, right]]);
        canvas.fill_path(&floor);
        canvas.stroke_path(&floor);
    }
}
