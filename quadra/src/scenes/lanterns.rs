//! Lantern festival: three depths of floating lanterns with water reflections under the front
//! row, falling petals and rising embers. Fully pooled.

use engine::rng::SeededRandom;

use super::{GenerationContext, SceneOutput, decoration, pooled, round4};
use crate::dom::VisualElement;
use crate::theme::{Geometry, LayerConfig, ThemeDefinition, ThemeError};

const SHAPES: [&str; 3] = [
    "M10 80 C 10 80, 0 60, 0 40 C 0 20, 10 0, 10 0 L 40 0 C 40 0, 50 20, 50 40 C 50 60, 40 80, 40 80 Z",
    "M0 10 C0 -10, 50 -10, 50 10 L 50 70 C 50 90, 0 90, 0 70 Z",
    "M25 0 L50 40 L25 80 L0 40 Z",
];
const FRONT_LAYER: &str = "lanterns-front";

/// What a reflection copies from the lantern above it.
#[derive(Debug, Clone, Copy)]
struct Placement {
    size: f64,
    left: f64,
    duration: f64,
}

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    let mut front = Vec::new();
    for layer in def.layers.iter().filter(|l| l.geometry == Geometry::Lanterns) {
        let mut placements = Vec::with_capacity(layer.count);
        pooled(
            ctx,
            out,
            def.id,
            layer.name,
            layer.name,
            layer.count,
            layer.seed,
            |rng, _, el| placements.push(build_lantern(rng, layer, el)),
        );
        if layer.name == FRONT_LAYER {
            front = placements;
        }
    }

    if let Some(group) = def.decoration("reflections") {
        // Only reached with an empty `front` when the pool already exists.
        decoration(ctx, out, def.id, group, |rng, i, el| {
            if let Some(above) = front.get(i) {
                build_reflection(rng, *above, el);
            }
        });
    }
    if let Some(group) = def.decoration("petals") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set("--x-start", format!("{}vw", round4(rng.next_f64() * 100.0)));
            el.set("--y-start", "-10vh");
            el.set("--x-end", format!("{}vw", round4(rng.next_f64() * 100.0)));
            el.set("--y-end", "110vh");
            el.set_deg("--r-start", round4(rng.next_f64() * 360.0));
            el.set_deg("--r-end", round4(rng.next_f64() * 720.0 - 360.0));
            let duration = rng.next_f64() * 10.0 + 15.0;
            el.set_seconds("animation-duration", round4(duration));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * duration));
        });
    }
    if let Some(group) = def.decoration("embers") {
        decoration(ctx, out, def.id, group, |rng, _, el| {
            el.set_percent("left", round4(rng.next_f64() * 100.0));
            el.set("bottom", format!("{}vh", round4(-rng.next_f64() * 20.0)));
            let duration = rng.next_f64() * 8.0 + 6.0;
            el.set_seconds("animation-duration", round4(duration));
            el.set_seconds("animation-delay", round4(-rng.next_f64() * duration));
        });
    }
    Ok(())
}

fn build_lantern(rng: &mut SeededRandom, layer: &LayerConfig, el: &mut VisualElement) -> Placement {
    let color = layer.color(rng.index(layer.colors.len()));
    let shape = rng.pick(&SHAPES).copied().unwrap_or(SHAPES[0]);
    el.svg = Some(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 50 80"><g fill="{color}" opacity="0.9"><path d="{shape}"/></g></svg>"#
    ));

    let size = rng.range(layer.min_size as f64, layer.max_size as f64);
    el.set_px("width", round4(size));
    el.set_px("height", round4(size * 1.2));
    let left = rng.next_f64() * 100.0;
    el.set_percent("left", round4(left));

    let duration = rng.range(layer.min_duration as f64, layer.max_duration as f64);
    el.set_seconds("animation-duration", round4(duration));
    el.set_seconds("animation-delay", round4(-rng.next_f64() * duration));
    el.set("--x-sway1", format!("{}vw", round4(rng.centered() * 10.0)));
    el.set("--x-sway2", format!("{}vw", round4(rng.centered() * 10.0)));
    el.set("--start-opacity", round4(rng.next_f64() * 0.5 + 0.5).to_string());

    Placement {
        size,
        left,
        duration,
    }
}

fn build_reflection(rng: &mut SeededRandom, above: Placement, el: &mut VisualElement) {
    let size = round4(above.size);
    el.set_px("width", size).set_px("height", size);
    el.set_percent("left", round4(above.left));
    let duration = round4(above.duration);
    el.set("animation-duration", format!("{duration}s, 4s"));
    let sway_delay = round4(-rng.next_f64() * above.duration);
    let bob_delay = round4(-rng.next_f64() * 4.0);
    el.set("animation-delay", format!("{sway_delay}s, {bob_delay}s"));
    el.set("--x-sway1", format!("{}vw", round4(rng.centered() * 10.0)));
    el.set("--x-sway2", format!("{}vw", round4(rng.centered() * 10.0)));
    el.set("--start-opacity", "0.4");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenes::SceneCaches;
    use crate::theme::ThemeId;
    use engine::surface::SurfaceSize;

    #[test]
    fn reflections_mirror_front_lanterns() {
        let mut caches = SceneCaches::default();
        let def = ThemeDefinition::for_theme(ThemeId::LanternFestival).expect("definition");
        let mut ctx = GenerationContext {
            viewport: SurfaceSize::new(320, 240),
            gpu_enabled: false,
            caches: &mut caches,
        };
        let mut out = SceneOutput::default();
        generate(&def, &mut ctx, &mut out).expect("generate");

        let find = |container: &str| {
            out.attachments
                .iter()
                .find(|(c, _)| *c == container)
                .map(|(_, els)| els.clone())
                .unwrap_or_default()
        };
        let front = find(FRONT_LAYER);
        let water = find("lantern-water");
        assert_eq!(front.len(), 10);
        assert_eq!(water.len(), 10);
        for (lantern, reflection) in front.iter().zip(&water) {
            assert_eq!(lantern.style("left"), reflection.style("left"));
            assert_eq!(lantern.style("width"), reflection.style("width"));
            assert_eq!(reflection.style("--start-opacity"), Some("0.4"));
        }
        assert_eq!(out.report.elements_created, 20 + 15 + 10 + 10 + 20 + 40);
    }
}
