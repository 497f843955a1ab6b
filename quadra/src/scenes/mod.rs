//! Scene generators, one module per theme family.
//!
//! A generator turns a [`ThemeDefinition`] into a [`SceneOutput`] without touching the
//! compositor or the host. Every artifact goes through a cache or pool first, so a second
//! activation at the same viewport draws nothing and draws no random numbers.

mod crystal_cave;
mod forest;
mod ice_temple;
mod lanterns;
mod mountains;
pub mod rain;
mod wolf_hour;

use std::sync::Arc;

use engine::canvas::{Canvas2d, Raster};
use engine::particles::ParticleConfig;
use engine::rng::SeededRandom;
use engine::surface::SurfaceSize;
use serde::Serialize;

use crate::cache::{GenerationCache, PoolRegistry};
use crate::dom::{BackgroundImage, VisualElement};
use crate::theme::{DecorationGroup, LayerConfig, ThemeDefinition, ThemeError, ThemeId};

/// Counters describing what one activation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneReport {
    pub layers_generated: u32,
    pub layers_cached: u32,
    /// Compositor layers skipped because no GPU context is available.
    pub layers_skipped: u32,
    pub elements_created: u32,
    pub elements_reattached: u32,
    pub rng_draws: u64,
    pub draw_calls: u64,
    pub particle_systems: u32,
}

/// A finished raster bound for the compositor.
#[derive(Debug, Clone)]
pub struct CompositedLayer {
    pub raster: Arc<Raster>,
    pub z_index: f32,
}

/// Everything an activation hands to the compositor and the host.
#[derive(Debug, Clone, Default)]
pub struct SceneOutput {
    pub layers: Vec<CompositedLayer>,
    pub backgrounds: Vec<(&'static str, BackgroundImage)>,
    pub attachments: Vec<(&'static str, Vec<VisualElement>)>,
    pub particles: Vec<ParticleConfig>,
    pub report: SceneReport,
}

impl SceneOutput {
    /// Containers this scene writes to, in first-use order.
    pub fn containers(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        let all = self
            .backgrounds
            .iter()
            .map(|(c, _)| *c)
            .chain(self.attachments.iter().map(|(c, _)| *c));
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Process-wide artifact storage shared by every generator.
#[derive(Debug)]
pub struct SceneCaches {
    pub layers: GenerationCache<Arc<Raster>>,
    pub backgrounds: GenerationCache<BackgroundImage>,
    pub pools: PoolRegistry,
}

impl Default for SceneCaches {
    fn default() -> Self {
        Self {
            layers: GenerationCache::new("layer"),
            backgrounds: GenerationCache::new("background"),
            pools: PoolRegistry::default(),
        }
    }
}

pub struct GenerationContext<'a> {
    pub viewport: SurfaceSize,
    /// False when the compositor is disabled; compositor layers are then skipped entirely.
    pub gpu_enabled: bool,
    pub caches: &'a mut SceneCaches,
}

/// Builds the artifacts of `def` at the context's viewport.
pub fn generate(def: &ThemeDefinition, ctx: &mut GenerationContext<'_>) -> Result<SceneOutput, ThemeError> {
    if ctx.viewport.is_empty() {
        return Err(ThemeError::EmptyViewport {
            width: ctx.viewport.width,
            height: ctx.viewport.height,
        });
    }
    let mut out = SceneOutput::default();
    match def.id {
        ThemeId::HimalayanPeak => mountains::generate(def, ctx, &mut out)?,
        ThemeId::IceTemple => ice_temple::generate(def, ctx, &mut out)?,
        ThemeId::CrystalCave => crystal_cave::generate(def, ctx, &mut out)?,
        ThemeId::MoonlitForest => forest::generate(def, ctx, &mut out)?,
        ThemeId::LanternFestival => lanterns::generate(def, ctx, &mut out)?,
        ThemeId::RainyWindow => rain::generate(def, ctx, &mut out)?,
        ThemeId::WolfHour => wolf_hour::generate(def, ctx, &mut out)?,
        ThemeId::CandlelitMonastery => {}
    }
    for config in &def.particles {
        if ctx.gpu_enabled {
            out.particles.push(*config);
            out.report.particle_systems += 1;
        }
    }
    Ok(out)
}

// ── Shared generation paths ─────────────────────────────────────────

/// Draws `layer` onto a fresh `working`-sized canvas with its own seeded stream.
fn render_layer(
    layer: &LayerConfig,
    working: SurfaceSize,
    report: &mut SceneReport,
    draw: impl FnOnce(&mut Canvas2d, &mut SeededRandom, &LayerConfig),
) -> Result<Raster, ThemeError> {
    let mut canvas = Canvas2d::new(working)?;
    let mut rng = SeededRandom::new(layer.seed);
    draw(&mut canvas, &mut rng, layer);
    report.rng_draws += rng.draws();
    report.draw_calls += canvas.draw_calls();
    Ok(canvas.into_raster())
}

/// Cache-first path for a compositor layer.
fn composited_layer(
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
    theme: ThemeId,
    index: usize,
    layer: &LayerConfig,
    working: SurfaceSize,
    draw: impl FnOnce(&mut Canvas2d, &mut SeededRandom, &LayerConfig),
) -> Result<(), ThemeError> {
    if !ctx.gpu_enabled {
        out.report.layers_skipped += 1;
        return Ok(());
    }
    let key = layer.cache_key(theme.name(), index, ctx.viewport, working);
    let report = &mut out.report;
    let (raster, hit) = ctx.caches.layers.get_or_try_insert_with(&key, || {
        render_layer(layer, working, report, draw).map(Arc::new)
    })?;
    if hit {
        out.report.layers_cached += 1;
    } else {
        out.report.layers_generated += 1;
    }
    out.layers.push(CompositedLayer {
        raster,
        z_index: layer.z_index,
    });
    Ok(())
}

/// Cache-first path for a raster delivered as a container background.
#[allow(clippy::too_many_arguments)]
fn background_layer(
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
    theme: ThemeId,
    index: usize,
    layer: &LayerConfig,
    container: &'static str,
    working: SurfaceSize,
    display: SurfaceSize,
    draw: impl FnOnce(&mut Canvas2d, &mut SeededRandom, &LayerConfig),
) -> Result<(), ThemeError> {
    let key = layer.cache_key(theme.name(), index, ctx.viewport, working);
    let report = &mut out.report;
    let (image, hit) = ctx.caches.backgrounds.get_or_try_insert_with(&key, || {
        render_layer(layer, working, report, draw).map(|raster| BackgroundImage {
            raster: Arc::new(raster),
            size: display,
        })
    })?;
    if hit {
        out.report.layers_cached += 1;
    } else {
        out.report.layers_generated += 1;
    }
    out.backgrounds.push((container, image));
    Ok(())
}

/// Pool-first path for a decoration group. `build` gets the group's seeded stream.
#[allow(clippy::too_many_arguments)]
fn pooled(
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
    theme: ThemeId,
    category: &'static str,
    container: &'static str,
    count: usize,
    seed: u32,
    mut build: impl FnMut(&mut SeededRandom, usize, &mut VisualElement),
) {
    let mut rng = SeededRandom::new(seed);
    let (elements, hit) = ctx
        .caches
        .pools
        .get_or_build(theme, category, count, |i, el| build(&mut rng, i, el));
    if hit {
        out.report.elements_reattached += elements.len() as u32;
    } else {
        out.report.elements_created += elements.len() as u32;
        out.report.rng_draws += rng.draws();
    }
    out.attachments.push((container, elements));
}

fn decoration(
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
    theme: ThemeId,
    group: &DecorationGroup,
    build: impl FnMut(&mut SeededRandom, usize, &mut VisualElement),
) {
    pooled(
        ctx,
        out,
        theme,
        group.category,
        group.container,
        group.count,
        group.seed,
        build,
    );
}

/// Working surface of a fixed width whose height follows the viewport, capped at `max_height`.
fn fixed_width(width: u32, viewport: SurfaceSize, max_height: u32) -> SurfaceSize {
    SurfaceSize::new(width, viewport.height.min(max_height).max(1))
}

/// Rounds to four decimals so generated style strings stay short.
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(caches: &mut SceneCaches, gpu_enabled: bool) -> GenerationContext<'_> {
        GenerationContext {
            viewport: SurfaceSize::new(96, 64),
            gpu_enabled,
            caches,
        }
    }

    #[test]
    fn empty_viewport_is_rejected() {
        let mut caches = SceneCaches::default();
        let def = ThemeDefinition::for_theme(ThemeId::IceTemple).expect("definition");
        let mut ctx = GenerationContext {
            viewport: SurfaceSize::new(0, 64),
            gpu_enabled: true,
            caches: &mut caches,
        };
        assert!(matches!(
            generate(&def, &mut ctx),
            Err(ThemeError::EmptyViewport { width: 0, .. })
        ));
    }

    #[test]
    fn every_theme_generates_then_hits_its_caches() {
        let mut caches = SceneCaches::default();
        for id in ThemeId::ALL {
            let def = ThemeDefinition::for_theme(id).expect("definition");
            let first = generate(&def, &mut ctx(&mut caches, true)).expect("first activation");
            let second = generate(&def, &mut ctx(&mut caches, true)).expect("second activation");
            assert_eq!(second.report.rng_draws, 0, "{id} drew random numbers on a hit");
            assert_eq!(second.report.draw_calls, 0, "{id} drew on a hit");
            assert_eq!(second.report.elements_created, 0, "{id} rebuilt pooled elements");
            assert_eq!(second.report.layers_generated, 0);
            assert_eq!(second.report.layers_cached, first.report.layers_generated);
            assert_eq!(
                second.report.elements_reattached,
                first.report.elements_created
            );
        }
    }

    #[test]
    fn disabled_gpu_skips_compositor_layers_and_particles() {
        let mut caches = SceneCaches::default();
        let def = ThemeDefinition::for_theme(ThemeId::HimalayanPeak).expect("definition");
        let out = generate(&def, &mut ctx(&mut caches, false)).expect("activation");
        assert_eq!(out.report.layers_skipped, 3);
        assert_eq!(out.report.layers_generated, 0);
        assert!(out.layers.is_empty());
        assert!(out.particles.is_empty());
        assert_eq!(out.report.elements_created, 10 + 15 + 25, "DOM decorations still work");
        assert!(caches.layers.is_empty());
    }

    #[test]
    fn containers_are_listed_once() {
        let mut caches = SceneCaches::default();
        let def = ThemeDefinition::for_theme(ThemeId::LanternFestival).expect("definition");
        let out = generate(&def, &mut ctx(&mut caches, true)).expect("activation");
        let containers = out.containers();
        let mut deduped = containers.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(containers.len(), deduped.len());
        assert!(containers.contains(&"lanterns-front"));
    }
}
