//! Theme identities and the immutable layer configurations each theme is generated from.
//!
//! Every randomized layer or decoration group carries its own seed. A [`ThemeDefinition`]
//! refuses to build if two of its streams share a seed, and a [`LayerConfig`] refuses to
//! build without a seed or a z-index, so a cache key always names a reproducible stream.

use std::fmt;
use std::str::FromStr;

use engine::canvas::{CanvasError, Rgba};
use engine::gl::GlError;
use engine::particles::ParticleConfig;
use engine::surface::SurfaceSize;
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("layer configuration is missing `{0}`")]
    MissingField(&'static str),
    #[error("seed {seed} is used by both `{first}` and `{second}`")]
    DuplicateSeed {
        seed: u32,
        first: String,
        second: String,
    },
    #[error("invalid {field} range {min}..{max}")]
    InvalidRange {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error("layer `{0}` declares no colors")]
    EmptyPalette(String),
    #[error("cannot generate a scene for an empty {width}x{height} viewport")]
    EmptyViewport { width: u32, height: u32 },
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    #[error(transparent)]
    Gl(#[from] GlError),
}

// ── Theme ids ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeId {
    #[default]
    HimalayanPeak,
    IceTemple,
    CrystalCave,
    MoonlitForest,
    LanternFestival,
    RainyWindow,
    WolfHour,
    CandlelitMonastery,
}

impl ThemeId {
    pub const ALL: [ThemeId; 8] = [
        ThemeId::HimalayanPeak,
        ThemeId::IceTemple,
        ThemeId::CrystalCave,
        ThemeId::MoonlitForest,
        ThemeId::LanternFestival,
        ThemeId::RainyWindow,
        ThemeId::WolfHour,
        ThemeId::CandlelitMonastery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ThemeId::HimalayanPeak => "himalayan-peak",
            ThemeId::IceTemple => "ice-temple",
            ThemeId::CrystalCave => "crystal-cave",
            ThemeId::MoonlitForest => "moonlit-forest",
            ThemeId::LanternFestival => "lantern-festival",
            ThemeId::RainyWindow => "rainy-window",
            ThemeId::WolfHour => "wolf-hour",
            ThemeId::CandlelitMonastery => "candlelit-monastery",
        }
    }

    /// Next theme in [`ThemeId::ALL`], wrapping around.
    pub fn next(self) -> ThemeId {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThemeId {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| ThemeError::UnknownTheme(s.to_string()))
    }
}

// ── Layer configuration ─────────────────────────────────────────────

/// Shape family a layer is drawn with, plus the parameters only that family reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Sine ridge with jitter; columns above `snow_line * H` get a snow cap.
    Peaks { jaggedness: f32, snow_line: f32 },
    /// Triangles hanging from the ceiling and rising from the floor.
    IceCrystals,
    /// Pentagonal crystals with a gradient glow; `height_factor` scales their length.
    CaveCrystals { height_factor: f32 },
    /// Ground silhouette plus recursive trees, faded out at the top.
    Trees { height_factor: f32 },
    /// Radial gradient blobs.
    Nebula,
    /// Stepped mountain silhouette along the bottom edge.
    Ridge { step: f32 },
    /// Pooled lantern elements; sizes and durations come from the layer ranges.
    Lanterns,
    /// Pooled CSS rain streaks of a fixed width and length.
    RainStreaks { width_px: f32, length_px: f32, drift_px: f32 },
}

impl Geometry {
    fn key_fragment(&self) -> String {
        match self {
            Geometry::Peaks {
                jaggedness,
                snow_line,
            } => format!("peaks{jaggedness}:{snow_line}"),
            Geometry::IceCrystals => "ice".to_string(),
            Geometry::CaveCrystals { height_factor } => format!("cave{height_factor}"),
            Geometry::Trees { height_factor } => format!("trees{height_factor}"),
            Geometry::Nebula => "nebula".to_string(),
            Geometry::Ridge { step } => format!("ridge{step}"),
            Geometry::Lanterns => "lanterns".to_string(),
            Geometry::RainStreaks {
                width_px,
                length_px,
                drift_px,
            } => format!("rain{width_px}x{length_px}:{drift_px}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A validated layer: only [`LayerConfigBuilder::build`] produces one, so the palette is
/// never empty and both ranges are ordered.
pub struct LayerConfig {
    pub(crate) name: &'static str,
    pub(crate) z_index: f32,
    pub(crate) count: usize,
    pub(crate) colors: Vec<Rgba>,
    pub(crate) min_size: f32,
    pub(crate) max_size: f32,
    pub(crate) min_duration: f32,
    pub(crate) max_duration: f32,
    pub(crate) seed: u32,
    pub(crate) geometry: Geometry,
}

impl LayerConfig {
    pub fn builder(name: &'static str, geometry: Geometry) -> LayerConfigBuilder {
        LayerConfigBuilder {
            name,
            geometry,
            z_index: None,
            seed: None,
            count: 0,
            colors: Vec::new(),
            size: (0.0, 0.0),
            duration: (0.0, 0.0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn z_index(&self) -> f32 {
        self.z_index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    pub fn size_range(&self) -> (f32, f32) {
        (self.min_size, self.max_size)
    }

    pub fn duration_range(&self) -> (f32, f32) {
        (self.min_duration, self.max_duration)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Palette entry `i`, wrapping around the palette.
    pub fn color(&self, i: usize) -> Rgba {
        match self.colors.len() {
            0 => Rgba::TRANSPARENT,
            n => self.colors[i % n],
        }
    }

    /// Canonical cache key: every field that reaches the draw, plus the viewport and the
    /// size of the surface actually drawn on.
    pub fn cache_key(
        &self,
        namespace: &str,
        index: usize,
        viewport: SurfaceSize,
        working: SurfaceSize,
    ) -> CacheKey {
        let colors = self
            .colors
            .iter()
            .map(Rgba::to_string)
            .collect::<Vec<_>>()
            .join("|");
        CacheKey::new(format!(
            "{namespace}-{index}-z{}-n{}-c{colors}-s{}..{}-d{}..{}-seed{}-{}-vp{}x{}-{}x{}",
            self.z_index,
            self.count,
            self.min_size,
            self.max_size,
            self.min_duration,
            self.max_duration,
            self.seed,
            self.geometry.key_fragment(),
            viewport.width,
            viewport.height,
            working.width,
            working.height,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct LayerConfigBuilder {
    name: &'static str,
    geometry: Geometry,
    z_index: Option<f32>,
    seed: Option<u32>,
    count: usize,
    colors: Vec<Rgba>,
    size: (f32, f32),
    duration: (f32, f32),
}

impl LayerConfigBuilder {
    pub fn z_index(mut self, z: f32) -> Self {
        self.z_index = Some(z);
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn colors(mut self, colors: &[Rgba]) -> Self {
        self.colors = colors.to_vec();
        self
    }

    pub fn size(mut self, min: f32, max: f32) -> Self {
        self.size = (min, max);
        self
    }

    pub fn duration(mut self, min: f32, max: f32) -> Self {
        self.duration = (min, max);
        self
    }

    pub fn build(self) -> Result<LayerConfig, ThemeError> {
        let z_index = self.z_index.ok_or(ThemeError::MissingField("z_index"))?;
        let seed = self.seed.ok_or(ThemeError::MissingField("seed"))?;
        check_range("size", self.size)?;
        check_range("duration", self.duration)?;
        if self.colors.is_empty() {
            return Err(ThemeError::EmptyPalette(self.name.to_string()));
        }
        Ok(LayerConfig {
            name: self.name,
            z_index,
            count: self.count,
            colors: self.colors,
            min_size: self.size.0,
            max_size: self.size.1,
            min_duration: self.duration.0,
            max_duration: self.duration.1,
            seed,
            geometry: self.geometry,
        })
    }
}

fn check_range(field: &'static str, (min, max): (f32, f32)) -> Result<(), ThemeError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ThemeError::InvalidRange { field, min, max })
    }
}

/// A pooled group of decorative elements: created once from `seed`, reattached afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationGroup {
    pub category: &'static str,
    pub container: &'static str,
    pub count: usize,
    pub seed: u32,
}

// ── Definitions ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ThemeDefinition {
    pub(crate) id: ThemeId,
    pub(crate) layers: Vec<LayerConfig>,
    pub(crate) decorations: Vec<DecorationGroup>,
    pub(crate) particles: Vec<ParticleConfig>,
}

impl ThemeDefinition {
    pub fn new(
        id: ThemeId,
        layers: Vec<LayerConfig>,
        decorations: Vec<DecorationGroup>,
        particles: Vec<ParticleConfig>,
    ) -> Result<Self, ThemeError> {
        let def = Self {
            id,
            layers,
            decorations,
            particles,
        };
        def.check_unique_seeds()?;
        Ok(def)
    }

    pub fn id(&self) -> ThemeId {
        self.id
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    pub fn decorations(&self) -> &[DecorationGroup] {
        &self.decorations
    }

    pub fn particles(&self) -> &[ParticleConfig] {
        &self.particles
    }

    /// Every stream in the theme, labelled for error messages.
    pub fn seeds(&self) -> Vec<(String, u32)> {
        let layers = self.layers.iter().map(|l| (l.name.to_string(), l.seed));
        let groups = self
            .decorations
            .iter()
            .map(|g| (g.category.to_string(), g.seed));
        let particles = self
            .particles
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("particles[{i}]"), p.seed));
        layers.chain(groups).chain(particles).collect()
    }

    fn check_unique_seeds(&self) -> Result<(), ThemeError> {
        let seeds = self.seeds();
        for (i, (first, seed)) in seeds.iter().enumerate() {
            if let Some((second, _)) = seeds[i + 1..].iter().find(|(_, s)| s == seed) {
                return Err(ThemeError::DuplicateSeed {
                    seed: *seed,
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn decoration(&self, category: &str) -> Option<&DecorationGroup> {
        self.decorations.iter().find(|g| g.category == category)
    }

    pub fn for_theme(id: ThemeId) -> Result<Self, ThemeError> {
        match id {
            ThemeId::HimalayanPeak => himalayan_peak(),
            ThemeId::IceTemple => ice_temple(),
            ThemeId::CrystalCave => crystal_cave(),
            ThemeId::MoonlitForest => moonlit_forest(),
            ThemeId::LanternFestival => lantern_festival(),
            ThemeId::RainyWindow => rainy_window(),
            ThemeId::WolfHour => wolf_hour(),
            ThemeId::CandlelitMonastery => candlelit_monastery(),
        }
    }
}

const fn group(category: &'static str, container: &'static str, count: usize, seed: u32) -> DecorationGroup {
    DecorationGroup {
        category,
        container,
        count,
        seed,
    }
}

#[allow(clippy::too_many_arguments)]
const fn particles(
    count: usize,
    speed: f32,
    size: (f32, f32),
    alpha: (f32, f32),
    lifetime: f32,
    z_index: f32,
    seed: u32,
) -> ParticleConfig {
    ParticleConfig {
        count,
        speed,
        min_size: size.0,
        max_size: size.1,
        min_alpha: alpha.0,
        max_alpha: alpha.1,
        lifetime,
        z_index,
        seed,
    }
}

fn himalayan_peak() -> Result<ThemeDefinition, ThemeError> {
    let peak = |name, z, color, jaggedness, snow_line, seed| {
        LayerConfig::builder(name, Geometry::Peaks { jaggedness, snow_line })
            .z_index(z)
            .colors(&[color])
            .seed(seed)
            .build()
    };
    ThemeDefinition::new(
        ThemeId::HimalayanPeak,
        vec![
            peak("far-peaks", -0.9, Rgba::new(60, 70, 90, 0.7), 0.3, 0.4, 12345)?,
            peak("mid-peaks", -0.8, Rgba::new(80, 90, 110, 0.8), 0.5, 0.3, 23456)?,
            peak("near-peaks", -0.7, Rgba::new(100, 110, 130, 0.9), 0.7, 0.2, 34567)?,
        ],
        vec![
            group("clouds", "himalayan-clouds", 10, 4101),
            group("prayer-flags", "himalayan-flags", 15, 4102),
            group("sun-rays", "himalayan-sun-rays", 25, 4103),
        ],
        vec![particles(70, 0.5, (1.0, 2.5), (0.2, 0.7), 1000.0, -0.6, 4104)],
    )
}

fn ice_temple() -> Result<ThemeDefinition, ThemeError> {
    let layer = |name, z, count, color, seed| {
        LayerConfig::builder(name, Geometry::IceCrystals)
            .z_index(z)
            .count(count)
            .colors(&[color])
            .seed(seed)
            .build()
    };
    ThemeDefinition::new(
        ThemeId::IceTemple,
        vec![
            layer("far-ice", -0.9, 20, Rgba::new(150, 180, 220, 0.3), 5201)?,
            layer("mid-ice", -0.8, 15, Rgba::new(180, 210, 240, 0.4), 5202)?,
            layer("near-ice", -0.7, 10, Rgba::new(210, 230, 255, 0.5), 5203)?,
        ],
        vec![
            group("aurora", "ice-temple-aurora", 3, 5204),
            group("waterfalls", "ice-temple-waterfalls", 4, 5205),
            group("refraction", "ice-temple-refractions", 15, 5206),
            group("sculptures", "ice-temple-sculptures", 2, 5207),
        ],
        vec![particles(80, 1.5, (2.0, 5.0), (0.5, 1.0), 800.0, -0.5, 5208)],
    )
}

fn crystal_cave() -> Result<ThemeDefinition, ThemeError> {
    let layer = |name, z, count, colors: &[Rgba], height_factor, seed| {
        LayerConfig::builder(name, Geometry::CaveCrystals { height_factor })
            .z_index(z)
            .count(count)
            .colors(colors)
            .seed(seed)
            .build()
    };
    ThemeDefinition::new(
        ThemeId::CrystalCave,
        vec![
            layer(
                "far-crystals",
                -0.9,
                12,
                &[
                    Rgba::new(30, 20, 60, 0.6),
                    Rgba::new(20, 30, 70, 0.6),
                    Rgba::new(40, 20, 80, 0.6),
                ],
                0.6,
                6301,
            )?,
            layer(
                "mid-crystals",
                -0.8,
                10,
                &[
                    Rgba::new(60, 40, 100, 0.7),
                    Rgba::new(30, 60, 90, 0.7),
                    Rgba::new(50, 80, 100, 0.7),
                ],
                0.75,
                6302,
            )?,
            layer(
                "near-crystals",
                -0.7,
                8,
                &[
                    Rgba::new(80, 60, 130, 0.8),
                    Rgba::new(50, 90, 130, 0.8),
                    Rgba::new(70, 100, 150, 0.8),
                ],
                0.85,
                6303,
            )?,
        ],
        vec![
            group("glow-clusters", "crystal-cave-glow-clusters", 20, 6304),
            group("moss", "crystal-cave-moss", 15, 6305),
            group("refraction", "crystal-cave-refractions", 8, 6306),
        ],
        vec![
            particles(25, 0.8, (4.0, 10.0), (0.4, 0.8), 1500.0, -0.4, 6307),
            particles(100, 0.2, (1.0, 2.5), (0.3, 0.7), 2000.0, -0.3, 6308),
        ],
    )
}

fn moonlit_forest() -> Result<ThemeDefinition, ThemeError> {
    let layer = |name, trunk, foliage, count, height_factor, seed| {
        LayerConfig::builder(name, Geometry::Trees { height_factor })
            .z_index(0.0)
            .count(count)
            .colors(&[trunk, foliage])
            .seed(seed)
            .build()
    };
    ThemeDefinition::new(
        ThemeId::MoonlitForest,
        vec![
            layer("moonlit-forest-back", Rgba::hex(0x7A9B7E), Rgba::hex(0x5A8067), 40, 0.7, 7401)?,
            layer("moonlit-forest-mid", Rgba::hex(0x3D5F4A), Rgba::hex(0x4A6B56), 30, 0.85, 7402)?,
            layer("moonlit-forest-front", Rgba::hex(0x1A2820), Rgba::hex(0x2F4A3A), 20, 1.0, 7403)?,
        ],
        vec![
            group("mushrooms", "glowing-mushrooms", 30, 7404),
            group("moonbeams", "moonbeam-container", 10, 7405),
            group("eyes", "moonlit-wildlife", 7, 7406),
            group("owl", "moonlit-wildlife", 1, 7407),
            group("leaves", "moonlit-forest-leaves", 10, 7408),
        ],
        Vec::new(),
    )
}

fn lantern_festival() -> Result<ThemeDefinition, ThemeError> {
    let palette = [
        Rgba::hex(0xff7675),
        Rgba::hex(0xfeca57),
        Rgba::hex(0xff9f43),
        Rgba::hex(0xee5253),
        Rgba::hex(0xab54c5),
    ];
    let depth = |name, count, size: (f32, f32), duration: (f32, f32), z, seed| {
        LayerConfig::builder(name, Geometry::Lanterns)
            .z_index(z)
            .count(count)
            .colors(&palette)
            .size(size.0, size.1)
            .duration(duration.0, duration.1)
            .seed(seed)
            .build()
    };
    ThemeDefinition::new(
        ThemeId::LanternFestival,
        vec![
            depth("lanterns-back", 20, (20.0, 40.0), (40.0, 60.0), -0.9, 88888)?,
            depth("lanterns-mid", 15, (40.0, 60.0), (30.0, 50.0), -0.8, 88889)?,
            depth("lanterns-front", 10, (60.0, 80.0), (20.0, 40.0), -0.7, 88890)?,
        ],
        vec![
            group("reflections", "lantern-water", 10, 88891),
            group("petals", "lantern-petals", 20, 88892),
            group("embers", "lantern-embers", 40, 88893),
        ],
        Vec::new(),
    )
}

fn rainy_window() -> Result<ThemeDefinition, ThemeError> {
    let sheet = |name, count, width_px, length_px, base: f32, drift_px, seed| {
        LayerConfig::builder(
            name,
            Geometry::RainStreaks {
                width_px,
                length_px,
                drift_px,
            },
        )
        .z_index(0.0)
        .count(count)
        .colors(&[Rgba::new(220, 230, 255, 0.6)])
        .duration(base, base + 0.2)
        .seed(seed)
        .build()
    };
    ThemeDefinition::new(
        ThemeId::RainyWindow,
        vec![
            sheet("rain-back", 50, 0.8, 40.0, 0.6, -10.0, 8501)?,
            sheet("rain-mid", 60, 1.0, 60.0, 0.5, -15.0, 8502)?,
            sheet("rain-front", 30, 1.2, 80.0, 0.4, -20.0, 8503)?,
        ],
        vec![group("window-drops", "rain-overlay", 150, 8504)],
        Vec::new(),
    )
}

fn wolf_hour() -> Result<ThemeDefinition, ThemeError> {
    ThemeDefinition::new(
        ThemeId::WolfHour,
        vec![
            LayerConfig::builder("nebula", Geometry::Nebula)
                .z_index(0.0)
                .count(50)
                .colors(&[
                    Rgba::new(200, 200, 200, 1.0),
                    Rgba::new(150, 150, 150, 0.5),
                    Rgba::new(100, 100, 100, 0.0),
                ])
                .size(100.0, 300.0)
                .seed(9601)
                .build()?,
            LayerConfig::builder("mountains", Geometry::Ridge { step: 20.0 })
                .z_index(0.0)
                .colors(&[Rgba::hex(0x404040)])
                .size(200.0, 500.0)
                .seed(9602)
                .build()?,
        ],
        Vec::new(),
        Vec::new(),
    )
}

fn candlelit_monastery() -> Result<ThemeDefinition, ThemeError> {
    ThemeDefinition::new(
        ThemeId::CandlelitMonastery,
        Vec::new(),
        Vec::new(),
        vec![particles(15, 0.5, (2.0, 10.0), (0.1, 0.3), 1800.0, -0.5, 1701)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_builder() -> LayerConfigBuilder {
        LayerConfig::builder(
            "test",
            Geometry::Peaks {
                jaggedness: 0.5,
                snow_line: 0.3,
            },
        )
        .colors(&[Rgba::WHITE])
    }

    fn peak(seed: Option<u32>, z: Option<f32>) -> Result<LayerConfig, ThemeError> {
        let mut b = peak_builder();
        if let Some(seed) = seed {
            b = b.seed(seed);
        }
        if let Some(z) = z {
            b = b.z_index(z);
        }
        b.build()
    }

    #[test]
    fn builder_rejects_missing_seed_and_z() {
        assert!(matches!(peak(None, Some(-0.5)), Err(ThemeError::MissingField("seed"))));
        assert!(matches!(peak(Some(1), None), Err(ThemeError::MissingField("z_index"))));
        assert!(peak(Some(1), Some(-0.5)).is_ok());
    }

    #[test]
    fn builder_rejects_inverted_ranges_and_empty_palettes() {
        let inverted = LayerConfig::builder("x", Geometry::Lanterns)
            .z_index(0.0)
            .seed(1)
            .colors(&[Rgba::WHITE])
            .size(10.0, 5.0)
            .build();
        assert!(matches!(inverted, Err(ThemeError::InvalidRange { field: "size", .. })));

        let empty = LayerConfig::builder("x", Geometry::Lanterns)
            .z_index(0.0)
            .seed(1)
            .build();
        assert!(matches!(empty, Err(ThemeError::EmptyPalette(_))));
    }

    #[test]
    fn every_builtin_theme_uses_distinct_seeds() {
        for id in ThemeId::ALL {
            let def = ThemeDefinition::for_theme(id).expect("builtin theme should validate");
            let mut seeds: Vec<u32> = def.seeds().into_iter().map(|(_, s)| s).collect();
            let total = seeds.len();
            seeds.sort_unstable();
            seeds.dedup();
            assert_eq!(seeds.len(), total, "{id} repeats a seed");
        }
    }

    #[test]
    fn duplicate_seeds_are_rejected() {
        let a = peak(Some(7), Some(-0.9)).expect("layer");
        let b = peak(Some(7), Some(-0.8)).expect("layer");
        let err = ThemeDefinition::new(ThemeId::HimalayanPeak, vec![a, b], Vec::new(), Vec::new())
            .expect_err("duplicate seed");
        assert!(matches!(err, ThemeError::DuplicateSeed { seed: 7, .. }));
    }

    #[test]
    fn definitions_validate_seeds_across_every_stream() {
        let layer = peak(Some(41), Some(-0.9)).expect("layer");
        assert_eq!(layer.seed(), 41);
        assert_eq!(layer.colors(), &[Rgba::WHITE]);
        assert_eq!(layer.color(5), Rgba::WHITE, "palette index wraps");

        let clash = ThemeDefinition::new(
            ThemeId::IceTemple,
            vec![layer.clone()],
            vec![group("icicles", "ice-icicles", 4, 41)],
            Vec::new(),
        )
        .expect_err("layer and decoration share a seed");
        assert!(matches!(clash, ThemeError::DuplicateSeed { seed: 41, .. }));

        let def = ThemeDefinition::new(
            ThemeId::IceTemple,
            vec![layer],
            vec![group("icicles", "ice-icicles", 4, 42)],
            Vec::new(),
        )
        .expect("distinct seeds");
        assert_eq!(def.id(), ThemeId::IceTemple);
        assert_eq!(def.layers().len(), 1);
        assert_eq!(def.decorations()[0].seed, 42);

        let no_palette = peak_builder().colors(&[]).seed(43).z_index(0.0).build();
        assert!(matches!(no_palette, Err(ThemeError::EmptyPalette(_))));
    }

    #[test]
    fn cache_key_tracks_every_visual_input() {
        let layer = peak(Some(12345), Some(-0.9)).expect("layer");
        let vp = SurfaceSize::new(1024, 768);
        let base = layer.cache_key("peaks", 0, vp, vp);

        let wider = SurfaceSize::new(1280, 768);
        assert_ne!(base, layer.cache_key("peaks", 0, wider, vp));
        assert_ne!(base, layer.cache_key("peaks", 0, vp, wider));
        assert_ne!(base, layer.cache_key("peaks", 1, vp, vp));

        let recolored = peak_builder()
            .seed(12345)
            .z_index(-0.9)
            .colors(&[Rgba::new(1, 2, 3, 0.5)])
            .build()
            .expect("layer");
        assert_ne!(base, recolored.cache_key("peaks", 0, vp, vp));

        let reseeded = peak(Some(54321), Some(-0.9)).expect("layer");
        assert_ne!(base, reseeded.cache_key("peaks", 0, vp, vp));

        assert_eq!(base, layer.clone().cache_key("peaks", 0, vp, vp));
    }

    #[test]
    fn theme_names_parse_and_cycle() {
        assert_eq!("wolf_hour".parse::<ThemeId>().expect("parse"), ThemeId::WolfHour);
        assert_eq!(" Ice-Temple ".parse::<ThemeId>().expect("parse"), ThemeId::IceTemple);
        assert!("disco".parse::<ThemeId>().is_err());
        assert_eq!(ThemeId::CandlelitMonastery.next(), ThemeId::HimalayanPeak);
        for id in ThemeId::ALL {
            assert_eq!(id.to_string().parse::<ThemeId>().expect("round trip"), id);
        }
    }
}
