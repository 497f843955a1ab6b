//! Rainy window: pooled CSS rain sheets behind the board, and a per-frame simulation of drops
//! running down the glass that merge, streak and fall off the bottom.

use engine::canvas::{Canvas2d, CanvasError, Path, Raster, Rgba};
use engine::rng::SeededRandom;
use engine::surface::SurfaceSize;

use super::{GenerationContext, SceneOutput, pooled, round4};
use crate::theme::{Geometry, ThemeDefinition, ThemeError};

const STREAK: Rgba = Rgba::new(220, 230, 255, 0.3);
const DROP: Rgba = Rgba::new(220, 230, 255, 0.6);
const MAX_RADIUS: f32 = 15.0;
/// Drops larger than this start leaving a streak, and keep it.
const STREAK_RADIUS: f32 = 3.5;
/// Probability-per-frame threshold: a new drop appears when a draw exceeds it.
const SPAWN_THRESHOLD: f64 = 0.8;
const OFFSCREEN_MARGIN: f32 = 50.0;

pub(super) fn generate(
    def: &ThemeDefinition,
    ctx: &mut GenerationContext<'_>,
    out: &mut SceneOutput,
) -> Result<(), ThemeError> {
    for layer in &def.layers {
        let Geometry::RainStreaks {
            width_px,
            length_px,
            drift_px,
        } = layer.geometry
        else {
            continue;
        };
        let base = layer.min_duration as f64;
        let spread = (layer.max_duration - layer.min_duration) as f64;
        pooled(
            ctx,
            out,
            def.id,
            layer.name,
            layer.name,
            layer.count,
            layer.seed,
            |rng, _, el| {
                el.set_percent("left", round4(rng.next_f64() * 105.0));
                el.set_px("width", width_px as f64);
                el.set_px("height", length_px as f64);
                el.set_px("--drift", drift_px as f64);
                let duration = rng.next_f64() * spread + base;
                el.set_seconds("animation-duration", round4(duration));
                el.set_seconds("animation-delay", round4(-rng.next_f64() * duration * 5.0));
            },
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Raindrop {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub vy: f32,
    pub streaking: bool,
}

/// Drops on the window pane, redrawn onto an overlay raster every frame.
#[derive(Debug)]
pub struct RainSimulation {
    rng: SeededRandom,
    drops: Vec<Raindrop>,
    canvas: Canvas2d,
    overlay: Raster,
    merges: u64,
}

impl RainSimulation {
    pub fn new(size: SurfaceSize, seed: u32, initial: usize) -> Result<Self, CanvasError> {
        let mut sim = Self {
            rng: SeededRandom::new(seed),
            drops: Vec::with_capacity(initial * 2),
            canvas: Canvas2d::new(size)?,
            overlay: Raster::new(size)?,
            merges: 0,
        };
        for _ in 0..initial {
            let drop = sim.spawn(true);
            sim.drops.push(drop);
        }
        Ok(sim)
    }

    fn spawn(&mut self, initial: bool) -> Raindrop {
        let (w, h) = (self.canvas.width(), self.canvas.height());
        let x = self.rng.next_f32() * w;
        let y = if initial {
            self.rng.next_f32() * h
        } else {
            -OFFSCREEN_MARGIN
        };
        Raindrop {
            x,
            y,
            r: self.rng.next_f32() * 1.5 + 1.0,
            vy: self.rng.next_f32() * 3.0 + 2.0,
            streaking: false,
        }
    }

    pub fn drops(&self) -> &[Raindrop] {
        &self.drops
    }

    pub fn merges(&self) -> u64 {
        self.merges
    }

    pub fn frame(&self) -> &Raster {
        &self.overlay
    }

    /// Advances one frame and redraws the overlay.
    ///
    /// Drops are visited newest first. A drop that touches an older one absorbs it, growing to
    /// `sqrt(r1² + r2²)` capped at 15px. Drops more than 50px below the pane are removed.
    pub fn step(&mut self) -> &Raster {
        self.canvas.clear();
        if self.rng.chance_above(SPAWN_THRESHOLD) {
            let drop = self.spawn(false);
            self.drops.push(drop);
        }

        let bottom = self.canvas.height() + OFFSCREEN_MARGIN;
        let mut absorbed = vec![false; self.drops.len()];
        for i in (0..self.drops.len()).rev() {
            if absorbed[i] {
                continue;
            }
            let mut drop = self.drops[i];
            if drop.r > STREAK_RADIUS {
                drop.streaking = true;
            }
            drop.y += drop.vy;
            if drop.streaking {
                self.canvas.set_stroke(STREAK);
                self.canvas.set_line_width(drop.r * 0.6);
                self.canvas
                    .stroke_path(&Path::segment(drop.x, drop.y - drop.r * 4.0, drop.x, drop.y));
            }
            self.canvas.set_fill(DROP);
            self.canvas.fill_circle(drop.x, drop.y, drop.r);

            let touching = (0..i).rev().find(|&j| {
                if absorbed[j] {
                    return false;
                }
                let other = &self.drops[j];
                let (dx, dy) = (drop.x - other.x, drop.y - other.y);
                let reach = drop.r + other.r;
                dx * dx + dy * dy < reach * reach
            });
            if let Some(j) = touching {
                let other = self.drops[j].r;
                drop.r = (drop.r * drop.r + other * other).sqrt().min(MAX_RADIUS);
                absorbed[j] = true;
                self.merges += 1;
            }
            if drop.y > bottom {
                absorbed[i] = true;
            }
            self.drops[i] = drop;
        }

        let mut keep = absorbed.into_iter().map(|gone| !gone);
        self.drops.retain(|_| keep.next().unwrap_or(true));
        self.canvas.read_into(&mut self.overlay);
        &self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_drops_start_on_the_pane() {
        let size = SurfaceSize::new(200, 120);
        let sim = RainSimulation::new(size, 8504, 150).expect("simulation");
        assert_eq!(sim.drops().len(), 150);
        for d in sim.drops() {
            assert!((0.0..=200.0).contains(&d.x));
            assert!((0.0..=120.0).contains(&d.y));
            assert!((1.0..=2.5).contains(&d.r));
            assert!((2.0..=5.0).contains(&d.vy));
        }
    }

    #[test]
    fn overlapping_drops_merge_into_the_newer_one() {
        let mut sim = RainSimulation::new(SurfaceSize::new(50, 50), 1, 0).expect("simulation");
        let drop = |r| Raindrop {
            x: 10.0,
            y: 10.0,
            r,
            vy: 0.0,
            streaking: false,
        };
        sim.drops = vec![drop(3.0), drop(4.0)];
        sim.rng = SeededRandom::new(0);
        sim.step();

        let survivors: Vec<_> = sim.drops().iter().filter(|d| d.y >= 0.0).collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].r, 5.0);
        assert!(survivors[0].streaking, "radius above 3.5 streaks");
        assert_eq!(sim.merges(), 1);
    }

    #[test]
    fn merged_radius_is_capped() {
        let mut sim = RainSimulation::new(SurfaceSize::new(50, 50), 1, 0).expect("simulation");
        let drop = |r| Raindrop {
            x: 20.0,
            y: 20.0,
            r,
            vy: 0.0,
            streaking: true,
        };
        sim.drops = vec![drop(12.0), drop(12.0)];
        sim.step();
        let max = sim.drops().iter().map(|d| d.r).fold(0.0, f32::max);
        assert_eq!(max, MAX_RADIUS);
    }

    #[test]
    fn drops_below_the_pane_are_culled() {
        let mut sim = RainSimulation::new(SurfaceSize::new(50, 50), 1, 0).expect("simulation");
        sim.drops = vec![Raindrop {
            x: 5.0,
            y: 99.0,
            r: 1.0,
            vy: 5.0,
            streaking: false,
        }];
        sim.step();
        assert!(sim.drops().iter().all(|d| d.y <= 100.0));
    }

    #[test]
    fn overlay_is_redrawn_each_frame() {
        let mut sim = RainSimulation::new(SurfaceSize::new(64, 64), 8504, 40).expect("simulation");
        let first = sim.step().sha256_hex();
        let second = sim.step().sha256_hex();
        assert_ne!(first, second, "drops move every frame");
        assert!(sim.frame().covered_pixels() > 0);
    }
}
