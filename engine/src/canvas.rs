//! Software 2D canvas used to pre-render theme layers.
//!
//! Scene generators draw into a [`Canvas2d`] once per cache miss and keep the resulting
//! [`Raster`]. Drawing goes through a `tiny_skia` pixmap; the wrapper exposes the small subset
//! of an HTML canvas context the themes need (solid and gradient paints, polygon fills,
//! strokes, circles, a global alpha and two composite modes) and bumps a draw-call counter
//! on every primitive so callers can prove that a cache hit did no drawing at all.

use std::fmt;

use tiny_skia::{
    BlendMode, FillRule, FilterQuality, GradientStop, LinearGradient, PathBuilder, Pixmap,
    PixmapPaint, Point, RadialGradient, Shader, SpreadMode, Stroke, Transform,
};

use crate::graphics::Color;
use crate::surface::SurfaceSize;

/// Largest edge length accepted for an offscreen surface.
pub const MAX_RASTER_DIM: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    #[error("cannot create a drawing surface of {width}x{height}")]
    EmptySurface { width: u32, height: u32 },
    #[error("drawing surface {width}x{height} exceeds the {max}px limit")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("could not allocate a {width}x{height} pixmap")]
    Allocation { width: u32, height: u32 },
}

fn check_size(size: SurfaceSize) -> Result<(), CanvasError> {
    if size.is_empty() {
        return Err(CanvasError::EmptySurface {
            width: size.width,
            height: size.height,
        });
    }
    if size.width > MAX_RASTER_DIM || size.height > MAX_RASTER_DIM {
        return Err(CanvasError::TooLarge {
            width: size.width,
            height: size.height,
            max: MAX_RASTER_DIM,
        });
    }
    Ok(())
}

// ── Color ───────────────────────────────────────────────────────────

/// Straight-alpha color with a fractional alpha channel, the way theme palettes are authored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0.0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 1.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from a `0xRRGGBB` literal.
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
            a: 1.0,
        }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    fn to_skia(self, alpha_scale: f32) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, alpha_u8(self.a * alpha_scale))
    }
}

fn alpha_u8(a: f32) -> u8 {
    (a.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

// ── Paint ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColorStop {
    offset: f32,
    color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GradientShape {
    Linear { x0: f32, y0: f32, x1: f32, y1: f32 },
    Radial { cx: f32, cy: f32, radius: f32 },
}

/// Linear or concentric radial gradient, padded past its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    shape: GradientShape,
    stops: Vec<ColorStop>,
}

impl Gradient {
    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            shape: GradientShape::Linear { x0, y0, x1, y1 },
            stops: Vec::new(),
        }
    }

    /// Radial gradient from the center (offset 0) to `radius` (offset 1).
    pub fn radial(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            shape: GradientShape::Radial { cx, cy, radius },
            stops: Vec::new(),
        }
    }

    pub fn stop(mut self, offset: f32, color: Rgba) -> Self {
        let offset = offset.clamp(0.0, 1.0);
        let at = self.stops.partition_point(|s| s.offset <= offset);
        self.stops.insert(at, ColorStop { offset, color });
        self
    }

    /// `None` for gradients that cannot paint anything (no stops, zero length or radius).
    fn shader(&self, alpha_scale: f32) -> Option<Shader<'static>> {
        let stops: Vec<GradientStop> = self
            .stops
            .iter()
            .map(|s| GradientStop::new(s.offset, s.color.to_skia(alpha_scale)))
            .collect();
        match self.shape {
            GradientShape::Linear { x0, y0, x1, y1 } => LinearGradient::new(
                Point::from_xy(x0, y0),
                Point::from_xy(x1, y1),
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            ),
            GradientShape::Radial { cx, cy, radius } => {
                if radius.is_nan() || radius <= 0.0 {
                    return None;
                }
                let center = Point::from_xy(cx, cy);
                RadialGradient::new(
                    center,
                    center,
                    radius,
                    stops,
                    SpreadMode::Pad,
                    Transform::identity(),
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Gradient(Gradient),
}

impl From<Rgba> for Paint {
    fn from(color: Rgba) -> Self {
        Paint::Solid(color)
    }
}

impl From<Gradient> for Paint {
    fn from(gradient: Gradient) -> Self {
        Paint::Gradient(gradient)
    }
}

/// How new pixels combine with what is already on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Erases destination alpha by the source alpha; source color is ignored.
    DestinationOut,
}

impl Composite {
    fn blend_mode(self) -> BlendMode {
        match self {
            Composite::SourceOver => BlendMode::SourceOver,
            Composite::DestinationOut => BlendMode::DestinationOut,
        }
    }
}

// ── Raster ──────────────────────────────────────────────────────────

/// An owned straight-alpha RGBA8 image: the form cached layers are stored, uploaded and
/// hashed in.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    size: SurfaceSize,
    pixels: Vec<u8>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.size.width)
            .field("height", &self.size.height)
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(size: SurfaceSize) -> Result<Self, CanvasError> {
        check_size(size)?;
        Ok(Self {
            size,
            pixels: vec![0u8; size.rgba_len()],
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Number of pixels with non-zero alpha.
    pub fn covered_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    pub fn sha256_hex(&self) -> String {
        crate::regression::rgba_sha256_hex(&self.pixels)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }
}

// ── Path ────────────────────────────────────────────────────────────

/// Polyline contours. Fills treat every contour as closed.
#[derive(Debug, Clone, Default)]
pub struct Path {
    builder: PathBuilder,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed polygon through `points`.
    pub fn polygon(points: &[[f32; 2]]) -> Self {
        let mut path = Self::new();
        if let Some((first, rest)) = points.split_first() {
            path.move_to(first[0], first[1]);
            for p in rest {
                path.line_to(p[0], p[1]);
            }
            path.close();
        }
        path
    }

    /// Open two-point segment.
    pub fn segment(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let mut path = Self::new();
        path.move_to(x0, y0).line_to(x1, y1);
        path
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.builder.move_to(x, y);
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.builder.line_to(x, y);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.builder.close();
        self
    }

    /// `None` when the contours enclose nothing drawable.
    fn to_skia(&self) -> Option<tiny_skia::Path> {
        self.builder.clone().finish()
    }
}

// ── Canvas ──────────────────────────────────────────────────────────

/// Immediate-mode drawing context over a premultiplied `tiny_skia` pixmap.
pub struct Canvas2d {
    pixmap: Pixmap,
    size: SurfaceSize,
    fill: Paint,
    stroke: Paint,
    line_width: f32,
    global_alpha: f32,
    composite: Composite,
    draw_calls: u64,
}

impl fmt::Debug for Canvas2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas2d")
            .field("size", &self.size)
            .field("composite", &self.composite)
            .field("draw_calls", &self.draw_calls)
            .finish_non_exhaustive()
    }
}

impl Canvas2d {
    pub fn new(size: SurfaceSize) -> Result<Self, CanvasError> {
        check_size(size)?;
        let pixmap = Pixmap::new(size.width, size.height).ok_or(CanvasError::Allocation {
            width: size.width,
            height: size.height,
        })?;
        Ok(Self {
            pixmap,
            size,
            fill: Paint::Solid(Rgba::new(0, 0, 0, 1.0)),
            stroke: Paint::Solid(Rgba::new(0, 0, 0, 1.0)),
            line_width: 1.0,
            global_alpha: 1.0,
            composite: Composite::SourceOver,
            draw_calls: 0,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn width(&self) -> f32 {
        self.size.width as f32
    }

    pub fn height(&self) -> f32 {
        self.size.height as f32
    }

    /// Drawing primitives issued since creation.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn set_fill(&mut self, paint: impl Into<Paint>) {
        self.fill = paint.into();
    }

    pub fn set_stroke(&mut self, paint: impl Into<Paint>) {
        self.stroke = paint.into();
    }

    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.line_width = width;
        }
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn set_composite(&mut self, op: Composite) {
        self.composite = op;
    }

    fn skia_paint(&self, source: &Paint, alpha_scale: f32) -> Option<tiny_skia::Paint<'static>> {
        let mut paint = tiny_skia::Paint {
            anti_alias: true,
            blend_mode: self.composite.blend_mode(),
            ..tiny_skia::Paint::default()
        };
        match source {
            Paint::Solid(color) => paint.set_color(color.to_skia(alpha_scale)),
            Paint::Gradient(gradient) => paint.shader = gradient.shader(alpha_scale)?,
        }
        Some(paint)
    }

    pub fn clear(&mut self) {
        self.draw_calls += 1;
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.draw_calls += 1;
        let (x0, x1) = if w < 0.0 { (x + w, x) } else { (x, x + w) };
        let (y0, y1) = if h < 0.0 { (y + h, y) } else { (y, y + h) };
        let Some(rect) = tiny_skia::Rect::from_ltrb(x0, y0, x1, y1) else {
            return;
        };
        if let Some(paint) = self.skia_paint(&self.fill, self.global_alpha) {
            self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    pub fn fill_path(&mut self, path: &Path) {
        self.draw_calls += 1;
        let Some(path) = path.to_skia() else {
            return;
        };
        if let Some(paint) = self.skia_paint(&self.fill, self.global_alpha) {
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    /// Strokes every segment with butt caps. Lines thinner than a pixel are drawn one pixel
    /// wide at proportionally reduced alpha.
    pub fn stroke_path(&mut self, path: &Path) {
        self.draw_calls += 1;
        let Some(path) = path.to_skia() else {
            return;
        };
        let coverage = self.line_width.min(1.0);
        let stroke = Stroke {
            width: self.line_width.max(1.0),
            ..Stroke::default()
        };
        if let Some(paint) = self.skia_paint(&self.stroke, self.global_alpha * coverage) {
            self.pixmap
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32) {
        self.draw_calls += 1;
        if radius.is_nan() || radius <= 0.0 {
            return;
        }
        let Some(circle) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        if let Some(paint) = self.skia_paint(&self.fill, self.global_alpha) {
            self.pixmap
                .fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    /// Copies `src` with its top-left corner at `(x, y)` using the current alpha and composite.
    pub fn draw_canvas(&mut self, src: &Canvas2d, x: i32, y: i32) {
        self.draw_calls += 1;
        let paint = PixmapPaint {
            opacity: self.global_alpha,
            blend_mode: self.composite.blend_mode(),
            quality: FilterQuality::Nearest,
        };
        self.pixmap
            .draw_pixmap(x, y, src.pixmap.as_ref(), &paint, Transform::identity(), None);
    }

    /// Demultiplies the current pixels into `dst`, reallocating it only on a size change.
    pub fn read_into(&self, dst: &mut Raster) {
        if dst.size != self.size {
            *dst = Raster {
                size: self.size,
                pixels: vec![0u8; self.size.rgba_len()],
            };
        }
        for (out, px) in dst.pixels.chunks_exact_mut(4).zip(self.pixmap.pixels()) {
            let c = px.demultiply();
            out.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
    }

    pub fn to_raster(&self) -> Raster {
        let mut raster = Raster {
            size: self.size,
            pixels: vec![0u8; self.size.rgba_len()],
        };
        self.read_into(&mut raster);
        raster
    }

    pub fn into_raster(self) -> Raster {
        self.to_raster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> Canvas2d {
        Canvas2d::new(SurfaceSize::new(w, h)).expect("canvas should allocate")
    }

    fn alpha(c: &Canvas2d, x: u32, y: u32) -> u8 {
        c.to_raster().pixel(x, y).map(|p| p[3]).unwrap_or(0)
    }

    #[test]
    fn empty_surface_is_rejected() {
        let err = Canvas2d::new(SurfaceSize::new(0, 10)).unwrap_err();
        assert_eq!(err, CanvasError::EmptySurface { width: 0, height: 10 });
    }

    #[test]
    fn oversized_surface_is_rejected() {
        let err = Raster::new(SurfaceSize::new(MAX_RASTER_DIM + 1, 4)).unwrap_err();
        assert!(matches!(err, CanvasError::TooLarge { .. }));
        let err = Canvas2d::new(SurfaceSize::new(4, MAX_RASTER_DIM + 1)).unwrap_err();
        assert!(matches!(err, CanvasError::TooLarge { .. }));
    }

    #[test]
    fn fill_rect_covers_exact_pixels() {
        let mut c = canvas(8, 8);
        c.set_fill(Rgba::new(255, 0, 0, 1.0));
        c.fill_rect(2.0, 3.0, 2.0, 1.0);

        let r = c.to_raster();
        assert_eq!(r.pixel(2, 3), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(4, 3), Some([0, 0, 0, 0]));
        assert_eq!(r.pixel(2, 4), Some([0, 0, 0, 0]));
        assert_eq!(r.covered_pixels(), 2);
    }

    #[test]
    fn translucent_fill_comes_back_as_straight_alpha() {
        let mut c = canvas(2, 2);
        c.set_fill(Rgba::new(60, 70, 90, 0.5));
        c.fill_rect(0.0, 0.0, 2.0, 2.0);
        let px = c.to_raster().pixel(0, 0).expect("pixel");
        assert!((127..=128).contains(&px[3]));
        for (got, want) in px[..3].iter().zip([60u8, 70, 90]) {
            assert!(got.abs_diff(want) <= 2, "{px:?} should demultiply back near the source");
        }
    }

    #[test]
    fn polygon_fill_is_inside_only() {
        let mut c = canvas(10, 10);
        c.set_fill(Rgba::WHITE);
        c.fill_path(&Path::polygon(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]]));

        let r = c.to_raster();
        assert_eq!(r.pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(r.pixel(9, 9), Some([0, 0, 0, 0]));
    }

    #[test]
    fn destination_out_erases_alpha() {
        let mut c = canvas(4, 1);
        c.set_fill(Rgba::WHITE);
        c.fill_rect(0.0, 0.0, 4.0, 1.0);
        c.set_composite(Composite::DestinationOut);
        c.set_fill(Rgba::new(0, 0, 0, 1.0));
        c.fill_rect(0.0, 0.0, 2.0, 1.0);

        assert_eq!(alpha(&c, 0, 0), 0);
        assert_eq!(alpha(&c, 3, 0), 255);
    }

    #[test]
    fn linear_gradient_runs_between_stops() {
        let mut c = canvas(1, 10);
        c.set_fill(
            Gradient::linear(0.0, 0.0, 0.0, 10.0)
                .stop(0.0, Rgba::new(200, 0, 0, 1.0))
                .stop(1.0, Rgba::new(200, 0, 0, 0.0)),
        );
        c.fill_rect(0.0, 0.0, 1.0, 10.0);
        let (top, mid, bottom) = (alpha(&c, 0, 0), alpha(&c, 0, 5), alpha(&c, 0, 9));
        assert!(top > mid && mid > bottom, "{top} > {mid} > {bottom}");
        assert!(mid.abs_diff(115) <= 20, "midpoint alpha {mid} should be near half");
    }

    #[test]
    fn radial_gradient_pads_past_its_radius() {
        let mut c = canvas(20, 20);
        c.set_fill(
            Gradient::radial(5.0, 5.0, 4.0)
                .stop(0.0, Rgba::WHITE)
                .stop(1.0, Rgba::TRANSPARENT),
        );
        c.fill_rect(0.0, 0.0, 20.0, 20.0);
        assert!(alpha(&c, 5, 5) > 180);
        assert_eq!(alpha(&c, 15, 15), 0);
    }

    #[test]
    fn hairline_stroke_is_one_pixel_at_reduced_alpha() {
        let mut c = canvas(10, 4);
        c.set_stroke(Rgba::WHITE);
        c.set_line_width(0.5);
        c.stroke_path(&Path::segment(0.0, 2.5, 10.0, 2.5));

        let row = alpha(&c, 5, 2);
        assert!(row.abs_diff(128) <= 4, "half-width stroke covers one row at half alpha: {row}");
        assert!(alpha(&c, 5, 1) <= 4);
        assert!(alpha(&c, 5, 3) <= 4);
    }

    #[test]
    fn circle_fill_is_round() {
        let mut c = canvas(20, 20);
        c.set_fill(Rgba::WHITE);
        c.fill_circle(10.0, 10.0, 5.0);
        let r = c.to_raster();
        assert_eq!(r.pixel(10, 10), Some([255, 255, 255, 255]));
        assert_eq!(r.pixel(5, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn draw_canvas_places_the_source_at_an_offset() {
        let mut src = canvas(2, 2);
        src.set_fill(Rgba::hex(0x00FF00));
        src.fill_rect(0.0, 0.0, 2.0, 2.0);
        let mut dst = canvas(4, 4);
        dst.draw_canvas(&src, 2, 2);
        let r = dst.to_raster();
        assert_eq!(r.pixel(3, 3), Some([0, 255, 0, 255]));
        assert_eq!(r.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn read_into_follows_size_changes() {
        let c = canvas(3, 2);
        let mut out = Raster::new(SurfaceSize::new(1, 1)).expect("raster");
        c.read_into(&mut out);
        assert_eq!(out.size(), SurfaceSize::new(3, 2));
        assert_eq!(out.pixels().len(), 24);
    }

    #[test]
    fn every_primitive_counts_as_a_draw_call() {
        let mut c = canvas(4, 4);
        c.fill_rect(0.0, 0.0, 1.0, 1.0);
        c.fill_path(&Path::polygon(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]));
        c.stroke_path(&Path::segment(0.0, 0.0, 4.0, 4.0));
        c.fill_circle(2.0, 2.0, 1.0);
        let src = canvas(1, 1);
        c.draw_canvas(&src, 0, 0);
        c.clear();
        assert_eq!(c.draw_calls(), 6);
    }

    #[test]
    fn rgba_display_matches_css() {
        assert_eq!(Rgba::new(60, 70, 90, 0.7).to_string(), "rgba(60, 70, 90, 0.7)");
        assert_eq!(Rgba::hex(0x7A9B7E).to_string(), "#7a9b7e");
    }
}
