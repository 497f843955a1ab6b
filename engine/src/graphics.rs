use crate::canvas::Raster;
use crate::{surface::SurfaceSize, ui::Rect};

pub type Color = [u8; 4];

/// Frame-level 2D drawing interface.
///
/// The board loop and the native showcase draw through this trait, so they stay agnostic of
/// where the frame ends up (a window via `pixels`, or an in-memory buffer in tests).
pub trait Renderer2d {
    fn begin_frame(&mut self, size: SurfaceSize);
    fn size(&self) -> SurfaceSize;

    /// Opaque fill.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Alpha-blended rect over existing content (alpha is applied to `color`'s RGB).
    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: u8);

    fn rect_outline(&mut self, rect: Rect, color: Color);

    /// Source-over copy of a straight-alpha raster with its top-left at `(x, y)`.
    fn blit_raster(&mut self, x: u32, y: u32, raster: &Raster);

    fn clear(&mut self, color: Color) {
        let s = self.size();
        self.fill_rect(Rect::from_size(s.width, s.height), color);
    }
}

/// CPU renderer that draws into an RGBA frame buffer.
pub struct CpuRenderer<'a> {
    frame: &'a mut [u8],
    size: SurfaceSize,
}

impl<'a> CpuRenderer<'a> {
    pub fn new(frame: &'a mut [u8], size: SurfaceSize) -> Self {
        Self { frame, size }
    }

    /// Calls `f` with each clipped row slice covered by `rect`.
    fn for_each_row(&mut self, rect: Rect, mut f: impl FnMut(&mut [u8])) {
        let max_x = rect.x.saturating_add(rect.w).min(self.size.width);
        let max_y = rect.y.saturating_add(rect.h).min(self.size.height);
        if rect.x >= max_x || rect.y >= max_y {
            return;
        }
        if self.frame.len() < self.size.rgba_len() || self.size.is_empty() {
            return;
        }

        let stride = self.size.width as usize * 4;
        let row_bytes = (max_x - rect.x) as usize * 4;
        let mut row_start = rect.y as usize * stride + rect.x as usize * 4;
        for _ in rect.y..max_y {
            f(&mut self.frame[row_start..row_start + row_bytes]);
            row_start += stride;
        }
    }
}

fn blend_channel(dst: u8, src: u8, a: u32) -> u8 {
    let inv = 255u32 - a;
    ((dst as u32 * inv + src as u32 * a + 127) / 255) as u8
}

impl Renderer2d for CpuRenderer<'_> {
    fn begin_frame(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.for_each_row(rect, |row| {
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
        });
    }

    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: u8) {
        if alpha == 0 {
            return;
        }
        if alpha == 255 {
            self.fill_rect(rect, color);
            return;
        }

        let a = alpha as u32;
        self.for_each_row(rect, |row| {
            for px in row.chunks_exact_mut(4) {
                px[0] = blend_channel(px[0], color[0], a);
                px[1] = blend_channel(px[1], color[1], a);
                px[2] = blend_channel(px[2], color[2], a);
                px[3] = 255;
            }
        });
    }

    fn rect_outline(&mut self, rect: Rect, color: Color) {
        if rect.w == 0 || rect.h == 0 {
            return;
        }

        let x1 = rect.x.saturating_add(rect.w).min(self.size.width);
        let y1 = rect.y.saturating_add(rect.h).min(self.size.height);
        if rect.x >= x1 || rect.y >= y1 {
            return;
        }

        let w = x1 - rect.x;
        let h = y1 - rect.y;

        self.fill_rect(Rect::new(rect.x, rect.y, w, 1), color);
        if h > 1 {
            self.fill_rect(Rect::new(rect.x, y1.saturating_sub(1), w, 1), color);
        }
        self.fill_rect(Rect::new(rect.x, rect.y, 1, h), color);
        if w > 1 {
            self.fill_rect(Rect::new(x1.saturating_sub(1), rect.y, 1, h), color);
        }
    }

    fn blit_raster(&mut self, x: u32, y: u32, raster: &Raster) {
        let src_w = raster.width() as usize;
        let src = raster.pixels();
        let mut src_row = 0usize;
        self.for_each_row(Rect::new(x, y, raster.width(), raster.height()), |row| {
            let start = src_row * src_w * 4;
            src_row += 1;
            for (i, px) in row.chunks_exact_mut(4).enumerate() {
                let s = &src[start + i * 4..start + i * 4 + 4];
                let a = s[3] as u32;
                if a == 0 {
                    continue;
                }
                px[0] = blend_channel(px[0], s[0], a);
                px[1] = blend_channel(px[1], s[1], a);
                px[2] = blend_channel(px[2], s[2], a);
                px[3] = 255;
            }
        });
    }
}
