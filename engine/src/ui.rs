//! Integer pixel rectangles for frame layout.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_size(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// A `w`x`h` child centered inside this rect, clamped to fit.
    pub fn centered(&self, w: u32, h: u32) -> Self {
        let w = w.min(self.w);
        let h = h.min(self.h);
        Self {
            x: self.x.saturating_add(self.w.saturating_sub(w) / 2),
            y: self.y.saturating_add(self.h.saturating_sub(h) / 2),
            w,
            h,
        }
    }
}
