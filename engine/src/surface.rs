use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a surface or viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports zero on one axis.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn rgba_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }

    /// Shrinks each axis to fit inside `bound`.
    pub fn clamped_to(self, bound: SurfaceSize) -> Self {
        Self {
            width: self.width.min(bound.width),
            height: self.height.min(bound.height),
        }
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_keeps_the_smaller_axis() {
        let window = SurfaceSize::new(1920, 1080);
        assert_eq!(
            window.clamped_to(SurfaceSize::new(1280, 1440)),
            SurfaceSize::new(1280, 1080)
        );
        assert_eq!(window.to_string(), "1920x1080");
        assert!(SurfaceSize::new(0, 5).is_empty());
    }
}
