use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A crop rectangle in post-rotation pixel space of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CropRect {
    /// X coordinate of the top-left corner in pixels
    pub x: u32,
    /// Y coordinate of the top-left corner in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl CropRect {
    /// Create a new crop rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole frame, uncropped.
    pub fn full_frame(frame_width: u32, frame_height: u32) -> Self {
        Self::new(0, 0, frame_width, frame_height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Width over height, or 0.0 for an empty rectangle.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Check the rectangle lies fully inside a frame of the given size.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.right() <= frame_width as u64 && self.bottom() <= frame_height as u64
    }

    /// Whether the rectangle covers the whole frame.
    pub fn is_full_frame(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == frame_width && self.height == frame_height
    }

    /// Whether the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let rect = CropRect::new(100, 0, 608, 1080);
        assert!(rect.fits_within(1920, 1080));
        assert!(!rect.fits_within(700, 1080));
        assert_eq!(rect.right(), 708);
        assert!((rect.aspect() - 608.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_frame() {
        let rect = CropRect::full_frame(1920, 1080);
        assert!(rect.is_full_frame(1920, 1080));
        assert!(!rect.is_empty());
        assert!(CropRect::new(0, 0, 0, 10).is_empty());
    }
}
