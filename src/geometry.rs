use std::fmt;

use serde::Serialize;

/// Axis-aligned pixel box in source-buffer coordinates.
///
/// Invariant: `width > 0 && height > 0`, and the box lies fully inside the
/// buffer it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0, "degenerate region {width}x{height}");
        Self { x, y, width, height }
    }

    /// Box spanning the inclusive pixel extents `min..=max` on both axes.
    pub fn from_extents(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// One past the rightmost column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the bottom row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, other: &Region) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlap of two boxes, if any.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x0 < x1 && y0 < y1 {
            Some(Region::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Target width:height ratio as an exact rational (e.g. 5:7 for poker cards).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0, "degenerate ratio {width}:{height}");
        Self { width, height }
    }

    /// Exact test that a pixel size has this ratio.
    pub fn matches_size(&self, width: u32, height: u32) -> bool {
        width as u64 * self.height as u64 == height as u64 * self.width as u64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::new(5, 7)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Per-side padding added to a tight box before aspect correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Padding {
    /// Absolute pixels on each side.
    Pixels(u32),
    /// Fraction of the corresponding box dimension on each side.
    Fraction(f64),
}

impl Padding {
    /// Padding amount for one side of a box dimension, in (possibly
    /// fractional) pixels.
    pub fn for_dimension(&self, dim: u32) -> f64 {
        match *self {
            Padding::Pixels(px) => px as f64,
            Padding::Fraction(f) => f * dim as f64,
        }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Padding::Pixels(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_extents() {
        let r = Region::from_extents(55, 91, 124, 160);
        assert_eq!(r, Region::new(55, 91, 70, 70));
        assert_eq!(r.right(), 125);
        assert_eq!(r.bottom(), 161);
    }

    #[test]
    fn test_region_contains() {
        let outer = Region::new(10, 10, 100, 100);
        let inner = Region::new(20, 30, 40, 50);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));
    }

    #[test]
    fn test_region_intersect() {
        let a = Region::new(0, 0, 50, 50);
        let b = Region::new(40, 40, 50, 50);
        assert_eq!(a.intersect(&b), Some(Region::new(40, 40, 10, 10)));
        let c = Region::new(50, 0, 10, 10);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_ratio_matches_size() {
        let r = AspectRatio::new(5, 7);
        assert!(r.matches_size(750, 1050));
        assert!(r.matches_size(5, 7));
        assert!(!r.matches_size(750, 1051));
    }

    #[test]
    fn test_padding_for_dimension() {
        assert_eq!(Padding::Pixels(12).for_dimension(70), 12.0);
        assert_eq!(Padding::Fraction(0.1).for_dimension(70), 7.0);
        assert_eq!(Padding::default().for_dimension(70), 0.0);
    }
}
