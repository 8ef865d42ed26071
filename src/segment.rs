use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use log::trace;

use crate::error::{CutError, Result};
use crate::geometry::Region;

/// How pixels are told apart from the composite background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Foreground {
    /// Foreground above an alpha cutoff; for buffers with real transparency.
    Alpha { threshold: u8 },
    /// Foreground beyond a Euclidean RGB distance from the declared
    /// background color; for buffers without an alpha channel.
    KeyColor { color: [u8; 3], tolerance: f64 },
}

impl Foreground {
    pub fn is_foreground(&self, px: &Rgba<u8>) -> bool {
        match *self {
            Foreground::Alpha { threshold } => px[3] > threshold,
            Foreground::KeyColor { color, tolerance } => {
                let dr = px[0] as f64 - color[0] as f64;
                let dg = px[1] as f64 - color[1] as f64;
                let db = px[2] as f64 - color[2] as f64;
                (dr * dr + dg * dg + db * db).sqrt() > tolerance
            }
        }
    }
}

/// Flood-fill neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i32, i32)] {
        static FOUR: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        static EIGHT: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentOptions {
    pub foreground: Foreground,
    pub connectivity: Connectivity,
    /// Components smaller than this many pixels are dropped as speckle.
    pub min_area: u32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            foreground: Foreground::Alpha { threshold: 10 },
            connectivity: Connectivity::Eight,
            min_area: 16,
        }
    }
}

/// Find connected foreground components inside `scan` and return their tight
/// bounding boxes.
///
/// Components are discovered in a single top-to-bottom, left-to-right pass;
/// callers impose their own ordering on the result. A component reaching past
/// the scan rectangle is clipped to it, which is what lets hint cells keep
/// touching neighbors apart.
pub fn find_regions(img: &RgbaImage, scan: Region, opts: &SegmentOptions) -> Result<Vec<Region>> {
    debug_assert!(
        scan.right() <= img.width() && scan.bottom() <= img.height(),
        "scan rectangle {scan} outside {}x{} buffer",
        img.width(),
        img.height()
    );

    let w = scan.width as usize;
    let h = scan.height as usize;
    let mut visited = vec![false; w * h];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    let mut regions = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            if visited[sy * w + sx] {
                continue;
            }
            visited[sy * w + sx] = true;
            let px = img.get_pixel(scan.x + sx as u32, scan.y + sy as u32);
            if !opts.foreground.is_foreground(px) {
                continue;
            }

            // Flood fill with an explicit work queue; recursion could
            // exhaust the stack on card-sized components.
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (sx, sx, sy, sy);
            let mut area: u64 = 1;
            queue.push_back((sx, sy));
            while let Some((cx, cy)) = queue.pop_front() {
                for &(dx, dy) in opts.connectivity.offsets() {
                    let nx = cx as i64 + dx as i64;
                    let ny = cy as i64 + dy as i64;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    if visited[ny * w + nx] {
                        continue;
                    }
                    visited[ny * w + nx] = true;
                    let px = img.get_pixel(scan.x + nx as u32, scan.y + ny as u32);
                    if !opts.foreground.is_foreground(px) {
                        continue;
                    }
                    area += 1;
                    min_x = min_x.min(nx);
                    max_x = max_x.max(nx);
                    min_y = min_y.min(ny);
                    max_y = max_y.max(ny);
                    queue.push_back((nx, ny));
                }
            }

            if area < opts.min_area as u64 {
                trace!(
                    "dropped {}px speckle near {},{}",
                    area,
                    scan.x + min_x as u32,
                    scan.y + min_y as u32
                );
                continue;
            }
            regions.push(Region::from_extents(
                scan.x + min_x as u32,
                scan.y + min_y as u32,
                scan.x + max_x as u32,
                scan.y + max_y as u32,
            ));
        }
    }

    if regions.is_empty() {
        return Err(CutError::NoRegionFound { bounds: scan });
    }
    Ok(regions)
}
