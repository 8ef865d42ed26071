use log::debug;

use crate::error::{CutError, Result};
use crate::geometry::Region;

/// Layout information that disambiguates segmentation.
///
/// Dispatched once, in `cells`. Absence means the whole buffer is segmented
/// as one space and the segmenter is trusted to keep cards apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    None,
    Grid(GridSpec),
    Anchors(AnchorSet),
}

/// Implied regular rows x cols sheet layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
    /// Pixels ignored around the whole sheet.
    pub outer_margin: u32,
    /// Pixels separating neighboring cells once each is inset.
    pub cell_gutter: u32,
}

/// Ordered approximate card positions for irregularly laid out sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSet {
    pub anchors: Vec<Anchor>,
    /// Safety margin in pixels added around anchor boxes.
    pub margin: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Approximate card center.
    Point { x: u32, y: u32 },
    /// Approximate card box.
    Box(Region),
}

impl Hint {
    /// Number of cards the hint implies, when it implies one.
    pub fn expected_cards(&self) -> Option<usize> {
        match self {
            Hint::None => None,
            Hint::Grid(g) => Some(g.rows as usize * g.cols as usize),
            Hint::Anchors(set) => Some(set.anchors.len()),
        }
    }

    /// Grid and anchor hints promise exactly one card per cell.
    pub fn expects_one_per_cell(&self) -> bool {
        !matches!(self, Hint::None)
    }

    /// Reject malformed hints before any pixel work happens.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        match self {
            Hint::None => Ok(()),
            Hint::Grid(g) => validate_grid(g, width, height),
            Hint::Anchors(set) => validate_anchors(set, width, height),
        }
    }

    /// Ordered sub-rectangles ("cells") to segment independently.
    pub fn cells(&self, width: u32, height: u32) -> Result<Vec<Region>> {
        self.validate(width, height)?;
        match self {
            Hint::None => Ok(vec![Region::new(0, 0, width, height)]),
            Hint::Grid(g) => grid_cells(g, width, height),
            Hint::Anchors(set) => anchor_cells(set, width, height),
        }
    }
}

fn invalid(reason: String) -> CutError {
    CutError::InvalidHintSpec(reason)
}

fn validate_grid(g: &GridSpec, width: u32, height: u32) -> Result<()> {
    if g.rows == 0 || g.cols == 0 {
        return Err(invalid(format!(
            "grid needs at least one row and one column, got {}x{}",
            g.rows, g.cols
        )));
    }
    let margin2 = g.outer_margin as u64 * 2;
    if margin2 >= width as u64 || margin2 >= height as u64 {
        return Err(invalid(format!(
            "outer margin {} leaves no interior in a {width}x{height} buffer",
            g.outer_margin
        )));
    }
    Ok(())
}

fn validate_anchors(set: &AnchorSet, width: u32, height: u32) -> Result<()> {
    if set.anchors.is_empty() {
        return Err(invalid("anchor list is empty".to_string()));
    }
    let has_points = set.anchors.iter().any(|a| matches!(a, Anchor::Point { .. }));
    let has_boxes = set.anchors.iter().any(|a| matches!(a, Anchor::Box(_)));
    if has_points && has_boxes {
        return Err(invalid("anchor list mixes points and boxes".to_string()));
    }
    for (i, anchor) in set.anchors.iter().enumerate() {
        match anchor {
            Anchor::Point { x, y } => {
                if *x >= width || *y >= height {
                    return Err(invalid(format!(
                        "anchor {i} at {x},{y} is outside the {width}x{height} buffer"
                    )));
                }
            }
            Anchor::Box(b) => {
                if b.x as u64 + b.width as u64 > width as u64
                    || b.y as u64 + b.height as u64 > height as u64
                {
                    return Err(invalid(format!(
                        "anchor {i} box {b} is outside the {width}x{height} buffer"
                    )));
                }
            }
        }
        if set.anchors[..i].contains(anchor) {
            return Err(invalid(format!("anchor {i} duplicates an earlier anchor")));
        }
    }
    Ok(())
}

/// Row-major grid cells: interior after the outer margin, boundaries at even
/// integer fractions, each cell inset by half the gutter per side (floor low,
/// ceil high) so neighbors end up exactly `cell_gutter` apart.
fn grid_cells(g: &GridSpec, width: u32, height: u32) -> Result<Vec<Region>> {
    let ox = g.outer_margin as u64;
    let iw = width as u64 - 2 * ox;
    let ih = height as u64 - 2 * ox;
    let rows = g.rows as u64;
    let cols = g.cols as u64;
    let lo = (g.cell_gutter / 2) as u64;
    let hi = (g.cell_gutter - g.cell_gutter / 2) as u64;

    let mut cells = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        let y0 = ox + r * ih / rows + lo;
        let y1 = (ox + (r + 1) * ih / rows).saturating_sub(hi);
        for c in 0..cols {
            let x0 = ox + c * iw / cols + lo;
            let x1 = (ox + (c + 1) * iw / cols).saturating_sub(hi);
            if x1 <= x0 || y1 <= y0 {
                return Err(invalid(format!(
                    "gutter {} leaves an empty cell in a {}x{} grid over a {width}x{height} buffer",
                    g.cell_gutter, g.rows, g.cols
                )));
            }
            cells.push(Region::new(
                x0 as u32,
                y0 as u32,
                (x1 - x0) as u32,
                (y1 - y0) as u32,
            ));
        }
    }
    debug!("grid hint partitioned the buffer into {} cells", cells.len());
    Ok(cells)
}

fn anchor_cells(set: &AnchorSet, width: u32, height: u32) -> Result<Vec<Region>> {
    let mut points = Vec::new();
    let mut boxes = Vec::new();
    for anchor in &set.anchors {
        match anchor {
            Anchor::Point { x, y } => points.push((*x, *y)),
            Anchor::Box(b) => boxes.push(*b),
        }
    }
    // homogeneity was validated up front
    if boxes.is_empty() {
        Ok(point_cells(&points, width, height))
    } else {
        box_cells(&boxes, set.margin, width, height)
    }
}

/// Voronoi-like rectangular cells: each cell runs from the midline toward the
/// nearest anchor on each side, clipped to the buffer. A pixel exactly on a
/// midline belongs to the lower-coordinate anchor, which keeps cells disjoint.
fn point_cells(points: &[(u32, u32)], width: u32, height: u32) -> Vec<Region> {
    let mut cells = Vec::with_capacity(points.len());
    for (i, &(ax, ay)) in points.iter().enumerate() {
        let mut x0 = 0u32;
        let mut x1 = width;
        let mut y0 = 0u32;
        let mut y1 = height;
        for (j, &(bx, by)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let mx = ((ax as u64 + bx as u64) / 2 + 1) as u32;
            let my = ((ay as u64 + by as u64) / 2 + 1) as u32;
            if bx < ax {
                x0 = x0.max(mx);
            }
            if bx > ax {
                x1 = x1.min(mx);
            }
            if by < ay {
                y0 = y0.max(my);
            }
            if by > ay {
                y1 = y1.min(my);
            }
        }
        // the cell always retains its own anchor pixel
        cells.push(Region::new(x0, y0, x1 - x0, y1 - y0));
    }
    cells
}

/// Anchor boxes grown by the safety margin, clamped to the buffer, with every
/// pairwise overlap split at its midline along the axis of the larger center
/// displacement.
fn box_cells(boxes: &[Region], margin: u32, width: u32, height: u32) -> Result<Vec<Region>> {
    struct Span {
        x0: i64,
        x1: i64,
        y0: i64,
        y1: i64,
    }

    let m = margin as i64;
    let mut spans: Vec<Span> = boxes
        .iter()
        .map(|b| Span {
            x0: (b.x as i64 - m).max(0),
            x1: (b.x as i64 + b.width as i64 + m).min(width as i64),
            y0: (b.y as i64 - m).max(0),
            y1: (b.y as i64 + b.height as i64 + m).min(height as i64),
        })
        .collect();

    for i in 0..spans.len() {
        for j in (i + 1)..spans.len() {
            let ox0 = spans[i].x0.max(spans[j].x0);
            let ox1 = spans[i].x1.min(spans[j].x1);
            let oy0 = spans[i].y0.max(spans[j].y0);
            let oy1 = spans[i].y1.min(spans[j].y1);
            if ox0 >= ox1 || oy0 >= oy1 {
                continue;
            }
            // doubled centers of the original boxes pick the split axis
            let ci_x = 2 * boxes[i].x as i64 + boxes[i].width as i64;
            let cj_x = 2 * boxes[j].x as i64 + boxes[j].width as i64;
            let ci_y = 2 * boxes[i].y as i64 + boxes[i].height as i64;
            let cj_y = 2 * boxes[j].y as i64 + boxes[j].height as i64;
            if (ci_x - cj_x).abs() >= (ci_y - cj_y).abs() {
                let mid = (ox0 + ox1) / 2;
                if ci_x <= cj_x {
                    spans[i].x1 = spans[i].x1.min(mid);
                    spans[j].x0 = spans[j].x0.max(mid);
                } else {
                    spans[j].x1 = spans[j].x1.min(mid);
                    spans[i].x0 = spans[i].x0.max(mid);
                }
            } else {
                let mid = (oy0 + oy1) / 2;
                if ci_y <= cj_y {
                    spans[i].y1 = spans[i].y1.min(mid);
                    spans[j].y0 = spans[j].y0.max(mid);
                } else {
                    spans[j].y1 = spans[j].y1.min(mid);
                    spans[i].y0 = spans[i].y0.max(mid);
                }
            }
        }
    }

    let mut cells = Vec::with_capacity(spans.len());
    for (i, s) in spans.iter().enumerate() {
        if s.x1 <= s.x0 || s.y1 <= s.y0 {
            return Err(invalid(format!(
                "anchor boxes overlap too heavily around anchor {i}"
            )));
        }
        cells.push(Region::new(
            s.x0 as u32,
            s.y0 as u32,
            (s.x1 - s.x0) as u32,
            (s.y1 - s.y0) as u32,
        ));
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: u32, cols: u32, margin: u32, gutter: u32) -> Hint {
        Hint::Grid(GridSpec {
            rows,
            cols,
            outer_margin: margin,
            cell_gutter: gutter,
        })
    }

    #[test]
    fn test_no_hint_is_one_cell() {
        let cells = Hint::None.cells(180, 252).unwrap();
        assert_eq!(cells, vec![Region::new(0, 0, 180, 252)]);
        assert_eq!(Hint::None.expected_cards(), None);
    }

    #[test]
    fn test_grid_cells_row_major() {
        let cells = grid(4, 3, 0, 0).cells(300, 400).unwrap();
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], Region::new(0, 0, 100, 100));
        assert_eq!(cells[1], Region::new(100, 0, 100, 100));
        assert_eq!(cells[2], Region::new(200, 0, 100, 100));
        assert_eq!(cells[3], Region::new(0, 100, 100, 100));
        assert_eq!(cells[11], Region::new(200, 300, 100, 100));
    }

    #[test]
    fn test_grid_margin_and_gutter() {
        let cells = grid(1, 2, 10, 4).cells(220, 120).unwrap();
        // interior 200x100 starting at 10,10; cells inset 2px per side
        assert_eq!(cells[0], Region::new(12, 12, 96, 96));
        assert_eq!(cells[1], Region::new(112, 12, 96, 96));
        // neighbors end up exactly one gutter apart
        assert_eq!(cells[1].x - cells[0].right(), 4);
    }

    #[test]
    fn test_grid_remainder_spreads() {
        let cells = grid(1, 3, 0, 0).cells(100, 50).unwrap();
        // 100/3: boundaries at 0, 33, 66, 100
        assert_eq!(cells[0].width, 33);
        assert_eq!(cells[1].width, 33);
        assert_eq!(cells[2].width, 34);
        assert_eq!(cells[0].right(), cells[1].x);
        assert_eq!(cells[1].right(), cells[2].x);
    }

    #[test]
    fn test_grid_validation() {
        assert!(matches!(
            grid(0, 3, 0, 0).cells(100, 100),
            Err(CutError::InvalidHintSpec(_))
        ));
        assert!(matches!(
            grid(2, 2, 60, 0).cells(100, 100),
            Err(CutError::InvalidHintSpec(_))
        ));
        assert!(matches!(
            grid(1, 10, 0, 20).cells(100, 100),
            Err(CutError::InvalidHintSpec(_))
        ));
    }

    #[test]
    fn test_point_anchor_cells_split_at_midline() {
        let hint = Hint::Anchors(AnchorSet {
            anchors: vec![Anchor::Point { x: 50, y: 50 }, Anchor::Point { x: 150, y: 50 }],
            margin: 0,
        });
        let cells = hint.cells(200, 100).unwrap();
        assert_eq!(cells[0], Region::new(0, 0, 101, 100));
        assert_eq!(cells[1], Region::new(101, 0, 99, 100));
        assert_eq!(hint.expected_cards(), Some(2));
    }

    #[test]
    fn test_point_anchor_cells_contain_their_anchor() {
        let pts = [(10u32, 10u32), (12, 80), (90, 15), (60, 60)];
        let hint = Hint::Anchors(AnchorSet {
            anchors: pts.iter().map(|&(x, y)| Anchor::Point { x, y }).collect(),
            margin: 0,
        });
        let cells = hint.cells(120, 120).unwrap();
        for (cell, &(x, y)) in cells.iter().zip(&pts) {
            assert!(cell.x <= x && x < cell.right(), "{cell} misses x {x}");
            assert!(cell.y <= y && y < cell.bottom(), "{cell} misses y {y}");
        }
    }

    #[test]
    fn test_box_anchor_cells_expand_by_margin() {
        let hint = Hint::Anchors(AnchorSet {
            anchors: vec![
                Anchor::Box(Region::new(10, 10, 50, 70)),
                Anchor::Box(Region::new(120, 10, 50, 70)),
            ],
            margin: 8,
        });
        let cells = hint.cells(200, 100).unwrap();
        assert_eq!(cells[0], Region::new(2, 2, 66, 86));
        assert_eq!(cells[1], Region::new(112, 2, 66, 86));
    }

    #[test]
    fn test_box_anchor_overlap_splits_at_midline() {
        let hint = Hint::Anchors(AnchorSet {
            anchors: vec![
                Anchor::Box(Region::new(10, 10, 50, 50)),
                Anchor::Box(Region::new(70, 10, 50, 50)),
            ],
            margin: 8,
        });
        let cells = hint.cells(200, 100).unwrap();
        // expansions [2,68) and [62,128) overlap in [62,68); midline 65
        assert_eq!(cells[0], Region::new(2, 2, 63, 66));
        assert_eq!(cells[1], Region::new(65, 2, 63, 66));
        assert!(cells[0].intersect(&cells[1]).is_none());
    }

    #[test]
    fn test_anchor_validation() {
        let empty = Hint::Anchors(AnchorSet {
            anchors: vec![],
            margin: 0,
        });
        assert!(matches!(empty.cells(100, 100), Err(CutError::InvalidHintSpec(_))));

        let mixed = Hint::Anchors(AnchorSet {
            anchors: vec![
                Anchor::Point { x: 5, y: 5 },
                Anchor::Box(Region::new(10, 10, 5, 5)),
            ],
            margin: 0,
        });
        assert!(matches!(mixed.cells(100, 100), Err(CutError::InvalidHintSpec(_))));

        let outside = Hint::Anchors(AnchorSet {
            anchors: vec![Anchor::Point { x: 100, y: 5 }],
            margin: 0,
        });
        assert!(matches!(outside.cells(100, 100), Err(CutError::InvalidHintSpec(_))));

        let dup = Hint::Anchors(AnchorSet {
            anchors: vec![Anchor::Point { x: 5, y: 5 }, Anchor::Point { x: 5, y: 5 }],
            margin: 0,
        });
        assert!(matches!(dup.cells(100, 100), Err(CutError::InvalidHintSpec(_))));
    }
}
