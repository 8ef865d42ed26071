use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{CutError, Result};
use crate::geometry::Region;
use crate::hint::Hint;
use crate::normalize::normalize_box;
use crate::render::{render_card, RenderConfig};
use crate::segment::{find_regions, SegmentOptions};

/// Cooperative cancellation shared across worker threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CutError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One detected card before any pixels are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardBox {
    pub id: usize,
    pub raw: Region,
    pub normalized: Region,
}

/// A fully rendered card.
#[derive(Debug, Clone)]
pub struct Card {
    pub id: usize,
    pub raw: Region,
    pub normalized: Region,
    pub image: RgbaImage,
}

/// Detection outcome: boxes in reading order plus non-fatal findings.
#[derive(Debug)]
pub struct Detection {
    pub boxes: Vec<CardBox>,
    pub warnings: Vec<CutError>,
}

#[derive(Debug)]
pub struct Extraction {
    pub cards: Vec<Card>,
    pub warnings: Vec<CutError>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub segment: SegmentOptions,
    pub render: RenderConfig,
}

/// Which box `draw_outlines` traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineBox {
    Raw,
    Normalized,
}

/// Find every card on the sheet and compute its crop windows.
///
/// Boxes come back in reading order (top edge first, then left edge) and ids
/// follow that order. With a hint, a cell holding anything other than exactly
/// one card is reported in `warnings` and detection continues with whatever
/// was found. A card whose crop window cannot fit the buffer is likewise
/// reported and skipped, leaving a gap in the id sequence.
pub fn detect_boxes(
    img: &RgbaImage,
    hint: &Hint,
    cfg: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Detection> {
    cfg.render.validate()?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(CutError::EmptyImage);
    }
    let cells = hint.cells(width, height)?;
    cancel.check()?;

    let per_cell: Vec<(usize, Result<Vec<Region>>)> = cells
        .par_iter()
        .enumerate()
        .map(|(i, cell)| {
            if cancel.is_cancelled() {
                return (i, Err(CutError::Cancelled));
            }
            (i, find_regions(img, *cell, &cfg.segment))
        })
        .collect();

    let one_per_cell = hint.expects_one_per_cell();
    let mut raw_boxes = Vec::new();
    let mut warnings = Vec::new();
    for (i, outcome) in per_cell {
        match outcome {
            Ok(regions) => {
                if one_per_cell && regions.len() != 1 {
                    warn!("cell {i}: expected one card, found {}", regions.len());
                    warnings.push(CutError::HintCardinalityMismatch {
                        cell: i,
                        expected: 1,
                        found: regions.len(),
                    });
                }
                raw_boxes.extend(regions);
            }
            Err(CutError::NoRegionFound { .. }) if one_per_cell => {
                warn!("cell {i}: expected one card, found none");
                warnings.push(CutError::HintCardinalityMismatch {
                    cell: i,
                    expected: 1,
                    found: 0,
                });
            }
            Err(err) => return Err(err),
        }
    }
    if raw_boxes.is_empty() {
        return Err(CutError::NoRegionFound {
            bounds: Region::new(0, 0, width, height),
        });
    }

    raw_boxes.sort_by_key(|r| (r.y, r.x));
    debug!("detected {} raw boxes", raw_boxes.len());

    let mut boxes = Vec::with_capacity(raw_boxes.len());
    for (id, raw) in raw_boxes.into_iter().enumerate() {
        cancel.check()?;
        match normalize_box(raw, width, height, cfg.render.padding, cfg.render.ratio) {
            Ok(normalized) => boxes.push(CardBox {
                id,
                raw,
                normalized,
            }),
            Err(err @ CutError::BoxExceedsBounds { .. }) => {
                warn!("card {id}: {err}");
                warnings.push(err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(Detection { boxes, warnings })
}

/// Render every detected box into its final card raster.
pub fn render_boxes(
    img: &RgbaImage,
    boxes: &[CardBox],
    render: &RenderConfig,
    cancel: &CancelToken,
) -> Result<Vec<Card>> {
    boxes
        .par_iter()
        .map(|b| {
            cancel.check()?;
            let image = render_card(img, b.normalized, render);
            debug!("rendered card {} cut from {}", b.id, b.normalized);
            Ok(Card {
                id: b.id,
                raw: b.raw,
                normalized: b.normalized,
                image,
            })
        })
        .collect()
}

/// Full pipeline: detect, normalize, render.
pub fn extract_cards(
    img: &RgbaImage,
    hint: &Hint,
    cfg: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Extraction> {
    let detection = detect_boxes(img, hint, cfg, cancel)?;
    let cards = render_boxes(img, &detection.boxes, &cfg.render, cancel)?;
    Ok(Extraction {
        cards,
        warnings: detection.warnings,
    })
}

/// Look up one detected box by id, for single-card workflows.
pub fn select_box(boxes: &[CardBox], id: usize) -> Result<CardBox> {
    boxes
        .iter()
        .find(|b| b.id == id)
        .copied()
        .ok_or(CutError::UnknownCardId {
            id,
            count: boxes.len(),
        })
}

/// Copy of the sheet with every box traced, for eyeballing detection.
pub fn draw_outlines(
    img: &RgbaImage,
    boxes: &[CardBox],
    which: OutlineBox,
    color: Rgba<u8>,
) -> RgbaImage {
    let mut out = img.clone();
    for b in boxes {
        let r = match which {
            OutlineBox::Raw => b.raw,
            OutlineBox::Normalized => b.normalized,
        };
        let rect = Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height);
        draw_hollow_rect_mut(&mut out, rect, color);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AspectRatio, Padding};
    use crate::hint::GridSpec;
    use crate::render::Background;
    use imageproc::drawing::draw_filled_rect_mut;

    const INK: Rgba<u8> = Rgba([10, 10, 10, 255]);

    fn sheet(w: u32, h: u32, blobs: &[Region]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
        for b in blobs {
            draw_filled_rect_mut(
                &mut img,
                Rect::at(b.x as i32, b.y as i32).of_size(b.width, b.height),
                INK,
            );
        }
        img
    }

    fn square_cfg(out: u32) -> PipelineConfig {
        PipelineConfig {
            render: RenderConfig {
                ratio: AspectRatio { width: 1, height: 1 },
                output_width: out,
                output_height: out,
                background: Background::Transparent,
                ..RenderConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_boxes_come_back_in_reading_order() {
        let img = sheet(
            200,
            100,
            &[
                Region::new(100, 10, 20, 20),
                Region::new(10, 12, 20, 20),
                Region::new(10, 60, 20, 20),
            ],
        );
        let det = detect_boxes(&img, &Hint::None, &square_cfg(30), &CancelToken::new()).unwrap();
        assert!(det.warnings.is_empty());
        let raws: Vec<Region> = det.boxes.iter().map(|b| b.raw).collect();
        assert_eq!(
            raws,
            vec![
                Region::new(100, 10, 20, 20),
                Region::new(10, 12, 20, 20),
                Region::new(10, 60, 20, 20),
            ]
        );
        assert_eq!(
            det.boxes.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        // square blobs at a square ratio need no correction
        assert!(det.boxes.iter().all(|b| b.raw == b.normalized));
    }

    #[test]
    fn test_grid_hint_warns_on_empty_cell() {
        let img = sheet(200, 100, &[Region::new(20, 20, 30, 40)]);
        let hint = Hint::Grid(GridSpec {
            rows: 1,
            cols: 2,
            outer_margin: 0,
            cell_gutter: 0,
        });
        let det = detect_boxes(&img, &hint, &square_cfg(40), &CancelToken::new()).unwrap();
        assert_eq!(det.boxes.len(), 1);
        assert_eq!(det.boxes[0].normalized, Region::new(15, 20, 40, 40));
        assert!(matches!(
            det.warnings.as_slice(),
            [CutError::HintCardinalityMismatch {
                cell: 1,
                expected: 1,
                found: 0,
            }]
        ));
    }

    #[test]
    fn test_grid_hint_warns_on_crowded_cell() {
        let img = sheet(
            200,
            100,
            &[
                Region::new(10, 10, 20, 20),
                Region::new(10, 60, 20, 20),
                Region::new(110, 40, 20, 20),
            ],
        );
        let hint = Hint::Grid(GridSpec {
            rows: 1,
            cols: 2,
            outer_margin: 0,
            cell_gutter: 0,
        });
        let det = detect_boxes(&img, &hint, &square_cfg(40), &CancelToken::new()).unwrap();
        assert!(matches!(
            det.warnings.as_slice(),
            [CutError::HintCardinalityMismatch {
                cell: 0,
                expected: 1,
                found: 2,
            }]
        ));
        // the crowded cell keeps both components, ordered with the rest
        let raws: Vec<Region> = det.boxes.iter().map(|b| b.raw).collect();
        assert_eq!(
            raws,
            vec![
                Region::new(10, 10, 20, 20),
                Region::new(110, 40, 20, 20),
                Region::new(10, 60, 20, 20),
            ]
        );
        assert_eq!(
            det.boxes.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_empty_sheet_is_fatal() {
        let img = sheet(100, 100, &[]);
        let err = detect_boxes(&img, &Hint::None, &square_cfg(30), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CutError::NoRegionFound { .. }));

        let hint = Hint::Grid(GridSpec {
            rows: 2,
            cols: 2,
            outer_margin: 0,
            cell_gutter: 0,
        });
        let err = detect_boxes(&img, &hint, &square_cfg(30), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CutError::NoRegionFound { .. }));
    }

    #[test]
    fn test_zero_sized_buffer_is_rejected() {
        let img = RgbaImage::new(0, 0);
        let err = detect_boxes(&img, &Hint::None, &square_cfg(30), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CutError::EmptyImage));
    }

    #[test]
    fn test_unfittable_box_is_skipped_with_warning() {
        let img = sheet(50, 50, &[Region::new(5, 5, 40, 40)]);
        let mut cfg = square_cfg(30);
        cfg.render.padding = Padding::Pixels(10);
        let det = detect_boxes(&img, &Hint::None, &cfg, &CancelToken::new()).unwrap();
        assert!(det.boxes.is_empty());
        assert!(matches!(
            det.warnings.as_slice(),
            [CutError::BoxExceedsBounds { need_width: 60, .. }]
        ));
    }

    #[test]
    fn test_cancelled_token_stops_detection() {
        let img = sheet(100, 100, &[Region::new(10, 10, 20, 20)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = detect_boxes(&img, &Hint::None, &square_cfg(30), &cancel).unwrap_err();
        assert!(matches!(err, CutError::Cancelled));
    }

    #[test]
    fn test_extract_renders_every_box() {
        let img = sheet(
            200,
            100,
            &[Region::new(10, 10, 20, 20), Region::new(100, 10, 20, 20)],
        );
        let out = extract_cards(&img, &Hint::None, &square_cfg(64), &CancelToken::new()).unwrap();
        assert_eq!(out.cards.len(), 2);
        for (i, card) in out.cards.iter().enumerate() {
            assert_eq!(card.id, i);
            assert_eq!(card.image.dimensions(), (64, 64));
        }
    }

    #[test]
    fn test_select_box_by_id() {
        let boxes = [
            CardBox {
                id: 0,
                raw: Region::new(0, 0, 5, 5),
                normalized: Region::new(0, 0, 5, 5),
            },
            CardBox {
                id: 2,
                raw: Region::new(20, 0, 5, 5),
                normalized: Region::new(20, 0, 5, 5),
            },
        ];
        assert_eq!(select_box(&boxes, 2).unwrap().id, 2);
        assert!(matches!(
            select_box(&boxes, 1),
            Err(CutError::UnknownCardId { id: 1, count: 2 })
        ));
    }

    #[test]
    fn test_outlines_trace_boxes_on_a_copy() {
        let img = sheet(100, 100, &[Region::new(10, 10, 20, 20)]);
        let boxes = [CardBox {
            id: 0,
            raw: Region::new(10, 10, 20, 20),
            normalized: Region::new(8, 8, 24, 24),
        }];
        let red = Rgba([255, 0, 0, 255]);
        let traced = draw_outlines(&img, &boxes, OutlineBox::Normalized, red);
        assert_eq!(*traced.get_pixel(8, 8), red);
        assert_eq!(*traced.get_pixel(31, 31), red);
        assert_eq!(*img.get_pixel(8, 8), Rgba([0, 0, 0, 0]));

        let traced = draw_outlines(&img, &boxes, OutlineBox::Raw, red);
        assert_eq!(*traced.get_pixel(10, 10), red);
    }
}
