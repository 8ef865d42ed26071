use log::trace;

use crate::error::{CutError, Result};
use crate::geometry::{AspectRatio, Padding, Region};

/// Grow a raw detection box into its final crop window.
///
/// Padding is applied first (fractional padding rounds outward to whole
/// pixels), then the shorter dimension grows symmetrically until the box is
/// as close to `ratio` as integer pixels allow, then the box is shifted back
/// inside the buffer. A box that cannot fit the buffer at all is an error.
pub fn normalize_box(
    raw: Region,
    buf_width: u32,
    buf_height: u32,
    padding: Padding,
    ratio: AspectRatio,
) -> Result<Region> {
    // padding wider than the whole buffer can never fit; clamping it keeps
    // the extent arithmetic inside i64
    let pad_x = padding.for_dimension(raw.width).min(buf_width as f64 + 1.0);
    let pad_y = padding.for_dimension(raw.height).min(buf_height as f64 + 1.0);

    let mut x0 = (raw.x as f64 - pad_x).floor() as i64;
    let mut x1 = (raw.right() as f64 + pad_x).ceil() as i64;
    let mut y0 = (raw.y as f64 - pad_y).floor() as i64;
    let mut y1 = (raw.bottom() as f64 + pad_y).ceil() as i64;

    let rw = ratio.width as i64;
    let rh = ratio.height as i64;
    let w = x1 - x0;
    let h = y1 - y0;
    // minimal integer cover of the other dimension at this ratio; a box with
    // either dimension already at its cover is a fixpoint, which is what
    // makes normalization idempotent
    let target_w = (h * rw + rh - 1) / rh;
    let target_h = (w * rh + rw - 1) / rw;
    if w != target_w && h != target_h {
        if w * rh < h * rw {
            let extra = target_w - w;
            x0 -= extra / 2;
            x1 += extra - extra / 2;
        } else {
            let extra = target_h - h;
            y0 -= extra / 2;
            y1 += extra - extra / 2;
        }
    }

    let need_width = x1 - x0;
    let need_height = y1 - y0;
    if need_width > buf_width as i64 || need_height > buf_height as i64 {
        return Err(CutError::BoxExceedsBounds {
            raw,
            need_width: need_width as u64,
            need_height: need_height as u64,
            buf_width,
            buf_height,
        });
    }

    if x0 < 0 {
        x1 -= x0;
        x0 = 0;
    }
    if x1 > buf_width as i64 {
        x0 -= x1 - buf_width as i64;
        x1 = buf_width as i64;
    }
    if y0 < 0 {
        y1 -= y0;
        y0 = 0;
    }
    if y1 > buf_height as i64 {
        y0 -= y1 - buf_height as i64;
        y1 = buf_height as i64;
    }

    let out = Region::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    );
    // the shift never pushes the window off the detection it came from
    debug_assert!(out.contains(&raw), "{out} lost {raw}");
    trace!("normalized {raw} to {out}");
    Ok(out)
}
