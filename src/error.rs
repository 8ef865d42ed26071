use thiserror::Error;

use crate::geometry::{AspectRatio, Region};

#[derive(Error, Debug)]
pub enum CutError {
    /// A scan rectangle yielded zero foreground components. Non-fatal for a
    /// single cell of a larger batch; fatal when detection finds nothing at
    /// all.
    #[error("no foreground region found in {bounds}")]
    NoRegionFound { bounds: Region },

    /// A hint implied a different number of components than segmentation
    /// found. Surfaced as a warning, never auto-resolved.
    #[error("cell {cell}: hint implied {expected} region(s) but segmentation found {found}")]
    HintCardinalityMismatch {
        cell: usize,
        expected: usize,
        found: usize,
    },

    /// A padded, aspect-corrected box is larger than the buffer on at least
    /// one axis, so no shift can make it fit.
    #[error(
        "normalized box {need_width}x{need_height} for region {raw} cannot fit \
         the {buf_width}x{buf_height} buffer"
    )]
    BoxExceedsBounds {
        raw: Region,
        need_width: u64,
        need_height: u64,
        buf_width: u32,
        buf_height: u32,
    },

    /// Output pixel size disagrees with the configured aspect ratio.
    #[error("output size {width}x{height} does not match the {ratio} aspect ratio")]
    OutputSizeMismatch {
        width: u32,
        height: u32,
        ratio: AspectRatio,
    },

    #[error("invalid hint: {0}")]
    InvalidHintSpec(String),

    #[error("input image has no pixels")]
    EmptyImage,

    /// Requested single-card id does not exist in the detection output.
    #[error("card {id} does not exist; detection produced {count} card(s)")]
    UnknownCardId { id: usize, count: usize },

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CutError>;
