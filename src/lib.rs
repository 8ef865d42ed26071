pub mod cli;
pub mod error;
pub mod geometry;
pub mod hint;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod segment;

pub use cli::{Cli, ModeArg};
pub use error::{CutError, Result};
pub use geometry::{AspectRatio, Padding, Region};
pub use hint::{Anchor, AnchorSet, GridSpec, Hint};
pub use normalize::normalize_box;
pub use pipeline::{
    detect_boxes, draw_outlines, extract_cards, render_boxes, select_box, CancelToken, Card,
    CardBox, Detection, Extraction, OutlineBox, PipelineConfig,
};
pub use render::{render_card, Background, RenderConfig};
pub use segment::{find_regions, Connectivity, Foreground, SegmentOptions};
