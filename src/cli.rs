use clap::{ArgAction, Parser, ValueEnum};
use image::imageops::FilterType;
use image::Rgba;
use std::path::{Path, PathBuf};

use crate::geometry::{AspectRatio, Padding, Region};
use crate::hint::{Anchor, AnchorSet, GridSpec, Hint};
use crate::pipeline::OutlineBox;
use crate::render::{Background, RenderConfig};
use crate::segment::{Connectivity, Foreground, SegmentOptions};

#[derive(Parser, Debug)]
#[command(name = "cardcut")]
#[command(version, about = "Cut individual card images out of a composite card sheet")]
pub struct Cli {
    /// Input sheet image paths
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory the cut cards are written into
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Output name stem [default: input file stem]
    #[arg(long)]
    pub stem: Option<String>,

    /// Padding around each card, in pixels ("12") or as a fraction ("0.05")
    #[arg(short, long, default_value = "0", value_parser = parse_padding)]
    pub padding: Padding,

    /// Card aspect ratio as W:H
    #[arg(short, long, default_value = "5:7", value_parser = parse_ratio)]
    pub ratio: AspectRatio,

    /// Output card size as WxH; must match the aspect ratio
    #[arg(short, long, default_value = "750x1050", value_parser = parse_size)]
    pub size: (u32, u32),

    /// Corner radius in output pixels
    #[arg(long, default_value_t = 0)]
    pub corner_radius: u32,

    /// Background behind transparent pixels: any CSS color, or "transparent"
    #[arg(short, long, default_value = "white", value_parser = parse_background)]
    pub background: Background,

    /// Resampling filter for scaling
    #[arg(long, value_enum, default_value_t = FilterArg::CatmullRom)]
    pub filter: FilterArg,

    /// Sheet layout as ROWSxCOLS, one card per cell
    #[arg(long, value_parser = parse_grid_dims, conflicts_with = "anchors")]
    pub grid: Option<(u32, u32)>,

    /// Pixels ignored around the whole sheet when using --grid
    #[arg(long, default_value_t = 0, requires = "grid")]
    pub grid_margin: u32,

    /// Pixels separating neighboring grid cells
    #[arg(long, default_value_t = 0, requires = "grid")]
    pub grid_gutter: u32,

    /// Approximate card positions, semicolon separated: "x,y" points or "x,y,w,h" boxes
    #[arg(long, value_parser = parse_anchors)]
    pub anchors: Option<AnchorListArg>,

    /// Pixels added around each anchor box
    #[arg(long, default_value_t = 8, requires = "anchors")]
    pub anchor_margin: u32,

    /// Alpha value at or below which a pixel counts as background
    #[arg(long, default_value_t = 10)]
    pub alpha_threshold: u8,

    /// Chroma-key background color for sheets without transparency [default: top-left pixel]
    #[arg(long, value_parser = parse_color)]
    pub key_color: Option<Rgba<u8>>,

    /// Color distance at or below which a pixel matches the key color
    #[arg(long, default_value_t = 16.0)]
    pub color_threshold: f64,

    /// Drop detected specks smaller than this many pixels
    #[arg(long, default_value_t = 16)]
    pub min_area: u32,

    /// Flood-fill neighbor rule
    #[arg(long, value_enum, default_value_t = ConnectivityArg::Eight)]
    pub connectivity: ConnectivityArg,

    /// What to produce
    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    pub mode: ModeArg,

    /// Only handle the card with this id
    #[arg(long)]
    pub card: Option<usize>,

    /// Which box outline mode traces
    #[arg(long, value_enum, default_value_t = OutlineBoxArg::Normalized)]
    pub outline_box: OutlineBoxArg,

    /// Outline color
    #[arg(long, default_value = "red", value_parser = parse_color)]
    pub outline_color: Rgba<u8>,

    /// Print detected boxes as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Increase log detail (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Anchor list parsed out of a single argument value.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorListArg(pub Vec<Anchor>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectivityArg {
    Four,
    Eight,
}

impl ConnectivityArg {
    pub fn to_connectivity(self) -> Connectivity {
        match self {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Cut and write every card image
    Full,
    /// Only report detected boxes
    Bbox,
    /// Write one sheet copy with boxes traced
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutlineBoxArg {
    Raw,
    Normalized,
}

impl OutlineBoxArg {
    pub fn to_outline_box(self) -> OutlineBox {
        match self {
            OutlineBoxArg::Raw => OutlineBox::Raw,
            OutlineBoxArg::Normalized => OutlineBox::Normalized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl FilterArg {
    pub fn to_filter(self) -> FilterType {
        match self {
            FilterArg::Nearest => FilterType::Nearest,
            FilterArg::Triangle => FilterType::Triangle,
            FilterArg::CatmullRom => FilterType::CatmullRom,
            FilterArg::Gaussian => FilterType::Gaussian,
            FilterArg::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl Cli {
    pub fn hint(&self) -> Hint {
        if let Some((rows, cols)) = self.grid {
            Hint::Grid(GridSpec {
                rows,
                cols,
                outer_margin: self.grid_margin,
                cell_gutter: self.grid_gutter,
            })
        } else if let Some(list) = &self.anchors {
            Hint::Anchors(AnchorSet {
                anchors: list.0.clone(),
                margin: self.anchor_margin,
            })
        } else {
            Hint::None
        }
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            padding: self.padding,
            ratio: self.ratio,
            output_width: self.size.0,
            output_height: self.size.1,
            corner_radius: self.corner_radius,
            background: self.background,
            filter: self.filter.to_filter(),
        }
    }

    pub fn segment_options(&self, foreground: Foreground) -> SegmentOptions {
        SegmentOptions {
            foreground,
            connectivity: self.connectivity.to_connectivity(),
            min_area: self.min_area,
        }
    }

    pub fn output_path(&self, input: &Path, id: usize) -> PathBuf {
        self.out_dir.join(format!("{}-{}.png", self.stem_for(input), id))
    }

    pub fn outline_path(&self, input: &Path) -> PathBuf {
        self.out_dir.join(format!("{}-outline.png", self.stem_for(input)))
    }

    fn stem_for(&self, input: &Path) -> String {
        match &self.stem {
            Some(stem) => stem.clone(),
            None => input
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
        }
    }
}

fn parse_padding(s: &str) -> Result<Padding, String> {
    if s.contains('.') {
        let fraction: f64 = s.parse().map_err(|_| format!("Invalid padding '{}'", s))?;
        if !fraction.is_finite() || fraction < 0.0 {
            return Err("Padding must be a non-negative number".to_string());
        }
        if fraction > 1e6 {
            return Err("Padding fraction is too large".to_string());
        }
        Ok(Padding::Fraction(fraction))
    } else {
        let pixels: u32 = s.parse().map_err(|_| format!("Invalid padding '{}'", s))?;
        Ok(Padding::Pixels(pixels))
    }
}

fn parse_ratio(s: &str) -> Result<AspectRatio, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid ratio format '{}', expected W:H", s));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width value: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height value: {}", parts[1]))?;

    if width == 0 || height == 0 {
        return Err("Ratio values must be positive".to_string());
    }

    Ok(AspectRatio { width, height })
}

fn parse_dims(s: &str, what: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid {} '{}', expected AxB", what, s));
    }

    let a: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid value: {}", parts[0]))?;
    let b: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid value: {}", parts[1]))?;

    if a == 0 || b == 0 {
        return Err(format!("{} values must be positive", what));
    }

    Ok((a, b))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    parse_dims(s, "size")
}

fn parse_grid_dims(s: &str) -> Result<(u32, u32), String> {
    parse_dims(s, "grid")
}

fn parse_background(s: &str) -> Result<Background, String> {
    if s.eq_ignore_ascii_case("transparent") {
        return Ok(Background::Transparent);
    }
    let color = csscolorparser::parse(s).map_err(|e| e.to_string())?;
    Ok(Background::Solid(Rgba(color.to_rgba8())))
}

fn parse_color(s: &str) -> Result<Rgba<u8>, String> {
    csscolorparser::parse(s)
        .map(|c| Rgba(c.to_rgba8()))
        .map_err(|e| e.to_string())
}

fn parse_anchors(s: &str) -> Result<AnchorListArg, String> {
    let mut anchors = Vec::new();
    for item in s.split(';') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let parts: Vec<&str> = item.split(',').collect();
        let number = |v: &str| -> Result<u32, String> {
            v.trim()
                .parse()
                .map_err(|_| format!("Invalid anchor value: {}", v))
        };
        match parts.len() {
            2 => anchors.push(Anchor::Point {
                x: number(parts[0])?,
                y: number(parts[1])?,
            }),
            4 => {
                let width = number(parts[2])?;
                let height = number(parts[3])?;
                if width == 0 || height == 0 {
                    return Err(format!("Anchor box '{}' has an empty side", item));
                }
                anchors.push(Anchor::Box(Region::new(
                    number(parts[0])?,
                    number(parts[1])?,
                    width,
                    height,
                )));
            }
            _ => {
                return Err(format!(
                    "Invalid anchor '{}', expected x,y or x,y,w,h",
                    item
                ))
            }
        }
    }
    if anchors.is_empty() {
        return Err("Anchor list is empty".to_string());
    }
    Ok(AnchorListArg(anchors))
}
