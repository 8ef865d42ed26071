use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use image::ImageReader;
use log::info;
use std::fs;
use std::path::Path;

use cardcut::{
    detect_boxes, draw_outlines, render_boxes, select_box, CancelToken, CardBox, Cli, CutError,
    Foreground, ModeArg, PipelineConfig,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.inputs.len() > 1 && cli.stem.is_some() {
        bail!("--stem only works with a single input image");
    }
    if !matches!(cli.mode, ModeArg::Bbox) {
        fs::create_dir_all(&cli.out_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", cli.out_dir))?;
    }

    for input in &cli.inputs {
        process_sheet(&cli, input)?;
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default)).init();
}

fn process_sheet(cli: &Cli, input: &Path) -> Result<()> {
    // Load the sheet
    let img = ImageReader::open(input)
        .with_context(|| format!("Failed to open input file: {:?}", input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", input))?;
    let has_alpha = img.color().has_alpha();
    let sheet = img.to_rgba8();
    if sheet.width() == 0 || sheet.height() == 0 {
        return Err(CutError::EmptyImage)
            .with_context(|| format!("Cannot process {:?}", input));
    }
    info!(
        "loaded {:?} ({}x{}, alpha: {})",
        input,
        sheet.width(),
        sheet.height(),
        has_alpha
    );

    // Pick the foreground rule: explicit key color wins, then real
    // transparency, then keying on the top-left pixel
    let foreground = match (cli.key_color, has_alpha) {
        (Some(color), _) => Foreground::KeyColor {
            color: [color[0], color[1], color[2]],
            tolerance: cli.color_threshold,
        },
        (None, true) => Foreground::Alpha {
            threshold: cli.alpha_threshold,
        },
        (None, false) => {
            let px = sheet.get_pixel(0, 0);
            info!(
                "no alpha channel; keying on the top-left color {:?}",
                [px[0], px[1], px[2]]
            );
            Foreground::KeyColor {
                color: [px[0], px[1], px[2]],
                tolerance: cli.color_threshold,
            }
        }
    };

    let cfg = PipelineConfig {
        segment: cli.segment_options(foreground),
        render: cli.render_config(),
    };
    let hint = cli.hint();
    let cancel = CancelToken::new();

    // Detect card boxes
    let detection = detect_boxes(&sheet, &hint, &cfg, &cancel)
        .with_context(|| format!("Detection failed on {:?}", input))?;
    let boxes = match cli.card {
        Some(id) => vec![select_box(&detection.boxes, id)?],
        None => detection.boxes,
    };

    match cli.mode {
        ModeArg::Bbox => report_boxes(cli, &boxes)?,
        ModeArg::Outline => {
            let traced = draw_outlines(
                &sheet,
                &boxes,
                cli.outline_box.to_outline_box(),
                cli.outline_color,
            );
            let path = cli.outline_path(input);
            traced
                .save(&path)
                .with_context(|| format!("Failed to save outline image: {:?}", path))?;
            eprintln!("Saved outline sheet: {:?}", path);
        }
        ModeArg::Full => {
            let cards = render_boxes(&sheet, &boxes, &cfg.render, &cancel)
                .with_context(|| format!("Rendering failed on {:?}", input))?;
            for card in &cards {
                let path = cli.output_path(input, card.id);
                card.image
                    .save(&path)
                    .with_context(|| format!("Failed to save card image: {:?}", path))?;
            }
            eprintln!(
                "Cut {} card(s) from {:?} into {:?}",
                cards.len(),
                input,
                cli.out_dir
            );
        }
    }

    Ok(())
}

fn report_boxes(cli: &Cli, boxes: &[CardBox]) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(boxes).context("Failed to encode boxes as JSON")?;
        println!("{json}");
    } else {
        for b in boxes {
            println!("card {}: raw {} -> normalized {}", b.id, b.raw, b.normalized);
        }
    }
    Ok(())
}
