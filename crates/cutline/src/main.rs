//! cutline: quote a laser-cut acrylic piece from an image file.
//!
//! Segments the subject, measures its shape, generates print and cutting
//! lines (with an optional keyring hole) and prints the quote metrics.
//! Optionally writes a preview PNG and an SVG of the manufacturing lines.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin cutline -- <IMAGE> --width-mm 50 --height-mm 40 [OPTIONS]
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use cutline_export::SvgMetadata;
use cutline_io::{FsMaskCache, load_config, read_image, write_png};
use cutline_pipeline::{
    AttachmentPosition, CuttingConfig, CuttingOptions, HoleType, MaskExtractor, PhysicalSize,
    PixelPoint, PreviewStyle, ProductType, Quote, QuoteRequest, extract_cached, quote_image,
    quote_mask,
};
use image::DynamicImage;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Quote a laser-cut acrylic piece from an image.
///
/// Extracts the subject, measures its complexity, and generates the print
/// and cutting lines at the requested physical size.
#[derive(Parser)]
#[command(name = "cutline", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Printed width in millimetres.
    #[arg(long)]
    width_mm: f64,

    /// Printed height in millimetres.
    #[arg(long)]
    height_mm: f64,

    /// Product being manufactured.
    #[arg(long, value_enum, default_value_t = Product::Objet)]
    product: Product,

    /// Keyring attachment style.
    #[arg(long, value_enum, default_value_t = Hole::Ring)]
    hole: Hole,

    /// Side of the piece carrying the keyring attachment.
    #[arg(long, value_enum, default_value_t = Position::Top)]
    position: Position,

    /// Cutting configuration JSON file. A missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for cached foreground masks.
    #[arg(long)]
    mask_cache: Option<PathBuf>,

    /// Write a preview PNG to this path.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Write the print and cutting lines as SVG to this path.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Outline of the subject as `x,y;x,y;...` in image pixels. Replaces
    /// automatic segmentation.
    #[arg(long, value_parser = parse_polygon)]
    polygon: Option<Polygon>,

    /// Output the quote as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Product selection.
#[derive(Clone, Copy, ValueEnum)]
enum Product {
    /// Freestanding acrylic piece.
    Objet,
    /// Keyring with an attachment hole.
    Keyring,
}

/// Keyring attachment selection.
#[derive(Clone, Copy, ValueEnum)]
enum Hole {
    /// Round hole on a tab outside the cutting line.
    Ring,
    /// Hole drilled through the piece.
    Internal,
}

/// Attachment side selection.
#[derive(Clone, Copy, ValueEnum)]
enum Position {
    Top,
    Bottom,
    Left,
    Right,
}

impl Cli {
    const fn options(&self) -> CuttingOptions {
        CuttingOptions {
            product_type: match self.product {
                Product::Objet => ProductType::Objet,
                Product::Keyring => ProductType::Keyring,
            },
            hole_type: match self.hole {
                Hole::Ring => HoleType::Ring,
                Hole::Internal => HoleType::Internal,
            },
            attachment_position: match self.position {
                Position::Top => AttachmentPosition::Top,
                Position::Bottom => AttachmentPosition::Bottom,
                Position::Left => AttachmentPosition::Left,
                Position::Right => AttachmentPosition::Right,
            },
        }
    }

    const fn size_mm(&self) -> PhysicalSize {
        PhysicalSize::new(self.width_mm, self.height_mm)
    }
}

/// A `--polygon` value: at least 3 pixel points.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Polygon(Vec<PixelPoint>);

/// Parse `x,y;x,y;...` into pixel points.
fn parse_polygon(s: &str) -> Result<Polygon, String> {
    let points = s
        .split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected x,y but got {pair:?}"))?;
            let x = x
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("bad x in {pair:?}: {e}"))?;
            let y = y
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("bad y in {pair:?}: {e}"))?;
            Ok(PixelPoint::new(x, y))
        })
        .collect::<Result<Vec<_>, String>>()?;
    if points.len() < 3 {
        return Err(format!(
            "a polygon needs at least 3 points, got {}",
            points.len()
        ));
    }
    Ok(Polygon(points))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !(cli.width_mm > 0.0 && cli.height_mm > 0.0) {
        eprintln!("--width-mm and --height-mm must be positive");
        return ExitCode::FAILURE;
    }

    let config = match cli
        .config
        .as_deref()
        .map_or_else(|| Ok(CuttingConfig::default()), load_config)
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let source = match read_image(&cli.image) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };

    let request = QuoteRequest {
        size_mm: cli.size_mm(),
        options: cli.options(),
        polygon: cli.polygon.clone().map(|p| p.0),
    };
    let extractor = MaskExtractor::default();

    let quote = match (&cli.mask_cache, &request.polygon) {
        (Some(dir), None) => {
            let cache = match FsMaskCache::new(dir) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error opening mask cache {}: {e}", dir.display());
                    return ExitCode::FAILURE;
                }
            };
            let key = cache_key(&cli.image);
            extract_cached(&extractor, &cache, &key, &source).map(|extraction| {
                quote_mask(extraction.mask, extraction.strategy, &request, &config)
            })
        }
        _ => quote_image(&source, &request, &extractor, &config),
    };
    let quote = match quote {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&quote.summary()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing quote: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report(&quote));
    }

    if let Some(ref preview_path) = cli.preview {
        write_preview(preview_path, &source, &quote, request.size_mm, &config);
    }

    if let Some(ref svg_path) = cli.svg {
        let Some(cutting) = &quote.cutting else {
            eprintln!("No cutting line was generated; skipping SVG");
            return ExitCode::FAILURE;
        };
        let title = cli.image.file_stem().and_then(|s| s.to_str());
        let description = format!(
            "{} mm x {} mm, print offset {} mm, cutting offset {} mm",
            cli.width_mm, cli.height_mm, config.print_offset_mm, config.cutting_offset_mm
        );
        let config_json = serde_json::to_string(&config).ok();
        let metadata = SvgMetadata {
            title,
            description: Some(&description),
            config_json: config_json.as_deref(),
        };
        let svg = cutline_export::to_svg(cutting, request.size_mm, &metadata);
        if let Err(e) = std::fs::write(svg_path, &svg) {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
            return ExitCode::FAILURE;
        }
        eprintln!("SVG written to {}", svg_path.display());
    }

    ExitCode::SUCCESS
}

/// The mask cache key: the image's file name.
fn cache_key(image: &Path) -> String {
    image
        .file_name()
        .map_or_else(|| image.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Render and write the preview. Failures are logged but never fail the
/// run.
fn write_preview(
    path: &Path,
    source: &DynamicImage,
    quote: &Quote,
    size_mm: PhysicalSize,
    config: &CuttingConfig,
) {
    let Some(cutting) = &quote.cutting else {
        warn!(path = %path.display(), "no cutting line, preview skipped");
        return;
    };
    let style = PreviewStyle::for_config(config);
    let written = cutline_pipeline::render(source, cutting, Some(size_mm), &style)
        .map_err(cutline_io::IoError::from)
        .and_then(|raster| write_png(path, &raster));
    match written {
        Ok(()) => eprintln!("Preview written to {}", path.display()),
        Err(e) => warn!(path = %path.display(), error = %e, "preview failed"),
    }
}

fn report(quote: &Quote) -> String {
    let m = &quote.metrics;
    let fallback = if quote.rectangle_fallback {
        " (rectangle fallback)"
    } else {
        ""
    };
    let mut lines = vec![
        format!(
            "Image:          {}x{} px (mask: {})",
            quote.dimensions.width, quote.dimensions.height, quote.mask_strategy
        ),
        format!(
            "Shape:          {} x {} mm, area {} mm², perimeter {} mm",
            m.bbox_width_mm, m.bbox_height_mm, m.area_mm2, m.perimeter_mm
        ),
        format!(
            "Complexity:     {:.4} (outline {:.4}, direction {:.4})",
            m.metrics.complexity_score, m.metrics.outline_length, m.metrics.direction_change
        ),
        format!(
            "Geometry:       {} vertices, circularity {:.4}, fill {:.4}{}",
            m.metrics.vertex_count,
            m.metrics.circularity,
            m.metrics.fill_ratio,
            fallback
        ),
    ];
    match &quote.cutting_metrics {
        Some(c) => lines.push(format!(
            "Cutting line:   {} x {} mm, area {} mm², length {} mm",
            c.cutting_bbox_mm.0, c.cutting_bbox_mm.1, c.area_mm2, c.perimeter_mm
        )),
        None => lines.push("Cutting line:   not available".to_owned()),
    }
    lines.push(format!(
        "Finished size:  {} x {} mm",
        quote.physical_size_mm.width_mm, quote.physical_size_mm.height_mm
    ));
    if quote.drilling_fee > 0 {
        lines.push(format!("Drilling fee:   {}", quote.drilling_fee));
    }
    lines.join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn polygon_parses_pairs() {
        let pts = parse_polygon("0,0; 10,0;10, 10;").unwrap();
        assert_eq!(
            pts,
            Polygon(vec![
                PixelPoint::new(0, 0),
                PixelPoint::new(10, 0),
                PixelPoint::new(10, 10),
            ])
        );
    }

    #[test]
    fn polygon_rejects_short_or_malformed_input() {
        assert!(parse_polygon("0,0;1,1").is_err());
        assert!(parse_polygon("0,0;1;2,2").is_err());
        assert!(parse_polygon("a,0;1,1;2,2").is_err());
    }

    #[test]
    fn cache_key_is_the_file_name() {
        assert_eq!(cache_key(Path::new("/uploads/cat.png")), "cat.png");
    }

    #[test]
    fn cli_parses_keyring_flags() {
        let cli = Cli::try_parse_from([
            "cutline",
            "in.png",
            "--width-mm",
            "50",
            "--height-mm",
            "40",
            "--product",
            "keyring",
            "--hole",
            "internal",
            "--position",
            "left",
            "--polygon",
            "0,0;5,0;5,5",
        ])
        .unwrap();
        let options = cli.options();
        assert_eq!(options.product_type, ProductType::Keyring);
        assert_eq!(options.hole_type, HoleType::Internal);
        assert_eq!(options.attachment_position, AttachmentPosition::Left);
        assert_eq!(
            cli.polygon,
            Some(Polygon(vec![
                PixelPoint::new(0, 0),
                PixelPoint::new(5, 0),
                PixelPoint::new(5, 5),
            ]))
        );
    }

    #[test]
    fn cli_defaults_without_optional_flags() {
        let cli =
            Cli::try_parse_from(["cutline", "in.png", "--width-mm", "50", "--height-mm", "40"])
                .unwrap();
        assert!(cli.polygon.is_none());
        assert_eq!(cli.options(), CuttingOptions::default());
        assert!(!cli.json);
    }

    #[test]
    fn cli_rejects_a_short_polygon() {
        let parsed = Cli::try_parse_from([
            "cutline",
            "in.png",
            "--width-mm",
            "50",
            "--height-mm",
            "40",
            "--polygon",
            "0,0;5,0",
        ]);
        assert!(parsed.is_err());
    }
}
