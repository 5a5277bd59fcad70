use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use walkdir::WalkDir;

use docuscan::{
    build_montages, draw_strategy_overlay, order_corners, rectify_quad, resize_to_height,
    CornerDetector, CornerStrategy, DetectConfig, DocScanner, Point2f, Quad, ScanConfig,
    ScanError, ScanReport,
};

#[derive(Parser)]
#[command(name = "docuscan")]
#[command(about = "Document scanner - detect, adjust and rectify document photos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect a document in an image and write the rectified scan
    Scan {
        /// Input image path
        image: PathBuf,

        /// Output path for the rectified image
        #[arg(short, long, default_value = "scan.png")]
        output: PathBuf,

        /// Use these corners instead of auto-detection: x1,y1,x2,y2,x3,y3,x4,y4
        #[arg(long)]
        corners: Option<String>,

        /// Working height for detection
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Corner detection strategy
        #[arg(long, value_enum, default_value_t = StrategyArg::Iterative)]
        strategy: StrategyArg,

        /// Rotate the input clockwise before scanning (90, 180 or 270)
        #[arg(long)]
        rotate: Option<u32>,

        /// Treat dark pixels as the document
        #[arg(long)]
        invert: bool,

        /// Gaussian blur sigma applied before thresholding
        #[arg(long, default_value_t = 1.1)]
        blur_sigma: f32,

        /// Margin of the fallback rectangle in pixels
        #[arg(long, default_value_t = 50)]
        margin: u32,

        /// Output format for the corner report
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Render all corner heuristics over a folder of images as montages
    Compare {
        /// Directory of input images
        images: PathBuf,

        /// Directory the montage pages are written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Side length of each montage tile
        #[arg(long, default_value_t = 300)]
        tile: u32,

        /// Montage grid columns
        #[arg(long, default_value_t = 5)]
        cols: u32,

        /// Montage grid rows
        #[arg(long, default_value_t = 5)]
        rows: u32,

        /// Working height for detection
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Treat dark pixels as the document
        #[arg(long)]
        invert: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// JSON report with corners and output size
    Json,
    /// One corner per line as x,y
    Text,
    /// TSV: corners, width, height, fallback flag
    Tsv,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StrategyArg {
    /// Douglas-Peucker sweep with increasing epsilon
    Iterative,
    /// Minimum-area rotated rectangle
    MinRect,
    /// Convex hull approximation
    Hull,
    /// Farthest points from the centroid
    Farthest,
}

impl From<StrategyArg> for CornerStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Iterative => CornerStrategy::Iterative,
            StrategyArg::MinRect => CornerStrategy::MinAreaRect,
            StrategyArg::Hull => CornerStrategy::ConvexHull,
            StrategyArg::Farthest => CornerStrategy::Farthest,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            image,
            output,
            corners,
            height,
            strategy,
            rotate,
            invert,
            blur_sigma,
            margin,
            format,
        } => run_scan(
            &image, &output, corners, height, strategy, rotate, invert, blur_sigma, margin, format,
        ),
        Commands::Compare {
            images,
            out_dir,
            tile,
            cols,
            rows,
            height,
            invert,
        } => run_compare(&images, &out_dir, tile, cols, rows, height, invert),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    input: &Path,
    output: &Path,
    corners: Option<String>,
    height: u32,
    strategy: StrategyArg,
    rotate: Option<u32>,
    invert: bool,
    blur_sigma: f32,
    margin: u32,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let img = apply_rotation(image::open(input)?, rotate)?;

    let report;
    let warped;
    if let Some(spec) = corners {
        // Manual corners are the non-interactive stand-in for dragging.
        let quad = parse_corners(&spec)?;
        warped = rectify_quad(&img, &quad)?;
        let ordered = order_corners(&quad);
        report = ScanReport {
            corners: [
                (ordered[0].x, ordered[0].y),
                (ordered[1].x, ordered[1].y),
                (ordered[2].x, ordered[2].y),
                (ordered[3].x, ordered[3].y),
            ],
            width: warped.width(),
            height: warped.height(),
            used_fallback: false,
        };
    } else {
        let detect = DetectConfig {
            blur_sigma,
            invert,
            fallback_margin: margin,
            ..DetectConfig::default()
        };
        let global = ScanConfig {
            work_height: height,
            strategy: strategy.into(),
            ..ScanConfig::default()
        };
        let scanner = DocScanner::new(detect, global);
        let out = scanner.scan_image(&img)?;
        report = ScanReport::from(&out);
        warped = out.warped;
    }

    warped.save(output)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for (x, y) in &report.corners {
                println!("{x:.1},{y:.1}");
            }
        }
        OutputFormat::Tsv => {
            let corner_str = report
                .corners
                .iter()
                .map(|(x, y)| format!("{x:.1},{y:.1}"))
                .collect::<Vec<_>>()
                .join(",");
            println!(
                "{}\t{}\t{}\t{}",
                corner_str, report.width, report.height, report.used_fallback
            );
        }
    }

    Ok(())
}

fn run_compare(
    images: &Path,
    out_dir: &Path,
    tile: u32,
    cols: u32,
    rows: u32,
    height: u32,
    invert: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let detector = CornerDetector::new(DetectConfig {
        invert,
        ..DetectConfig::default()
    });

    let mut annotated = Vec::new();
    for entry in WalkDir::new(images)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if !is_image_file(path) {
            continue;
        }

        println!("Processing {}...", path.display());
        let img = match image::open(path) {
            Ok(img) => resize_to_height(&img, height),
            Err(err) => {
                eprintln!("  Failed to read {}: {err}", path.display());
                continue;
            }
        };

        let results = detector.run_all(&img);
        annotated.push(draw_strategy_overlay(&img, &results));
    }

    if annotated.is_empty() {
        println!("No images processed!");
        return Ok(());
    }

    fs::create_dir_all(out_dir)?;
    let pages = build_montages(&annotated, (tile, tile), (cols, rows));
    for (i, page) in pages.iter().enumerate() {
        let path = out_dir.join(format!("montage-{}.png", i + 1));
        page.save(&path)?;
        println!("Saved {}", path.display());
    }

    Ok(())
}

fn apply_rotation(
    img: image::DynamicImage,
    rotate: Option<u32>,
) -> Result<image::DynamicImage, Box<dyn std::error::Error>> {
    Ok(match rotate {
        None => img,
        Some(90) => img.rotate90(),
        Some(180) => img.rotate180(),
        Some(270) => img.rotate270(),
        Some(other) => {
            return Err(format!("--rotate must be 90, 180 or 270, got {other}").into());
        }
    })
}

fn parse_corners(spec: &str) -> Result<Quad, ScanError> {
    let values: Result<Vec<f32>, _> = spec.split(',').map(|v| v.trim().parse::<f32>()).collect();
    let values =
        values.map_err(|e| ScanError::InvalidCorners(format!("not a number: {e}")))?;
    if values.len() != 8 {
        return Err(ScanError::InvalidCorners(format!(
            "expected 8 comma-separated values, got {}",
            values.len()
        )));
    }
    Ok([
        Point2f::new(values[0], values[1]),
        Point2f::new(values[2], values[3]),
        Point2f::new(values[4], values[5]),
        Point2f::new(values[6], values[7]),
    ])
}

fn is_image_file(path: &Path) -> bool {
    const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
