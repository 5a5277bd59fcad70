//! # docuscan - Document Scanning Library
//!
//! docuscan detects quadrilateral document boundaries in photos and rectifies
//! them into flat, top-down scans, in pure Rust.
//!
//! ## Features
//!
//! - **Pure Rust**: no OpenCV dependency; thresholding, contour extraction
//!   and warping are built on the `image`/`imageproc` ecosystem
//! - **Four corner heuristics**: iterative polygon approximation,
//!   minimum-area rectangle, convex-hull approximation and
//!   farthest-from-centroid, selectable per scan
//! - **Graceful degradation**: when no document boundary is found, a
//!   fixed-margin rectangle is used instead of failing
//! - **Interactive adjustment**: a windowing-toolkit-agnostic session state
//!   machine for dragging corners before rectification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docuscan::{DetectConfig, DocScanner, ScanConfig};
//!
//! let scanner = DocScanner::new(DetectConfig::default(), ScanConfig::default());
//! let output = scanner.scan("photo.jpg")?;
//!
//! output.warped.save("scan.png")?;
//! println!("corners: {:?}, fallback: {}", output.corners, output.used_fallback);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
mod contours;
mod corners;
mod draw;
mod error;
mod geometry;
mod preprocess;
mod scanner;
mod session;
mod types;

// Public API exports
pub use crate::corners::{
    approx_poly_iterative, convex_hull_approx, fallback_margin_quad, farthest_from_centroid,
    min_area_box, CornerDetector, DetectedQuad, StrategyResults,
};
pub use crate::draw::{
    build_montages, draw_corner_markers, draw_quad_outline, draw_session, draw_strategy_overlay,
};
pub use crate::error::ScanError;
pub use crate::geometry::{order_corners, quad_area, rectify_quad, scale_quad};
pub use crate::preprocess::{resize_to_height, Binarized, DocPreProcess};
pub use crate::scanner::{DocScanner, ScanOutput};
pub use crate::session::AdjustSession;
pub use crate::types::{CornerStrategy, DetectConfig, Point2f, Quad, ScanConfig};

/// Scan summary with corners in reading order, as serialized by the CLI.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanReport {
    /// Corners ordered [top-left, top-right, bottom-right, bottom-left].
    pub corners: [(f32, f32); 4],
    /// Dimensions of the rectified output.
    pub width: u32,
    pub height: u32,
    /// True when the fixed-margin fallback rectangle was used.
    pub used_fallback: bool,
}

impl From<&ScanOutput> for ScanReport {
    fn from(out: &ScanOutput) -> Self {
        Self {
            corners: [
                (out.corners[0].x, out.corners[0].y),
                (out.corners[1].x, out.corners[1].y),
                (out.corners[2].x, out.corners[2].y),
                (out.corners[3].x, out.corners[3].y),
            ],
            width: out.warped.width(),
            height: out.warped.height(),
            used_fallback: out.used_fallback,
        }
    }
}
