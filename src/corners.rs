use image::DynamicImage;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull, min_area_rect};
use imageproc::point::Point;
use tracing::{debug, warn};

use crate::contours::{centroid, find_external_contours, largest_contour};
use crate::preprocess::DocPreProcess;
use crate::types::{CornerStrategy, DetectConfig, Point2f, Quad};

/// Result of corner detection on one image.
#[derive(Debug, Clone)]
pub struct DetectedQuad {
    pub corners: Quad,
    /// True when no heuristic produced 4 corners and the fixed-margin
    /// rectangle was substituted.
    pub fallback: bool,
}

/// Output of running every heuristic on the same contour, for side-by-side
/// comparison.
#[derive(Debug, Clone, Default)]
pub struct StrategyResults {
    pub iterative: Option<Quad>,
    pub min_area: Option<Quad>,
    pub hull: Option<Quad>,
    pub farthest: Option<Quad>,
}

fn to_quad(pts: &[Point<i32>]) -> Quad {
    [
        Point2f::new(pts[0].x as f32, pts[0].y as f32),
        Point2f::new(pts[1].x as f32, pts[1].y as f32),
        Point2f::new(pts[2].x as f32, pts[2].y as f32),
        Point2f::new(pts[3].x as f32, pts[3].y as f32),
    ]
}

/// Sweep the Douglas-Peucker tolerance from `eps_start` to `eps_end` (as
/// fractions of the closed perimeter) and return the first approximation
/// with exactly 4 vertices.
pub fn approx_poly_iterative(contour: &[Point<i32>], cfg: &DetectConfig) -> Option<Quad> {
    if contour.len() < 4 {
        return None;
    }
    let peri = arc_length(contour, true);
    let steps = cfg.eps_steps.max(2);
    for i in 0..steps {
        let frac = cfg.eps_start + (cfg.eps_end - cfg.eps_start) * i as f32 / (steps - 1) as f32;
        let approx = approximate_polygon_dp(contour, frac as f64 * peri, true);
        if approx.len() == 4 {
            debug!(eps = frac as f64, "iterative approximation converged");
            return Some(to_quad(&approx));
        }
    }
    None
}

/// Minimum-area rotated bounding rectangle of the contour.
pub fn min_area_box(contour: &[Point<i32>]) -> Option<Quad> {
    if contour.len() < 3 {
        return None;
    }
    let rect = min_area_rect(contour);
    Some(to_quad(&rect))
}

/// Convex hull followed by one Douglas-Peucker pass at `hull_eps` of the
/// hull perimeter. `Some` only when exactly 4 vertices remain.
pub fn convex_hull_approx(contour: &[Point<i32>], cfg: &DetectConfig) -> Option<Quad> {
    if contour.len() < 3 {
        return None;
    }
    let hull = convex_hull(contour);
    if hull.len() < 3 {
        return None;
    }
    let peri = arc_length(&hull, true);
    let approx = approximate_polygon_dp(&hull, cfg.hull_eps as f64 * peri, true);
    if approx.len() == 4 {
        Some(to_quad(&approx))
    } else {
        None
    }
}

/// The 4 contour points with the largest squared distance from the area
/// centroid. Left unordered, exactly as sampled.
pub fn farthest_from_centroid(contour: &[Point<i32>]) -> Option<Quad> {
    if contour.len() < 4 {
        return None;
    }
    let c = centroid(contour)?;
    let dist2 = |p: &Point<i32>| {
        let dx = p.x as f32 - c.x;
        let dy = p.y as f32 - c.y;
        dx * dx + dy * dy
    };
    let mut indices: Vec<usize> = (0..contour.len()).collect();
    indices.sort_by(|&a, &b| {
        dist2(&contour[b])
            .partial_cmp(&dist2(&contour[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let picked: Vec<Point<i32>> = indices[..4].iter().map(|&i| contour[i]).collect();
    Some(to_quad(&picked))
}

/// Fixed-margin rectangle inset from the image bounds.
///
/// The margin is clamped so the rectangle never collapses on small images.
pub fn fallback_margin_quad(width: u32, height: u32, margin: u32) -> Quad {
    let m = margin.min(width / 4).min(height / 4) as f32;
    let w = width as f32;
    let h = height as f32;
    [
        Point2f::new(m, m),
        Point2f::new(w - m, m),
        Point2f::new(w - m, h - m),
        Point2f::new(m, h - m),
    ]
}

/// Detects document corner candidates in an image.
pub struct CornerDetector {
    pub cfg: DetectConfig,
}

impl CornerDetector {
    pub fn new(cfg: DetectConfig) -> Self {
        Self { cfg }
    }

    /// Threshold the image, take the largest external contour and reduce it
    /// to 4 corners with the given strategy.
    ///
    /// Never fails: when no contour or no 4-corner reduction is found the
    /// fixed-margin rectangle is returned with `fallback` set.
    pub fn run(&self, img: &DynamicImage, strategy: CornerStrategy) -> DetectedQuad {
        if let Some(contour) = self.largest_document_contour(img) {
            if let Some(corners) = self.apply(strategy, &contour) {
                return DetectedQuad {
                    corners,
                    fallback: false,
                };
            }
        }

        warn!(
            ?strategy,
            "no 4-corner candidate found, using margin rectangle"
        );
        DetectedQuad {
            corners: fallback_margin_quad(img.width(), img.height(), self.cfg.fallback_margin),
            fallback: true,
        }
    }

    /// Run every heuristic on the largest contour of the image.
    pub fn run_all(&self, img: &DynamicImage) -> StrategyResults {
        match self.largest_document_contour(img) {
            Some(contour) => StrategyResults {
                iterative: approx_poly_iterative(&contour, &self.cfg),
                min_area: min_area_box(&contour),
                hull: convex_hull_approx(&contour, &self.cfg),
                farthest: farthest_from_centroid(&contour),
            },
            None => StrategyResults::default(),
        }
    }

    /// Apply one heuristic to a contour.
    pub fn apply(&self, strategy: CornerStrategy, contour: &[Point<i32>]) -> Option<Quad> {
        match strategy {
            CornerStrategy::Iterative => approx_poly_iterative(contour, &self.cfg),
            CornerStrategy::MinAreaRect => min_area_box(contour),
            CornerStrategy::ConvexHull => convex_hull_approx(contour, &self.cfg),
            CornerStrategy::Farthest => farthest_from_centroid(contour),
        }
    }

    fn largest_document_contour(&self, img: &DynamicImage) -> Option<Vec<Point<i32>>> {
        let pre = DocPreProcess::new(self.cfg.blur_sigma, self.cfg.invert);
        let binarized = pre.run(img);
        let contours = find_external_contours(&binarized.mask);
        debug!(count = contours.len(), "external contours extracted");
        largest_contour(contours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn document_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(400, 500, Luma([30u8]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    fn near(quad: &Quad, x: f32, y: f32, tol: f32) -> bool {
        quad.iter().any(|p| (p.x - x).abs() <= tol && (p.y - y).abs() <= tol)
    }

    #[test]
    fn iterative_finds_rectangle_corners() {
        let det = CornerDetector::new(DetectConfig::default());
        let out = det.run(&document_image(), CornerStrategy::Iterative);
        assert!(!out.fallback);
        for (x, y) in [(50.0, 60.0), (349.0, 60.0), (349.0, 439.0), (50.0, 439.0)] {
            assert!(near(&out.corners, x, y, 4.0), "missing corner ({x},{y}): {:?}", out.corners);
        }
    }

    #[test]
    fn min_area_rect_matches_axis_aligned_document() {
        let det = CornerDetector::new(DetectConfig::default());
        let out = det.run(&document_image(), CornerStrategy::MinAreaRect);
        assert!(!out.fallback);
        assert!(near(&out.corners, 50.0, 60.0, 4.0));
        assert!(near(&out.corners, 349.0, 439.0, 4.0));
    }

    #[test]
    fn hull_approx_yields_four_corners() {
        let det = CornerDetector::new(DetectConfig::default());
        let out = det.run(&document_image(), CornerStrategy::ConvexHull);
        assert!(!out.fallback);
    }

    #[test]
    fn farthest_points_land_near_corners() {
        let det = CornerDetector::new(DetectConfig::default());
        let out = det.run(&document_image(), CornerStrategy::Farthest);
        assert!(!out.fallback);
        // Every picked point should be close to one of the four true corners.
        for p in &out.corners {
            let corner_dist = [(50.0, 60.0), (349.0, 60.0), (349.0, 439.0), (50.0, 439.0)]
                .iter()
                .map(|&(x, y): &(f32, f32)| (p.x - x).hypot(p.y - y))
                .fold(f32::INFINITY, f32::min);
            assert!(corner_dist < 8.0, "point {p:?} far from all corners");
        }
    }

    #[test]
    fn blank_image_degrades_to_margin_rectangle() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 200, Luma([0u8])));
        let det = CornerDetector::new(DetectConfig::default());
        let out = det.run(&blank, CornerStrategy::Iterative);
        assert!(out.fallback);
        assert_eq!(out.corners[0], Point2f::new(50.0, 50.0));
        assert_eq!(out.corners[2], Point2f::new(250.0, 150.0));
    }

    #[test]
    fn fallback_margin_clamps_on_tiny_images() {
        let q = fallback_margin_quad(40, 40, 50);
        assert!(q[0].x >= 0.0 && q[0].x < q[1].x);
        assert!(q[1].x <= 40.0);
    }

    #[test]
    fn run_all_reports_every_strategy_on_clean_input() {
        let det = CornerDetector::new(DetectConfig::default());
        let all = det.run_all(&document_image());
        assert!(all.iterative.is_some());
        assert!(all.min_area.is_some());
        assert!(all.hull.is_some());
        assert!(all.farthest.is_some());
    }

    #[test]
    fn run_all_is_empty_without_contours() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, Luma([0u8])));
        let det = CornerDetector::new(DetectConfig::default());
        let all = det.run_all(&blank);
        assert!(all.iterative.is_none());
        assert!(all.min_area.is_none());
    }
}
