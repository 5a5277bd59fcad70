use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates (x right, y down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2f) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Four corner points of a document candidate.
///
/// Ordering is unspecified unless produced by
/// [`order_corners`](crate::order_corners), which canonicalizes to
/// [top-left, top-right, bottom-right, bottom-left].
pub type Quad = [Point2f; 4];

/// Strategy used to reduce a contour to four corner candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CornerStrategy {
    /// Douglas-Peucker sweep with increasing epsilon, first 4-vertex hit wins.
    #[default]
    Iterative,
    /// Minimum-area rotated bounding rectangle.
    MinAreaRect,
    /// Convex hull followed by a single Douglas-Peucker pass.
    ConvexHull,
    /// The 4 contour points farthest from the area centroid.
    Farthest,
}

/// Parameters for the detection stage (thresholding and corner heuristics).
#[derive(Clone, Debug)]
pub struct DetectConfig {
    /// Sigma of the Gaussian blur applied before thresholding. Zero disables
    /// the blur.
    pub blur_sigma: f32,
    /// Treat dark pixels as foreground instead of bright ones.
    pub invert: bool,
    /// Start of the epsilon sweep, as a fraction of contour perimeter.
    pub eps_start: f32,
    /// End of the epsilon sweep (inclusive).
    pub eps_end: f32,
    /// Number of evenly spaced epsilon values to try.
    pub eps_steps: usize,
    /// Epsilon for the convex-hull pass, as a fraction of hull perimeter.
    pub hull_eps: f32,
    /// Inset of the fallback rectangle from the image border, in pixels.
    pub fallback_margin: u32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            // Equivalent to a 5x5 Gaussian kernel.
            blur_sigma: 1.1,
            invert: false,
            eps_start: 0.01,
            eps_end: 0.10,
            eps_steps: 10,
            hull_eps: 0.04,
            fallback_margin: 50,
        }
    }
}

/// Parameters shared across the whole scan pipeline.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Height the image is resized to for detection, aspect preserved.
    pub work_height: u32,
    /// Radius in pixels within which a pointer press grabs a corner.
    pub hit_radius: f32,
    /// Corner heuristic used by automatic detection.
    pub strategy: CornerStrategy,
    /// Warp the full-resolution original instead of the working image.
    pub warp_original: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            work_height: 600,
            hit_radius: 20.0,
            strategy: CornerStrategy::Iterative,
            warp_original: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point2f::new(0.0, 0.0);
        let b = Point2f::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn default_sweep_covers_one_to_ten_percent() {
        let cfg = DetectConfig::default();
        assert!(cfg.eps_start < cfg.eps_end);
        assert_eq!(cfg.eps_steps, 10);
    }
}
