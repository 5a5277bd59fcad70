// Contour extraction and polygon measurements on binary masks.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::types::Point2f;

/// Extract external contours from a binary mask.
///
/// Matches external-only retrieval: holes and nested borders are dropped, as
/// are contours too short to bound an area.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .filter(|pts| pts.len() >= 3)
        .collect()
}

/// Polygon area by the shoelace formula, treating the contour as closed.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    let n = points.len();
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    acc.abs() / 2.0
}

/// Centroid from polygon area moments.
///
/// Returns `None` for contours whose enclosed area vanishes (collinear or
/// degenerate point sets), where the moment ratio is undefined.
pub fn centroid(points: &[Point<i32>]) -> Option<Point2f> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len();
    let mut m00 = 0.0f64;
    let mut m10 = 0.0f64;
    let mut m01 = 0.0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        m00 += cross;
        m10 += (p.x as f64 + q.x as f64) * cross;
        m01 += (p.y as f64 + q.y as f64) * cross;
    }
    m00 /= 2.0;
    if m00.abs() < 1e-6 {
        return None;
    }
    let cx = m10 / (6.0 * m00);
    let cy = m01 / (6.0 * m00);
    Some(Point2f::new(cx as f32, cy as f32))
}

/// Pick the contour enclosing the largest area.
pub fn largest_contour(contours: Vec<Vec<Point<i32>>>) -> Option<Vec<Point<i32>>> {
    contours
        .into_iter()
        .map(|c| (contour_area(&c), c))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, c)| c)
}
