use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

use crate::error::ScanError;
use crate::types::{Point2f, Quad};

/// Quads whose enclosed area falls below this are rejected as collinear or
/// coincident.
const MIN_QUAD_AREA: f32 = 1.0;

/// Canonicalize 4 unordered points into
/// [top-left, top-right, bottom-right, bottom-left].
///
/// Top-left has the minimum x+y, bottom-right the maximum; top-right has the
/// minimum y-x, bottom-left the maximum (image y grows downward). Heuristic
/// only: quadrilaterals rotated near 45 degrees or non-convex inputs are not
/// corrected.
pub fn order_corners(pts: &Quad) -> Quad {
    let by_sum = |p: &&Point2f| -> f32 { p.x + p.y };
    let by_diff = |p: &&Point2f| -> f32 { p.y - p.x };
    let cmp = |a: f32, b: f32| a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);

    let tl = pts.iter().min_by(|a, b| cmp(by_sum(a), by_sum(b)));
    let br = pts.iter().max_by(|a, b| cmp(by_sum(a), by_sum(b)));
    let tr = pts.iter().min_by(|a, b| cmp(by_diff(a), by_diff(b)));
    let bl = pts.iter().max_by(|a, b| cmp(by_diff(a), by_diff(b)));

    // The iterators are over a fixed-size non-empty array.
    [
        *tl.unwrap_or(&pts[0]),
        *tr.unwrap_or(&pts[1]),
        *br.unwrap_or(&pts[2]),
        *bl.unwrap_or(&pts[3]),
    ]
}

/// Area of a quadrilateral by the shoelace formula.
pub fn quad_area(q: &Quad) -> f32 {
    let mut acc = 0.0f32;
    for i in 0..4 {
        let p = q[i];
        let n = q[(i + 1) % 4];
        acc += p.x * n.y - n.x * p.y;
    }
    acc.abs() / 2.0
}

/// Solve the 3x3 homography mapping `src_pts` onto `dst_pts`.
///
/// Solves the 8-parameter system with h22 = 1 via LU first, falling back to
/// an SVD of the full 9-parameter system when the solution does not
/// reproduce the constraints.
pub fn perspective_matrix(
    src_pts: &[[f32; 2]; 4],
    dst_pts: &[[f32; 2]; 4],
) -> Result<[[f64; 3]; 3], ScanError> {
    use nalgebra::DMatrix;

    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DMatrix::<f64>::zeros(8, 1);

    for i in 0..4 {
        let x = src_pts[i][0] as f64;
        let y = src_pts[i][1] as f64;
        let u = dst_pts[i][0] as f64;
        let v = dst_pts[i][1] as f64;

        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        a[(i, 6)] = -u * x;
        a[(i, 7)] = -u * y;
        b[(i, 0)] = u;

        a[(i + 4, 3)] = x;
        a[(i + 4, 4)] = y;
        a[(i + 4, 5)] = 1.0;
        a[(i + 4, 6)] = -v * x;
        a[(i + 4, 7)] = -v * y;
        b[(i + 4, 0)] = v;
    }

    if let Some(lu) = a.clone().lu().solve(&b) {
        let residual = (&a * &lu - &b).norm();
        if residual < 1e-8 {
            return Ok([
                [lu[(0, 0)], lu[(1, 0)], lu[(2, 0)]],
                [lu[(3, 0)], lu[(4, 0)], lu[(5, 0)]],
                [lu[(6, 0)], lu[(7, 0)], 1.0],
            ]);
        }
    }

    // Full 9-parameter system, smallest singular vector of A^T A.
    let mut a9 = DMatrix::<f64>::zeros(8, 9);
    for i in 0..4 {
        let x = src_pts[i][0] as f64;
        let y = src_pts[i][1] as f64;
        let u = dst_pts[i][0] as f64;
        let v = dst_pts[i][1] as f64;

        a9[(i, 0)] = x;
        a9[(i, 1)] = y;
        a9[(i, 2)] = 1.0;
        a9[(i, 6)] = -u * x;
        a9[(i, 7)] = -u * y;
        a9[(i, 8)] = -u;

        a9[(i + 4, 3)] = x;
        a9[(i + 4, 4)] = y;
        a9[(i + 4, 5)] = 1.0;
        a9[(i + 4, 6)] = -v * x;
        a9[(i + 4, 7)] = -v * y;
        a9[(i + 4, 8)] = -v;
    }

    let ata = a9.transpose() * &a9;
    let svd = ata.svd(true, false);
    let u = svd
        .u
        .ok_or_else(|| ScanError::DegenerateQuad("homography decomposition failed".into()))?;
    let h = u.column(8);

    Ok([
        [h[0], h[1], h[2]],
        [h[3], h[4], h[5]],
        [h[6], h[7], h[8]],
    ])
}

fn invert_matrix_3x3(m: &[[f64; 3]; 3]) -> Result<[[f64; 3]; 3], ScanError> {
    use nalgebra::Matrix3;

    let mat = Matrix3::new(
        m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
    );

    let inv = mat
        .try_inverse()
        .ok_or_else(|| ScanError::DegenerateQuad("homography is not invertible".into()))?;

    Ok([
        [inv[(0, 0)], inv[(0, 1)], inv[(0, 2)]],
        [inv[(1, 0)], inv[(1, 1)], inv[(1, 2)]],
        [inv[(2, 0)], inv[(2, 1)], inv[(2, 2)]],
    ])
}

/// Resample `src` through the inverse of `matrix` into a `width` x `height`
/// output with bilinear interpolation. Pixels mapping outside the source stay
/// black; the one-pixel border band falls back to nearest neighbour.
pub fn warp_perspective(
    src: &RgbImage,
    matrix: &[[f64; 3]; 3],
    width: u32,
    height: u32,
) -> Result<RgbImage, ScanError> {
    let m_inv = invert_matrix_3x3(matrix)?;

    let (m00, m01, m02) = (m_inv[0][0], m_inv[0][1], m_inv[0][2]);
    let (m10, m11, m12) = (m_inv[1][0], m_inv[1][1], m_inv[1][2]);
    let (m20, m21, m22) = (m_inv[2][0], m_inv[2][1], m_inv[2][2]);
    let src_cols = src.width() as i32;
    let src_rows = src.height() as i32;

    let mut out = RgbImage::new(width, height);

    for y in 0..height {
        let y_f = y as f64;
        let m01y = m01 * y_f;
        let m11y = m11 * y_f;
        let m21y = m21 * y_f;

        for x in 0..width {
            let x_f = x as f64;
            let src_x_h = m00 * x_f + m01y + m02;
            let src_y_h = m10 * x_f + m11y + m12;
            let w = m20 * x_f + m21y + m22;
            if w.abs() < 1e-12 {
                continue;
            }

            let src_x_f = src_x_h / w;
            let src_y_f = src_y_h / w;

            let x0 = src_x_f.floor() as i32;
            let y0 = src_y_f.floor() as i32;
            let x1 = x0 + 1;
            let y1 = y0 + 1;

            if x0 >= 0 && x1 < src_cols && y0 >= 0 && y1 < src_rows {
                let fx = src_x_f - x0 as f64;
                let fy = src_y_f - y0 as f64;

                let p00 = src.get_pixel(x0 as u32, y0 as u32);
                let p10 = src.get_pixel(x1 as u32, y0 as u32);
                let p01 = src.get_pixel(x0 as u32, y1 as u32);
                let p11 = src.get_pixel(x1 as u32, y1 as u32);

                let mut channels = [0u8; 3];
                for (c, value) in channels.iter_mut().enumerate() {
                    *value = ((1.0 - fx) * (1.0 - fy) * p00[c] as f64
                        + fx * (1.0 - fy) * p10[c] as f64
                        + (1.0 - fx) * fy * p01[c] as f64
                        + fx * fy * p11[c] as f64) as u8;
                }
                out.put_pixel(x, y, Rgb(channels));
            } else if x0 >= 0 && x0 < src_cols && y0 >= 0 && y0 < src_rows {
                out.put_pixel(x, y, *src.get_pixel(x0 as u32, y0 as u32));
            }
        }
    }

    Ok(out)
}

/// Warp the quadrilateral bounded by `corners` into a flat, top-down view.
///
/// Output width is the larger of the two horizontal edge lengths, height the
/// larger of the two vertical ones (both truncated). Collinear or coincident
/// corners are rejected.
pub fn rectify_quad(img: &DynamicImage, corners: &Quad) -> Result<RgbImage, ScanError> {
    let rect = order_corners(corners);
    let [tl, tr, br, bl] = rect;

    if quad_area(&rect) < MIN_QUAD_AREA {
        return Err(ScanError::DegenerateQuad(
            "collinear or coincident corners".into(),
        ));
    }

    let width_a = br.distance(&bl);
    let width_b = tr.distance(&tl);
    let max_width = width_a.max(width_b) as i64;

    let height_a = tr.distance(&br);
    let height_b = tl.distance(&bl);
    let max_height = height_a.max(height_b) as i64;

    if max_width < 2 || max_height < 2 {
        return Err(ScanError::DegenerateQuad(format!(
            "output rectangle {max_width}x{max_height} is too small"
        )));
    }

    let (w, h) = (max_width as u32, max_height as u32);
    debug!(w, h, "rectifying quadrilateral");

    let src = [
        [tl.x, tl.y],
        [tr.x, tr.y],
        [br.x, br.y],
        [bl.x, bl.y],
    ];
    let dst = [
        [0.0, 0.0],
        [(w - 1) as f32, 0.0],
        [(w - 1) as f32, (h - 1) as f32],
        [0.0, (h - 1) as f32],
    ];

    let m = perspective_matrix(&src, &dst)?;
    warp_perspective(&img.to_rgb8(), &m, w, h)
}

/// Scale a quad by per-axis ratios and clamp it to the target bounds.
///
/// Used to map corners detected at working resolution back onto the
/// original image.
pub fn scale_quad(q: &Quad, ratio_w: f32, ratio_h: f32, width: u32, height: u32) -> Quad {
    let clamp = |p: Point2f| {
        Point2f::new(
            p.x.clamp(0.0, width as f32),
            p.y.clamp(0.0, height as f32),
        )
    };
    [
        clamp(Point2f::new(q[0].x * ratio_w, q[0].y * ratio_h)),
        clamp(Point2f::new(q[1].x * ratio_w, q[1].y * ratio_h)),
        clamp(Point2f::new(q[2].x * ratio_w, q[2].y * ratio_h)),
        clamp(Point2f::new(q[3].x * ratio_w, q[3].y * ratio_h)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn p(x: f32, y: f32) -> Point2f {
        Point2f::new(x, y)
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put_pixel(x, y, Rgb([x as u8, y as u8, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn order_corners_canonicalizes_shuffled_rectangle() {
        let shuffled = [p(349.0, 60.0), p(50.0, 439.0), p(50.0, 60.0), p(349.0, 439.0)];
        let ordered = order_corners(&shuffled);
        assert_eq!(ordered[0], p(50.0, 60.0));
        assert_eq!(ordered[1], p(349.0, 60.0));
        assert_eq!(ordered[2], p(349.0, 439.0));
        assert_eq!(ordered[3], p(50.0, 439.0));
    }

    #[test]
    fn order_corners_handles_mild_tilt() {
        let tilted = [p(12.0, 95.0), p(8.0, 10.0), p(104.0, 14.0), p(99.0, 101.0)];
        let ordered = order_corners(&tilted);
        assert_eq!(ordered[0], p(8.0, 10.0));
        assert_eq!(ordered[1], p(104.0, 14.0));
        assert_eq!(ordered[2], p(99.0, 101.0));
        assert_eq!(ordered[3], p(12.0, 95.0));
    }

    #[test]
    fn perspective_matrix_identity_on_matching_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let m = perspective_matrix(&pts, &pts).unwrap();
        assert!((m[0][0] - 1.0).abs() < 1e-9);
        assert!((m[1][1] - 1.0).abs() < 1e-9);
        assert!((m[2][2] - 1.0).abs() < 1e-9);
        assert!(m[0][1].abs() < 1e-9);
        assert!(m[2][0].abs() < 1e-9);
    }

    #[test]
    fn rectify_axis_aligned_region_crops_it() {
        let img = gradient(200, 200);
        let corners = [p(10.0, 10.0), p(110.0, 10.0), p(110.0, 60.0), p(10.0, 60.0)];
        let out = rectify_quad(&img, &corners).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));

        // The top-left output pixel samples the source at the top-left corner.
        let px = out.get_pixel(0, 0);
        assert!((px[0] as i32 - 10).abs() <= 1, "r was {}", px[0]);
        assert!((px[1] as i32 - 10).abs() <= 1, "g was {}", px[1]);
    }

    #[test]
    fn rectify_accepts_unordered_corners() {
        let img = gradient(200, 200);
        let corners = [p(110.0, 60.0), p(10.0, 10.0), p(10.0, 60.0), p(110.0, 10.0)];
        let out = rectify_quad(&img, &corners).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn rectify_rejects_coincident_corners() {
        let img = gradient(50, 50);
        let corners = [p(10.0, 10.0); 4];
        assert!(matches!(
            rectify_quad(&img, &corners),
            Err(ScanError::DegenerateQuad(_))
        ));
    }

    #[test]
    fn rectify_rejects_collinear_corners() {
        let img = gradient(50, 50);
        let corners = [p(0.0, 0.0), p(10.0, 10.0), p(20.0, 20.0), p(30.0, 30.0)];
        assert!(matches!(
            rectify_quad(&img, &corners),
            Err(ScanError::DegenerateQuad(_))
        ));
    }

    #[test]
    fn scale_quad_maps_and_clamps() {
        let q = [p(10.0, 10.0), p(100.0, 10.0), p(100.0, 50.0), p(10.0, 50.0)];
        let scaled = scale_quad(&q, 2.0, 2.0, 150, 90);
        assert_eq!(scaled[0], p(20.0, 20.0));
        assert_eq!(scaled[1], p(150.0, 20.0)); // clamped from 200
        assert_eq!(scaled[2], p(150.0, 90.0)); // clamped on both axes
    }

    #[test]
    fn quad_area_of_rectangle() {
        let q = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(0.0, 5.0)];
        assert!((quad_area(&q) - 50.0).abs() < 1e-4);
    }
}
