// Overlay rendering for detected quads and montage assembly for batch
// comparison output.

use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::corners::StrategyResults;
use crate::session::AdjustSession;
use crate::types::Quad;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

fn draw_thick_segment(
    canvas: &mut RgbImage,
    a: (f32, f32),
    b: (f32, f32),
    color: Rgb<u8>,
    thickness: u32,
) {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len = dx.hypot(dy);
    let t = thickness.max(1);
    if len < 1e-3 || t == 1 {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }
    // Stack parallel 1px segments along the unit normal.
    let nx = -dy / len;
    let ny = dx / len;
    for k in 0..t {
        let off = k as f32 - (t as f32 - 1.0) / 2.0;
        draw_line_segment_mut(
            canvas,
            (a.0 + nx * off, a.1 + ny * off),
            (b.0 + nx * off, b.1 + ny * off),
            color,
        );
    }
}

/// Draw the closed outline of a quad.
pub fn draw_quad_outline(canvas: &mut RgbImage, quad: &Quad, color: Rgb<u8>, thickness: u32) {
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        draw_thick_segment(canvas, (a.x, a.y), (b.x, b.y), color, thickness);
    }
}

/// Draw filled discs at the quad corners, highlighting the selected one.
pub fn draw_corner_markers(
    canvas: &mut RgbImage,
    quad: &Quad,
    radius: i32,
    color: Rgb<u8>,
    selected: Option<usize>,
    selected_color: Rgb<u8>,
) {
    for (i, p) in quad.iter().enumerate() {
        let c = if selected == Some(i) {
            selected_color
        } else {
            color
        };
        draw_filled_circle_mut(canvas, (p.x as i32, p.y as i32), radius, c);
    }
}

/// Render the adjustment session: the candidate polygon in green with corner
/// discs, the grabbed corner in red.
pub fn draw_session(session: &AdjustSession) -> RgbImage {
    let mut canvas = session.image().to_rgb8();
    draw_quad_outline(&mut canvas, session.corners(), GREEN, 2);
    draw_corner_markers(&mut canvas, session.corners(), 10, GREEN, session.selected(), RED);
    canvas
}

/// Render every heuristic's candidate on one shared canvas.
///
/// Minimum-area rectangle in blue, convex hull in red, farthest points as
/// yellow discs, iterative approximation in green. Heuristics that produced
/// nothing draw nothing.
pub fn draw_strategy_overlay(img: &DynamicImage, results: &StrategyResults) -> RgbImage {
    let mut canvas = img.to_rgb8();
    if let Some(q) = &results.min_area {
        draw_quad_outline(&mut canvas, q, BLUE, 2);
    }
    if let Some(q) = &results.hull {
        draw_quad_outline(&mut canvas, q, RED, 7);
    }
    if let Some(q) = &results.farthest {
        for p in q {
            draw_filled_circle_mut(&mut canvas, (p.x as i32, p.y as i32), 8, YELLOW);
        }
    }
    if let Some(q) = &results.iterative {
        draw_quad_outline(&mut canvas, q, GREEN, 2);
    }
    canvas
}

/// Tile images into fixed-size montage pages.
///
/// Each image is resized to `tile` and placed row-major into a
/// `grid.0 x grid.1` page; unfilled cells stay black. One page per chunk of
/// `grid.0 * grid.1` images.
pub fn build_montages(images: &[RgbImage], tile: (u32, u32), grid: (u32, u32)) -> Vec<RgbImage> {
    if images.is_empty() || tile.0 == 0 || tile.1 == 0 || grid.0 == 0 || grid.1 == 0 {
        return Vec::new();
    }
    let per_page = (grid.0 * grid.1) as usize;
    images
        .chunks(per_page)
        .map(|chunk| {
            let mut page = RgbImage::new(grid.0 * tile.0, grid.1 * tile.1);
            for (i, img) in chunk.iter().enumerate() {
                let cell = imageops::resize(img, tile.0, tile.1, imageops::FilterType::Triangle);
                let col = i as u32 % grid.0;
                let row = i as u32 / grid.0;
                imageops::replace(
                    &mut page,
                    &cell,
                    (col * tile.0) as i64,
                    (row * tile.1) as i64,
                );
            }
            page
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2f;

    fn quad() -> Quad {
        [
            Point2f::new(10.0, 10.0),
            Point2f::new(90.0, 10.0),
            Point2f::new(90.0, 70.0),
            Point2f::new(10.0, 70.0),
        ]
    }

    #[test]
    fn outline_touches_edge_midpoints() {
        let mut canvas = RgbImage::new(100, 80);
        draw_quad_outline(&mut canvas, &quad(), GREEN, 2);
        assert_eq!(*canvas.get_pixel(50, 10), GREEN); // top edge
        assert_eq!(*canvas.get_pixel(10, 40), GREEN); // left edge
        assert_eq!(*canvas.get_pixel(50, 40), Rgb([0, 0, 0])); // interior untouched
    }

    #[test]
    fn corner_markers_highlight_selection() {
        let mut canvas = RgbImage::new(100, 80);
        draw_corner_markers(&mut canvas, &quad(), 4, GREEN, Some(1), RED);
        assert_eq!(*canvas.get_pixel(10, 10), GREEN);
        assert_eq!(*canvas.get_pixel(90, 10), RED);
    }

    #[test]
    fn montage_pages_and_dimensions() {
        let images: Vec<RgbImage> = (0..7).map(|_| RgbImage::new(40, 30)).collect();
        let pages = build_montages(&images, (20, 20), (2, 2));
        assert_eq!(pages.len(), 2);
        for page in &pages {
            assert_eq!((page.width(), page.height()), (40, 40));
        }
    }

    #[test]
    fn montage_of_nothing_is_empty() {
        assert!(build_montages(&[], (20, 20), (2, 2)).is_empty());
    }

    #[test]
    fn strategy_overlay_draws_only_present_results() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 80));
        let results = StrategyResults {
            min_area: Some(quad()),
            ..StrategyResults::default()
        };
        let canvas = draw_strategy_overlay(&img, &results);
        assert_eq!(*canvas.get_pixel(50, 10), BLUE);
        // No farthest-point discs were requested.
        assert_eq!(*canvas.get_pixel(10, 10), BLUE);
    }
}
