use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::error::ScanError;
use crate::geometry::rectify_quad;
use crate::preprocess::resize_to_height;
use crate::scanner::DocScanner;
use crate::types::{Point2f, Quad};

/// Interactive corner adjustment over a working-resolution image.
///
/// This is a pure state machine: the embedder forwards pointer events and
/// renders the state (see [`draw_session`](crate::draw_session)); no window
/// system is involved. A corner grabbed by `pointer_down` follows
/// `pointer_move` until `pointer_up` releases it.
pub struct AdjustSession {
    working: DynamicImage,
    corners: Quad,
    selected: Option<usize>,
    hit_radius: f32,
    auto_detected: bool,
}

impl AdjustSession {
    /// Resize the image to the scanner's working height and run automatic
    /// corner detection for the initial state.
    pub fn start(scanner: &DocScanner, img: &DynamicImage) -> Result<Self, ScanError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(ScanError::EmptyImage);
        }
        let working = resize_to_height(img, scanner.global.work_height);
        let detected = scanner.detect(&working);
        Ok(Self {
            working,
            corners: detected.corners,
            selected: None,
            hit_radius: scanner.global.hit_radius,
            auto_detected: !detected.fallback,
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.working
    }

    pub fn corners(&self) -> &Quad {
        &self.corners
    }

    /// Index of the corner currently being dragged.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// False when the initial corners came from the fallback rectangle.
    pub fn auto_detected(&self) -> bool {
        self.auto_detected
    }

    /// Hit-test the press position against all corners; the first corner
    /// within the hit radius is grabbed.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<usize> {
        let at = Point2f::new(x, y);
        let hit = self
            .corners
            .iter()
            .position(|c| c.distance(&at) < self.hit_radius);
        if let Some(i) = hit {
            debug!(corner = i, "corner grabbed");
            self.selected = Some(i);
        }
        hit
    }

    /// Drag the grabbed corner, clamped to the image bounds.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let Some(i) = self.selected {
            let max_x = (self.working.width().saturating_sub(1)) as f32;
            let max_y = (self.working.height().saturating_sub(1)) as f32;
            self.corners[i] = Point2f::new(x.clamp(0.0, max_x), y.clamp(0.0, max_y));
        }
    }

    pub fn pointer_up(&mut self) {
        self.selected = None;
    }

    /// Rescan: discard manual adjustments and re-run automatic detection.
    pub fn reset(&mut self, scanner: &DocScanner) {
        let detected = scanner.detect(&self.working);
        self.corners = detected.corners;
        self.auto_detected = !detected.fallback;
        self.selected = None;
    }

    /// Rectify the working image with the current corners.
    pub fn rectify(&self) -> Result<RgbImage, ScanError> {
        rectify_quad(&self.working, &self.corners)
    }
}
