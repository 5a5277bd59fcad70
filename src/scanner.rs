use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, RgbImage};
use tracing::{info, instrument};

use crate::corners::{CornerDetector, DetectedQuad};
use crate::error::ScanError;
use crate::geometry::{order_corners, rectify_quad, scale_quad};
use crate::preprocess::resize_to_height;
use crate::types::{DetectConfig, Quad, ScanConfig};

/// Result of a full scan: detected corners plus the rectified image.
pub struct ScanOutput {
    /// Corners in the coordinates of the warped source, ordered
    /// [top-left, top-right, bottom-right, bottom-left].
    pub corners: Quad,
    /// Corners as detected at working resolution, unordered.
    pub working_corners: Quad,
    /// The rectified, top-down view.
    pub warped: RgbImage,
    /// True when detection degraded to the fixed-margin rectangle.
    pub used_fallback: bool,
    /// Wall-clock seconds spent on the scan.
    pub elapse: f64,
}

/// End-to-end document scanner.
///
/// Detection runs on a working-resolution copy; the warp samples the
/// full-resolution original by default so output quality does not depend on
/// the working size.
pub struct DocScanner {
    pub global: ScanConfig,
    pub detector: CornerDetector,
}

impl DocScanner {
    pub fn new(detect: DetectConfig, global: ScanConfig) -> Self {
        Self {
            global,
            detector: CornerDetector::new(detect),
        }
    }

    /// Detect corners at the scale of the given image, applying the
    /// configured strategy and fallback policy.
    pub fn detect(&self, img: &DynamicImage) -> DetectedQuad {
        self.detector.run(img, self.global.strategy)
    }

    /// Scan an image file.
    pub fn scan<P: AsRef<Path>>(&self, path: P) -> Result<ScanOutput, ScanError> {
        let img = image::open(path)?;
        self.scan_image(&img)
    }

    /// Scan an in-memory image.
    #[instrument(skip_all, fields(width = img.width(), height = img.height()))]
    pub fn scan_image(&self, img: &DynamicImage) -> Result<ScanOutput, ScanError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(ScanError::EmptyImage);
        }

        let start = Instant::now();
        let working = resize_to_height(img, self.global.work_height);
        let detected = self.detector.run(&working, self.global.strategy);

        let (warped, corners) = if self.global.warp_original {
            let ratio_w = img.width() as f32 / working.width() as f32;
            let ratio_h = img.height() as f32 / working.height() as f32;
            let corners = scale_quad(
                &detected.corners,
                ratio_w,
                ratio_h,
                img.width(),
                img.height(),
            );
            (rectify_quad(img, &corners)?, corners)
        } else {
            (rectify_quad(&working, &detected.corners)?, detected.corners)
        };

        let elapse = start.elapsed().as_secs_f64();
        info!(
            out_w = warped.width(),
            out_h = warped.height(),
            fallback = detected.fallback,
            elapse,
            "scan complete"
        );

        Ok(ScanOutput {
            corners: order_corners(&corners),
            working_corners: detected.corners,
            warped,
            used_fallback: detected.fallback,
            elapse,
        })
    }
}

impl Default for DocScanner {
    fn default() -> Self {
        Self::new(DetectConfig::default(), ScanConfig::default())
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

    #[test]
    fn scan_produces_document_sized_output() {
        let scanner = DocScanner::default();
        let out = scanner.scan_image(&document_image()).unwrap();
        assert!(!out.used_fallback);
        assert!(
            (294..=306).contains(&out.warped.width()),
            "width was {}",
            out.warped.width()
        );
        assert!(
            (373..=385).contains(&out.warped.height()),
            "height was {}",
            out.warped.height()
        );
        // Ordered corners start at top-left.
        assert!(out.corners[0].x < out.corners[1].x);
        assert!(out.corners[0].y < out.corners[3].y);
        // Working corners live in the 600px-high detection space.
        assert!(out.working_corners.iter().any(|p| p.y > 450.0));
    }

    #[test]
    fn scan_at_working_resolution() {
        let scanner = DocScanner::new(
            DetectConfig::default(),
            ScanConfig {
                warp_original: false,
                ..ScanConfig::default()
            },
        );
        let out = scanner.scan_image(&document_image()).unwrap();
        // Working height is 600, so the document is scaled by 1.2.
        assert!(
            (352..=368).contains(&out.warped.width()),
            "width was {}",
            out.warped.width()
        );
        assert!(
            (448..=464).contains(&out.warped.height()),
            "height was {}",
            out.warped.height()
        );
    }

    #[test]
    fn scan_of_featureless_image_uses_fallback() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 200, Luma([0u8])));
        let scanner = DocScanner::default();
        let out = scanner.scan_image(&blank).unwrap();
        assert!(out.used_fallback);
        assert!(out.warped.width() > 0 && out.warped.height() > 0);
    }

    #[test]
    fn scan_rejects_empty_image() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let scanner = DocScanner::default();
        assert!(matches!(
            scanner.scan_image(&empty),
            Err(ScanError::EmptyImage)
        ));
    }
}
