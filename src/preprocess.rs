use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

/// Binary mask produced by the thresholding stage.
pub struct Binarized {
    /// Foreground pixels are 255, background 0.
    pub mask: GrayImage,
    /// Threshold level chosen by Otsu's method.
    pub level: u8,
}

/// Grayscale conversion, Gaussian blur and Otsu thresholding.
pub struct DocPreProcess {
    pub blur_sigma: f32,
    pub invert: bool,
}

impl DocPreProcess {
    pub fn new(blur_sigma: f32, invert: bool) -> Self {
        Self { blur_sigma, invert }
    }

    pub fn run(&self, img: &DynamicImage) -> Binarized {
        let gray = img.to_luma8();
        let blurred = if self.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.blur_sigma)
        } else {
            gray
        };

        let level = otsu_level(&blurred);
        debug!(level, invert = self.invert, "otsu threshold computed");

        let mut mask = blurred;
        for p in mask.pixels_mut() {
            // Strictly greater, so an all-background image stays empty.
            let foreground = p.0[0] > level;
            let on = foreground != self.invert;
            *p = Luma([if on { 255 } else { 0 }]);
        }

        Binarized { mask, level }
    }
}

/// Resize to a fixed height, preserving aspect ratio.
///
/// Detection runs at this working resolution; corners are mapped back to the
/// original afterwards.
pub fn resize_to_height(img: &DynamicImage, height: u32) -> DynamicImage {
    let h = img.height();
    if h == 0 || h == height {
        return img.clone();
    }
    let width = ((img.width() as f32 * height as f32 / h as f32).round() as u32).max(1);
    img.resize_exact(width, height, image::imageops::FilterType::Triangle)
}
