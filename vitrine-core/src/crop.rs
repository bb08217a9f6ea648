use image::imageops::FilterType;
use image::{imageops, DynamicImage, Rgb, RgbImage};

use crate::config::PipelineConfig;
use crate::entities::{CropBox, Detection};

/// Fixed resampling filter; the whole pipeline resamples the same way so
/// identical numeric inputs produce byte-identical output.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Letterbox fill for the scale-then-pad strategy.
const CANVAS_FILL: Rgb<u8> = Rgb([255, 255, 255]);

/// How a crop box becomes the final fixed-size canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Crop the box out of the source, then stretch-resize to the target.
    /// Used for the square avatar and the cover asset.
    CropThenResize,
    /// Ignore the crop box, scale the full source to fit inside the target
    /// preserving aspect ratio, and center it on a white canvas. Used when
    /// content must not be discarded.
    ScaleThenPad,
}

/// Compute a clamped, in-bounds crop box for `detection` against a
/// `(width, height)` source.
///
/// Sizing priority for centered detections: explicit crop size hint, then
/// the face extent scaled by the margin factor, then 80% of the shorter
/// dimension. The size is clamped to the source; the box is centered on the
/// detection and rigidly translated (never resized) back inside the image
/// when an edge overflows. Total: every input yields a valid box.
pub fn compute_crop(width: u32, height: u32, detection: &Detection, config: &PipelineConfig) -> CropBox {
    match *detection {
        Detection::Content {
            x,
            y,
            width: region_w,
            height: region_h,
            ..
        } => clamp_region(width, height, x, y, region_w, region_h),
        Detection::Face {
            center_x,
            center_y,
            face_width,
            face_height,
            suggested_crop_size,
            ..
        } => {
            let size = suggested_crop_size.unwrap_or_else(|| {
                (face_width.max(face_height) as f32 * config.face_margin_factor) as u32
            });
            centered_square(width, height, center_x, center_y, size)
        }
        Detection::Center {
            center_x,
            center_y,
            crop_size,
            ..
        } => centered_square(width, height, center_x, center_y, crop_size),
    }
}

/// Clamp an explicit region box into source bounds, keeping at least one
/// pixel on each axis.
fn clamp_region(width: u32, height: u32, x: u32, y: u32, region_w: u32, region_h: u32) -> CropBox {
    let left = x.min(width.saturating_sub(1));
    let top = y.min(height.saturating_sub(1));
    let region_w = region_w.clamp(1, width - left);
    let region_h = region_h.clamp(1, height - top);
    CropBox {
        left,
        top,
        right: left + region_w,
        bottom: top + region_h,
    }
}

/// Center a square of `size` pixels on `(center_x, center_y)` and translate
/// it back inside the `(width, height)` source on overflow.
fn centered_square(width: u32, height: u32, center_x: u32, center_y: u32, size: u32) -> CropBox {
    let size = size.clamp(2, width.min(height).max(2));
    let half = (size / 2) as i64;
    let (w, h) = (width as i64, height as i64);
    let (cx, cy) = (center_x as i64, center_y as i64);

    let mut left = cx - half;
    let mut top = cy - half;
    let mut right = cx + half;
    let mut bottom = cy + half;

    // Rigid translation per axis: shift by the overflow amount, then
    // re-check the opposite edge. A box wider than the image collapses the
    // axis to the full dimension.
    if left < 0 {
        right -= left;
        left = 0;
    }
    if top < 0 {
        bottom -= top;
        top = 0;
    }
    if right > w {
        left -= right - w;
        right = w;
    }
    if bottom > h {
        top -= bottom - h;
        bottom = h;
    }
    left = left.max(0);
    top = top.max(0);

    // Degenerate only when half == 0 and the center sat on an edge.
    if right <= left {
        right = (left + 1).min(w);
        left = right - 1;
    }
    if bottom <= top {
        bottom = (top + 1).min(h);
        top = bottom - 1;
    }

    CropBox {
        left: left as u32,
        top: top as u32,
        right: right as u32,
        bottom: bottom as u32,
    }
}

/// Produce the final fixed-size canvas from a source image and a crop box.
pub fn render_canvas(
    image: &DynamicImage,
    crop: &CropBox,
    target_width: u32,
    target_height: u32,
    strategy: RenderStrategy,
) -> RgbImage {
    match strategy {
        RenderStrategy::CropThenResize => image
            .crop_imm(crop.left, crop.top, crop.width(), crop.height())
            .resize_exact(target_width, target_height, RESAMPLE_FILTER)
            .to_rgb8(),
        RenderStrategy::ScaleThenPad => {
            let scaled = image
                .resize(target_width, target_height, RESAMPLE_FILTER)
                .to_rgb8();
            let mut canvas = RgbImage::from_pixel(target_width, target_height, CANVAS_FILL);
            let off_x = (target_width - scaled.width()) / 2;
            let off_y = (target_height - scaled.height()) / 2;
            imageops::overlay(&mut canvas, &scaled, off_x as i64, off_y as i64);
            canvas
        }
    }
}
