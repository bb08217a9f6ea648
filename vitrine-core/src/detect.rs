use image::DynamicImage;

use crate::entities::{Confidence, Detection, PageNumber};

/// Fraction of the shorter image dimension used by the center heuristic,
/// expressed as a ratio to keep the box arithmetic integral.
const CENTER_CROP_NUM: u32 = 8;
const CENTER_CROP_DEN: u32 = 10;

/// A single region detection strategy.
///
/// Implementations must swallow their own failures (timeout, malformed
/// backend response, nothing found) and return `None` instead of
/// propagating an error past this boundary.
pub trait RegionDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, image: &DynamicImage) -> Option<Detection>;
}

/// Ranks a labeled group of candidate page renders and picks one.
///
/// Returns the chosen page number, or `None` on any backend failure.
pub trait PageRanker {
    fn select_best_page(&self, candidates: &[(PageNumber, DynamicImage)]) -> Option<PageNumber>;
}

/// The unconditional fallback strategy: region centered on the image
/// center, sized at 80% of the shorter dimension.
#[derive(Debug, Default, Clone, Copy)]
pub struct CenterCrop;

impl RegionDetector for CenterCrop {
    fn name(&self) -> &'static str {
        "center"
    }

    fn detect(&self, image: &DynamicImage) -> Option<Detection> {
        Some(center_region(image.width(), image.height()))
    }
}

/// Center heuristic for a `(width, height)` source. Deterministic: the same
/// dimensions always produce the same detection.
pub fn center_region(width: u32, height: u32) -> Detection {
    Detection::Center {
        center_x: width / 2,
        center_y: height / 2,
        crop_size: width.min(height) * CENTER_CROP_NUM / CENTER_CROP_DEN,
        confidence: Confidence::Default,
    }
}

/// Ordered chain of detection strategies.
///
/// Strategies are tried in priority order; the first non-null result
/// short-circuits the chain. The center heuristic terminates the chain, so
/// `detect` is total: it always yields a result and never fails.
pub struct DetectionChain {
    strategies: Vec<Box<dyn RegionDetector>>,
}

impl DetectionChain {
    pub fn new(strategies: Vec<Box<dyn RegionDetector>>) -> Self {
        Self { strategies }
    }

    /// A chain holding only the center heuristic.
    pub fn center_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn detect(&self, image: &DynamicImage) -> Detection {
        for strategy in &self.strategies {
            if let Some(detection) = strategy.detect(image) {
                tracing::debug!(
                    strategy = strategy.name(),
                    method = detection.method(),
                    "region detected"
                );
                return detection;
            }
            tracing::debug!(strategy = strategy.name(), "no detection, trying next");
        }
        tracing::debug!("all detectors passed, using center heuristic");
        center_region(image.width(), image.height())
    }
}
