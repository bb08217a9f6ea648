use serde::{Deserialize, Serialize};

pub type PageNumber = usize;

/// Confidence label attached to a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Default,
}

/// Result of a single region detector, in source-image pixel coordinates.
///
/// Exactly one detection (or none) is produced per detector call; the chain
/// never merges results across detectors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Detection {
    /// A detected face, centered on the face with its measured extent.
    Face {
        center_x: u32,
        center_y: u32,
        face_width: u32,
        face_height: u32,
        /// Explicit crop size hint, when the backend provides one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_crop_size: Option<u32>,
        confidence: Confidence,
    },
    /// An explicit content box (figure, diagram, title block).
    Content {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        confidence: Confidence,
    },
    /// The unconditional center heuristic.
    Center {
        center_x: u32,
        center_y: u32,
        crop_size: u32,
        confidence: Confidence,
    },
}

impl Detection {
    pub fn confidence(&self) -> Confidence {
        match *self {
            Detection::Face { confidence, .. }
            | Detection::Content { confidence, .. }
            | Detection::Center { confidence, .. } => confidence,
        }
    }

    /// Center point of the detected region.
    pub fn center(&self) -> (u32, u32) {
        match *self {
            Detection::Face {
                center_x, center_y, ..
            }
            | Detection::Center {
                center_x, center_y, ..
            } => (center_x, center_y),
            // Collaborator boxes are untrusted; saturate instead of
            // overflowing on adversarial coordinates.
            Detection::Content {
                x,
                y,
                width,
                height,
                ..
            } => (x.saturating_add(width / 2), y.saturating_add(height / 2)),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Detection::Face { .. } => "face",
            Detection::Content { .. } => "content",
            Detection::Center { .. } => "center",
        }
    }
}

/// Absolute pixel rectangle within source bounds.
///
/// Invariant: `0 <= left < right <= image_width` and
/// `0 <= top < bottom <= image_height` for the image it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Whether the box is a valid, non-degenerate rectangle inside `(width, height)`.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.left < self.right && self.top < self.bottom && self.right <= width && self.bottom <= height
    }
}
