//! Per-frame detection records.
//!
//! A [`Detection`] is one object instance found in a frame by the detector
//! collaborator. Records are produced once per inference call, consumed by
//! the priority resolver, and never retained past the frame.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// Corner ordering (`x1 < x2`, `y1 < y2`) is not enforced here — defensive
/// clamping is the detector collaborator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width in pixels (may be negative for unordered corners).
    #[inline]
    pub const fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    /// Box height in pixels (may be negative for unordered corners).
    #[inline]
    pub const fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// One detected object: bounding box, class label, detector confidence.
///
/// `confidence` is in `[0, 1]` and has already been filtered against the
/// configured threshold by the detector — the core does not re-filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object location in the frame.
    pub bbox: BoundingBox,
    /// Class label. Labels outside the configured set are legal and carry
    /// priority rank 0.
    pub label: String,
    /// Detector confidence score, `0.0..=1.0`.
    pub confidence: f32,
}

impl Detection {
    /// Convenience constructor.
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_dimensions() {
        let b = BoundingBox::new(10, 20, 110, 70);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
    }

    #[test]
    fn detection_construction() {
        let d = Detection::new(BoundingBox::new(0, 0, 10, 10), "NOK", 0.87);
        assert_eq!(d.label, "NOK");
        assert!((d.confidence - 0.87).abs() < f32::EPSILON);
    }
}
