//! Per-frame outcome, condition flags, and the observer seam.
//!
//! Every processed frame produces one [`FrameOutcome`]. The outcome carries
//! everything an external renderer needs to draw the frame (boxes, labels,
//! resolved class) plus the condition flags describing what the loop did.

use bitflags::bitflags;
use visor_common::detection::Detection;

bitflags! {
    /// Per-frame condition flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// At least one detection in the frame.
        const DETECTED        = 0x01;
        /// Decision written to the PLC.
        const SUBMITTED       = 0x02;
        /// PLC write failed; link is faulted.
        const SUBMIT_FAILED   = 0x04;
        /// Resolved label missing from the actuation table.
        const ENCODE_FAILED   = 0x08;
        /// Evidence capture dispatched to the writer.
        const CAPTURED        = 0x10;
        /// Evidence capture dropped (queue full).
        const CAPTURE_DROPPED = 0x20;
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// Acquisition sequence number of the frame.
    pub seq: u64,
    /// All detections of the frame, for annotation/rendering.
    pub detections: Vec<Detection>,
    /// Fused classification decision, `None` on an empty frame.
    pub resolved: Option<String>,
    /// Actuation code the loop attempted to report (includes the idle code
    /// when the empty-frame policy substitutes one).
    pub code: Option<i64>,
    /// What happened this frame.
    pub flags: FrameFlags,
}

/// Display collaborator seam.
///
/// Receives every frame outcome; rendering itself is outside the core.
/// Implementations must return quickly — they run on the loop thread.
pub trait InspectionObserver: Send {
    fn frame_inspected(&mut self, outcome: &FrameOutcome);
}

/// Observer that discards all outcomes.
pub struct NullObserver;

impl InspectionObserver for NullObserver {
    fn frame_inspected(&mut self, _outcome: &FrameOutcome) {}
}
