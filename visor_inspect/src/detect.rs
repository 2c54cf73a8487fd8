//! Detector seam.
//!
//! Model loading and inference acceleration live outside this workspace;
//! the runtime consumes the detector through the [`Detector`] trait.

use crate::camera::Frame;
use thiserror::Error;
use visor_common::detection::Detection;

/// Inference failure. Recoverable — the loop logs and continues with the
/// next frame; a transient resource exhaustion must not crash inspection.
#[derive(Debug, Clone, Error)]
pub enum DetectError {
    /// Inference failed for this frame.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Detector collaborator seam.
///
/// # Contract
///
/// Implementations apply the configured confidence threshold themselves:
/// every returned detection satisfies `confidence >= threshold`. The core
/// does not re-filter. No ordering guarantee on the returned records.
pub trait Detector: Send {
    /// Returns the detector's unique identifier (e.g., "sim", "onnx").
    fn name(&self) -> &'static str;

    /// Run detection over one frame.
    ///
    /// # Errors
    /// Returns `DetectError::Inference` on failure; the frame is skipped.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;
}
