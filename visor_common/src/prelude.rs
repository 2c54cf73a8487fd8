//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use visor_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use visor_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Detections & Decision Fusion ───────────────────────────────────
pub use crate::actuation::{ActuationTable, EncodeError};
pub use crate::detection::{BoundingBox, Detection};
pub use crate::policy::PriorityPolicy;

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EVIDENCE_COOLDOWN_MS, DEFAULT_GRAB_TIMEOUT_MS,
    DEFAULT_PLC_PORT, MAX_CODE_WIDTH,
};
