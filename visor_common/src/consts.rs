//! System-wide constants for the VISOR workspace.
//!
//! Single source of truth for numeric limits and default paths.
//! Imported by all crates — no duplication permitted.

/// Default camera grab timeout in milliseconds.
pub const DEFAULT_GRAB_TIMEOUT_MS: u64 = 5000;

/// Default detector confidence threshold.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default evidence capture cooldown in milliseconds.
pub const DEFAULT_EVIDENCE_COOLDOWN_MS: u64 = 1000;

/// Default ISO-on-TCP port for the PLC endpoint.
pub const DEFAULT_PLC_PORT: u16 = 102;

/// Maximum actuation code width on the wire, in bytes.
pub const MAX_CODE_WIDTH: usize = 4;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/visor.toml";
