//! PLC addressing and protocol configuration.
//!
//! Deserialized from the `[plc]` table of the station configuration. The
//! addressing triple (address, rack, slot), the data-block target
//! (db, offset) and the field layout (width, signed) together form the
//! deployment's protocol contract — none of them are hardcoded anywhere
//! else in the workspace.

use crate::wire::{CodeWidth, WireFormat};
use serde::{Deserialize, Serialize};
use visor_common::config::ConfigError;
use visor_common::consts::DEFAULT_PLC_PORT;

/// PLC link configuration.
///
/// # TOML Example
///
/// ```toml
/// [plc]
/// address = "192.168.100.83"
/// rack = 0
/// slot = 1
/// db = 1
/// offset = 0
/// width = 4
/// signed = false
/// transport = "s7"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlcConfig {
    /// Controller address, `host` or `host:port` (default port 102).
    pub address: String,

    /// Controller rack number.
    #[serde(default)]
    pub rack: u16,

    /// Controller slot number.
    #[serde(default = "default_slot")]
    pub slot: u16,

    /// Target data block number.
    #[serde(default = "default_db")]
    pub db: u16,

    /// Byte offset of the decision field inside the data block.
    #[serde(default)]
    pub offset: u16,

    /// Field width in bytes (2 or 4).
    #[serde(default)]
    pub width: CodeWidth,

    /// Signed two's-complement field when true.
    #[serde(default)]
    pub signed: bool,

    /// Transport backend name ("s7" or "sim").
    #[serde(default = "default_transport")]
    pub transport: String,

    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-request read/write timeout in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// First reconnect delay after a fault, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Reconnect delay ceiling, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_slot() -> u16 {
    1
}
fn default_db() -> u16 {
    1
}
fn default_transport() -> String {
    "s7".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_io_timeout_ms() -> u64 {
    1000
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    30_000
}

impl PlcConfig {
    /// Wire layout of the decision field.
    #[inline]
    pub fn wire_format(&self) -> WireFormat {
        WireFormat::new(self.width, self.signed)
    }

    /// Endpoint as `host:port`, appending the default ISO-on-TCP port when
    /// the configured address carries none.
    pub fn endpoint(&self) -> String {
        if self.address.contains(':') {
            self.address.clone()
        } else {
            format!("{}:{}", self.address, DEFAULT_PLC_PORT)
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `address` is empty
    /// - `rack` > 7 or `slot` > 31 (S7 addressing limits)
    /// - any timeout or backoff value is zero
    /// - `initial_backoff_ms` exceeds `max_backoff_ms`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::ValidationError(
                "plc.address cannot be empty".to_string(),
            ));
        }
        if self.rack > 7 {
            return Err(ConfigError::ValidationError(format!(
                "plc.rack {} out of range (0-7)",
                self.rack
            )));
        }
        if self.slot > 31 {
            return Err(ConfigError::ValidationError(format!(
                "plc.slot {} out of range (0-31)",
                self.slot
            )));
        }
        if self.connect_timeout_ms == 0 || self.io_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "plc timeouts must be > 0".to_string(),
            ));
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::ValidationError(
                "plc.initial_backoff_ms must be > 0".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "plc.initial_backoff_ms cannot exceed plc.max_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// A complete configuration for tests and examples.
    pub fn example() -> Self {
        Self {
            address: "192.168.100.83".to_string(),
            rack: 0,
            slot: 1,
            db: 1,
            offset: 0,
            width: CodeWidth::Four,
            signed: false,
            transport: "s7".to_string(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let cfg: PlcConfig = toml::from_str(r#"address = "10.0.0.5""#).unwrap();
        assert_eq!(cfg.rack, 0);
        assert_eq!(cfg.slot, 1);
        assert_eq!(cfg.db, 1);
        assert_eq!(cfg.offset, 0);
        assert_eq!(cfg.width, CodeWidth::Four);
        assert!(!cfg.signed);
        assert_eq!(cfg.transport, "s7");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn full_toml_parses() {
        let cfg: PlcConfig = toml::from_str(
            r#"
address = "192.168.100.83:1102"
rack = 0
slot = 2
db = 7
offset = 12
width = 2
signed = true
transport = "sim"
connect_timeout_ms = 500
io_timeout_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(cfg.endpoint(), "192.168.100.83:1102");
        assert_eq!(cfg.db, 7);
        assert_eq!(cfg.offset, 12);
        assert_eq!(cfg.wire_format(), WireFormat::new(CodeWidth::Two, true));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn endpoint_appends_default_port() {
        let cfg = PlcConfig::example();
        assert_eq!(cfg.endpoint(), "192.168.100.83:102");
    }

    #[test]
    fn validate_rejects_bad_addressing() {
        let mut cfg = PlcConfig::example();
        cfg.rack = 8;
        assert!(cfg.validate().is_err());

        let mut cfg = PlcConfig::example();
        cfg.slot = 32;
        assert!(cfg.validate().is_err());

        let mut cfg = PlcConfig::example();
        cfg.address = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_backoff() {
        let mut cfg = PlcConfig::example();
        cfg.initial_backoff_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PlcConfig::example();
        cfg.initial_backoff_ms = 60_000;
        cfg.max_backoff_ms = 30_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unsupported_width_rejected_at_parse() {
        let result = toml::from_str::<PlcConfig>(
            r#"
address = "10.0.0.5"
width = 3
"#,
        );
        assert!(result.is_err());
    }
}
