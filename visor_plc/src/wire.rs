//! Fixed-width big-endian code encoding.
//!
//! The PLC's data block holds the actuation decision as a fixed-width
//! integer at a fixed byte offset. Width (2 or 4 bytes) and signedness vary
//! per deployment and form the wire contract together with the addressing
//! triple in [`crate::config::PlcConfig`]. Bytes go out big-endian — the
//! controller's native order.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;
use visor_common::consts::MAX_CODE_WIDTH;

/// Encoded codes fit the stack buffer for every supported width.
const_assert!(MAX_CODE_WIDTH <= 8);

/// Code width on the wire, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CodeWidth {
    /// 16-bit data-block field (S7 `INT`/`WORD`).
    Two = 2,
    /// 32-bit data-block field (S7 `DINT`/`DWORD`).
    Four = 4,
}

impl CodeWidth {
    /// Convert from raw `u8`. Returns `None` for unsupported widths.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Width in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

impl Default for CodeWidth {
    fn default() -> Self {
        Self::Four
    }
}

impl TryFrom<u8> for CodeWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("unsupported code width: {value} (use 2 or 4)"))
    }
}

impl From<CodeWidth> for u8 {
    fn from(width: CodeWidth) -> Self {
        width as u8
    }
}

/// Wire encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The code value does not fit the configured width/signedness.
    #[error("code {code} does not fit {width} {signedness} bytes")]
    OutOfRange {
        code: i64,
        width: usize,
        signedness: &'static str,
    },
}

/// Fixed-width integer layout for the data-block field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireFormat {
    /// Field width in bytes.
    pub width: CodeWidth,
    /// Two's-complement signed field when true, unsigned otherwise.
    pub signed: bool,
}

impl WireFormat {
    /// Create a wire format.
    #[inline]
    pub const fn new(width: CodeWidth, signed: bool) -> Self {
        Self { width, signed }
    }

    /// Inclusive value range representable in this format.
    #[inline]
    pub const fn range(&self) -> (i64, i64) {
        match (self.width, self.signed) {
            (CodeWidth::Two, true) => (i16::MIN as i64, i16::MAX as i64),
            (CodeWidth::Two, false) => (0, u16::MAX as i64),
            (CodeWidth::Four, true) => (i32::MIN as i64, i32::MAX as i64),
            (CodeWidth::Four, false) => (0, u32::MAX as i64),
        }
    }

    /// True if `code` is representable in this format.
    #[inline]
    pub const fn fits(&self, code: i64) -> bool {
        let (min, max) = self.range();
        code >= min && code <= max
    }

    /// Encode `code` as big-endian bytes, range-checked.
    ///
    /// The result is a stack buffer — nothing allocates on the submit path.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::OutOfRange`] if `code` is not representable.
    pub fn encode(&self, code: i64) -> Result<heapless::Vec<u8, MAX_CODE_WIDTH>, WireError> {
        if !self.fits(code) {
            return Err(WireError::OutOfRange {
                code,
                width: self.width.bytes(),
                signedness: if self.signed { "signed" } else { "unsigned" },
            });
        }

        let mut out = heapless::Vec::new();
        let filled = match self.width {
            // Truncating casts are safe here: fits() already bounded the value.
            CodeWidth::Two => out.extend_from_slice(&(code as u16).to_be_bytes()),
            CodeWidth::Four => out.extend_from_slice(&(code as u32).to_be_bytes()),
        };
        debug_assert!(filled.is_ok());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_width_roundtrip() {
        assert_eq!(CodeWidth::from_u8(2), Some(CodeWidth::Two));
        assert_eq!(CodeWidth::from_u8(4), Some(CodeWidth::Four));
        assert_eq!(CodeWidth::from_u8(0), None);
        assert_eq!(CodeWidth::from_u8(3), None);
        assert_eq!(CodeWidth::from_u8(8), None);
        assert_eq!(CodeWidth::Two.bytes(), 2);
        assert_eq!(CodeWidth::Four.bytes(), 4);
    }

    #[test]
    fn encode_unsigned_four_bytes_big_endian() {
        let fmt = WireFormat::new(CodeWidth::Four, false);
        assert_eq!(fmt.encode(1).unwrap().as_slice(), &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(
            fmt.encode(0x0102_0304).unwrap().as_slice(),
            &[0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(
            fmt.encode(u32::MAX as i64).unwrap().as_slice(),
            &[0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn encode_unsigned_two_bytes_big_endian() {
        let fmt = WireFormat::new(CodeWidth::Two, false);
        assert_eq!(fmt.encode(2).unwrap().as_slice(), &[0x00, 0x02]);
        assert_eq!(fmt.encode(0x1234).unwrap().as_slice(), &[0x12, 0x34]);
    }

    #[test]
    fn encode_signed_two_bytes() {
        let fmt = WireFormat::new(CodeWidth::Two, true);
        assert_eq!(fmt.encode(-1).unwrap().as_slice(), &[0xFF, 0xFF]);
        assert_eq!(fmt.encode(-32768).unwrap().as_slice(), &[0x80, 0x00]);
        assert_eq!(fmt.encode(32767).unwrap().as_slice(), &[0x7F, 0xFF]);
    }

    #[test]
    fn encode_signed_four_bytes() {
        let fmt = WireFormat::new(CodeWidth::Four, true);
        assert_eq!(
            fmt.encode(-2).unwrap().as_slice(),
            &[0xFF, 0xFF, 0xFF, 0xFE]
        );
    }

    #[test]
    fn encode_out_of_range() {
        let fmt = WireFormat::new(CodeWidth::Two, false);
        assert!(matches!(
            fmt.encode(-1),
            Err(WireError::OutOfRange { code: -1, .. })
        ));
        assert!(fmt.encode(0x1_0000).is_err());

        let fmt = WireFormat::new(CodeWidth::Two, true);
        assert!(fmt.encode(32768).is_err());
        assert!(fmt.encode(-32769).is_err());

        let fmt = WireFormat::new(CodeWidth::Four, false);
        assert!(fmt.encode(u32::MAX as i64 + 1).is_err());
        assert!(fmt.encode(-1).is_err());
    }

    #[test]
    fn serde_width_from_integer() {
        #[derive(Debug, Deserialize)]
        struct W {
            width: CodeWidth,
        }

        let w: W = toml::from_str("width = 2").unwrap();
        assert_eq!(w.width, CodeWidth::Two);
        let w: W = toml::from_str("width = 4").unwrap();
        assert_eq!(w.width, CodeWidth::Four);
        assert!(toml::from_str::<W>("width = 3").is_err());
    }
}
