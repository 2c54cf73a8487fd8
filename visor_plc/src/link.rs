//! PLC link connection state machine.
//!
//! [`PlcLink`] owns the connection to the controller and serializes all
//! data-block writes through one state machine:
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──success──> Connected
//! Connected ──write failure──> Faulted
//! Faulted ──connect()──> Connecting
//! ```
//!
//! The link never retries or reconnects on its own — a `Faulted` link stays
//! faulted until the caller invokes [`PlcLink::connect`] again, which lets
//! the caller apply backoff and keep the inspection cadence instead of
//! stalling on a dead controller every frame.

use crate::config::PlcConfig;
use crate::transport::{PlcTransport, TransportError};
use crate::wire::{WireError, WireFormat};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Link connection state.
///
/// Owned exclusively by [`PlcLink`]; other components observe it through
/// [`PlcLink::state`] but never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    /// No connection established yet.
    Disconnected = 0,
    /// Connection attempt in progress.
    Connecting = 1,
    /// Connected; submissions are accepted.
    Connected = 2,
    /// A write failed mid-connection; explicit reconnect required.
    Faulted = 3,
}

impl LinkState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Faulted),
            _ => None,
        }
    }

    /// True when submissions are accepted.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Connection establishment failure. The link returns to its previous
/// state (`Disconnected` or `Faulted`), preserving the distinction between
/// "never connected" and "was connected, now broken".
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// The underlying transport failed to open.
    #[error("PLC connect failed: {0}")]
    Transport(TransportError),
}

/// Submission failure.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// `submit` called without an established connection. The link state
    /// is left unchanged — this is not a fault.
    #[error("PLC link not connected (state {state:?})")]
    NotConnected { state: LinkState },

    /// The code does not fit the configured wire format. A configuration
    /// problem, not a connection problem — the link stays `Connected`.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The transport write failed; the link is now `Faulted` and the
    /// connection has been released.
    #[error("PLC write failed: {0}")]
    Transport(TransportError),
}

/// Stateful connection manager for the PLC data block.
pub struct PlcLink {
    state: LinkState,
    wire: WireFormat,
    db: u16,
    offset: u16,
    transport: Box<dyn PlcTransport>,
}

impl PlcLink {
    /// Create a link over `transport`. Does not connect.
    pub fn new(config: &PlcConfig, transport: Box<dyn PlcTransport>) -> Self {
        Self {
            state: LinkState::Disconnected,
            wire: config.wire_format(),
            db: config.db,
            offset: config.offset,
            transport,
        }
    }

    /// Current connection state.
    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Wire layout of the decision field.
    #[inline]
    pub fn wire_format(&self) -> WireFormat {
        self.wire
    }

    /// Establish the connection.
    ///
    /// Idempotent: calling while `Connected` is a no-op success. On failure
    /// the link returns to the state it was in before the attempt; no
    /// internal retry.
    ///
    /// # Errors
    /// Returns [`ConnectError::Transport`] if the transport cannot open.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        if self.state == LinkState::Connected {
            return Ok(());
        }

        let previous = self.state;
        self.state = LinkState::Connecting;

        match self.transport.open() {
            Ok(()) => {
                self.state = LinkState::Connected;
                info!(
                    transport = self.transport.name(),
                    db = self.db,
                    offset = self.offset,
                    "PLC link connected"
                );
                Ok(())
            }
            Err(e) => {
                self.state = previous;
                warn!(transport = self.transport.name(), error = %e, "PLC connect failed");
                Err(ConnectError::Transport(e))
            }
        }
    }

    /// Submit an actuation code to the configured data-block field.
    ///
    /// Encodes `code` with the configured width/signedness (big-endian) and
    /// writes it at the configured offset. A transport failure transitions
    /// the link to `Faulted` and releases the connection — the caller must
    /// `connect()` again (with its own backoff) before further submissions.
    ///
    /// # Errors
    /// - [`WriteError::NotConnected`] if the link is not `Connected`
    /// - [`WriteError::Wire`] if `code` does not fit the wire format
    /// - [`WriteError::Transport`] if the underlying write failed
    pub fn submit(&mut self, code: i64) -> Result<(), WriteError> {
        if self.state != LinkState::Connected {
            return Err(WriteError::NotConnected { state: self.state });
        }

        let bytes = self.wire.encode(code)?;

        match self.transport.write_db(self.db, self.offset, &bytes) {
            Ok(()) => {
                debug!(code, db = self.db, offset = self.offset, "decision written to PLC");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Faulted;
                self.transport.close();
                Err(WriteError::Transport(e))
            }
        }
    }

    /// Release the connection and return to `Disconnected`.
    pub fn disconnect(&mut self) {
        self.transport.close();
        if self.state != LinkState::Disconnected {
            info!(transport = self.transport.name(), "PLC link disconnected");
        }
        self.state = LinkState::Disconnected;
    }
}
