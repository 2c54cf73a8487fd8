//! PLC transport trait and factory.
//!
//! This module defines:
//! - `PlcTransport` trait - Interface for pluggable PLC transports
//! - `TransportError` enum - Error types for transport operations
//! - `create_transport()` - Factory resolving a configured transport name

use crate::config::PlcConfig;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection establishment failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Write to the controller failed
    #[error("write failed: {0}")]
    Write(String),

    /// The controller answered with an unexpected or error response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport not found
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
}

/// Trait defining the interface for PLC transports.
///
/// [`crate::link::PlcLink`] drives transports through this trait, enabling
/// pluggable wire backends (S7 ISO-on-TCP, simulation, future fieldbuses).
///
/// # Lifecycle
///
/// 1. `open()` - Called by the link on `connect()`
/// 2. `write_db()` - Called per submission while open
/// 3. `close()` - Called on fault or shutdown; must be safe to call twice
///
/// # Timing Contracts
///
/// | Operation | Bound | Enforced by |
/// |-----------|-------|-------------|
/// | `open()` | connect timeout | implementation |
/// | `write_db()` | I/O timeout | implementation |
/// | `close()` | immediate | implementation |
///
/// Every operation must return within its configured bound — the caller
/// sits on the frame-processing path and must never stall acquisition.
pub trait PlcTransport: Send {
    /// Returns the transport's unique identifier (e.g., "s7", "sim").
    fn name(&self) -> &'static str;

    /// Establish the connection to the controller.
    ///
    /// # Errors
    /// Returns `TransportError::Connect` or `TransportError::Protocol` if
    /// the endpoint is unreachable or the handshake fails.
    fn open(&mut self) -> Result<(), TransportError>;

    /// True while the transport holds an established connection.
    fn is_open(&self) -> bool;

    /// Write `bytes` into data block `db` starting at byte `offset`.
    ///
    /// # Errors
    /// Returns `TransportError::Write` if the connection dropped mid-write,
    /// `TransportError::Protocol` if the controller rejected the request.
    fn write_db(&mut self, db: u16, offset: u16, bytes: &[u8]) -> Result<(), TransportError>;

    /// Release the connection. Idempotent.
    fn close(&mut self);
}

/// Create a transport instance from configuration.
///
/// Resolves `config.transport` against the built-in transports. No global
/// registry — the factory is called once at startup and the instance is
/// handed to the link by value.
///
/// # Errors
/// Returns `TransportError::UnknownTransport` for unrecognized names.
pub fn create_transport(config: &PlcConfig) -> Result<Box<dyn PlcTransport>, TransportError> {
    match config.transport.as_str() {
        "s7" => Ok(Box::new(crate::s7::S7Transport::from_config(config))),
        "sim" => Ok(Box::new(crate::sim::SimTransport::new().0)),
        other => Err(TransportError::UnknownTransport(other.to_string())),
    }
}
