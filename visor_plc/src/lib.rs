//! VISOR PLC Link
//!
//! Stateful connection manager for the PLC data-block protocol with a
//! pluggable transport architecture.
//!
//! # Module Structure
//!
//! - [`wire`] - Fixed-width big-endian code encoding (the data-block contract)
//! - [`transport`] - `PlcTransport` trait and transport factory
//! - [`s7`] - ISO-on-TCP transport (TPKT/COTP + S7 write-var)
//! - [`sim`] - Simulation transport for tests and hardware-free operation
//! - [`link`] - `PlcLink` connection state machine
//! - [`config`] - PLC addressing and protocol configuration
//!
//! # Ownership
//!
//! The link exclusively owns the connection state; callers interact only
//! through [`PlcLink::connect`], [`PlcLink::submit`] and
//! [`PlcLink::disconnect`]. Retry and backoff policy belong to the caller —
//! the link never retries or self-heals internally.

pub mod config;
pub mod link;
pub mod s7;
pub mod sim;
pub mod transport;
pub mod wire;

pub use config::PlcConfig;
pub use link::{ConnectError, LinkState, PlcLink, WriteError};
pub use s7::S7Transport;
pub use sim::{SimHandle, SimTransport, SimWrite};
pub use transport::{create_transport, PlcTransport, TransportError};
pub use wire::{CodeWidth, WireError, WireFormat};
