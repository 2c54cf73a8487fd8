//! Simulation transport.
//!
//! In-memory stand-in for a controller: records every data-block write and
//! supports fault injection. Used by tests and by `--simulate` runs where
//! no controller is on the network.

use crate::transport::{PlcTransport, TransportError};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One recorded data-block write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimWrite {
    pub db: u16,
    pub offset: u16,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct SimState {
    open: bool,
    fail_next_open: bool,
    fail_next_write: bool,
    writes: Vec<SimWrite>,
}

/// Simulated PLC transport.
pub struct SimTransport {
    state: Arc<Mutex<SimState>>,
}

/// Inspection and fault-injection handle for a [`SimTransport`].
///
/// Remains usable after the transport is moved into a link.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimTransport {
    /// Create a transport plus its inspection handle.
    pub fn new() -> (Self, SimHandle) {
        let state = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimHandle { state },
        )
    }
}

impl SimHandle {
    /// All writes recorded so far, oldest first.
    pub fn writes(&self) -> Vec<SimWrite> {
        self.state.lock().expect("sim state lock").writes.clone()
    }

    /// Number of recorded writes.
    pub fn write_count(&self) -> usize {
        self.state.lock().expect("sim state lock").writes.len()
    }

    /// Make the next `open()` fail once.
    pub fn fail_next_open(&self) {
        self.state.lock().expect("sim state lock").fail_next_open = true;
    }

    /// Make the next `write_db()` fail once (connection drop mid-write).
    pub fn fail_next_write(&self) {
        self.state.lock().expect("sim state lock").fail_next_write = true;
    }

    /// True while the transport is open.
    pub fn is_open(&self) -> bool {
        self.state.lock().expect("sim state lock").open
    }
}

impl PlcTransport for SimTransport {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("sim state lock");
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(TransportError::Connect(
                "simulated connect failure".to_string(),
            ));
        }
        state.open = true;
        debug!("sim transport opened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().expect("sim state lock").open
    }

    fn write_db(&mut self, db: u16, offset: u16, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("sim state lock");
        if !state.open {
            return Err(TransportError::Write("transport is closed".to_string()));
        }
        if state.fail_next_write {
            state.fail_next_write = false;
            state.open = false;
            return Err(TransportError::Write(
                "simulated connection drop".to_string(),
            ));
        }
        state.writes.push(SimWrite {
            db,
            offset,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().expect("sim state lock").open = false;
    }
}
