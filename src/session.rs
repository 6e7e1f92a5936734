//! Vendor-library lifecycle management
//!
//! An [`SmiSession`] owns the initialization state of the ROCm SMI library
//! and the count of monitored devices. The session is caller-owned and passed
//! by reference into every operation; readiness is a typed state rather than
//! a flag-plus-counter pair, so no partially initialized session is ever
//! observable.

use std::fmt;

use crate::error::Result;
use crate::smi::{RocmSmi, SmiInterface};

/// Readiness of the vendor library behind a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The vendor library has not been initialized (or has been shut down)
    Uninitialized,
    /// The vendor library is ready and reports this many monitored devices
    Ready {
        device_count: u32,
    },
}

/// A caller-owned session over the ROCm SMI library.
///
/// `initialize` and `shutdown` are idempotent. The session adds no locking:
/// concurrent use from multiple threads requires external synchronization.
pub struct SmiSession {
    smi: Box<dyn SmiInterface>,
    state: SessionState,
}

impl Default for SmiSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SmiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmiSession").field("state", &self.state).finish()
    }
}

impl SmiSession {
    /// Creates a session over the default FFI-backed interface
    pub fn new() -> Self {
        Self::with_interface(Box::new(RocmSmi))
    }

    /// Creates a session over a caller-provided interface implementation
    pub fn with_interface(smi: Box<dyn SmiInterface>) -> Self {
        Self { smi, state: SessionState::Uninitialized }
    }

    /// Initializes the vendor library and queries the monitored-device count.
    ///
    /// No-op success when already ready. If the count query fails after a
    /// successful init, the library is torn down again and the error is
    /// returned; retrying later (e.g. once the driver is loaded) is valid.
    pub fn initialize(&mut self) -> Result<()> {
        if let SessionState::Ready { .. } = self.state {
            return Ok(());
        }

        self.smi.init()?;

        let device_count = match self.smi.device_count() {
            Ok(count) => count,
            Err(err) => {
                if let Err(shutdown_err) = self.smi.shut_down() {
                    log::warn!("shutdown after failed device-count query failed: {shutdown_err}");
                }
                return Err(err.into());
            }
        };

        log::debug!("ROCm SMI ready, {device_count} monitored device(s)");
        self.state = SessionState::Ready { device_count };
        Ok(())
    }

    /// Tears down the vendor library; no-op when not initialized
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Uninitialized {
            return;
        }

        if let Err(err) = self.smi.shut_down() {
            log::warn!("ROCm SMI shutdown failed: {err}");
        }
        self.state = SessionState::Uninitialized;
    }

    /// Whether the vendor library is initialized and ready for queries
    pub fn is_available(&self) -> bool {
        matches!(self.state, SessionState::Ready { .. })
    }

    /// Number of monitored devices; 0 when uninitialized
    pub fn device_count(&self) -> u32 {
        match self.state {
            SessionState::Ready { device_count } => device_count,
            SessionState::Uninitialized => 0,
        }
    }

    /// Current typed state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn interface(&self) -> &dyn SmiInterface {
        self.smi.as_ref()
    }
}
