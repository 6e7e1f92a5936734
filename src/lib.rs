//! ROCm Metrics - A Rust library for collecting AMD GPU telemetry
//!
//! This crate provides a safe interface to the ROCm SMI vendor library
//! (`librocm_smi64`). It resolves GPU devices by PCI bus address and pulls a
//! heterogeneous set of hardware counters and sensors into one normalized,
//! unit-consistent telemetry record with per-field validity.
//!
//! # Features
//!
//! - **Session lifecycle**: explicit, idempotent init/shutdown of the vendor
//!   library with a typed ready state
//! - **Device resolution**: PCI bus address (`0000:03:00.0`) to vendor device
//!   index, plus market/generic device-name lookup
//! - **Dynamic telemetry**: utilization, clocks, memory, temperatures, fan,
//!   power and PCIe link/throughput, each field independently populated
//!
//! # Examples
//!
//! ```no_run
//! use rocm_metrics::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut session = SmiSession::new();
//!     session.initialize()?;
//!
//!     if let Some(index) = session.find_device("0000:03:00.0") {
//!         let mut telemetry = DynamicTelemetry::default();
//!         session.refresh_dynamic(index, &mut telemetry);
//!
//!         if let Some(util) = telemetry.gpu_util_percent {
//!             println!("GPU busy: {util}%");
//!         }
//!     }
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Session-level failures (library init, device-count query) surface as
//! [`Error`]. Per-metric failures never do: a sensor missing on one silicon
//! generation simply leaves its record field unset, and every other metric is
//! still collected. See [`telemetry::DynamicTelemetry`].
//!
//! # Thread Safety
//!
//! The call model is synchronous and blocking. An [`SmiSession`] adds no
//! internal locking; sharing one session across threads requires external
//! synchronization. The vendor library may serialize access internally.

#![doc(html_root_url = "https://docs.rs/rocm-metrics/0.1.0")]

pub mod device;
pub mod error;
pub mod session;
pub mod smi;
pub mod telemetry;

pub use error::{Error, Result};
pub use session::{SessionState, SmiSession};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::device::{BusAddress, DeviceIndex};
    pub use crate::error::{Error, Result};
    pub use crate::session::{SessionState, SmiSession};
    pub use crate::smi::{SmiError, SmiInterface};
    pub use crate::telemetry::{DynamicTelemetry, ThroughputSource};
}
