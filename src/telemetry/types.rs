#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Provenance of the PCIe RX/TX throughput figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThroughputSource {
    /// Aggregate SMU bandwidth figure split 50/50 between RX and TX; no
    /// directionality was actually measured
    EstimatedUndirected,
    /// Derived from PCI packet counters; preferred when available
    CounterDerived,
}

/// One poll cycle's worth of device telemetry.
///
/// Every field is independently populated: a query that fails, or a sensor a
/// silicon generation does not implement, leaves its field unset without
/// affecting any other field. [`refresh_dynamic`](crate::SmiSession::refresh_dynamic)
/// only ever sets fields it could determine and never clears a field, so
/// the populated set grows monotonically within one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DynamicTelemetry {
    /// GPU busy percentage (0-100)
    pub gpu_util_percent: Option<u32>,

    /// Current GPU clock in MHz
    pub gpu_clock_mhz: Option<u32>,
    /// Maximum supported GPU clock in MHz
    pub gpu_clock_max_mhz: Option<u32>,
    /// Current memory clock in MHz
    pub mem_clock_mhz: Option<u32>,
    /// Maximum supported memory clock in MHz
    pub mem_clock_max_mhz: Option<u32>,

    /// Total VRAM in bytes
    pub total_memory_bytes: Option<u64>,
    /// Used VRAM in bytes
    pub used_memory_bytes: Option<u64>,
    /// Free VRAM in bytes; derived when total and used are both known
    pub free_memory_bytes: Option<u64>,
    /// Memory utilization percentage; derived from total/used when possible,
    /// otherwise the device's memory-busy reading
    pub mem_util_percent: Option<u32>,

    /// Edge (die) temperature in whole degrees Celsius
    pub edge_temp_c: Option<i32>,
    /// Junction (hotspot) temperature in whole degrees Celsius
    pub junction_temp_c: Option<i32>,
    /// Memory temperature in whole degrees Celsius
    pub memory_temp_c: Option<i32>,

    /// Fan speed as a percentage of the vendor's maximum scale
    pub fan_speed_percent: Option<u32>,
    /// Fan speed in RPM
    pub fan_rpm: Option<u32>,

    /// Power draw in watts
    pub power_draw_watts: Option<u32>,
    /// Enforced power cap in watts
    pub power_cap_watts: Option<u32>,

    /// Negotiated PCIe link width in lanes
    pub pcie_link_width: Option<u32>,
    /// PCIe generation of the negotiated link speed
    pub pcie_link_gen: Option<u32>,
    /// PCIe receive throughput in KiB/s
    pub pcie_rx_kib: Option<u32>,
    /// PCIe transmit throughput in KiB/s
    pub pcie_tx_kib: Option<u32>,
    /// How the RX/TX figures were obtained
    pub pcie_throughput_source: Option<ThroughputSource>,
}
