/// Frequency-table entries are reported in Hz
pub const HZ_PER_MHZ: u64 = 1_000_000;

/// Temperature sensors report millidegrees Celsius
pub const MILLIDEGREES_PER_DEGREE: i64 = 1000;

/// Power queries report milliwatts
pub const MILLIWATTS_PER_WATT: u64 = 1000;

/// Scale for packet-counter-derived PCIe throughput
pub const BYTES_PER_KIB: u64 = 1024;

/// Sentinel the SMU metrics block uses for an unsupported 16-bit field
pub const PCIE_FIELD_UNSUPPORTED: u16 = u16::MAX;

/// Sentinel for an unsupported instantaneous-bandwidth reading
pub const PCIE_BANDWIDTH_UNSUPPORTED: u64 = u64::MAX;
