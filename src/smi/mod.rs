//! ROCm SMI interface for AMD GPU telemetry
//!
//! This module provides a safe abstraction over the ROCm SMI vendor library.
//! The [`SmiInterface`] trait carries one method per vendor entry point the
//! crate depends on; [`RocmSmi`] is the concrete FFI-backed implementation.
//! Each query returns either a value or an explicit unavailability marker
//! ([`SmiError`]); there is no out-parameter/boolean encoding at this layer.
//!
//! # Safety
//!
//! All unsafe FFI calls are confined to the [`RocmSmi`] implementation and
//! the `bindings` module. Buffers handed to the vendor library are
//! call-scoped and NUL-terminated before being read back.
//!
//! # Examples
//!
//! ```no_run
//! use rocm_metrics::smi::{RocmSmi, SmiInterface};
//!
//! let smi = RocmSmi::default();
//! if smi.init().is_ok() {
//!     let count = smi.device_count().unwrap_or(0);
//!     println!("monitoring {count} device(s)");
//!     let _ = smi.shut_down();
//! }
//! ```

pub(crate) mod bindings;

use crate::device::DeviceIndex;

#[cfg(test)]
use mockall::automock;

pub use self::bindings::RSMI_MAX_FAN_SPEED;

/// Length of the call-scoped buffer handed to the vendor name queries
pub const NAME_BUFFER_LEN: usize = 128;

/// Result type for individual vendor queries
pub type SmiResult<T> = std::result::Result<T, SmiError>;

/// Why a vendor query produced no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SmiError {
    /// The crate was built without the `rocm-smi` feature
    #[error("built without ROCm SMI support")]
    Unsupported,

    /// The vendor library returned a non-success status code
    #[error("ROCm SMI returned status {0}")]
    Status(u32),
}

/// Clock domains exposed by the frequency-table query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDomain {
    /// The system (shader) clock
    System,
    /// The memory clock
    Memory,
}

#[cfg(feature = "rocm-smi")]
impl ClockDomain {
    fn as_raw(self) -> u32 {
        match self {
            ClockDomain::System => bindings::clk_type::RSMI_CLK_TYPE_SYS,
            ClockDomain::Memory => bindings::clk_type::RSMI_CLK_TYPE_MEM,
        }
    }
}

/// Memory pools exposed by the memory queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPool {
    /// Dedicated video memory
    Vram,
}

#[cfg(feature = "rocm-smi")]
impl MemoryPool {
    fn as_raw(self) -> u32 {
        match self {
            MemoryPool::Vram => bindings::memory_type::RSMI_MEM_TYPE_VRAM,
        }
    }
}

/// Temperature sensors; availability varies by silicon generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSensor {
    Edge,
    Junction,
    Memory,
}

#[cfg(feature = "rocm-smi")]
impl TemperatureSensor {
    fn as_raw(self) -> u32 {
        match self {
            TemperatureSensor::Edge => bindings::temperature::RSMI_TEMP_TYPE_EDGE,
            TemperatureSensor::Junction => bindings::temperature::RSMI_TEMP_TYPE_JUNCTION,
            TemperatureSensor::Memory => bindings::temperature::RSMI_TEMP_TYPE_MEMORY,
        }
    }
}

/// Kind of reading reported by the instantaneous power query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerKind {
    Average,
    Current,
    Invalid,
}

#[cfg(any(test, feature = "rocm-smi"))]
impl PowerKind {
    fn from_raw(raw: u32) -> Self {
        match raw {
            bindings::power_type::RSMI_AVERAGE_POWER => PowerKind::Average,
            bindings::power_type::RSMI_CURRENT_POWER => PowerKind::Current,
            _ => PowerKind::Invalid,
        }
    }
}

/// Supported-frequency table for one clock domain, values in Hz
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frequencies {
    /// Supported frequencies in the vendor's table order
    pub supported: Vec<u64>,
    /// Index of the currently selected entry; may be out of range when the
    /// device is transitioning
    pub current: usize,
}

/// One power reading in milliwatts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerReading {
    pub milliwatts: u64,
    pub kind: PowerKind,
}

/// The PCIe slice of the SMU metrics block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuMetricsBlock {
    /// Negotiated link width in lanes; 0 or 0xFFFF when unsupported
    pub pcie_link_width: u16,
    /// Link speed in units of 0.1 GT/s; 0 or 0xFFFF when unsupported
    pub pcie_link_speed: u16,
    /// Instantaneous aggregate bandwidth in bits per second; u64::MAX when
    /// unsupported
    pub pcie_bandwidth_inst: u64,
}

/// PCI packet counters from the throughput query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PciThroughput {
    pub sent_packets: u64,
    pub received_packets: u64,
    /// Maximum payload size in bytes; 0 when the device does not report it
    pub max_packet_size: u64,
}

/// The vendor-library boundary: one method per ROCm SMI entry point this
/// crate depends on.
///
/// Implementations must be synchronous and blocking: every call returns
/// before the caller proceeds, and no call hangs by contract with the vendor
/// library. The trait is mocked in tests via `mockall`.
#[cfg_attr(test, automock)]
pub trait SmiInterface: Send + Sync {
    fn init(&self) -> SmiResult<()>;
    fn shut_down(&self) -> SmiResult<()>;
    fn device_count(&self) -> SmiResult<u32>;

    /// 64-bit BDF location identifier for a device
    fn device_location(&self, index: DeviceIndex) -> SmiResult<u64>;
    /// Marketing name; not implemented on all generations
    fn market_name(&self, index: DeviceIndex) -> SmiResult<String>;
    /// Generic device name
    fn device_name(&self, index: DeviceIndex) -> SmiResult<String>;

    fn busy_percent(&self, index: DeviceIndex) -> SmiResult<u32>;
    fn clock_frequencies(&self, index: DeviceIndex, domain: ClockDomain) -> SmiResult<Frequencies>;

    fn memory_total(&self, index: DeviceIndex, pool: MemoryPool) -> SmiResult<u64>;
    fn memory_used(&self, index: DeviceIndex, pool: MemoryPool) -> SmiResult<u64>;
    fn memory_busy_percent(&self, index: DeviceIndex) -> SmiResult<u32>;

    /// Current reading of one sensor in millidegrees Celsius
    fn temperature(&self, index: DeviceIndex, sensor: TemperatureSensor) -> SmiResult<i64>;

    /// Raw fan speed on the vendor's 0..=[`RSMI_MAX_FAN_SPEED`] scale
    fn fan_speed(&self, index: DeviceIndex, sensor: u32) -> SmiResult<i64>;
    fn fan_rpm(&self, index: DeviceIndex, sensor: u32) -> SmiResult<i64>;

    /// Instantaneous power draw; not implemented on all generations
    fn power(&self, index: DeviceIndex) -> SmiResult<PowerReading>;
    /// Average power draw in milliwatts
    fn average_power(&self, index: DeviceIndex, sensor: u32) -> SmiResult<u64>;
    /// Enforced power cap in milliwatts
    fn power_cap(&self, index: DeviceIndex, sensor: u32) -> SmiResult<u64>;

    /// Compatibility gate: succeeds when the device exposes an SMU metrics
    /// table this library understands
    fn metrics_header_supported(&self, index: DeviceIndex) -> SmiResult<()>;
    fn gpu_metrics(&self, index: DeviceIndex) -> SmiResult<GpuMetricsBlock>;
    fn pci_throughput(&self, index: DeviceIndex) -> SmiResult<PciThroughput>;
}

/// The FFI-backed [`SmiInterface`] over `librocm_smi64`.
///
/// Without the `rocm-smi` cargo feature every method reports
/// [`SmiError::Unsupported`], so the crate stays buildable on hosts without
/// the ROCm stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct RocmSmi;

#[cfg(feature = "rocm-smi")]
fn check(status: u32) -> SmiResult<()> {
    if status == bindings::status::RSMI_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(SmiError::Status(status))
    }
}

#[cfg(feature = "rocm-smi")]
fn read_name(
    query: unsafe extern "C" fn(u32, *mut libc::c_char, usize) -> u32,
    index: DeviceIndex,
) -> SmiResult<String> {
    let mut buf = [0 as libc::c_char; NAME_BUFFER_LEN];
    check(unsafe { query(index, buf.as_mut_ptr(), buf.len()) })?;
    // The vendor may fill the buffer without terminating it
    buf[NAME_BUFFER_LEN - 1] = 0;
    let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(feature = "rocm-smi")]
impl SmiInterface for RocmSmi {
    fn init(&self) -> SmiResult<()> {
        check(unsafe { bindings::rsmi_init(bindings::init_flags::RSMI_INIT_FLAG_THRAD_ONLY_MUTEX) })
    }

    fn shut_down(&self) -> SmiResult<()> {
        check(unsafe { bindings::rsmi_shut_down() })
    }

    fn device_count(&self) -> SmiResult<u32> {
        let mut count: u32 = 0;
        check(unsafe { bindings::rsmi_num_monitor_devices(&mut count) })?;
        Ok(count)
    }

    fn device_location(&self, index: DeviceIndex) -> SmiResult<u64> {
        let mut bdfid: u64 = 0;
        check(unsafe { bindings::rsmi_dev_pci_id_get(index, &mut bdfid) })?;
        Ok(bdfid)
    }

    fn market_name(&self, index: DeviceIndex) -> SmiResult<String> {
        read_name(bindings::rsmi_dev_market_name_get, index)
    }

    fn device_name(&self, index: DeviceIndex) -> SmiResult<String> {
        read_name(bindings::rsmi_dev_name_get, index)
    }

    fn busy_percent(&self, index: DeviceIndex) -> SmiResult<u32> {
        let mut busy: u32 = 0;
        check(unsafe { bindings::rsmi_dev_busy_percent_get(index, &mut busy) })?;
        Ok(busy)
    }

    fn clock_frequencies(&self, index: DeviceIndex, domain: ClockDomain) -> SmiResult<Frequencies> {
        let mut raw = bindings::RsmiFrequencies::default();
        check(unsafe { bindings::rsmi_dev_gpu_clk_freq_get(index, domain.as_raw(), &mut raw) })?;
        let len = (raw.num_supported as usize).min(bindings::RSMI_MAX_NUM_FREQUENCIES);
        Ok(Frequencies {
            supported: raw.frequency[..len].to_vec(),
            current: raw.current as usize,
        })
    }

    fn memory_total(&self, index: DeviceIndex, pool: MemoryPool) -> SmiResult<u64> {
        let mut total: u64 = 0;
        check(unsafe { bindings::rsmi_dev_memory_total_get(index, pool.as_raw(), &mut total) })?;
        Ok(total)
    }

    fn memory_used(&self, index: DeviceIndex, pool: MemoryPool) -> SmiResult<u64> {
        let mut used: u64 = 0;
        check(unsafe { bindings::rsmi_dev_memory_usage_get(index, pool.as_raw(), &mut used) })?;
        Ok(used)
    }

    fn memory_busy_percent(&self, index: DeviceIndex) -> SmiResult<u32> {
        let mut busy: u32 = 0;
        check(unsafe { bindings::rsmi_dev_memory_busy_percent_get(index, &mut busy) })?;
        Ok(busy)
    }

    fn temperature(&self, index: DeviceIndex, sensor: TemperatureSensor) -> SmiResult<i64> {
        let mut millidegrees: i64 = 0;
        check(unsafe {
            bindings::rsmi_dev_temp_metric_get(
                index,
                sensor.as_raw(),
                bindings::temperature::RSMI_TEMP_CURRENT,
                &mut millidegrees,
            )
        })?;
        Ok(millidegrees)
    }

    fn fan_speed(&self, index: DeviceIndex, sensor: u32) -> SmiResult<i64> {
        let mut speed: i64 = -1;
        check(unsafe { bindings::rsmi_dev_fan_speed_get(index, sensor, &mut speed) })?;
        Ok(speed)
    }

    fn fan_rpm(&self, index: DeviceIndex, sensor: u32) -> SmiResult<i64> {
        let mut rpm: i64 = -1;
        check(unsafe { bindings::rsmi_dev_fan_rpms_get(index, sensor, &mut rpm) })?;
        Ok(rpm)
    }

    fn power(&self, index: DeviceIndex) -> SmiResult<PowerReading> {
        let mut milliwatts: u64 = 0;
        let mut kind = bindings::power_type::RSMI_INVALID_POWER;
        check(unsafe { bindings::rsmi_dev_power_get(index, &mut milliwatts, &mut kind) })?;
        Ok(PowerReading { milliwatts, kind: PowerKind::from_raw(kind) })
    }

    fn average_power(&self, index: DeviceIndex, sensor: u32) -> SmiResult<u64> {
        let mut milliwatts: u64 = 0;
        check(unsafe { bindings::rsmi_dev_power_ave_get(index, sensor, &mut milliwatts) })?;
        Ok(milliwatts)
    }

    fn power_cap(&self, index: DeviceIndex, sensor: u32) -> SmiResult<u64> {
        let mut milliwatts: u64 = 0;
        check(unsafe { bindings::rsmi_dev_power_cap_get(index, sensor, &mut milliwatts) })?;
        Ok(milliwatts)
    }

    fn metrics_header_supported(&self, index: DeviceIndex) -> SmiResult<()> {
        let mut header = bindings::MetricsTableHeader::default();
        check(unsafe { bindings::rsmi_dev_metrics_header_info_get(index, &mut header) })
    }

    fn gpu_metrics(&self, index: DeviceIndex) -> SmiResult<GpuMetricsBlock> {
        let mut raw = bindings::RsmiGpuMetrics::default();
        check(unsafe { bindings::rsmi_dev_gpu_metrics_info_get(index, &mut raw) })?;
        Ok(GpuMetricsBlock {
            pcie_link_width: raw.pcie_link_width,
            pcie_link_speed: raw.pcie_link_speed,
            pcie_bandwidth_inst: raw.pcie_bandwidth_inst,
        })
    }

    fn pci_throughput(&self, index: DeviceIndex) -> SmiResult<PciThroughput> {
        let mut sent: u64 = 0;
        let mut received: u64 = 0;
        let mut max_pkt: u64 = 0;
        check(unsafe {
            bindings::rsmi_dev_pci_throughput_get(index, &mut sent, &mut received, &mut max_pkt)
        })?;
        Ok(PciThroughput {
            sent_packets: sent,
            received_packets: received,
            max_packet_size: max_pkt,
        })
    }
}

#[cfg(not(feature = "rocm-smi"))]
impl SmiInterface for RocmSmi {
    fn init(&self) -> SmiResult<()> {
        Err(SmiError::Unsupported)
    }

    fn shut_down(&self) -> SmiResult<()> {
        Err(SmiError::Unsupported)
    }

    fn device_count(&self) -> SmiResult<u32> {
        Err(SmiError::Unsupported)
    }

    fn device_location(&self, _index: DeviceIndex) -> SmiResult<u64> {
        Err(SmiError::Unsupported)
    }

    fn market_name(&self, _index: DeviceIndex) -> SmiResult<String> {
        Err(SmiError::Unsupported)
    }

    fn device_name(&self, _index: DeviceIndex) -> SmiResult<String> {
        Err(SmiError::Unsupported)
    }

    fn busy_percent(&self, _index: DeviceIndex) -> SmiResult<u32> {
        Err(SmiError::Unsupported)
    }

    fn clock_frequencies(&self, _index: DeviceIndex, _domain: ClockDomain) -> SmiResult<Frequencies> {
        Err(SmiError::Unsupported)
    }

    fn memory_total(&self, _index: DeviceIndex, _pool: MemoryPool) -> SmiResult<u64> {
        Err(SmiError::Unsupported)
    }

    fn memory_used(&self, _index: DeviceIndex, _pool: MemoryPool) -> SmiResult<u64> {
        Err(SmiError::Unsupported)
    }

    fn memory_busy_percent(&self, _index: DeviceIndex) -> SmiResult<u32> {
        Err(SmiError::Unsupported)
    }

    fn temperature(&self, _index: DeviceIndex, _sensor: TemperatureSensor) -> SmiResult<i64> {
        Err(SmiError::Unsupported)
    }

    fn fan_speed(&self, _index: DeviceIndex, _sensor: u32) -> SmiResult<i64> {
        Err(SmiError::Unsupported)
    }

    fn fan_rpm(&self, _index: DeviceIndex, _sensor: u32) -> SmiResult<i64> {
        Err(SmiError::Unsupported)
    }

    fn power(&self, _index: DeviceIndex) -> SmiResult<PowerReading> {
        Err(SmiError::Unsupported)
    }

    fn average_power(&self, _index: DeviceIndex, _sensor: u32) -> SmiResult<u64> {
        Err(SmiError::Unsupported)
    }

    fn power_cap(&self, _index: DeviceIndex, _sensor: u32) -> SmiResult<u64> {
        Err(SmiError::Unsupported)
    }

    fn metrics_header_supported(&self, _index: DeviceIndex) -> SmiResult<()> {
        Err(SmiError::Unsupported)
    }

    fn gpu_metrics(&self, _index: DeviceIndex) -> SmiResult<GpuMetricsBlock> {
        Err(SmiError::Unsupported)
    }

    fn pci_throughput(&self, _index: DeviceIndex) -> SmiResult<PciThroughput> {
        Err(SmiError::Unsupported)
    }
}
