//! FFI bindings to the ROCm SMI library.
//!
//! This module centralizes all raw declarations against `librocm_smi64`:
//! status codes, enum values, out-parameter structs and the `extern "C"`
//! block itself. Everything above this layer goes through the safe
//! [`SmiInterface`](crate::smi::SmiInterface) trait.
//!
//! The `extern` block is only present with the `rocm-smi` cargo feature, so
//! the crate builds on hosts without the ROCm stack installed.

#![allow(dead_code)]

#[cfg(feature = "rocm-smi")]
use libc::c_char;

/// Status codes returned by every `rsmi_*` entry point
pub mod status {
    /// Call completed successfully
    pub const RSMI_STATUS_SUCCESS: u32 = 0;
}

/// Flags accepted by `rsmi_init`
pub mod init_flags {
    /// Mutexes protect against concurrent threads only, not other processes
    /// (spelling follows the vendor header)
    pub const RSMI_INIT_FLAG_THRAD_ONLY_MUTEX: u64 = 0x2;
}

/// `rsmi_clk_type_t` values
pub mod clk_type {
    pub const RSMI_CLK_TYPE_SYS: u32 = 0x0;
    pub const RSMI_CLK_TYPE_MEM: u32 = 0x4;
}

/// `rsmi_memory_type_t` values
pub mod memory_type {
    pub const RSMI_MEM_TYPE_VRAM: u32 = 0x0;
}

/// `rsmi_temperature_type_t` sensor values and the metric selector
pub mod temperature {
    pub const RSMI_TEMP_TYPE_EDGE: u32 = 0x0;
    pub const RSMI_TEMP_TYPE_JUNCTION: u32 = 0x1;
    pub const RSMI_TEMP_TYPE_MEMORY: u32 = 0x2;

    /// `rsmi_temperature_metric_t`: current reading
    pub const RSMI_TEMP_CURRENT: u32 = 0x0;
}

/// `RSMI_POWER_TYPE` values reported by `rsmi_dev_power_get`
pub mod power_type {
    pub const RSMI_AVERAGE_POWER: u32 = 0;
    pub const RSMI_CURRENT_POWER: u32 = 1;
    pub const RSMI_INVALID_POWER: u32 = 0xFFFF_FFFF;
}

/// Upper bound of the supported-frequency table
pub const RSMI_MAX_NUM_FREQUENCIES: usize = 32;

/// Fan-speed scale: `rsmi_dev_fan_speed_get` reports on 0..=255
pub const RSMI_MAX_FAN_SPEED: i64 = 255;

/// Frequency table from `rsmi_dev_gpu_clk_freq_get`, values in Hz
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RsmiFrequencies {
    pub num_supported: u32,
    pub current: u32,
    pub frequency: [u64; RSMI_MAX_NUM_FREQUENCIES],
}

impl Default for RsmiFrequencies {
    fn default() -> Self {
        Self { num_supported: 0, current: 0, frequency: [0; RSMI_MAX_NUM_FREQUENCIES] }
    }
}

/// Header of the SMU metrics table; a successful header query is the
/// compatibility gate for `rsmi_dev_gpu_metrics_info_get`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTableHeader {
    pub structure_size: u16,
    pub format_revision: u8,
    pub content_revision: u8,
}

pub const RSMI_NUM_HBM_INSTANCES: usize = 4;
pub const RSMI_MAX_NUM_VCN: usize = 4;
pub const RSMI_MAX_NUM_XGMI_LINKS: usize = 8;
pub const RSMI_MAX_NUM_GFX_CLKS: usize = 8;
pub const RSMI_MAX_NUM_CLKS: usize = 4;
pub const RSMI_MAX_NUM_JPEG_ENGS: usize = 32;

/// `rsmi_gpu_metrics_t`: the SMU metrics block. Layout mirrors the vendor
/// header's gpu_metrics structure; only the PCIe link and bandwidth fields
/// are consumed here.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RsmiGpuMetrics {
    pub common_header: MetricsTableHeader,
    pub temperature_edge: u16,
    pub temperature_hotspot: u16,
    pub temperature_mem: u16,
    pub temperature_vrgfx: u16,
    pub temperature_vrsoc: u16,
    pub temperature_vrmem: u16,
    pub average_gfx_activity: u16,
    pub average_umc_activity: u16,
    pub average_mm_activity: u16,
    pub average_socket_power: u16,
    pub energy_accumulator: u64,
    pub system_clock_counter: u64,
    pub average_gfxclk_frequency: u16,
    pub average_socclk_frequency: u16,
    pub average_uclk_frequency: u16,
    pub average_vclk0_frequency: u16,
    pub average_dclk0_frequency: u16,
    pub average_vclk1_frequency: u16,
    pub average_dclk1_frequency: u16,
    pub current_gfxclk: u16,
    pub current_socclk: u16,
    pub current_uclk: u16,
    pub current_vclk0: u16,
    pub current_dclk0: u16,
    pub current_vclk1: u16,
    pub current_dclk1: u16,
    pub throttle_status: u32,
    pub current_fan_speed: u16,
    pub pcie_link_width: u16,
    pub pcie_link_speed: u16,
    pub padding: u16,
    pub gfx_activity_acc: u32,
    pub mem_activity_acc: u32,
    pub temperature_hbm: [u16; RSMI_NUM_HBM_INSTANCES],
    pub firmware_timestamp: u64,
    pub voltage_soc: u16,
    pub voltage_gfx: u16,
    pub voltage_mem: u16,
    pub padding1: u16,
    pub indep_throttle_status: u64,
    pub current_socket_power: u16,
    pub vcn_activity: [u16; RSMI_MAX_NUM_VCN],
    pub jpeg_activity: [u16; RSMI_MAX_NUM_JPEG_ENGS],
    pub gfxclk_lock_status: u32,
    pub xgmi_link_width: u16,
    pub xgmi_link_speed: u16,
    pub pcie_bandwidth_acc: u64,
    pub pcie_bandwidth_inst: u64,
    pub pcie_l0_to_recov_count_acc: u64,
    pub pcie_replay_count_acc: u64,
    pub pcie_replay_rover_count_acc: u64,
    pub pcie_nak_sent_count_acc: u32,
    pub pcie_nak_rcvd_count_acc: u32,
    pub xgmi_read_data_acc: [u64; RSMI_MAX_NUM_XGMI_LINKS],
    pub xgmi_write_data_acc: [u64; RSMI_MAX_NUM_XGMI_LINKS],
    pub current_gfxclks: [u16; RSMI_MAX_NUM_GFX_CLKS],
    pub current_socclks: [u16; RSMI_MAX_NUM_CLKS],
    pub current_vclk0s: [u16; RSMI_MAX_NUM_CLKS],
    pub current_dclk0s: [u16; RSMI_MAX_NUM_CLKS],
}

impl Default for RsmiGpuMetrics {
    fn default() -> Self {
        // Large arrays keep this off the derive path
        unsafe { std::mem::zeroed() }
    }
}

#[cfg(feature = "rocm-smi")]
#[link(name = "rocm_smi64")]
extern "C" {
    pub fn rsmi_init(init_flags: u64) -> u32;
    pub fn rsmi_shut_down() -> u32;
    pub fn rsmi_num_monitor_devices(num_devices: *mut u32) -> u32;

    pub fn rsmi_dev_pci_id_get(dv_ind: u32, bdfid: *mut u64) -> u32;
    pub fn rsmi_dev_market_name_get(dv_ind: u32, name: *mut c_char, len: usize) -> u32;
    pub fn rsmi_dev_name_get(dv_ind: u32, name: *mut c_char, len: usize) -> u32;

    pub fn rsmi_dev_busy_percent_get(dv_ind: u32, busy_percent: *mut u32) -> u32;
    pub fn rsmi_dev_gpu_clk_freq_get(dv_ind: u32, clk_type: u32, frequencies: *mut RsmiFrequencies) -> u32;

    pub fn rsmi_dev_memory_total_get(dv_ind: u32, mem_type: u32, total: *mut u64) -> u32;
    pub fn rsmi_dev_memory_usage_get(dv_ind: u32, mem_type: u32, used: *mut u64) -> u32;
    pub fn rsmi_dev_memory_busy_percent_get(dv_ind: u32, busy_percent: *mut u32) -> u32;

    pub fn rsmi_dev_temp_metric_get(dv_ind: u32, sensor_type: u32, metric: u32, temperature: *mut i64) -> u32;

    pub fn rsmi_dev_fan_speed_get(dv_ind: u32, sensor_ind: u32, speed: *mut i64) -> u32;
    pub fn rsmi_dev_fan_rpms_get(dv_ind: u32, sensor_ind: u32, speed: *mut i64) -> u32;

    pub fn rsmi_dev_power_get(dv_ind: u32, power: *mut u64, power_type: *mut u32) -> u32;
    pub fn rsmi_dev_power_ave_get(dv_ind: u32, sensor_ind: u32, power: *mut u64) -> u32;
    pub fn rsmi_dev_power_cap_get(dv_ind: u32, sensor_ind: u32, cap: *mut u64) -> u32;

    pub fn rsmi_dev_metrics_header_info_get(dv_ind: u32, header: *mut MetricsTableHeader) -> u32;
    pub fn rsmi_dev_gpu_metrics_info_get(dv_ind: u32, metrics: *mut RsmiGpuMetrics) -> u32;
    pub fn rsmi_dev_pci_throughput_get(dv_ind: u32, sent: *mut u64, received: *mut u64, max_pkt_sz: *mut u64) -> u32;
}
