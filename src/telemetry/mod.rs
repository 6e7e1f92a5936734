//! Dynamic telemetry translation
//!
//! One [`refresh_dynamic`](SmiSession::refresh_dynamic) call issues the full
//! set of vendor queries for a device and writes each successfully obtained
//! value into a caller-owned [`DynamicTelemetry`] record. The translator is
//! stateless per call and tolerates every per-metric failure independently:
//! a GPU generation lacking a junction-temperature sensor must not prevent
//! edge temperature or utilization from being reported.
//!
//! Where two sources exist for one logical metric, they are applied in a
//! fixed priority order: the derived total/used memory utilization beats the
//! device's memory-busy reading, and packet-counter PCIe throughput beats
//! the SMU's undirected bandwidth estimate.

pub mod constants;
mod types;

#[cfg(test)]
mod tests;

pub use self::types::{DynamicTelemetry, ThroughputSource};

use crate::device::DeviceIndex;
use crate::session::SmiSession;
use crate::smi::{
    ClockDomain, GpuMetricsBlock, MemoryPool, SmiInterface, TemperatureSensor, RSMI_MAX_FAN_SPEED,
};
use self::constants::*;

impl SmiSession {
    /// Populates as many fields of `telemetry` as are determinable for the
    /// device at `index`.
    ///
    /// Never fails as a whole: absence of data is expressed solely through
    /// unset fields. Returns immediately when the session is not initialized.
    pub fn refresh_dynamic(&self, index: DeviceIndex, telemetry: &mut DynamicTelemetry) {
        if !self.is_available() {
            return;
        }
        let smi = self.interface();

        if let Ok(busy) = smi.busy_percent(index) {
            telemetry.gpu_util_percent = Some(busy);
        }

        let (current, max) = clock_speeds_mhz(smi, index, ClockDomain::System);
        if let Some(mhz) = current {
            telemetry.gpu_clock_mhz = Some(mhz);
        }
        if let Some(mhz) = max {
            telemetry.gpu_clock_max_mhz = Some(mhz);
        }

        let (current, max) = clock_speeds_mhz(smi, index, ClockDomain::Memory);
        if let Some(mhz) = current {
            telemetry.mem_clock_mhz = Some(mhz);
        }
        if let Some(mhz) = max {
            telemetry.mem_clock_max_mhz = Some(mhz);
        }

        if let Ok(total) = smi.memory_total(index, MemoryPool::Vram) {
            telemetry.total_memory_bytes = Some(total);
        }
        if let Ok(used) = smi.memory_used(index, MemoryPool::Vram) {
            telemetry.used_memory_bytes = Some(used);
        }

        match (telemetry.total_memory_bytes, telemetry.used_memory_bytes) {
            (Some(total), Some(used)) if total > 0 => {
                telemetry.free_memory_bytes = Some(total.saturating_sub(used));
                telemetry.mem_util_percent = Some((used * 100 / total) as u32);
            }
            // The derived path produced nothing; fall back to the device's
            // own memory-busy reading
            _ => {
                if let Ok(busy) = smi.memory_busy_percent(index) {
                    telemetry.mem_util_percent = Some(busy);
                }
            }
        }

        if let Ok(millidegrees) = smi.temperature(index, TemperatureSensor::Edge) {
            telemetry.edge_temp_c = Some((millidegrees / MILLIDEGREES_PER_DEGREE) as i32);
        }
        if let Ok(millidegrees) = smi.temperature(index, TemperatureSensor::Junction) {
            telemetry.junction_temp_c = Some((millidegrees / MILLIDEGREES_PER_DEGREE) as i32);
        }
        if let Ok(millidegrees) = smi.temperature(index, TemperatureSensor::Memory) {
            telemetry.memory_temp_c = Some((millidegrees / MILLIDEGREES_PER_DEGREE) as i32);
        }

        if let Ok(raw) = smi.fan_speed(index, 0) {
            if raw >= 0 {
                telemetry.fan_speed_percent = Some((raw * 100 / RSMI_MAX_FAN_SPEED) as u32);
            }
        }
        if let Ok(rpm) = smi.fan_rpm(index, 0) {
            if rpm >= 0 {
                telemetry.fan_rpm = Some(rpm as u32);
            }
        }

        match smi.power(index) {
            Ok(reading) => {
                telemetry.power_draw_watts = Some((reading.milliwatts / MILLIWATTS_PER_WATT) as u32);
            }
            // The instantaneous query is not implemented on all generations
            Err(_) => {
                if let Ok(milliwatts) = smi.average_power(index, 0) {
                    telemetry.power_draw_watts = Some((milliwatts / MILLIWATTS_PER_WATT) as u32);
                }
            }
        }
        if let Ok(milliwatts) = smi.power_cap(index, 0) {
            telemetry.power_cap_watts = Some((milliwatts / MILLIWATTS_PER_WATT) as u32);
        }

        if smi.metrics_header_supported(index).is_ok() {
            if let Ok(metrics) = smi.gpu_metrics(index) {
                apply_pcie_link_info(&metrics, telemetry);
                apply_pcie_bandwidth_estimate(&metrics, telemetry);
            }
        }

        // Applied last: counter-derived throughput overrides the estimate
        apply_pcie_counter_throughput(smi, index, telemetry);
    }
}

/// Current and maximum clock speed for one domain, in MHz.
///
/// An empty supported-frequency table counts as a query failure. Either
/// sub-value is reported only when it resolves to a positive MHz figure.
fn clock_speeds_mhz(
    smi: &dyn SmiInterface,
    index: DeviceIndex,
    domain: ClockDomain,
) -> (Option<u32>, Option<u32>) {
    let Ok(table) = smi.clock_frequencies(index, domain) else {
        return (None, None);
    };
    if table.supported.is_empty() {
        return (None, None);
    }

    let positive_mhz = |hz: u64| u32::try_from(hz / HZ_PER_MHZ).ok().filter(|&mhz| mhz > 0);
    let max = table.supported.iter().copied().max().and_then(positive_mhz);
    let current = table.supported.get(table.current).copied().and_then(positive_mhz);

    (current, max)
}

/// Maps a rounded link speed in GT/s to a PCIe generation
fn pcie_generation_for_speed(gt_per_sec: u32) -> Option<u32> {
    match gt_per_sec {
        // 2.5 GT/s rounds up to 3
        3 => Some(1),
        5 => Some(2),
        8 => Some(3),
        16 => Some(4),
        32 => Some(5),
        64 => Some(6),
        _ => None,
    }
}

fn apply_pcie_link_info(metrics: &GpuMetricsBlock, telemetry: &mut DynamicTelemetry) {
    if metrics.pcie_link_width > 0 && metrics.pcie_link_width != PCIE_FIELD_UNSUPPORTED {
        telemetry.pcie_link_width = Some(u32::from(metrics.pcie_link_width));
    }

    if metrics.pcie_link_speed > 0 && metrics.pcie_link_speed != PCIE_FIELD_UNSUPPORTED {
        // Reported in units of 0.1 GT/s; round to the nearest whole GT/s
        let gt_per_sec = (u32::from(metrics.pcie_link_speed) + 5) / 10;
        if let Some(generation) = pcie_generation_for_speed(gt_per_sec) {
            telemetry.pcie_link_gen = Some(generation);
        }
    }
}

/// Splits an undirected KiB/s total into two halves that always sum back to
/// the rounded total, odd counts included.
fn split_undirected_kib(total_kib: f64) -> (u32, u32) {
    let half = (total_kib / 2.0).round() as u32;
    let rest = total_kib.round() as u32 - half;
    (half, rest)
}

/// Coarse throughput estimate from the SMU's aggregate instantaneous
/// bandwidth figure. There is no directionality data, so the total is split
/// 50/50 and tagged [`ThroughputSource::EstimatedUndirected`]. Used only
/// when neither RX nor TX is already populated.
fn apply_pcie_bandwidth_estimate(metrics: &GpuMetricsBlock, telemetry: &mut DynamicTelemetry) {
    if telemetry.pcie_rx_kib.is_some() || telemetry.pcie_tx_kib.is_some() {
        return;
    }
    if metrics.pcie_bandwidth_inst == PCIE_BANDWIDTH_UNSUPPORTED {
        return;
    }

    let total_kib = metrics.pcie_bandwidth_inst as f64 / 8.0 * 1024.0;
    let (rx, tx) = split_undirected_kib(total_kib);
    telemetry.pcie_rx_kib = Some(rx);
    telemetry.pcie_tx_kib = Some(tx);
    telemetry.pcie_throughput_source = Some(ThroughputSource::EstimatedUndirected);
}

/// Packet-counter-derived throughput. Higher fidelity than the SMU estimate,
/// so it always overrides it when the query succeeds.
fn apply_pcie_counter_throughput(
    smi: &dyn SmiInterface,
    index: DeviceIndex,
    telemetry: &mut DynamicTelemetry,
) {
    let Ok(counters) = smi.pci_throughput(index) else {
        return;
    };

    let mut sent_bytes = counters.sent_packets;
    let mut received_bytes = counters.received_packets;
    if counters.max_packet_size > 0 {
        sent_bytes = sent_bytes.saturating_mul(counters.max_packet_size);
        received_bytes = received_bytes.saturating_mul(counters.max_packet_size);
    }

    telemetry.pcie_tx_kib = Some((sent_bytes / BYTES_PER_KIB) as u32);
    telemetry.pcie_rx_kib = Some((received_bytes / BYTES_PER_KIB) as u32);
    telemetry.pcie_throughput_source = Some(ThroughputSource::CounterDerived);
}
