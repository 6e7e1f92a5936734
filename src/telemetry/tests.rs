use super::*;
use crate::session::SmiSession;
use crate::smi::{Frequencies, MockSmiInterface, PciThroughput, PowerKind, PowerReading, SmiError};

const GIB: u64 = 1024 * 1024 * 1024;

/// Catch-all failure expectations for every query `refresh_dynamic` issues
/// unconditionally.
///
/// Added after the test-specific expectations; mockall matches in FIFO
/// order, so those override these defaults. `memory_busy_percent` and
/// `gpu_metrics` are deliberately left out: they must only be reached
/// through the fallback path and the header gate respectively, and an
/// unexpected call panics the mock.
fn stub_failures(mock: &mut MockSmiInterface) {
    let failed = SmiError::Status(2);
    mock.expect_busy_percent().returning(move |_| Err(failed));
    mock.expect_clock_frequencies().returning(move |_, _| Err(failed));
    mock.expect_memory_total().returning(move |_, _| Err(failed));
    mock.expect_memory_used().returning(move |_, _| Err(failed));
    mock.expect_temperature().returning(move |_, _| Err(failed));
    mock.expect_fan_speed().returning(move |_, _| Err(failed));
    mock.expect_fan_rpm().returning(move |_, _| Err(failed));
    mock.expect_power().returning(move |_| Err(failed));
    mock.expect_average_power().returning(move |_, _| Err(failed));
    mock.expect_power_cap().returning(move |_, _| Err(failed));
    mock.expect_metrics_header_supported().returning(move |_| Err(failed));
    mock.expect_pci_throughput().returning(move |_| Err(failed));
}

fn ready_session(mut mock: MockSmiInterface) -> SmiSession {
    mock.expect_init().returning(|| Ok(()));
    mock.expect_device_count().returning(|| Ok(1));
    let mut session = SmiSession::with_interface(Box::new(mock));
    session.initialize().unwrap();
    session
}

fn refresh_into(
    config: impl FnOnce(&mut MockSmiInterface),
    telemetry: &mut DynamicTelemetry,
) {
    let mut mock = MockSmiInterface::new();
    config(&mut mock);
    stub_failures(&mut mock);
    ready_session(mock).refresh_dynamic(0, telemetry);
}

fn refresh(config: impl FnOnce(&mut MockSmiInterface)) -> DynamicTelemetry {
    let mut telemetry = DynamicTelemetry::default();
    refresh_into(config, &mut telemetry);
    telemetry
}

#[test]
fn test_refresh_requires_initialization() {
    // No expectations at all: any vendor call would panic the mock
    let session = SmiSession::with_interface(Box::new(MockSmiInterface::new()));

    let mut telemetry = DynamicTelemetry::default();
    session.refresh_dynamic(0, &mut telemetry);
    assert_eq!(telemetry, DynamicTelemetry::default());
}

#[test]
fn test_all_queries_failing_leaves_record_empty() {
    let telemetry = refresh(|mock| {
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });
    assert_eq!(telemetry, DynamicTelemetry::default());
}

#[test]
fn test_failing_queries_never_clear_populated_fields() {
    let mut telemetry = DynamicTelemetry::default();
    telemetry.gpu_util_percent = Some(10);
    telemetry.edge_temp_c = Some(61);
    telemetry.fan_rpm = Some(900);

    refresh_into(
        |mock| {
            mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
        },
        &mut telemetry,
    );

    assert_eq!(telemetry.gpu_util_percent, Some(10));
    assert_eq!(telemetry.edge_temp_c, Some(61));
    assert_eq!(telemetry.fan_rpm, Some(900));
}

#[test]
fn test_gpu_utilization_is_copied_directly() {
    let telemetry = refresh(|mock| {
        mock.expect_busy_percent().returning(|_| Ok(73));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });
    assert_eq!(telemetry.gpu_util_percent, Some(73));
}

#[test]
fn test_clock_speeds_from_frequency_table() {
    let telemetry = refresh(|mock| {
        mock.expect_clock_frequencies().returning(|_, domain| match domain {
            ClockDomain::System => Ok(Frequencies {
                supported: vec![500_000_000, 1_630_000_000, 1_100_000_000],
                current: 2,
            }),
            ClockDomain::Memory => Ok(Frequencies {
                supported: vec![96_000_000, 1_000_000_000],
                current: 1,
            }),
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.gpu_clock_mhz, Some(1100));
    assert_eq!(telemetry.gpu_clock_max_mhz, Some(1630));
    assert_eq!(telemetry.mem_clock_mhz, Some(1000));
    assert_eq!(telemetry.mem_clock_max_mhz, Some(1000));
}

#[test]
fn test_empty_frequency_table_counts_as_failure() {
    let telemetry = refresh(|mock| {
        mock.expect_clock_frequencies()
            .returning(|_, _| Ok(Frequencies { supported: vec![], current: 0 }));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.gpu_clock_mhz, None);
    assert_eq!(telemetry.gpu_clock_max_mhz, None);
}

#[test]
fn test_out_of_range_current_index_only_drops_the_current_value() {
    let telemetry = refresh(|mock| {
        mock.expect_clock_frequencies().returning(|_, domain| match domain {
            ClockDomain::System => Ok(Frequencies {
                supported: vec![800_000_000, 1_500_000_000],
                current: 7,
            }),
            ClockDomain::Memory => Err(SmiError::Status(2)),
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.gpu_clock_mhz, None);
    assert_eq!(telemetry.gpu_clock_max_mhz, Some(1500));
}

#[test]
fn test_zero_clock_entry_is_not_reported() {
    let telemetry = refresh(|mock| {
        mock.expect_clock_frequencies().returning(|_, domain| match domain {
            // Current entry is 0 Hz: zero is not a physically meaningful clock
            ClockDomain::System => Ok(Frequencies {
                supported: vec![0, 1_500_000_000],
                current: 0,
            }),
            ClockDomain::Memory => Err(SmiError::Status(2)),
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.gpu_clock_mhz, None);
    assert_eq!(telemetry.gpu_clock_max_mhz, Some(1500));
}

#[test]
fn test_memory_utilization_derived_from_total_and_used() {
    // 8192 MiB total, 4096 MiB used; the busy-percent fallback must never be
    // queried (the mock has no expectation for it and would panic)
    let telemetry = refresh(|mock| {
        mock.expect_memory_total().returning(|_, _| Ok(8 * GIB));
        mock.expect_memory_used().returning(|_, _| Ok(4 * GIB));
    });

    assert_eq!(telemetry.total_memory_bytes, Some(8 * GIB));
    assert_eq!(telemetry.used_memory_bytes, Some(4 * GIB));
    assert_eq!(telemetry.free_memory_bytes, Some(4 * GIB));
    assert_eq!(telemetry.mem_util_percent, Some(50));
}

#[test]
fn test_memory_utilization_truncates() {
    let telemetry = refresh(|mock| {
        mock.expect_memory_total().returning(|_, _| Ok(3000));
        mock.expect_memory_used().returning(|_, _| Ok(1999));
    });

    // 1999 * 100 / 3000 = 66.63..., truncating integer arithmetic
    assert_eq!(telemetry.mem_util_percent, Some(66));
    assert_eq!(telemetry.free_memory_bytes, Some(1001));
}

#[test]
fn test_zero_total_memory_uses_the_busy_percent_fallback() {
    let telemetry = refresh(|mock| {
        mock.expect_memory_total().returning(|_, _| Ok(0));
        mock.expect_memory_used().returning(|_, _| Ok(0));
        mock.expect_memory_busy_percent().returning(|_| Ok(55));
    });

    // No division by a zero total; the derived fields stay unset
    assert_eq!(telemetry.free_memory_bytes, None);
    assert_eq!(telemetry.mem_util_percent, Some(55));
}

#[test]
fn test_failed_total_memory_query_uses_the_busy_percent_fallback() {
    let telemetry = refresh(|mock| {
        mock.expect_memory_used().returning(|_, _| Ok(2 * GIB));
        mock.expect_memory_busy_percent().returning(|_| Ok(42));
    });

    assert_eq!(telemetry.total_memory_bytes, None);
    assert_eq!(telemetry.used_memory_bytes, Some(2 * GIB));
    assert_eq!(telemetry.free_memory_bytes, None);
    assert_eq!(telemetry.mem_util_percent, Some(42));
}

#[test]
fn test_failed_fallback_leaves_memory_utilization_unset() {
    let telemetry = refresh(|mock| {
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });
    assert_eq!(telemetry.mem_util_percent, None);
}

#[test]
fn test_temperatures_convert_millidegrees_to_whole_degrees() {
    let telemetry = refresh(|mock| {
        mock.expect_temperature().returning(|_, sensor| match sensor {
            TemperatureSensor::Edge => Ok(45231),
            TemperatureSensor::Junction => Ok(52999),
            TemperatureSensor::Memory => Err(SmiError::Status(2)),
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.edge_temp_c, Some(45));
    assert_eq!(telemetry.junction_temp_c, Some(52));
    // A missing sensor on this generation leaves only its own field unset
    assert_eq!(telemetry.memory_temp_c, None);
}

#[test]
fn test_fan_speed_is_normalized_to_percent() {
    let telemetry = refresh(|mock| {
        mock.expect_fan_speed().returning(|_, _| Ok(128));
        mock.expect_fan_rpm().returning(|_, _| Ok(1530));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    // 128 * 100 / 255
    assert_eq!(telemetry.fan_speed_percent, Some(50));
    assert_eq!(telemetry.fan_rpm, Some(1530));
}

#[test]
fn test_negative_fan_readings_are_skipped() {
    let telemetry = refresh(|mock| {
        mock.expect_fan_speed().returning(|_, _| Ok(-1));
        mock.expect_fan_rpm().returning(|_, _| Ok(-1));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.fan_speed_percent, None);
    assert_eq!(telemetry.fan_rpm, None);
}

#[test]
fn test_instantaneous_power_is_preferred_over_average() {
    let telemetry = refresh(|mock| {
        mock.expect_power()
            .returning(|_| Ok(PowerReading { milliwatts: 183_456, kind: PowerKind::Current }));
        // Present but must lose to the instantaneous reading
        mock.expect_average_power().returning(|_, _| Ok(999_000));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.power_draw_watts, Some(183));
}

#[test]
fn test_average_power_is_used_when_instantaneous_fails() {
    let telemetry = refresh(|mock| {
        mock.expect_power().returning(|_| Err(SmiError::Status(2)));
        mock.expect_average_power().returning(|_, _| Ok(145_999));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.power_draw_watts, Some(145));
}

#[test]
fn test_power_cap_converts_milliwatts_to_watts() {
    let telemetry = refresh(|mock| {
        mock.expect_power_cap().returning(|_, _| Ok(272_000));
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.power_cap_watts, Some(272));
}

#[test]
fn test_pcie_link_width_and_generation() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: 16,
                // 16.0 GT/s
                pcie_link_speed: 160,
                pcie_bandwidth_inst: constants::PCIE_BANDWIDTH_UNSUPPORTED,
            })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.pcie_link_width, Some(16));
    assert_eq!(telemetry.pcie_link_gen, Some(4));
    assert_eq!(telemetry.pcie_rx_kib, None);
    assert_eq!(telemetry.pcie_tx_kib, None);
}

#[test]
fn test_pcie_sentinel_fields_are_skipped() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: constants::PCIE_FIELD_UNSUPPORTED,
                pcie_link_speed: 0,
                pcie_bandwidth_inst: constants::PCIE_BANDWIDTH_UNSUPPORTED,
            })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.pcie_link_width, None);
    assert_eq!(telemetry.pcie_link_gen, None);
}

#[test]
fn test_unknown_link_speed_sets_no_generation() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: 8,
                // 7.0 GT/s maps to no generation
                pcie_link_speed: 70,
                pcie_bandwidth_inst: constants::PCIE_BANDWIDTH_UNSUPPORTED,
            })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.pcie_link_width, Some(8));
    assert_eq!(telemetry.pcie_link_gen, None);
}

#[test]
fn test_metrics_block_requires_the_header_gate() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Err(SmiError::Status(8)));
        // gpu_metrics has no expectation: reaching it without the header
        // check would panic the mock
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.pcie_link_width, None);
}

#[test]
fn test_bandwidth_estimate_is_split_and_tagged() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: 0,
                pcie_link_speed: 0,
                pcie_bandwidth_inst: 2,
            })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    // 2 / 8 * 1024 = 256 KiB, split evenly
    assert_eq!(telemetry.pcie_rx_kib, Some(128));
    assert_eq!(telemetry.pcie_tx_kib, Some(128));
    assert_eq!(telemetry.pcie_throughput_source, Some(ThroughputSource::EstimatedUndirected));
}

#[test]
fn test_bandwidth_estimate_skipped_when_throughput_already_known() {
    let mut telemetry = DynamicTelemetry::default();
    telemetry.pcie_rx_kib = Some(7);
    telemetry.pcie_tx_kib = Some(9);

    refresh_into(
        |mock| {
            mock.expect_metrics_header_supported().returning(|_| Ok(()));
            mock.expect_gpu_metrics().returning(|_| {
                Ok(GpuMetricsBlock {
                    pcie_link_width: 0,
                    pcie_link_speed: 0,
                    pcie_bandwidth_inst: 2,
                })
            });
            mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
        },
        &mut telemetry,
    );

    assert_eq!(telemetry.pcie_rx_kib, Some(7));
    assert_eq!(telemetry.pcie_tx_kib, Some(9));
    assert_eq!(telemetry.pcie_throughput_source, None);
}

#[test]
fn test_counter_throughput_overrides_the_estimate() {
    let telemetry = refresh(|mock| {
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: 0,
                pcie_link_speed: 0,
                pcie_bandwidth_inst: 2,
            })
        });
        mock.expect_pci_throughput().returning(|_| {
            Ok(PciThroughput { sent_packets: 2048, received_packets: 4096, max_packet_size: 256 })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    // 2048 * 256 / 1024 and 4096 * 256 / 1024, not the 50/50 estimate
    assert_eq!(telemetry.pcie_tx_kib, Some(512));
    assert_eq!(telemetry.pcie_rx_kib, Some(1024));
    assert_eq!(telemetry.pcie_throughput_source, Some(ThroughputSource::CounterDerived));
}

#[test]
fn test_counter_throughput_without_payload_size_uses_packet_counts() {
    let telemetry = refresh(|mock| {
        mock.expect_pci_throughput().returning(|_| {
            Ok(PciThroughput { sent_packets: 4096, received_packets: 8192, max_packet_size: 0 })
        });
        mock.expect_memory_busy_percent().returning(|_| Err(SmiError::Status(2)));
    });

    assert_eq!(telemetry.pcie_tx_kib, Some(4));
    assert_eq!(telemetry.pcie_rx_kib, Some(8));
}

#[test]
fn test_split_undirected_kib_halves_sum_to_the_rounded_total() {
    // round(101 / 2) = 51, remainder 50
    assert_eq!(split_undirected_kib(101.0), (51, 50));
    assert_eq!(split_undirected_kib(100.0), (50, 50));
    assert_eq!(split_undirected_kib(0.0), (0, 0));

    for total in [0.5, 1.0, 7.3, 101.0, 4095.6] {
        let (half, rest) = split_undirected_kib(total);
        assert_eq!(half + rest, total.round() as u32, "total {total}");
    }
}

#[test]
fn test_pcie_generation_lookup() {
    assert_eq!(pcie_generation_for_speed(3), Some(1));
    assert_eq!(pcie_generation_for_speed(5), Some(2));
    assert_eq!(pcie_generation_for_speed(8), Some(3));
    assert_eq!(pcie_generation_for_speed(16), Some(4));
    assert_eq!(pcie_generation_for_speed(32), Some(5));
    assert_eq!(pcie_generation_for_speed(64), Some(6));
    assert_eq!(pcie_generation_for_speed(7), None);
    assert_eq!(pcie_generation_for_speed(0), None);
}

#[test]
fn test_full_refresh_populates_every_field() {
    let telemetry = refresh(|mock| {
        mock.expect_busy_percent().returning(|_| Ok(88));
        mock.expect_clock_frequencies().returning(|_, domain| match domain {
            ClockDomain::System => Ok(Frequencies {
                supported: vec![500_000_000, 2_400_000_000],
                current: 1,
            }),
            ClockDomain::Memory => Ok(Frequencies {
                supported: vec![96_000_000, 1_250_000_000],
                current: 1,
            }),
        });
        mock.expect_memory_total().returning(|_, _| Ok(16 * GIB));
        mock.expect_memory_used().returning(|_, _| Ok(12 * GIB));
        mock.expect_temperature().returning(|_, sensor| match sensor {
            TemperatureSensor::Edge => Ok(64_000),
            TemperatureSensor::Junction => Ok(79_500),
            TemperatureSensor::Memory => Ok(70_250),
        });
        mock.expect_fan_speed().returning(|_, _| Ok(255));
        mock.expect_fan_rpm().returning(|_, _| Ok(3300));
        mock.expect_power()
            .returning(|_| Ok(PowerReading { milliwatts: 284_000, kind: PowerKind::Current }));
        mock.expect_power_cap().returning(|_, _| Ok(300_000));
        mock.expect_metrics_header_supported().returning(|_| Ok(()));
        mock.expect_gpu_metrics().returning(|_| {
            Ok(GpuMetricsBlock {
                pcie_link_width: 16,
                pcie_link_speed: 320,
                pcie_bandwidth_inst: constants::PCIE_BANDWIDTH_UNSUPPORTED,
            })
        });
        mock.expect_pci_throughput().returning(|_| {
            Ok(PciThroughput { sent_packets: 1024, received_packets: 2048, max_packet_size: 128 })
        });
    });

    assert_eq!(telemetry.gpu_util_percent, Some(88));
    assert_eq!(telemetry.gpu_clock_mhz, Some(2400));
    assert_eq!(telemetry.gpu_clock_max_mhz, Some(2400));
    assert_eq!(telemetry.mem_clock_mhz, Some(1250));
    assert_eq!(telemetry.mem_clock_max_mhz, Some(1250));
    assert_eq!(telemetry.total_memory_bytes, Some(16 * GIB));
    assert_eq!(telemetry.used_memory_bytes, Some(12 * GIB));
    assert_eq!(telemetry.free_memory_bytes, Some(4 * GIB));
    assert_eq!(telemetry.mem_util_percent, Some(75));
    assert_eq!(telemetry.edge_temp_c, Some(64));
    assert_eq!(telemetry.junction_temp_c, Some(79));
    assert_eq!(telemetry.memory_temp_c, Some(70));
    assert_eq!(telemetry.fan_speed_percent, Some(100));
    assert_eq!(telemetry.fan_rpm, Some(3300));
    assert_eq!(telemetry.power_draw_watts, Some(284));
    assert_eq!(telemetry.power_cap_watts, Some(300));
    assert_eq!(telemetry.pcie_link_width, Some(16));
    assert_eq!(telemetry.pcie_link_gen, Some(5));
    assert_eq!(telemetry.pcie_tx_kib, Some(128));
    assert_eq!(telemetry.pcie_rx_kib, Some(256));
    assert_eq!(telemetry.pcie_throughput_source, Some(ThroughputSource::CounterDerived));
}
