// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod support;

use approx::assert_relative_eq;
use canary_core::clock::{Clock, ManualClock};
use canary_core::metric::{DigitEntry, MetricKind, ProcessJiffies, SnapshotValue};
use canary_core::provider::{StaticDeviceCapabilities, StaticPowerProfile};
use canary_telemetry::{CompositeMonitor, MonitorCore, SamplingScheduler};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use support::{init_logger, ScriptedProvider};

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
}

fn freqs(values: &[i64]) -> SnapshotValue {
    SnapshotValue::Digits(
        values
            .iter()
            .enumerate()
            .map(|(core, &v)| DigitEntry::new(format!("cpu{core}"), v))
            .collect(),
    )
}

fn uid(jiffies: &[u64]) -> SnapshotValue {
    SnapshotValue::UidJiffies(
        jiffies
            .iter()
            .enumerate()
            .map(|(i, &jiffies)| ProcessJiffies {
                pid: 100 + i as u32,
                name: format!("proc-{i}"),
                jiffies,
                threads: Vec::new(),
            })
            .collect(),
    )
}

#[test]
fn test_cpufreq_sampling_counts_histogram() {
    init_logger();

    // --- 1. ARRANGE ---
    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::new(clock.clone()));
    provider.push(MetricKind::CpuFreq, freqs(&[150, 1_000]));
    provider.push(MetricKind::CpuState, SnapshotValue::CpuState(vec![vec![0, 0, 0], vec![0, 0]]));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::CpuFreq, provider.clone())
        .snapshot_provider(MetricKind::CpuState, provider)
        .device_capabilities(Arc::new(StaticDeviceCapabilities::new(vec![
            vec![100, 200, 300],
            vec![400, 800],
        ])))
        .power_profile(Arc::new(StaticPowerProfile::new(vec![0, 1], vec![3, 2])))
        .build();
    let mut session = CompositeMonitor::new(Some(monitor));
    session.metric(MetricKind::ProcessJiffies).sample_with_interval(MetricKind::CpuFreq, 5);

    // --- 2. ACT ---
    session.start();
    assert!(session.is_sampling(MetricKind::CpuFreq));
    wait_until(|| {
        session
            .cpu_freq_histogram()
            .is_some_and(|h| h.counters()[0].iter().sum::<u32>() >= 2)
    });
    session.finish();

    // --- 3. ASSERT ---
    assert!(!session.is_sampling(MetricKind::CpuFreq));
    let result = session
        .sampling_result(MetricKind::CpuFreq)
        .expect("cpufreq was sampled");
    assert_eq!(result.tag, "cpufreq");
    assert_eq!(result.interval_millis, 5);
    assert!(result.count >= 2);
    assert_relative_eq!(result.avg, 1_150.0);
    assert_relative_eq!(result.max, 1_150.0);

    let histogram = session.cpu_freq_histogram().expect("histogram built at start");
    let counted = histogram.counters()[0][1];
    assert!(counted >= 2);
    assert_eq!(histogram.counters()[0], vec![0, counted, 0]);
    // 1 000 is above every step of core 1 and lands in its last bucket.
    assert_eq!(histogram.counters()[1], vec![0, counted]);
    assert_eq!(histogram.last_freqs(), &[150, 1_000]);

    let frozen = session.fork().cpu_freq_histogram();
    assert_eq!(frozen.as_ref(), Some(&histogram));
}

#[test]
fn test_incompatible_profile_skips_counting() {
    init_logger();

    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::new(clock.clone()));
    provider.push(MetricKind::CpuFreq, freqs(&[150]));
    provider.push(MetricKind::CpuState, SnapshotValue::CpuState(vec![vec![0, 0, 0]]));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::CpuFreq, provider.clone())
        .snapshot_provider(MetricKind::CpuState, provider)
        .device_capabilities(Arc::new(StaticDeviceCapabilities::new(vec![vec![100, 200, 300]])))
        .power_profile(Arc::new(StaticPowerProfile::new(vec![0], vec![4])))
        .build();
    let mut session = CompositeMonitor::new(Some(monitor));
    session.sample_with_interval(MetricKind::CpuFreq, 5);

    session.start();
    thread::sleep(Duration::from_millis(30));
    session.finish();

    assert!(session.sampling_result(MetricKind::CpuFreq).unwrap().count >= 1);
    let histogram = session.cpu_freq_histogram().unwrap();
    assert_eq!(histogram.counters(), &[vec![0, 0, 0]]);
}

#[test]
fn test_gauge_sampler_drops_unavailable_readings() {
    init_logger();

    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::new(clock.clone()));
    provider.push(MetricKind::BatteryTemperature, SnapshotValue::Gauge(-1.0));
    provider.push(MetricKind::BatteryTemperature, SnapshotValue::Gauge(36.5));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::BatteryTemperature, provider)
        .build();
    let mut session = CompositeMonitor::new(Some(monitor));
    session.sample_with_interval(MetricKind::BatteryTemperature, 5);

    session.start();
    thread::sleep(Duration::from_millis(40));
    session.finish();

    let result = session.sampling_result(MetricKind::BatteryTemperature).unwrap();
    assert_eq!(result.tag, "batt-temp");
    assert!(result.count >= 1);
    assert_relative_eq!(result.min, 36.5);
    assert_relative_eq!(result.max, 36.5);
    assert_relative_eq!(result.avg, 36.5);
}

#[test]
fn test_thermal_headroom_needs_one_second_interval() {
    init_logger();

    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::new(clock.clone()));
    provider.push(MetricKind::ThermalHeadroom, SnapshotValue::Gauge(0.4));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::ThermalHeadroom, provider)
        .build();

    let mut fast = CompositeMonitor::new(Some(Arc::clone(&monitor)));
    fast.sample_with_interval(MetricKind::ThermalHeadroom, 500);
    fast.start();
    assert!(!fast.is_sampling(MetricKind::ThermalHeadroom));
    fast.finish();
    assert!(fast.sampling_result(MetricKind::ThermalHeadroom).is_none());

    let mut slow = CompositeMonitor::new(Some(monitor));
    slow.sample_with_interval(MetricKind::ThermalHeadroom, 1_000);
    slow.start();
    assert!(slow.is_sampling(MetricKind::ThermalHeadroom));
    slow.finish();
    assert_eq!(
        slow.sampling_result(MetricKind::ThermalHeadroom).map(|r| r.tag.as_str()),
        Some("thermal-headroom")
    );
}

#[test]
fn test_kinds_without_poller_are_not_sampled() {
    init_logger();

    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::new(clock.clone()));
    provider.push(MetricKind::Wifi, SnapshotValue::Digits(vec![DigitEntry::new("scan", 3)]));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::Wifi, provider)
        .build();
    let mut session = CompositeMonitor::new(Some(monitor));
    session.sample(MetricKind::Wifi).sample(MetricKind::BatteryCurrent);

    session.start();
    session.finish();

    assert!(session.sampling_results().is_empty());
}

#[test]
fn test_uid_jiffies_sampler_reads_rate_since_previous_tick() {
    init_logger();

    // --- 1. ARRANGE ---
    // Every snapshot moves the clock 30 s forward.
    let clock = ManualClock::new(0);
    let provider = Arc::new(ScriptedProvider::stepping(clock.clone(), 30_000));
    provider.push(MetricKind::UidJiffies, uid(&[0, 0]));
    provider.push(MetricKind::UidJiffies, uid(&[60, 40]));
    provider.push(MetricKind::UidJiffies, uid(&[120, 80]));

    let scheduler = SamplingScheduler::spawn("test-sampling").unwrap();
    let monitor = MonitorCore::builder(scheduler.handle())
        .clock(Arc::new(clock.clone()))
        .snapshot_provider(MetricKind::UidJiffies, provider)
        .build();

    // --- 2. ACT ---
    let mut first_only = CompositeMonitor::new(Some(Arc::clone(&monitor)));
    first_only.sample_with_interval(MetricKind::UidJiffies, 3_600_000);
    first_only.start();
    wait_until(|| clock.uptime_millis() >= 30_000);
    thread::sleep(Duration::from_millis(50));
    first_only.finish();

    let mut session = CompositeMonitor::new(Some(monitor));
    session.sample_with_interval(MetricKind::UidJiffies, 5);
    session.start();
    // Ticks run one at a time, so a fourth read means three were stored.
    wait_until(|| clock.uptime_millis() >= 5 * 30_000);
    session.finish();

    // --- 3. ASSERT ---
    let first = first_only.sampling_result(MetricKind::UidJiffies).unwrap();
    assert_eq!(first.tag, "uid-jiffies");
    assert_eq!(first.count, 1);
    assert_relative_eq!(first.max, 0.0, epsilon = 1e-9);

    // The first tick of the second sampler has no previous snapshot of its
    // own and reads 0; the next one reads 100 jiffies over 30 s.
    let result = session.sampling_result(MetricKind::UidJiffies).unwrap();
    assert!(result.count >= 3);
    assert_relative_eq!(result.min, 0.0, epsilon = 1e-9);
    assert_relative_eq!(result.max, 200.0);
}
