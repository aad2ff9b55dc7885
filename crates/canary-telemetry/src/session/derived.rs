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

//! Derived figures: CPU load, jiffies per minute, and overheat checks.

use super::CompositeMonitor;
use canary_core::app_stats::AppStats;
use canary_core::error::{MonitorError, MonitorResult};
use canary_core::metric::{Delta, MetricKind, ONE_MIN_MILLIS};
use std::sync::Arc;

/// Decides whether a delta of a given kind counts as overheat.
pub type OverheatRule = Arc<dyn Fn(&Delta, &AppStats) -> bool + Send + Sync>;

/// Jiffies per minute over a window of `millis`.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidArgument`] when `millis` is not positive.
pub fn compute_avg_jiffies(jiffies: i64, millis: i64) -> MonitorResult<i64> {
    if millis <= 0 {
        return Err(MonitorError::InvalidArgument(format!(
            "window must be positive, got {millis} ms"
        )));
    }
    let minutes = millis as f64 / ONE_MIN_MILLIS as f64;
    Ok((jiffies as f64 / minutes) as i64)
}

impl CompositeMonitor {
    /// Installs `rule` as the overheat check of `kind`.
    ///
    /// Process jiffies always use the built-in threshold check.
    pub fn with_overheat_rule(mut self, kind: MetricKind, rule: OverheatRule) -> Self {
        self.overheat_rules.insert(kind, rule);
        self
    }

    /// Jiffies per minute over the finished window, `-1` before `finish`
    /// or over an empty window.
    pub fn avg_jiffies(&self, jiffies: u64) -> i64 {
        let Some(stats) = self.app_stats else {
            log::warn!("{} avg jiffies before finish", self.id);
            return -1;
        };
        compute_avg_jiffies(jiffies as i64, stats.during_millis as i64).unwrap_or(-1)
    }

    /// Application CPU load over the window, in percent of one core, or `-1`.
    ///
    /// Uses uid jiffies when measured, process jiffies otherwise.
    pub fn cpu_load(&self) -> i32 {
        let Some(stats) = self.app_stats else {
            log::warn!("{} cpu load before finish", self.id);
            return -1;
        };
        let jiffies = self
            .deltas
            .get(&MetricKind::UidJiffies)
            .or_else(|| self.deltas.get(&MetricKind::ProcessJiffies))
            .and_then(Delta::total_jiffies);
        let Some(jiffies) = jiffies else {
            log::warn!("{} cpu load without jiffies delta", self.id);
            return -1;
        };

        if stats.during_millis == 0 {
            return 0;
        }
        let load = jiffies as f64 * 10.0 / stats.during_millis as f64;
        (load * 100.0).round() as i32
    }

    /// CPU load scaled by the average sampled frequency over the device's
    /// summed maximum frequencies, or `-1`.
    pub fn normalized_cpu_load(&self) -> i32 {
        let cpu_load = self.cpu_load();
        if cpu_load == -1 {
            log::warn!("{} cpu load invalid", self.id);
            return -1;
        }
        let Some(freq) = self.sample_results.get(&MetricKind::CpuFreq) else {
            log::warn!("{} cpufreq not sampled", self.id);
            return -1;
        };
        let Some(device) = self.monitor.as_ref().and_then(|m| m.device_capabilities()) else {
            log::warn!("{} device capabilities unknown", self.id);
            return -1;
        };

        let steps = device.cpu_freq_steps();
        if steps.len() != device.cpu_core_num() {
            log::warn!(
                "{} {} step tables for {} cores",
                self.id,
                steps.len(),
                device.cpu_core_num()
            );
        }
        let sum_max: u64 = steps
            .iter()
            .map(|s| u64::from(s.iter().copied().max().unwrap_or(0)))
            .sum();
        if sum_max == 0 {
            log::warn!("{} no max cpu frequency", self.id);
            return -1;
        }
        if freq.avg > sum_max as f64 {
            log::warn!("{} avg cpufreq {} over max sum {}", self.id, freq.avg, sum_max);
            for (core, s) in steps.iter().enumerate() {
                log::warn!("{} cpu{} steps {:?}", self.id, core, s);
            }
        }
        (cpu_load as f64 * freq.avg / sum_max as f64) as i32
    }

    /// Device CPU-state jiffies over the window, scaled like
    /// [`cpu_load`](Self::cpu_load), or `-1`.
    pub fn dev_cpu_load(&self) -> i32 {
        let Some(stats) = self.app_stats else {
            log::warn!("{} dev cpu load before finish", self.id);
            return -1;
        };
        let Some(jiffies) = self
            .deltas
            .get(&MetricKind::CpuState)
            .and_then(Delta::total_cpu_jiffies)
        else {
            log::warn!("{} dev cpu load without cpu state delta", self.id);
            return -1;
        };
        if stats.during_millis == 0 {
            return 0;
        }
        let load = jiffies as f64 * 10.0 / stats.during_millis as f64;
        (load * 100.0) as i32
    }

    /// Whether the delta of `kind` exceeds its overheat threshold.
    ///
    /// Process jiffies overheat when the window spans at least the configured
    /// minutes and averages at least the configured jiffies per minute. Other
    /// kinds use their installed rule and never overheat without one.
    pub fn is_over_heat(&self, kind: MetricKind) -> bool {
        let (Some(stats), Some(delta)) = (self.app_stats, self.deltas.get(&kind)) else {
            return false;
        };
        if kind == MetricKind::ProcessJiffies {
            let Some(jiffies) = delta.total_jiffies() else {
                return false;
            };
            let minute = stats.minutes();
            let avg = jiffies / minute;
            return minute >= self.config.overheat_min_minutes && avg >= self.config.overheat_avg_jiffies;
        }
        self.overheat_rules
            .get(&kind)
            .is_some_and(|rule| rule(delta, &stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MonitorCore, SamplingScheduler};
    use canary_core::app_stats::{AppState, DeviceState};
    use canary_core::metric::{ProcessJiffies, SnapshotValue};
    use canary_core::provider::StaticDeviceCapabilities;
    use canary_core::sampling::SamplingResult;

    fn finished(during_millis: u64, process_jiffies: u64) -> CompositeMonitor {
        let mut session = CompositeMonitor::new(None);
        session.put_delta(
            MetricKind::ProcessJiffies,
            Delta::new(
                MetricKind::ProcessJiffies,
                0,
                during_millis,
                SnapshotValue::ProcessJiffies(ProcessJiffies {
                    pid: 1,
                    name: "app".to_string(),
                    jiffies: process_jiffies,
                    threads: Vec::new(),
                }),
            ),
        );
        session.app_stats = Some(AppStats::new(during_millis, AppState::Background, DeviceState::Unplugged));
        session
    }

    #[test]
    fn test_compute_avg_jiffies() {
        assert_eq!(compute_avg_jiffies(120, 60_000).unwrap(), 120);
        assert_eq!(compute_avg_jiffies(120, 120_000).unwrap(), 60);
        assert_eq!(compute_avg_jiffies(30, 30_000).unwrap(), 60);
    }

    #[test]
    fn test_compute_avg_jiffies_rejects_empty_window() {
        assert!(matches!(compute_avg_jiffies(10, 0), Err(MonitorError::InvalidArgument(_))));
        assert!(matches!(compute_avg_jiffies(10, -1), Err(MonitorError::InvalidArgument(_))));
    }

    #[test]
    fn test_cpu_load() {
        assert_eq!(finished(10_000, 50).cpu_load(), 5);
        assert_eq!(finished(60_000, 6_000).cpu_load(), 100);
    }

    #[test]
    fn test_cpu_load_before_finish() {
        let mut session = finished(10_000, 50);
        session.app_stats = None;
        assert_eq!(session.cpu_load(), -1);
        assert_eq!(session.dev_cpu_load(), -1);
        assert_eq!(session.avg_jiffies(10), -1);
    }

    #[test]
    fn test_normalized_cpu_load_requires_cpufreq() {
        assert_eq!(finished(10_000, 50).normalized_cpu_load(), -1);
    }

    #[test]
    fn test_overheat_thresholds() {
        assert!(finished(5 * ONE_MIN_MILLIS, 5 * 1_000).is_over_heat(MetricKind::ProcessJiffies));
        assert!(!finished(5 * ONE_MIN_MILLIS, 5 * 999).is_over_heat(MetricKind::ProcessJiffies));
        assert!(!finished(4 * ONE_MIN_MILLIS, 4 * 5_000).is_over_heat(MetricKind::ProcessJiffies));
    }

    #[test]
    fn test_overheat_defaults_to_false_without_rule() {
        let mut session = finished(5 * ONE_MIN_MILLIS, 0);
        session.put_delta(
            MetricKind::BatteryTemperature,
            Delta::new(MetricKind::BatteryTemperature, 0, 1, SnapshotValue::Gauge(80.0)),
        );
        assert!(!session.is_over_heat(MetricKind::BatteryTemperature));
        assert!(!session.is_over_heat(MetricKind::Wifi));

        let session = session.with_overheat_rule(
            MetricKind::BatteryTemperature,
            Arc::new(|delta: &Delta, _: &AppStats| delta.value.as_gauge().is_some_and(|t| t >= 45.0)),
        );
        assert!(session.is_over_heat(MetricKind::BatteryTemperature));
    }

    #[test]
    fn test_dev_cpu_load() {
        let mut session = finished(10_000, 25);
        assert_eq!(session.dev_cpu_load(), -1);
        session.put_delta(
            MetricKind::CpuState,
            Delta::new(MetricKind::CpuState, 0, 10_000, SnapshotValue::CpuState(vec![vec![300, 100], vec![100]])),
        );
        assert_eq!(session.dev_cpu_load(), 50);
        assert_eq!(session.avg_jiffies(1_000), 6_000);
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
    fn test_cpu_load_prefers_uid_jiffies() {
        let mut session = finished(10_000, 50);
        session.put_delta(
            MetricKind::UidJiffies,
            Delta::new(MetricKind::UidJiffies, 0, 10_000, uid(&[600, 400])),
        );
        assert_eq!(session.cpu_load(), 100);
    }

    #[test]
    fn test_normalized_cpu_load() {
        let scheduler = SamplingScheduler::spawn("test-derived").unwrap();
        let monitor = MonitorCore::builder(scheduler.handle())
            .device_capabilities(Arc::new(StaticDeviceCapabilities::new(vec![
                vec![100, 200],
                vec![300, 400],
            ])))
            .build();

        let mut session = finished(10_000, 500);
        session.monitor = Some(monitor);
        assert_eq!(session.cpu_load(), 50);

        let mut freq = SamplingResult::new("cpufreq", 1_000);
        freq.avg = 300.0;
        session.sample_results.insert(MetricKind::CpuFreq, freq.clone());
        // 50 * 300 / (200 + 400)
        assert_eq!(session.normalized_cpu_load(), 25);

        // An average over the summed maxima is reported, not rejected.
        freq.avg = 900.0;
        session.sample_results.insert(MetricKind::CpuFreq, freq);
        assert_eq!(session.normalized_cpu_load(), 75);
    }
}
