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

//! Per-kind sampler construction and the sampling phase of the lifecycle.

use super::{compute_avg_jiffies, lock_histogram, CompositeMonitor};
use crate::freq_histogram::CpuFreqHistogram;
use crate::monitor::MonitorCore;
use crate::sampling::{ReadFn, Sampler, SamplerTick};
use canary_core::metric::{MetricKind, Snapshot};
use canary_core::provider::SnapshotProvider;
use canary_core::sampling::{Reading, SamplingResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Gauge readings of `-1` mean "not available right now".
const GAUGE_UNAVAILABLE: f64 = -1.0;

impl CompositeMonitor {
    /// Registers a sampler for `kind` at the configured default interval.
    pub fn sample(&mut self, kind: MetricKind) -> &mut Self {
        let interval = self.config.default_sample_interval_millis;
        self.sample_with_interval(kind, interval)
    }

    /// Registers a sampler for `kind` polling every `interval_millis`.
    ///
    /// Registering the same kind again replaces its interval. The sampler
    /// is built and started on the next `start`.
    pub fn sample_with_interval(&mut self, kind: MetricKind, interval_millis: u64) -> &mut Self {
        self.sample_regs.insert(kind, interval_millis);
        self
    }

    /// The registered sampler intervals.
    pub fn sample_registrations(&self) -> &HashMap<MetricKind, u64> {
        &self.sample_regs
    }

    /// The statistics of the sampler of `kind`, available after `finish`.
    pub fn sampling_result(&self, kind: MetricKind) -> Option<&SamplingResult> {
        self.sample_results.get(&kind)
    }

    /// All sampling results.
    pub fn sampling_results(&self) -> &HashMap<MetricKind, SamplingResult> {
        &self.sample_results
    }

    /// Whether a sampler for `kind` is currently polling.
    pub fn is_sampling(&self, kind: MetricKind) -> bool {
        self.samplers.get(&kind).is_some_and(Sampler::is_running)
    }

    pub(super) fn configure_samplers(&mut self) {
        let Some(monitor) = self.monitor.clone() else {
            log::debug!("{} no monitor, skip samplers", self.id);
            return;
        };

        let mut regs: Vec<(MetricKind, u64)> = self.sample_regs.iter().map(|(&k, &i)| (k, i)).collect();
        regs.sort();
        for (kind, interval) in regs {
            if self.samplers.get(&kind).is_some_and(Sampler::is_running) {
                continue;
            }
            match self.stat_sampler(&monitor, kind, interval) {
                Some(mut sampler) => {
                    log::info!("{} {} #start: {}", self.id, sampler.tag(), self.scope);
                    sampler.start();
                    self.samplers.insert(kind, sampler);
                }
                None => log::warn!("{} sampler of {} unavailable, skip", self.id, kind),
            }
        }
    }

    pub(super) fn configure_sample_results(&mut self) {
        for (&kind, sampler) in self.samplers.iter_mut() {
            log::info!("{} {} #pause: {}", self.id, sampler.tag(), self.scope);
            sampler.pause();
            self.sample_results.insert(kind, sampler.result());
        }
    }

    /// Builds the sampler of `kind`, `None` when the kind cannot be sampled.
    fn stat_sampler(&mut self, monitor: &Arc<MonitorCore>, kind: MetricKind, interval: u64) -> Option<Sampler> {
        let (tag, read): (&str, ReadFn) = match kind {
            MetricKind::CpuFreq => ("cpufreq", self.cpu_freq_reader(monitor)?),
            MetricKind::BatteryTemperature => ("batt-temp", gauge_reader(monitor, kind)?),
            MetricKind::ThermalStat => ("thermal-stat", gauge_reader(monitor, kind)?),
            MetricKind::ThermalHeadroom => {
                if interval < self.config.thermal_headroom_min_interval_millis {
                    log::warn!(
                        "{} thermal headroom interval {} ms under {} ms, skip",
                        self.id,
                        interval,
                        self.config.thermal_headroom_min_interval_millis
                    );
                    return None;
                }
                ("thermal-headroom", gauge_reader(monitor, kind)?)
            }
            MetricKind::ChargeWattage => ("batt-watt", gauge_reader(monitor, kind)?),
            MetricKind::BatteryCurrent => ("batt-curr", gauge_reader(monitor, kind)?),
            MetricKind::CpuState => ("cpu-stat", cpu_state_reader(monitor)?),
            MetricKind::UidJiffies => ("uid-jiffies", uid_jiffies_reader(monitor)?),
            MetricKind::RadioStat => ("traffic", traffic_reader(monitor)?),
            _ => return None,
        };
        Some(Sampler::new(tag, monitor.scheduler().clone(), interval, read))
    }

    /// Reads the sum of per-core frequencies, counting each sample into the
    /// step histogram when the device and power profile allow it.
    fn cpu_freq_reader(&mut self, monitor: &Arc<MonitorCore>) -> Option<ReadFn> {
        let provider = monitor.supported_provider(MetricKind::CpuFreq)?;

        let mut counting = None;
        if monitor.supported_provider(MetricKind::CpuState).is_some() {
            if let (Some(device), Some(profile)) = (monitor.device_capabilities(), monitor.power_profile()) {
                let histogram = Arc::new(Mutex::new(CpuFreqHistogram::new(device.cpu_freq_steps())));
                self.cpu_freq_histogram = Some(Arc::clone(&histogram));
                counting = Some((histogram, Arc::clone(profile)));
            }
        }

        Some(Box::new(move |tick: &SamplerTick<'_>| {
            let Some(freqs) = read_snapshot(&provider, MetricKind::CpuFreq).and_then(|s| {
                s.value()
                    .as_digits()
                    .map(|d| d.iter().map(|e| u32::try_from(e.value).unwrap_or(0)).collect::<Vec<_>>())
            }) else {
                return Reading::Invalid;
            };
            log::debug!("onSampling {} {}, val = {:?}", tick.count, tick.tag, freqs);
            if freqs.is_empty() {
                return Reading::Invalid;
            }

            if let Some((histogram, profile)) = &counting {
                let mut histogram = lock_histogram(histogram);
                if histogram.is_compatible(profile.as_ref()) {
                    histogram.count(&freqs);
                } else {
                    log::trace!("{} steps incompatible with power profile", tick.tag);
                }
            }
            Reading::Value(freqs.iter().map(|&f| f as f64).sum())
        }))
    }
}

fn read_snapshot(provider: &Arc<dyn SnapshotProvider>, kind: MetricKind) -> Option<Snapshot> {
    let snapshot = provider.current_snapshot(kind)?;
    (snapshot.kind() == kind).then_some(snapshot)
}

/// Reads a scalar gauge; `-1` and a missing snapshot are invalid readings.
fn gauge_reader(monitor: &MonitorCore, kind: MetricKind) -> Option<ReadFn> {
    let provider = monitor.supported_provider(kind)?;
    Some(Box::new(move |tick: &SamplerTick<'_>| {
        match read_snapshot(&provider, kind).and_then(|s| s.value().as_gauge()) {
            Some(value) if value != GAUGE_UNAVAILABLE => {
                log::debug!("onSampling {} {}, val = {}", tick.count, tick.tag, value);
                Reading::Value(value)
            }
            _ => Reading::Invalid,
        }
    }))
}

/// Logs per-core CPU-state jiffies. The reading itself is always zero.
fn cpu_state_reader(monitor: &MonitorCore) -> Option<ReadFn> {
    let provider = monitor.supported_provider(MetricKind::CpuState)?;
    Some(Box::new(move |tick: &SamplerTick<'_>| {
        if let Some(snapshot) = read_snapshot(&provider, MetricKind::CpuState) {
            if let Some(cores) = snapshot.value().as_cpu_state() {
                for (core, steps) in cores.iter().enumerate() {
                    log::debug!("onSampling {} {}, cpu{} = {:?}", tick.count, tick.tag, core, steps);
                }
            }
        }
        Reading::Value(0.0)
    }))
}

/// Reads the uid's jiffies per minute since the previous tick.
///
/// The first tick only records its snapshot and reads zero.
fn uid_jiffies_reader(monitor: &MonitorCore) -> Option<ReadFn> {
    let provider = monitor.supported_provider(MetricKind::UidJiffies)?;
    let mut last: Option<Snapshot> = None;
    Some(Box::new(move |tick: &SamplerTick<'_>| {
        let Some(current) = read_snapshot(&provider, MetricKind::UidJiffies) else {
            return Reading::Invalid;
        };
        let Some(previous) = last.replace(current.clone()) else {
            return Reading::Value(0.0);
        };

        let delta = match current.diff(&previous) {
            Ok(delta) => delta,
            Err(e) => {
                log::warn!("onSampling {} {}, diff failed: {}", tick.count, tick.tag, e);
                return Reading::Invalid;
            }
        };
        let during = delta.during_millis as i64;
        if let Some(processes) = delta.value.as_uid_jiffies() {
            for process in processes {
                if let Ok(avg) = compute_avg_jiffies(process.jiffies as i64, during) {
                    log::debug!("onSampling {} {}, {} ({}) = {}", tick.count, tick.tag, process.name, process.pid, avg);
                }
            }
        }
        match compute_avg_jiffies(delta.total_jiffies().unwrap_or(0) as i64, during) {
            Ok(avg) => Reading::Value(avg as f64),
            Err(_) => Reading::Invalid,
        }
    }))
}

/// Logs radio traffic counters. The reading itself is always zero.
fn traffic_reader(monitor: &MonitorCore) -> Option<ReadFn> {
    let provider = monitor.supported_provider(MetricKind::RadioStat)?;
    Some(Box::new(move |tick: &SamplerTick<'_>| {
        if let Some(snapshot) = read_snapshot(&provider, MetricKind::RadioStat) {
            if let Some(digits) = snapshot.value().as_digits() {
                for entry in digits {
                    log::debug!("onSampling {} {}, {} = {}", tick.count, tick.tag, entry.name, entry.value);
                }
            }
        }
        Reading::Value(0.0)
    }))
}
