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

//! Baseline capture and end-of-window deltas.

use super::CompositeMonitor;
use canary_core::metric::{Delta, MetricKind, ProcessJiffies, Snapshot};
use std::collections::HashMap;

impl CompositeMonitor {
    /// Registers `kind` for baseline capture on the next `start`.
    ///
    /// Registering a kind twice has no further effect.
    pub fn metric(&mut self, kind: MetricKind) -> &mut Self {
        if !self.metrics.contains(&kind) {
            self.metrics.push(kind);
        }
        self
    }

    /// Registers the general battery-relevant metrics.
    pub fn metric_all(&mut self) -> &mut Self {
        for kind in [
            MetricKind::ProcessJiffies,
            MetricKind::Alarm,
            MetricKind::WakeLock,
            MetricKind::CpuState,
            MetricKind::AppStat,
            MetricKind::CpuFreq,
            MetricKind::BatteryTemperature,
            MetricKind::RadioStat,
            MetricKind::Bluetooth,
            MetricKind::Wifi,
            MetricKind::Location,
        ] {
            self.metric(kind);
        }
        self
    }

    /// Registers what [`cpu_load`](Self::cpu_load) and
    /// [`dev_cpu_load`](Self::dev_cpu_load) need.
    pub fn metric_cpu_load(&mut self) -> &mut Self {
        self.metric(MetricKind::ProcessJiffies);
        self.metric(MetricKind::CpuState)
    }

    /// The registered metrics, in registration order.
    pub fn metrics(&self) -> &[MetricKind] {
        &self.metrics
    }

    /// The baseline captured for `kind` at `start`.
    pub fn baseline(&self, kind: MetricKind) -> Option<&Snapshot> {
        self.begin_snapshots.get(&kind)
    }

    /// The delta computed for `kind` at `finish`, if both ends were available.
    pub fn delta(&self, kind: MetricKind) -> Option<&Delta> {
        self.deltas.get(&kind)
    }

    /// All computed deltas.
    pub fn deltas(&self) -> &HashMap<MetricKind, Delta> {
        &self.deltas
    }

    /// Stores `delta` under `kind`, replacing any earlier one.
    pub fn put_delta(&mut self, kind: MetricKind, delta: Delta) -> &mut Self {
        self.deltas.insert(kind, delta);
        self
    }

    /// Per-process jiffies deltas.
    ///
    /// The processes of the uid delta when measured, else the single process
    /// delta, else nothing.
    pub fn all_pid_deltas(&self) -> Vec<&ProcessJiffies> {
        if let Some(processes) = self.delta(MetricKind::UidJiffies).and_then(|d| d.value.as_uid_jiffies()) {
            return processes.iter().collect();
        }
        self.delta(MetricKind::ProcessJiffies)
            .and_then(|d| d.value.as_process_jiffies())
            .into_iter()
            .collect()
    }

    fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
        self.monitor.as_ref()?.current_snapshot(kind)
    }

    pub(super) fn configure_begin_snapshots(&mut self) {
        for &kind in &self.metrics {
            match self.current_snapshot(kind) {
                Some(snapshot) => {
                    log::debug!("{} baseline {} at {}", self.id, kind, snapshot.time_millis());
                    self.begin_snapshots.insert(kind, snapshot);
                }
                None => log::warn!("{} metric {} unavailable, skip", self.id, kind),
            }
        }
    }

    pub(super) fn configure_end_deltas(&mut self) {
        let mut computed = Vec::with_capacity(self.begin_snapshots.len());
        for (&kind, baseline) in &self.begin_snapshots {
            let Some(end) = self.current_snapshot(kind) else {
                log::warn!("{} end snapshot of {} unavailable, skip", self.id, kind);
                continue;
            };
            if end.kind() != baseline.kind() {
                log::warn!("{} provider of {} answered with {}, skip", self.id, kind, end.kind());
                continue;
            }
            match end.diff(baseline) {
                Ok(delta) => computed.push((kind, delta)),
                Err(e) => log::warn!("{} delta of {} failed: {}", self.id, kind, e),
            }
        }
        self.deltas.extend(computed);
    }
}
