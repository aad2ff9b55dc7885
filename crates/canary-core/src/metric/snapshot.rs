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

//! Snapshots, their payloads, and the deltas computed between two of them.

use super::{MetricKind, ONE_MIN_MILLIS};
use crate::error::{MonitorError, MonitorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// CPU jiffies attributed to a single thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadJiffies {
    /// Kernel thread id.
    pub tid: u32,
    /// Thread name as reported by the kernel.
    pub name: String,
    /// Jiffies consumed (absolute in a snapshot, consumed-since in a delta).
    pub jiffies: u64,
}

/// CPU jiffies attributed to a single process, with its threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessJiffies {
    /// Process id.
    pub pid: u32,
    /// Process name.
    pub name: String,
    /// Jiffies consumed by the whole process.
    pub jiffies: u64,
    /// Per-thread breakdown. Sorted by descending jiffies in a delta.
    pub threads: Vec<ThreadJiffies>,
}

impl ProcessJiffies {
    fn diff(&self, previous: &ProcessJiffies) -> ProcessJiffies {
        let before: HashMap<u32, u64> = previous.threads.iter().map(|t| (t.tid, t.jiffies)).collect();
        let mut threads: Vec<ThreadJiffies> = self
            .threads
            .iter()
            .map(|t| ThreadJiffies {
                tid: t.tid,
                name: t.name.clone(),
                jiffies: t.jiffies.saturating_sub(before.get(&t.tid).copied().unwrap_or(0)),
            })
            .collect();
        threads.sort_by(|a, b| b.jiffies.cmp(&a.jiffies));

        ProcessJiffies {
            pid: self.pid,
            name: self.name.clone(),
            jiffies: self.jiffies.saturating_sub(previous.jiffies),
            threads,
        }
    }
}

/// A named integer counter, e.g. `"wifi_rx_bytes"` or `"alarm_count"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitEntry {
    /// Counter name, unique within one snapshot.
    pub name: String,
    /// Counter value.
    pub value: i64,
}

impl DigitEntry {
    /// Creates a new counter entry.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The kind-specific payload of a [`Snapshot`] or [`Delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotValue {
    /// Jiffies of the current process.
    ProcessJiffies(ProcessJiffies),
    /// Jiffies of every process of the application uid.
    UidJiffies(Vec<ProcessJiffies>),
    /// Per-core, per-speed-step CPU time.
    CpuState(Vec<Vec<u64>>),
    /// A list of named counters.
    Digits(Vec<DigitEntry>),
    /// A single instantaneous value.
    Gauge(f64),
}

impl SnapshotValue {
    /// Returns the value if this is a `Gauge`.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            SnapshotValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the counters if this is a `Digits` payload.
    pub fn as_digits(&self) -> Option<&[DigitEntry]> {
        match self {
            SnapshotValue::Digits(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the process breakdown if this is a `ProcessJiffies` payload.
    pub fn as_process_jiffies(&self) -> Option<&ProcessJiffies> {
        match self {
            SnapshotValue::ProcessJiffies(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the per-process list if this is a `UidJiffies` payload.
    pub fn as_uid_jiffies(&self) -> Option<&[ProcessJiffies]> {
        match self {
            SnapshotValue::UidJiffies(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the per-core step table if this is a `CpuState` payload.
    pub fn as_cpu_state(&self) -> Option<&[Vec<u64>]> {
        match self {
            SnapshotValue::CpuState(cores) => Some(cores),
            _ => None,
        }
    }

    /// Looks up a counter by name in a `Digits` payload.
    pub fn digit(&self, name: &str) -> Option<i64> {
        self.as_digits()?
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value)
    }

    fn diff(&self, previous: &SnapshotValue) -> Option<SnapshotValue> {
        let value = match (self, previous) {
            (SnapshotValue::ProcessJiffies(end), SnapshotValue::ProcessJiffies(bgn)) => {
                SnapshotValue::ProcessJiffies(end.diff(bgn))
            }
            (SnapshotValue::UidJiffies(end), SnapshotValue::UidJiffies(bgn)) => {
                let mut list: Vec<ProcessJiffies> = end
                    .iter()
                    .map(|proc| match bgn.iter().find(|p| p.pid == proc.pid) {
                        Some(before) => proc.diff(before),
                        None => proc.diff(&ProcessJiffies {
                            pid: proc.pid,
                            name: proc.name.clone(),
                            jiffies: 0,
                            threads: Vec::new(),
                        }),
                    })
                    .collect();
                list.sort_by(|a, b| b.jiffies.cmp(&a.jiffies));
                SnapshotValue::UidJiffies(list)
            }
            (SnapshotValue::CpuState(end), SnapshotValue::CpuState(bgn)) => SnapshotValue::CpuState(
                end.iter()
                    .enumerate()
                    .map(|(core, steps)| {
                        steps
                            .iter()
                            .enumerate()
                            .map(|(step, v)| {
                                let before = bgn.get(core).and_then(|s| s.get(step)).copied().unwrap_or(0);
                                v.saturating_sub(before)
                            })
                            .collect()
                    })
                    .collect(),
            ),
            (SnapshotValue::Digits(end), SnapshotValue::Digits(bgn)) => SnapshotValue::Digits(
                end.iter()
                    .map(|entry| {
                        let before = bgn
                            .iter()
                            .find(|e| e.name == entry.name)
                            .map(|e| e.value)
                            .unwrap_or(0);
                        DigitEntry::new(entry.name.clone(), entry.value.wrapping_sub(before))
                    })
                    .collect(),
            ),
            (SnapshotValue::Gauge(end), SnapshotValue::Gauge(bgn)) => SnapshotValue::Gauge(end - bgn),
            _ => return None,
        };
        Some(value)
    }
}

/// An immutable point-in-time reading of one metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    kind: MetricKind,
    time_millis: u64,
    value: SnapshotValue,
}

impl Snapshot {
    /// Creates a snapshot taken at `time_millis` on the monotonic uptime clock.
    pub fn new(kind: MetricKind, time_millis: u64, value: SnapshotValue) -> Self {
        Self {
            kind,
            time_millis,
            value,
        }
    }

    /// The kind this snapshot measures.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// The uptime at which the reading was taken.
    pub fn time_millis(&self) -> u64 {
        self.time_millis
    }

    /// The reading itself.
    pub fn value(&self) -> &SnapshotValue {
        &self.value
    }

    /// Computes the change from `previous` to `self`.
    ///
    /// Both snapshots must be of the same kind and carry the same payload
    /// shape; anything else is rejected rather than coerced.
    pub fn diff(&self, previous: &Snapshot) -> MonitorResult<Delta> {
        if self.kind != previous.kind {
            return Err(MonitorError::KindMismatch {
                expected: self.kind,
                found: previous.kind,
            });
        }
        let value = self
            .value
            .diff(&previous.value)
            .ok_or(MonitorError::ValueMismatch { kind: self.kind })?;
        Ok(Delta::new(self.kind, previous.time_millis, self.time_millis, value))
    }
}

/// The measured change of one metric between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// The kind both snapshots measure.
    pub kind: MetricKind,
    /// Uptime of the earlier snapshot.
    pub begin_millis: u64,
    /// Uptime of the later snapshot.
    pub end_millis: u64,
    /// `end_millis - begin_millis`, saturating at zero.
    pub during_millis: u64,
    /// The kind-specific change.
    pub value: SnapshotValue,
}

impl Delta {
    /// Creates a delta, deriving its duration from the two timestamps.
    pub fn new(kind: MetricKind, begin_millis: u64, end_millis: u64, value: SnapshotValue) -> Self {
        Self {
            kind,
            begin_millis,
            end_millis,
            during_millis: end_millis.saturating_sub(begin_millis),
            value,
        }
    }

    /// Whole minutes covered by this delta, never less than one.
    pub fn minutes(&self) -> u64 {
        (self.during_millis / ONE_MIN_MILLIS).max(1)
    }

    /// Total jiffies consumed, for process and uid jiffies deltas.
    pub fn total_jiffies(&self) -> Option<u64> {
        match &self.value {
            SnapshotValue::ProcessJiffies(p) => Some(p.jiffies),
            SnapshotValue::UidJiffies(list) => Some(list.iter().map(|p| p.jiffies).sum()),
            _ => None,
        }
    }

    /// Total device CPU jiffies across cores and steps, for CPU-state deltas.
    pub fn total_cpu_jiffies(&self) -> Option<u64> {
        self.value
            .as_cpu_state()
            .map(|cores| cores.iter().flatten().sum())
    }
}
