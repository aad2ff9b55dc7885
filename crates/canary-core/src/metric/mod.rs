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

//! Metric identities and the point-in-time data model.
//!
//! Every measurable quantity the engine knows about is a [`MetricKind`]. The
//! set is closed: providers are registered per kind at startup, and all maps in
//! a session are keyed by it. Task-tracing providers are keyed separately by
//! [`TaskSource`], since they produce lists of per-task deltas rather than a
//! single snapshot.

pub mod snapshot;
pub mod task;

pub use self::snapshot::{Delta, DigitEntry, ProcessJiffies, Snapshot, SnapshotValue, ThreadJiffies};
pub use self::task::TaskDelta;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Milliseconds in one minute.
pub const ONE_MIN_MILLIS: u64 = 60_000;

/// Identifies a measurable quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// CPU jiffies consumed by the current process, with a per-thread breakdown.
    ProcessJiffies,
    /// CPU jiffies consumed by every process sharing the application uid.
    UidJiffies,
    /// Per-core, per-speed-step CPU time of the whole device.
    CpuState,
    /// Current frequency of every CPU core.
    CpuFreq,
    /// Alarms scheduled by the application.
    Alarm,
    /// Wakelocks acquired by the application.
    WakeLock,
    /// Foreground/background residency of the application.
    AppStat,
    /// Battery temperature.
    BatteryTemperature,
    /// Instantaneous battery current.
    BatteryCurrent,
    /// Charger wattage.
    ChargeWattage,
    /// Device thermal status.
    ThermalStat,
    /// Device thermal headroom forecast.
    ThermalHeadroom,
    /// Wifi and mobile radio traffic.
    RadioStat,
    /// Bluetooth scans and registrations.
    Bluetooth,
    /// Wifi scans and queries.
    Wifi,
    /// Location requests.
    Location,
    /// System health statistics.
    HealthStats,
}

impl MetricKind {
    /// Every metric kind, in declaration order.
    pub const ALL: [MetricKind; 17] = [
        MetricKind::ProcessJiffies,
        MetricKind::UidJiffies,
        MetricKind::CpuState,
        MetricKind::CpuFreq,
        MetricKind::Alarm,
        MetricKind::WakeLock,
        MetricKind::AppStat,
        MetricKind::BatteryTemperature,
        MetricKind::BatteryCurrent,
        MetricKind::ChargeWattage,
        MetricKind::ThermalStat,
        MetricKind::ThermalHeadroom,
        MetricKind::RadioStat,
        MetricKind::Bluetooth,
        MetricKind::Wifi,
        MetricKind::Location,
        MetricKind::HealthStats,
    ];

    /// Returns the stable snake-case name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::ProcessJiffies => "process_jiffies",
            MetricKind::UidJiffies => "uid_jiffies",
            MetricKind::CpuState => "cpu_state",
            MetricKind::CpuFreq => "cpu_freq",
            MetricKind::Alarm => "alarm",
            MetricKind::WakeLock => "wake_lock",
            MetricKind::AppStat => "app_stat",
            MetricKind::BatteryTemperature => "battery_temperature",
            MetricKind::BatteryCurrent => "battery_current",
            MetricKind::ChargeWattage => "charge_wattage",
            MetricKind::ThermalStat => "thermal_stat",
            MetricKind::ThermalHeadroom => "thermal_headroom",
            MetricKind::RadioStat => "radio_stat",
            MetricKind::Bluetooth => "bluetooth",
            MetricKind::Wifi => "wifi",
            MetricKind::Location => "location",
            MetricKind::HealthStats => "health_stats",
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies a task-tracing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Messages dispatched by an event loop.
    Looper,
    /// Jobs executed by a thread pool.
    ThreadPool,
    /// Coroutines resumed by a cooperative scheduler.
    Coroutine,
}

impl TaskSource {
    /// Every task source, in declaration order.
    pub const ALL: [TaskSource; 3] = [TaskSource::Looper, TaskSource::ThreadPool, TaskSource::Coroutine];

    /// Returns the stable snake-case name of this source.
    pub fn name(&self) -> &'static str {
        match self {
            TaskSource::Looper => "looper",
            TaskSource::ThreadPool => "thread_pool",
            TaskSource::Coroutine => "coroutine",
        }
    }
}

impl Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
