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

//! Contracts implemented by the external metric providers.
//!
//! The engine in `canary-telemetry` never reads the operating system itself.
//! It asks the capabilities defined here, all of which report "unavailable"
//! through absence (`None`, an empty list) rather than through errors: a
//! metric that does not exist on this device is a normal condition.

pub mod power;
pub mod registry;

pub use self::power::{DeviceCapabilities, PowerProfile, StaticDeviceCapabilities, StaticPowerProfile};
pub use self::registry::ProviderRegistry;

use crate::app_stats::AppStats;
use crate::metric::{MetricKind, Snapshot, TaskDelta};

/// Produces point-in-time snapshots for one or more metric kinds.
///
/// A provider is registered once per kind in a [`ProviderRegistry`]; the same
/// instance may serve several kinds.
pub trait SnapshotProvider: Send + Sync {
    /// Returns the current reading of `kind`, or `None` if it cannot be read
    /// on this runtime.
    fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot>;

    /// Whether the provider works on this device at all.
    fn is_supported(&self) -> bool {
        true
    }
}

/// Produces per-task cost deltas.
pub trait TaskTracer: Send + Sync {
    /// Returns the tasks observed within the last `window_millis`. May be empty.
    fn current_task_deltas(&self, window_millis: u64) -> Vec<TaskDelta>;
}

/// Captures the call stack of a thread.
pub trait StackCollector: Send + Sync {
    /// Returns the stack of thread `tid` as text, or `None` if it could not be captured.
    fn collect(&self, tid: u32) -> Option<String>;
}

/// Describes the application state over a window that has just ended.
pub trait AppStatsSource: Send + Sync {
    /// Returns the stats for a window of `during_millis` ending now.
    fn current(&self, during_millis: u64) -> AppStats;
}
