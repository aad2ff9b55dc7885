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

//! # Canary Core
//!
//! Foundational crate containing the metric data model and the provider
//! contracts that the measurement engine in `canary-telemetry` is built on.

#![warn(missing_docs)]

pub mod app_stats;
pub mod clock;
pub mod error;
pub mod metric;
pub mod provider;
pub mod sampling;

pub use app_stats::{AppState, AppStats, DeviceState, Scope};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{MonitorError, MonitorResult};
pub use metric::{Delta, MetricKind, Snapshot, SnapshotValue, TaskDelta, TaskSource};
pub use sampling::{Reading, SamplingResult};
