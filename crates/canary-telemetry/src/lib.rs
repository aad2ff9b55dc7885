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

//! # Canary Telemetry
//!
//! The measurement-session engine. A [`CompositeMonitor`] captures
//! baselines at start, runs periodic [`Sampler`]s on a shared
//! [`SamplingScheduler`], computes deltas at finish, and ranks the task
//! costs reported by task tracers.

#![warn(missing_docs)]

pub mod config;
pub mod freq_histogram;
pub mod monitor;
pub mod sampling;
pub mod session;

pub use config::SessionConfig;
pub use freq_histogram::CpuFreqHistogram;
pub use monitor::{MonitorCore, MonitorCoreBuilder, StaticAppStats};
pub use sampling::{Sampler, SamplingScheduler, SchedulerHandle};
pub use session::{compute_avg_jiffies, CompositeMonitor, OverheatRule, TaskBuckets};
