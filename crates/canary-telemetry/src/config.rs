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

//! Tunable thresholds of a measurement session.

use canary_core::metric::ONE_MIN_MILLIS;
use serde::{Deserialize, Serialize};

/// Configuration for a [`CompositeMonitor`](crate::session::CompositeMonitor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval used by `sample(kind)` when none is given.
    pub default_sample_interval_millis: u64,
    /// Minimum session length, in minutes, before a session can overheat.
    pub overheat_min_minutes: u64,
    /// Process jiffies per minute at which a session overheats.
    pub overheat_avg_jiffies: u64,
    /// Minimum session length, in minutes, before hot-thread stacks are collected.
    pub stack_min_minutes: u64,
    /// Thread jiffies per minute above which a thread's stack is collected.
    pub stack_thread_avg_jiffies: u64,
    /// Thermal headroom sampling is refused below this interval.
    pub thermal_headroom_min_interval_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_sample_interval_millis: ONE_MIN_MILLIS,
            overheat_min_minutes: 5,
            overheat_avg_jiffies: 1_000,
            stack_min_minutes: 5,
            stack_thread_avg_jiffies: 3_000,
            thermal_headroom_min_interval_millis: 1_000,
        }
    }
}

impl SessionConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
