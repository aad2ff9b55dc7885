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

//! Per-task cost deltas produced by task-tracing providers.

use serde::{Deserialize, Serialize};

/// The CPU cost of one traced task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDelta {
    /// Task identity, e.g. a handler or job class name.
    pub name: String,
    /// Uptime at which the task started running.
    pub begin_millis: u64,
    /// Uptime at which the task finished, or the sampling time if still running.
    pub end_millis: u64,
    /// `end_millis - begin_millis`, saturating at zero.
    pub during_millis: u64,
    /// Jiffies consumed by the task.
    pub jiffies: u64,
}

impl TaskDelta {
    /// Creates a task delta, deriving its duration from the two timestamps.
    pub fn new(name: impl Into<String>, begin_millis: u64, end_millis: u64, jiffies: u64) -> Self {
        Self {
            name: name.into(),
            begin_millis,
            end_millis,
            during_millis: end_millis.saturating_sub(begin_millis),
            jiffies,
        }
    }
}
