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

//! Fake providers shared by the session integration tests.

#![allow(dead_code)]

use canary_core::app_stats::{AppState, AppStats, DeviceState};
use canary_core::clock::{Clock, ManualClock};
use canary_core::metric::{MetricKind, ProcessJiffies, Snapshot, SnapshotValue, TaskDelta, ThreadJiffies};
use canary_core::provider::{AppStatsSource, SnapshotProvider, StackCollector, TaskTracer};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers each kind from a script. The last scripted value repeats.
pub struct ScriptedProvider {
    clock: ManualClock,
    script: Mutex<HashMap<MetricKind, VecDeque<SnapshotValue>>>,
    supported: bool,
    step_millis: u64,
}

impl ScriptedProvider {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            script: Mutex::new(HashMap::new()),
            supported: true,
            step_millis: 0,
        }
    }

    /// Advances the clock by `step_millis` after every answered snapshot.
    pub fn stepping(clock: ManualClock, step_millis: u64) -> Self {
        Self {
            step_millis,
            ..Self::new(clock)
        }
    }

    pub fn unsupported(clock: ManualClock) -> Self {
        Self {
            supported: false,
            ..Self::new(clock)
        }
    }

    pub fn push(&self, kind: MetricKind, value: SnapshotValue) {
        self.script.lock().unwrap().entry(kind).or_default().push_back(value);
    }
}

impl SnapshotProvider for ScriptedProvider {
    fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
        let mut script = self.script.lock().unwrap();
        let queue = script.get_mut(&kind)?;
        let value = if queue.len() > 1 {
            queue.pop_front()?
        } else {
            queue.front()?.clone()
        };
        let snapshot = Snapshot::new(kind, self.clock.uptime_millis(), value);
        self.clock.advance(self.step_millis);
        Some(snapshot)
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}

/// Returns a fixed list of task deltas.
pub struct FixedTracer {
    pub deltas: Vec<TaskDelta>,
    pub windows: Mutex<Vec<u64>>,
}

impl FixedTracer {
    pub fn new(deltas: Vec<TaskDelta>) -> Self {
        Self {
            deltas,
            windows: Mutex::new(Vec::new()),
        }
    }
}

impl TaskTracer for FixedTracer {
    fn current_task_deltas(&self, window_millis: u64) -> Vec<TaskDelta> {
        self.windows.lock().unwrap().push(window_millis);
        self.deltas.clone()
    }
}

/// Records which threads had their stack collected.
#[derive(Default)]
pub struct RecordingStacks {
    pub requested: Mutex<Vec<u32>>,
}

impl StackCollector for RecordingStacks {
    fn collect(&self, tid: u32) -> Option<String> {
        self.requested.lock().unwrap().push(tid);
        Some(format!("at thread {tid}"))
    }
}

/// Reports the same state for every window.
pub struct FixedAppState(pub AppState);

impl AppStatsSource for FixedAppState {
    fn current(&self, during_millis: u64) -> AppStats {
        AppStats::new(during_millis, self.0, DeviceState::Unplugged)
    }
}

pub fn process(jiffies: u64, threads: &[(u32, u64)]) -> SnapshotValue {
    SnapshotValue::ProcessJiffies(ProcessJiffies {
        pid: 42,
        name: "com.example.app".to_string(),
        jiffies,
        threads: threads
            .iter()
            .map(|&(tid, jiffies)| ThreadJiffies {
                tid,
                name: format!("worker-{tid}"),
                jiffies,
            })
            .collect(),
    })
}
