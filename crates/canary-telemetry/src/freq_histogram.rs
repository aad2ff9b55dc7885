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

//! Classifies raw CPU frequency samples into power-profile speed steps.

use canary_core::provider::PowerProfile;
use serde::Serialize;

/// Per-core counters of how often each frequency step was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuFreqHistogram {
    steps: Vec<Vec<u32>>,
    counters: Vec<Vec<u32>>,
    last_freqs: Vec<u32>,
}

impl CpuFreqHistogram {
    /// Creates a histogram over ascending per-core step tables.
    pub fn new(steps: Vec<Vec<u32>>) -> Self {
        let counters = steps.iter().map(|s| vec![0; s.len()]).collect();
        Self {
            steps,
            counters,
            last_freqs: Vec::new(),
        }
    }

    /// Whether the step tables line up with `profile` core for core.
    ///
    /// Samples must not be counted against an incompatible profile.
    pub fn is_compatible(&self, profile: &dyn PowerProfile) -> bool {
        if self.steps.len() != profile.cpu_core_num() {
            return false;
        }
        self.steps.iter().enumerate().all(|(core, steps)| {
            let cluster = profile.cluster_by_cpu_num(core);
            steps.len() == profile.num_speed_steps_in_cluster(cluster)
        })
    }

    /// Counts one sample per core.
    ///
    /// A sample lands in the first step at or above it; below the first
    /// step it lands in bucket 0. A sample above every step (the table lacks
    /// the device's real maximum) lands in the last bucket. Cores without a
    /// step table are ignored.
    pub fn count(&mut self, freqs: &[u32]) {
        self.last_freqs = freqs.to_vec();
        for (core, &speed) in freqs.iter().enumerate() {
            let (Some(steps), Some(counter)) = (self.steps.get(core), self.counters.get_mut(core)) else {
                continue;
            };
            if steps.is_empty() {
                continue;
            }
            let bucket = steps
                .iter()
                .position(|&step| speed <= step)
                .unwrap_or(steps.len() - 1);
            counter[bucket] += 1;
        }
    }

    /// Step tables, per core.
    pub fn steps(&self) -> &[Vec<u32>] {
        &self.steps
    }

    /// Counters parallel to [`steps`](Self::steps).
    pub fn counters(&self) -> &[Vec<u32>] {
        &self.counters
    }

    /// The last raw sample passed to [`count`](Self::count).
    pub fn last_freqs(&self) -> &[u32] {
        &self.last_freqs
    }
}
