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

//! Task-cost collection and ranking.

use super::{CompositeMonitor, TaskBuckets};
use canary_core::metric::{TaskDelta, TaskSource};

fn bucket_jiffies(deltas: &[(TaskSource, TaskDelta)]) -> u64 {
    deltas.iter().map(|(_, d)| d.jiffies).sum()
}

impl CompositeMonitor {
    /// Pulls the task deltas of `source` over the finished window.
    ///
    /// Does nothing before `finish` or when no tracer is registered.
    pub fn refresh_task_deltas(&mut self, source: TaskSource) -> &mut Self {
        let Some(app_stats) = self.app_stats else {
            log::warn!("{} refresh {} task deltas before finish, skip", self.id, source);
            return self;
        };
        let Some(tracer) = self.monitor.as_ref().and_then(|m| m.task_tracer(source)) else {
            log::debug!("{} no {} task tracer", self.id, source);
            return self;
        };
        let deltas = tracer.current_task_deltas(app_stats.during_millis);
        self.put_task_deltas(source, deltas)
    }

    /// Stores the task deltas of `source`, replacing earlier ones.
    pub fn put_task_deltas(&mut self, source: TaskSource, deltas: Vec<TaskDelta>) -> &mut Self {
        self.task_deltas.insert(source, deltas);
        self
    }

    /// The task deltas stored for `source`.
    pub fn task_deltas(&self, source: TaskSource) -> &[TaskDelta] {
        self.task_deltas.get(&source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Groups the stored task deltas by task name.
    ///
    /// Sources are visited in [`TaskSource::ALL`] order and deltas in their
    /// stored order. Deltas that began before the window opened are dropped.
    pub fn collect_task_deltas(&mut self) -> &mut Self {
        for source in TaskSource::ALL {
            let Some(deltas) = self.task_deltas.get(&source) else {
                continue;
            };
            for delta in deltas {
                if delta.begin_millis < self.begin_millis {
                    continue;
                }
                self.task_buckets
                    .entry(delta.name.clone())
                    .or_default()
                    .push((source, delta.clone()));
            }
        }
        self
    }

    /// The collected buckets, hottest first by summed jiffies.
    ///
    /// Buckets with equal totals keep their collection order.
    pub fn ranked_task_deltas(&self) -> TaskBuckets {
        let mut ranked = self.task_buckets.clone();
        if ranked.len() > 1 {
            ranked.sort_by(|_, a, _, b| bucket_jiffies(b).cmp(&bucket_jiffies(a)));
        }
        ranked
    }
}
