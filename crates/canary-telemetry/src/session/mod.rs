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

//! The composite measurement session.
//!
//! A [`CompositeMonitor`] opens a measurement window with
//! [`start`](CompositeMonitor::start), captures baselines for every metric
//! registered beforehand, arms periodic samplers, and on
//! [`finish`](CompositeMonitor::finish) turns all of it into deltas,
//! sampling statistics, hot-thread stacks, and derived CPU-load figures.

mod derived;
mod sampling;
mod snapshots;
mod tasks;

pub use self::derived::{compute_avg_jiffies, OverheatRule};

use crate::config::SessionConfig;
use crate::freq_histogram::CpuFreqHistogram;
use crate::monitor::MonitorCore;
use crate::sampling::Sampler;
use canary_core::app_stats::{AppStats, Scope};
use canary_core::clock::{Clock, MonotonicClock};
use canary_core::metric::{Delta, MetricKind, Snapshot, TaskDelta, TaskSource};
use canary_core::sampling::SamplingResult;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Task deltas grouped by task name, in first-collected order.
pub type TaskBuckets = IndexMap<String, Vec<(TaskSource, TaskDelta)>>;

/// One measurement window over a set of metrics.
///
/// A session is single-threaded from the caller's point of view: `start`,
/// `finish`, `fork`, and `clear` take `&mut self` or `&self`. Only the
/// samplers it arms run elsewhere, on the monitor's scheduler.
pub struct CompositeMonitor {
    id: Uuid,
    monitor: Option<Arc<MonitorCore>>,
    scope: Scope,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    overheat_rules: HashMap<MetricKind, OverheatRule>,

    metrics: Vec<MetricKind>,
    begin_snapshots: HashMap<MetricKind, Snapshot>,
    deltas: HashMap<MetricKind, Delta>,

    sample_regs: HashMap<MetricKind, u64>,
    samplers: HashMap<MetricKind, Sampler>,
    sample_results: HashMap<MetricKind, SamplingResult>,

    task_deltas: HashMap<TaskSource, Vec<TaskDelta>>,
    task_buckets: TaskBuckets,

    extras: Map<String, Value>,
    stacks: HashMap<u32, String>,
    app_stats: Option<AppStats>,
    cpu_freq_histogram: Option<Arc<Mutex<CpuFreqHistogram>>>,
    begin_millis: u64,
}

impl CompositeMonitor {
    /// Creates a session with [`Scope::Unknown`].
    ///
    /// Without a monitor every metric is unavailable; the session still runs
    /// through its lifecycle and reports nothing.
    pub fn new(monitor: Option<Arc<MonitorCore>>) -> Self {
        Self::with_scope(monitor, Scope::Unknown)
    }

    /// Creates a session tagged with `scope`.
    pub fn with_scope(monitor: Option<Arc<MonitorCore>>, scope: Scope) -> Self {
        let clock: Arc<dyn Clock> = match &monitor {
            Some(m) => Arc::clone(m.clock()),
            None => Arc::new(MonotonicClock::new()),
        };
        let begin_millis = clock.uptime_millis();
        Self {
            id: Uuid::new_v4(),
            monitor,
            scope,
            config: SessionConfig::default(),
            clock,
            overheat_rules: HashMap::new(),
            metrics: Vec::new(),
            begin_snapshots: HashMap::new(),
            deltas: HashMap::new(),
            sample_regs: HashMap::new(),
            samplers: HashMap::new(),
            sample_results: HashMap::new(),
            task_deltas: HashMap::new(),
            task_buckets: IndexMap::new(),
            extras: Map::new(),
            stacks: HashMap::new(),
            app_stats: None,
            cpu_freq_histogram: None,
            begin_millis,
        }
    }

    /// Replaces the session thresholds.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the clock the session measures its own window with.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.begin_millis = clock.uptime_millis();
        self.clock = clock;
        self
    }

    /// Opens the measurement window.
    ///
    /// Captures a baseline for every registered metric and starts every
    /// registered sampler. Unavailable metrics are skipped.
    pub fn start(&mut self) {
        log::info!("{} #start: {}", self.id, self.scope);
        self.app_stats = None;
        self.begin_millis = self.clock.uptime_millis();
        self.configure_begin_snapshots();
        self.configure_samplers();
    }

    /// Closes the measurement window.
    ///
    /// Computes a delta for every baseline whose end snapshot is available,
    /// collects hot-thread stacks, pauses every sampler into its result, and
    /// records the session's [`AppStats`].
    pub fn finish(&mut self) {
        log::info!("{} #finish: {}", self.id, self.scope);
        self.configure_end_deltas();

        let during_millis = self.clock.uptime_millis().saturating_sub(self.begin_millis);
        let app_stats = match &self.monitor {
            Some(monitor) => monitor.app_stats_source().current(during_millis),
            None => AppStats {
                during_millis,
                ..AppStats::default()
            },
        };

        self.collect_stacks(&app_stats);
        self.configure_sample_results();
        self.app_stats = Some(app_stats);
    }

    /// Returns an independent copy of this session's measured state.
    ///
    /// The copy shares the monitor and scope, and gets its own id. Samplers,
    /// sampler registrations, and sampling results are not carried over; the
    /// frequency histogram is carried as a frozen copy.
    pub fn fork(&self) -> CompositeMonitor {
        log::info!("{} #fork: {}", self.id, self.scope);
        let mut that = CompositeMonitor::with_scope(self.monitor.clone(), self.scope);
        that.config = self.config.clone();
        that.clock = Arc::clone(&self.clock);
        that.overheat_rules = self.overheat_rules.clone();

        that.begin_millis = self.begin_millis;
        that.app_stats = self.app_stats;
        that.metrics = self.metrics.clone();
        that.begin_snapshots = self.begin_snapshots.clone();
        that.deltas = self.deltas.clone();
        that.task_deltas = self.task_deltas.clone();
        that.task_buckets = self.task_buckets.clone();
        that.extras = self.extras.clone();
        that.stacks = self.stacks.clone();
        that.cpu_freq_histogram = self
            .cpu_freq_histogram
            .as_ref()
            .map(|h| Arc::new(Mutex::new(lock_histogram(h).clone())));
        that
    }

    /// Drops everything measured, keeping the metric and sampler registrations
    /// and the AppStats.
    pub fn clear(&mut self) {
        log::info!("{} #clear: {}", self.id, self.scope);
        self.begin_snapshots.clear();
        self.deltas.clear();
        self.samplers.clear();
        self.sample_results.clear();
        self.task_deltas.clear();
        self.task_buckets.clear();
        self.extras.clear();
        self.stacks.clear();
        self.cpu_freq_histogram = None;
    }

    /// Unique id of this session, used as the log prefix.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The session scope.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The monitor this session reads from.
    pub fn monitor(&self) -> Option<&Arc<MonitorCore>> {
        self.monitor.as_ref()
    }

    /// The session thresholds.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Uptime at which the window was opened.
    pub fn begin_millis(&self) -> u64 {
        self.begin_millis
    }

    /// Application stats of the finished window, `None` until `finish`.
    pub fn app_stats(&self) -> Option<&AppStats> {
        self.app_stats.as_ref()
    }

    /// Overrides the application stats, e.g. for a window measured elsewhere.
    pub fn set_app_stats(&mut self, app_stats: AppStats) -> &mut Self {
        self.app_stats = Some(app_stats);
        self
    }

    /// Stacks of the threads found hot at finish, by thread id.
    pub fn stacks(&self) -> &HashMap<u32, String> {
        &self.stacks
    }

    /// Caller-defined annotations.
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Mutable access to the caller-defined annotations.
    pub fn extras_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extras
    }

    /// Stores one annotation, replacing any earlier value for `key`.
    pub fn put_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// A copy of the frequency-step histogram, if cpufreq sampling built one.
    pub fn cpu_freq_histogram(&self) -> Option<CpuFreqHistogram> {
        self.cpu_freq_histogram.as_ref().map(|h| lock_histogram(h).clone())
    }

    /// Collects the stacks of hot threads at the end of a background
    /// [`Scope::Canary`] session.
    ///
    /// Threads are visited hottest first and the walk stops at the first
    /// thread under the per-minute threshold.
    fn collect_stacks(&mut self, app_stats: &AppStats) {
        if self.scope != Scope::Canary || app_stats.is_foreground() {
            return;
        }
        let Some(monitor) = &self.monitor else {
            return;
        };
        let Some(delta) = self.deltas.get(&MetricKind::ProcessJiffies) else {
            return;
        };
        let Some(process) = delta.value.as_process_jiffies() else {
            return;
        };
        let minute = delta.minutes();
        if minute < self.config.stack_min_minutes {
            return;
        }
        let Some(collector) = monitor.stack_collector() else {
            log::debug!("{} no stack collector, skip hot thread stacks", self.id);
            return;
        };

        for thread in &process.threads {
            let avg = thread.jiffies / minute;
            if avg < self.config.stack_thread_avg_jiffies {
                break;
            }
            match collector.collect(thread.tid) {
                Some(stack) if !stack.is_empty() => {
                    log::info!("{} hot thread {} ({}), avg {} jiffies/min", self.id, thread.tid, thread.name, avg);
                    self.stacks.insert(thread.tid, stack);
                }
                _ => log::debug!("{} no stack for thread {}", self.id, thread.tid),
            }
        }
    }
}

fn lock_histogram(histogram: &Mutex<CpuFreqHistogram>) -> MutexGuard<'_, CpuFreqHistogram> {
    histogram.lock().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for CompositeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeMonitor")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("metrics", &self.metrics)
            .field("deltas", &self.deltas.len())
            .field("samplers", &self.samplers.len())
            .field("app_stats", &self.app_stats)
            .finish()
    }
}

impl fmt::Display for CompositeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CompositeMonitor {} [{}]", self.id, self.scope)?;
        if let Some(stats) = &self.app_stats {
            writeln!(
                f,
                "  during {} ms, {:?}, {:?}",
                stats.during_millis, stats.app_state, stats.device_state
            )?;
        }

        let mut kinds: Vec<_> = self.deltas.keys().copied().collect();
        kinds.sort();
        for kind in kinds {
            if let Some(delta) = self.deltas.get(&kind) {
                writeln!(f, "  delta {}: {} ms", kind, delta.during_millis)?;
            }
        }

        let mut kinds: Vec<_> = self.sample_results.keys().copied().collect();
        kinds.sort();
        for kind in kinds {
            if let Some(result) = self.sample_results.get(&kind) {
                writeln!(
                    f,
                    "  sampling {}: count {}, avg {:.2}, min {:.2}, max {:.2}",
                    result.tag, result.count, result.avg, result.min, result.max
                )?;
            }
        }

        for (name, deltas) in self.ranked_task_deltas().iter().take(10) {
            let jiffies: u64 = deltas.iter().map(|(_, d)| d.jiffies).sum();
            writeln!(f, "  task {}: {} jiffies over {} runs", name, jiffies, deltas.len())?;
        }
        Ok(())
    }
}
