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

//! Providers reading the host: `/proc` for jiffies, `sysinfo` for CPU
//! frequencies and temperatures, sysfs for frequency step tables.

use canary_core::clock::Clock;
use canary_core::metric::{
    DigitEntry, MetricKind, ProcessJiffies, Snapshot, SnapshotValue, TaskDelta, ThreadJiffies,
};
use canary_core::provider::{
    SnapshotProvider, StackCollector, StaticDeviceCapabilities, StaticPowerProfile, TaskTracer,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::{Components, System};

/// Splits a `/proc/<pid>/stat` line into its command name and user plus
/// system jiffies.
pub fn parse_stat_jiffies(stat: &str) -> Option<(String, u64)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let name = stat.get(open + 1..close)?.to_string();
    // Fields after the command start at `state`, so utime and stime sit at 11 and 12.
    let fields: Vec<&str> = stat.get(close + 1..)?.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((name, utime + stime))
}

/// Parses the per-core lines of `/proc/stat` into one busy-jiffies step per core.
pub fn parse_cpu_state(stat: &str) -> Vec<Vec<u64>> {
    stat.lines()
        .filter(|line| line.starts_with("cpu") && line.as_bytes().get(3).is_some_and(u8::is_ascii_digit))
        .map(|line| {
            let busy: u64 = line
                .split_whitespace()
                .skip(1)
                .take(7)
                .enumerate()
                .filter(|(i, _)| *i != 3) // idle
                .filter_map(|(_, v)| v.parse::<u64>().ok())
                .sum();
            vec![busy]
        })
        .collect()
}

/// Jiffies consumed so far by the calling thread, `0` when unknown.
pub fn current_thread_jiffies() -> u64 {
    fs::read_to_string("/proc/thread-self/stat")
        .ok()
        .and_then(|s| parse_stat_jiffies(&s))
        .map_or(0, |(_, jiffies)| jiffies)
}

/// Reads process and CPU-state jiffies from `/proc`.
pub struct ProcProvider {
    clock: Arc<dyn Clock>,
}

impl ProcProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn read_process(&self) -> Option<ProcessJiffies> {
        let (name, jiffies) = parse_stat_jiffies(&fs::read_to_string("/proc/self/stat").ok()?)?;
        let mut threads = Vec::new();
        for entry in fs::read_dir("/proc/self/task").ok()?.flatten() {
            let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some((name, jiffies)) = parse_stat_jiffies(&stat) {
                threads.push(ThreadJiffies { tid, name, jiffies });
            }
        }
        Some(ProcessJiffies {
            pid: std::process::id(),
            name,
            jiffies,
            threads,
        })
    }
}

impl SnapshotProvider for ProcProvider {
    fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
        let value = match kind {
            MetricKind::ProcessJiffies => SnapshotValue::ProcessJiffies(self.read_process()?),
            MetricKind::CpuState => {
                let cores = parse_cpu_state(&fs::read_to_string("/proc/stat").ok()?);
                if cores.is_empty() {
                    return None;
                }
                SnapshotValue::CpuState(cores)
            }
            _ => return None,
        };
        Some(Snapshot::new(kind, self.clock.uptime_millis(), value))
    }

    fn is_supported(&self) -> bool {
        Path::new("/proc/self/stat").exists()
    }
}

/// Reads CPU frequencies and temperatures through `sysinfo`.
pub struct SysinfoProvider {
    clock: Arc<dyn Clock>,
    system: Arc<Mutex<System>>,
}

impl SysinfoProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut system = System::new_all();
        system.refresh_cpu_frequency();
        Self {
            clock,
            system: Arc::new(Mutex::new(system)),
        }
    }

    fn cpu_freqs(&self) -> Vec<DigitEntry> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_frequency();
        system
            .cpus()
            .iter()
            .enumerate()
            .map(|(core, cpu)| DigitEntry::new(format!("cpu{core}"), i64::try_from(cpu.frequency()).unwrap_or(i64::MAX)))
            .collect()
    }

    fn max_temperature() -> Option<f64> {
        let components = Components::new_with_refreshed_list();
        let mut max_temp: Option<f64> = None;
        for component in &components {
            if let Some(temp) = component.temperature() {
                max_temp = Some(max_temp.map_or(f64::from(temp), |m| m.max(f64::from(temp))));
            }
        }
        max_temp
    }

    /// Number of logical CPUs.
    pub fn cpu_core_num(&self) -> usize {
        self.system.lock().unwrap_or_else(PoisonError::into_inner).cpus().len()
    }
}

impl SnapshotProvider for SysinfoProvider {
    fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
        let value = match kind {
            MetricKind::CpuFreq => SnapshotValue::Digits(self.cpu_freqs()),
            MetricKind::ThermalStat => SnapshotValue::Gauge(Self::max_temperature().unwrap_or(-1.0)),
            _ => return None,
        };
        Some(Snapshot::new(kind, self.clock.uptime_millis(), value))
    }
}

/// Loads per-core frequency steps in MHz from sysfs, with a power profile
/// that puts each core in its own cluster.
pub fn load_device_capabilities(core_num: usize) -> Option<(StaticDeviceCapabilities, StaticPowerProfile)> {
    let mut steps = Vec::with_capacity(core_num);
    for core in 0..core_num {
        let dir = format!("/sys/devices/system/cpu/cpu{core}/cpufreq");
        let khz: Vec<u32> = match fs::read_to_string(format!("{dir}/scaling_available_frequencies")) {
            Ok(list) => list.split_whitespace().filter_map(|v| v.parse().ok()).collect(),
            Err(_) => ["cpuinfo_min_freq", "cpuinfo_max_freq"]
                .iter()
                .filter_map(|f| fs::read_to_string(format!("{dir}/{f}")).ok())
                .filter_map(|v| v.trim().parse().ok())
                .collect(),
        };
        if khz.is_empty() {
            log::info!("No frequency table for cpu{core}");
            return None;
        }
        let mut mhz: Vec<u32> = khz.into_iter().map(|f| f / 1_000).collect();
        mhz.sort_unstable();
        mhz.dedup();
        steps.push(mhz);
    }

    let profile = StaticPowerProfile::new((0..core_num).collect(), steps.iter().map(Vec::len).collect());
    Some((StaticDeviceCapabilities::new(steps), profile))
}

/// Reports where a thread is blocked in the kernel, as far as `/proc` tells.
pub struct WchanCollector;

impl StackCollector for WchanCollector {
    fn collect(&self, tid: u32) -> Option<String> {
        let dir = format!("/proc/self/task/{tid}");
        let comm = fs::read_to_string(format!("{dir}/comm")).ok()?;
        let wchan = fs::read_to_string(format!("{dir}/wchan")).unwrap_or_default();
        Some(format!("{} waiting in {}", comm.trim(), wchan.trim()))
    }
}

/// Task deltas recorded by the workload itself.
pub struct WorkloadTracer {
    clock: Arc<dyn Clock>,
    deltas: Mutex<Vec<TaskDelta>>,
}

impl WorkloadTracer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            deltas: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, delta: TaskDelta) {
        self.deltas.lock().unwrap_or_else(PoisonError::into_inner).push(delta);
    }
}

impl TaskTracer for WorkloadTracer {
    fn current_task_deltas(&self, window_millis: u64) -> Vec<TaskDelta> {
        let since = self.clock.uptime_millis().saturating_sub(window_millis);
        self.deltas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.end_millis >= since)
            .cloned()
            .collect()
    }
}
