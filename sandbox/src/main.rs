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

// Canary Sandbox
// Runs one measurement session over a CPU-bound workload on this machine.
//
// Usage: sandbox [config.json] [seconds]

mod providers;

use anyhow::{Context, Result};
use canary_core::app_stats::Scope;
use canary_core::clock::{Clock, MonotonicClock};
use canary_core::metric::{MetricKind, TaskDelta, TaskSource};
use canary_telemetry::{CompositeMonitor, MonitorCore, SamplingScheduler, SessionConfig};
use providers::{ProcProvider, SysinfoProvider, WchanCollector, WorkloadTracer};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WORKLOADS: [&str; 3] = ["hash", "spin", "hash"];

fn load_config(path: Option<&str>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read config '{path}'"))?;
    SessionConfig::from_json(&json).with_context(|| format!("Invalid session config '{path}'"))
}

fn burn(duration: Duration) -> u64 {
    let deadline = Instant::now() + duration;
    let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
    while Instant::now() < deadline {
        x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
    }
    std::hint::black_box(x)
}

fn run_workload(clock: &dyn Clock, tracer: &WorkloadTracer, total: Duration) {
    let slice = total / WORKLOADS.len() as u32;
    for name in WORKLOADS {
        let begin = clock.uptime_millis();
        let jiffies = providers::current_thread_jiffies();
        burn(slice);
        let spent = providers::current_thread_jiffies().saturating_sub(jiffies);
        tracer.record(TaskDelta::new(name, begin, clock.uptime_millis(), spent));
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next().as_deref())?;
    let seconds: u64 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("Invalid duration '{s}'"))?,
        None => 3,
    };

    let scheduler = SamplingScheduler::spawn("canary-sampler").context("Failed to start sampling scheduler")?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let procfs = Arc::new(ProcProvider::new(Arc::clone(&clock)));
    let sys = Arc::new(SysinfoProvider::new(Arc::clone(&clock)));
    let tracer = Arc::new(WorkloadTracer::new(Arc::clone(&clock)));

    let mut builder = MonitorCore::builder(scheduler.handle())
        .clock(Arc::clone(&clock))
        .snapshot_provider(MetricKind::ProcessJiffies, procfs.clone())
        .snapshot_provider(MetricKind::CpuState, procfs)
        .snapshot_provider(MetricKind::CpuFreq, sys.clone())
        .snapshot_provider(MetricKind::ThermalStat, sys.clone())
        .task_tracer(TaskSource::ThreadPool, tracer.clone())
        .stack_collector(Arc::new(WchanCollector));
    match providers::load_device_capabilities(sys.cpu_core_num()) {
        Some((device, profile)) => {
            builder = builder
                .device_capabilities(Arc::new(device))
                .power_profile(Arc::new(profile));
        }
        None => log::warn!("CPU frequency tables unavailable, normalized load disabled"),
    }
    let monitor = builder.build();

    let mut session = CompositeMonitor::with_scope(Some(monitor), Scope::Canary).with_config(config);
    session
        .metric_cpu_load()
        .sample_with_interval(MetricKind::CpuFreq, 200)
        .sample_with_interval(MetricKind::ThermalStat, 1_000)
        .put_extra("host", "sandbox");

    session.start();
    run_workload(clock.as_ref(), &tracer, Duration::from_secs(seconds));
    session.finish();
    session.refresh_task_deltas(TaskSource::ThreadPool).collect_task_deltas();

    log::info!(
        "cpu load {}, normalized {}, device {}",
        session.cpu_load(),
        session.normalized_cpu_load(),
        session.dev_cpu_load()
    );
    println!("{session}");

    let summary = serde_json::json!({
        "id": session.id().to_string(),
        "scope": session.scope(),
        "app_stats": session.app_stats(),
        "deltas": session.deltas(),
        "sampling": session.sampling_results(),
        "tasks": session.ranked_task_deltas(),
        "histogram": session.cpu_freq_histogram(),
        "extras": session.extras(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
