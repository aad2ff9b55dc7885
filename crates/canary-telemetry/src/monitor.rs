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

//! The capabilities a session reads from, assembled once at startup.

use crate::sampling::SchedulerHandle;
use canary_core::app_stats::{AppState, AppStats, DeviceState};
use canary_core::clock::{Clock, MonotonicClock};
use canary_core::metric::{MetricKind, Snapshot, TaskSource};
use canary_core::provider::{
    AppStatsSource, DeviceCapabilities, PowerProfile, ProviderRegistry, SnapshotProvider,
    StackCollector, TaskTracer,
};
use std::sync::Arc;

/// Reports the same application and device state for every window.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAppStats {
    /// State reported for every window.
    pub app_state: AppState,
    /// Device state reported for every window.
    pub device_state: DeviceState,
}

impl AppStatsSource for StaticAppStats {
    fn current(&self, during_millis: u64) -> AppStats {
        AppStats::new(during_millis, self.app_state, self.device_state)
    }
}

/// Everything a session needs from the host: providers, the sampling
/// scheduler, and the auxiliary capabilities.
///
/// Built with [`MonitorCoreBuilder`] and shared behind an `Arc` by every
/// session of the host.
pub struct MonitorCore {
    providers: ProviderRegistry,
    scheduler: SchedulerHandle,
    clock: Arc<dyn Clock>,
    app_stats: Arc<dyn AppStatsSource>,
    stack_collector: Option<Arc<dyn StackCollector>>,
    device: Option<Arc<dyn DeviceCapabilities>>,
    power_profile: Option<Arc<dyn PowerProfile>>,
}

impl MonitorCore {
    /// Starts building a monitor that samples on `scheduler`.
    pub fn builder(scheduler: SchedulerHandle) -> MonitorCoreBuilder {
        MonitorCoreBuilder::new(scheduler)
    }

    /// The provider registry.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The scheduler samplers run on.
    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// The clock providers stamp their snapshots with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The application stats source.
    pub fn app_stats_source(&self) -> &Arc<dyn AppStatsSource> {
        &self.app_stats
    }

    /// The stack collector, if the host has one.
    pub fn stack_collector(&self) -> Option<&Arc<dyn StackCollector>> {
        self.stack_collector.as_ref()
    }

    /// The device frequency tables, if known.
    pub fn device_capabilities(&self) -> Option<&Arc<dyn DeviceCapabilities>> {
        self.device.as_ref()
    }

    /// The vendor power profile, if known.
    pub fn power_profile(&self) -> Option<&Arc<dyn PowerProfile>> {
        self.power_profile.as_ref()
    }

    /// The provider for `kind`, provided it is supported on this device.
    pub fn supported_provider(&self, kind: MetricKind) -> Option<Arc<dyn SnapshotProvider>> {
        self.providers
            .snapshot_provider(kind)
            .filter(|p| p.is_supported())
            .cloned()
    }

    /// The tracer for `source`.
    pub fn task_tracer(&self, source: TaskSource) -> Option<Arc<dyn TaskTracer>> {
        self.providers.task_tracer(source).cloned()
    }

    /// Reads the current snapshot of `kind`, `None` when unavailable.
    pub fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
        self.supported_provider(kind)?.current_snapshot(kind)
    }
}

impl std::fmt::Debug for MonitorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorCore")
            .field("providers", &self.providers)
            .field("scheduler", &self.scheduler)
            .field("stack_collector", &self.stack_collector.is_some())
            .field("device", &self.device.is_some())
            .field("power_profile", &self.power_profile.is_some())
            .finish()
    }
}

/// Builder for [`MonitorCore`].
pub struct MonitorCoreBuilder {
    providers: ProviderRegistry,
    scheduler: SchedulerHandle,
    clock: Arc<dyn Clock>,
    app_stats: Arc<dyn AppStatsSource>,
    stack_collector: Option<Arc<dyn StackCollector>>,
    device: Option<Arc<dyn DeviceCapabilities>>,
    power_profile: Option<Arc<dyn PowerProfile>>,
}

impl MonitorCoreBuilder {
    /// Creates a builder with no providers, a [`MonotonicClock`], and
    /// foreground [`StaticAppStats`].
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            providers: ProviderRegistry::new(),
            scheduler,
            clock: Arc::new(MonotonicClock::new()),
            app_stats: Arc::new(StaticAppStats::default()),
            stack_collector: None,
            device: None,
            power_profile: None,
        }
    }

    /// Replaces the whole provider registry.
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Registers `provider` for `kind`.
    pub fn snapshot_provider(mut self, kind: MetricKind, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.providers.insert_snapshot_provider(kind, provider);
        self
    }

    /// Registers `tracer` for `source`.
    pub fn task_tracer(mut self, source: TaskSource, tracer: Arc<dyn TaskTracer>) -> Self {
        self.providers.insert_task_tracer(source, tracer);
        self
    }

    /// Sets the clock sessions and providers share.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the application stats source.
    pub fn app_stats_source(mut self, source: Arc<dyn AppStatsSource>) -> Self {
        self.app_stats = source;
        self
    }

    /// Sets the stack collector.
    pub fn stack_collector(mut self, collector: Arc<dyn StackCollector>) -> Self {
        self.stack_collector = Some(collector);
        self
    }

    /// Sets the device frequency tables.
    pub fn device_capabilities(mut self, device: Arc<dyn DeviceCapabilities>) -> Self {
        self.device = Some(device);
        self
    }

    /// Sets the vendor power profile.
    pub fn power_profile(mut self, profile: Arc<dyn PowerProfile>) -> Self {
        self.power_profile = Some(profile);
        self
    }

    /// Finishes the monitor.
    pub fn build(self) -> Arc<MonitorCore> {
        log::info!(
            "Monitor assembled with {} snapshot providers on scheduler '{}'",
            self.providers.len(),
            self.scheduler.name()
        );
        Arc::new(MonitorCore {
            providers: self.providers,
            scheduler: self.scheduler,
            clock: self.clock,
            app_stats: self.app_stats,
            stack_collector: self.stack_collector,
            device: self.device,
            power_profile: self.power_profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplingScheduler;
    use canary_core::metric::SnapshotValue;

    struct Unsupported;

    impl SnapshotProvider for Unsupported {
        fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
            Some(Snapshot::new(kind, 0, SnapshotValue::Gauge(0.0)))
        }

        fn is_supported(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_unsupported_provider_reads_nothing() {
        let scheduler = SamplingScheduler::spawn("test-monitor").unwrap();
        let monitor = MonitorCore::builder(scheduler.handle())
            .snapshot_provider(MetricKind::CpuState, Arc::new(Unsupported))
            .build();

        assert!(monitor.providers().contains(MetricKind::CpuState));
        assert!(monitor.supported_provider(MetricKind::CpuState).is_none());
        assert!(monitor.current_snapshot(MetricKind::CpuState).is_none());
        assert!(monitor.current_snapshot(MetricKind::Wifi).is_none());
    }

    #[test]
    fn test_static_app_stats() {
        let source = StaticAppStats {
            app_state: AppState::Background,
            device_state: DeviceState::ScreenOff,
        };
        let stats = source.current(120_000);
        assert_eq!(stats.during_millis, 120_000);
        assert!(!stats.is_foreground());
    }
}
