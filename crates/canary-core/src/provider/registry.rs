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

//! A startup-built map from metric kinds to the providers that read them.
//!
//! The [`ProviderRegistry`] is filled once when the monitor is assembled and
//! then only read. Sessions look providers up by [`MetricKind`] or
//! [`TaskSource`]; a missing entry means the metric is unavailable.

use super::{SnapshotProvider, TaskTracer};
use crate::metric::{MetricKind, TaskSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Provider lookup keyed by metric kind and task source.
///
/// # Example
///
/// ```rust
/// use canary_core::metric::{MetricKind, Snapshot, SnapshotValue};
/// use canary_core::provider::{ProviderRegistry, SnapshotProvider};
/// use std::sync::Arc;
///
/// struct Thermometer;
///
/// impl SnapshotProvider for Thermometer {
///     fn current_snapshot(&self, kind: MetricKind) -> Option<Snapshot> {
///         Some(Snapshot::new(kind, 0, SnapshotValue::Gauge(36.5)))
///     }
/// }
///
/// let mut registry = ProviderRegistry::new();
/// registry.insert_snapshot_provider(MetricKind::BatteryTemperature, Arc::new(Thermometer));
///
/// let provider = registry.snapshot_provider(MetricKind::BatteryTemperature).unwrap();
/// assert!(provider.current_snapshot(MetricKind::BatteryTemperature).is_some());
/// ```
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    snapshots: HashMap<MetricKind, Arc<dyn SnapshotProvider>>,
    tracers: HashMap<TaskSource, Arc<dyn TaskTracer>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
            tracers: HashMap::new(),
        }
    }

    /// Registers `provider` for `kind`, replacing any previous one.
    pub fn insert_snapshot_provider(&mut self, kind: MetricKind, provider: Arc<dyn SnapshotProvider>) {
        if self.snapshots.insert(kind, provider).is_some() {
            log::debug!("Replaced snapshot provider for {kind}");
        }
    }

    /// Registers `provider` for every kind in `kinds`.
    pub fn insert_snapshot_provider_for(
        &mut self,
        kinds: &[MetricKind],
        provider: Arc<dyn SnapshotProvider>,
    ) {
        for kind in kinds {
            self.insert_snapshot_provider(*kind, Arc::clone(&provider));
        }
    }

    /// Registers `tracer` for `source`, replacing any previous one.
    pub fn insert_task_tracer(&mut self, source: TaskSource, tracer: Arc<dyn TaskTracer>) {
        if self.tracers.insert(source, tracer).is_some() {
            log::debug!("Replaced task tracer for {source}");
        }
    }

    /// Returns the provider registered for `kind`.
    #[must_use]
    pub fn snapshot_provider(&self, kind: MetricKind) -> Option<&Arc<dyn SnapshotProvider>> {
        self.snapshots.get(&kind)
    }

    /// Returns the tracer registered for `source`.
    #[must_use]
    pub fn task_tracer(&self, source: TaskSource) -> Option<&Arc<dyn TaskTracer>> {
        self.tracers.get(&source)
    }

    /// Returns `true` if a provider is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: MetricKind) -> bool {
        self.snapshots.contains_key(&kind)
    }

    /// Number of kinds with a registered provider.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if neither providers nor tracers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.tracers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.snapshots.keys().collect();
        kinds.sort();
        let mut sources: Vec<_> = self.tracers.keys().collect();
        sources.sort();
        f.debug_struct("ProviderRegistry")
            .field("snapshots", &kinds)
            .field("tracers", &sources)
            .finish()
    }
}
