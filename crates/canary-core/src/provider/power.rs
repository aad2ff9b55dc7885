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

//! CPU topology as seen by the device and by its power profile.
//!
//! The two are separate sources: the device reports the frequency steps it
//! actually exposes per core, while the power profile describes the clusters
//! the vendor calibrated power numbers for. They disagree on some devices.

/// The frequency tables exposed by the device.
pub trait DeviceCapabilities: Send + Sync {
    /// Number of online CPU cores.
    fn cpu_core_num(&self) -> usize;

    /// Ascending frequency steps of every core, in kHz.
    fn cpu_freq_steps(&self) -> Vec<Vec<u32>>;
}

/// The vendor power profile.
pub trait PowerProfile: Send + Sync {
    /// Number of CPU cores described by the profile.
    fn cpu_core_num(&self) -> usize;

    /// The cluster index that `core` belongs to.
    fn cluster_by_cpu_num(&self, core: usize) -> usize;

    /// Number of speed steps calibrated for `cluster`.
    fn num_speed_steps_in_cluster(&self, cluster: usize) -> usize;
}

/// Fixed device frequency tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDeviceCapabilities {
    /// Ascending steps per core.
    pub freq_steps: Vec<Vec<u32>>,
}

impl StaticDeviceCapabilities {
    /// Creates capabilities from per-core step tables.
    pub fn new(freq_steps: Vec<Vec<u32>>) -> Self {
        Self { freq_steps }
    }
}

impl DeviceCapabilities for StaticDeviceCapabilities {
    fn cpu_core_num(&self) -> usize {
        self.freq_steps.len()
    }

    fn cpu_freq_steps(&self) -> Vec<Vec<u32>> {
        self.freq_steps.clone()
    }
}

/// A power profile given as a core-to-cluster map and per-cluster step counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPowerProfile {
    /// Cluster index of each core.
    pub core_clusters: Vec<usize>,
    /// Speed step count of each cluster.
    pub cluster_steps: Vec<usize>,
}

impl StaticPowerProfile {
    /// Creates a profile from its cluster layout.
    pub fn new(core_clusters: Vec<usize>, cluster_steps: Vec<usize>) -> Self {
        Self {
            core_clusters,
            cluster_steps,
        }
    }
}

impl PowerProfile for StaticPowerProfile {
    fn cpu_core_num(&self) -> usize {
        self.core_clusters.len()
    }

    fn cluster_by_cpu_num(&self, core: usize) -> usize {
        self.core_clusters.get(core).copied().unwrap_or(0)
    }

    fn num_speed_steps_in_cluster(&self, cluster: usize) -> usize {
        self.cluster_steps.get(cluster).copied().unwrap_or(0)
    }
}
