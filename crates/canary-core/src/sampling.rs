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

//! Individual sampler readings and the running statistics built from them.

use serde::{Deserialize, Serialize};

/// One reading produced by a sampler callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// A valid numeric reading.
    Value(f64),
    /// The metric could not be read this tick. Excluded from every aggregate.
    Invalid,
}

impl Reading {
    /// Returns the value if the reading is valid.
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Invalid => None,
        }
    }
}

/// Running statistics of one sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingResult {
    /// The sampler tag, e.g. `"cpufreq"`.
    pub tag: String,
    /// Polling interval in milliseconds.
    pub interval_millis: u64,
    /// Number of valid readings.
    pub count: u64,
    /// Sum of valid readings.
    pub sum: f64,
    /// Running average of valid readings, `0.0` before the first one.
    pub avg: f64,
    /// Largest valid reading, `f64::MIN` before the first one.
    pub max: f64,
    /// Smallest valid reading, `f64::MAX` before the first one.
    pub min: f64,
    /// Time between the sampler's start and its last pause.
    pub during_millis: u64,
}

impl SamplingResult {
    /// Creates an empty result for the sampler `tag`.
    pub fn new(tag: impl Into<String>, interval_millis: u64) -> Self {
        Self {
            tag: tag.into(),
            interval_millis,
            count: 0,
            sum: 0.0,
            avg: 0.0,
            max: f64::MIN,
            min: f64::MAX,
            during_millis: 0,
        }
    }

    /// Folds one reading into the statistics. Invalid readings are ignored.
    pub fn accumulate(&mut self, reading: Reading) {
        let Some(value) = reading.value() else {
            return;
        };
        self.count += 1;
        self.sum += value;
        self.avg = self.sum / self.count as f64;
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_readings_are_excluded() {
        let mut result = SamplingResult::new("batt-temp", 1_000);
        result.accumulate(Reading::Value(30.0));
        result.accumulate(Reading::Invalid);
        result.accumulate(Reading::Value(40.0));
        result.accumulate(Reading::Invalid);

        assert_eq!(result.count, 2);
        assert_relative_eq!(result.avg, 35.0);
        assert_relative_eq!(result.max, 40.0);
        assert_relative_eq!(result.min, 30.0);
    }

    #[test]
    fn test_empty_result() {
        let mut result = SamplingResult::new("cpufreq", 1_000);
        result.accumulate(Reading::Invalid);
        assert_eq!(result.count, 0);
        assert_eq!(result.avg, 0.0);
    }
}
