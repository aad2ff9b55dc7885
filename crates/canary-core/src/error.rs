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

//! Error types shared by the monitoring crates.

use crate::metric::MetricKind;
use std::fmt::{self, Display};

/// A specialized `Result` type for monitoring operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// An error that can occur within the monitoring engine.
///
/// Environment conditions (a metric that is unavailable on this device, a
/// provider that returned nothing) are never reported through this type; they
/// are absorbed and logged where they happen. Only misuse surfaces here.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Two snapshots of different metric kinds were diffed.
    KindMismatch {
        /// The kind of the snapshot `diff` was called on.
        expected: MetricKind,
        /// The kind of the snapshot passed as the previous reading.
        found: MetricKind,
    },
    /// Two snapshots of the same kind carry payloads of different shapes.
    ValueMismatch {
        /// The kind both snapshots claim to be.
        kind: MetricKind,
    },
    /// A caller passed an argument outside the operation's domain.
    InvalidArgument(String),
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::KindMismatch { expected, found } => {
                write!(f, "Kind mismatch: expected {expected}, found {found}")
            }
            MonitorError::ValueMismatch { kind } => {
                write!(f, "Value mismatch: snapshot payloads of {kind} differ in shape")
            }
            MonitorError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for MonitorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MonitorError::KindMismatch {
            expected: MetricKind::ProcessJiffies,
            found: MetricKind::CpuFreq,
        };
        assert_eq!(
            err.to_string(),
            "Kind mismatch: expected process_jiffies, found cpu_freq"
        );

        let err = MonitorError::InvalidArgument("Illegal millis: 0".to_string());
        assert_eq!(err.to_string(), "Invalid argument: Illegal millis: 0");
    }
}
