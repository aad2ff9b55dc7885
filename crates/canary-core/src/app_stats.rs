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

//! Application state over a measurement window, and the session scope tag.

use crate::metric::ONE_MIN_MILLIS;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Where the application spent the measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppState {
    /// Visible and interactive.
    #[default]
    Foreground,
    /// Not visible, but running a foreground service.
    ForegroundService,
    /// Not visible.
    Background,
}

/// What the device was doing during the measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceState {
    /// Running on battery with the screen on.
    #[default]
    Unplugged,
    /// Connected to a charger.
    Charging,
    /// Screen off.
    ScreenOff,
    /// Battery saver active.
    LowEnergy,
}

/// Application statistics over a measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppStats {
    /// Length of the window in milliseconds.
    pub during_millis: u64,
    /// Dominant application state.
    pub app_state: AppState,
    /// Dominant device state.
    pub device_state: DeviceState,
}

impl AppStats {
    /// Creates stats for a window of `during_millis`.
    pub fn new(during_millis: u64, app_state: AppState, device_state: DeviceState) -> Self {
        Self {
            during_millis,
            app_state,
            device_state,
        }
    }

    /// Whole minutes covered by the window, never less than one.
    pub fn minutes(&self) -> u64 {
        (self.during_millis / ONE_MIN_MILLIS).max(1)
    }

    /// `true` unless the application was in the background.
    pub fn is_foreground(&self) -> bool {
        self.app_state != AppState::Background
    }
}

/// A session tag selecting optional behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// No particular scope.
    #[default]
    Unknown,
    /// Background power monitoring. Enables hot-thread stack collection.
    Canary,
    /// Internal diagnostics.
    Internal,
    /// Overheat investigation.
    Overheat,
}

impl Scope {
    /// Returns the lowercase name of the scope.
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Unknown => "unknown",
            Scope::Canary => "canary",
            Scope::Internal => "internal",
            Scope::Overheat => "overheat",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    /// Unrecognized names map to [`Scope::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "canary" => Scope::Canary,
            "internal" => Scope::Internal,
            "overheat" => Scope::Overheat,
            _ => Scope::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_floor_is_one() {
        let stats = AppStats::new(30_000, AppState::Background, DeviceState::ScreenOff);
        assert_eq!(stats.minutes(), 1);
        assert!(!stats.is_foreground());

        let stats = AppStats::new(5 * 60_000 + 59_999, AppState::ForegroundService, DeviceState::Unplugged);
        assert_eq!(stats.minutes(), 5);
        assert!(stats.is_foreground());
    }

    #[test]
    fn test_scope_round_trip_names() {
        for scope in [Scope::Unknown, Scope::Canary, Scope::Internal, Scope::Overheat] {
            assert_eq!(scope.name().parse::<Scope>().unwrap(), scope);
        }
        assert_eq!("bogus".parse::<Scope>().unwrap(), Scope::Unknown);
    }
}
