// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Config is created by the host daemon and passed down into the scheduler,
//! whereupon it is available to all components. Holds the things typically
//! configured by CLI flags or the config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Listen address for the line-oriented stream transport. The daemon
    /// refuses to start when no listener at all is configured.
    pub telnet_listen: Option<String>,
    /// Path to the world database. `None` runs on a throwaway temp store.
    pub database_path: Option<PathBuf>,
    /// Seconds of inactivity before a descriptor is forcibly closed.
    pub idle_timeout_secs: u64,
    /// Scheduler tick interval, milliseconds.
    pub tick_ms: u64,
    /// Immediate-queue entries executed per tick.
    pub tasks_per_tick: usize,
    /// Per-executor admission cap on the immediate queue.
    pub max_queue_per_obj: usize,
    /// Whether `connect guest` is honored.
    pub guests_enabled: bool,
    /// Dbref of the master room, whose exits and `$`-commands apply
    /// everywhere.
    pub master_room: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telnet_listen: Some("0.0.0.0:4201".to_string()),
            database_path: None,
            idle_timeout_secs: 3600,
            tick_ms: 10,
            tasks_per_tick: 32,
            max_queue_per_obj: 1000,
            guests_enabled: true,
            master_room: 2,
        }
    }
}

impl Config {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
