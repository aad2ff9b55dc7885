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

//! A single-worker periodic task scheduler shared by all samplers.
//!
//! Every task scheduled through one [`SamplingScheduler`] runs on the same
//! background thread, so callbacks of different samplers never overlap. A
//! slow callback delays everybody's next tick.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A periodic task. Returning `false` retires it.
pub type PeriodicTask = Box<dyn FnMut() -> bool + Send>;

enum Command {
    Schedule {
        tag: String,
        interval: Duration,
        task: PeriodicTask,
    },
    Shutdown,
}

struct Entry {
    due: Instant,
    seq: u64,
    tag: String,
    interval: Duration,
    task: PeriodicTask,
}

// Min-heap on (due, seq).
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

/// Owns the worker thread. Dropping it stops the worker.
pub struct SamplingScheduler {
    name: Arc<str>,
    sender: Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SamplingScheduler {
    /// Spawns the worker thread.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let name: Arc<str> = Arc::from(name.into());
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_name = Arc::clone(&name);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&worker_name, receiver))?;

        Ok(Self {
            name,
            sender,
            handle: Some(handle),
        })
    }

    /// Returns a handle samplers can schedule tasks through.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            name: Arc::clone(&self.name),
            sender: self.sender.clone(),
        }
    }

    /// Stops the worker and waits for it. Pending tasks are dropped.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(Command::Shutdown);
            if handle.join().is_err() {
                log::error!("Sampling scheduler '{}' worker panicked", self.name);
            }
        }
    }

    /// Returns `true` until [`shutdown`](Self::shutdown) has run.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SamplingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingScheduler")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// A cloneable handle onto a [`SamplingScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    name: Arc<str>,
    sender: Sender<Command>,
}

impl SchedulerHandle {
    /// Schedules `task` to run now and then every `interval` until it returns
    /// `false`. Returns `false` if the scheduler has stopped.
    pub fn schedule(&self, tag: impl Into<String>, interval: Duration, task: PeriodicTask) -> bool {
        let tag = tag.into();
        match self.sender.send(Command::Schedule { tag, interval, task }) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Sampling scheduler '{}' is stopped, task dropped", self.name);
                false
            }
        }
    }

    /// The scheduler's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").field("name", &self.name).finish()
    }
}

fn run_worker(name: &str, receiver: Receiver<Command>) {
    let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
    let mut seq: u64 = 0;

    log::info!("Sampling scheduler '{name}' started.");

    loop {
        let command = match heap.peek() {
            Some(next) => receiver.recv_timeout(next.due.saturating_duration_since(Instant::now())),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(Command::Schedule { tag, interval, task }) => {
                log::debug!("Scheduling '{tag}' every {interval:?}");
                seq += 1;
                heap.push(Entry {
                    due: Instant::now(),
                    seq,
                    tag,
                    interval,
                    task,
                });
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        while heap.peek().is_some_and(|e| e.due <= Instant::now()) {
            let Some(mut entry) = heap.pop() else {
                break;
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (entry.task)())) {
                Ok(true) => {
                    let now = Instant::now();
                    entry.due += entry.interval;
                    // Skip missed ticks instead of bursting to catch up.
                    if entry.due < now {
                        entry.due = now + entry.interval;
                    }
                    heap.push(entry);
                }
                Ok(false) => log::debug!("Task '{}' retired", entry.tag),
                Err(_) => log::error!("Task '{}' panicked and was retired", entry.tag),
            }
        }
    }

    log::info!("Sampling scheduler '{name}' stopped.");
}
