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

//! A periodic poller accumulating a [`SamplingResult`].

use super::scheduler::SchedulerHandle;
use canary_core::sampling::{Reading, SamplingResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What a read function is told about the tick it runs for.
#[derive(Debug, Clone, Copy)]
pub struct SamplerTick<'a> {
    /// The sampler tag.
    pub tag: &'a str,
    /// Number of completed ticks before this one, valid or not.
    pub count: u64,
}

/// Produces one reading per tick. Runs on the scheduler thread.
pub type ReadFn = Box<dyn FnMut(&SamplerTick<'_>) -> Reading + Send>;

struct Tally {
    ticks: u64,
    result: SamplingResult,
}

// The owner only ever waits on `tally`, which the worker holds for the
// length of an `accumulate`. `read` is locked by the worker alone.
struct SamplerShared {
    active: AtomicBool,
    generation: AtomicU64,
    read: Mutex<ReadFn>,
    tally: Mutex<Tally>,
}

impl SamplerShared {
    fn is_live(&self, generation: u64) -> bool {
        self.active.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self, tag: &str, generation: u64) -> bool {
        if !self.is_live(generation) {
            return false;
        }
        let count = self.tally().ticks;
        let reading = {
            let mut read = self.read.lock().unwrap_or_else(PoisonError::into_inner);
            (*read)(&SamplerTick { tag, count })
        };

        let mut tally = self.tally();
        if !self.is_live(generation) {
            log::trace!("onSampling {} {} dropped, sampler paused", count, tag);
            return false;
        }
        log::trace!("onSampling {} {}, val = {:?}", count, tag, reading);
        tally.ticks += 1;
        tally.result.accumulate(reading);
        true
    }
}

/// A periodic poller bound to a tag and a read function.
///
/// The sampler is tied to the scheduler it was created with and is not
/// `Clone`: sessions that fork do not take their samplers along.
pub struct Sampler {
    tag: String,
    interval_millis: u64,
    scheduler: SchedulerHandle,
    shared: Arc<SamplerShared>,
    running_since: Option<Instant>,
    accumulated: Duration,
}

impl Sampler {
    /// Creates a paused sampler polling every `interval_millis` once started.
    pub fn new(
        tag: impl Into<String>,
        scheduler: SchedulerHandle,
        interval_millis: u64,
        read: ReadFn,
    ) -> Self {
        let tag = tag.into();
        let shared = SamplerShared {
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            read: Mutex::new(read),
            tally: Mutex::new(Tally {
                ticks: 0,
                result: SamplingResult::new(tag.clone(), interval_millis),
            }),
        };
        Self {
            tag,
            interval_millis,
            scheduler,
            shared: Arc::new(shared),
            running_since: None,
            accumulated: Duration::ZERO,
        }
    }

    /// The sampler tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The polling interval in milliseconds.
    pub fn interval_millis(&self) -> u64 {
        self.interval_millis
    }

    /// Returns `true` between `start` and `pause`.
    pub fn is_running(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Starts polling. The first reading is taken right away.
    pub fn start(&mut self) {
        if self.interval_millis == 0 {
            log::warn!("Sampler '{}' has no interval, not started", self.tag);
            return;
        }
        if self.is_running() {
            return;
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.active.store(true, Ordering::Release);
        self.running_since = Some(Instant::now());

        let shared = Arc::clone(&self.shared);
        let tag = self.tag.clone();
        let scheduled = self.scheduler.schedule(
            self.tag.clone(),
            Duration::from_millis(self.interval_millis),
            Box::new(move || shared.tick(&tag, generation)),
        );

        if scheduled {
            log::debug!("Sampler '{}' started every {} ms", self.tag, self.interval_millis);
        } else {
            self.pause();
        }
    }

    /// Stops polling. No reading is stored after this returns; a read in
    /// flight finishes on the scheduler thread and is dropped.
    pub fn pause(&mut self) {
        {
            let _tally = self.shared.tally();
            if !self.shared.active.swap(false, Ordering::AcqRel) {
                return;
            }
        }
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    /// The statistics accumulated so far.
    pub fn result(&self) -> SamplingResult {
        let mut result = self.shared.tally().result.clone();
        let current = self.running_since.map(|t| t.elapsed()).unwrap_or_default();
        result.during_millis = (self.accumulated + current).as_millis() as u64;
        result
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("tag", &self.tag)
            .field("interval_millis", &self.interval_millis)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::scheduler::SamplingScheduler;
    use approx::assert_relative_eq;
    use std::thread;

    fn wait_for(sampler: &Sampler, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sampler.result().count < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_sampler_accumulates_valid_readings_only() {
        let scheduler = SamplingScheduler::spawn("test-sampler").unwrap();
        let mut sampler = Sampler::new(
            "alternating",
            scheduler.handle(),
            1,
            Box::new(|tick| {
                if tick.count % 2 == 0 {
                    Reading::Value(10.0 * (tick.count + 1) as f64)
                } else {
                    Reading::Invalid
                }
            }),
        );
        sampler.start();
        wait_for(&sampler, 3);
        sampler.pause();

        let result = sampler.result();
        // Valid ticks are 0, 2, 4, ... producing 10, 30, 50, ...
        assert!(result.count >= 3);
        assert_relative_eq!(result.min, 10.0);
        assert_eq!(result.tag, "alternating");
        assert_eq!(result.interval_millis, 1);
    }

    #[test]
    fn test_pause_stops_future_ticks() {
        let scheduler = SamplingScheduler::spawn("test-sampler").unwrap();
        let mut sampler = Sampler::new("const", scheduler.handle(), 1, Box::new(|_| Reading::Value(1.0)));
        sampler.start();
        wait_for(&sampler, 2);
        sampler.pause();
        assert!(!sampler.is_running());

        let paused_count = sampler.result().count;
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sampler.result().count, paused_count);
    }

    #[test]
    fn test_zero_interval_is_not_started() {
        let scheduler = SamplingScheduler::spawn("test-sampler").unwrap();
        let mut sampler = Sampler::new("never", scheduler.handle(), 0, Box::new(|_| Reading::Value(1.0)));
        sampler.start();
        assert!(!sampler.is_running());
    }

    #[test]
    fn test_restart_does_not_double_schedule() {
        let scheduler = SamplingScheduler::spawn("test-sampler").unwrap();
        let mut sampler = Sampler::new("restart", scheduler.handle(), 3_600_000, Box::new(|_| Reading::Value(1.0)));
        sampler.start();
        sampler.start();
        wait_for(&sampler, 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sampler.result().count, 1);
    }

    #[test]
    fn test_owner_does_not_wait_for_read_in_flight() {
        let scheduler = SamplingScheduler::spawn("test-sampler").unwrap();
        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let mut sampler = Sampler::new(
            "slow",
            scheduler.handle(),
            3_600_000,
            Box::new(move |_| {
                flag.store(true, Ordering::Release);
                thread::sleep(Duration::from_millis(400));
                Reading::Value(1.0)
            }),
        );
        sampler.start();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !entered.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(entered.load(Ordering::Acquire));

        let begin = Instant::now();
        assert!(sampler.is_running());
        let _ = sampler.result();
        sampler.pause();
        assert!(begin.elapsed() < Duration::from_millis(200));

        // The in-flight reading lands after the pause and is dropped.
        thread::sleep(Duration::from_millis(600));
        assert_eq!(sampler.result().count, 0);
    }
}
