// Copyright 2025 dentsusoken
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

#![allow(dead_code)]

use ringdine::actor::ActorId;
use ringdine::arbitration::StrategyKind;
use ringdine::config::RingConfig;
use ringdine::report::{ActorEvent, EventKind, ReportSink};
use ringdine::workload::FixedWorkload;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Config with a fixed seed and the given shape; workload ranges are unused
/// because tests install a [`FixedWorkload`].
pub fn ring_config(strategy: StrategyKind, actors: usize, cycles: u64) -> RingConfig {
    RingConfig {
        actors,
        cycles,
        strategy,
        seed: Some(0x5eed),
        ..RingConfig::default()
    }
}

pub fn fixed_workload(think_us: u64, eat_us: u64) -> Arc<FixedWorkload> {
    Arc::new(FixedWorkload::new(
        Duration::from_micros(think_us),
        Duration::from_micros(eat_us),
    ))
}

type Holdings = dyn Fn(ActorId) -> usize + Send + Sync;

/// Checks, at every reported transition, how many slots the reporting actor
/// holds. An actor's holdings only change on its own thread, so the check
/// never races with the state it inspects.
pub struct HoldingProbe {
    holdings: Box<Holdings>,
    mismatches: AtomicU64,
    first_mismatch: Mutex<Option<String>>,
    events: AtomicU64,
}

impl HoldingProbe {
    pub fn new(holdings: impl Fn(ActorId) -> usize + Send + Sync + 'static) -> Self {
        Self {
            holdings: Box::new(holdings),
            mismatches: AtomicU64::new(0),
            first_mismatch: Mutex::new(None),
            events: AtomicU64::new(0),
        }
    }

    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::SeqCst)
    }

    pub fn first_mismatch(&self) -> Option<String> {
        self.first_mismatch.lock().unwrap().clone()
    }
}

impl ReportSink for HoldingProbe {
    fn report(&self, event: &ActorEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
        let expected = match event.kind {
            EventKind::Dining => 2,
            EventKind::HoldingFirst { .. } => 1,
            EventKind::Thinking
            | EventKind::Hungry
            | EventKind::FinishedDining
            | EventKind::Retreated { .. }
            | EventKind::Rejected
            | EventKind::Done => 0,
        };
        let held = (self.holdings)(event.actor);
        if held != expected {
            self.mismatches.fetch_add(1, Ordering::SeqCst);
            self.first_mismatch
                .lock()
                .unwrap()
                .get_or_insert_with(|| format!("'{event}' while holding {held} slot(s)"));
        }
    }
}
