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

//! Diagnostic baseline with no arbitration step.
//!
//! Checks both flags and then sets them as two separate steps, with a yield
//! in between to widen the window. Two neighbours can both pass the check and
//! "hold" the same slot. Only built with the `race_diagnostics` feature and
//! only meant for exercising the occupancy monitor and race detectors; it
//! makes no mutual exclusion claims.

use crate::actor::ActorId;
use crate::arbitration::{ArbitrationStrategy, PairOutcome, PairRequest, StrategyKind};
use crate::slot::SlotPair;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const RECHECK_INTERVAL: Duration = Duration::from_micros(100);

pub struct Unsynchronized {
    taken: Vec<AtomicBool>,
}

impl Unsynchronized {
    pub fn new(ring_size: usize) -> Self {
        Self {
            taken: (0..ring_size).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    fn looks_free(&self, pair: SlotPair) -> bool {
        !self.taken[pair.left].load(Ordering::Relaxed)
            && !self.taken[pair.right].load(Ordering::Relaxed)
    }
}

impl ArbitrationStrategy for Unsynchronized {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unsync
    }

    fn acquire_pair(&self, request: &PairRequest<'_>) -> PairOutcome {
        let pair = request.pair();
        loop {
            if self.looks_free(pair) {
                thread::yield_now();
                self.taken[pair.left].store(true, Ordering::Relaxed);
                request.observer().on_first_acquired(request.actor(), pair.left);
                self.taken[pair.right].store(true, Ordering::Relaxed);
                return PairOutcome::Acquired;
            }
            if !request.cancellation().sleep(RECHECK_INTERVAL) {
                return PairOutcome::Cancelled;
            }
        }
    }

    fn release_pair(&self, _actor: ActorId, pair: SlotPair) {
        self.taken[pair.left].store(false, Ordering::Relaxed);
        self.taken[pair.right].store(false, Ordering::Relaxed);
    }

    fn ring_size(&self) -> usize {
        self.taken.len()
    }

    fn held_slots(&self) -> usize {
        self.taken
            .iter()
            .filter(|taken| taken.load(Ordering::Relaxed))
            .count()
    }
}
