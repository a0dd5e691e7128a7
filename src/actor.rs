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

//! The think / hungry / eat cycle run by every actor thread.

use crate::arbitration::{AcquisitionObserver, ArbitrationStrategy, PairOutcome, PairRequest};
use crate::cancellation::CancellationToken;
use crate::report::{ActorEvent, EventKind};
use crate::ring::RingContext;
use crate::slot::SlotPair;
use log::{debug, trace};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 1-based actor identity; actor `i` sits between slots `i - 1` and `i mod n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(NonZeroUsize);

impl ActorId {
    pub fn new(id: usize) -> Option<Self> {
        NonZeroUsize::new(id).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Zero-based position, for per-actor tables.
    pub fn index(self) -> usize {
        self.0.get() - 1
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Thinking,
    Hungry,
    HoldingFirst,
    Eating,
    Done,
}

impl ActorState {
    pub fn can_transition_to(self, next: ActorState) -> bool {
        use ActorState::*;
        matches!(
            (self, next),
            (Thinking, Hungry)
                | (Hungry, HoldingFirst)
                | (Hungry, Eating)
                | (Hungry, Thinking)
                | (HoldingFirst, Eating)
                | (HoldingFirst, Thinking)
                | (Eating, Thinking)
        ) || (self != Done && next == Done)
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActorState::Thinking => "thinking",
            ActorState::Hungry => "hungry",
            ActorState::HoldingFirst => "holding first slot",
            ActorState::Eating => "eating",
            ActorState::Done => "done",
        };
        f.write_str(label)
    }
}

/// Per-actor counters returned when the actor's thread finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActorStats {
    pub actor: usize,
    pub cycles: u64,
    pub meals: u64,
    pub retreats: u64,
    pub rejections: u64,
    pub longest_hunger_ms: u64,
}

impl ActorStats {
    fn new(actor: ActorId) -> Self {
        Self {
            actor: actor.get(),
            cycles: 0,
            meals: 0,
            retreats: 0,
            rejections: 0,
            longest_hunger_ms: 0,
        }
    }

    fn record_hunger(&mut self, waited: Duration) {
        let millis = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
        self.longest_hunger_ms = self.longest_hunger_ms.max(millis);
    }
}

/// Releases a granted pair when dropped, so no exit path can leak it.
struct HeldPair<'a> {
    strategy: &'a dyn ArbitrationStrategy,
    actor: ActorId,
    pair: SlotPair,
}

impl Drop for HeldPair<'_> {
    fn drop(&mut self) {
        self.strategy.release_pair(self.actor, self.pair);
    }
}

pub struct Actor {
    id: ActorId,
    pair: SlotPair,
    state: Cell<ActorState>,
    strategy: Arc<dyn ArbitrationStrategy>,
    context: RingContext,
}

impl Actor {
    pub fn new(
        id: ActorId,
        ring_size: usize,
        strategy: Arc<dyn ArbitrationStrategy>,
        context: RingContext,
    ) -> Self {
        Self {
            id,
            pair: SlotPair::for_actor(id, ring_size),
            state: Cell::new(ActorState::Thinking),
            strategy,
            context,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn pair(&self) -> SlotPair {
        self.pair
    }

    pub fn state(&self) -> ActorState {
        self.state.get()
    }

    /// Runs `cycles` think/acquire rounds, or until cancelled when `cycles` is 0.
    ///
    /// A cycle is one acquisition attempt, whether or not it ends in a meal.
    pub fn run(self, cycles: u64) -> ActorStats {
        let cancellation = self.context.cancellation.clone();
        let mut stats = ActorStats::new(self.id);
        debug!("{} starts with {}", self.id, self.pair);

        while cycles == 0 || stats.cycles < cycles {
            if cancellation.is_cancelled() {
                break;
            }

            if self.state() != ActorState::Thinking {
                self.transition(ActorState::Thinking);
            }
            self.report(EventKind::Thinking);
            if !cancellation.sleep(self.context.workload.think_duration(self.id)) {
                break;
            }

            self.transition(ActorState::Hungry);
            self.report(EventKind::Hungry);
            let hungry_since = Instant::now();
            let request = PairRequest::new(self.id, self.pair, &cancellation).with_observer(&self);
            let outcome = self.strategy.acquire_pair(&request);
            stats.record_hunger(hungry_since.elapsed());

            match outcome {
                PairOutcome::Acquired => {
                    self.dine(&cancellation);
                    stats.meals += 1;
                }
                PairOutcome::TimedOut { slot, retry_after } => {
                    stats.retreats += 1;
                    self.transition(ActorState::Thinking);
                    self.report(EventKind::Retreated { slot });
                    stats.cycles += 1;
                    if !cancellation.sleep(retry_after) {
                        break;
                    }
                    continue;
                }
                PairOutcome::Rejected => {
                    stats.rejections += 1;
                    self.transition(ActorState::Thinking);
                    self.report(EventKind::Rejected);
                }
                PairOutcome::Cancelled => break,
            }
            stats.cycles += 1;
        }

        self.transition(ActorState::Done);
        self.report(EventKind::Done);
        debug!(
            "{} finished: {} cycles, {} meals, {} retreats, {} rejections",
            self.id, stats.cycles, stats.meals, stats.retreats, stats.rejections
        );
        stats
    }

    fn dine(&self, cancellation: &CancellationToken) {
        let held = HeldPair {
            strategy: self.strategy.as_ref(),
            actor: self.id,
            pair: self.pair,
        };
        self.transition(ActorState::Eating);
        let eating = self.context.monitor.begin_eating(self.id, self.pair);
        self.report(EventKind::Dining);

        // A cancelled meal is cut short; the slots are still released below.
        cancellation.sleep(self.context.workload.eat_duration(self.id));

        drop(eating);
        drop(held);
        self.report(EventKind::FinishedDining);
    }

    fn transition(&self, next: ActorState) {
        let current = self.state.get();
        debug_assert!(
            current.can_transition_to(next),
            "{} cannot go from {current} to {next}",
            self.id
        );
        trace!("{} {current} -> {next}", self.id);
        self.state.set(next);
    }

    fn report(&self, kind: EventKind) {
        self.context
            .reporter
            .report(&ActorEvent::new(self.id, kind));
    }
}

impl AcquisitionObserver for Actor {
    fn on_first_acquired(&self, _actor: ActorId, slot: usize) {
        self.transition(ActorState::HoldingFirst);
        self.report(EventKind::HoldingFirst { slot });
    }

    fn on_slot_timeout(&self, _actor: ActorId, slot: usize, waited: Duration) {
        trace!("{} waited {waited:?} for slot {slot}", self.id);
    }

    fn on_rejected(&self, _actor: ActorId, attempts: usize) {
        trace!("{} refused after {attempts} attempt(s)", self.id);
    }
}
