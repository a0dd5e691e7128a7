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

//! Bounded waits with retreat and jittered retry.
//!
//! An actor takes its left slot, then its right slot, each with a deadline.
//! When either wait expires it drops whatever it holds and backs off. Nobody
//! blocks forever while holding a slot, so there is no deadlock, but actors
//! that retreat in lockstep can livelock; the per-actor jitter exists to pull
//! them apart.

use crate::actor::ActorId;
use crate::arbitration::backoff::RetryBackoff;
use crate::arbitration::timeout::AcquireTimeout;
use crate::arbitration::{ArbitrationStrategy, PairOutcome, PairRequest, StrategyKind};
use crate::slot::{SlotPair, SlotRing, SlotWait};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct RetryState {
    backoff: RetryBackoff,
    rng: StdRng,
}

pub struct TimedBackoff {
    slots: Arc<SlotRing>,
    timeout: AcquireTimeout,
    retry: Vec<Mutex<RetryState>>,
}

impl TimedBackoff {
    /// With a `seed`, each actor's jitter sequence is derived from
    /// `seed ^ actor_id` and is reproducible across runs.
    pub fn new(
        slots: Arc<SlotRing>,
        timeout: AcquireTimeout,
        backoff: RetryBackoff,
        seed: Option<u64>,
    ) -> Self {
        let retry = (1..=slots.len())
            .map(|id| {
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed ^ id as u64),
                    None => StdRng::from_entropy(),
                };
                Mutex::new(RetryState {
                    backoff: backoff.clone(),
                    rng,
                })
            })
            .collect();

        Self {
            slots,
            timeout,
            retry,
        }
    }

    fn retreat(
        &self,
        actor: ActorId,
        slot: usize,
        waited_since: Instant,
        request: &PairRequest<'_>,
    ) -> PairOutcome {
        let retry_after = {
            let mut state = self.retry_state(actor);
            let RetryState { backoff, rng } = &mut *state;
            backoff.next_jittered(rng)
        };
        request
            .observer()
            .on_slot_timeout(actor, slot, waited_since.elapsed());
        debug!(
            "{actor} gave up on slot {slot} after {}; retrying in {retry_after:?}",
            self.timeout
        );
        PairOutcome::TimedOut { slot, retry_after }
    }

    fn retry_state(&self, actor: ActorId) -> MutexGuard<'_, RetryState> {
        self.retry[actor.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArbitrationStrategy for TimedBackoff {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Timed
    }

    fn acquire_pair(&self, request: &PairRequest<'_>) -> PairOutcome {
        let actor = request.actor();
        let SlotPair { left, right } = request.pair();
        let wait = SlotWait::Timed(self.timeout.as_duration());

        let started = Instant::now();
        if !self.slots.slot(left).acquire(actor, wait).is_acquired() {
            return self.retreat(actor, left, started, request);
        }
        request.observer().on_first_acquired(actor, left);

        let started = Instant::now();
        if !self.slots.slot(right).acquire(actor, wait).is_acquired() {
            self.slots.slot(left).release();
            return self.retreat(actor, right, started, request);
        }

        self.retry_state(actor).backoff.reset();
        PairOutcome::Acquired
    }

    fn release_pair(&self, _actor: ActorId, pair: SlotPair) {
        self.slots.slot(pair.right).release();
        self.slots.slot(pair.left).release();
    }

    fn ring_size(&self) -> usize {
        self.slots.len()
    }

    fn held_slots(&self) -> usize {
        self.slots.held_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::AcquisitionObserver;
    use crate::cancellation::CancellationToken;
    use std::time::Duration;

    fn actor(id: usize) -> ActorId {
        ActorId::new(id).unwrap()
    }

    fn strategy(slots: &Arc<SlotRing>, timeout_ms: u64) -> TimedBackoff {
        TimedBackoff::new(
            Arc::clone(slots),
            AcquireTimeout::from_millis(timeout_ms),
            RetryBackoff::new(Duration::from_millis(4), 2, Duration::from_millis(16)),
            Some(11),
        )
    }

    #[derive(Default)]
    struct TimeoutRecorder {
        timeouts: Mutex<Vec<usize>>,
    }

    impl AcquisitionObserver for TimeoutRecorder {
        fn on_slot_timeout(&self, _actor: ActorId, slot: usize, waited: Duration) {
            assert!(waited >= Duration::from_millis(20));
            self.timeouts.lock().unwrap().push(slot);
        }
    }

    #[test]
    fn acquires_free_pair() {
        let slots = Arc::new(SlotRing::new(5));
        let timed = strategy(&slots, 20);
        let cancellation = CancellationToken::new();
        let pair = SlotPair::for_actor(actor(2), 5);

        let outcome = timed.acquire_pair(&PairRequest::new(actor(2), pair, &cancellation));
        assert_eq!(outcome, PairOutcome::Acquired);
        assert_eq!(slots.held_by(actor(2)), 2);

        timed.release_pair(actor(2), pair);
        assert_eq!(slots.held_count(), 0);
    }

    #[test]
    fn retreats_when_left_slot_is_busy() {
        let slots = Arc::new(SlotRing::new(5));
        let timed = strategy(&slots, 20);
        let cancellation = CancellationToken::new();
        let recorder = TimeoutRecorder::default();
        assert!(slots.slot(1).try_acquire(actor(1)));

        let pair = SlotPair::for_actor(actor(2), 5);
        let request = PairRequest::new(actor(2), pair, &cancellation).with_observer(&recorder);
        match timed.acquire_pair(&request) {
            PairOutcome::TimedOut { slot, retry_after } => {
                assert_eq!(slot, 1);
                assert!(retry_after >= Duration::from_millis(2));
                assert!(retry_after <= Duration::from_millis(4));
            }
            other => panic!("Expected timeout, got {other:?}"),
        }
        assert_eq!(slots.held_by(actor(2)), 0);
        assert_eq!(recorder.timeouts.lock().unwrap().as_slice(), [1]);
    }

    #[test]
    fn releases_first_slot_when_right_slot_times_out() {
        let slots = Arc::new(SlotRing::new(5));
        let timed = strategy(&slots, 20);
        let cancellation = CancellationToken::new();
        assert!(slots.slot(2).try_acquire(actor(3)));

        let pair = SlotPair::for_actor(actor(2), 5);
        let outcome = timed.acquire_pair(&PairRequest::new(actor(2), pair, &cancellation));
        assert!(matches!(outcome, PairOutcome::TimedOut { slot: 2, .. }));
        assert!(!slots.slot(1).is_held());
        assert_eq!(slots.held_by(actor(2)), 0);
    }

    #[test]
    fn repeated_retreats_back_off_further() {
        let slots = Arc::new(SlotRing::new(5));
        let timed = strategy(&slots, 20);
        let cancellation = CancellationToken::new();
        assert!(slots.slot(1).try_acquire(actor(1)));
        let pair = SlotPair::for_actor(actor(2), 5);

        let mut delays = Vec::new();
        for _ in 0..3 {
            if let PairOutcome::TimedOut { retry_after, .. } =
                timed.acquire_pair(&PairRequest::new(actor(2), pair, &cancellation))
            {
                delays.push(retry_after);
            }
        }
        assert_eq!(delays.len(), 3);
        assert!(delays[2] >= Duration::from_millis(8));
        assert!(delays[2] > delays[0]);
    }
}
