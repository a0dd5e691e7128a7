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

//! Deadlock freedom through a global order over slot indices.
//!
//! Every actor takes the lower-indexed slot of its pair first. No actor ever
//! waits on a lower index while holding a higher one, so the wait-for graph
//! cannot close a cycle. For the last actor of the ring (slots `n-1` and `0`)
//! this means taking its *right* slot first.

use crate::actor::ActorId;
use crate::arbitration::{ArbitrationStrategy, PairOutcome, PairRequest, StrategyKind};
use crate::slot::{SlotPair, SlotRing, SlotWait};
use log::trace;
use std::sync::Arc;

pub struct OrderedAcquisition {
    slots: Arc<SlotRing>,
}

impl OrderedAcquisition {
    pub fn new(slots: Arc<SlotRing>) -> Self {
        Self { slots }
    }
}

impl ArbitrationStrategy for OrderedAcquisition {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ordered
    }

    fn acquire_pair(&self, request: &PairRequest<'_>) -> PairOutcome {
        let actor = request.actor();
        let (first, second) = request.pair().ascending();

        // Blocking waits: completion is guaranteed by the total order, not by a deadline.
        self.slots.slot(first).acquire(actor, SlotWait::Blocking);
        request.observer().on_first_acquired(actor, first);

        self.slots.slot(second).acquire(actor, SlotWait::Blocking);
        trace!("{actor} holds slots {first} and {second}");
        PairOutcome::Acquired
    }

    fn release_pair(&self, _actor: ActorId, pair: SlotPair) {
        let (first, second) = pair.ascending();
        self.slots.slot(second).release();
        self.slots.slot(first).release();
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
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct FirstSlotRecorder {
        firsts: Mutex<Vec<usize>>,
    }

    impl AcquisitionObserver for FirstSlotRecorder {
        fn on_first_acquired(&self, _actor: ActorId, slot: usize) {
            self.firsts.lock().unwrap().push(slot);
        }
    }

    fn actor(id: usize) -> ActorId {
        ActorId::new(id).unwrap()
    }

    #[test]
    fn last_actor_takes_slot_zero_first() {
        let slots = Arc::new(SlotRing::new(5));
        let strategy = OrderedAcquisition::new(Arc::clone(&slots));
        let cancellation = CancellationToken::new();
        let recorder = FirstSlotRecorder::default();

        let pair = SlotPair::for_actor(actor(5), 5);
        let request = PairRequest::new(actor(5), pair, &cancellation).with_observer(&recorder);
        assert_eq!(strategy.acquire_pair(&request), PairOutcome::Acquired);

        assert_eq!(recorder.firsts.lock().unwrap().as_slice(), [0]);
        assert_eq!(slots.held_by(actor(5)), 2);

        assert_eq!(strategy.held_slots(), 2);
        strategy.release_pair(actor(5), pair);
        assert_eq!(slots.held_count(), 0);
        assert_eq!(strategy.held_slots(), 0);
    }

    #[test]
    fn neighbour_waits_until_release() {
        let slots = Arc::new(SlotRing::new(3));
        let strategy = Arc::new(OrderedAcquisition::new(Arc::clone(&slots)));
        let cancellation = CancellationToken::new();

        let first_pair = SlotPair::for_actor(actor(1), 3);
        let request = PairRequest::new(actor(1), first_pair, &cancellation);
        assert!(strategy.acquire_pair(&request).is_acquired());

        let waiter = {
            let strategy = Arc::clone(&strategy);
            thread::spawn(move || {
                let cancellation = CancellationToken::new();
                let pair = SlotPair::for_actor(actor(2), 3);
                let request = PairRequest::new(actor(2), pair, &cancellation);
                strategy.acquire_pair(&request)
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert_eq!(slots.slot(1).holder(), Some(actor(1)));
        strategy.release_pair(actor(1), first_pair);

        assert_eq!(waiter.join().unwrap(), PairOutcome::Acquired);
        assert_eq!(slots.held_by(actor(2)), 2);
    }
}
