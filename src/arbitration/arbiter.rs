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

//! A single decision point for every grant and release.
//!
//! All slot flags live behind one mutex. A pair is granted only when both
//! flags are clear and fewer than `cap` pairs are out, and both flags flip in
//! the same critical section, so no other actor can ever observe half a
//! grant. This arbiter keeps its own flags and does not touch `ResourceSlot`
//! locks.

use crate::actor::ActorId;
use crate::arbitration::{ArbitrationStrategy, PairOutcome, PairRequest, StrategyKind};
use crate::error::RingError;
use crate::slot::SlotPair;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp;
use std::fmt;
use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Upper bound on a single condition wait so cancellation is noticed promptly.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(25);

/// How a refused request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArbiterMode {
    /// Wait on the arbiter's condition variable until the pair can be granted.
    #[default]
    Blocking,
    /// Re-poll a bounded number of times, then report a rejection.
    Polling,
}

impl fmt::Display for ArbiterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbiterMode::Blocking => f.write_str("blocking"),
            ArbiterMode::Polling => f.write_str("polling"),
        }
    }
}

impl FromStr for ArbiterMode {
    type Err = RingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocking" | "wait" => Ok(ArbiterMode::Blocking),
            "polling" | "poll" => Ok(ArbiterMode::Polling),
            other => Err(RingError::InvalidConfig(format!(
                "unknown arbiter mode '{other}'; expected 'blocking' or 'polling'"
            ))),
        }
    }
}

#[derive(Debug)]
struct ArbiterState {
    holders: Vec<Option<ActorId>>,
    active_pairs: usize,
    peak_pairs: usize,
}

impl ArbiterState {
    fn can_grant(&self, pair: SlotPair, cap: usize) -> bool {
        self.active_pairs < cap
            && self.holders[pair.left].is_none()
            && self.holders[pair.right].is_none()
    }
}

pub struct CentralArbiter {
    state: Mutex<ArbiterState>,
    released: Condvar,
    cap: usize,
    mode: ArbiterMode,
    poll_interval: Duration,
    poll_attempts: usize,
}

impl CentralArbiter {
    pub fn new(ring_size: usize, cap: usize, mode: ArbiterMode) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                holders: vec![None; ring_size],
                active_pairs: 0,
                peak_pairs: 0,
            }),
            released: Condvar::new(),
            cap: cmp::max(cap, 1),
            mode,
            poll_interval: Duration::from_micros(100),
            poll_attempts: 50,
        }
    }

    /// floor(N/2): the most pairs a ring of N slots can ever hold at once.
    pub fn default_cap(ring_size: usize) -> usize {
        cmp::max(ring_size / 2, 1)
    }

    pub fn with_polling(mut self, interval: Duration, attempts: usize) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = cmp::max(attempts, 1);
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn mode(&self) -> ArbiterMode {
        self.mode
    }

    /// Grants both slots of `pair` to `actor`, or neither. Never blocks on contention.
    pub fn try_acquire_pair(&self, actor: ActorId, pair: SlotPair) -> bool {
        let mut state = self.lock_state();
        self.grant_locked(&mut state, actor, pair)
    }

    pub fn active_pairs(&self) -> usize {
        self.lock_state().active_pairs
    }

    /// Highest number of simultaneously granted pairs seen so far.
    pub fn peak_pairs(&self) -> usize {
        self.lock_state().peak_pairs
    }

    pub fn held_by(&self, actor: ActorId) -> usize {
        self.lock_state()
            .holders
            .iter()
            .filter(|holder| **holder == Some(actor))
            .count()
    }

    pub fn is_held(&self, index: usize) -> bool {
        self.lock_state().holders[index].is_some()
    }

    fn grant_locked(&self, state: &mut ArbiterState, actor: ActorId, pair: SlotPair) -> bool {
        if !state.can_grant(pair, self.cap) {
            return false;
        }
        state.holders[pair.left] = Some(actor);
        state.holders[pair.right] = Some(actor);
        state.active_pairs += 1;
        state.peak_pairs = cmp::max(state.peak_pairs, state.active_pairs);
        trace!(
            "Granted {pair} to {actor} ({} of {} pairs active)",
            state.active_pairs, self.cap
        );
        true
    }

    fn acquire_blocking(&self, request: &PairRequest<'_>) -> PairOutcome {
        let actor = request.actor();
        let pair = request.pair();
        let started = Instant::now();
        let mut state = self.lock_state();

        loop {
            if self.grant_locked(&mut state, actor, pair) {
                drop(state);
                request.observer().on_granted(actor, started.elapsed());
                return PairOutcome::Acquired;
            }
            if request.cancellation().is_cancelled() {
                debug!("{actor} stopped waiting for {pair}: ring is shutting down");
                return PairOutcome::Cancelled;
            }
            state = self
                .released
                .wait_timeout(state, CANCEL_CHECK_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn acquire_polling(&self, request: &PairRequest<'_>) -> PairOutcome {
        let actor = request.actor();
        let pair = request.pair();
        let started = Instant::now();

        for attempt in 1..=self.poll_attempts {
            if self.try_acquire_pair(actor, pair) {
                request.observer().on_granted(actor, started.elapsed());
                return PairOutcome::Acquired;
            }
            if attempt == self.poll_attempts {
                break;
            }
            if !request.cancellation().sleep(self.poll_interval) {
                return PairOutcome::Cancelled;
            }
        }

        request.observer().on_rejected(actor, self.poll_attempts);
        PairOutcome::Rejected
    }

    fn lock_state(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArbitrationStrategy for CentralArbiter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arbiter
    }

    fn acquire_pair(&self, request: &PairRequest<'_>) -> PairOutcome {
        match self.mode {
            ArbiterMode::Blocking => self.acquire_blocking(request),
            ArbiterMode::Polling => self.acquire_polling(request),
        }
    }

    /// Clears only the slots `actor` actually holds; releasing twice is a no-op.
    fn release_pair(&self, actor: ActorId, pair: SlotPair) {
        {
            let mut state = self.lock_state();
            let mut cleared = 0;
            for index in pair.indices() {
                if state.holders[index] == Some(actor) {
                    state.holders[index] = None;
                    cleared += 1;
                }
            }
            if cleared == 2 {
                state.active_pairs = state.active_pairs.saturating_sub(1);
            } else if cleared == 0 {
                debug!("{actor} released {pair} without holding it");
            }
        }
        // Several neighbours may have become grantable.
        self.released.notify_all();
    }

    fn ring_size(&self) -> usize {
        self.lock_state().holders.len()
    }

    fn held_slots(&self) -> usize {
        self.lock_state()
            .holders
            .iter()
            .filter(|holder| holder.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::AcquisitionObserver;
    use crate::cancellation::CancellationToken;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn actor(id: usize) -> ActorId {
        ActorId::new(id).unwrap()
    }

    #[test]
    fn parse_arbiter_modes() {
        assert_eq!("Polling".parse::<ArbiterMode>().unwrap(), ArbiterMode::Polling);
        assert_eq!("wait".parse::<ArbiterMode>().unwrap(), ArbiterMode::Blocking);
        assert!(matches!(
            "spin".parse::<ArbiterMode>(),
            Err(RingError::InvalidConfig(_))
        ));
    }

    fn pair(id: usize, n: usize) -> SlotPair {
        SlotPair::for_actor(actor(id), n)
    }

    #[test]
    fn grants_all_or_nothing() {
        let arbiter = CentralArbiter::new(5, 2, ArbiterMode::Polling);
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));

        // Actor 2 shares slot 1 with actor 1.
        assert!(!arbiter.try_acquire_pair(actor(2), pair(2, 5)));
        assert_eq!(arbiter.held_by(actor(2)), 0);
        assert!(!arbiter.is_held(2));

        assert!(arbiter.try_acquire_pair(actor(3), pair(3, 5)));
        assert_eq!(arbiter.active_pairs(), 2);
    }

    #[test]
    fn cap_limits_disjoint_grants() {
        let arbiter = CentralArbiter::new(6, 1, ArbiterMode::Polling);
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 6)));
        assert!(!arbiter.try_acquire_pair(actor(4), pair(4, 6)));

        arbiter.release_pair(actor(1), pair(1, 6));
        assert!(arbiter.try_acquire_pair(actor(4), pair(4, 6)));
        assert_eq!(arbiter.peak_pairs(), 1);
    }

    #[test]
    fn default_cap_is_half_the_ring() {
        assert_eq!(CentralArbiter::default_cap(5), 2);
        assert_eq!(CentralArbiter::default_cap(6), 3);
        assert_eq!(CentralArbiter::default_cap(2), 1);
        assert_eq!(CentralArbiter::new(5, 0, ArbiterMode::Blocking).cap(), 1);
    }

    #[test]
    fn held_slots_follow_grants_and_releases() {
        let arbiter = CentralArbiter::new(5, 2, ArbiterMode::Polling);
        assert_eq!(arbiter.ring_size(), 5);
        assert_eq!(arbiter.held_slots(), 0);

        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));
        assert!(arbiter.try_acquire_pair(actor(3), pair(3, 5)));
        assert_eq!(arbiter.held_slots(), 4);

        arbiter.release_pair(actor(1), pair(1, 5));
        assert_eq!(arbiter.held_slots(), 2);
    }

    #[test]
    fn double_release_does_not_corrupt_counters() {
        let arbiter = CentralArbiter::new(5, 2, ArbiterMode::Polling);
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));
        arbiter.release_pair(actor(1), pair(1, 5));
        arbiter.release_pair(actor(1), pair(1, 5));
        assert_eq!(arbiter.active_pairs(), 0);

        // A stray release from a neighbour leaves the holder's grant intact.
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));
        arbiter.release_pair(actor(2), pair(2, 5));
        assert!(arbiter.is_held(1));
        assert_eq!(arbiter.active_pairs(), 1);
    }

    #[derive(Default)]
    struct RejectionCounter {
        rejected: AtomicUsize,
    }

    impl AcquisitionObserver for RejectionCounter {
        fn on_rejected(&self, _actor: ActorId, attempts: usize) {
            self.rejected.fetch_add(attempts, Ordering::SeqCst);
        }
    }

    #[test]
    fn polling_mode_rejects_after_attempts() {
        let arbiter = CentralArbiter::new(5, 2, ArbiterMode::Polling)
            .with_polling(Duration::from_micros(50), 3);
        let cancellation = CancellationToken::new();
        let counter = RejectionCounter::default();
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));

        let request =
            PairRequest::new(actor(2), pair(2, 5), &cancellation).with_observer(&counter);
        assert_eq!(arbiter.acquire_pair(&request), PairOutcome::Rejected);
        assert_eq!(counter.rejected.load(Ordering::SeqCst), 3);
        assert_eq!(arbiter.held_by(actor(2)), 0);
    }

    #[test]
    fn blocking_mode_waits_for_release() {
        let arbiter = Arc::new(CentralArbiter::new(5, 2, ArbiterMode::Blocking));
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));

        let waiter = {
            let arbiter = Arc::clone(&arbiter);
            thread::spawn(move || {
                let cancellation = CancellationToken::new();
                arbiter.acquire_pair(&PairRequest::new(actor(2), pair(2, 5), &cancellation))
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert_eq!(arbiter.held_by(actor(2)), 0);
        arbiter.release_pair(actor(1), pair(1, 5));

        assert_eq!(waiter.join().unwrap(), PairOutcome::Acquired);
        assert_eq!(arbiter.held_by(actor(2)), 2);
    }

    struct LockInspector<'a> {
        arbiter: &'a CentralArbiter,
        lock_free_at_grant: AtomicUsize,
    }

    impl AcquisitionObserver for LockInspector<'_> {
        fn on_granted(&self, _actor: ActorId, _waited: Duration) {
            if self.arbiter.state.try_lock().is_ok() {
                self.lock_free_at_grant.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn grant_is_reported_outside_the_arbiter_lock() {
        for mode in [ArbiterMode::Blocking, ArbiterMode::Polling] {
            let arbiter = CentralArbiter::new(5, 2, mode);
            let cancellation = CancellationToken::new();
            let inspector = LockInspector {
                arbiter: &arbiter,
                lock_free_at_grant: AtomicUsize::new(0),
            };

            let request =
                PairRequest::new(actor(1), pair(1, 5), &cancellation).with_observer(&inspector);
            assert_eq!(arbiter.acquire_pair(&request), PairOutcome::Acquired);
            assert_eq!(inspector.lock_free_at_grant.load(Ordering::SeqCst), 1, "{mode}");
        }
    }

    #[test]
    fn blocking_mode_honours_cancellation() {
        let arbiter = CentralArbiter::new(5, 2, ArbiterMode::Blocking);
        let cancellation = CancellationToken::new();
        assert!(arbiter.try_acquire_pair(actor(1), pair(1, 5)));
        cancellation.cancel();

        let request = PairRequest::new(actor(2), pair(2, 5), &cancellation);
        assert_eq!(arbiter.acquire_pair(&request), PairOutcome::Cancelled);
        assert_eq!(arbiter.held_by(actor(2)), 0);
    }
}
