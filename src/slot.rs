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

//! Exclusive resource slots shared by neighbouring actors.
//!
//! Each slot owns its own mutex and condition variable. Waiters are woken one
//! at a time on release; wake-up order is whatever the platform condvar picks,
//! so nothing here promises FIFO fairness.

use crate::actor::ActorId;
use log::{trace, warn};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long `ResourceSlot::acquire` may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWait {
    Blocking,
    Timed(Duration),
}

/// Result of a slot acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAcquire {
    Acquired,
    TimedOut,
}

impl SlotAcquire {
    pub fn is_acquired(self) -> bool {
        matches!(self, SlotAcquire::Acquired)
    }
}

#[derive(Debug, Default)]
struct SlotState {
    held: bool,
    holder: Option<ActorId>,
}

/// A binary, lockable unit of contention.
#[derive(Debug)]
pub struct ResourceSlot {
    index: usize,
    state: Mutex<SlotState>,
    available: Condvar,
}

impl ResourceSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: Mutex::new(SlotState::default()),
            available: Condvar::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Waits until the slot is free and marks it held by `holder`.
    pub fn acquire(&self, holder: ActorId, wait: SlotWait) -> SlotAcquire {
        let guard = self.lock_state();
        let mut guard = match wait {
            SlotWait::Blocking => self
                .available
                .wait_while(guard, |state| state.held)
                .unwrap_or_else(PoisonError::into_inner),
            SlotWait::Timed(timeout) => {
                let (guard, result) = self
                    .available
                    .wait_timeout_while(guard, timeout, |state| state.held)
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() && guard.held {
                    trace!("{holder} timed out waiting for slot {}", self.index);
                    return SlotAcquire::TimedOut;
                }
                guard
            }
        };

        guard.held = true;
        guard.holder = Some(holder);
        trace!("{holder} took slot {}", self.index);
        SlotAcquire::Acquired
    }

    /// Takes the slot only if it is free right now.
    pub fn try_acquire(&self, holder: ActorId) -> bool {
        let mut guard = self.lock_state();
        if guard.held {
            return false;
        }
        guard.held = true;
        guard.holder = Some(holder);
        true
    }

    /// Frees the slot and wakes a single waiter.
    ///
    /// Releasing a slot that is already free leaves it free.
    pub fn release(&self) {
        {
            let mut guard = self.lock_state();
            if !guard.held {
                warn!("Slot {} released while already free", self.index);
                return;
            }
            guard.held = false;
            guard.holder = None;
        }
        self.available.notify_one();
    }

    pub fn is_held(&self) -> bool {
        self.lock_state().held
    }

    pub fn holder(&self) -> Option<ActorId> {
        self.lock_state().holder
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The two slots adjacent to an actor in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPair {
    pub left: usize,
    pub right: usize,
}

impl SlotPair {
    /// Actor `id` (1-based) sits between slot `id - 1` and slot `id mod n`.
    pub fn for_actor(id: ActorId, ring_size: usize) -> Self {
        let id = id.get();
        Self {
            left: id - 1,
            right: id % ring_size,
        }
    }

    /// Slot indices in ascending order.
    pub fn ascending(&self) -> (usize, usize) {
        if self.left <= self.right {
            (self.left, self.right)
        } else {
            (self.right, self.left)
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.left == index || self.right == index
    }

    pub fn indices(&self) -> [usize; 2] {
        [self.left, self.right]
    }
}

impl fmt::Display for SlotPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slots {} and {}", self.left, self.right)
    }
}

/// Flat array of slots forming the ring; neighbours are found by index arithmetic.
#[derive(Debug)]
pub struct SlotRing {
    slots: Vec<ResourceSlot>,
}

impl SlotRing {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(ResourceSlot::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Panics if `index` is outside the ring; pairs are always built from `SlotPair::for_actor`.
    pub fn slot(&self, index: usize) -> &ResourceSlot {
        &self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSlot> {
        self.slots.iter()
    }

    pub fn held_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_held()).count()
    }

    pub fn held_by(&self, holder: ActorId) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.holder() == Some(holder))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn actor(id: usize) -> ActorId {
        ActorId::new(id).unwrap()
    }

    #[test]
    fn acquire_and_release_toggle_held() {
        let slot = ResourceSlot::new(0);
        assert!(!slot.is_held());
        assert!(slot.acquire(actor(1), SlotWait::Blocking).is_acquired());
        assert!(slot.is_held());
        assert_eq!(slot.holder(), Some(actor(1)));
        slot.release();
        assert!(!slot.is_held());
        assert_eq!(slot.holder(), None);
    }

    #[test]
    fn timed_acquire_gives_up_while_held() {
        let slot = ResourceSlot::new(3);
        assert!(slot.try_acquire(actor(1)));

        let started = Instant::now();
        let outcome = slot.acquire(actor(2), SlotWait::Timed(Duration::from_millis(30)));
        assert_eq!(outcome, SlotAcquire::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(slot.holder(), Some(actor(1)));
    }

    #[test]
    fn try_acquire_fails_when_held() {
        let slot = ResourceSlot::new(0);
        assert!(slot.try_acquire(actor(1)));
        assert!(!slot.try_acquire(actor(2)));
    }

    #[test]
    fn release_is_idempotent() {
        let slot = ResourceSlot::new(0);
        slot.release();
        assert!(!slot.is_held());

        assert!(slot.try_acquire(actor(1)));
        slot.release();
        slot.release();
        assert!(!slot.is_held());
        assert!(slot.try_acquire(actor(2)));
    }

    #[test]
    fn release_wakes_blocked_waiter() {
        let slot = Arc::new(ResourceSlot::new(0));
        assert!(slot.try_acquire(actor(1)));

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.acquire(actor(2), SlotWait::Blocking))
        };

        thread::sleep(Duration::from_millis(20));
        slot.release();
        assert_eq!(waiter.join().unwrap(), SlotAcquire::Acquired);
        assert_eq!(slot.holder(), Some(actor(2)));
    }

    #[test]
    fn pair_wraps_for_last_actor() {
        assert_eq!(
            SlotPair::for_actor(actor(1), 5),
            SlotPair { left: 0, right: 1 }
        );
        let last = SlotPair::for_actor(actor(5), 5);
        assert_eq!(last, SlotPair { left: 4, right: 0 });
        assert_eq!(last.ascending(), (0, 4));
    }

    #[test]
    fn minimal_ring_pairs_share_both_slots() {
        let first = SlotPair::for_actor(actor(1), 2);
        let second = SlotPair::for_actor(actor(2), 2);
        assert_eq!(first.ascending(), (0, 1));
        assert_eq!(second.ascending(), (0, 1));
        assert!(second.contains(0) && second.contains(1));
    }

    #[test]
    fn ring_counts_holders() {
        let ring = SlotRing::new(4);
        assert_eq!(ring.len(), 4);
        assert!(ring.slot(1).try_acquire(actor(2)));
        assert!(ring.slot(2).try_acquire(actor(2)));
        assert_eq!(ring.held_count(), 2);
        assert_eq!(ring.held_by(actor(2)), 2);
        assert_eq!(ring.held_by(actor(1)), 0);
    }
}
