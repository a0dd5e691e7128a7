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

//! Strategy-independent occupancy counters.
//!
//! Actors bracket every eating interval with [`OccupancyMonitor::begin_eating`]
//! and the returned guard. The bracket sits strictly inside the strategy's
//! grant (after acquire, before release), so two overlapping brackets on the
//! same slot mean two actors really believed they held it at the same time.

use crate::actor::ActorId;
use crate::slot::SlotPair;
use log::warn;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct OccupancyMonitor {
    occupants: Vec<AtomicUsize>,
    violations: AtomicU64,
    eating: AtomicUsize,
    peak_eating: AtomicUsize,
    meals: AtomicU64,
}

/// Point-in-time copy of the monitor's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccupancySnapshot {
    pub mutual_exclusion_violations: u64,
    pub peak_concurrent_eaters: usize,
    pub eating_now: usize,
    pub meals: u64,
}

impl OccupancyMonitor {
    pub fn new(ring_size: usize) -> Self {
        Self {
            occupants: (0..ring_size).map(|_| AtomicUsize::new(0)).collect(),
            violations: AtomicU64::new(0),
            eating: AtomicUsize::new(0),
            peak_eating: AtomicUsize::new(0),
            meals: AtomicU64::new(0),
        }
    }

    pub fn begin_eating(&self, actor: ActorId, pair: SlotPair) -> EatingGuard<'_> {
        for index in pair.indices() {
            let before = self.occupants[index].fetch_add(1, Ordering::SeqCst);
            if before > 0 {
                self.violations.fetch_add(1, Ordering::SeqCst);
                warn!("{actor} is using slot {index} while {before} other actor(s) hold it");
            }
        }
        let eating = self.eating.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_eating.fetch_max(eating, Ordering::SeqCst);
        self.meals.fetch_add(1, Ordering::Relaxed);

        EatingGuard {
            monitor: self,
            pair,
        }
    }

    pub fn snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            mutual_exclusion_violations: self.violations.load(Ordering::SeqCst),
            peak_concurrent_eaters: self.peak_eating.load(Ordering::SeqCst),
            eating_now: self.eating.load(Ordering::SeqCst),
            meals: self.meals.load(Ordering::Relaxed),
        }
    }

    pub fn occupants(&self, index: usize) -> usize {
        self.occupants[index].load(Ordering::SeqCst)
    }

    fn end_eating(&self, pair: SlotPair) {
        self.eating.fetch_sub(1, Ordering::SeqCst);
        for index in pair.indices() {
            self.occupants[index].fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Closes an eating interval when dropped.
#[must_use = "the eating interval ends when the guard is dropped"]
pub struct EatingGuard<'a> {
    monitor: &'a OccupancyMonitor,
    pair: SlotPair,
}

impl Drop for EatingGuard<'_> {
    fn drop(&mut self) {
        self.monitor.end_eating(self.pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: usize) -> ActorId {
        ActorId::new(id).unwrap()
    }

    #[test]
    fn disjoint_pairs_are_not_violations() {
        let monitor = OccupancyMonitor::new(5);
        let first = monitor.begin_eating(actor(1), SlotPair::for_actor(actor(1), 5));
        let third = monitor.begin_eating(actor(3), SlotPair::for_actor(actor(3), 5));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.mutual_exclusion_violations, 0);
        assert_eq!(snapshot.eating_now, 2);
        assert_eq!(snapshot.peak_concurrent_eaters, 2);

        drop(first);
        drop(third);
        assert_eq!(monitor.snapshot().eating_now, 0);
        assert_eq!(monitor.occupants(1), 0);
    }

    #[test]
    fn overlapping_neighbours_are_counted() {
        let monitor = OccupancyMonitor::new(5);
        let _first = monitor.begin_eating(actor(1), SlotPair::for_actor(actor(1), 5));
        let _second = monitor.begin_eating(actor(2), SlotPair::for_actor(actor(2), 5));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.mutual_exclusion_violations, 1);
        assert_eq!(monitor.occupants(1), 2);
        assert_eq!(snapshot.meals, 2);
    }
}
