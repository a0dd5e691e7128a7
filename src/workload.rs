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

use crate::actor::ActorId;
use crate::config::WorkloadConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Supplies how long an actor thinks and eats each cycle.
pub trait WorkloadSource: Send + Sync {
    fn think_duration(&self, actor: ActorId) -> Duration;

    fn eat_duration(&self, actor: ActorId) -> Duration;
}

/// Constant durations, mostly for tests and benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct FixedWorkload {
    pub think: Duration,
    pub eat: Duration,
}

impl FixedWorkload {
    pub fn new(think: Duration, eat: Duration) -> Self {
        Self { think, eat }
    }
}

impl WorkloadSource for FixedWorkload {
    fn think_duration(&self, _actor: ActorId) -> Duration {
        self.think
    }

    fn eat_duration(&self, _actor: ActorId) -> Duration {
        self.eat
    }
}

/// Uniformly random durations with one generator per actor.
///
/// A fixed seed makes every actor's sequence reproducible regardless of how
/// the threads interleave.
pub struct RandomWorkload {
    think_ms: (u64, u64),
    eat_ms: (u64, u64),
    rngs: Vec<Mutex<StdRng>>,
}

impl RandomWorkload {
    pub fn new(config: &WorkloadConfig, actors: usize, seed: Option<u64>) -> Self {
        let rngs = (1..=actors)
            .map(|id| {
                let rng = match seed {
                    // Distinct stream from the retry jitter derived from the same seed.
                    Some(seed) => StdRng::seed_from_u64(seed.rotate_left(17) ^ id as u64),
                    None => StdRng::from_entropy(),
                };
                Mutex::new(rng)
            })
            .collect();

        Self {
            think_ms: (config.think_min_ms, config.think_max_ms),
            eat_ms: (config.eat_min_ms, config.eat_max_ms),
            rngs,
        }
    }

    fn sample(&self, actor: ActorId, (min, max): (u64, u64)) -> Duration {
        if min >= max {
            return Duration::from_millis(min);
        }
        let mut rng = self.rngs[actor.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

impl WorkloadSource for RandomWorkload {
    fn think_duration(&self, actor: ActorId) -> Duration {
        self.sample(actor, self.think_ms)
    }

    fn eat_duration(&self, actor: ActorId) -> Duration {
        self.sample(actor, self.eat_ms)
    }
}
