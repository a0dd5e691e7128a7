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

use rand::Rng;
use std::cmp;
use std::time::Duration;

/// Exponential backoff used between a retreat and the next attempt.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    initial: Duration,
    factor: u32,
    cap: Duration,
    current: Duration,
}

impl RetryBackoff {
    pub fn new(initial: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            initial,
            factor: cmp::max(factor, 1),
            cap,
            current: cmp::min(initial, cap),
        }
    }

    /// Returns the current delay and advances the backoff sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.saturating_mul(self.factor);
        self.current = cmp::min(next, self.cap);
        delay
    }

    /// Advances the sequence and returns a delay drawn uniformly from the
    /// upper half of the current step, so actors that retreated together
    /// come back at different times.
    pub fn next_jittered<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let delay = self.next_delay();
        let half = delay / 2;
        let spread = u64::try_from((delay - half).as_micros()).unwrap_or(u64::MAX);
        if spread == 0 {
            return delay;
        }
        half + Duration::from_micros(rng.gen_range(0..=spread))
    }

    pub fn reset(&mut self) {
        self.current = cmp::min(self.initial, self.cap);
    }

    pub fn peek(&self) -> Duration {
        self.current
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), 2, Duration::from_millis(200))
    }
}
