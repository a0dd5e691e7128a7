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

pub mod arbiter;
pub mod backoff;
pub mod observer;
pub mod ordered;
pub mod timed;
pub mod timeout;
#[cfg(feature = "race_diagnostics")]
pub mod unsync;

pub use arbiter::{ArbiterMode, CentralArbiter};
pub use backoff::RetryBackoff;
pub use observer::{AcquisitionObserver, NoopObserver};
pub use ordered::OrderedAcquisition;
pub use timed::TimedBackoff;
pub use timeout::{AcquireTimeout, TimeoutResolution, TimeoutResolver, TimeoutSource};

use crate::actor::ActorId;
use crate::cancellation::CancellationToken;
use crate::config::RingConfig;
use crate::error::{Result, RingError};
use crate::slot::{SlotPair, SlotRing};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Selects the arbitration policy shared by every actor in a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Ordered,
    Timed,
    Arbiter,
    Unsync,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Ordered => "ordered",
            StrategyKind::Timed => "timed",
            StrategyKind::Arbiter => "arbiter",
            StrategyKind::Unsync => "unsync",
        }
    }

    /// The unsynchronized baseline is excluded from every correctness claim.
    pub fn is_diagnostic(self) -> bool {
        matches!(self, StrategyKind::Unsync)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ordered" | "ordered-acquisition" => Ok(StrategyKind::Ordered),
            "timed" | "timed-backoff" | "timeout" => Ok(StrategyKind::Timed),
            "arbiter" | "central-arbiter" | "waiter" => Ok(StrategyKind::Arbiter),
            "unsync" | "unsynchronized" => Ok(StrategyKind::Unsync),
            other => Err(RingError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// Result of a single `acquire_pair` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Both slots are held by the caller.
    Acquired,
    /// A bounded wait on `slot` expired; the caller holds nothing and should
    /// wait `retry_after` before trying again.
    TimedOut { slot: usize, retry_after: Duration },
    /// The arbiter refused the pair; the caller holds nothing.
    Rejected,
    /// The wait was abandoned because the ring is shutting down.
    Cancelled,
}

impl PairOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, PairOutcome::Acquired)
    }
}

/// Everything a strategy needs to serve one pair request.
pub struct PairRequest<'a> {
    actor: ActorId,
    pair: SlotPair,
    cancellation: &'a CancellationToken,
    observer: &'a dyn AcquisitionObserver,
}

impl<'a> PairRequest<'a> {
    pub fn new(actor: ActorId, pair: SlotPair, cancellation: &'a CancellationToken) -> Self {
        Self {
            actor,
            pair,
            cancellation,
            observer: &NoopObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn AcquisitionObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn pair(&self) -> SlotPair {
        self.pair
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }

    pub fn observer(&self) -> &dyn AcquisitionObserver {
        self.observer
    }
}

/// A policy for granting an actor both of its adjacent slots.
///
/// One instance is shared by every actor of a ring. On any outcome other than
/// [`PairOutcome::Acquired`] the caller must hold zero slots.
pub trait ArbitrationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn acquire_pair(&self, request: &PairRequest<'_>) -> PairOutcome;

    fn release_pair(&self, actor: ActorId, pair: SlotPair);

    /// Number of slots this strategy arbitrates.
    fn ring_size(&self) -> usize;

    /// Slots currently granted to some actor, by this strategy's own bookkeeping.
    fn held_slots(&self) -> usize;
}

/// Builds the strategy selected by `config` over the given slots.
pub fn build_strategy(
    config: &RingConfig,
    slots: Arc<SlotRing>,
) -> Result<Arc<dyn ArbitrationStrategy>> {
    let ring_size = slots.len();
    let strategy: Arc<dyn ArbitrationStrategy> = match config.strategy {
        StrategyKind::Ordered => Arc::new(OrderedAcquisition::new(slots)),
        StrategyKind::Timed => {
            let timeout = AcquireTimeout::from_millis(config.timed.timeout_ms);
            let backoff = RetryBackoff::new(
                Duration::from_millis(config.timed.backoff_initial_ms),
                2,
                Duration::from_millis(config.timed.backoff_cap_ms),
            );
            Arc::new(TimedBackoff::new(slots, timeout, backoff, config.seed))
        }
        StrategyKind::Arbiter => {
            let cap = config
                .arbiter
                .max_concurrent
                .unwrap_or_else(|| CentralArbiter::default_cap(ring_size));
            let arbiter = CentralArbiter::new(ring_size, cap, config.arbiter.mode).with_polling(
                Duration::from_micros(config.arbiter.poll_interval_us),
                config.arbiter.poll_attempts,
            );
            debug!(
                "Arbiter grants at most {} pairs in {} mode",
                arbiter.cap(),
                arbiter.mode()
            );
            Arc::new(arbiter)
        }
        #[cfg(feature = "race_diagnostics")]
        StrategyKind::Unsync => Arc::new(unsync::Unsynchronized::new(ring_size)),
        #[cfg(not(feature = "race_diagnostics"))]
        StrategyKind::Unsync => {
            return Err(RingError::UnsupportedStrategy(
                StrategyKind::Unsync.to_string(),
            ));
        }
    };

    info!("Using {} arbitration over {ring_size} slots", strategy.kind());
    Ok(strategy)
}
