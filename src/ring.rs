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

//! Builds the ring and runs one thread per actor.

use crate::actor::{Actor, ActorId, ActorStats};
use crate::arbitration::{ArbitrationStrategy, StrategyKind, build_strategy};
use crate::cancellation::CancellationToken;
use crate::config::RingConfig;
use crate::error::{Result, RingError};
use crate::monitor::{OccupancyMonitor, OccupancySnapshot};
use crate::report::{ConsoleReporter, ReportSink};
use crate::slot::SlotRing;
use crate::workload::{RandomWorkload, WorkloadSource};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shared collaborators handed to every actor at construction.
#[derive(Clone)]
pub struct RingContext {
    pub reporter: Arc<dyn ReportSink>,
    pub workload: Arc<dyn WorkloadSource>,
    pub monitor: Arc<OccupancyMonitor>,
    pub cancellation: CancellationToken,
}

/// Outcome of a completed (or cancelled) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub strategy: StrategyKind,
    pub actors: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
    pub total_meals: u64,
    pub total_retreats: u64,
    pub total_rejections: u64,
    /// Slots still marked held after every actor joined.
    pub leaked_slots: usize,
    pub occupancy: OccupancySnapshot,
    pub per_actor: Vec<ActorStats>,
}

impl RunReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Mutual exclusion held for every meal and nothing was left held.
    pub fn is_clean(&self) -> bool {
        self.occupancy.mutual_exclusion_violations == 0 && self.leaked_slots == 0
    }
}

pub struct RingCoordinator {
    config: RingConfig,
    slots: Arc<SlotRing>,
    strategy: Arc<dyn ArbitrationStrategy>,
    context: RingContext,
}

impl RingCoordinator {
    /// Validates `config` and wires N slots and one shared strategy.
    ///
    /// Fails with `InvalidTopology` for fewer than two actors; no thread is
    /// started until [`RingCoordinator::run`].
    pub fn new(config: RingConfig) -> Result<Self> {
        config.validate()?;

        let slots = Arc::new(SlotRing::new(config.actors));
        let strategy = build_strategy(&config, Arc::clone(&slots))?;
        let context = RingContext {
            reporter: Arc::new(ConsoleReporter::stdout()),
            workload: Arc::new(RandomWorkload::new(
                &config.workload,
                config.actors,
                config.seed,
            )),
            monitor: Arc::new(OccupancyMonitor::new(config.actors)),
            cancellation: CancellationToken::new(),
        };

        Ok(Self {
            config,
            slots,
            strategy,
            context,
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ReportSink>) -> Self {
        self.context.reporter = reporter;
        self
    }

    pub fn with_workload(mut self, workload: Arc<dyn WorkloadSource>) -> Self {
        self.context.workload = workload;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.context.cancellation = cancellation;
        self
    }

    /// Replaces the configured strategy, e.g. to keep a handle for inspection.
    ///
    /// Fails with `InvalidTopology` when `strategy` arbitrates a ring of a
    /// different size than the configured one.
    pub fn with_strategy(mut self, strategy: Arc<dyn ArbitrationStrategy>) -> Result<Self> {
        if strategy.ring_size() != self.config.actors {
            return Err(RingError::InvalidTopology(format!(
                "{} strategy arbitrates {} slots but the ring has {} actors",
                strategy.kind(),
                strategy.ring_size(),
                self.config.actors
            )));
        }
        self.strategy = strategy;
        Ok(self)
    }

    pub fn slots(&self) -> Arc<SlotRing> {
        Arc::clone(&self.slots)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.context.cancellation.clone()
    }

    /// Starts every actor, waits for all of them, and summarises the run.
    pub fn run(self) -> Result<RunReport> {
        let actors = self.config.actors;
        let cycles = self.config.cycles;
        let started = Instant::now();
        info!(
            "Starting {actors} actors with {} arbitration ({})",
            self.strategy.kind(),
            if cycles == 0 {
                "until cancelled".to_string()
            } else {
                format!("{cycles} cycles each")
            }
        );

        let mut handles: Vec<(ActorId, JoinHandle<ActorStats>)> = Vec::with_capacity(actors);
        for id in (1..=actors).filter_map(ActorId::new) {
            let actor = Actor::new(
                id,
                actors,
                Arc::clone(&self.strategy),
                self.context.clone(),
            );
            let spawned = thread::Builder::new()
                .name(format!("actor-{}", id.get()))
                .spawn(move || actor.run(cycles));

            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(err) => {
                    warn!("Failed to spawn {id}: {err}; stopping the ring");
                    self.context.cancellation.cancel();
                    join_all(handles);
                    return Err(RingError::ThreadSpawn(err.to_string()));
                }
            }
        }

        let mut per_actor = Vec::with_capacity(actors);
        let mut panicked = None;
        for (id, handle) in handles {
            match handle.join() {
                Ok(stats) => per_actor.push(stats),
                Err(_) => {
                    warn!("{id} panicked");
                    self.context.cancellation.cancel();
                    panicked.get_or_insert(id);
                }
            }
        }
        if let Some(actor) = panicked {
            return Err(RingError::ActorPanicked { actor: actor.get() });
        }

        let leaked_slots = self.strategy.held_slots();
        if leaked_slots > 0 {
            warn!("{leaked_slots} slot(s) still held after all actors finished");
        }

        let elapsed = started.elapsed();
        let report = RunReport {
            strategy: self.strategy.kind(),
            actors,
            cancelled: self.context.cancellation.is_cancelled(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            total_meals: per_actor.iter().map(|s| s.meals).sum(),
            total_retreats: per_actor.iter().map(|s| s.retreats).sum(),
            total_rejections: per_actor.iter().map(|s| s.rejections).sum(),
            leaked_slots,
            occupancy: self.context.monitor.snapshot(),
            per_actor,
        };
        info!(
            "Ring finished in {:.3}s: {} meals, {} violations",
            elapsed.as_secs_f64(),
            report.total_meals,
            report.occupancy.mutual_exclusion_violations
        );
        Ok(report)
    }
}

fn join_all(handles: Vec<(ActorId, JoinHandle<ActorStats>)>) {
    for (id, handle) in handles {
        if handle.join().is_err() {
            warn!("{id} panicked during shutdown");
        }
    }
}
