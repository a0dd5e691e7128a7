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

use crate::arbitration::{AcquireTimeout, ArbiterMode, StrategyKind, TimeoutResolver};
use crate::cancellation::CancellationToken;
use crate::config::{DEFAULT_TIMEOUT_MS, RingConfig};
use crate::error::{Result, RingError};
use crate::report::{ConsoleReporter, NullReporter, ReportSink};
use crate::ring::{RingCoordinator, RunReport};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use log::{debug, info, warn};
use std::sync::Arc;

/// Flags accepted by `ringdine run`; each one overrides the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub strategy: Option<String>,
    pub actors: Option<usize>,
    pub cycles: Option<u64>,
    pub timeout: Option<String>,
    pub seed: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub arbiter_mode: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RunCommand<'a> {
    config: &'a RingConfig,
}

impl<'a> RunCommand<'a> {
    pub fn new(config: &'a RingConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, options: &RunOptions) -> Result<()> {
        let config = self.effective_config(options)?;
        if config.strategy.is_diagnostic() {
            warn!("The unsync strategy is a diagnostic baseline; expect violations");
        }

        let (cancellation, _signals) = CancellationToken::with_signal_handlers();
        // The JSON document owns stdout, so the trace is dropped with it.
        let reporter: Arc<dyn ReportSink> = if options.quiet || options.json {
            Arc::new(NullReporter)
        } else {
            Arc::new(ConsoleReporter::stdout())
        };

        let report = RingCoordinator::new(config)?
            .with_reporter(reporter)
            .with_cancellation(cancellation)
            .run()?;

        if report.cancelled {
            info!("Run interrupted; reporting partial results");
        }

        if options.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_summary(&report);
        }
        Ok(())
    }

    /// Applies CLI overrides on top of the loaded configuration and validates the result.
    pub fn effective_config(&self, options: &RunOptions) -> Result<RingConfig> {
        let mut config = self.config.clone();

        if let Some(strategy) = options.strategy.as_deref() {
            config.strategy = strategy.parse::<StrategyKind>()?;
        }
        if let Some(actors) = options.actors {
            config.actors = actors;
        }
        if let Some(cycles) = options.cycles {
            config.cycles = cycles;
        }
        if let Some(seed) = options.seed {
            config.seed = Some(seed);
        }
        if let Some(max_concurrent) = options.max_concurrent {
            config.arbiter.max_concurrent = Some(max_concurrent);
        }
        if let Some(mode) = options.arbiter_mode.as_deref() {
            config.arbiter.mode = mode.parse::<ArbiterMode>()?;
        }

        let resolution = TimeoutResolver::new(
            options.timeout.as_deref(),
            AcquireTimeout::from_millis(config.timed.timeout_ms),
            AcquireTimeout::from_millis(DEFAULT_TIMEOUT_MS),
        )
        .resolve()
        .map_err(|e| RingError::InvalidConfig(e.to_string()))?;
        debug!(
            "Acquire timeout {} taken from {}",
            resolution.value, resolution.source
        );
        config.timed.timeout_ms = resolution.value.as_millis();

        config.validate()?;
        Ok(config)
    }
}

fn print_summary(report: &RunReport) {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(vec![
        Cell::new("Actor"),
        Cell::new("Cycles"),
        Cell::new("Meals"),
        Cell::new("Retreats"),
        Cell::new("Rejections"),
        Cell::new("Longest hunger"),
    ]);

    for stats in &report.per_actor {
        table.add_row(vec![
            Cell::new(stats.actor).set_alignment(CellAlignment::Right),
            Cell::new(stats.cycles).set_alignment(CellAlignment::Right),
            Cell::new(stats.meals).set_alignment(CellAlignment::Right),
            Cell::new(stats.retreats).set_alignment(CellAlignment::Right),
            Cell::new(stats.rejections).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} ms", stats.longest_hunger_ms))
                .set_alignment(CellAlignment::Right),
        ]);
    }

    println!();
    println!(
        "{} {} actors, {} arbitration, {:.2}s{}",
        "Summary:".bold(),
        report.actors,
        report.strategy,
        report.elapsed().as_secs_f64(),
        if report.cancelled { " (interrupted)" } else { "" }
    );
    println!("{table}");

    let violations = report.occupancy.mutual_exclusion_violations;
    let violations_text = if violations == 0 {
        "0".green().to_string()
    } else {
        violations.to_string().red().bold().to_string()
    };
    println!("Mutual exclusion violations: {violations_text}");
    println!(
        "Peak concurrent eaters: {} (ring allows {})",
        report.occupancy.peak_concurrent_eaters,
        report.actors / 2
    );
    println!("Total meals: {}", report.total_meals);
    if report.leaked_slots > 0 {
        println!(
            "{} {} slot(s) left held",
            "Warning:".yellow().bold(),
            report.leaked_slots
        );
    }
}
