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

use clap::{Parser, Subcommand};
use ringdine::commands::config::ConfigCommand;
use ringdine::commands::run::{RunCommand, RunOptions};
use ringdine::config::RingConfig;
use ringdine::error::{Result, RingError, format_error_with_color, get_exit_code};
use ringdine::logging;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ringdine")]
#[command(author, version, about = "Ring resource arbitration harness", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a ring of actors competing for their adjacent slots
    #[command(visible_alias = "r")]
    Run {
        /// Arbitration strategy (ordered, timed, arbiter)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Number of actors (and slots) in the ring
        #[arg(short = 'n', long)]
        actors: Option<usize>,

        /// Acquisition attempts per actor (0 runs until interrupted)
        #[arg(short, long)]
        cycles: Option<u64>,

        /// Per-slot wait for the timed strategy (e.g. "50", "50ms", "2s")
        #[arg(long, value_name = "DURATION")]
        timeout: Option<String>,

        /// Seed for workload durations and retry jitter
        #[arg(long)]
        seed: Option<u64>,

        /// Most pairs the arbiter grants at once
        #[arg(long, value_name = "K")]
        max_concurrent: Option<usize>,

        /// How the arbiter handles a refused request (blocking, polling)
        #[arg(long, value_name = "MODE")]
        arbiter_mode: Option<String>,

        /// Print the run report as JSON instead of the trace and table
        #[arg(long)]
        json: bool,

        /// Suppress the per-actor trace
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let config = match RingConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e),
    };

    let result: Result<()> = (|| match cli.command {
        Commands::Run {
            strategy,
            actors,
            cycles,
            timeout,
            seed,
            max_concurrent,
            arbiter_mode,
            json,
            quiet,
        } => {
            let command = RunCommand::new(&config)?;
            command.execute(&RunOptions {
                strategy,
                actors,
                cycles,
                timeout,
                seed,
                max_concurrent,
                arbiter_mode,
                json,
                quiet,
            })
        }
        Commands::Config => {
            let command = ConfigCommand::new(&config)?;
            command.execute()
        }
    })();

    if let Err(e) = result {
        exit_with_error(&e);
    }
}

fn exit_with_error(error: &RingError) -> ! {
    eprint!(
        "{}",
        format_error_with_color(error, std::io::stderr().is_terminal())
    );
    std::process::exit(get_exit_code(error));
}
