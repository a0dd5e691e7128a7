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

use crate::arbitration::{ArbiterMode, StrategyKind};
use crate::error::{Result, RingError};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const ENV_PREFIX: &str = "RINGDINE";

const DEFAULT_ACTORS: usize = 5;
const DEFAULT_THINK_MIN_MS: u64 = 1_000;
const DEFAULT_THINK_MAX_MS: u64 = 3_000;
const DEFAULT_EAT_MIN_MS: u64 = 500;
const DEFAULT_EAT_MAX_MS: u64 = 1_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_BACKOFF_INITIAL_MS: u64 = 10;
const DEFAULT_BACKOFF_CAP_MS: u64 = 200;
const DEFAULT_POLL_INTERVAL_US: u64 = 100;
const DEFAULT_POLL_ATTEMPTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    #[serde(default = "default_actors")]
    pub actors: usize,

    /// Acquisition attempts per actor; 0 runs until cancelled.
    #[serde(default)]
    pub cycles: u64,

    #[serde(default)]
    pub strategy: StrategyKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub workload: WorkloadConfig,

    #[serde(default)]
    pub timed: TimedConfig,

    #[serde(default)]
    pub arbiter: ArbiterConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_think_min_ms")]
    pub think_min_ms: u64,
    #[serde(default = "default_think_max_ms")]
    pub think_max_ms: u64,
    #[serde(default = "default_eat_min_ms")]
    pub eat_min_ms: u64,
    #[serde(default = "default_eat_max_ms")]
    pub eat_max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    #[serde(default)]
    pub mode: ArbiterMode,
    /// Most pairs granted at once; absent means floor(actors / 2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            actors: DEFAULT_ACTORS,
            cycles: 0,
            strategy: StrategyKind::default(),
            seed: None,
            workload: WorkloadConfig::default(),
            timed: TimedConfig::default(),
            arbiter: ArbiterConfig::default(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            think_min_ms: DEFAULT_THINK_MIN_MS,
            think_max_ms: DEFAULT_THINK_MAX_MS,
            eat_min_ms: DEFAULT_EAT_MIN_MS,
            eat_max_ms: DEFAULT_EAT_MAX_MS,
        }
    }
}

impl Default for TimedConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            mode: ArbiterMode::default(),
            max_concurrent: None,
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

fn default_actors() -> usize {
    DEFAULT_ACTORS
}

fn default_think_min_ms() -> u64 {
    DEFAULT_THINK_MIN_MS
}

fn default_think_max_ms() -> u64 {
    DEFAULT_THINK_MAX_MS
}

fn default_eat_min_ms() -> u64 {
    DEFAULT_EAT_MIN_MS
}

fn default_eat_max_ms() -> u64 {
    DEFAULT_EAT_MAX_MS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_backoff_initial_ms() -> u64 {
    DEFAULT_BACKOFF_INITIAL_MS
}

fn default_backoff_cap_ms() -> u64 {
    DEFAULT_BACKOFF_CAP_MS
}

fn default_poll_interval_us() -> u64 {
    DEFAULT_POLL_INTERVAL_US
}

fn default_poll_attempts() -> usize {
    DEFAULT_POLL_ATTEMPTS
}

impl RingConfig {
    /// Loads defaults, then `file` if given, then `RINGDINE_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, None)
    }

    /// Same as [`RingConfig::load`], reading environment variables from `env`
    /// instead of the process environment when provided.
    pub fn load_with_env(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(RingError::ConfigError(format!(
                    "Config file not found at {}",
                    path.display()
                )));
            }
            log::debug!("Loading config from {path:?}");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: RingConfig = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| RingError::ConfigError(format!("Failed to load configuration: {e}")))?;

        log::debug!("Effective configuration: {config:?}");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| RingError::ConfigError(format!("Failed to parse configuration: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects configurations no ring can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.actors < 2 {
            return Err(RingError::InvalidTopology(format!(
                "{} actor(s) requested; a ring needs at least 2",
                self.actors
            )));
        }

        let workload = &self.workload;
        if workload.think_min_ms > workload.think_max_ms {
            return Err(RingError::InvalidConfig(format!(
                "workload.think_min_ms ({}) exceeds workload.think_max_ms ({})",
                workload.think_min_ms, workload.think_max_ms
            )));
        }
        if workload.eat_min_ms > workload.eat_max_ms {
            return Err(RingError::InvalidConfig(format!(
                "workload.eat_min_ms ({}) exceeds workload.eat_max_ms ({})",
                workload.eat_min_ms, workload.eat_max_ms
            )));
        }

        if self.timed.timeout_ms == 0 {
            return Err(RingError::InvalidConfig(
                "timed.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.timed.backoff_initial_ms == 0 || self.timed.backoff_cap_ms == 0 {
            return Err(RingError::InvalidConfig(
                "timed.backoff_initial_ms and timed.backoff_cap_ms must be greater than zero"
                    .to_string(),
            ));
        }
        if self.timed.backoff_initial_ms > self.timed.backoff_cap_ms {
            return Err(RingError::InvalidConfig(format!(
                "timed.backoff_initial_ms ({}) exceeds timed.backoff_cap_ms ({})",
                self.timed.backoff_initial_ms, self.timed.backoff_cap_ms
            )));
        }

        if self.arbiter.max_concurrent == Some(0) {
            return Err(RingError::InvalidConfig(
                "arbiter.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.arbiter.poll_attempts == 0 {
            return Err(RingError::InvalidConfig(
                "arbiter.poll_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
