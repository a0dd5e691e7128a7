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

use std::fmt;
use std::time::Duration;

/// Bounded wait applied to each slot by the timed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTimeout(Duration);

impl AcquireTimeout {
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for AcquireTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis())
    }
}

/// Source precedence used when resolving the effective timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutSource {
    #[default]
    Default,
    Config,
    Cli,
}

impl fmt::Display for TimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeoutSource::Default => "built-in default",
            TimeoutSource::Config => "configuration",
            TimeoutSource::Cli => "CLI flag",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutResolution {
    pub value: AcquireTimeout,
    pub source: TimeoutSource,
}

/// Error produced when parsing a timeout override fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutParseError {
    message: String,
}

impl fmt::Display for TimeoutParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TimeoutParseError {}

impl TimeoutParseError {
    fn invalid_value(value: &str) -> Self {
        Self {
            message: format!(
                "Timeout value '{value}' is invalid. Use a positive number of milliseconds, \
                 optionally suffixed with 'ms' or 's'."
            ),
        }
    }
}

/// Parses a timeout such as `50`, `50ms` or `2s`. Zero is rejected.
pub fn parse_timeout(value: &str) -> Result<AcquireTimeout, TimeoutParseError> {
    let trimmed = value.trim();
    let lowered = trimmed.to_ascii_lowercase();

    let millis = if let Some(number) = lowered.strip_suffix("ms") {
        number.trim().parse::<u64>().ok()
    } else if let Some(number) = lowered.strip_suffix('s') {
        number
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|secs| secs.checked_mul(1_000))
    } else {
        lowered.parse::<u64>().ok()
    };

    match millis {
        Some(millis) if millis > 0 => Ok(AcquireTimeout::from_millis(millis)),
        _ => Err(TimeoutParseError::invalid_value(trimmed)),
    }
}

/// Resolves the effective timeout based on CLI > config > default precedence.
pub struct TimeoutResolver<'a> {
    cli_override: Option<&'a str>,
    config_value: AcquireTimeout,
    default_value: AcquireTimeout,
}

impl<'a> TimeoutResolver<'a> {
    pub fn new(
        cli_override: Option<&'a str>,
        config_value: AcquireTimeout,
        default_value: AcquireTimeout,
    ) -> Self {
        Self {
            cli_override,
            config_value,
            default_value,
        }
    }

    pub fn resolve(self) -> Result<TimeoutResolution, TimeoutParseError> {
        if let Some(cli_value) = self.cli_override {
            let value = parse_timeout(cli_value)?;
            return Ok(TimeoutResolution {
                value,
                source: TimeoutSource::Cli,
            });
        }

        if self.config_value != self.default_value {
            return Ok(TimeoutResolution {
                value: self.config_value,
                source: TimeoutSource::Config,
            });
        }

        Ok(TimeoutResolution {
            value: self.default_value,
            source: TimeoutSource::Default,
        })
    }
}
