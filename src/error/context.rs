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

use crate::error::RingError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a RingError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a RingError) -> Self {
        let (suggestion, details) = match error {
            RingError::InvalidTopology(msg) => {
                let suggestion = Some(
                    "A ring needs at least two actors. Pass '--actors 2' or larger, or set \
                     'actors' in the configuration file."
                        .to_string(),
                );
                let details = Some(format!("Ring construction failed: {msg}"));
                (suggestion, details)
            }
            RingError::InvalidConfig(msg) => {
                let suggestion = Some(
                    "Run 'ringdine config' to inspect the effective configuration.".to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            RingError::ConfigError(msg) => {
                let suggestion = Some(
                    "Check the configuration file syntax and RINGDINE_* environment variables."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            RingError::UnsupportedStrategy(name) => {
                let available = if cfg!(feature = "race_diagnostics") {
                    "ordered, timed, arbiter, unsync"
                } else {
                    "ordered, timed, arbiter"
                };
                let suggestion = Some(format!("Available strategies: {available}."));
                let details = if name == "unsync" {
                    Some(
                        "The unsynchronized baseline is only built with the 'race_diagnostics' \
                         feature."
                            .to_string(),
                    )
                } else {
                    None
                };
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
