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

//! Lifecycle trace output.
//!
//! Sinks own their serialization: each event becomes exactly one line and no
//! line is torn by another actor's output. Sinks never touch slot locks, and
//! actors only report while not waiting on a slot.

use crate::actor::ActorId;
use log::warn;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Thinking,
    Hungry,
    HoldingFirst { slot: usize },
    Dining,
    FinishedDining,
    Retreated { slot: usize },
    Rejected,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorEvent {
    pub actor: ActorId,
    pub kind: EventKind,
}

impl ActorEvent {
    pub fn new(actor: ActorId, kind: EventKind) -> Self {
        Self { actor, kind }
    }
}

impl fmt::Display for ActorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.actor.get();
        match self.kind {
            EventKind::Thinking => write!(f, "Actor {id} is thinking."),
            EventKind::Hungry => write!(f, "Actor {id} is hungry."),
            EventKind::HoldingFirst { slot } => write!(f, "Actor {id} is holding slot {slot}."),
            EventKind::Dining => write!(f, "Actor {id} is dining."),
            EventKind::FinishedDining => write!(f, "Actor {id} finished dining."),
            EventKind::Retreated { slot } => {
                write!(f, "Actor {id} couldn't take slot {slot} and retreats.")
            }
            EventKind::Rejected => write!(f, "Actor {id} was refused its slots and retreats."),
            EventKind::Done => write!(f, "Actor {id} is done."),
        }
    }
}

pub trait ReportSink: Send + Sync {
    fn report(&self, event: &ActorEvent);
}

/// Writes one line per event to a shared writer, stdout by default.
pub struct ConsoleReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl ReportSink for ConsoleReporter {
    fn report(&self, event: &ActorEvent) {
        let line = format!("{event}\n");
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = out.write_all(line.as_bytes()).and_then(|()| out.flush()) {
            warn!("Failed to write trace line: {err}");
        }
    }
}

/// Keeps every event in memory; used by tests and the summary table.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ActorEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    pub fn events_for(&self, actor: ActorId) -> Vec<EventKind> {
        self.events()
            .into_iter()
            .filter(|event| event.actor == actor)
            .map(|event| event.kind)
            .collect()
    }
}

impl ReportSink for RecordingReporter {
    fn report(&self, event: &ActorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*event);
    }
}

#[derive(Debug, Default)]
pub struct NullReporter;

impl ReportSink for NullReporter {
    fn report(&self, _event: &ActorEvent) {}
}
