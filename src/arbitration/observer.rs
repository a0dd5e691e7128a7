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

//! Observer hooks for pair acquisition.
//!
//! Strategies call these while an acquisition is in flight so the actor can
//! track intermediate states (holding the first slot) without the strategy
//! knowing anything about reporting.

use crate::actor::ActorId;
use std::time::Duration;

pub trait AcquisitionObserver {
    /// The first slot of the pair is held; the second is still outstanding.
    fn on_first_acquired(&self, _actor: ActorId, _slot: usize) {}

    /// Waiting on `slot` ran out of budget; any partial hold has been released.
    fn on_slot_timeout(&self, _actor: ActorId, _slot: usize, _waited: Duration) {}

    /// A grant request was refused.
    fn on_rejected(&self, _actor: ActorId, _attempts: usize) {}

    fn on_granted(&self, _actor: ActorId, _waited: Duration) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl AcquisitionObserver for NoopObserver {}
