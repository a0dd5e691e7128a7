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

use criterion::{criterion_group, criterion_main};

mod ring_throughput;

use arbiter_operations::bench_arbiter_operations;
use ring_throughput::bench_ring_throughput;
use slot_operations::bench_slot_operations;

criterion_group!(
    benches,
    bench_slot_operations,
    bench_arbiter_operations,
    bench_ring_throughput
);
criterion_main!(benches);
