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

use criterion::{BenchmarkId, Criterion};
use ringdine::arbitration::StrategyKind;
use ringdine::config::RingConfig;
use ringdine::report::NullReporter;
use ringdine::ring::RingCoordinator;
use ringdine::workload::FixedWorkload;
use std::sync::Arc;
use std::time::Duration;

/// Full rings with zero think/eat time, so the cost is pure arbitration.
pub fn bench_ring_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_throughput");
    group.sample_size(10);

    for strategy in [
        StrategyKind::Ordered,
        StrategyKind::Timed,
        StrategyKind::Arbiter,
    ] {
        group.bench_with_input(
            BenchmarkId::new("five_actors_200_cycles", strategy),
            &strategy,
            |b, &strategy| {
                b.iter(|| {
                    let config = RingConfig {
                        cycles: 200,
                        strategy,
                        seed: Some(1),
                        ..RingConfig::default()
                    };
                    RingCoordinator::new(config)
                        .unwrap()
                        .with_reporter(Arc::new(NullReporter))
                        .with_workload(Arc::new(FixedWorkload::new(
                            Duration::ZERO,
                            Duration::ZERO,
                        )))
                        .run()
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}
