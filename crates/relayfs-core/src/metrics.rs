// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-operation metrics for the RelayFS dispatcher
//!
//! Auxiliary bookkeeping: call count, cumulative handler time, and
//! cumulative backend-wait time per operation code. Owned by the dispatcher
//! thread; reset when the dispatcher is constructed. Correctness never
//! depends on these numbers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use relayfs_proto::OperationCode;

#[derive(Clone, Copy, Debug, Default)]
struct OpRecord {
    count: u64,
    time: Duration,
    wait: Duration,
}

pub struct MetricsRegistry {
    ops: [OpRecord; OperationCode::COUNT],
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            ops: [OpRecord::default(); OperationCode::COUNT],
        }
    }

    pub fn reset(&mut self) {
        self.ops = [OpRecord::default(); OperationCode::COUNT];
    }

    /// One handler invocation completed.
    pub fn record(&mut self, op: OperationCode, elapsed: Duration) {
        let record = &mut self.ops[Self::index(op)];
        record.count += 1;
        record.time += elapsed;
    }

    /// Time a handler spent suspended on backend I/O.
    pub fn add_wait(&mut self, op: OperationCode, waited: Duration) {
        self.ops[Self::index(op)].wait += waited;
    }

    pub fn count(&self, op: OperationCode) -> u64 {
        self.ops[Self::index(op)].count
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut ops = BTreeMap::new();
        let mut totals = OpRecord::default();
        for op in OperationCode::ALL {
            let record = self.ops[Self::index(op)];
            totals.count += record.count;
            totals.time += record.time;
            totals.wait += record.wait;
            ops.insert(
                op.name(),
                OpSnapshot {
                    count: record.count,
                    time_ms: as_ms(record.time),
                    wait_ms: as_ms(record.wait),
                    avg_time_ms: if record.count > 0 {
                        as_ms(record.time) / record.count as f64
                    } else {
                        0.0
                    },
                },
            );
        }
        MetricsSnapshot {
            ops,
            total_count: totals.count,
            total_time_ms: as_ms(totals.time),
            total_wait_ms: as_ms(totals.wait),
        }
    }

    fn index(op: OperationCode) -> usize {
        op as usize - 1
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct OpSnapshot {
    pub count: u64,
    pub time_ms: f64,
    pub wait_ms: f64,
    pub avg_time_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub ops: BTreeMap<&'static str, OpSnapshot>,
    pub total_count: u64,
    pub total_time_ms: f64,
    pub total_wait_ms: f64,
}
