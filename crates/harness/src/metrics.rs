//! Throughput and bandwidth from elapsed time and static cost.

use crate::records::RunRecord;
use kernelsuite_kernels::KernelCost;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub elapsed_s: f64,
    pub per_rep_s: f64,
    /// Flops per second, or iterations per second for kernels without flops.
    pub ops_per_s: f64,
    pub bytes_per_s: f64,
    pub flops_per_s: f64,
}

impl RunMetrics {
    /// `None` for incomplete runs and for runs with nothing timed.
    pub fn compute(record: &RunRecord, cost: &KernelCost) -> Option<Self> {
        if !record.is_complete() || record.reps == 0 || record.elapsed.is_zero() {
            return None;
        }
        let elapsed_s = record.elapsed.as_secs_f64();
        let reps = record.reps as f64;
        Some(Self {
            elapsed_s,
            per_rep_s: elapsed_s / reps,
            ops_per_s: cost.operations_per_rep() as f64 * reps / elapsed_s,
            bytes_per_s: cost.bytes_per_rep() as f64 * reps / elapsed_s,
            flops_per_s: cost.flops_per_rep as f64 * reps / elapsed_s,
        })
    }
}
