//! Suite report: per-run rows with metrics, discrepancies and skips.

use crate::executor::{SkipEntry, SuiteRun};
use crate::metrics::RunMetrics;
use crate::records::{RunKey, RunRecord, RunStatus};
use crate::validate::{Discrepancy, RunReference};
use kernelsuite_kernels::{KernelGroup, Precision, SizeClass, TuningIndex, VariantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub samples: usize,
    pub min_s: f64,
    pub mean_s: f64,
    pub max_s: f64,
}

impl HistoryStats {
    fn from_record(record: &RunRecord) -> Option<Self> {
        if record.history.is_empty() {
            return None;
        }
        let times: Vec<f64> = record.history.iter().map(|s| s.elapsed.as_secs_f64()).collect();
        let min_s = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max_s = times.iter().copied().fold(0.0, f64::max);
        Some(Self {
            samples: times.len(),
            min_s,
            mean_s: times.iter().sum::<f64>() / times.len() as f64,
            max_s,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub kernel: String,
    pub group: Option<KernelGroup>,
    pub variant: VariantId,
    pub tuning: TuningIndex,
    pub tuning_name: String,
    pub precision: Precision,
    pub reps: usize,
    pub status: RunStatus,
    pub elapsed_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
    /// Reference elapsed over this row's elapsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedup: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub generated_at_unix_ms: u128,
    pub size_class: SizeClass,
    pub reference: RunReference,
    pub rows: Vec<ReportRow>,
    pub discrepancies: Vec<Discrepancy>,
    pub skipped: Vec<SkipEntry>,
    /// Kernels that stopped early, with the reason.
    pub incomplete_kernels: BTreeMap<String, String>,
}

impl SuiteReport {
    pub fn from_run(run: &SuiteRun) -> Self {
        let reference = run.options.reference;
        let rows = run
            .records
            .iter()
            .map(|record| {
                let summary = run.kernel(&record.key.kernel);
                let metrics = summary.and_then(|s| RunMetrics::compute(record, &s.cost));
                let reference_key =
                    RunKey::new(record.key.kernel.clone(), reference.variant, reference.tuning);
                let speedup = run
                    .records
                    .get(&reference_key)
                    .filter(|r| r.is_complete() && !r.elapsed.is_zero())
                    .filter(|_| record.is_complete() && !record.elapsed.is_zero())
                    .map(|r| r.elapsed.as_secs_f64() / record.elapsed.as_secs_f64());
                ReportRow {
                    label: record.key.label(),
                    kernel: record.key.kernel.clone(),
                    group: summary.map(|s| s.group),
                    variant: record.key.variant,
                    tuning: record.key.tuning,
                    tuning_name: record.tuning_name.clone(),
                    precision: record.precision,
                    reps: record.reps,
                    status: record.status.clone(),
                    elapsed_s: record.elapsed.as_secs_f64(),
                    checksum: record.checksum,
                    metrics,
                    speedup,
                    history: HistoryStats::from_record(record),
                }
            })
            .collect();

        let incomplete_kernels = run
            .kernels
            .iter()
            .filter_map(|s| s.failure.as_ref().map(|reason| (s.kernel.clone(), reason.clone())))
            .collect();

        let generated_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis();

        Self {
            generated_at_unix_ms,
            size_class: run.options.run_params.size_class,
            reference,
            rows,
            discrepancies: run.discrepancies.clone(),
            skipped: run.skipped.clone(),
            incomplete_kernels,
        }
    }

    /// Save report to JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load report from JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }

    pub fn as_map(&self) -> BTreeMap<&str, &ReportRow> {
        self.rows.iter().map(|row| (row.label.as_str(), row)).collect()
    }

    pub fn diff<'a>(&'a self, baseline: &'a SuiteReport) -> BTreeMap<&'a str, RowDelta<'a>> {
        let mut deltas = BTreeMap::new();
        let previous = baseline.as_map();

        for (label, row) in self.as_map() {
            if let Some(&baseline_row) = previous.get(label) {
                let ops = |row: &ReportRow| row.metrics.map(|m| m.ops_per_s);
                deltas.insert(
                    label,
                    RowDelta {
                        current: row,
                        baseline: baseline_row,
                        elapsed_s_delta: row.elapsed_s - baseline_row.elapsed_s,
                        ops_per_s_delta: ops(row)
                            .zip(ops(baseline_row))
                            .map(|(now, then)| now - then),
                    },
                );
            }
        }

        deltas
    }

    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<20} {:<15} {:<12} {:>6} {:>12} {:>12} {:>12} {:>8} {:>22}",
            "kernel",
            "variant",
            "tuning",
            "reps",
            "elapsed_s",
            "Mops/s",
            "GB/s",
            "speedup",
            "checksum"
        );
        for row in &self.rows {
            let (ops, bandwidth) = row
                .metrics
                .map(|m| {
                    (
                        format!("{:.3}", m.ops_per_s / 1.0e6),
                        format!("{:.3}", m.bytes_per_s / 1.0e9),
                    )
                })
                .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
            let speedup = row.speedup.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".to_string());
            let checksum = match (&row.status, row.checksum) {
                (RunStatus::Incomplete { .. }, _) | (_, None) => "incomplete".to_string(),
                (_, Some(checksum)) => format!("{checksum:.15e}"),
            };
            let _ = writeln!(
                out,
                "{:<20} {:<15} {:<12} {:>6} {:>12.6} {:>12} {:>12} {:>8} {:>22}",
                row.kernel,
                row.variant.name(),
                row.tuning_name,
                row.reps,
                row.elapsed_s,
                ops,
                bandwidth,
                speedup,
                checksum
            );
        }
        if !self.discrepancies.is_empty() {
            let _ = writeln!(out, "\nchecksum discrepancies:");
            for d in &self.discrepancies {
                let _ = writeln!(
                    out,
                    "  {} reference={:.15e} checksum={:.15e} rel_err={:.3e} allowed={:.3e}",
                    d.key.label(),
                    d.reference,
                    d.checksum,
                    d.relative_error,
                    d.allowed_relative_error
                );
            }
        }
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "\nskipped:");
            for entry in &self.skipped {
                let _ = writeln!(
                    out,
                    "  {} {} {} ({:?})",
                    entry.kernel,
                    entry.variant.as_deref().unwrap_or("-"),
                    entry.tuning.as_deref().unwrap_or("-"),
                    entry.reason
                );
            }
        }
        for (kernel, reason) in &self.incomplete_kernels {
            let _ = writeln!(out, "incomplete kernel {kernel}: {reason}");
        }
        out
    }
}

#[derive(Debug)]
pub struct RowDelta<'a> {
    pub current: &'a ReportRow,
    pub baseline: &'a ReportRow,
    pub elapsed_s_delta: f64,
    pub ops_per_s_delta: Option<f64>,
}
