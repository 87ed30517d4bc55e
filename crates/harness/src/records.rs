//! Run-record table keyed by (kernel, variant, tuning).

use kernelsuite_kernels::{Precision, TuningIndex, VariantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub kernel: String,
    pub variant: VariantId,
    pub tuning: TuningIndex,
}

impl RunKey {
    pub fn new(kernel: impl Into<String>, variant: VariantId, tuning: TuningIndex) -> Self {
        Self {
            kernel: kernel.into(),
            variant,
            tuning,
        }
    }

    /// `kernel/variant/tuning`, used as the report row label.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.kernel, self.variant, self.tuning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum RunStatus {
    Complete,
    Incomplete { reason: String },
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    pub elapsed: Duration,
    pub checksum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub key: RunKey,
    pub tuning_name: String,
    pub precision: Precision,
    /// Whole timed region, summed over repetitions.
    pub elapsed: Duration,
    pub reps: usize,
    pub checksum: Option<f64>,
    pub status: RunStatus,
    /// Every complete sample in run order; empty unless history is kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<RunSample>,
}

impl RunRecord {
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// One record per key, overwritten on every re-run. Records keep first-run
/// order.
#[derive(Debug, Clone, Default)]
pub struct RunRecordTable {
    keep_history: bool,
    records: Vec<RunRecord>,
    index: HashMap<RunKey, usize>,
}

impl RunRecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history() -> Self {
        Self {
            keep_history: true,
            ..Self::default()
        }
    }

    /// Store `record`, replacing any earlier record for the same key. With
    /// history enabled the earlier samples are carried over and the new one
    /// appended if the run completed.
    pub fn upsert(&mut self, mut record: RunRecord) -> &RunRecord {
        record.history.clear();
        let sample = record.is_complete().then_some(RunSample {
            elapsed: record.elapsed,
            checksum: record.checksum,
        });
        let slot = match self.index.get(&record.key) {
            Some(&slot) => {
                let previous = std::mem::replace(&mut self.records[slot], record);
                if self.keep_history {
                    self.records[slot].history = previous.history;
                }
                slot
            }
            None => {
                let slot = self.records.len();
                self.index.insert(record.key.clone(), slot);
                self.records.push(record);
                slot
            }
        };
        let stored = &mut self.records[slot];
        if self.keep_history {
            stored.history.extend(sample);
        }
        stored
    }

    pub fn get(&self, key: &RunKey) -> Option<&RunRecord> {
        self.index.get(key).map(|&slot| &self.records[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter()
    }

    pub fn for_kernel<'a>(&'a self, kernel: &'a str) -> impl Iterator<Item = &'a RunRecord> + 'a {
        self.records.iter().filter(move |record| record.key.kernel == kernel)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(elapsed_ms: u64, checksum: f64) -> RunRecord {
        RunRecord {
            key: RunKey::new("Basic_INIT3", VariantId::BaseSeq, TuningIndex::DEFAULT),
            tuning_name: "default".into(),
            precision: Precision::F64,
            elapsed: Duration::from_millis(elapsed_ms),
            reps: 10,
            checksum: Some(checksum),
            status: RunStatus::Complete,
            history: Vec::new(),
        }
    }

    #[test]
    fn reruns_overwrite_in_place() {
        let mut table = RunRecordTable::new();
        table.upsert(record(5, 1.0));
        let other = RunRecord {
            key: RunKey::new("Basic_INIT3", VariantId::IterAlt, TuningIndex::DEFAULT),
            ..record(6, 1.0)
        };
        table.upsert(other);
        table.upsert(record(7, 2.0));

        assert_eq!(table.len(), 2);
        let first = table.iter().next().expect("first record");
        assert_eq!(first.elapsed, Duration::from_millis(7));
        assert_eq!(first.checksum, Some(2.0));
        assert!(first.history.is_empty());
    }

    #[test]
    fn history_keeps_every_sample() {
        let mut table = RunRecordTable::with_history();
        table.upsert(record(5, 1.0));
        table.upsert(record(7, 1.0));
        let stored = table.upsert(record(6, 1.0));
        let elapsed: Vec<u64> = stored
            .history
            .iter()
            .map(|s| s.elapsed.as_millis() as u64)
            .collect();
        assert_eq!(elapsed, vec![5, 7, 6]);
        assert_eq!(stored.elapsed, Duration::from_millis(6));
    }

    #[test]
    fn incomplete_runs_stay_out_of_history() {
        let mut table = RunRecordTable::with_history();
        table.upsert(record(4, 1.0));
        table.upsert(RunRecord {
            elapsed: Duration::ZERO,
            checksum: None,
            status: RunStatus::Incomplete {
                reason: "clock".into(),
            },
            ..record(0, 0.0)
        });
        let stored = table.upsert(record(6, 1.0));
        let elapsed: Vec<u64> = stored
            .history
            .iter()
            .map(|s| s.elapsed.as_millis() as u64)
            .collect();
        assert_eq!(elapsed, vec![4, 6]);
        assert!(stored.is_complete());
    }
}
