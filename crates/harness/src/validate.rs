//! Cross-variant checksum comparison.

use crate::records::{RunKey, RunRecordTable};
use kernelsuite_kernels::{ChecksumTolerance, TuningIndex, VariantId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The (variant, tuning) every other run of a kernel is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReference {
    pub variant: VariantId,
    pub tuning: TuningIndex,
}

impl Default for RunReference {
    fn default() -> Self {
        Self {
            variant: VariantId::BaseSeq,
            tuning: TuningIndex::DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub key: RunKey,
    pub reference: f64,
    pub checksum: f64,
    /// `|checksum - reference| / max(|reference|, MIN_POSITIVE)`; NaN when
    /// either side is NaN.
    pub relative_error: f64,
    pub allowed_relative_error: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossValidator {
    reference: RunReference,
}

impl CrossValidator {
    pub fn new(reference: RunReference) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> RunReference {
        self.reference
    }

    /// Compare every complete run of `kernel` against the reference run.
    /// Returns nothing when the reference did not complete.
    pub fn validate(
        &self,
        kernel: &str,
        tolerance: ChecksumTolerance,
        table: &RunRecordTable,
    ) -> Vec<Discrepancy> {
        let reference_key = RunKey::new(kernel, self.reference.variant, self.reference.tuning);
        let Some(reference) = table.get(&reference_key).filter(|record| record.is_complete()) else {
            return Vec::new();
        };
        let Some(expected) = reference.checksum else {
            return Vec::new();
        };

        let mut discrepancies = Vec::new();
        for record in table.for_kernel(kernel) {
            if record.key == reference_key || !record.is_complete() {
                continue;
            }
            let Some(checksum) = record.checksum else {
                continue;
            };
            let precision = reference.precision.coarser(record.precision);
            if tolerance.accepts(precision, expected, checksum) {
                continue;
            }
            let relative_error =
                (checksum - expected).abs() / expected.abs().max(f64::MIN_POSITIVE);
            let discrepancy = Discrepancy {
                key: record.key.clone(),
                reference: expected,
                checksum,
                relative_error,
                allowed_relative_error: tolerance.allowed_relative_error(precision),
            };
            warn!(
                kernel,
                variant = %record.key.variant,
                tuning = %record.key.tuning,
                reference = expected,
                checksum,
                relative_error,
                "checksum discrepancy"
            );
            discrepancies.push(discrepancy);
        }
        discrepancies
    }
}
