//! Per-kernel map from (variant, tuning) to strategy.

use crate::config::Precision;
use crate::strategy::Strategy;
use crate::variant::{HostCapabilities, TuningIndex, VariantId};
use std::collections::BTreeMap;
use tracing::debug;

struct Tuning<D> {
    name: String,
    strategy: Box<dyn Strategy<D>>,
}

/// The closed set of strategies one kernel implements on this host.
///
/// Declarations for variant families the host cannot run are dropped at
/// declaration time, so every query below already reflects host support.
pub struct VariantCapabilities<D> {
    kernel: String,
    host: HostCapabilities,
    entries: BTreeMap<VariantId, Vec<Tuning<D>>>,
}

impl<D: 'static> VariantCapabilities<D> {
    pub fn new(kernel: impl Into<String>, host: HostCapabilities) -> Self {
        Self {
            kernel: kernel.into(),
            host,
            entries: BTreeMap::new(),
        }
    }

    pub fn host(&self) -> HostCapabilities {
        self.host
    }

    /// Add a tuning under `variant`. The first tuning declared for a variant
    /// becomes index 0.
    pub fn declare<S>(&mut self, variant: VariantId, tuning: &str, strategy: S) -> &mut Self
    where
        S: Strategy<D> + 'static,
    {
        if !variant.family().is_available(&self.host) {
            debug!(
                kernel = %self.kernel,
                %variant,
                tuning,
                "variant unavailable on host, not declared"
            );
            return self;
        }
        self.entries.entry(variant).or_default().push(Tuning {
            name: tuning.to_string(),
            strategy: Box::new(strategy),
        });
        self
    }

    pub fn supports(&self, variant: VariantId) -> bool {
        self.entries.contains_key(&variant)
    }

    pub fn supports_tuning(&self, variant: VariantId, tuning: TuningIndex) -> bool {
        self.entries
            .get(&variant)
            .is_some_and(|tunings| tuning.get() < tunings.len())
    }

    pub fn variants(&self) -> Vec<VariantId> {
        self.entries.keys().copied().collect()
    }

    pub fn tunings(&self, variant: VariantId) -> Vec<String> {
        self.entries
            .get(&variant)
            .map(|tunings| tunings.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn strategy(&self, variant: VariantId, tuning: TuningIndex) -> Option<&dyn Strategy<D>> {
        self.entries
            .get(&variant)
            .and_then(|tunings| tunings.get(tuning.get()))
            .map(|t| t.strategy.as_ref())
    }

    pub fn precision(&self, variant: VariantId, tuning: TuningIndex) -> Option<Precision> {
        self.strategy(variant, tuning).map(|strategy| strategy.precision())
    }
}
