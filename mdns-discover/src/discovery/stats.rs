use std::collections::HashMap;

/// Aggregate bookkeeping for a multi-service run.
///
/// Owned and mutated by the orchestrator's aggregation loop only; read-only
/// once the run returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Service types queried
    pub attempts: usize,
    /// Worker failures that were reported as warnings
    pub errors: usize,
    /// "Timed out with no results" outcomes treated as expected
    pub suppressed_timeouts: usize,
    /// Surviving (post-dedup) instances per service type
    pub service_type_counts: HashMap<String, usize>,
    /// Diagnostics in arrival order
    pub warnings: Vec<String>,
}

impl DiscoveryStats {
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    pub(crate) fn record_suppressed(&mut self, warning: String) {
        self.suppressed_timeouts += 1;
        self.warnings.push(warning);
    }

    pub(crate) fn record_error(&mut self, warning: String) {
        self.errors += 1;
        self.warnings.push(warning);
    }

    pub(crate) fn record_instance(&mut self, service_type: &str) {
        *self
            .service_type_counts
            .entry(service_type.to_string())
            .or_insert(0) += 1;
    }

    /// Sum of the per-type counts; equals the number of aggregated results
    pub fn instances(&self) -> usize {
        self.service_type_counts.values().sum()
    }

    /// Service types by descending instance count, ties alphabetical
    pub fn ranked_service_types(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .service_type_counts
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}
