//! Provider selection per item under a job's strategy.
//!
//! The router is deterministic: given the same strategy, candidate list and
//! [`AssignmentRecord`] it always picks the same provider. The scheduler calls
//! [`ProviderRouter::assign`] inside the job's critical section so the record
//! update is atomic with the item's transition to processing; two concurrent
//! items can never observe the same "least used" count.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::batch::ProviderStrategy;
use crate::catalog::ProviderCatalog;
use crate::error::SchedulerError;

/// Per-job assignment bookkeeping for rotation and load balancing.
///
/// Owned by the job, mutated only at assignment time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRecord {
    counts: HashMap<String, usize>,
    rotation: usize,
}

impl AssignmentRecord {
    /// Assignments handed to `provider` so far in this job.
    pub fn count(&self, provider: &str) -> usize {
        self.counts.get(provider).copied().unwrap_or(0)
    }

    /// Count one assignment to `provider`.
    pub fn note(&mut self, provider: &str) {
        *self.counts.entry(provider.to_string()).or_insert(0) += 1;
    }

    fn advance_rotation(&mut self) {
        self.rotation += 1;
    }
}

/// Provider candidates in priority order: preferred first, then fallbacks,
/// deduplicated with empty names dropped.
pub fn candidates(preferred: &str, fallbacks: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(fallbacks.len() + 1);
    for name in std::iter::once(preferred).chain(fallbacks.iter().map(String::as_str)) {
        if !name.is_empty() && !out.iter().any(|existing| existing == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Picks a provider for an item under the job's strategy.
pub struct ProviderRouter<'a> {
    catalog: &'a ProviderCatalog,
}

impl<'a> ProviderRouter<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog }
    }

    /// Check the candidate list before any item is admitted. A failure here
    /// is fatal for the whole job: no provider can ever be found.
    pub fn validate(&self, candidates: &[String]) -> Result<(), SchedulerError> {
        if candidates.is_empty() {
            return Err(SchedulerError::Configuration(
                "no providers configured".into(),
            ));
        }
        for name in candidates {
            if !self.catalog.contains(name) {
                return Err(SchedulerError::Configuration(format!(
                    "provider not in cost table: {name}"
                )));
            }
        }
        Ok(())
    }

    /// Pick a provider and record the assignment.
    pub fn assign(
        &self,
        strategy: ProviderStrategy,
        candidates: &[String],
        record: &mut AssignmentRecord,
    ) -> Result<String, SchedulerError> {
        let pick = self.pick(strategy, candidates, record)?;
        if strategy == ProviderStrategy::RoundRobin {
            record.advance_rotation();
        }
        record.note(&pick);
        Ok(pick)
    }

    fn pick(
        &self,
        strategy: ProviderStrategy,
        candidates: &[String],
        record: &AssignmentRecord,
    ) -> Result<String, SchedulerError> {
        if candidates.is_empty() {
            return Err(SchedulerError::Configuration(
                "no providers configured".into(),
            ));
        }
        match strategy {
            ProviderStrategy::Single => Ok(candidates[0].clone()),
            ProviderStrategy::RoundRobin => {
                Ok(candidates[record.rotation % candidates.len()].clone())
            }
            ProviderStrategy::CostOptimized => {
                self.min_by_score(candidates, |name| self.nominal_cost(name))
            }
            ProviderStrategy::QualityOptimized => self.min_by_score(candidates, |name| {
                // Negate so the highest rank wins under a minimizing fold.
                self.quality(name).map(|rank| -f64::from(rank))
            }),
            ProviderStrategy::LoadBalanced => {
                self.min_by_score(candidates, |name| Ok(record.count(name) as f64))
            }
        }
    }

    /// Lowest score wins; ties keep the earliest candidate.
    fn min_by_score(
        &self,
        candidates: &[String],
        score: impl Fn(&str) -> Result<f64, SchedulerError>,
    ) -> Result<String, SchedulerError> {
        let mut best: Option<(&String, f64)> = None;
        for name in candidates {
            let s = score(name)?;
            let better = match best {
                None => true,
                Some((_, current)) => s < current,
            };
            if better {
                best = Some((name, s));
            }
        }
        best.map(|(name, _)| name.clone())
            .ok_or_else(|| SchedulerError::Configuration("no providers configured".into()))
    }

    fn nominal_cost(&self, name: &str) -> Result<f64, SchedulerError> {
        self.catalog
            .get(name)
            .map(|profile| profile.nominal_cost())
            .ok_or_else(|| {
                SchedulerError::Configuration(format!("provider not in cost table: {name}"))
            })
    }

    fn quality(&self, name: &str) -> Result<u8, SchedulerError> {
        self.catalog
            .get(name)
            .map(|profile| profile.quality_rank)
            .ok_or_else(|| {
                SchedulerError::Configuration(format!("provider not in cost table: {name}"))
            })
    }
}
