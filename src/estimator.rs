//! Pre-run cost projection.
//!
//! A pure function of the item definitions, the strategy and the cost table:
//! nothing here touches job state, so it is safe to call repeatedly and
//! concurrently with execution. Strategy picks are simulated on a scratch
//! [`AssignmentRecord`] so the job's own record is never mutated.

use serde::{Deserialize, Serialize};

use crate::batch::{GenerationFlags, ItemSpec, ProviderStrategy};
use crate::catalog::ProviderCatalog;
use crate::error::SchedulerError;
use crate::generation::TokenUsage;
use crate::router::{self, AssignmentRecord, ProviderRouter};

/// Fixed prompt scaffolding sent with every item.
const PROMPT_OVERHEAD_TOKENS: u32 = 180;
/// Rough chars-per-token ratio for topic/keyword/tone text.
const APPROX_CHARS_PER_TOKEN: u32 = 4;
/// Research context attached to the prompt when the research flag is set.
const RESEARCH_CONTEXT_TOKENS: u32 = 2_200;
/// Output size of a plain draft.
const DRAFT_OUTPUT_TOKENS: u32 = 1_100;
/// Extra output from the proofreading pass.
const PROOFREAD_EXTRA_TOKENS: u32 = 150;
/// Extra output from the humanization pass.
const HUMANIZE_EXTRA_TOKENS: u32 = 300;

const BASE_CONFIDENCE: f64 = 0.85;
const MIN_CONFIDENCE: f64 = 0.5;

/// Projected tokens and cost for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEstimate {
    pub index: usize,
    /// Provider the strategy would pick for this item.
    pub provider: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
}

/// Projected whole-batch cost under one candidate as the sole provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecommendation {
    pub provider: String,
    pub projected_cost_usd: f64,
    pub quality_rank: u8,
}

/// Pre-run cost projection for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub per_item: Vec<ItemEstimate>,
    /// How much of the estimate rests on heuristics, in `[0.5, 1.0]`.
    pub confidence: f64,
    /// Candidates ranked by projected whole-batch cost, cheapest first.
    pub recommendations: Vec<ProviderRecommendation>,
}

pub struct CostEstimator<'a> {
    catalog: &'a ProviderCatalog,
}

impl<'a> CostEstimator<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog }
    }

    pub fn estimate(
        &self,
        items: &[ItemSpec],
        strategy: ProviderStrategy,
        preferred_provider: &str,
        fallback_providers: &[String],
        flags: &GenerationFlags,
    ) -> Result<CostEstimate, SchedulerError> {
        let candidates = router::candidates(preferred_provider, fallback_providers);
        let provider_router = ProviderRouter::new(self.catalog);
        provider_router.validate(&candidates)?;

        let mut scratch = AssignmentRecord::default();
        let mut per_item = Vec::with_capacity(items.len());
        let mut total_usd = 0.0;
        let mut input_total: u64 = 0;
        let mut output_total: u64 = 0;

        for (index, item) in items.iter().enumerate() {
            let provider = provider_router.assign(strategy, &candidates, &mut scratch)?;
            let usage = Self::projected_usage(item, flags);
            let cost_usd = self.priced(&provider, &usage)?;
            input_total += u64::from(usage.input_tokens);
            output_total += u64::from(usage.output_tokens);
            total_usd += cost_usd;
            per_item.push(ItemEstimate {
                index,
                provider,
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cost_usd,
            });
        }

        let mut recommendations = Vec::with_capacity(candidates.len());
        for name in &candidates {
            let mut projected = 0.0;
            for item in items {
                projected += self.priced(name, &Self::projected_usage(item, flags))?;
            }
            let quality_rank = self
                .catalog
                .get(name)
                .map(|profile| profile.quality_rank)
                .unwrap_or(0);
            recommendations.push(ProviderRecommendation {
                provider: name.clone(),
                projected_cost_usd: projected,
                quality_rank,
            });
        }
        recommendations.sort_by(|a, b| {
            a.projected_cost_usd
                .partial_cmp(&b.projected_cost_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(CostEstimate {
            total_usd,
            input_tokens: input_total,
            output_tokens: output_total,
            per_item,
            confidence: Self::confidence(flags),
            recommendations,
        })
    }

    /// Token heuristic for one item under the batch flags.
    fn projected_usage(item: &ItemSpec, flags: &GenerationFlags) -> TokenUsage {
        let prompt_chars = item.topic.len()
            + item.keywords.iter().map(String::len).sum::<usize>()
            + item.tone.as_ref().map(String::len).unwrap_or(0);
        let mut input_tokens =
            PROMPT_OVERHEAD_TOKENS + (prompt_chars as u32).div_ceil(APPROX_CHARS_PER_TOKEN);
        if flags.research {
            input_tokens += RESEARCH_CONTEXT_TOKENS;
        }
        let mut output_tokens = DRAFT_OUTPUT_TOKENS;
        if flags.proofread {
            output_tokens += PROOFREAD_EXTRA_TOKENS;
        }
        if flags.humanize {
            output_tokens += HUMANIZE_EXTRA_TOKENS;
        }
        TokenUsage {
            input_tokens,
            output_tokens,
        }
    }

    /// Every enabled post-processing pass leans harder on heuristics and
    /// widens the error bars.
    fn confidence(flags: &GenerationFlags) -> f64 {
        let mut confidence = BASE_CONFIDENCE;
        if flags.research {
            confidence -= 0.15;
        }
        if flags.proofread {
            confidence -= 0.05;
        }
        if flags.humanize {
            confidence -= 0.05;
        }
        confidence.max(MIN_CONFIDENCE)
    }

    fn priced(&self, provider: &str, usage: &TokenUsage) -> Result<f64, SchedulerError> {
        self.catalog.cost(provider, usage).ok_or_else(|| {
            SchedulerError::Configuration(format!("provider not in cost table: {provider}"))
        })
    }
}
