//! Per-provider pricing and quality metadata.
//!
//! A pure lookup table: read-only during execution, no locking required. The
//! built-in entries carry list prices in USD per million tokens and a relative
//! quality rank; `draftmill.toml` can override or extend them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::generation::TokenUsage;

/// Token shape of a nominal single generation, used for provider-level cost
/// ranking when no per-item estimate is available.
pub const NOMINAL_INPUT_TOKENS: u32 = 1_000;
pub const NOMINAL_OUTPUT_TOKENS: u32 = 1_500;

/// Pricing and quality metadata for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// USD per million input tokens.
    pub input_per_mtok: f64,
    /// USD per million output tokens.
    pub output_per_mtok: f64,
    /// Relative quality rank, higher is better.
    pub quality_rank: u8,
}

impl ProviderProfile {
    /// Cost of one call at this provider's prices.
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        f64::from(usage.input_tokens) / 1e6 * self.input_per_mtok
            + f64::from(usage.output_tokens) / 1e6 * self.output_per_mtok
    }

    /// Cost of a nominal single generation, for ranking providers against
    /// each other.
    pub fn nominal_cost(&self) -> f64 {
        self.cost(&TokenUsage {
            input_tokens: NOMINAL_INPUT_TOKENS,
            output_tokens: NOMINAL_OUTPUT_TOKENS,
        })
    }
}

/// The provider cost table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCatalog {
    profiles: BTreeMap<String, ProviderProfile>,
}

impl ProviderCatalog {
    /// The built-in table.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert(
            "anthropic",
            ProviderProfile {
                input_per_mtok: 3.0,
                output_per_mtok: 15.0,
                quality_rank: 9,
            },
        );
        catalog.insert(
            "openai",
            ProviderProfile {
                input_per_mtok: 2.5,
                output_per_mtok: 10.0,
                quality_rank: 8,
            },
        );
        catalog.insert(
            "gemini",
            ProviderProfile {
                input_per_mtok: 1.25,
                output_per_mtok: 5.0,
                quality_rank: 7,
            },
        );
        catalog.insert(
            "mistral",
            ProviderProfile {
                input_per_mtok: 2.0,
                output_per_mtok: 6.0,
                quality_rank: 6,
            },
        );
        catalog.insert(
            "deepseek",
            ProviderProfile {
                input_per_mtok: 0.27,
                output_per_mtok: 1.1,
                quality_rank: 5,
            },
        );
        catalog
    }

    pub fn insert(&mut self, name: &str, profile: ProviderProfile) {
        self.profiles.insert(name.to_string(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Provider names in deterministic (sorted) order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Cost of one call at `name`'s prices, if the provider is known.
    pub fn cost(&self, name: &str, usage: &TokenUsage) -> Option<f64> {
        self.get(name).map(|profile| profile.cost(usage))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
