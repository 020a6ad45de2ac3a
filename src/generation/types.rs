//! Request and response types for the generation gateway.
//!
//! All structs derive `Serialize` and `Deserialize` for JSON conversion
//! matching the gateway's `/v1/generations` endpoint. Prompt construction and
//! content post-processing happen behind the gateway; the scheduler only ships
//! the item fields and reads back content plus token counts.

use serde::{Deserialize, Serialize};

/// Request body for the gateway's `/v1/generations` endpoint.
///
/// Carries one item's fields plus the provider the router assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Backend provider that should execute this item.
    pub provider: String,
    /// Subject of the content to generate.
    pub topic: String,
    /// Keywords the content should cover.
    pub keywords: Vec<String>,
    /// Desired tone label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Run a research pass before drafting.
    pub research: bool,
    /// Run a proofreading pass after drafting.
    pub proofread: bool,
    /// Run a humanization pass after drafting.
    pub humanize: bool,
    /// Brand profile reference applied by the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_profile: Option<String>,
}

/// Token counts reported by the gateway for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Successful response from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The generated content.
    pub content: String,
    /// Token counts for the call, used for cost accounting.
    pub usage: TokenUsage,
}
