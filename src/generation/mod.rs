pub mod client;
pub mod error;
pub mod types;

pub use client::HttpGenerator;
pub use error::GenerationError;
pub use types::{GenerationOutput, GenerationRequest, TokenUsage};

/// Boundary to the generation backend.
///
/// The scheduler drives one call per item execution attempt and treats the
/// call as opaque: it ships the item's fields plus the assigned provider, and
/// reads back content with token counts or an error.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError>;
}
