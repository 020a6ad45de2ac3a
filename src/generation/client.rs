use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::error::GenerationError;
use super::types::{GenerationOutput, GenerationRequest};
use super::Generator;

const DEFAULT_BASE_URL: &str = "https://gateway.draftmill.io";

/// HTTP client for the generation gateway.
pub struct HttpGenerator {
    api_key: String,
    client: Client,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let response = self
            .client
            .post(format!("{}/v1/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(GenerationError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "content policy rejection".to_string());
            return Err(GenerationError::ContentRejected(message));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerationOutput>().await?;
        Ok(body)
    }
}
