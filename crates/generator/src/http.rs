//! HTTP client for the external generator service.
//!
//! Sends `POST {base_url}/generate` with [`GenerationParams`] as JSON. A
//! 2xx response body is the encoded variation; 400 and 422 mean the input
//! was rejected; any other status is a service failure.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::params::{GeneratedVariation, GenerationParams};
use crate::VariationGenerator;

/// Client for one generator service endpoint.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerator {
    /// Create a client for `base_url`, e.g. `http://127.0.0.1:8500`.
    ///
    /// `timeout` bounds each generation call; `None` waits indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, GeneratorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl VariationGenerator for HttpGenerator {
    async fn generate(
        &self,
        params: &GenerationParams<'_>,
    ) -> Result<GeneratedVariation, GeneratorError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_status(status.as_u16(), body));
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(GeneratorError::EmptyOutput);
        }

        tracing::debug!(bytes = data.len(), "Variation generated");
        Ok(GeneratedVariation {
            data: data.to_vec(),
        })
    }
}

/// Map a non-success status from the service to a classified error.
pub fn classify_status(status: u16, body: String) -> GeneratorError {
    match status {
        400 | 422 => GeneratorError::InvalidInput { reason: body },
        _ => GeneratorError::Service { status, body },
    }
}
