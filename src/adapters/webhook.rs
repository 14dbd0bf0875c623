//! Stage backend that posts to a remote generator.
//!
//! Endpoint: POST <endpoint>
//! Auth: optional Bearer token
//! Response body text is the raw stage output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::domain::StageRole;

use super::Stage;

/// HTTP-backed stage
pub struct WebhookStage {
    role: StageRole,
    endpoint: String,
    token: Option<String>,
    instructions: String,
    client: reqwest::Client,
}

/// Request body sent to the generator
#[derive(Debug, Serialize)]
pub struct StageRequest<'a> {
    /// Which stage is asking
    pub stage: StageRole,
    /// Instruction text for the generator
    pub instructions: &'a str,
    /// Stage input (trigger text or upstream event JSON)
    pub input: &'a str,
}

impl WebhookStage {
    pub fn new(
        role: StageRole,
        endpoint: impl Into<String>,
        token: Option<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            role,
            endpoint: endpoint.into(),
            token,
            instructions: instructions.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Stage for WebhookStage {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn generate(&self, input: &str) -> Result<String> {
        let payload = StageRequest {
            stage: self.role,
            instructions: &self.instructions,
            input,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload);

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {} stage at {}", self.role, self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} stage response", self.role))?;

        if !status.is_success() {
            anyhow::bail!("{} stage endpoint error ({}): {}", self.role, status, body.trim());
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(StageRequest {
            stage: StageRole::Counterparty,
            instructions: "quote it",
            input: "{}",
        })
        .unwrap();

        assert_eq!(body["stage"], "counterparty");
        assert_eq!(body["instructions"], "quote it");
        assert_eq!(body["input"], "{}");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let stage = WebhookStage::new(
            StageRole::Decision,
            "http://127.0.0.1:9/decide",
            None,
            "decide",
        );
        assert_eq!(stage.endpoint(), "http://127.0.0.1:9/decide");
        assert!(stage.generate("{}").await.is_err());
    }
}
