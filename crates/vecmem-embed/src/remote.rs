// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible remote embedding provider.
//!
//! Posts to `{base_url}/v1/embeddings` with a bearer credential. Transient
//! failures (429, 500, 503) are retried once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vecmem_core::{EmbeddingProvider, ProviderTier, Result, VecmemError};

const EMBEDDINGS_PATH: &str = "/v1/embeddings";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
    dimensions: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl RemoteProvider {
    /// Build a provider. Fails without a credential.
    pub fn new(
        api_key: Option<&SecretString>,
        base_url: &str,
        model_id: &str,
        dimensions: usize,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.expose_secret().is_empty())
            .ok_or_else(|| {
                VecmemError::Config(
                    "remote embedding provider requires an api key (set VECMEM_EMBEDDING_API_KEY)"
                        .into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| VecmemError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VecmemError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{EMBEDDINGS_PATH}", base_url.trim_end_matches('/')),
            model_id: model_id.to_string(),
            dimensions,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the pause before a retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model_id,
            input: text,
            dimensions: self.dimensions,
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying embedding request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| VecmemError::Provider {
                    message: format!("embedding request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
            let status = response.status();
            debug!(status = %status, attempt, "embedding response received");

            if status.is_success() {
                let body: EmbeddingResponse =
                    response.json().await.map_err(|e| VecmemError::Provider {
                        message: format!("failed to parse embedding response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return body
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| VecmemError::provider("embedding response had no data"));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient(status) && attempt < self.max_retries {
                warn!(status = %status, "transient embedding error, will retry");
                continue;
            }
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api) => format!("embedding API error ({status}): {}", api.error.message),
                Err(_) => format!("embedding API returned {status}: {body}"),
            };
            return Err(VecmemError::provider(message));
        }

        Err(VecmemError::provider("embedding request failed after retries"))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> SecretString {
        SecretString::from("sk-test".to_string())
    }

    fn provider(server: &MockServer) -> RemoteProvider {
        RemoteProvider::new(Some(&key()), &server.uri(), "text-embedding-3-small", 3)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[test]
    fn requires_credential() {
        let err = RemoteProvider::new(None, "http://localhost", "m", 3).unwrap_err();
        assert!(matches!(err, VecmemError::Config(_)));
        let empty = SecretString::from(String::new());
        assert!(RemoteProvider::new(Some(&empty), "http://localhost", "m", 3).is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let p = RemoteProvider::new(Some(&key()), "https://api.example.com/", "m", 3).unwrap();
        assert_eq!(p.endpoint(), "https://api.example.com/v1/embeddings");
    }

    #[tokio::test]
    async fn embeds_via_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let v = provider(&server).embed("hello").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn retries_transient_error_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let v = provider(&server).embed("retry").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn surfaces_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server).embed("x").await.unwrap_err();
        assert!(err.to_string().contains("Incorrect API key provided"));
    }
}
