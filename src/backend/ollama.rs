//! Ollama-compatible HTTP backend.
//!
//! Uses the non-streaming `/api/generate` endpoint:
//! - request: `{model, prompt, stream: false, options: {num_ctx, temperature?}}`
//! - success: `{"response": "..."}`
//! - failure: non-2xx status with `{"error": "..."}`

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::classify;
use super::traits::{BackendFailure, Generate, Generated};
use crate::config::ApiKey;
use crate::router::{BackendDescriptor, GenerationOptions};

/// Connect timeout; the overall per-call bound comes from the descriptor.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

/// HTTP client for one Ollama server.
#[derive(Clone)]
pub struct OllamaBackend {
    name: String,
    base_url: String,
    api_key: Option<ApiKey>,
    http_client: Client,
}

impl std::fmt::Debug for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaBackend")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

impl OllamaBackend {
    /// Create a client for the backend a descriptor describes.
    pub fn new(descriptor: &BackendDescriptor) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(descriptor.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            name: descriptor.name.clone(),
            base_url: descriptor.url.trim_end_matches('/').to_string(),
            api_key: descriptor.api_key.clone(),
            http_client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

/// Pull the error text out of an Ollama error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Generate for OllamaBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generated, BackendFailure> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options,
        };

        let mut request = self.http_client.post(self.generate_url()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, backend = %self.name, "Failed to reach backend");
            classify::transport(&self.name, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        backend = %self.name,
                        "Failed to read error response body"
                    );
                    String::new()
                }
            };
            let failure = classify::backend_reported(
                &self.name,
                Some(status.as_u16()),
                &error_message(&body),
            );
            tracing::warn!(
                status = %status,
                backend = %self.name,
                kind = %failure.kind,
                "Backend returned error"
            );
            return Err(failure);
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(error = %e, backend = %self.name, "Failed to parse backend response");
            BackendFailure::other(format!(
                "Failed to parse response from '{}': {}",
                self.name, e
            ))
        })?;

        if let Some(error) = payload.get("error").and_then(|e| e.as_str()) {
            return Err(classify::backend_reported(&self.name, None, error));
        }

        match payload.get("response").and_then(|r| r.as_str()) {
            Some(text) => Ok(Generated {
                text: text.to_string(),
            }),
            None => Err(BackendFailure::other(format!(
                "Response from '{}' has no 'response' field",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_json_body() {
        assert_eq!(
            error_message(r#"{"error":"model 'x' not found"}"#),
            "model 'x' not found"
        );
    }

    #[test]
    fn test_error_message_from_plain_body() {
        assert_eq!(error_message("  Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(r#"{"detail":"nope"}"#), r#"{"detail":"nope"}"#);
    }

    #[test]
    fn test_request_body_shape() {
        let options = GenerationOptions {
            num_ctx: 8192,
            temperature: Some(0.5),
        };
        let body = GenerateRequest {
            model: "gemma:2b",
            prompt: "hello world",
            stream: false,
            options: &options,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "gemma:2b",
                "prompt": "hello world",
                "stream": false,
                "options": {"num_ctx": 8192, "temperature": 0.5}
            })
        );
    }
}
