//! The `OpenAIClient` struct implements [`ClientWrapper`] and [`EmbeddingClient`] for any
//! OpenAI-compatible REST endpoint (OpenAI itself, Ollama, vLLM, llama.cpp server, ...).
//!
//! # Key Features
//!
//! - **chat(...)**: `POST {base}/chat/completions` with the model, role-tagged messages, the
//!   seed and any extra generation options flattened into the body.
//! - **embed(...)**: `POST {base}/embeddings`.
//! - **Bounded wait**: every request carries the configured timeout (30 s by default).
//! - **Auth**: HTTP basic auth when credentials are configured, bearer key otherwise.
//! - **Model lookup failures**: HTTP 404 surfaces as [`ClientError::ModelNotFound`], which the
//!   cosine metric downgrades to a zero vector.
//!
//! # Example
//!
//! ```rust,no_run
//! use quineroom::clients::openai::OpenAIClient;
//! use quineroom::clients::ClientConfig;
//! use quineroom::client_wrapper::{ChatMessage, ChatOptions, ClientWrapper, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAIClient::new(ClientConfig::from_env_file(".env")?)?;
//!     let reply = client
//!         .chat(
//!             "llama3:8b",
//!             &[ChatMessage::new(Role::User, "whats the square root of 4?")],
//!             &ChatOptions::default().with_temperature(0.5),
//!         )
//!         .await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::quineroom::client_wrapper::{
    ChatMessage, ChatOptions, ClientError, ClientWrapper, EmbeddingClient,
};
use crate::quineroom::config::{ClientConfig, ConfigError};
use crate::quineroom::http_client_pool::get_or_create_client;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    options: &'a ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible chat and embedding API.
///
/// The underlying transport comes from the per-base-URL pool in
/// [`crate::quineroom::http_client_pool`], so several clients pointing at the same server share
/// connections.
pub struct OpenAIClient {
    /// Pooled transport.
    http: reqwest::Client,
    /// Base URL without a trailing slash.
    base_url: String,
    api_key: String,
    basic_auth: Option<(String, String)>,
    /// Bounded wait per request.
    timeout: Duration,
}

impl OpenAIClient {
    /// Construct a client from a validated [`ClientConfig`].
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        let http = get_or_create_client(&base_url)
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            basic_auth: config.basic_auth,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, model: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.endpoint(path))
            .timeout(self.timeout)
            .json(body);
        let request = match &self.basic_auth {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::InvalidResponse(e.to_string())
            }
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(err.to_string())
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, ClientError> {
        let body = ChatRequest {
            model,
            messages,
            options,
        };
        let response: ChatResponse = self.post_json("chat/completions", model, &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ClientError::InvalidResponse("response carried no choices".into()))
    }

    fn backend_name(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ClientError> {
        let body = EmbeddingRequest { model, input: text };
        let response: EmbeddingResponse = self.post_json("embeddings", model, &body).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| ClientError::InvalidResponse("response carried no embedding".into()))
    }
}
