//! OpenAI-compatible embedding generator

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpClientTrait;
use crate::domain::embedding::{EmbeddingGenerator, PromptEmbedding};
use crate::domain::{DomainError, RequestContext};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const EMBEDDING_TYPE: &str = "openai";

/// Known OpenAI embedding models and their dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Generator backed by an OpenAI-compatible `/v1/embeddings` endpoint
#[derive(Debug)]
pub struct OpenAiEmbeddingGenerator<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl<C: HttpClientTrait> OpenAiEmbeddingGenerator<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request reduced output dimensions (text-embedding-3 models only)
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, input: serde_json::Value) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        if let Some(dims) = self.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        body
    }

    fn parse_response(
        &self,
        json: serde_json::Value,
        expected: usize,
    ) -> Result<Vec<PromptEmbedding>, DomainError> {
        let mut response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        if response.data.len() != expected {
            return Err(DomainError::provider(
                "openai",
                format!(
                    "Expected {} embeddings, received {}",
                    expected,
                    response.data.len()
                ),
            ));
        }

        response.data.sort_by_key(|d| d.index);

        Ok(response
            .data
            .into_iter()
            .map(|d| PromptEmbedding::new(d.embedding, EMBEDDING_TYPE))
            .collect())
    }

    async fn request(
        &self,
        ctx: &RequestContext,
        input: serde_json::Value,
        expected: usize,
    ) -> Result<Vec<PromptEmbedding>, DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::cancelled("embedding request cancelled"));
        }

        let body = self.build_request(input);
        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        self.parse_response(response, expected)
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingGenerator for OpenAiEmbeddingGenerator<C> {
    async fn generate(
        &self,
        ctx: &RequestContext,
        text: &str,
    ) -> Result<PromptEmbedding, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::validation("text cannot be empty"));
        }

        let mut embeddings = self.request(ctx, serde_json::json!(text), 1).await?;

        embeddings
            .pop()
            .ok_or_else(|| DomainError::provider("openai", "No embedding returned"))
    }

    async fn generate_batch(
        &self,
        ctx: &RequestContext,
        texts: &[String],
    ) -> Result<Vec<PromptEmbedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(DomainError::validation("batch contains empty text"));
        }

        self.request(ctx, serde_json::json!(texts), texts.len()).await
    }

    fn embedding_type(&self) -> &str {
        EMBEDDING_TYPE
    }

    fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or_else(|| {
            EMBEDDING_MODELS
                .iter()
                .find(|(name, _)| *name == self.model)
                .map(|(_, dims)| *dims)
                .unwrap_or(1536)
        })
    }
}

// OpenAI API types for embeddings

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
