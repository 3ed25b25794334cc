//! Embeddings over an OpenAI-compatible `/embeddings` endpoint.

use super::{expect_count, Embedder};
use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inputs per HTTP request.
const BATCH_SIZE: usize = 64;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Remote embedding provider.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbedder {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EmbedError::Config(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Build from `EMBEDDINGS_API_BASE`, `EMBEDDINGS_API_KEY` and `EMBEDDINGS_MODEL`.
    ///
    /// Returns `None` when neither a base URL nor a key is configured.
    pub fn from_env() -> Option<Result<Self, EmbedError>> {
        let base = std::env::var("EMBEDDINGS_API_BASE").ok();
        let key = std::env::var("EMBEDDINGS_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if base.is_none() && key.is_none() {
            return None;
        }
        let model = std::env::var("EMBEDDINGS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(
            base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            key,
            model,
        ))
    }

    fn build_headers(&self) -> Result<HeaderMap, EmbedError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| EmbedError::Config(format!("Invalid API key: {e}")))?,
            );
        }
        Ok(headers)
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .headers(self.build_headers()?)
            .json(&ApiRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Request(format!("status {status}: {body}")));
        }

        let mut api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Request(format!("bad response body: {e}")))?;
        api_response.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = api_response.data.into_iter().map(|d| d.embedding).collect();
        expect_count(batch.len(), &vectors)?;
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ApiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
