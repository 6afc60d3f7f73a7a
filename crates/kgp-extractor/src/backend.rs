//! Extraction model backends
//!
//! Two model families are supported:
//! - span models, which predict typed entity spans and scored triplets
//! - sequence models, which generate tagged sequences for the
//!   [`decoder`](crate::decoder)
//!
//! Both are reached over HTTP; the models themselves run elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use kgp_core::{BackendKind, ExtractionConfig, KgpError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Model traits
// ============================================================================

/// A predicted entity span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedSpan {
    pub text: String,
    pub label: String,
}

/// A predicted relation between two spans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedTriplet {
    pub subject: String,
    pub label: String,
    pub object: String,
    pub confidence: f32,
}

/// Everything a span model predicts for one text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanPrediction {
    #[serde(default)]
    pub spans: Vec<PredictedSpan>,
    #[serde(default)]
    pub triplets: Vec<PredictedTriplet>,
}

/// Model that predicts spans and triplets directly
#[async_trait]
pub trait SpanModel: Send + Sync {
    async fn infer(&self, text: &str) -> Result<SpanPrediction>;
}

/// Generation settings for sequence models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationParams {
    pub num_beams: usize,
    pub num_return_sequences: usize,
    pub max_length: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_beams: 5,
            num_return_sequences: 5,
            max_length: 256,
        }
    }
}

impl From<&ExtractionConfig> for GenerationParams {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            num_beams: config.num_beams,
            num_return_sequences: config.num_return_sequences,
            max_length: config.max_length,
        }
    }
}

/// Model that generates tagged sequences needing decoding
#[async_trait]
pub trait SequenceModel: Send + Sync {
    /// Returned sequences keep their special tokens
    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<Vec<String>>;
}

/// An extraction backend, by capability
pub enum Backend {
    Spans(Box<dyn SpanModel>),
    Sequences(Box<dyn SequenceModel>, GenerationParams),
}

impl Backend {
    /// Build the HTTP backend named in the configuration
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Self::from_method(config.backend.as_str(), config)
    }

    /// Build the HTTP backend for a method name, failing on unknown names
    pub fn from_method(method: &str, config: &ExtractionConfig) -> Result<Self> {
        let kind: BackendKind = method.parse()?;
        let backend = match kind {
            BackendKind::Spans => Self::Spans(Box::new(HttpSpanModel::from_config(config)?)),
            BackendKind::Sequences => Self::Sequences(
                Box::new(HttpSequenceModel::from_config(config)?),
                GenerationParams::from(config),
            ),
        };
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Spans(_) => BackendKind::Spans,
            Self::Sequences(..) => BackendKind::Sequences,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spans(_) => f.write_str("Backend::Spans"),
            Self::Sequences(_, params) => write!(f, "Backend::Sequences({params:?})"),
        }
    }
}

// ============================================================================
// HTTP clients
// ============================================================================

fn build_client(config: &ExtractionConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| KgpError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

fn endpoint_url(base: &str, route: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), route)
}

async fn post_json<Req: Serialize + Sync, Resp: for<'de> Deserialize<'de>>(
    client: &Client,
    url: &str,
    request: &Req,
) -> Result<Resp> {
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| KgpError::ExtractionError(format!("Request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(KgpError::ExtractionError(format!(
            "Model service returned {status}: {error_text}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| KgpError::ExtractionError(format!("Failed to parse model response: {e}")))
}

/// Span model served over HTTP (`POST {endpoint}/infer`)
pub struct HttpSpanModel {
    client: Client,
    endpoint: String,
    top_k: usize,
}

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    text: &'a str,
    top_k: usize,
}

impl HttpSpanModel {
    pub fn new(client: Client, endpoint: impl Into<String>, top_k: usize) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            top_k,
        }
    }

    /// Create from config
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::new(
            build_client(config)?,
            config.endpoint.clone(),
            config.top_k,
        ))
    }
}

#[async_trait]
impl SpanModel for HttpSpanModel {
    async fn infer(&self, text: &str) -> Result<SpanPrediction> {
        let request = InferRequest {
            text,
            top_k: self.top_k,
        };
        post_json(&self.client, &endpoint_url(&self.endpoint, "infer"), &request).await
    }
}

/// Sequence model served over HTTP (`POST {endpoint}/generate`)
pub struct HttpSequenceModel {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    #[serde(flatten)]
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    sequences: Vec<String>,
}

impl HttpSequenceModel {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::new(build_client(config)?, config.endpoint.clone()))
    }
}

#[async_trait]
impl SequenceModel for HttpSequenceModel {
    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<Vec<String>> {
        let request = GenerateRequest {
            text,
            params: *params,
        };
        let response: GenerateResponse =
            post_json(&self.client, &endpoint_url(&self.endpoint, "generate"), &request).await?;
        Ok(response.sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_method_fails_fast() {
        let config = ExtractionConfig::default();
        let err = Backend::from_method("gliner", &config).unwrap_err();
        assert!(matches!(err, KgpError::ConfigError(_)));
    }

    #[test]
    fn test_backend_from_method() {
        let config = ExtractionConfig::default();
        let backend = Backend::from_method("mrebel", &config).unwrap();
        assert_eq!(backend.kind(), BackendKind::Sequences);
        match backend {
            Backend::Sequences(_, params) => assert_eq!(params, GenerationParams::default()),
            Backend::Spans(_) => panic!("expected a sequence backend"),
        }
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("http://model:9000/", "infer"),
            "http://model:9000/infer"
        );
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            text: "Paris is in France",
            params: GenerationParams::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["num_beams"], 5);
        assert_eq!(json["num_return_sequences"], 5);
        assert_eq!(json["text"], "Paris is in France");
    }

    #[test]
    fn test_span_prediction_parses_partial_payload() {
        let prediction: SpanPrediction =
            serde_json::from_str(r#"{"spans": [{"text": "Paris", "label": "LOC"}]}"#).unwrap();
        assert_eq!(prediction.spans.len(), 1);
        assert!(prediction.triplets.is_empty());
    }
}
