use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::EncoderConfig;
use crate::error::{EvalError, Result};

/// `GET /info` payload of a text-embeddings-inference style model server.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelInfo {
    pub model_id: String,
    #[serde(default)]
    pub max_input_length: Option<usize>,
}

/// Blocking client for a model server exposing `/info`, `/embed` and `/embed_all`.
pub(crate) struct ModelServer {
    endpoint: String,
    client: reqwest::blocking::Client,
    info: ModelInfo,
}

impl std::fmt::Debug for ModelServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelServer")
            .field("endpoint", &self.endpoint)
            .field("model_id", &self.info.model_id)
            .finish_non_exhaustive()
    }
}

impl ModelServer {
    /// Connect and confirm a model is loaded. Any failure here is reported as
    /// an encoding error so a broken model never degrades into silent vectors.
    pub fn connect(config: &EncoderConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(EvalError::Config(
                "encoder endpoint is empty; set [encoder].endpoint".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| EvalError::Config(format!("encoder http client: {err}")))?;

        let response = client
            .get(format!("{endpoint}/info"))
            .send()
            .map_err(|err| {
                EvalError::Encoding(format!(
                    "failed to load model {} from {endpoint}: {err}",
                    config.model
                ))
            })?;
        if !response.status().is_success() {
            return Err(EvalError::Encoding(format!(
                "failed to load model {} from {endpoint}: HTTP {}",
                config.model,
                response.status()
            )));
        }
        let info: ModelInfo = response.json().map_err(|err| {
            EvalError::Encoding(format!("model server {endpoint} info parse: {err}"))
        })?;

        if !config.model.is_empty() && info.model_id != config.model {
            tracing::warn!(
                expected = %config.model,
                loaded = %info.model_id,
                "model server is serving a different model"
            );
        }
        tracing::debug!(endpoint = %endpoint, model = %info.model_id, "connected to model server");

        Ok(Self {
            endpoint,
            client,
            info,
        })
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// POST a JSON body and decode the response, mapping every failure to an
    /// encoding error.
    pub fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|err| EvalError::Encoding(format!("encoder request {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(EvalError::Encoding(format!(
                "encoder request {url} returned HTTP {status}: {detail}"
            )));
        }

        response
            .json()
            .map_err(|err| EvalError::Encoding(format!("encoder response parse {url}: {err}")))
    }
}
