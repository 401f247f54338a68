//! Token-model encoder with mean pooling.
//!
//! The token model yields one final hidden state per token (inference only,
//! no gradients); the sentence vector is their average across the token axis.

use serde_json::json;

use crate::config::EncoderConfig;
use crate::encoder::http::ModelServer;
use crate::encoder::{Encoder, validate_vector};
use crate::error::{EvalError, Result};

/// Source of per-token final hidden states.
pub trait TokenModel: Send + Sync {
    /// Hidden state of each token of `text`, tokenized with truncation to at
    /// most `max_tokens` tokens.
    fn hidden_states(&self, text: &str, max_tokens: usize) -> Result<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

/// Average token states into one vector of width `dims`.
pub fn mean_pool(states: &[Vec<f32>], dims: usize) -> Result<Vec<f32>> {
    if states.is_empty() {
        return Err(EvalError::Encoding(
            "token model returned no hidden states".to_string(),
        ));
    }

    let mut pooled = vec![0.0f32; dims];
    for (position, state) in states.iter().enumerate() {
        if state.len() != dims {
            return Err(EvalError::Encoding(format!(
                "token {position} has hidden size {}, expected {dims}",
                state.len()
            )));
        }
        for (acc, value) in pooled.iter_mut().zip(state) {
            *acc += value;
        }
    }

    let count = states.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }
    Ok(pooled)
}

pub struct MeanPoolingEncoder<M> {
    model: M,
    dims: usize,
    max_seq_len: usize,
}

impl<M: TokenModel> MeanPoolingEncoder<M> {
    pub fn new(model: M, dims: usize, max_seq_len: usize) -> Self {
        Self {
            model,
            dims,
            max_seq_len: max_seq_len.max(1),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: TokenModel> Encoder for MeanPoolingEncoder<M> {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut states = self.model.hidden_states(text, self.max_seq_len)?;
        if states.len() > self.max_seq_len {
            tracing::debug!(
                tokens = states.len(),
                max_seq_len = self.max_seq_len,
                "truncating token states"
            );
            states.truncate(self.max_seq_len);
        }
        let pooled = mean_pool(&states, self.dims)?;
        validate_vector(self.model.name(), self.dims, pooled)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "mean_pool"
    }
}

/// Token model behind a text-embeddings-inference style `/embed_all` endpoint.
#[derive(Debug)]
pub struct HttpTokenModel {
    server: ModelServer,
}

impl HttpTokenModel {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let server = ModelServer::connect(config)?;
        if let Some(limit) = server.info().max_input_length {
            if limit < config.max_seq_len {
                tracing::warn!(
                    server_limit = limit,
                    max_seq_len = config.max_seq_len,
                    "model server truncates below encoder.max_seq_len"
                );
            }
        }
        Ok(Self { server })
    }
}

impl TokenModel for HttpTokenModel {
    fn hidden_states(&self, text: &str, max_tokens: usize) -> Result<Vec<Vec<f32>>> {
        let body = json!({ "inputs": text, "truncate": true });
        let mut batches: Vec<Vec<Vec<f32>>> = self.server.post("/embed_all", &body)?;
        if batches.is_empty() {
            return Err(EvalError::Encoding(
                "token model returned an empty batch".to_string(),
            ));
        }
        let mut states = batches.swap_remove(0);
        states.truncate(max_tokens);
        Ok(states)
    }

    fn name(&self) -> &str {
        &self.server.info().model_id
    }
}
