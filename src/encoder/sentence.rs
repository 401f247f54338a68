//! Sentence-level encoder served over HTTP.
//!
//! Talks to a text-embeddings-inference compatible server: the server owns the
//! tokenizer and pooling, this side only checks the contract.

use serde_json::json;

use crate::config::EncoderConfig;
use crate::encoder::http::ModelServer;
use crate::encoder::{Encoder, validate_vector};
use crate::error::{EvalError, Result};

#[derive(Debug)]
pub struct SentenceEncoder {
    server: ModelServer,
    dims: usize,
}

impl SentenceEncoder {
    /// Connect to the model server. Fails if the server cannot report a loaded model.
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let server = ModelServer::connect(config)?;
        Ok(Self {
            server,
            dims: config.dims,
        })
    }

    /// Identifier of the model the server reported at construction.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.server.info().model_id
    }
}

impl Encoder for SentenceEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "inputs": text, "truncate": true });
        let mut vectors: Vec<Vec<f32>> = self.server.post("/embed", &body)?;
        if vectors.is_empty() {
            return Err(EvalError::Encoding(
                "sentence encoder returned no vectors".to_string(),
            ));
        }
        validate_vector("sentence", self.dims, vectors.swap_remove(0))
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "sentence"
    }
}
