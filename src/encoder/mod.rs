//! Encoder adapter
//!
//! Every embedding capability sits behind [`Encoder`]: text in, a vector of
//! fixed length `dims()` out. The concrete implementation is chosen once, by
//! [`build_encoder`], from `[encoder].backend`:
//!
//! | backend     | implementation                                   |
//! |-------------|--------------------------------------------------|
//! | `hash`      | [`HashEncoder`], model-free feature hashing      |
//! | `sentence`  | [`SentenceEncoder`], pooled sentence model (HTTP)|
//! | `mean_pool` | [`MeanPoolingEncoder`] over [`HttpTokenModel`]   |

pub mod hash;
mod http;
pub mod mean_pool;
pub mod sentence;

use crate::config::EncoderConfig;
use crate::error::{EvalError, Result};

pub use hash::HashEncoder;
pub use mean_pool::{HttpTokenModel, MeanPoolingEncoder, TokenModel, mean_pool};
pub use sentence::SentenceEncoder;

/// Pluggable embedding backend interface.
///
/// Implementations are deterministic for a fixed model and input, truncate
/// overlong input instead of failing, and never return a vector whose length
/// differs from [`Encoder::dims`].
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
    fn dims(&self) -> usize;
    fn name(&self) -> &str;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        (**self).encode(text)
    }

    fn dims(&self) -> usize {
        (**self).dims()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build an encoder from config.
pub fn build_encoder(config: &EncoderConfig) -> Result<Box<dyn Encoder>> {
    if config.dims == 0 {
        return Err(EvalError::Config(
            "encoder.dims must be greater than 0".to_string(),
        ));
    }

    let backend = config.backend.trim().to_lowercase();
    match backend.as_str() {
        "" | "hash" => Ok(Box::new(
            HashEncoder::new(config.dims).with_max_tokens(config.max_seq_len),
        )),
        "sentence" => Ok(Box::new(SentenceEncoder::new(config)?)),
        "mean_pool" | "mean-pool" => {
            let model = HttpTokenModel::new(config)?;
            Ok(Box::new(MeanPoolingEncoder::new(
                model,
                config.dims,
                config.max_seq_len,
            )))
        }
        other => Err(EvalError::Config(format!(
            "unknown encoder backend: {other} (expected hash|sentence|mean_pool)"
        ))),
    }
}

/// Check an encoder output against the adapter contract.
///
/// A zero or non-finite vector would silently corrupt every similarity
/// ranking downstream, so both are errors.
pub fn validate_vector(encoder: &str, dims: usize, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.len() != dims {
        return Err(EvalError::Encoding(format!(
            "{encoder} returned {} dimensions, expected {dims}",
            vector.len()
        )));
    }
    if vector.iter().any(|value| !value.is_finite()) {
        return Err(EvalError::Encoding(format!(
            "{encoder} returned a non-finite value"
        )));
    }
    if vector.iter().all(|value| *value == 0.0) {
        return Err(EvalError::Encoding(format!(
            "{encoder} returned a zero vector"
        )));
    }
    Ok(vector)
}

/// Cosine similarity in `[-1, 1]`; 0.0 for mismatched lengths or zero norms.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
