//! Hash embeddings
//!
//! FNV-1a feature hashing over unigrams and bigrams, L2 normalized.
//! No model dependencies - fully deterministic, used for offline runs and tests.

use crate::encoder::{Encoder, validate_vector};
use crate::error::{EvalError, Result};

/// Hash encoder using FNV-1a
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dim: usize,
    /// Tokens past this count are dropped, mirroring model-side truncation.
    max_tokens: usize,
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self {
            dim: 768,
            max_tokens: 512,
        }
    }
}

impl HashEncoder {
    /// Create encoder with specified dimension
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    /// Truncate input to `max_tokens` tokens before hashing.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(EvalError::Encoding(
                "hash encoder: input has no indexable tokens".to_string(),
            ));
        }
        if tokens.len() > self.max_tokens {
            tracing::debug!(
                tokens = tokens.len(),
                max_tokens = self.max_tokens,
                "truncating input"
            );
            tokens.truncate(self.max_tokens);
        }

        let mut embedding = vec![0.0; self.dim];
        for token in &tokens {
            accumulate_embedding(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate_embedding(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        validate_vector("hash", self.dim, embedding)
    }
}

impl Encoder for HashEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    fn dims(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Lowercased alphanumeric tokens of length >= 2.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(ToString::to_string)
        .collect()
}

fn accumulate_embedding(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a_hash(token.as_bytes());
    let len = embedding.len();

    for i in 0..len {
        let dim_hash = fnv1a_hash_with_salt(token_hash, i as u64);
        let sign = if dim_hash & 1 == 0 { weight } else { -weight };
        let dim = usize::try_from((dim_hash >> 1) % len as u64).unwrap_or(0);
        embedding[dim] += sign;
    }
}

fn fnv1a_hash_with_salt(seed: u64, salt: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&salt.to_le_bytes());
    fnv1a_hash(&bytes)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
