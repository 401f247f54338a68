//! Query construction and execution
//!
//! ```text
//!   query text ──► builder ──► StructuredQuery ──► executor ──► ranked hits
//!                    │                                │
//!                 Encoder                       SearchBackend
//!                                        (Elasticsearch | in-memory)
//! ```

pub mod backend;
pub mod builder;
pub mod executor;
pub mod memory;
pub mod query;

pub use backend::{ElasticsearchClient, SearchBackend};
pub use builder::{
    BoostOutcome, BoostedFields, boost_source, build_hybrid_query, build_knn_query,
    build_lexical_query, check_hybrid_similarity,
};
pub use executor::{Hit, SearchOutput, SearchResponse, extract_hits, hit_id, search, search_hits};
pub use memory::InMemoryBackend;
pub use query::{HybridQuery, KnnQuery, LexicalField, LexicalQuery, MatchType, StructuredQuery};

use crate::config::BackendConfig;
use crate::error::{EvalError, Result};

/// HTTP backend for `[backend].url`.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn SearchBackend>> {
    let url = config.url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(Box::new(ElasticsearchClient::new(config)?));
    }
    Err(EvalError::Config(format!(
        "unsupported backend url: {url:?} (expected http(s)://host:port)"
    )))
}
