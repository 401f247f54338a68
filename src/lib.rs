//! Retrieval evaluation harness.
//!
//! - [`encoder`]: text to fixed-width vectors behind the [`encoder::Encoder`] trait
//! - [`corpus`]: filing passages, content ids and vector enrichment
//! - [`search`]: KNN, lexical and hybrid query builders, backends and the executor
//! - [`index`]: index schema and ingestion
//! - [`eval`]: Hit Rate and MRR over labeled queries

pub mod app;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod encoder;
pub mod error;
pub mod eval;
pub mod index;
pub mod search;
pub mod test_utils;
pub mod utils;

pub use error::{EvalError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
