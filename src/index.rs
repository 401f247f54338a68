//! Index schema and ingestion
//!
//! The index is rebuilt from scratch on every ingestion run: drop, create
//! with [`index_mapping`], add documents one by one, refresh.

use serde::Serialize;
use serde_json::{Value, json};

use crate::corpus::{Document, VECTOR_FIELDS, corpus_dims};
use crate::error::{EvalError, Result};
use crate::search::backend::SearchBackend;

/// Settings and mappings for a filing index whose vectors have `dims` entries.
#[must_use]
pub fn index_mapping(dims: usize, similarity: &str) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert("company".to_string(), json!({ "type": "keyword" }));
    for field in ["reporting_period", "filing_type", "text", "section"] {
        properties.insert(field.to_string(), json!({ "type": "text" }));
    }
    properties.insert("id".to_string(), json!({ "type": "keyword" }));
    for field in VECTOR_FIELDS {
        properties.insert(
            field.to_string(),
            json!({
                "type": "dense_vector",
                "dims": dims,
                "index": true,
                "similarity": similarity,
            }),
        );
    }

    json!({
        "settings": { "number_of_shards": 1, "number_of_replicas": 0 },
        "mappings": { "properties": properties },
    })
}

/// Drop `index` if it exists, then create it empty.
pub fn recreate_index(
    backend: &dyn SearchBackend,
    index: &str,
    dims: usize,
    similarity: &str,
) -> Result<()> {
    if dims == 0 {
        return Err(EvalError::Validation(
            "index vector dims must be greater than 0".to_string(),
        ));
    }
    if backend.index_exists(index)? {
        backend.delete_index(index)?;
    }
    backend.create_index(index, &index_mapping(dims, similarity))
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub failed: usize,
    /// `(document id, error)` for each rejected document.
    pub errors: Vec<(String, String)>,
}

impl IndexReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.indexed + self.failed
    }
}

/// Add every document to `index`, then refresh.
///
/// A rejected document is logged and counted without stopping the run.
/// Transport failures stop the run, since every later document would fail
/// the same way.
pub fn index_documents(
    backend: &dyn SearchBackend,
    index: &str,
    docs: &[Document],
) -> Result<IndexReport> {
    index_documents_with(backend, index, docs, |_| {})
}

/// [`index_documents`] calling `on_progress` with the number of documents processed.
pub fn index_documents_with(
    backend: &dyn SearchBackend,
    index: &str,
    docs: &[Document],
    mut on_progress: impl FnMut(usize),
) -> Result<IndexReport> {
    let mut report = IndexReport::default();
    for (done, doc) in docs.iter().enumerate() {
        let body = serde_json::to_value(doc)?;
        match backend.index_document(index, &body) {
            Ok(()) => report.indexed += 1,
            Err(err @ EvalError::Backend { status: None, .. }) => return Err(err),
            Err(err) => {
                tracing::warn!(id = %doc.id, error = %err, "document rejected");
                report.failed += 1;
                report.errors.push((doc.id.clone(), err.to_string()));
            }
        }
        on_progress(done + 1);
    }
    backend.refresh(index)?;
    tracing::info!(index, indexed = report.indexed, failed = report.failed, "ingestion complete");
    Ok(report)
}

/// Recreate `index` sized for the corpus and ingest it.
pub fn rebuild_index(
    backend: &dyn SearchBackend,
    index: &str,
    docs: &[Document],
    similarity: &str,
    on_progress: impl FnMut(usize),
) -> Result<IndexReport> {
    let dims = corpus_dims(docs)?.ok_or_else(|| {
        EvalError::Validation("corpus has no vectors; run `rag-eval embed` first".to_string())
    })?;
    recreate_index(backend, index, dims, similarity)?;
    index_documents_with(backend, index, docs, on_progress)
}
