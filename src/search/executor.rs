//! Search executor
//!
//! Sends a [`StructuredQuery`] to a backend and flattens the response
//! envelope into a ranked list of source projections. Backend failures are
//! returned to the caller unchanged.

use serde_json::{Map, Value};

use crate::error::{EvalError, Result};
use crate::search::backend::SearchBackend;
use crate::search::query::StructuredQuery;

/// One ranked result: the requested source fields of a hit.
pub type Hit = Map<String, Value>;

/// Output shape requested from [`search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchOutput {
    /// Hits projected to the query's source fields.
    #[default]
    Projected,
    /// The unmodified backend envelope, for diagnostics.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResponse {
    Hits(Vec<Hit>),
    Raw(Value),
}

impl SearchResponse {
    /// Projected hits, or `None` for a raw response.
    #[must_use]
    pub fn hits(&self) -> Option<&[Hit]> {
        match self {
            Self::Hits(hits) => Some(hits),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Hits(hits) => Value::Array(hits.into_iter().map(Value::Object).collect()),
            Self::Raw(raw) => raw,
        }
    }
}

/// Execute `query` against `index`.
pub fn search(
    backend: &dyn SearchBackend,
    query: &StructuredQuery,
    index: &str,
    output: SearchOutput,
) -> Result<SearchResponse> {
    let body = query.to_body();
    let response = backend.search(index, &body)?;
    match output {
        SearchOutput::Raw => Ok(SearchResponse::Raw(response)),
        SearchOutput::Projected => {
            let hits = extract_hits(&response, query.source())?;
            tracing::debug!(
                kind = query.kind(),
                company = query.company(),
                hits = hits.len(),
                "search complete"
            );
            Ok(SearchResponse::Hits(hits))
        }
    }
}

/// Execute `query` and return the projected hits.
pub fn search_hits(
    backend: &dyn SearchBackend,
    query: &StructuredQuery,
    index: &str,
) -> Result<Vec<Hit>> {
    match search(backend, query, index, SearchOutput::Projected)? {
        SearchResponse::Hits(hits) => Ok(hits),
        SearchResponse::Raw(_) => Err(EvalError::MalformedResponse(
            "expected projected hits".to_string(),
        )),
    }
}

/// Flatten `hits.hits[*]._source`, keeping only `fields`, in response order.
pub fn extract_hits(response: &Value, fields: &[String]) -> Result<Vec<Hit>> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| EvalError::MalformedResponse("missing hits.hits".to_string()))?;

    hits.iter()
        .enumerate()
        .map(|(rank, hit)| {
            let source = hit.get("_source").and_then(Value::as_object).ok_or_else(|| {
                EvalError::MalformedResponse(format!("hit {} has no _source object", rank + 1))
            })?;
            Ok(fields
                .iter()
                .filter_map(|field| {
                    source
                        .get(field)
                        .map(|value| (field.clone(), value.clone()))
                })
                .collect())
        })
        .collect()
}

/// Document identifier of a projected hit.
#[must_use]
pub fn hit_id(hit: &Hit) -> Option<&str> {
    hit.get("id").and_then(Value::as_str)
}
