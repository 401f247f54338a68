//! In-memory search backend
//!
//! Evaluates the request bodies produced by [`crate::search::StructuredQuery`]
//! against documents held in process, and answers with an
//! Elasticsearch-shaped envelope:
//!
//! - `knn`: cosine similarity against one vector field, scored `(1 + cos) / 2`,
//!   the `num_candidates` nearest company documents, cut to `k`.
//! - `multi_match`: distinct query tokens found in a field, times the field
//!   boost; `best_fields` keeps the maximum, `most_fields` the sum.
//! - `script_score`: the sum of `cosineSimilarity` terms and constants in the
//!   script source.
//!
//! Every request must carry a `term` filter on `company`. Ties keep
//! insertion order.

use std::collections::{BTreeMap, HashSet};

use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use crate::corpus::{Document, VECTOR_FIELDS};
use crate::encoder::cosine_similarity;
use crate::encoder::hash::tokenize;
use crate::error::{EvalError, Result};
use crate::search::backend::SearchBackend;
use crate::search::query::{LexicalField, MatchType};

const SCRIPT_TERM_PREFIX: &str = "cosineSimilarity(params.query_vector, '";
const SCRIPT_TERM_SUFFIX: &str = "')";

#[derive(Debug, Default)]
struct MemoryIndex {
    mapping: Value,
    documents: Vec<Document>,
}

impl MemoryIndex {
    /// Declared `dims` of a dense-vector field, if the mapping has one.
    fn declared_dims(&self, field: &str) -> Option<usize> {
        self.mapping
            .pointer(&format!("/mappings/properties/{field}/dims"))
            .and_then(Value::as_u64)
            .and_then(|dims| usize::try_from(dims).ok())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    indices: RwLock<BTreeMap<String, MemoryIndex>>,
}

fn bad_request(message: impl Into<String>) -> EvalError {
    EvalError::backend_status(400, message)
}

fn no_such_index(index: &str) -> EvalError {
    EvalError::backend_status(404, format!("no such index [{index}]"))
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend holding one index already populated with `documents`.
    #[must_use]
    pub fn with_documents(index: &str, documents: Vec<Document>) -> Self {
        let backend = Self::new();
        backend.indices.write().insert(
            index.to_string(),
            MemoryIndex {
                mapping: Value::Null,
                documents,
            },
        );
        backend
    }

    /// Number of documents in `index`.
    pub fn document_count(&self, index: &str) -> Result<usize> {
        self.indices
            .read()
            .get(index)
            .map(|idx| idx.documents.len())
            .ok_or_else(|| no_such_index(index))
    }
}

impl SearchBackend for InMemoryBackend {
    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let indices = self.indices.read();
        let idx = indices.get(index).ok_or_else(|| no_such_index(index))?;

        let scored = if let Some(knn) = body.get("knn") {
            score_knn(&idx.documents, knn)?
        } else if let Some(query) = body.get("query") {
            let size = body
                .get("size")
                .and_then(Value::as_u64)
                .map_or(10, |size| usize::try_from(size).unwrap_or(usize::MAX));
            let mut scored = score_bool_query(&idx.documents, query)?;
            scored.truncate(size);
            scored
        } else {
            return Err(bad_request("search body has neither knn nor query"));
        };

        let source = body.get("_source").and_then(Value::as_array);
        let hits: Vec<Value> = scored
            .iter()
            .map(|(position, score)| {
                let doc = &idx.documents[*position];
                json!({
                    "_index": index,
                    "_id": doc.id,
                    "_score": score,
                    "_source": project_source(doc, source),
                })
            })
            .collect();
        let max_score = scored.first().map(|(_, score)| *score);

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": hits.len(), "relation": "eq" },
                "max_score": max_score,
                "hits": hits,
            }
        }))
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.read().contains_key(index))
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        self.indices
            .write()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| no_such_index(index))
    }

    fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(bad_request(format!(
                "resource_already_exists_exception: index [{index}] already exists"
            )));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex {
                mapping: mapping.clone(),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    fn index_document(&self, index: &str, document: &Value) -> Result<()> {
        let doc: Document = serde_json::from_value(document.clone())
            .map_err(|err| bad_request(format!("document_parsing_exception: {err}")))?;

        let mut indices = self.indices.write();
        let idx = indices.get_mut(index).ok_or_else(|| no_such_index(index))?;
        for field in VECTOR_FIELDS {
            let (Some(vector), Some(dims)) = (doc.vector(field), idx.declared_dims(field)) else {
                continue;
            };
            if vector.len() != dims {
                return Err(bad_request(format!(
                    "document_parsing_exception: field [{field}] has {} dimensions, mapping declares {dims}",
                    vector.len()
                )));
            }
        }
        idx.documents.push(doc);
        Ok(())
    }

    fn refresh(&self, index: &str) -> Result<()> {
        if self.indices.read().contains_key(index) {
            Ok(())
        } else {
            Err(no_such_index(index))
        }
    }
}

fn project_source(doc: &Document, source: Option<&Vec<Value>>) -> Value {
    let Some(fields) = source else {
        return serde_json::to_value(doc).unwrap_or(Value::Null);
    };
    let mut projected = Map::new();
    for field in fields.iter().filter_map(Value::as_str) {
        if let Some(value) = doc.text_field(field) {
            projected.insert(field.to_string(), Value::String(value.to_string()));
        } else if let Some(vector) = doc.vector(field) {
            projected.insert(field.to_string(), json!(vector));
        }
    }
    Value::Object(projected)
}

/// `{"term": {"company": "X"}}`, the only filter shape queries emit.
fn company_term(filter: Option<&Value>) -> Result<&str> {
    filter
        .and_then(|filter| filter.pointer("/term/company"))
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request("query must carry a term filter on company"))
}

fn query_vector(value: Option<&Value>) -> Result<Vec<f32>> {
    let values = value
        .and_then(Value::as_array)
        .ok_or_else(|| bad_request("query_vector must be an array of numbers"))?;
    values
        .iter()
        .map(|value| {
            value
                .as_f64()
                .map(|number| number as f32)
                .ok_or_else(|| bad_request("query_vector must be an array of numbers"))
        })
        .collect()
}

fn usize_field(value: &Value, key: &str) -> Result<usize> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|number| usize::try_from(number).ok())
        .ok_or_else(|| bad_request(format!("knn.{key} must be a non-negative integer")))
}

fn sort_by_score(scored: &mut [(usize, f64)]) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
}

fn vector_of<'a>(doc: &'a Document, field: &str, dims: usize) -> Result<&'a [f32]> {
    let vector = doc.vector(field).ok_or_else(|| {
        bad_request(format!(
            "document [{}] has no value for vector field [{field}]",
            doc.id
        ))
    })?;
    if vector.len() != dims {
        return Err(bad_request(format!(
            "query vector has {dims} dimensions, field [{field}] has {}",
            vector.len()
        )));
    }
    Ok(vector)
}

fn score_knn(documents: &[Document], knn: &Value) -> Result<Vec<(usize, f64)>> {
    let field = knn
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request("knn.field is required"))?;
    let vector = query_vector(knn.get("query_vector"))?;
    let k = usize_field(knn, "k")?;
    let num_candidates = usize_field(knn, "num_candidates")?;
    if k > num_candidates {
        return Err(bad_request(format!(
            "[num_candidates] cannot be less than [k]: {num_candidates} < {k}"
        )));
    }
    let company = company_term(knn.get("filter"))?;

    let mut scored = Vec::new();
    for (position, doc) in documents.iter().enumerate() {
        if doc.company != company {
            continue;
        }
        let candidate = vector_of(doc, field, vector.len())?;
        let cosine = f64::from(cosine_similarity(&vector, candidate));
        scored.push((position, (1.0 + cosine) / 2.0));
    }
    // Exact search: the candidate pool is the nearest `num_candidates`.
    sort_by_score(&mut scored);
    scored.truncate(num_candidates);
    scored.truncate(k);
    Ok(scored)
}

fn score_bool_query(documents: &[Document], query: &Value) -> Result<Vec<(usize, f64)>> {
    let bool_query = query
        .get("bool")
        .ok_or_else(|| bad_request("only bool queries are supported"))?;
    let company = company_term(bool_query.get("filter"))?;
    let must = bool_query
        .get("must")
        .ok_or_else(|| bad_request("bool query needs a must clause"))?;

    let clause = match must {
        Value::Array(clauses) if clauses.len() == 1 => &clauses[0],
        Value::Array(_) => return Err(bad_request("exactly one must clause is supported")),
        other => other,
    };

    let mut scored = if let Some(multi_match) = clause.get("multi_match") {
        score_multi_match(documents, company, multi_match)?
    } else if let Some(script_score) = clause.get("script_score") {
        score_script(documents, company, script_score)?
    } else {
        return Err(bad_request("must clause is neither multi_match nor script_score"));
    };
    sort_by_score(&mut scored);
    Ok(scored)
}

fn score_multi_match(
    documents: &[Document],
    company: &str,
    multi_match: &Value,
) -> Result<Vec<(usize, f64)>> {
    let text = multi_match
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request("multi_match.query is required"))?;
    let fields: Vec<LexicalField> = multi_match
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| bad_request("multi_match.fields is required"))?
        .iter()
        .filter_map(Value::as_str)
        .map(LexicalField::parse)
        .collect();
    let match_type = match multi_match.get("type").and_then(Value::as_str) {
        None => MatchType::BestFields,
        Some(kind) => MatchType::parse(kind)
            .ok_or_else(|| bad_request(format!("unsupported multi_match type [{kind}]")))?,
    };

    let query_tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let mut scored = Vec::new();
    for (position, doc) in documents.iter().enumerate() {
        if doc.company != company {
            continue;
        }
        let field_scores = fields.iter().map(|field| {
            let matched = doc.text_field(&field.name).map_or(0, |value| {
                let tokens: HashSet<String> = tokenize(value).into_iter().collect();
                query_tokens.intersection(&tokens).count()
            });
            matched as f64 * field.weight()
        });
        let score = match match_type {
            MatchType::BestFields => field_scores.fold(0.0, f64::max),
            MatchType::MostFields => field_scores.sum::<f64>(),
        };
        if score > 0.0 {
            scored.push((position, score));
        }
    }
    Ok(scored)
}

enum ScriptTerm {
    Cosine(String),
    Constant(f64),
}

fn parse_script(source: &str) -> Result<Vec<ScriptTerm>> {
    source
        .split('+')
        .map(str::trim)
        .map(|term| {
            if let Some(field) = term
                .strip_prefix(SCRIPT_TERM_PREFIX)
                .and_then(|rest| rest.strip_suffix(SCRIPT_TERM_SUFFIX))
            {
                Ok(ScriptTerm::Cosine(field.to_string()))
            } else {
                term.parse::<f64>()
                    .map(ScriptTerm::Constant)
                    .map_err(|_| bad_request(format!("unsupported script term [{term}]")))
            }
        })
        .collect()
}

fn score_script(
    documents: &[Document],
    company: &str,
    script_score: &Value,
) -> Result<Vec<(usize, f64)>> {
    let inner_company = company_term(script_score.get("query"))?;
    let script = script_score
        .get("script")
        .ok_or_else(|| bad_request("script_score.script is required"))?;
    let source = script
        .get("source")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request("script.source is required"))?;
    let vector = query_vector(script.pointer("/params/query_vector"))?;
    let terms = parse_script(source)?;

    let mut scored = Vec::new();
    for (position, doc) in documents.iter().enumerate() {
        if doc.company != company || doc.company != inner_company {
            continue;
        }
        let mut score = 0.0;
        for term in &terms {
            score += match term {
                ScriptTerm::Cosine(field) => {
                    f64::from(cosine_similarity(&vector, vector_of(doc, field, vector.len())?))
                }
                ScriptTerm::Constant(value) => *value,
            };
        }
        if score < 0.0 {
            return Err(bad_request(format!(
                "script_score produced a negative score for document [{}]",
                doc.id
            )));
        }
        scored.push((position, score));
    }
    Ok(scored)
}
