//! Query builder
//!
//! Pure constructors for the three [`StructuredQuery`] shapes. Builders that
//! need a query vector take the encoder explicitly and encode exactly once.
//! Input is validated here so nothing malformed reaches the backend.

use std::collections::BTreeMap;

use crate::encoder::Encoder;
use crate::error::{EvalError, Result};
use crate::search::query::{
    HybridQuery, KnnQuery, LexicalField, LexicalQuery, MatchType, StructuredQuery,
};

/// Result count for every query shape.
pub const DEFAULT_K: usize = 5;

/// KNN candidate pool.
pub const DEFAULT_NUM_CANDIDATES: usize = 10_000;

pub const DEFAULT_VECTOR_FIELD: &str = "text_vector";

/// Fields matched by lexical queries when the caller names none.
pub const DEFAULT_LEXICAL_FIELDS: [&str; 4] = ["reporting_period", "filing_type", "section", "text"];

/// Vector fields summed by hybrid queries.
pub const DEFAULT_HYBRID_FIELDS: [&str; 2] = ["text_vector", "non_text_vector"];

/// Similarity metric the hybrid `+ 1` offset is defined for.
pub const HYBRID_SIMILARITY: &str = "cosine";

fn require_company(company: &str) -> Result<()> {
    if company.trim().is_empty() {
        return Err(EvalError::Validation(
            "company filter must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(EvalError::Validation(
            "result size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Pure vector nearest-neighbor query against one field.
pub fn build_knn_query(
    encoder: &dyn Encoder,
    query: &str,
    company: &str,
    source: &[String],
    vector_field: &str,
    k: usize,
    num_candidates: usize,
) -> Result<StructuredQuery> {
    require_company(company)?;
    require_size(k)?;
    if k > num_candidates {
        return Err(EvalError::Validation(format!(
            "k ({k}) must not exceed num_candidates ({num_candidates})"
        )));
    }
    if vector_field.trim().is_empty() {
        return Err(EvalError::Validation(
            "vector field must not be empty".to_string(),
        ));
    }

    let query_vector = encoder.encode(query)?;
    tracing::debug!(field = vector_field, k, num_candidates, company, "built knn query");
    Ok(StructuredQuery::Knn(KnnQuery {
        field: vector_field.to_string(),
        query_vector,
        k,
        num_candidates,
        company: company.to_string(),
        source: source.to_vec(),
    }))
}

/// Lexical `best_fields` multi-match. An empty field list falls back to
/// [`DEFAULT_LEXICAL_FIELDS`], unboosted.
pub fn build_lexical_query(
    query: &str,
    company: &str,
    fields: &[LexicalField],
    size: usize,
    source: &[String],
) -> Result<StructuredQuery> {
    require_company(company)?;
    require_size(size)?;

    let fields = if fields.is_empty() {
        DEFAULT_LEXICAL_FIELDS.iter().map(|name| LexicalField::new(*name)).collect()
    } else {
        fields.to_vec()
    };

    tracing::debug!(fields = fields.len(), size, company, "built lexical query");
    Ok(StructuredQuery::Lexical(LexicalQuery {
        query: query.to_string(),
        fields,
        match_type: MatchType::BestFields,
        company: company.to_string(),
        size,
        source: source.to_vec(),
    }))
}

/// Summed cosine similarity across `fields`, plus one.
///
/// At least one field is required: with none the score would be the
/// constant 1 for every document.
pub fn build_hybrid_query(
    encoder: &dyn Encoder,
    query: &str,
    company: &str,
    source: &[String],
    fields: &[String],
    size: usize,
) -> Result<StructuredQuery> {
    require_company(company)?;
    require_size(size)?;
    if fields.is_empty() {
        return Err(EvalError::Validation(
            "hybrid query needs at least one vector field".to_string(),
        ));
    }
    // Names are spliced into the script between quotes.
    if let Some(bad) = fields.iter().find(|field| !is_script_field_name(field)) {
        return Err(EvalError::Validation(format!(
            "invalid hybrid vector field name: {bad:?} (letters, digits, '_', '-' and '.' only)"
        )));
    }

    let query_vector = encoder.encode(query)?;
    tracing::debug!(fields = ?fields, size, company, "built hybrid query");
    Ok(StructuredQuery::Hybrid(HybridQuery {
        fields: fields.to_vec(),
        query_vector,
        company: company.to_string(),
        size,
        source: source.to_vec(),
    }))
}

fn is_script_field_name(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Reject index similarity metrics the hybrid offset is not defined for.
pub fn check_hybrid_similarity(similarity: &str) -> Result<()> {
    if similarity.eq_ignore_ascii_case(HYBRID_SIMILARITY) {
        Ok(())
    } else {
        Err(EvalError::Validation(format!(
            "hybrid scoring adds 1 to cosine similarities; vector fields use {similarity}"
        )))
    }
}

/// What `boost_source` did with one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoostOutcome {
    Boosted(String),
    /// Not named in the boost map.
    Unboosted,
    /// Named in the boost map, but the value could not be used.
    Skipped { reason: String },
}

/// Rewritten field list plus a per-field record of what happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoostedFields {
    pub fields: Vec<LexicalField>,
    pub outcomes: Vec<(String, BoostOutcome)>,
    /// Boost keys that name no field in the list.
    pub unmatched: Vec<String>,
}

impl BoostedFields {
    /// Fields in `name^boost` notation.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn outcome(&self, field: &str) -> Option<&BoostOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, outcome)| outcome)
    }

    #[must_use]
    pub fn skipped(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                BoostOutcome::Skipped { reason } => Some((name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Fail when the boost map names fields that are not being searched.
    pub fn ensure_all_matched(&self) -> Result<()> {
        if self.unmatched.is_empty() {
            Ok(())
        } else {
            Err(EvalError::Validation(format!(
                "boosts name fields that are not searched: {}",
                self.unmatched.join(", ")
            )))
        }
    }
}

fn resolve_boost(value: &str) -> std::result::Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("boost value is empty".to_string());
    }
    match trimmed.parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight > 0.0 => Ok(trimmed.to_string()),
        Ok(_) => Err(format!("boost value {trimmed} is not a positive number")),
        Err(_) => Err(format!("boost value {trimmed:?} is not a number")),
    }
}

/// Apply per-field boosts to a lexical field list.
///
/// Fields missing from `boosts` pass through unchanged. A field whose boost
/// value cannot be resolved stays unboosted and is recorded as
/// [`BoostOutcome::Skipped`]. An empty field list means the default fields.
#[must_use]
pub fn boost_source(boosts: &BTreeMap<String, String>, fields: &[String]) -> BoostedFields {
    let fields: Vec<LexicalField> = if fields.is_empty() {
        DEFAULT_LEXICAL_FIELDS.iter().map(|name| LexicalField::new(*name)).collect()
    } else {
        fields.iter().map(|spec| LexicalField::parse(spec)).collect()
    };

    let mut result = BoostedFields::default();
    for mut field in fields {
        let outcome = match boosts.get(&field.name) {
            None => BoostOutcome::Unboosted,
            Some(value) => match resolve_boost(value) {
                Ok(boost) => {
                    field.boost = Some(boost.clone());
                    BoostOutcome::Boosted(boost)
                }
                Err(reason) => {
                    tracing::warn!(field = %field.name, %reason, "boost skipped");
                    BoostOutcome::Skipped { reason }
                }
            },
        };
        result.outcomes.push((field.name.clone(), outcome));
        result.fields.push(field);
    }

    result.unmatched = boosts
        .keys()
        .filter(|key| !result.fields.iter().any(|field| &field.name == *key))
        .cloned()
        .collect();
    if !result.unmatched.is_empty() {
        tracing::warn!(fields = ?result.unmatched, "boosts name fields that are not searched");
    }
    result
}
