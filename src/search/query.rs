//! Structured queries and their wire shapes
//!
//! Every variant is scoped to exactly one company through a `term` filter.
//! [`StructuredQuery::to_body`] renders the request body the search backend
//! receives.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Lexical field with an optional boost, rendered as `name^boost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalField {
    pub name: String,
    pub boost: Option<String>,
}

impl LexicalField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boost: None,
        }
    }

    pub fn boosted(name: impl Into<String>, boost: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boost: Some(boost.into()),
        }
    }

    /// Parse the `name^boost` notation. A bare name is unboosted.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('^') {
            Some((name, boost)) if !boost.is_empty() => Self::boosted(name, boost),
            Some((name, _)) => Self::new(name),
            None => Self::new(spec),
        }
    }

    /// Numeric multiplier; 1.0 when unboosted or unparsable.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.boost
            .as_deref()
            .and_then(|boost| boost.parse::<f64>().ok())
            .unwrap_or(1.0)
    }
}

impl fmt::Display for LexicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.boost {
            Some(boost) => write!(f, "{}^{boost}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// `multi_match` scoring mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Score of the single best-matching field.
    #[default]
    BestFields,
    /// Sum of the scores of all matching fields.
    MostFields,
}

impl MatchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestFields => "best_fields",
            Self::MostFields => "most_fields",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "best_fields" => Some(Self::BestFields),
            "most_fields" => Some(Self::MostFields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnQuery {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub k: usize,
    pub num_candidates: usize,
    pub company: String,
    pub source: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalQuery {
    pub query: String,
    pub fields: Vec<LexicalField>,
    pub match_type: MatchType,
    pub company: String,
    pub size: usize,
    pub source: Vec<String>,
}

/// Summed cosine similarity over several vector fields, offset by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridQuery {
    pub fields: Vec<String>,
    pub query_vector: Vec<f32>,
    pub company: String,
    pub size: usize,
    pub source: Vec<String>,
}

impl HybridQuery {
    /// Painless source: one `cosineSimilarity` term per field, then `+ 1`.
    #[must_use]
    pub fn script_source(&self) -> String {
        script_source(&self.fields)
    }
}

/// Render the hybrid scoring script for `fields`.
#[must_use]
pub fn script_source(fields: &[String]) -> String {
    let mut source = String::new();
    for field in fields {
        source.push_str("cosineSimilarity(params.query_vector, '");
        source.push_str(field);
        source.push_str("') + ");
    }
    source.push('1');
    source
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredQuery {
    Knn(KnnQuery),
    Lexical(LexicalQuery),
    Hybrid(HybridQuery),
}

impl StructuredQuery {
    #[must_use]
    pub fn company(&self) -> &str {
        match self {
            Self::Knn(query) => &query.company,
            Self::Lexical(query) => &query.company,
            Self::Hybrid(query) => &query.company,
        }
    }

    /// Source fields each hit is projected to.
    #[must_use]
    pub fn source(&self) -> &[String] {
        match self {
            Self::Knn(query) => &query.source,
            Self::Lexical(query) => &query.source,
            Self::Hybrid(query) => &query.source,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Knn(_) => "knn",
            Self::Lexical(_) => "lexical",
            Self::Hybrid(_) => "hybrid",
        }
    }

    /// Request body for `POST /{index}/_search`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        match self {
            Self::Knn(query) => json!({
                "knn": {
                    "field": query.field,
                    "query_vector": query.query_vector,
                    "k": query.k,
                    "num_candidates": query.num_candidates,
                    "filter": company_filter(&query.company),
                },
                "_source": query.source,
            }),
            Self::Lexical(query) => {
                let fields: Vec<String> = query.fields.iter().map(ToString::to_string).collect();
                json!({
                    "size": query.size,
                    "query": {
                        "bool": {
                            "must": {
                                "multi_match": {
                                    "query": query.query,
                                    "fields": fields,
                                    "type": query.match_type.as_str(),
                                }
                            },
                            "filter": company_filter(&query.company),
                        }
                    },
                    "_source": query.source,
                })
            }
            Self::Hybrid(query) => json!({
                "size": query.size,
                "query": {
                    "bool": {
                        "must": [{
                            "script_score": {
                                "query": company_filter(&query.company),
                                "script": {
                                    "source": query.script_source(),
                                    "params": { "query_vector": query.query_vector },
                                }
                            }
                        }],
                        "filter": company_filter(&query.company),
                    }
                },
                "_source": query.source,
            }),
        }
    }
}

fn company_filter(company: &str) -> Value {
    json!({ "term": { "company": company } })
}
