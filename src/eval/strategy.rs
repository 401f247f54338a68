//! Retrieval strategies as evaluator search functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, SearchConfig};
use crate::encoder::Encoder;
use crate::error::{EvalError, Result};
use crate::eval::ground_truth::GroundTruthEntry;
use crate::search::backend::SearchBackend;
use crate::search::builder::{
    boost_source, build_hybrid_query, build_knn_query, build_lexical_query,
    check_hybrid_similarity,
};
use crate::search::executor::{Hit, search_hits};
use crate::search::query::{LexicalField, StructuredQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    Knn,
    Lexical,
    Hybrid,
}

impl RetrievalStrategy {
    pub const ALL: [Self; 3] = [Self::Knn, Self::Lexical, Self::Hybrid];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Knn => "knn",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }

    /// Lexical retrieval never encodes the question.
    #[must_use]
    pub const fn needs_encoder(self) -> bool {
        !matches!(self, Self::Lexical)
    }
}

/// Whether any of `strategies` has to encode questions.
#[must_use]
pub fn any_needs_encoder(strategies: &[RetrievalStrategy]) -> bool {
    strategies.iter().any(|strategy| strategy.needs_encoder())
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = EvalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "knn" | "vector" => Ok(Self::Knn),
            "lexical" | "text" | "bm25" => Ok(Self::Lexical),
            "hybrid" | "combined" => Ok(Self::Hybrid),
            other => Err(EvalError::Config(format!(
                "unknown retrieval strategy: {other} (expected knn|lexical|hybrid)"
            ))),
        }
    }
}

/// Parse a list of strategy names, keeping order and dropping repeats.
pub fn parse_strategies<S: AsRef<str>>(names: &[S]) -> Result<Vec<RetrievalStrategy>> {
    let mut strategies = Vec::new();
    for name in names {
        let strategy: RetrievalStrategy = name.as_ref().parse()?;
        if !strategies.contains(&strategy) {
            strategies.push(strategy);
        }
    }
    Ok(strategies)
}

/// Everything needed to turn a ground-truth entry into a ranked hit list.
pub struct StrategySearcher<'a> {
    strategy: RetrievalStrategy,
    backend: &'a dyn SearchBackend,
    encoder: Option<&'a dyn Encoder>,
    index: &'a str,
    settings: &'a SearchConfig,
    lexical_fields: Vec<LexicalField>,
}

impl<'a> StrategySearcher<'a> {
    /// Validate the settings for `strategy` once, up front.
    ///
    /// `encoder` may be `None` only for strategies that never encode.
    pub fn new(
        strategy: RetrievalStrategy,
        backend: &'a dyn SearchBackend,
        encoder: Option<&'a dyn Encoder>,
        backend_config: &'a BackendConfig,
        settings: &'a SearchConfig,
    ) -> Result<Self> {
        if strategy.needs_encoder() && encoder.is_none() {
            return Err(EvalError::Config(format!(
                "{strategy} retrieval needs an encoder"
            )));
        }
        let lexical_fields = match strategy {
            RetrievalStrategy::Lexical => {
                let boosted = boost_source(&settings.boosts, &settings.lexical_fields);
                boosted.ensure_all_matched()?;
                boosted.fields
            }
            RetrievalStrategy::Hybrid => {
                check_hybrid_similarity(&backend_config.similarity)?;
                Vec::new()
            }
            RetrievalStrategy::Knn => Vec::new(),
        };

        Ok(Self {
            strategy,
            backend,
            encoder,
            index: &backend_config.index,
            settings,
            lexical_fields,
        })
    }

    #[must_use]
    pub const fn strategy(&self) -> RetrievalStrategy {
        self.strategy
    }

    fn encoder(&self) -> Result<&'a dyn Encoder> {
        self.encoder
            .ok_or_else(|| EvalError::Config(format!("{} retrieval needs an encoder", self.strategy)))
    }

    pub fn build_query(&self, question: &str, company: &str) -> Result<StructuredQuery> {
        let settings = self.settings;
        match self.strategy {
            RetrievalStrategy::Knn => build_knn_query(
                self.encoder()?,
                question,
                company,
                &settings.source,
                &settings.vector_field,
                settings.k,
                settings.num_candidates,
            ),
            RetrievalStrategy::Lexical => build_lexical_query(
                question,
                company,
                &self.lexical_fields,
                settings.k,
                &settings.source,
            ),
            RetrievalStrategy::Hybrid => build_hybrid_query(
                self.encoder()?,
                question,
                company,
                &settings.source,
                &settings.hybrid_fields,
                settings.k,
            ),
        }
    }

    pub fn search(&self, question: &str, company: &str) -> Result<Vec<Hit>> {
        let query = self.build_query(question, company)?;
        search_hits(self.backend, &query, self.index)
    }

    pub fn search_entry(&self, entry: &GroundTruthEntry) -> Result<Vec<Hit>> {
        self.search(&entry.question, &entry.company)
    }
}

/// Search function for `strategy`, scoped by each entry's company.
pub fn strategy_search_fn<'a>(
    strategy: RetrievalStrategy,
    backend: &'a dyn SearchBackend,
    encoder: Option<&'a dyn Encoder>,
    backend_config: &'a BackendConfig,
    settings: &'a SearchConfig,
) -> Result<impl Fn(&GroundTruthEntry) -> Result<Vec<Hit>> + Sync + 'a> {
    let searcher = StrategySearcher::new(strategy, backend, encoder, backend_config, settings)?;
    Ok(move |entry: &GroundTruthEntry| searcher.search_entry(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;
    use crate::encoder::HashEncoder;
    use crate::search::memory::InMemoryBackend;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("KNN".parse::<RetrievalStrategy>().unwrap(), RetrievalStrategy::Knn);
        assert_eq!("text".parse::<RetrievalStrategy>().unwrap(), RetrievalStrategy::Lexical);
        assert_eq!("combined".parse::<RetrievalStrategy>().unwrap(), RetrievalStrategy::Hybrid);
        assert!("rerank".parse::<RetrievalStrategy>().is_err());
    }

    #[test]
    fn parse_strategies_dedupes_in_order() {
        let parsed = parse_strategies(&["hybrid", "knn", "hybrid"]).unwrap();
        assert_eq!(parsed, vec![RetrievalStrategy::Hybrid, RetrievalStrategy::Knn]);
    }

    #[test]
    fn display_roundtrips() {
        for strategy in RetrievalStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<RetrievalStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn hybrid_refuses_non_cosine_index() {
        let backend = InMemoryBackend::new();
        let encoder = HashEncoder::new(8);
        let backend_config = BackendConfig {
            similarity: "dot_product".to_string(),
            ..BackendConfig::default()
        };
        let settings = SearchConfig::default();
        let result = StrategySearcher::new(
            RetrievalStrategy::Hybrid,
            &backend,
            Some(&encoder),
            &backend_config,
            &settings,
        );
        assert!(matches!(result, Err(EvalError::Validation(_))));
    }

    #[test]
    fn lexical_applies_configured_boosts() {
        let backend = InMemoryBackend::new();
        let encoder = HashEncoder::new(8);
        let backend_config = BackendConfig::default();
        let mut settings = SearchConfig::default();
        settings.boosts.insert("text".to_string(), "2".to_string());

        let searcher = StrategySearcher::new(
            RetrievalStrategy::Lexical,
            &backend,
            Some(&encoder),
            &backend_config,
            &settings,
        )
        .unwrap();
        let body = searcher.build_query("revenue", "ACME").unwrap().to_body();
        let fields = &body["query"]["bool"]["must"]["multi_match"]["fields"];
        assert_eq!(
            fields,
            &serde_json::json!(["reporting_period", "filing_type", "section", "text^2"])
        );
    }

    #[test]
    fn lexical_runs_without_an_encoder() {
        let backend = InMemoryBackend::with_documents(
            "sec-filing-index",
            vec![Document::new("ACME", "FY2023", "10-K", "MD&A", "Revenue grew on demand")],
        );
        let backend_config = BackendConfig::default();
        let settings = SearchConfig::default();

        let searcher = StrategySearcher::new(
            RetrievalStrategy::Lexical,
            &backend,
            None,
            &backend_config,
            &settings,
        )
        .unwrap();
        let hits = searcher.search("revenue", "ACME").unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn vector_strategies_require_an_encoder() {
        let backend = InMemoryBackend::new();
        let backend_config = BackendConfig::default();
        let settings = SearchConfig::default();
        for strategy in [RetrievalStrategy::Knn, RetrievalStrategy::Hybrid] {
            let result = StrategySearcher::new(strategy, &backend, None, &backend_config, &settings);
            assert!(matches!(result, Err(EvalError::Config(_))), "{strategy}");
        }
        assert!(!any_needs_encoder(&[RetrievalStrategy::Lexical]));
        assert!(any_needs_encoder(&[RetrievalStrategy::Lexical, RetrievalStrategy::Hybrid]));
    }

    #[test]
    fn lexical_rejects_boosts_for_unsearched_fields() {
        let backend = InMemoryBackend::new();
        let encoder = HashEncoder::new(8);
        let backend_config = BackendConfig::default();
        let mut settings = SearchConfig::default();
        settings.boosts.insert("title".to_string(), "2".to_string());

        assert!(
            StrategySearcher::new(
                RetrievalStrategy::Lexical,
                &backend,
                Some(&encoder),
                &backend_config,
                &settings,
            )
            .is_err()
        );
    }
}
