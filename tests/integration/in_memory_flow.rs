use rag_eval::config::{BackendConfig, SearchConfig};
use rag_eval::encoder::HashEncoder;
use rag_eval::eval::{RetrievalStrategy, StrategySearcher};
use rag_eval::index::rebuild_index;
use rag_eval::search::{InMemoryBackend, hit_id};
use rag_eval::test_utils::{encoded_sample, init_test_tracing};

const DIMS: usize = 256;

fn indexed_backend() -> (InMemoryBackend, BackendConfig) {
    let config = BackendConfig::default();
    let backend = InMemoryBackend::new();
    let docs = encoded_sample(DIMS);
    let report = rebuild_index(&backend, &config.index, &docs, &config.similarity, |_| {}).unwrap();
    assert_eq!(report.indexed, docs.len());
    assert_eq!(backend.document_count(&config.index).unwrap(), docs.len());
    (backend, config)
}

#[test]
fn every_strategy_ranks_the_source_passage_first() {
    init_test_tracing();
    let (backend, config) = indexed_backend();
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();

    for strategy in RetrievalStrategy::ALL {
        let searcher = StrategySearcher::new(strategy, &backend, Some(&encoder), &config, &settings).unwrap();
        for doc in encoded_sample(DIMS) {
            let hits = searcher.search(&doc.text, &doc.company).unwrap();
            assert_eq!(
                hits.first().and_then(hit_id),
                Some(doc.id.as_str()),
                "{strategy} did not rank {} first",
                doc.id
            );
        }
    }
}

#[test]
fn results_stay_within_company() {
    let (backend, config) = indexed_backend();
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Knn, &backend, Some(&encoder), &config, &settings).unwrap();

    let hits = searcher.search("revenue growth and liquidity", "Globex").unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit["company"] == "Globex"));
}

#[test]
fn k_bounds_result_count() {
    let (backend, config) = indexed_backend();
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig {
        k: 2,
        ..SearchConfig::default()
    };
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Knn, &backend, Some(&encoder), &config, &settings).unwrap();

    let hits = searcher.search("cash reserves", "ACME").unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn unknown_company_returns_no_hits() {
    let (backend, config) = indexed_backend();
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();

    for strategy in RetrievalStrategy::ALL {
        let searcher = StrategySearcher::new(strategy, &backend, Some(&encoder), &config, &settings).unwrap();
        let hits = searcher.search("revenue", "Initech").unwrap();
        assert!(hits.is_empty(), "{strategy} leaked results across companies");
    }
}

#[test]
fn rebuild_replaces_previous_contents() {
    let (backend, config) = indexed_backend();
    let docs: Vec<_> = encoded_sample(DIMS).into_iter().take(2).collect();
    rebuild_index(&backend, &config.index, &docs, &config.similarity, |_| {}).unwrap();
    assert_eq!(backend.document_count(&config.index).unwrap(), 2);
}

#[test]
fn single_document_round_trip() {
    let config = BackendConfig::default();
    let docs: Vec<_> = encoded_sample(DIMS).into_iter().take(1).collect();
    let only = docs[0].clone();
    let backend = InMemoryBackend::new();
    rebuild_index(&backend, &config.index, &docs, &config.similarity, |_| {}).unwrap();

    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Knn, &backend, Some(&encoder), &config, &settings).unwrap();
    let hits = searcher.search(&only.text, &only.company).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hit_id(&hits[0]), Some(only.id.as_str()));
}
