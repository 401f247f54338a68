use rag_eval::config::{BackendConfig, SearchConfig};
use rag_eval::encoder::HashEncoder;
use rag_eval::error::EvalError;
use rag_eval::eval::{
    GroundTruthEntry, RetrievalStrategy, evaluate, evaluate_parallel, load_ground_truth,
    reciprocal_rank, strategy_search_fn,
};
use rag_eval::search::InMemoryBackend;
use rag_eval::test_utils::{
    EvalFixture, TestCase, encoded_sample, run_table_tests, self_ground_truth,
};

const DIMS: usize = 256;

#[test]
fn self_queries_score_perfectly_for_every_strategy() {
    let config = BackendConfig::default();
    let docs = encoded_sample(DIMS);
    let ground_truth = self_ground_truth(&docs);
    let backend = InMemoryBackend::with_documents(&config.index, docs);
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();

    for strategy in RetrievalStrategy::ALL {
        let search_fn = strategy_search_fn(strategy, &backend, Some(&encoder), &config, &settings).unwrap();
        let report = evaluate(&ground_truth, search_fn).unwrap();
        assert_eq!(report.queries, ground_truth.len());
        assert!((report.hit_rate - 1.0).abs() < 1e-12, "{strategy}: {report:?}");
        assert!((report.mrr - 1.0).abs() < 1e-12, "{strategy}: {report:?}");
    }
}

#[test]
fn parallel_run_matches_sequential_run() {
    let config = BackendConfig::default();
    let docs = encoded_sample(DIMS);
    let mut ground_truth = self_ground_truth(&docs);
    ground_truth.push(GroundTruthEntry::new("ffffffff", "anvil shipments", "ACME"));
    ground_truth.push(GroundTruthEntry::new(docs[4].id.clone(), "platform launch income", "Globex"));
    let backend = InMemoryBackend::with_documents(&config.index, docs);
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();

    for strategy in RetrievalStrategy::ALL {
        let search_fn = strategy_search_fn(strategy, &backend, Some(&encoder), &config, &settings).unwrap();
        let sequential = evaluate(&ground_truth, &search_fn).unwrap();
        let parallel = evaluate_parallel(&ground_truth, &search_fn).unwrap();
        assert_eq!(sequential, parallel, "{strategy}");
        assert!(sequential.mrr <= sequential.hit_rate);
        // The unknown id can never be found.
        assert!(sequential.hit_rate < 1.0);
    }
}

#[test]
fn ground_truth_file_drives_evaluation() {
    let fixture = EvalFixture::new();
    let config = BackendConfig::default();
    let docs = encoded_sample(DIMS);
    let path = fixture.write_ground_truth("gt.jsonl", &self_ground_truth(&docs));
    let ground_truth = load_ground_truth(&path).unwrap();
    assert_eq!(ground_truth.len(), docs.len());

    let backend = InMemoryBackend::with_documents(&config.index, docs);
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();
    let search_fn =
        strategy_search_fn(RetrievalStrategy::Lexical, &backend, Some(&encoder), &config, &settings)
            .unwrap();
    let report = evaluate(&ground_truth, search_fn).unwrap();
    assert_eq!(report.hits, ground_truth.len());
}

#[test]
fn empty_ground_truth_is_rejected() {
    let config = BackendConfig::default();
    let backend = InMemoryBackend::with_documents(&config.index, encoded_sample(DIMS));
    let encoder = HashEncoder::new(DIMS);
    let settings = SearchConfig::default();
    let search_fn =
        strategy_search_fn(RetrievalStrategy::Knn, &backend, Some(&encoder), &config, &settings).unwrap();

    assert!(matches!(
        evaluate(&[], search_fn),
        Err(EvalError::MetricUndefined(_))
    ));
}

#[test]
fn reciprocal_rank_table() {
    run_table_tests(
        vec![
            TestCase {
                name: "first",
                input: vec![true, false, false],
                expected: 1.0,
            },
            TestCase {
                name: "third",
                input: vec![false, false, true],
                expected: 1.0 / 3.0,
            },
            TestCase {
                name: "only first relevant counts",
                input: vec![false, true, true],
                expected: 0.5,
            },
            TestCase {
                name: "absent",
                input: vec![false, false],
                expected: 0.0,
            },
            TestCase {
                name: "empty",
                input: vec![],
                expected: 0.0,
            },
        ],
        |relevance: Vec<bool>| reciprocal_rank(&relevance),
    );
}
