use httpmock::prelude::*;
use httpmock::Method::HEAD;
use serde_json::json;

use rag_eval::config::{BackendConfig, SearchConfig};
use rag_eval::encoder::HashEncoder;
use rag_eval::error::{ErrorCode, EvalError};
use rag_eval::eval::{GroundTruthEntry, RetrievalStrategy, StrategySearcher, evaluate, strategy_search_fn};
use rag_eval::index::rebuild_index;
use rag_eval::search::{ElasticsearchClient, SearchOutput, SearchResponse, search};
use rag_eval::test_utils::encoded_sample;

fn backend_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        url: server.base_url(),
        index: "filings".to_string(),
        timeout_secs: 5,
        ..BackendConfig::default()
    }
}

fn envelope(ids: &[&str]) -> serde_json::Value {
    let hits: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(rank, id)| {
            json!({
                "_index": "filings",
                "_id": format!("es-{rank}"),
                "_score": 1.0 - rank as f64 * 0.1,
                "_source": { "id": id, "company": "ACME", "section": "MD&A", "text": "..." }
            })
        })
        .collect();
    json!({
        "took": 3,
        "timed_out": false,
        "hits": { "total": { "value": hits.len(), "relation": "eq" }, "hits": hits }
    })
}

#[test]
fn knn_search_returns_projected_hits_in_rank_order() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/filings/_search");
        then.status(200).json_body(envelope(&["aaaa1111", "bbbb2222"]));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let encoder = HashEncoder::new(32);
    let settings = SearchConfig::default();
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Knn, &client, Some(&encoder), &config, &settings).unwrap();

    let hits = searcher.search("What drove revenue?", "ACME").unwrap();
    mock.assert();
    let ids: Vec<_> = hits.iter().map(|hit| hit["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["aaaa1111", "bbbb2222"]);
    // Projection keeps only configured source fields present in the hit.
    assert!(hits[0].contains_key("section"));
    assert!(!hits[0].contains_key("_score"));
}

#[test]
fn raw_output_returns_backend_envelope() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/filings/_search");
        then.status(200).json_body(envelope(&["aaaa1111"]));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let encoder = HashEncoder::new(32);
    let settings = SearchConfig::default();
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Lexical, &client, Some(&encoder), &config, &settings)
            .unwrap();
    let query = searcher.build_query("revenue", "ACME").unwrap();

    let response = search(&client, &query, "filings", SearchOutput::Raw).unwrap();
    let SearchResponse::Raw(raw) = response else {
        panic!("expected raw response");
    };
    assert_eq!(raw["took"], 3);
    assert_eq!(raw["hits"]["hits"][0]["_id"], "es-0");
}

#[test]
fn evaluation_over_http_backend() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/filings/_search");
        then.status(200).json_body(envelope(&["d1", "d2", "d3"]));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let encoder = HashEncoder::new(32);
    let settings = SearchConfig::default();
    let ground_truth = vec![
        GroundTruthEntry::new("d1", "first question", "ACME"),
        GroundTruthEntry::new("d2", "second question", "ACME"),
        GroundTruthEntry::new("zz", "unanswerable", "ACME"),
    ];

    let search_fn =
        strategy_search_fn(RetrievalStrategy::Hybrid, &client, Some(&encoder), &config, &settings).unwrap();
    let report = evaluate(&ground_truth, search_fn).unwrap();
    assert!((report.hit_rate - 2.0 / 3.0).abs() < 1e-12);
    assert!((report.mrr - 0.5).abs() < 1e-12);
}

#[test]
fn backend_failure_aborts_evaluation_with_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/filings/_search");
        then.status(503).json_body(json!({
            "error": { "type": "cluster_block_exception", "reason": "blocked by: [SERVICE_UNAVAILABLE]" },
            "status": 503
        }));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let encoder = HashEncoder::new(32);
    let settings = SearchConfig::default();
    let ground_truth = vec![GroundTruthEntry::new("d1", "q", "ACME")];

    let search_fn =
        strategy_search_fn(RetrievalStrategy::Knn, &client, Some(&encoder), &config, &settings).unwrap();
    let err = evaluate(&ground_truth, search_fn).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), ErrorCode::BackendFailed);
    assert!(err.to_string().contains("cluster_block_exception"));
}

#[test]
fn malformed_envelope_is_backend_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/filings/_search");
        then.status(200).json_body(json!({ "took": 1 }));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let encoder = HashEncoder::new(32);
    let settings = SearchConfig::default();
    let searcher =
        StrategySearcher::new(RetrievalStrategy::Knn, &client, Some(&encoder), &config, &settings).unwrap();

    let err = searcher.search("revenue", "ACME").unwrap_err();
    assert!(matches!(err, EvalError::MalformedResponse(_)));
    assert!(err.to_string().contains("hits.hits"));
    assert!(!err.is_retryable());
}

#[test]
fn rebuild_index_drives_lifecycle_routes() {
    let server = MockServer::start();
    let exists = server.mock(|when, then| {
        when.method(HEAD).path("/filings");
        then.status(200);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/filings");
        then.status(200).json_body(json!({ "acknowledged": true }));
    });
    let create = server.mock(|when, then| {
        when.method(PUT).path("/filings");
        then.status(200).json_body(json!({ "acknowledged": true }));
    });
    let doc = server.mock(|when, then| {
        when.method(POST).path("/filings/_doc");
        then.status(201).json_body(json!({ "result": "created" }));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/filings/_refresh");
        then.status(200).json_body(json!({}));
    });

    let config = backend_config(&server);
    let client = ElasticsearchClient::new(&config).unwrap();
    let docs: Vec<_> = encoded_sample(16).into_iter().take(1).collect();

    let report = rebuild_index(&client, "filings", &docs, "cosine", |_| {}).unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed, 0);
    exists.assert();
    delete.assert();
    create.assert();
    doc.assert();
    refresh.assert();
}
