//! Property tests for metrics, identifiers and query construction.

use proptest::prelude::*;

use rag_eval::corpus::{ID_HEX_LEN, generate_document_id};
use rag_eval::encoder::{Encoder, HashEncoder};
use rag_eval::eval::{GroundTruthEntry, evaluate, evaluate_parallel, hit_rate, mrr, reciprocal_rank};
use rag_eval::search::{LexicalField, boost_source, build_lexical_query};

fn arb_relevance() -> impl Strategy<Value = Vec<Vec<bool>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 0..8), 1..40)
}

proptest! {
    #[test]
    fn metrics_are_bounded_and_ordered(relevance in arb_relevance()) {
        let hit_rate = hit_rate(&relevance).unwrap();
        let mrr = mrr(&relevance).unwrap();
        prop_assert!((0.0..=1.0).contains(&hit_rate));
        prop_assert!((0.0..=1.0).contains(&mrr));
        prop_assert!(mrr <= hit_rate + 1e-12);
    }

    #[test]
    fn reciprocal_rank_ignores_later_relevant_results(
        prefix in 0usize..6,
        tail in prop::collection::vec(any::<bool>(), 0..6),
    ) {
        let mut relevance = vec![false; prefix];
        relevance.push(true);
        relevance.extend(tail);
        prop_assert_eq!(reciprocal_rank(&relevance), 1.0 / (prefix + 1) as f64);
    }

    #[test]
    fn document_ids_are_deterministic_hex(text in ".{0,200}") {
        let id = generate_document_id(&text);
        prop_assert_eq!(id.len(), ID_HEX_LEN);
        prop_assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(id, generate_document_id(&text));
    }

    #[test]
    fn hash_vectors_have_declared_width(text in "[a-z]{1,10}( [a-z]{1,10}){0,20}", dims in 8usize..128) {
        let encoder = HashEncoder::new(dims);
        let vector = encoder.encode(&text).unwrap();
        prop_assert_eq!(vector.len(), dims);
        prop_assert!(vector.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn parallel_evaluation_matches_sequential(ranks in prop::collection::vec(0usize..6, 1..30)) {
        // Entry i expects "d{i}" at position ranks[i]; 5 means absent.
        let ground_truth: Vec<GroundTruthEntry> = ranks
            .iter()
            .enumerate()
            .map(|(i, _)| GroundTruthEntry::new(format!("d{i}"), format!("q{i}"), "ACME"))
            .collect();
        let search = |entry: &GroundTruthEntry| -> rag_eval::Result<Vec<String>> {
            let index: usize = entry.question[1..].parse().unwrap_or(0);
            let mut results: Vec<String> = (0..5).map(|n| format!("other{n}")).collect();
            if ranks[index] < 5 {
                results[ranks[index]] = entry.document.clone();
            }
            Ok(results)
        };
        let sequential = evaluate(&ground_truth, search).unwrap();
        let parallel = evaluate_parallel(&ground_truth, search).unwrap();
        prop_assert_eq!(sequential, parallel);
    }

    #[test]
    fn boosted_fields_keep_order(boost in 1u32..10) {
        let fields: Vec<String> = ["reporting_period", "section", "text"].iter().map(ToString::to_string).collect();
        let boosts = [("section".to_string(), boost.to_string())].into_iter().collect();
        let boosted = boost_source(&boosts, &fields);
        prop_assert_eq!(
            boosted.names(),
            vec!["reporting_period".to_string(), format!("section^{boost}"), "text".to_string()]
        );

        let query = build_lexical_query("revenue", "ACME", &boosted.fields, 5, &[]).unwrap();
        let body = query.to_body();
        let expected_field = format!("section^{boost}");
        prop_assert_eq!(
            body["query"]["bool"]["must"]["multi_match"]["fields"][1].as_str(),
            Some(expected_field.as_str())
        );
        prop_assert_eq!(LexicalField::parse(&format!("section^{boost}")).weight(), f64::from(boost));
    }
}
