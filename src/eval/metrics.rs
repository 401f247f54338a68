//! Rank-quality metrics over relevance vectors.
//!
//! A relevance vector is aligned with one ranked result list: position `i`
//! is true when the result at rank `i + 1` is the expected document.

use serde_json::Value;

use crate::corpus::Document;
use crate::error::{EvalError, Result};
use crate::search::executor::{Hit, hit_id};

/// A ranked result that can be matched against an expected document id.
pub trait RankedResult {
    fn result_id(&self) -> Option<&str>;
}

impl RankedResult for Hit {
    fn result_id(&self) -> Option<&str> {
        hit_id(self)
    }
}

impl RankedResult for Value {
    fn result_id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }
}

impl RankedResult for Document {
    fn result_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl RankedResult for String {
    fn result_id(&self) -> Option<&str> {
        Some(self)
    }
}

/// Results without an id never match.
pub fn relevance_vector<R: RankedResult>(results: &[R], expected_id: &str) -> Vec<bool> {
    results
        .iter()
        .map(|result| result.result_id() == Some(expected_id))
        .collect()
}

/// `1 / rank` of the first relevant result, 0.0 when there is none.
#[must_use]
pub fn reciprocal_rank(relevance: &[bool]) -> f64 {
    relevance
        .iter()
        .position(|relevant| *relevant)
        .map_or(0.0, |index| 1.0 / (index + 1) as f64)
}

fn require_entries(relevance: &[Vec<bool>], metric: &str) -> Result<()> {
    if relevance.is_empty() {
        return Err(EvalError::MetricUndefined(format!(
            "{metric} is undefined for an empty ground truth"
        )));
    }
    Ok(())
}

/// Fraction of queries with at least one relevant result.
pub fn hit_rate(relevance: &[Vec<bool>]) -> Result<f64> {
    require_entries(relevance, "hit rate")?;
    let hits = relevance.iter().filter(|line| line.contains(&true)).count();
    Ok(hits as f64 / relevance.len() as f64)
}

/// Mean reciprocal rank of the first relevant result per query.
pub fn mrr(relevance: &[Vec<bool>]) -> Result<f64> {
    require_entries(relevance, "MRR")?;
    let total: f64 = relevance.iter().map(|line| reciprocal_rank(line)).sum();
    Ok(total / relevance.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_scenario() -> Vec<Vec<bool>> {
        vec![vec![true, false], vec![false, true], vec![false, false]]
    }

    #[test]
    fn known_scenario_hit_rate() {
        let value = hit_rate(&known_scenario()).unwrap();
        assert!((value - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn known_scenario_mrr() {
        let value = mrr(&known_scenario()).unwrap();
        assert!((value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn reciprocal_rank_by_position() {
        assert!((reciprocal_rank(&[true]) - 1.0).abs() < f64::EPSILON);
        assert!((reciprocal_rank(&[false, false, false, false, true]) - 0.2).abs() < 1e-12);
        assert!(reciprocal_rank(&[false, false]).abs() < f64::EPSILON);
        assert!(reciprocal_rank(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn only_first_relevant_result_counts() {
        let relevance = vec![vec![false, true, true]];
        assert!((mrr(&relevance).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_ground_truth_is_undefined() {
        assert!(matches!(hit_rate(&[]), Err(EvalError::MetricUndefined(_))));
        assert!(matches!(mrr(&[]), Err(EvalError::MetricUndefined(_))));
    }

    #[test]
    fn empty_result_lists_score_zero() {
        let relevance = vec![Vec::new(), Vec::new()];
        assert!(hit_rate(&relevance).unwrap().abs() < f64::EPSILON);
        assert!(mrr(&relevance).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn relevance_vector_matches_ids() {
        let results = vec!["a1".to_string(), "b2".to_string(), "a1".to_string()];
        assert_eq!(relevance_vector(&results, "a1"), vec![true, false, true]);
        assert_eq!(relevance_vector(&results, "zz"), vec![false, false, false]);
    }

    #[test]
    fn results_without_id_never_match() {
        let results = vec![serde_json::json!({"text": "no id"})];
        assert_eq!(relevance_vector(&results, "a1"), vec![false]);
    }
}
