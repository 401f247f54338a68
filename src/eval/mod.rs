//! Retrieval evaluation
//!
//! [`evaluate`] runs a caller-supplied search function for every
//! ground-truth entry, turns each ranked list into a relevance vector and
//! reduces them to Hit Rate and MRR. The evaluator only sees the search
//! function, so KNN, lexical and hybrid retrieval are compared by swapping it
//! (see [`strategy_search_fn`]).

pub mod ground_truth;
pub mod metrics;
pub mod strategy;

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

pub use ground_truth::{GroundTruthEntry, load_ground_truth};
pub use metrics::{RankedResult, hit_rate, mrr, reciprocal_rank, relevance_vector};
pub use strategy::{
    RetrievalStrategy, StrategySearcher, any_needs_encoder, parse_strategies, strategy_search_fn,
};

/// Aggregate metrics for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub hit_rate: f64,
    pub mrr: f64,
    /// Number of ground-truth entries evaluated.
    pub queries: usize,
    /// Entries whose expected document appeared in the results.
    pub hits: usize,
}

impl EvaluationReport {
    /// Reduce relevance vectors, in ground-truth order, to metrics.
    pub fn from_relevance(relevance: &[Vec<bool>]) -> Result<Self> {
        Ok(Self {
            hit_rate: hit_rate(relevance)?,
            mrr: mrr(relevance)?,
            queries: relevance.len(),
            hits: relevance.iter().filter(|line| line.contains(&true)).count(),
        })
    }
}

fn require_ground_truth(ground_truth: &[GroundTruthEntry]) -> Result<()> {
    if ground_truth.is_empty() {
        return Err(EvalError::MetricUndefined(
            "ground truth is empty; hit rate and MRR are undefined".to_string(),
        ));
    }
    Ok(())
}

/// Evaluate `search_fn` over `ground_truth`, one query at a time.
pub fn evaluate<F, R>(ground_truth: &[GroundTruthEntry], search_fn: F) -> Result<EvaluationReport>
where
    F: FnMut(&GroundTruthEntry) -> Result<Vec<R>>,
    R: RankedResult,
{
    evaluate_with(ground_truth, search_fn, |_| {})
}

/// [`evaluate`] calling `on_progress` with the number of entries evaluated.
pub fn evaluate_with<F, R>(
    ground_truth: &[GroundTruthEntry],
    mut search_fn: F,
    mut on_progress: impl FnMut(usize),
) -> Result<EvaluationReport>
where
    F: FnMut(&GroundTruthEntry) -> Result<Vec<R>>,
    R: RankedResult,
{
    require_ground_truth(ground_truth)?;

    let mut relevance_total = Vec::with_capacity(ground_truth.len());
    for (done, entry) in ground_truth.iter().enumerate() {
        let results = search_fn(entry)?;
        let relevance = relevance_vector(&results, &entry.document);
        tracing::debug!(
            document = %entry.document,
            results = results.len(),
            rank = ?relevance.iter().position(|hit| *hit).map(|index| index + 1),
            "evaluated query"
        );
        relevance_total.push(relevance);
        on_progress(done + 1);
    }

    let report = EvaluationReport::from_relevance(&relevance_total)?;
    tracing::info!(queries = report.queries, hit_rate = report.hit_rate, mrr = report.mrr, "evaluation complete");
    Ok(report)
}

/// Evaluate entries concurrently on the rayon pool.
///
/// Relevance vectors are collected in ground-truth order before reduction,
/// so the report equals the one [`evaluate`] produces.
pub fn evaluate_parallel<F, R>(
    ground_truth: &[GroundTruthEntry],
    search_fn: F,
) -> Result<EvaluationReport>
where
    F: Fn(&GroundTruthEntry) -> Result<Vec<R>> + Sync,
    R: RankedResult,
{
    evaluate_parallel_with(ground_truth, search_fn, |_| {})
}

pub fn evaluate_parallel_with<F, R>(
    ground_truth: &[GroundTruthEntry],
    search_fn: F,
    on_progress: impl Fn(usize) + Sync,
) -> Result<EvaluationReport>
where
    F: Fn(&GroundTruthEntry) -> Result<Vec<R>> + Sync,
    R: RankedResult,
{
    require_ground_truth(ground_truth)?;

    let done = AtomicUsize::new(0);
    let relevance_total: Vec<Vec<bool>> = ground_truth
        .par_iter()
        .map(|entry| {
            let results = search_fn(entry)?;
            on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
            Ok(relevance_vector(&results, &entry.document))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = EvaluationReport::from_relevance(&relevance_total)?;
    tracing::info!(
        queries = report.queries,
        hit_rate = report.hit_rate,
        mrr = report.mrr,
        threads = rayon::current_num_threads(),
        "parallel evaluation complete"
    );
    Ok(report)
}
