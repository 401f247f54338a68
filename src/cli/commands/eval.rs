//! rag-eval eval - Score retrieval strategies against labeled queries

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::OutputFormat;
use crate::cli::output::{HumanLayout, emit_human, emit_json, emit_jsonl, emit_tsv, machine_ok};
use crate::cli::progress::track;
use crate::error::Result;
use crate::eval::{
    EvaluationReport, RetrievalStrategy, evaluate_parallel_with, evaluate_with, load_ground_truth,
    parse_strategies, strategy_search_fn,
};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Ground-truth file (JSON array or JSON Lines of document/question/company)
    pub ground_truth: PathBuf,

    /// Strategies to evaluate (repeatable; default: eval.strategies)
    #[arg(long, short)]
    pub strategy: Vec<String>,

    /// Evaluate queries concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Results per query (overrides search.k)
    #[arg(long, short)]
    pub k: Option<usize>,

    /// Search an encoded corpus file in memory instead of the backend
    #[arg(long, value_name = "PATH")]
    pub corpus: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StrategyResult {
    strategy: RetrievalStrategy,
    #[serde(flatten)]
    report: EvaluationReport,
}

pub fn run(ctx: &AppContext, args: &EvalArgs) -> Result<()> {
    let ground_truth = load_ground_truth(&args.ground_truth)?;
    let strategies = if args.strategy.is_empty() {
        parse_strategies(&ctx.config.eval.strategies)?
    } else {
        parse_strategies(&args.strategy)?
    };
    let parallel = args.parallel || ctx.config.eval.parallel;

    let mut settings = ctx.config.search.clone();
    if let Some(k) = args.k {
        settings.k = k;
    }

    let backend = ctx.search_backend(args.corpus.as_deref())?;
    let encoder = ctx.encoder_for(&strategies)?;

    let mut results = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let search_fn = strategy_search_fn(
            strategy,
            backend.as_ref(),
            encoder.as_deref(),
            &ctx.config.backend,
            &settings,
        )?;
        let message = format!("Evaluating {strategy}");
        let report = track(&ctx.progress, ground_truth.len(), &message, |handle| {
            if parallel {
                evaluate_parallel_with(&ground_truth, &search_fn, |done| {
                    handle.set_position(done as u64);
                })
            } else {
                evaluate_with(&ground_truth, &search_fn, |done| {
                    handle.set_position(done as u64);
                })
            }
        })?;
        results.push(StrategyResult { strategy, report });
    }

    emit_results(ctx, &results)
}

fn emit_results(ctx: &AppContext, results: &[StrategyResult]) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => emit_json(&machine_ok(results)),
        OutputFormat::Jsonl => emit_jsonl(results),
        OutputFormat::Tsv => {
            emit_tsv(
                &["strategy", "hit_rate", "mrr", "hits", "queries"],
                results,
                |result| {
                    vec![
                        result.strategy.to_string(),
                        format!("{:.4}", result.report.hit_rate),
                        format!("{:.4}", result.report.mrr),
                        result.report.hits.to_string(),
                        result.report.queries.to_string(),
                    ]
                },
            );
            Ok(())
        }
        OutputFormat::Human => {
            if ctx.quiet {
                return Ok(());
            }
            emit_human(results_table(results));
            Ok(())
        }
    }
}

fn results_table(results: &[StrategyResult]) -> HumanLayout {
    let best_mrr = results
        .iter()
        .map(|result| result.report.mrr)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut layout = HumanLayout::new();
    layout.title("Retrieval evaluation");
    layout.push_line(format!(
        "{:<10} {:>9} {:>9} {:>12}",
        "strategy", "hit rate", "mrr", "hits"
    ));
    for result in results {
        let report = &result.report;
        let row = format!(
            "{:<10} {:>9.4} {:>9.4} {:>12}",
            result.strategy.as_str(),
            report.hit_rate,
            report.mrr,
            format!("{}/{}", report.hits, report.queries)
        );
        if results.len() > 1 && (report.mrr - best_mrr).abs() < f64::EPSILON {
            layout.push_line(row.green().to_string());
        } else {
            layout.push_line(row);
        }
    }
    layout
}
