//! rag-eval search - Run one query with a retrieval strategy

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde_json::Value;

use crate::app::AppContext;
use crate::cli::OutputFormat;
use crate::cli::output::{HumanLayout, emit_human, emit_json, emit_jsonl, emit_tsv, machine_ok};
use crate::error::Result;
use crate::eval::{RetrievalStrategy, StrategySearcher};
use crate::search::{Hit, SearchOutput, SearchResponse, search};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Company whose passages are searched
    #[arg(long)]
    pub company: String,

    /// Retrieval strategy: knn, lexical or hybrid
    #[arg(long, short, default_value = "knn")]
    pub strategy: RetrievalStrategy,

    /// Print the unmodified backend response
    #[arg(long)]
    pub raw: bool,

    /// Search an encoded corpus file in memory instead of the backend
    #[arg(long, value_name = "PATH")]
    pub corpus: Option<PathBuf>,

    /// Print the request body without executing it
    #[arg(long)]
    pub show_query: bool,
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let backend = ctx.search_backend(args.corpus.as_deref())?;
    let encoder = ctx.encoder_for(&[args.strategy])?;
    let searcher = StrategySearcher::new(
        args.strategy,
        backend.as_ref(),
        encoder.as_deref(),
        &ctx.config.backend,
        &ctx.config.search,
    )?;
    let query = searcher.build_query(&args.query, &args.company)?;

    if args.show_query {
        return emit_json(&query.to_body());
    }

    let output = if args.raw {
        SearchOutput::Raw
    } else {
        SearchOutput::Projected
    };
    let response = search(backend.as_ref(), &query, &ctx.config.backend.index, output)?;

    match response {
        SearchResponse::Raw(raw) => emit_json(&raw),
        SearchResponse::Hits(hits) => emit_hits(ctx, args, &hits),
    }
}

fn emit_hits(ctx: &AppContext, args: &SearchArgs, hits: &[Hit]) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => emit_json(&machine_ok(hits)),
        OutputFormat::Jsonl => emit_jsonl(hits),
        OutputFormat::Tsv => {
            let fields = &ctx.config.search.source;
            let headers: Vec<&str> = fields.iter().map(String::as_str).collect();
            emit_tsv(&headers, hits, |hit| {
                fields.iter().map(|field| cell(hit.get(field))).collect()
            });
            Ok(())
        }
        OutputFormat::Human => {
            if ctx.quiet {
                return Ok(());
            }
            let mut layout = HumanLayout::new();
            layout.title(&format!(
                "{} results for {:?} ({}, {})",
                hits.len(),
                args.query,
                args.company,
                args.strategy
            ));
            for (rank, hit) in hits.iter().enumerate() {
                layout.push_line(format!(
                    "{:>2}. {} {}",
                    rank + 1,
                    cell(hit.get("id")).cyan(),
                    cell(hit.get("section")).dimmed()
                ));
                let text = cell(hit.get("text"));
                if !text.is_empty() {
                    layout.push_line(format!("    {}", preview(&text, 120)));
                }
            }
            emit_human(layout);
            Ok(())
        }
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
