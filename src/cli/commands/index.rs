//! rag-eval index - Recreate the search index and ingest an encoded corpus

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, machine_ok};
use crate::cli::progress::track;
use crate::corpus::load_documents;
use crate::error::Result;
use crate::index::{IndexReport, rebuild_index};
use crate::search::build_backend;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Encoded corpus written by `rag-eval embed`
    pub corpus: PathBuf,

    /// Target index (overrides backend.index)
    #[arg(long)]
    pub index: Option<String>,
}

#[derive(Debug, Serialize)]
struct IndexSummary<'a> {
    index: &'a str,
    indexed: usize,
    failed: usize,
    errors: Vec<IndexFailure<'a>>,
}

#[derive(Debug, Serialize)]
struct IndexFailure<'a> {
    id: &'a str,
    error: &'a str,
}

pub fn run(ctx: &AppContext, args: &IndexArgs) -> Result<()> {
    let docs = load_documents(&args.corpus)?;
    let backend = build_backend(&ctx.config.backend)?;
    let index = args.index.as_deref().unwrap_or(&ctx.config.backend.index);

    let report = track(&ctx.progress, docs.len(), "Indexing passages", |handle| {
        rebuild_index(
            backend.as_ref(),
            index,
            &docs,
            &ctx.config.backend.similarity,
            |done| handle.set_position(done as u64),
        )
    })?;

    if ctx.format.is_machine_readable() {
        return emit_json(&machine_ok(summary(index, &report)));
    }
    if !ctx.quiet {
        let mut layout = HumanLayout::new();
        layout
            .title("Index rebuilt")
            .kv("Index", index)
            .kv("Indexed", &report.indexed.to_string())
            .kv("Failed", &report.failed.to_string());
        if !report.errors.is_empty() {
            layout.blank().section("Rejected documents");
            for (id, error) in &report.errors {
                layout.bullet(&format!("{} {error}", id.red()));
            }
        }
        emit_human(layout);
    }
    Ok(())
}

fn summary<'a>(index: &'a str, report: &'a IndexReport) -> IndexSummary<'a> {
    IndexSummary {
        index,
        indexed: report.indexed,
        failed: report.failed,
        errors: report
            .errors
            .iter()
            .map(|(id, error)| IndexFailure { id, error })
            .collect(),
    }
}
