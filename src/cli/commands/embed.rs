//! rag-eval embed - Assign ids and encode a passage corpus

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, machine_ok};
use crate::cli::progress::track;
use crate::corpus::{
    Document, encode_documents_with, find_id_collisions, generate_document_id, load_documents,
    save_documents,
};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Passage corpus (JSON array or JSON Lines)
    pub input: PathBuf,

    /// Where to write the encoded corpus
    pub output: PathBuf,

    /// Replace existing ids with content digests
    #[arg(long)]
    pub regenerate_ids: bool,
}

#[derive(Debug, Serialize)]
struct EmbedReport {
    input: String,
    output: String,
    documents: usize,
    dims: usize,
    encoder: String,
    /// Identifiers shared by distinct passages.
    collisions: Vec<Collision>,
}

#[derive(Debug, Serialize)]
struct Collision {
    id: String,
    positions: Vec<usize>,
}

pub fn run(ctx: &AppContext, args: &EmbedArgs) -> Result<()> {
    let mut docs = load_documents(&args.input)?;
    if args.regenerate_ids {
        for doc in &mut docs {
            doc.id = generate_document_id(&doc.text);
        }
    }

    let collisions = collision_report(&docs);
    for collision in &collisions {
        ctx.progress.warn(&format!(
            "id {} is shared by distinct passages at positions {:?}",
            collision.id, collision.positions
        ));
    }

    let encoder = ctx.encoder()?;
    track(&ctx.progress, docs.len(), "Encoding passages", |handle| {
        encode_documents_with(&mut docs, encoder.as_ref(), |done| {
            handle.set_position(done as u64);
        })
    })?;
    save_documents(&args.output, &docs)?;

    let report = EmbedReport {
        input: args.input.display().to_string(),
        output: args.output.display().to_string(),
        documents: docs.len(),
        dims: encoder.dims(),
        encoder: encoder.name().to_string(),
        collisions,
    };

    if ctx.format.is_machine_readable() {
        return emit_json(&machine_ok(report));
    }
    if !ctx.quiet {
        let mut layout = HumanLayout::new();
        layout
            .title("Corpus encoded")
            .kv("Documents", &report.documents.to_string())
            .kv("Encoder", &report.encoder)
            .kv("Dimensions", &report.dims.to_string())
            .kv("Output", &report.output);
        if !report.collisions.is_empty() {
            layout.blank().push_line(
                format!("{} id collisions; see warnings above", report.collisions.len())
                    .yellow()
                    .to_string(),
            );
        }
        emit_human(layout);
    }
    Ok(())
}

fn collision_report(docs: &[Document]) -> Vec<Collision> {
    find_id_collisions(docs)
        .into_iter()
        .map(|(id, positions)| Collision { id, positions })
        .collect()
}
