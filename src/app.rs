//! Per-invocation context shared by all commands.

use std::path::{Path, PathBuf};

use crate::cli::{Cli, OutputFormat};
use crate::cli::progress::ProgressReporter;
use crate::config::Config;
use crate::corpus::load_documents;
use crate::encoder::{Encoder, build_encoder};
use crate::error::Result;
use crate::eval::{RetrievalStrategy, any_needs_encoder};
use crate::search::{InMemoryBackend, SearchBackend, build_backend};

pub struct AppContext {
    pub config: Config,
    /// Explicit `--config` path, if one was given.
    pub config_path: Option<PathBuf>,
    pub machine: bool,
    pub quiet: bool,
    pub format: OutputFormat,
    pub progress: ProgressReporter,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &cwd)?;
        let mut ctx = Self::new(config, cli.config.clone(), cli.machine, cli.quiet);
        ctx.format = cli.output_format();
        Ok(ctx)
    }

    #[must_use]
    pub fn new(config: Config, config_path: Option<PathBuf>, machine: bool, quiet: bool) -> Self {
        Self {
            config,
            config_path,
            machine,
            quiet,
            format: OutputFormat::from_args(machine, None),
            progress: ProgressReporter::new(machine, quiet),
        }
    }

    pub fn encoder(&self) -> Result<Box<dyn Encoder>> {
        let handle = self.progress.spinner("Loading encoder");
        match build_encoder(&self.config.encoder) {
            Ok(encoder) => {
                handle.finish();
                tracing::debug!(encoder = encoder.name(), dims = encoder.dims(), "encoder ready");
                Ok(encoder)
            }
            Err(err) => {
                handle.abandon_with_message(&err.to_string());
                Err(err)
            }
        }
    }

    /// Encoder for `strategies`, or `None` when none of them encodes.
    pub fn encoder_for(&self, strategies: &[RetrievalStrategy]) -> Result<Option<Box<dyn Encoder>>> {
        if any_needs_encoder(strategies) {
            self.encoder().map(Some)
        } else {
            tracing::debug!("lexical-only run, skipping encoder");
            Ok(None)
        }
    }

    /// Backend to search: an in-memory index over `corpus` when given,
    /// otherwise the configured Elasticsearch cluster.
    pub fn search_backend(&self, corpus: Option<&Path>) -> Result<Box<dyn SearchBackend>> {
        match corpus {
            Some(path) => {
                let documents = load_documents(path)?;
                tracing::info!(
                    corpus = %path.display(),
                    documents = documents.len(),
                    "searching in-memory corpus"
                );
                Ok(Box::new(InMemoryBackend::with_documents(
                    &self.config.backend.index,
                    documents,
                )))
            }
            None => build_backend(&self.config.backend),
        }
    }
}
