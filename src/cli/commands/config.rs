//! rag-eval config - Show the effective configuration

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{emit_json, machine_ok};
use crate::config::Config;
use crate::error::{EvalError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print built-in defaults instead of the merged configuration
    #[arg(long)]
    pub defaults: bool,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    let config = if args.defaults {
        Config::default()
    } else {
        ctx.config.clone()
    };

    if ctx.format.is_machine_readable() {
        return emit_json(&machine_ok(serde_json::json!({
            "config_path": ctx.config_path.as_ref().map(|path| path.display().to_string()),
            "config": config,
        })));
    }

    println!("{}", render_toml(&config)?);
    Ok(())
}

fn render_toml(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).map_err(|err| EvalError::Config(format!("render config: {err}")))
}
