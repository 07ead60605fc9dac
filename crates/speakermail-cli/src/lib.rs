//! Command-line front end for the speaker mailing pipeline.

pub mod cli_args;

use std::io::{self, IsTerminal};

use anyhow::{Context, Result, anyhow};
use rpassword::prompt_password;
use speakermail_core::config::{ConfigSource, RuntimeOverrides};
use speakermail_core::{RunSummary, load_config, password_from_env, resolve_run_config, run};
use tracing::info;

pub use cli_args::{Cli, ProcessArgs};

/// Load configuration, merge the command line over it, and run the pipeline.
pub fn dispatch(cli: Cli) -> Result<RunSummary> {
    let load = load_config(cli.config.as_deref())?;
    for warning in &load.warnings {
        eprintln!("Warning: {warning}");
    }
    if let ConfigSource::File(path) = &load.source {
        info!(path = %path.display(), "Loaded configuration file");
    }

    let mut overrides = cli.process.to_runtime_overrides().map_err(|err| anyhow!(err))?;
    fill_password(&mut overrides)?;

    let config = resolve_run_config(&load.config, &overrides)?;
    Ok(run(&config)?)
}

/// Live runs without `--password` fall back to the environment, then an interactive prompt.
fn fill_password(overrides: &mut RuntimeOverrides) -> Result<()> {
    if !overrides.is_live() || overrides.password.is_some() {
        return Ok(());
    }
    if let Some(password) = password_from_env() {
        overrides.password = Some(password);
        return Ok(());
    }
    if io::stdin().is_terminal() {
        let password = prompt_password("SMTP password: ").context("failed to read password")?;
        if !password.trim().is_empty() {
            overrides.password = Some(password);
        }
    }
    Ok(())
}
