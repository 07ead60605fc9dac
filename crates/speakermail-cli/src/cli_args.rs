use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, ValueHint};
use speakermail_core::config::RuntimeOverrides;

/// Send each conference speaker a personalised email about their talk.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $SPEAKERMAIL_CONFIG, then ./speakermail.toml).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub process: ProcessArgs,
}

#[derive(Debug, Clone, Args, Default)]
pub struct ProcessArgs {
    /// Subject of the email.
    #[arg(long)]
    pub subject: Option<String>,

    /// Path to the HTML template for the email body.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub template: Option<String>,

    /// Attach calendar invites and the feedback QR code.
    #[arg(long, action = ArgAction::SetTrue)]
    pub invites: bool,

    /// Write messages to the output directory instead of sending them (default: true).
    #[arg(
        long = "dry-run",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool),
        value_name = "BOOL"
    )]
    pub dry_run: Option<bool>,

    /// SMTP server host.
    #[arg(long = "url", alias = "host", value_hint = ValueHint::Hostname)]
    pub url: Option<String>,

    /// SMTP server port.
    #[arg(long, value_parser = clap::value_parser!(u16))]
    pub port: Option<u16>,

    /// SMTP username.
    #[arg(long)]
    pub username: Option<String>,

    /// SMTP password (prompted for, or read from $SPEAKERMAIL_SMTP_PASSWORD, when omitted).
    #[arg(long)]
    pub password: Option<String>,

    /// Schedule export (JSON).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub schedule: Option<String>,

    /// Speaker contact list (CSV).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub contacts: Option<String>,

    /// Directory receiving dry-run message files.
    #[arg(long = "output-dir", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<String>,
}

impl ProcessArgs {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.template.is_none()
            && !self.invites
            && self.dry_run.is_none()
            && self.url.is_none()
            && self.port.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.schedule.is_none()
            && self.contacts.is_none()
            && self.output_dir.is_none()
    }

    /// Convert CLI flags into runtime overrides.
    pub fn to_runtime_overrides(&self) -> Result<RuntimeOverrides, String> {
        if self.port == Some(0) {
            return Err("--port must be between 1 and 65535.".into());
        }

        Ok(RuntimeOverrides {
            subject: non_blank("--subject", self.subject.as_deref())?,
            template: non_blank("--template", self.template.as_deref())?,
            include_invites: self.invites.then_some(true),
            dry_run: self.dry_run,
            host: non_blank("--url", self.url.as_deref())?,
            port: self.port,
            username: non_blank("--username", self.username.as_deref())?,
            password: self.password.clone(),
            schedule: non_blank("--schedule", self.schedule.as_deref())?,
            contacts: non_blank("--contacts", self.contacts.as_deref())?,
            output_dir: non_blank("--output-dir", self.output_dir.as_deref())?,
        })
    }
}

fn non_blank(flag: &str, value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Err(format!("{flag} cannot be empty.")),
        Some(trimmed) => Ok(Some(trimmed.to_string())),
    }
}
