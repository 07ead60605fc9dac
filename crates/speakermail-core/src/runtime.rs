use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{error, info};

use crate::calendar::{StampSource, SystemStamps};
use crate::config::RunConfig;
use crate::contacts::load_contacts;
use crate::correlate::{correlate, inject_supplementary};
use crate::delivery::{DeliveryGateway, DeliveryMode};
use crate::error::Result;
use crate::message::{EmailMessage, MessageAssembler};
use crate::schedule::load_talks;
use crate::template::{InvitationTemplate, InvitationView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    pub messages: usize,
    /// Where previews were written, for dry runs.
    pub output_dir: Option<PathBuf>,
}

struct StageLogger {
    program_start: Instant,
}

impl StageLogger {
    fn new(program_start: Instant) -> Self {
        Self { program_start }
    }

    fn stage<T>(&self, name: &str, work: impl FnOnce() -> Result<T>) -> Result<T> {
        info!(
            stage = name,
            elapsed_ms = %format_ms(self.program_start.elapsed()),
            "BEGIN"
        );
        let stage_start = Instant::now();
        let outcome = work();
        let stage_ms = format_ms(stage_start.elapsed());
        match &outcome {
            Ok(_) => info!(
                stage = name,
                elapsed_ms = %format_ms(self.program_start.elapsed()),
                stage_ms = %stage_ms,
                "END"
            ),
            Err(err) => error!(
                stage = name,
                stage_ms = %stage_ms,
                kind = ?err.kind(),
                error = %err,
                "FAILED"
            ),
        }
        outcome
    }
}

fn format_ms(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1_000.0)
}

/// Run the whole pipeline with wall-clock calendar stamps.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    run_with_stamps(config, &SystemStamps)
}

pub fn run_with_stamps(config: &RunConfig, stamps: &dyn StampSource) -> Result<RunSummary> {
    info!(
        started_at = %Local::now().format("%Y-%m-%dT%H:%M:%S%.6f %z"),
        mode = config.delivery.label(),
        "Starting speaker mailing"
    );
    let program_start = Instant::now();
    let logger = StageLogger::new(program_start);

    let messages = assemble_all(config, stamps, &logger)?;
    let mut gateway = DeliveryGateway::new(config.delivery.clone());
    let report = logger.stage("Deliver", || gateway.deliver(&messages))?;

    let (mode, output_dir) = match gateway.mode() {
        DeliveryMode::Persist { output_dir } => (RunMode::DryRun, Some(output_dir.clone())),
        DeliveryMode::Transmit(_) => (RunMode::Live, None),
    };
    info!(
        messages = report.delivered,
        total_ms = %format_ms(program_start.elapsed()),
        "Speaker mailing complete"
    );

    Ok(RunSummary {
        mode,
        messages: report.delivered,
        output_dir,
    })
}

/// Everything up to, but not including, delivery.
pub fn build_messages(config: &RunConfig, stamps: &dyn StampSource) -> Result<Vec<EmailMessage>> {
    assemble_all(config, stamps, &StageLogger::new(Instant::now()))
}

fn assemble_all(
    config: &RunConfig,
    stamps: &dyn StampSource,
    logger: &StageLogger,
) -> Result<Vec<EmailMessage>> {
    let mut assignments = logger.stage("Load schedule", || {
        load_talks(&config.schedule_path, config.timezone)
    })?;
    let contacts = logger.stage("Load contacts", || load_contacts(&config.contacts_path))?;
    logger.stage("Inject supplementary talks", || {
        inject_supplementary(&mut assignments, &config.supplementary_talks, config.timezone)
    })?;
    let invitations = logger.stage("Correlate", || Ok(correlate(&assignments, &contacts)?))?;
    let template = logger.stage("Compile template", || {
        InvitationTemplate::from_file(&config.template_path)
    })?;

    logger.stage("Assemble messages", || {
        let assembler = MessageAssembler::new(&config.event, config.include_invites, stamps)
            .with_tickets_dir(config.tickets_dir.as_deref());
        invitations
            .iter()
            .map(|invitation| {
                let view = InvitationView::new(invitation, &config.event.feedback_base_url);
                let body = template.render(&view)?;
                assembler.assemble(&config.subject, invitation, body)
            })
            .collect()
    })
}
