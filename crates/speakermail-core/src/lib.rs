//! Core library for mailing conference speakers their personalised schedule details.

pub mod calendar;
pub mod config;
pub mod contacts;
pub mod correlate;
pub mod delivery;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod message;
pub mod runtime;
pub mod schedule;
pub mod template;

pub use calendar::{EventStamp, FixedStamps, InviteGenerator, StampSource, SystemStamps};
pub use config::{
    ConfigLoadResult, ConfigSource, EventSettings, FileConfig, RunConfig, RuntimeOverrides,
    SupplementaryTalk, config_directory, load_config, password_from_env, resolve_run_config,
};
pub use contacts::{ContactBook, Sex, SpeakerRecord, load_contacts, normalize_name};
pub use correlate::{CorrelatedInvitation, TalkAssignments, correlate};
pub use delivery::{DeliveryGateway, DeliveryMode, DeliveryReport, DeliveryState, SmtpSettings};
pub use error::{Error, ErrorKind, ParseError, Result, ValidationError};
pub use logging::{LoggingDestination, LoggingError, current_log_path, init_logging};
pub use message::{Attachment, AttachmentKind, EmailMessage, Mailbox, MessageAssembler};
pub use runtime::{RunMode, RunSummary, build_messages, run, run_with_stamps};
pub use schedule::{TalkRecord, load_talks};
pub use template::{InvitationTemplate, InvitationView};
