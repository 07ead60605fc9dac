use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryMode, SmtpSettings};
use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "speakermail";
pub const CONFIG_FILE_NAME: &str = "speakermail.toml";
pub const CONFIG_ENV_VAR: &str = "SPEAKERMAIL_CONFIG";
pub const PASSWORD_ENV_VAR: &str = "SPEAKERMAIL_SMTP_PASSWORD";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_FEEDBACK_BASE_URL: &str = "https://openfeedback.io/r46KviPgLYMQfQnFpaGS/2022-12-02";

/// Directory holding speakermail's persistent state (logs).
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No configuration file was found; defaults were synthesized.
    Default,
    /// Configuration was read from the given TOML file.
    File(PathBuf),
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub inputs: InputPaths,
    pub event: EventSettings,
    pub smtp: SmtpPreferences,
    pub supplementary_talks: Vec<SupplementaryTalk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    pub schedule: String,
    pub contacts: String,
    pub output_dir: String,
    pub tickets_dir: Option<String>,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            schedule: "data/openfeedback.json".to_string(),
            contacts: "data/speakers.csv".to_string(),
            output_dir: "output".to_string(),
            tickets_dir: None,
        }
    }
}

/// Constants describing the conference itself: identities, venue and social events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub timezone: String,
    pub feedback_base_url: String,
    pub sender_name: String,
    pub sender_address: String,
    pub bcc_address: String,
    pub organizer_name: String,
    pub organizer_address: String,
    pub venue_address: String,
    pub venue_latitude: f64,
    pub venue_longitude: f64,
    pub dinner: SocialEvent,
    pub after_party: SocialEvent,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            timezone: "Europe/Paris".to_string(),
            feedback_base_url: DEFAULT_FEEDBACK_BASE_URL.to_string(),
            sender_name: "Team BDX I/O".to_string(),
            sender_address: "team@bdxio.fr".to_string(),
            bcc_address: "team@bdxio.fr".to_string(),
            organizer_name: "Team BDX I/O".to_string(),
            organizer_address: "team@bdxio.fr".to_string(),
            venue_address: "Palais des Congrès de Bordeaux, Av. Jean Gabriel Domergue, 33300 Bordeaux"
                .to_string(),
            venue_latitude: 44.8882631,
            venue_longitude: -0.5694203,
            dinner: SocialEvent::default_dinner(),
            after_party: SocialEvent::default_after_party(),
        }
    }
}

/// A fixed event shared by every recipient (speakers' dinner, after-party).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialEvent {
    pub title: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SocialEvent {
    fn default_dinner() -> Self {
        Self {
            title: "Soirée Speakers".to_string(),
            location: "La Brasserie Bordelaise, 50 Rue Saint-Rémi, 33000 Bordeaux".to_string(),
            latitude: 44.8411861,
            longitude: -0.5730474,
            start: utc(2022, 12, 1, 18, 0),
            end: utc(2022, 12, 1, 22, 0),
        }
    }

    fn default_after_party() -> Self {
        Self {
            title: "After BDX I/O".to_string(),
            location: "La Cervoiserie, 10 Quai Lawton, 33300 Bordeaux".to_string(),
            latitude: 44.8411804,
            longitude: -0.5993119,
            start: utc(2022, 12, 2, 17, 30),
            end: utc(2022, 12, 2, 22, 0),
        }
    }
}

fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

/// SMTP settings that may live on disk. The password never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpPreferences {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
}

impl Default for SmtpPreferences {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_SMTP_PORT,
            username: None,
        }
    }
}

/// A session missing from the schedule source, assigned to speakers by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementaryTalk {
    pub id: String,
    pub title: String,
    /// ISO local timestamp (`2022-12-02T17:20:00`) in the event time zone.
    pub start: String,
    pub end: String,
    pub room: String,
    #[serde(default)]
    pub backup: bool,
    pub speakers: Vec<String>,
}

/// Values supplied on the command line, each overriding the file configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeOverrides {
    pub subject: Option<String>,
    pub template: Option<String>,
    pub include_invites: Option<bool>,
    pub dry_run: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schedule: Option<String>,
    pub contacts: Option<String>,
    pub output_dir: Option<String>,
}

impl RuntimeOverrides {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.template.is_none()
            && self.include_invites.is_none()
            && self.dry_run.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.schedule.is_none()
            && self.contacts.is_none()
            && self.output_dir.is_none()
    }

    /// True when the merged configuration would transmit rather than persist.
    pub fn is_live(&self) -> bool {
        self.dry_run == Some(false)
    }
}

/// Fully resolved, validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub subject: String,
    pub template_path: PathBuf,
    pub include_invites: bool,
    pub delivery: DeliveryMode,
    pub schedule_path: PathBuf,
    pub contacts_path: PathBuf,
    pub tickets_dir: Option<PathBuf>,
    pub timezone: Tz,
    pub event: EventSettings,
    pub supplementary_talks: Vec<SupplementaryTalk>,
}

impl RunConfig {
    pub fn is_dry_run(&self) -> bool {
        matches!(self.delivery, DeliveryMode::Persist { .. })
    }
}

/// Load the configuration file.
///
/// Resolution order: the explicit path, then `SPEAKERMAIL_CONFIG`, then
/// `speakermail.toml` in the working directory. Explicit paths must exist;
/// a missing implicit file falls back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigLoadResult> {
    let requested = explicit.map(Path::to_path_buf).or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| expand_path(&value))
    });

    let path = match requested {
        Some(path) => path,
        None => {
            let implicit = PathBuf::from(CONFIG_FILE_NAME);
            if !implicit.exists() {
                return Ok(ConfigLoadResult {
                    config: FileConfig::default(),
                    warnings: Vec::new(),
                    source: ConfigSource::Default,
                });
            }
            implicit
        }
    };

    let raw = fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
    let mut config = parse_config(&raw)
        .map_err(|err| Error::config(format!("{}: {err}", path.display())))?;
    let warnings = sanitize_config(&mut config);

    Ok(ConfigLoadResult {
        config,
        warnings,
        source: ConfigSource::File(path),
    })
}

pub fn parse_config(raw: &str) -> std::result::Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn sanitize_config(config: &mut FileConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let trimmed = config.event.feedback_base_url.trim_end_matches('/');
    if trimmed.len() != config.event.feedback_base_url.len() {
        warnings.push(format!(
            "feedback_base_url had a trailing '/'; using {trimmed}"
        ));
        config.event.feedback_base_url = trimmed.to_string();
    }

    for talk in &config.supplementary_talks {
        if talk.speakers.is_empty() {
            warnings.push(format!(
                "supplementary talk {:?} is not assigned to any speaker",
                talk.id
            ));
        }
    }

    warnings
}

/// Merge file configuration and CLI overrides into a validated [`RunConfig`].
pub fn resolve_run_config(file: &FileConfig, overrides: &RuntimeOverrides) -> Result<RunConfig> {
    let subject = non_empty(overrides.subject.as_deref())
        .ok_or_else(|| Error::config("the subject of the email is required"))?;
    let template = non_empty(overrides.template.as_deref()).ok_or_else(|| {
        Error::config("the path to the template to use for the email is required")
    })?;

    let timezone: Tz = file.event.timezone.parse().map_err(|_| {
        Error::config(format!("unknown time zone {:?}", file.event.timezone))
    })?;

    let output_dir = overrides
        .output_dir
        .as_deref()
        .unwrap_or(file.inputs.output_dir.as_str());

    let delivery = if overrides.dry_run.unwrap_or(true) {
        DeliveryMode::Persist {
            output_dir: expand_path(output_dir),
        }
    } else {
        let host = non_empty(overrides.host.as_deref().or(file.smtp.host.as_deref()));
        let username = non_empty(
            overrides
                .username
                .as_deref()
                .or(file.smtp.username.as_deref()),
        );
        let password = non_empty(overrides.password.as_deref());
        match (host, username, password) {
            (Some(host), Some(username), Some(password)) => DeliveryMode::Transmit(SmtpSettings {
                host,
                port: overrides.port.unwrap_or(file.smtp.port),
                username,
                password,
            }),
            _ => {
                return Err(Error::config(
                    "host, username and password are required when dry-run is disabled",
                ));
            }
        }
    };

    Ok(RunConfig {
        subject,
        template_path: expand_path(&template),
        include_invites: overrides.include_invites.unwrap_or(false),
        delivery,
        schedule_path: expand_path(
            overrides
                .schedule
                .as_deref()
                .unwrap_or(file.inputs.schedule.as_str()),
        ),
        contacts_path: expand_path(
            overrides
                .contacts
                .as_deref()
                .unwrap_or(file.inputs.contacts.as_str()),
        ),
        tickets_dir: file.inputs.tickets_dir.as_deref().map(expand_path),
        timezone,
        event: file.event.clone(),
        supplementary_talks: file.supplementary_talks.clone(),
    })
}

/// Read the SMTP password from the environment, if set.
pub fn password_from_env() -> Option<String> {
    env::var(PASSWORD_ENV_VAR)
        .ok()
        .filter(|value| !value.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value).as_ref())
}
