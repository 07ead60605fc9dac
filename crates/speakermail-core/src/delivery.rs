//! Final hand-off of assembled messages: on-disk preview files or live SMTP.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{SmtpTransport, Transport};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::message::EmailMessage;

/// Connection settings for the submission server. Always uses STARTTLS and PLAIN auth.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SmtpSettings {
    pub fn open_session(&self) -> Result<SmtpTransport> {
        let transport = SmtpTransport::starttls_relay(&self.host)
            .map_err(Error::transport)?
            .port(self.port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .build();
        Ok(transport)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Dry run: one `<recipient>.txt` file per message.
    Persist { output_dir: PathBuf },
    Transmit(SmtpSettings),
}

impl DeliveryMode {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryMode::Persist { .. } => "persist",
            DeliveryMode::Transmit(_) => "transmit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Persisting,
    Transmitting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Files written in persist mode, in message order.
    pub written: Vec<PathBuf>,
}

/// Delivers one batch, then refuses further work.
#[derive(Debug)]
pub struct DeliveryGateway {
    mode: DeliveryMode,
    state: DeliveryState,
}

impl DeliveryGateway {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            state: DeliveryState::Idle,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    pub fn deliver(&mut self, messages: &[EmailMessage]) -> Result<DeliveryReport> {
        if self.state != DeliveryState::Idle {
            return Err(Error::config(format!(
                "delivery gateway already used (state {:?})",
                self.state
            )));
        }

        let outcome = match &self.mode {
            DeliveryMode::Persist { output_dir } => {
                self.state = DeliveryState::Persisting;
                persist_batch(output_dir, messages)
            }
            DeliveryMode::Transmit(settings) => {
                self.state = DeliveryState::Transmitting;
                settings
                    .open_session()
                    .and_then(|transport| transmit_batch(&transport, messages))
            }
        };
        self.state = DeliveryState::Done;
        outcome
    }
}

/// Write every message as a raw RFC 5322 file named after its recipient.
///
/// Every message is converted before the directory is touched, so a
/// malformed message leaves no output behind.
pub fn persist_batch(output_dir: &Path, messages: &[EmailMessage]) -> Result<DeliveryReport> {
    let prepared = messages
        .iter()
        .map(|message| {
            Ok((
                preview_file_name(message.recipient_address()),
                message.to_mime()?.formatted(),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    match fs::create_dir(output_dir) {
        Ok(()) => debug!(path = %output_dir.display(), "Created output directory"),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
        Err(err) => return Err(Error::io(output_dir, err)),
    }

    let mut written = Vec::with_capacity(prepared.len());
    for (file_name, raw) in prepared {
        let path = output_dir.join(file_name);
        fs::write(&path, raw).map_err(|err| Error::io(&path, err))?;
        info!(path = %path.display(), "Wrote message preview");
        written.push(path);
    }

    Ok(DeliveryReport {
        delivered: written.len(),
        written,
    })
}

/// `<recipient>.txt`, with path separators in the address replaced by `_`.
pub fn preview_file_name(recipient: &str) -> String {
    format!("{}.txt", recipient.replace(['/', '\\'], "_"))
}

/// Send every message over `transport` in order, stopping at the first failure.
///
/// All messages are converted before anything is sent, so a malformed
/// message aborts the batch without a partial send.
pub fn transmit_batch<T>(transport: &T, messages: &[EmailMessage]) -> Result<DeliveryReport>
where
    T: Transport,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    let prepared = messages
        .iter()
        .map(|message| Ok((message.recipient_address(), message.to_mime()?)))
        .collect::<Result<Vec<_>>>()?;

    let mut delivered = 0;
    for (recipient, mime) in &prepared {
        if let Err(err) = transport.send(mime) {
            warn!(recipient = %recipient, delivered, "Transmission failed");
            return Err(Error::transport(err));
        }
        info!(recipient = %recipient, "Sent message");
        delivered += 1;
    }

    Ok(DeliveryReport {
        delivered,
        written: Vec::new(),
    })
}
