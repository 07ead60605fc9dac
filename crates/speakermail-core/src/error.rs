use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse category of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Validation,
    Template,
    Message,
    Artifact,
    Transport,
    Config,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("template render error: {0}")]
    Render(#[from] Box<handlebars::RenderError>),
    #[error("invalid address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("QR code error: {0}")]
    Qr(#[from] qrcode::types::QrError),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("session {session}: invalid timestamp {value:?}: {source}")]
    Timestamp {
        session: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("session {session}: local time {value:?} does not exist in {timezone}")]
    NonexistentLocalTime {
        session: String,
        value: String,
        timezone: String,
    },
    #[error("malformed schedule {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed contact list {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: line {line} has {found} columns, expected at least {expected}", path.display())]
    ShortRow {
        path: PathBuf,
        line: u64,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("cannot handle {count} talks for speaker with ID {speaker_id}")]
    TalkCount { speaker_id: String, count: usize },
    #[error("unable to find speaker with ID {speaker_id:?} for talk {title}")]
    UnknownSpeaker { speaker_id: String, title: String },
    #[error("talk ID {talk_id} is already used by {existing:?}; cannot reuse it for {replacement:?}")]
    ConflictingTalk {
        talk_id: String,
        existing: String,
        replacement: String,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config<T: Into<String>>(message: T) -> Self {
        Error::Config(message.into())
    }

    pub fn transport<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(source))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Parse(_) => ErrorKind::Parse,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Template(_) | Error::Render(_) => ErrorKind::Template,
            Error::Address { .. } | Error::Message(_) => ErrorKind::Message,
            Error::Qr(_) | Error::Image(_) => ErrorKind::Artifact,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<handlebars::TemplateError> for Error {
    fn from(value: handlebars::TemplateError) -> Self {
        Error::Template(Box::new(value))
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(value: handlebars::RenderError) -> Self {
        Error::Render(Box::new(value))
    }
}
