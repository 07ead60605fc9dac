use std::fs;
use std::path::Path;

use lettre::Address;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox as MimeMailbox, MultiPart, SinglePart};
use tracing::info;

use crate::calendar::{InviteGenerator, StampSource};
use crate::config::EventSettings;
use crate::correlate::CorrelatedInvitation;
use crate::error::{Error, Result};
use crate::feedback::{feedback_url, generate_qr_png};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    pub fn bare(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    fn to_mime(&self) -> Result<MimeMailbox> {
        let address: Address = self.address.parse().map_err(|source| Error::Address {
            address: self.address.clone(),
            source,
        })?;
        Ok(MimeMailbox::new(self.name.clone(), address))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Png,
    Calendar,
    Pdf,
}

impl AttachmentKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            AttachmentKind::Png => "image/png",
            AttachmentKind::Calendar => "text/calendar; charset=utf-8",
            AttachmentKind::Pdf => "application/pdf",
        }
    }

    fn content_type(self) -> Result<ContentType> {
        ContentType::parse(self.mime_type())
            .map_err(|err| Error::config(format!("invalid content type {}: {err}", self.mime_type())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub kind: AttachmentKind,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: &str, kind: AttachmentKind, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.to_string(),
            kind,
            content: content.into(),
        }
    }
}

/// A fully assembled email, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub bcc: Mailbox,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    pub fn recipient_address(&self) -> &str {
        &self.to.address
    }

    pub fn attachment_names(&self) -> Vec<&str> {
        self.attachments
            .iter()
            .map(|attachment| attachment.filename.as_str())
            .collect()
    }

    /// Build the `multipart/mixed` MIME message: HTML body first, then attachments.
    pub fn to_mime(&self) -> Result<lettre::Message> {
        let mut body = MultiPart::mixed().singlepart(SinglePart::html(self.html_body.clone()));
        for attachment in &self.attachments {
            body = body.singlepart(
                MimeAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), attachment.kind.content_type()?),
            );
        }

        Ok(lettre::Message::builder()
            .from(self.from.to_mime()?)
            .to(self.to.to_mime()?)
            .bcc(self.bcc.to_mime()?)
            .subject(self.subject.clone())
            .multipart(body)?)
    }
}

/// Turns correlated invitations plus rendered bodies into email messages.
pub struct MessageAssembler<'a> {
    settings: &'a EventSettings,
    include_invites: bool,
    tickets_dir: Option<&'a Path>,
    invites: InviteGenerator<'a>,
}

impl<'a> MessageAssembler<'a> {
    pub fn new(
        settings: &'a EventSettings,
        include_invites: bool,
        stamps: &'a dyn StampSource,
    ) -> Self {
        Self {
            settings,
            include_invites,
            tickets_dir: None,
            invites: InviteGenerator::new(settings, stamps),
        }
    }

    /// Attach each speaker's ticket PDF from `dir` when invites are included.
    pub fn with_tickets_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.tickets_dir = dir;
        self
    }

    pub fn assemble(
        &self,
        subject: &str,
        invitation: &CorrelatedInvitation,
        html_body: String,
    ) -> Result<EmailMessage> {
        let speaker = &invitation.speaker;
        let talk = &invitation.talk;
        info!(speaker_id = %invitation.speaker_id, talk = %talk.title, "Creating email");

        let mut attachments = Vec::new();
        if self.include_invites {
            if !talk.backup {
                let qr = generate_qr_png(&feedback_url(&self.settings.feedback_base_url, &talk.id))?;
                attachments.push(Attachment::new("qr.png", AttachmentKind::Png, qr));
                attachments.push(Attachment::new(
                    "talk.ics",
                    AttachmentKind::Calendar,
                    self.invites.talk_invite(talk),
                ));
            }
            attachments.push(Attachment::new(
                "dinner.ics",
                AttachmentKind::Calendar,
                self.invites.dinner_invite(),
            ));
            attachments.push(Attachment::new(
                "after.ics",
                AttachmentKind::Calendar,
                self.invites.after_party_invite(),
            ));
            if let Some(dir) = self.tickets_dir {
                let path = speaker.ticket_path(dir);
                let ticket = fs::read(&path).map_err(|err| Error::io(&path, err))?;
                attachments.push(Attachment::new("ticket.pdf", AttachmentKind::Pdf, ticket));
            }
        }

        Ok(EmailMessage {
            from: Mailbox::new(&self.settings.sender_name, &self.settings.sender_address),
            to: Mailbox::new(speaker.display_name(), &speaker.email),
            bcc: Mailbox::bare(&self.settings.bcc_address),
            subject: subject.to_string(),
            html_body,
            attachments,
        })
    }
}
