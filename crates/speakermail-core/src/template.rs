use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::correlate::CorrelatedInvitation;
use crate::error::{Error, Result};

const TEMPLATE_NAME: &str = "invitation";
const TIME_FORMAT: &str = "%Hh%M";

/// Values exposed to the email template, e.g. `{{Firstname}}` or `{{#if Quickie}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvitationView {
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "TalkID")]
    pub talk_id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub room: String,
    pub backup: bool,
    pub quickie: bool,
    pub accommodation: bool,
    #[serde(rename = "OpenFeedbackURL")]
    pub open_feedback_url: String,
    pub female: bool,
}

impl InvitationView {
    pub fn new(invitation: &CorrelatedInvitation, feedback_base_url: &str) -> Self {
        let speaker = &invitation.speaker;
        let talk = &invitation.talk;
        Self {
            firstname: speaker.firstname.clone(),
            lastname: speaker.lastname.clone(),
            talk_id: talk.id.clone(),
            title: talk.title.clone(),
            start: talk.start.format(TIME_FORMAT).to_string(),
            end: talk.end.format(TIME_FORMAT).to_string(),
            room: talk.room.clone(),
            backup: talk.backup,
            quickie: talk.is_quickie(),
            accommodation: speaker.accommodation,
            open_feedback_url: feedback_base_url.to_string(),
            female: speaker.is_female(),
        }
    }
}

/// The HTML body template shared by every recipient of a run.
pub struct InvitationTemplate {
    registry: Handlebars<'static>,
}

impl InvitationTemplate {
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_source(&source)
    }

    /// Compile a template. Strict mode turns references to unknown fields into errors.
    pub fn from_source(source: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_template_string(TEMPLATE_NAME, source)?;
        Ok(Self { registry })
    }

    pub fn render(&self, view: &InvitationView) -> Result<String> {
        Ok(self.registry.render(TEMPLATE_NAME, view)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{Sex, SpeakerRecord};
    use crate::error::ErrorKind;
    use crate::schedule::{TalkRecord, parse_local_timestamp};
    use chrono_tz::Europe::Paris;
    use std::sync::Arc;

    fn invitation() -> CorrelatedInvitation {
        CorrelatedInvitation {
            speaker_id: "TCK1".to_string(),
            speaker: SpeakerRecord {
                firstname: "Jane".to_string(),
                lastname: "Doe".to_string(),
                ticket: "TCK1".to_string(),
                email: "jane@x.com".to_string(),
                uid: "TCK1".to_string(),
                backup: false,
                accommodation: true,
                sex: Sex::Female,
            },
            talk: Arc::new(TalkRecord {
                id: "T1".to_string(),
                title: "Intro <Rust>".to_string(),
                start: parse_local_timestamp("T1", "2022-12-02T09:00:00", Paris).unwrap(),
                end: parse_local_timestamp("T1", "2022-12-02T09:15:00", Paris).unwrap(),
                room: "Amphi A".to_string(),
                backup: false,
            }),
        }
    }

    #[test]
    fn view_formats_local_times_and_flags() {
        let view = InvitationView::new(&invitation(), "https://openfeedback.io/x");
        assert_eq!(view.start, "09h00");
        assert_eq!(view.end, "09h15");
        assert!(view.quickie);
        assert!(view.accommodation);
        assert!(view.female);
        assert!(!view.backup);
    }

    #[test]
    fn renders_pascal_case_fields_with_html_escaping() {
        let template = InvitationTemplate::from_source(
            "<p>Bonjour {{Firstname}} {{Lastname}},</p>\
             <p>{{Title}} ({{TalkID}}) {{Start}}-{{End}} en {{Room}}</p>\
             {{#if Quickie}}<p>quickie</p>{{/if}}\
             {{#if Female}}<p>chère</p>{{/if}}\
             <a href=\"{{OpenFeedbackURL}}\">feedback</a>",
        )
        .unwrap();
        let html = template
            .render(&InvitationView::new(&invitation(), "https://openfeedback.io/x"))
            .unwrap();
        assert!(html.contains("Bonjour Jane Doe,"));
        assert!(html.contains("Intro &lt;Rust&gt; (T1) 09h00-09h15 en Amphi A"));
        assert!(html.contains("<p>quickie</p>"));
        assert!(html.contains("<p>chère</p>"));
        assert!(html.contains("https://openfeedback.io/x"));
    }

    #[test]
    fn invalid_syntax_is_template_error() {
        let err = InvitationTemplate::from_source("{{#if Backup}}unterminated").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Template);
    }

    #[test]
    fn unknown_field_fails_binding() {
        let template = InvitationTemplate::from_source("{{Nickname}}").unwrap();
        let err = template
            .render(&InvitationView::new(&invitation(), "https://x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Template);
    }

    #[test]
    fn missing_template_file_is_io_error() {
        let err = InvitationTemplate::from_file(Path::new("/nonexistent/template.html"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
