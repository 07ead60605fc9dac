use std::cell::Cell;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{TimeZone, Utc};
use lettre::Transport;
use lettre::address::Envelope;
use lettre::transport::stub::StubTransport;
use speakermail_core::delivery::transmit_batch;
use speakermail_core::{
    ErrorKind, EventStamp, FileConfig, FixedStamps, RunConfig, RunMode, RuntimeOverrides,
    SupplementaryTalk, build_messages, resolve_run_config, run_with_stamps,
};
use tempfile::tempdir;

const CONTACTS: &str = "\
firstname,lastname,ticket,email,uid,backup,accommodation,sex
\"Jane\",\"Doe\",\"TCK1\",\"jane@x.com\",\"\",\"false\",\"true\",\"F\"
";

const TEMPLATE: &str = "<p>Bonjour {{Firstname}} {{Lastname}},</p>\
<p>{{Title}} ({{TalkID}}) de {{Start}} à {{End}} en {{Room}}.</p>\
{{#if Quickie}}<p>Format quickie.</p>{{/if}}\
{{#if Accommodation}}<p>Hôtel réservé.</p>{{/if}}\
<p>{{OpenFeedbackURL}}</p>";

fn schedule_json(backup: bool) -> String {
    format!(
        r#"{{
            "sessions": {{
                "T1": {{
                    "speakers": ["TCK1"],
                    "title": " Intro ",
                    "startTime": "2022-12-02T09:00:00",
                    "endTime": "2022-12-02T09:15:00",
                    "trackTitle": "Amphi A",
                    "backup": {backup}
                }}
            }},
            "speakers": {{}}
        }}"#
    )
}

fn stamps() -> FixedStamps {
    FixedStamps(EventStamp {
        uid: "11111111-2222-4333-8444-555555555555".to_string(),
        generated_at: Utc.with_ymd_and_hms(2022, 11, 25, 7, 0, 0).unwrap(),
    })
}

fn write_fixtures(dir: &Path, schedule: &str, contacts: &str) {
    fs::write(dir.join("schedule.json"), schedule).unwrap();
    fs::write(dir.join("speakers.csv"), contacts).unwrap();
    fs::write(dir.join("template.html"), TEMPLATE).unwrap();
}

fn run_config(dir: &Path, file: &FileConfig, invites: bool) -> RunConfig {
    let path = |name: &str| Some(dir.join(name).to_string_lossy().into_owned());
    let overrides = RuntimeOverrides {
        subject: Some("BDX I/O - informations speakers".to_string()),
        template: path("template.html"),
        include_invites: Some(invites),
        schedule: path("schedule.json"),
        contacts: path("speakers.csv"),
        output_dir: path("output"),
        ..RuntimeOverrides::default()
    };
    resolve_run_config(file, &overrides).unwrap()
}

#[test]
fn dry_run_writes_one_preview_per_speaker() {
    let temp = tempdir().unwrap();
    write_fixtures(temp.path(), &schedule_json(false), CONTACTS);
    let config = run_config(temp.path(), &FileConfig::default(), true);

    let summary = run_with_stamps(&config, &stamps()).unwrap();
    assert_eq!(summary.mode, RunMode::DryRun);
    assert_eq!(summary.messages, 1);
    assert_eq!(summary.output_dir, Some(temp.path().join("output")));

    let entries: Vec<String> = fs::read_dir(temp.path().join("output"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["jane@x.com.txt".to_string()]);

    let raw = fs::read_to_string(temp.path().join("output/jane@x.com.txt")).unwrap();
    assert!(raw.contains("Subject: BDX I/O - informations speakers"));
    assert!(raw.contains("qr.png"));
    assert!(raw.contains("talk.ics"));
}

#[test]
fn rendered_body_carries_speaker_and_talk_details() {
    let temp = tempdir().unwrap();
    write_fixtures(temp.path(), &schedule_json(false), CONTACTS);
    let config = run_config(temp.path(), &FileConfig::default(), false);

    let messages = build_messages(&config, &stamps()).unwrap();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.recipient_address(), "jane@x.com");
    assert_eq!(message.to.name.as_deref(), Some("Jane Doe"));
    assert!(message.html_body.contains("Bonjour Jane Doe,"));
    assert!(message.html_body.contains("Intro (T1) de 09h00 à 09h15 en Amphi A."));
    assert!(message.html_body.contains("Format quickie."));
    assert!(message.html_body.contains("Hôtel réservé."));
    assert!(message.attachments.is_empty());
}

#[test]
fn backup_talk_with_invites_only_attaches_social_events() {
    let temp = tempdir().unwrap();
    write_fixtures(temp.path(), &schedule_json(true), CONTACTS);
    let config = run_config(temp.path(), &FileConfig::default(), true);

    let messages = build_messages(&config, &stamps()).unwrap();
    assert_eq!(messages[0].attachment_names(), vec!["dinner.ics", "after.ics"]);
}

#[test]
fn supplementary_talk_reaches_every_listed_speaker() {
    let temp = tempdir().unwrap();
    let contacts = format!(
        "{CONTACTS}\"John\",\"Roe\",\"TCK2\",\"john@x.com\",\"S2\",\"false\",\"false\",\"M\"\n\
         \"Ann\",\"Poe\",\"TCK3\",\"ann@x.com\",\"S3\",\"false\",\"false\",\"F\"\n"
    );
    write_fixtures(temp.path(), &schedule_json(false), &contacts);

    let mut file = FileConfig::default();
    file.supplementary_talks.push(SupplementaryTalk {
        id: "closing".to_string(),
        title: "Closing keynote".to_string(),
        start: "2022-12-02T17:20:00".to_string(),
        end: "2022-12-02T18:05:00".to_string(),
        room: "Amphi A".to_string(),
        backup: false,
        speakers: vec!["S2".to_string(), "S3".to_string()],
    });
    let config = run_config(temp.path(), &file, false);

    let messages = build_messages(&config, &stamps()).unwrap();
    assert_eq!(messages.len(), 3);
    let recipients: Vec<&str> = messages.iter().map(|m| m.recipient_address()).collect();
    assert_eq!(recipients, vec!["john@x.com", "ann@x.com", "jane@x.com"]);
    assert!(messages[0].html_body.contains("Closing keynote (closing) de 17h20 à 18h05"));
    assert!(messages[1].html_body.contains("Closing keynote (closing) de 17h20 à 18h05"));
}

#[test]
fn speaker_missing_from_contacts_stops_the_run() {
    let temp = tempdir().unwrap();
    let header_only = "firstname,lastname,ticket,email,uid,backup,accommodation,sex\n";
    write_fixtures(temp.path(), &schedule_json(false), header_only);
    let config = run_config(temp.path(), &FileConfig::default(), false);

    let err = run_with_stamps(&config, &stamps()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("TCK1"));
    assert!(!temp.path().join("output").exists());
}

#[test]
fn failing_transport_fails_the_batch() {
    let temp = tempdir().unwrap();
    write_fixtures(temp.path(), &schedule_json(false), CONTACTS);
    let config = run_config(temp.path(), &FileConfig::default(), false);
    let messages = build_messages(&config, &stamps()).unwrap();

    let err = transmit_batch(&StubTransport::new_error(), &messages).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);

    let transport = StubTransport::new_ok();
    let report = transmit_batch(&transport, &messages).unwrap();
    assert_eq!(report.delivered, 1);
}

/// Accepts `capacity` messages, then refuses every later one.
struct LimitedTransport {
    capacity: usize,
    accepted: Cell<usize>,
}

impl Transport for LimitedTransport {
    type Ok = ();
    type Error = io::Error;

    fn send_raw(&self, _envelope: &Envelope, _email: &[u8]) -> Result<(), io::Error> {
        if self.accepted.get() >= self.capacity {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "server hung up"));
        }
        self.accepted.set(self.accepted.get() + 1);
        Ok(())
    }
}

#[test]
fn failure_after_a_successful_send_fails_the_whole_run() {
    let temp = tempdir().unwrap();
    let contacts = format!(
        "{CONTACTS}\"John\",\"Roe\",\"TCK2\",\"john@x.com\",\"S2\",\"false\",\"false\",\"M\"\n"
    );
    write_fixtures(temp.path(), &schedule_json(false), &contacts);

    let mut file = FileConfig::default();
    file.supplementary_talks.push(SupplementaryTalk {
        id: "closing".to_string(),
        title: "Closing keynote".to_string(),
        start: "2022-12-02T17:20:00".to_string(),
        end: "2022-12-02T18:05:00".to_string(),
        room: "Amphi A".to_string(),
        backup: false,
        speakers: vec!["S2".to_string()],
    });
    let config = run_config(temp.path(), &file, false);
    let messages = build_messages(&config, &stamps()).unwrap();
    assert_eq!(messages.len(), 2);

    let transport = LimitedTransport {
        capacity: 1,
        accepted: Cell::new(0),
    };
    let err = transmit_batch(&transport, &messages).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("server hung up"), "{err}");
    assert_eq!(transport.accepted.get(), 1);
}
