//! Loading of the OpenFeedback-style schedule export.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use crate::correlate::TalkAssignments;
use crate::error::{Error, ParseError, Result};

/// Timestamps in the schedule carry no UTC offset.
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const QUICKIE_MINUTES: i64 = 15;
const LAB_MINUTES: i64 = 100;

/// One scheduled session.
#[derive(Debug, Clone, PartialEq)]
pub struct TalkRecord {
    pub id: String,
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub room: String,
    /// The session runs without a live audience.
    pub backup: bool,
}

impl TalkRecord {
    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }

    pub fn is_quickie(&self) -> bool {
        self.duration() == Duration::minutes(QUICKIE_MINUTES)
    }

    pub fn is_lab(&self) -> bool {
        self.duration() >= Duration::minutes(LAB_MINUTES)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionEntry>,
    #[serde(default)]
    pub speakers: BTreeMap<String, SpeakerEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub track_title: String,
    #[serde(default)]
    pub backup: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeakerEntry {
    #[serde(default)]
    pub id: String,
}

impl ScheduleDocument {
    pub fn from_json(raw: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| {
            Error::from(ParseError::Json {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    /// Build typed talk records and index them by speaker.
    ///
    /// Sessions are visited in id order; a session listing N speakers is shared
    /// by all N of them rather than copied.
    pub fn into_assignments(self, tz: Tz) -> Result<TalkAssignments> {
        let mut assignments = TalkAssignments::new();
        for (id, session) in self.sessions {
            let start = parse_local_timestamp(&id, &session.start_time, tz)?;
            let end = parse_local_timestamp(&id, &session.end_time, tz)?;
            let talk = TalkRecord {
                title: session.title.trim().to_string(),
                start,
                end,
                room: session.track_title,
                backup: session.backup,
                id,
            };
            debug!(talk = %talk.id, speakers = session.speakers.len(), "Loaded session");
            assignments.add_session(talk, &session.speakers);
        }
        Ok(assignments)
    }
}

/// Read the schedule file and return the speaker → talk assignments.
pub fn load_talks(path: &Path, tz: Tz) -> Result<TalkAssignments> {
    load_schedule(path)?.into_assignments(tz)
}

pub fn load_schedule(path: &Path) -> Result<ScheduleDocument> {
    let raw = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    ScheduleDocument::from_json(&raw, path)
}

/// Interpret an offset-less timestamp in `tz`.
///
/// Ambiguous wall-clock times (DST fall-back) resolve to the earliest instant.
pub fn parse_local_timestamp(
    session: &str,
    value: &str,
    tz: Tz,
) -> std::result::Result<DateTime<Tz>, ParseError> {
    let naive = NaiveDateTime::parse_from_str(value, LOCAL_TIMESTAMP_FORMAT).map_err(|source| {
        ParseError::Timestamp {
            session: session.to_string(),
            value: value.to_string(),
            source,
        }
    })?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(datetime) => Ok(datetime),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(ParseError::NonexistentLocalTime {
            session: session.to_string(),
            value: value.to_string(),
            timezone: tz.name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Timelike;
    use chrono_tz::Europe::Paris;
    use std::path::PathBuf;
    use std::sync::Arc;

    const SAMPLE: &str = r#"{
        "sessions": {
            "101": {
                "speakers": ["s1", "s2"],
                "title": "  Rust in production  ",
                "startTime": "2022-12-02T10:00:00",
                "endTime": "2022-12-02T10:45:00",
                "trackTitle": "Amphi A",
                "tags": ["backend"]
            },
            "102": {
                "speakers": ["s3"],
                "title": "Quick one",
                "startTime": "2022-12-02T13:00:00",
                "endTime": "2022-12-02T13:15:00",
                "trackTitle": "Salle 3"
            },
            "103": {
                "title": "Lunch",
                "startTime": "2022-12-02T12:00:00",
                "endTime": "2022-12-02T13:00:00"
            }
        },
        "speakers": { "s1": { "id": "s1" } }
    }"#;

    fn talk(start: &str, end: &str) -> TalkRecord {
        TalkRecord {
            id: "T".to_string(),
            title: "Talk".to_string(),
            start: parse_local_timestamp("T", start, Paris).unwrap(),
            end: parse_local_timestamp("T", end, Paris).unwrap(),
            room: "Room".to_string(),
            backup: false,
        }
    }

    #[test]
    fn classifies_quickies_and_labs_by_duration() {
        let quickie = talk("2022-12-02T09:00:00", "2022-12-02T09:15:00");
        assert!(quickie.is_quickie());
        assert!(!quickie.is_lab());

        let regular = talk("2022-12-02T09:00:00", "2022-12-02T09:45:00");
        assert!(!regular.is_quickie());
        assert!(!regular.is_lab());

        let lab = talk("2022-12-02T14:00:00", "2022-12-02T15:40:00");
        assert!(lab.is_lab());

        let almost_lab = talk("2022-12-02T14:00:00", "2022-12-02T15:39:00");
        assert!(!almost_lab.is_lab());
    }

    #[test]
    fn builds_shared_talks_for_co_speakers() {
        let document = ScheduleDocument::from_json(SAMPLE, &PathBuf::from("schedule.json")).unwrap();
        assert_eq!(document.speakers.len(), 1);

        let assignments = document.into_assignments(Paris).unwrap();
        assert_eq!(assignments.len(), 3);

        let first = assignments.talks_for("s1");
        let second = assignments.talks_for("s2");
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(first[0], second[0]));
        assert_eq!(first[0].title, "Rust in production");
        assert_eq!(first[0].room, "Amphi A");
        assert_eq!(first[0].start.hour(), 10);
        assert_eq!(assignments.speakers_of("101"), vec!["s1", "s2"]);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let raw = r#"{ "sessions": { "9": {
            "speakers": ["s1"], "title": "Broken",
            "startTime": "2022-12-02 10:00", "endTime": "2022-12-02T10:45:00"
        } } }"#;
        let err = ScheduleDocument::from_json(raw, &PathBuf::from("s.json"))
            .unwrap()
            .into_assignments(Paris)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("session 9"));
    }

    #[test]
    fn rejects_local_times_skipped_by_dst() {
        let err = parse_local_timestamp("x", "2023-03-26T02:30:00", Paris).unwrap_err();
        assert!(matches!(err, ParseError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_talks(Path::new("/nonexistent/openfeedback.json"), Paris).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
