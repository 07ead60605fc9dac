//! Minimal iCalendar documents for the talk, dinner and after-party invites.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::config::{EventSettings, SocialEvent};
use crate::schedule::TalkRecord;

pub const CALENDAR_PREAMBLE: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//bobbin v0.1//NONSGML iCal Writer//EN
CALSCALE:GREGORIAN
METHOD:PUBLISH
";
pub const CALENDAR_POSTAMBLE: &str = "END:VCALENDAR";

const UTC_STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn from_talk(talk: &TalkRecord, settings: &EventSettings) -> Self {
        Self {
            title: talk.title.clone(),
            location: format!("{}, {}", talk.room, settings.venue_address),
            latitude: settings.venue_latitude,
            longitude: settings.venue_longitude,
            start: talk.start.with_timezone(&Utc),
            end: talk.end.with_timezone(&Utc),
        }
    }

    pub fn from_social(event: &SocialEvent) -> Self {
        Self {
            title: event.title.clone(),
            location: event.location.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            start: event.start,
            end: event.end,
        }
    }
}

/// Identifier and generation time minted for each emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    pub uid: String,
    pub generated_at: DateTime<Utc>,
}

/// Supplies a stamp every time an event is written.
pub trait StampSource {
    fn next_stamp(&self) -> EventStamp;
}

/// Wall clock plus a random v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStamps;

impl StampSource for SystemStamps {
    fn next_stamp(&self) -> EventStamp {
        EventStamp {
            uid: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Always returns the same stamp.
#[derive(Debug, Clone)]
pub struct FixedStamps(pub EventStamp);

impl StampSource for FixedStamps {
    fn next_stamp(&self) -> EventStamp {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organizer {
    pub name: String,
    pub address: String,
}

fn compact_utc<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    value.with_timezone(&Utc).format(UTC_STAMP_FORMAT).to_string()
}

/// Render one `VEVENT` block.
pub fn render_event(event: &CalendarEvent, organizer: &Organizer, stamp: &EventStamp) -> String {
    let generated_at = compact_utc(&stamp.generated_at);
    let mut out = String::with_capacity(512);
    out.push_str("BEGIN:VEVENT\n");
    out.push_str(&format!("DTSTART:{}\n", compact_utc(&event.start)));
    out.push_str(&format!("DTEND:{}\n", compact_utc(&event.end)));
    out.push_str(&format!("DTSTAMP:{generated_at}\n"));
    out.push_str(&format!("UID:{}\n", stamp.uid));
    out.push_str(&format!("CREATED:{generated_at}\n"));
    out.push_str(&format!("DESCRIPTION:{}\n", event.title));
    out.push_str(&format!("LAST-MODIFIED:{generated_at}\n"));
    out.push_str("SEQUENCE:0\n");
    out.push_str("STATUS:CONFIRMED\n");
    out.push_str(&format!("SUMMARY:{}\n", event.title));
    out.push_str(&format!(
        "ORGANIZER;CN={}:MAILTO:{}\n",
        organizer.name, organizer.address
    ));
    out.push_str(&format!("LOCATION:{}\n", event.location));
    out.push_str(&format!("GEO:{:.6};{:.6}\n", event.latitude, event.longitude));
    out.push_str("TRANSP:OPAQUE\n");
    out.push_str("END:VEVENT\n");
    out
}

/// Wrap events in a calendar container, minting a fresh stamp per event.
pub fn render_calendar(
    events: &[CalendarEvent],
    organizer: &Organizer,
    stamps: &dyn StampSource,
) -> String {
    let mut out = String::from(CALENDAR_PREAMBLE);
    for event in events {
        out.push_str(&render_event(event, organizer, &stamps.next_stamp()));
    }
    out.push_str(CALENDAR_POSTAMBLE);
    out
}

/// Produces the three invite documents attached to speaker emails.
pub struct InviteGenerator<'a> {
    settings: &'a EventSettings,
    organizer: Organizer,
    stamps: &'a dyn StampSource,
}

impl<'a> InviteGenerator<'a> {
    pub fn new(settings: &'a EventSettings, stamps: &'a dyn StampSource) -> Self {
        Self {
            organizer: Organizer {
                name: settings.organizer_name.clone(),
                address: settings.organizer_address.clone(),
            },
            settings,
            stamps,
        }
    }

    pub fn talk_invite(&self, talk: &TalkRecord) -> String {
        self.single(CalendarEvent::from_talk(talk, self.settings))
    }

    pub fn dinner_invite(&self) -> String {
        self.single(CalendarEvent::from_social(&self.settings.dinner))
    }

    pub fn after_party_invite(&self) -> String {
        self.single(CalendarEvent::from_social(&self.settings.after_party))
    }

    fn single(&self, event: CalendarEvent) -> String {
        render_calendar(std::slice::from_ref(&event), &self.organizer, self.stamps)
    }
}
