//! Pairing of schedule talks with contact records.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, info};

use crate::config::SupplementaryTalk;
use crate::contacts::{ContactBook, SpeakerRecord};
use crate::error::{Result, ValidationError};
use crate::schedule::{TalkRecord, parse_local_timestamp};

/// Many-to-one relation between speakers and talks.
///
/// Each talk is stored once and shared; a speaker holds the talks they were
/// listed on, in schedule order.
#[derive(Debug, Clone, Default)]
pub struct TalkAssignments {
    talks: BTreeMap<String, Arc<TalkRecord>>,
    speakers: BTreeMap<String, Vec<Arc<TalkRecord>>>,
}

impl TalkAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scheduled session, appending it to each listed speaker.
    pub fn add_session(&mut self, talk: TalkRecord, speaker_ids: &[String]) {
        let talk = Arc::new(talk);
        self.talks.insert(talk.id.clone(), Arc::clone(&talk));
        for speaker_id in speaker_ids {
            self.speakers
                .entry(speaker_id.clone())
                .or_default()
                .push(Arc::clone(&talk));
        }
    }

    /// Force-assign a talk the schedule source omits.
    ///
    /// Whatever those speakers had before is replaced. Reusing the id of a
    /// different stored talk is rejected so no other speaker's talk changes.
    pub fn assign_supplementary(
        &mut self,
        talk: TalkRecord,
        speaker_ids: &[String],
    ) -> std::result::Result<(), ValidationError> {
        let talk = match self.talks.get(&talk.id) {
            Some(existing) if **existing == talk => Arc::clone(existing),
            Some(existing) => {
                return Err(ValidationError::ConflictingTalk {
                    talk_id: talk.id,
                    existing: existing.title.clone(),
                    replacement: talk.title,
                });
            }
            None => {
                let talk = Arc::new(talk);
                self.talks.insert(talk.id.clone(), Arc::clone(&talk));
                talk
            }
        };
        for speaker_id in speaker_ids {
            self.speakers
                .insert(speaker_id.clone(), vec![Arc::clone(&talk)]);
        }
        Ok(())
    }

    pub fn talks_for(&self, speaker_id: &str) -> Vec<&Arc<TalkRecord>> {
        self.speakers
            .get(speaker_id)
            .map(|talks| talks.iter().collect())
            .unwrap_or_default()
    }

    /// Speakers currently assigned to `talk_id`, in id order.
    pub fn speakers_of(&self, talk_id: &str) -> Vec<&str> {
        self.speakers
            .iter()
            .filter(|(_, talks)| talks.iter().any(|talk| talk.id == talk_id))
            .map(|(speaker_id, _)| speaker_id.as_str())
            .collect()
    }

    /// Number of speakers with at least one assignment entry.
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}

/// Exactly one talk paired with exactly one speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedInvitation {
    pub speaker_id: String,
    pub speaker: SpeakerRecord,
    pub talk: Arc<TalkRecord>,
}

/// Convert configured supplementary talks and inject them into `assignments`.
pub fn inject_supplementary(
    assignments: &mut TalkAssignments,
    talks: &[SupplementaryTalk],
    tz: Tz,
) -> Result<()> {
    for extra in talks {
        let record = TalkRecord {
            id: extra.id.clone(),
            title: extra.title.trim().to_string(),
            start: parse_local_timestamp(&extra.id, &extra.start, tz)?,
            end: parse_local_timestamp(&extra.id, &extra.end, tz)?,
            room: extra.room.clone(),
            backup: extra.backup,
        };
        info!(
            talk = %record.title,
            speakers = ?extra.speakers,
            "Injecting supplementary talk"
        );
        assignments.assign_supplementary(record, &extra.speakers)?;
    }
    Ok(())
}

/// Produce one invitation per speaker, ordered by speaker id.
///
/// Fails on the first speaker that has anything other than exactly one talk,
/// or that has no contact record.
pub fn correlate(
    assignments: &TalkAssignments,
    contacts: &ContactBook,
) -> std::result::Result<Vec<CorrelatedInvitation>, ValidationError> {
    let mut invitations = Vec::with_capacity(assignments.len());
    for (speaker_id, talks) in &assignments.speakers {
        let [talk] = talks.as_slice() else {
            return Err(ValidationError::TalkCount {
                speaker_id: speaker_id.clone(),
                count: talks.len(),
            });
        };
        let speaker = contacts
            .get(speaker_id)
            .ok_or_else(|| ValidationError::UnknownSpeaker {
                speaker_id: speaker_id.clone(),
                title: talk.title.clone(),
            })?;

        debug!(speaker_id = %speaker_id, talk = %talk.title, "Correlated speaker");
        invitations.push(CorrelatedInvitation {
            speaker_id: speaker_id.clone(),
            speaker: speaker.clone(),
            talk: Arc::clone(talk),
        });
    }
    Ok(invitations)
}
