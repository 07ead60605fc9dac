//! Loading of the speaker contact spreadsheet.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, ParseError, Result};

/// Columns: firstname, lastname, ticket, email, uid, backup, accommodation, sex.
pub const CONTACT_COLUMNS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sex {
    Female,
    Male,
    #[default]
    Unset,
}

impl Sex {
    /// Only the exact codes `F` and `M` are recognised.
    pub fn from_code(code: &str) -> Self {
        match code {
            "F" => Sex::Female,
            "M" => Sex::Male,
            _ => Sex::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerRecord {
    pub firstname: String,
    pub lastname: String,
    pub ticket: String,
    pub email: String,
    pub uid: String,
    pub backup: bool,
    pub accommodation: bool,
    pub sex: Sex,
}

impl SpeakerRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn is_female(&self) -> bool {
        self.sex == Sex::Female
    }

    pub fn is_male(&self) -> bool {
        self.sex == Sex::Male
    }

    /// Expected location of this speaker's ticket inside `dir`.
    pub fn ticket_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "billet {} - {} {}.pdf",
            self.ticket,
            normalize_name(&self.firstname),
            normalize_name(&self.lastname)
        ))
    }
}

/// Speaker records keyed by resolved identifier.
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    speakers: BTreeMap<String, SpeakerRecord>,
    overwritten: Vec<String>,
}

impl ContactBook {
    pub fn get(&self, uid: &str) -> Option<&SpeakerRecord> {
        self.speakers.get(uid)
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Identifiers that appeared on more than one row; the last row won.
    pub fn overwritten(&self) -> &[String] {
        &self.overwritten
    }

    pub fn insert(&mut self, speaker: SpeakerRecord) {
        let uid = speaker.uid.clone();
        if self.speakers.insert(uid.clone(), speaker).is_some() {
            warn!(speaker_id = %uid, "Duplicate contact row; keeping the last one");
            self.overwritten.push(uid);
        }
    }
}

pub fn load_contacts(path: &Path) -> Result<ContactBook> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    parse_contacts(file, path)
}

/// Parse CSV contact rows; the first row is a header and is skipped.
pub fn parse_contacts<R: Read>(reader: R, path: &Path) -> Result<ContactBook> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut book = ContactBook::default();
    for row in csv_reader.records() {
        let record = row.map_err(|source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.len() < CONTACT_COLUMNS {
            return Err(ParseError::ShortRow {
                path: path.to_path_buf(),
                line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                found: record.len(),
                expected: CONTACT_COLUMNS,
            }
            .into());
        }

        let ticket = record[2].to_string();
        let uid = if record[4].is_empty() {
            ticket.clone()
        } else {
            record[4].to_string()
        };

        book.insert(SpeakerRecord {
            firstname: record[0].trim().to_string(),
            lastname: record[1].trim().to_string(),
            email: record[3].trim().to_string(),
            backup: &record[5] == "true",
            accommodation: &record[6] == "true",
            sex: Sex::from_code(record[7].trim()),
            ticket,
            uid,
        });
    }

    Ok(book)
}

/// Lowercase and strip the French diacritics that show up in ticket file names.
pub fn normalize_name(value: &str) -> String {
    value
        .to_lowercase()
        .replace(['é', 'è'], "e")
        .replace(['î', 'ï'], "i")
        .replace('ô', "o")
        .replace('ç', "c")
        .replace("m. ", "")
}
