//! Canonical capture date for a media file.
//!
//! Each source (embedded metadata, file name, modification time) is a
//! producer returning a maybe-candidate. The configured [`DateRule`] reduces
//! the candidates to one [`ResolvedDate`]. The modification time producer
//! always yields, so resolution is total.

use crate::config::AppConfig;
use crate::exif_reader::read_capture_date;
use crate::filename_date::date_from_filename;
use crate::media::{MediaFile, MediaKind};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    Metadata,
    Filename,
    Mtime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateRule {
    /// Earliest candidate wins; resaving tools only ever push timestamps forward.
    #[default]
    Earliest,
    /// First available source in metadata, filename, mtime order.
    MostSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCandidate {
    pub when: NaiveDateTime,
    pub source: DateSource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDate {
    pub when: NaiveDateTime,
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn year(&self) -> i32 {
        self.when.year()
    }

    pub fn month(&self) -> u32 {
        self.when.month()
    }

    /// `(YYYY, YYYY_MM)` directory names for the bucket this date falls into.
    pub fn bucket(&self) -> (String, String) {
        let year = format!("{:04}", self.year());
        let month = format!("{}_{:02}", year, self.month());
        (year, month)
    }
}

pub struct DateResolver<'a> {
    rule: DateRule,
    locale_tags: &'a [String],
}

impl<'a> DateResolver<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            rule: config.date_rule,
            locale_tags: &config.locale_date_tags,
        }
    }

    pub fn resolve(&self, file: &MediaFile, kind: MediaKind) -> ResolvedDate {
        let candidates = self.candidates(file, kind);
        select(self.rule, &candidates).unwrap_or_else(|| mtime_candidate(file).into())
    }

    /// Candidates in producer order: metadata, filename, mtime.
    pub fn candidates(&self, file: &MediaFile, kind: MediaKind) -> Vec<DateCandidate> {
        [
            self.metadata_candidate(file, kind),
            filename_candidate(file),
            Some(mtime_candidate(file)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn metadata_candidate(&self, file: &MediaFile, kind: MediaKind) -> Option<DateCandidate> {
        if !kind.has_embedded_metadata() {
            return None;
        }
        read_capture_date(&file.path, self.locale_tags).map(|when| DateCandidate {
            when,
            source: DateSource::Metadata,
        })
    }
}

fn filename_candidate(file: &MediaFile) -> Option<DateCandidate> {
    date_from_filename(&file.file_name()).map(|when| DateCandidate {
        when,
        source: DateSource::Filename,
    })
}

fn mtime_candidate(file: &MediaFile) -> DateCandidate {
    DateCandidate {
        when: file.modified,
        source: DateSource::Mtime,
    }
}

impl From<DateCandidate> for ResolvedDate {
    fn from(candidate: DateCandidate) -> Self {
        Self {
            when: candidate.when,
            source: candidate.source,
        }
    }
}

/// Ties keep the earlier producer. `None` only for an empty candidate list.
pub fn select(rule: DateRule, candidates: &[DateCandidate]) -> Option<ResolvedDate> {
    let chosen = match rule {
        DateRule::Earliest => candidates.iter().min_by_key(|c| c.when),
        DateRule::MostSpecific => candidates.first(),
    };
    chosen.copied().map(ResolvedDate::from)
}
