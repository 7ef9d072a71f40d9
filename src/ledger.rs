//! # Metadata Ledger
//!
//! The ordered list of profile records, one per indexed vector. Record `i` describes
//! vector `i`, so the ledger is only ever appended to.
//!
//! ## File Format
//!
//! A pretty-printed JSON array. Field names match the metadata files written by earlier
//! deployments of the service:
//!
//! ```json
//! [
//!   {
//!     "name": "Ada Lovelace",
//!     "gender": "female",
//!     "life_stage": "adult",
//!     "age_range": "25-40",
//!     "timestamp": "2025-01-21T10:00:00.000000Z",
//!     "vector_id": 0,
//!     "user_id": "6b1b36cb"
//!   }
//! ]
//! ```
//!
//! Loading is forgiving: malformed entries are dropped and counted, and records written
//! before `timestamp`, `user_id` or `age_range` existed are back-filled.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::persistence::{self, PersistenceError};
use crate::profile::{user_id_for, NewProfile};

pub const UNKNOWN_AGE_RANGE: &str = "unknown";

/// Record keys accepted by [`ProfileRecord::field`], as stored on disk.
pub const FIELD_NAMES: [&str; 7] = [
    "name",
    "gender",
    "life_stage",
    "age_range",
    "timestamp",
    "vector_id",
    "user_id",
];

/// Metadata for one stored profile vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "gender")]
    pub gender_label: String,
    pub life_stage: String,
    pub age_range: String,
    /// ISO-8601, kept verbatim from whatever wrote it
    pub timestamp: String,
    /// Position of the matching vector in the index
    pub vector_id: u64,
    pub user_id: String,
}

/// Lenient on-disk shape; anything that fails to parse as this is dropped.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    name: String,
    gender: String,
    life_stage: String,
    #[serde(default)]
    age_range: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    vector_id: u64,
    #[serde(default)]
    user_id: Option<String>,
}

/// What [`load`] had to do to the file it read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries that were not well-formed records
    pub dropped: usize,
    /// Records that had a missing field filled in
    pub repaired: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.dropped == 0 && self.repaired == 0
    }
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ProfileRecord {
    /// Complete a caller-supplied profile with its ledger position.
    pub fn from_new(profile: NewProfile, vector_id: u64) -> Self {
        let timestamp = profile
            .timestamp
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_else(now_timestamp);
        let user_id = user_id_for(&profile.display_name);

        Self {
            display_name: profile.display_name,
            gender_label: profile.gender_label,
            life_stage: profile.life_stage,
            age_range: profile.age_range,
            timestamp,
            vector_id,
            user_id,
        }
    }

    /// Look up a field by its stored name. The descriptive Rust names
    /// (`display_name`, `gender_label`) are accepted as aliases.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "name" | "display_name" => Some(self.display_name.clone()),
            "gender" | "gender_label" => Some(self.gender_label.clone()),
            "life_stage" => Some(self.life_stage.clone()),
            "age_range" => Some(self.age_range.clone()),
            "timestamp" => Some(self.timestamp.clone()),
            "vector_id" => Some(self.vector_id.to_string()),
            "user_id" => Some(self.user_id.clone()),
            _ => None,
        }
    }

    pub fn is_known_field(key: &str) -> bool {
        FIELD_NAMES.contains(&key) || key == "display_name" || key == "gender_label"
    }
}

fn repair(stored: StoredRecord) -> (ProfileRecord, bool) {
    let mut repaired = false;

    let timestamp = stored.timestamp.unwrap_or_else(|| {
        repaired = true;
        now_timestamp()
    });
    let user_id = stored.user_id.unwrap_or_else(|| {
        repaired = true;
        user_id_for(&stored.name)
    });
    let age_range = stored.age_range.unwrap_or_else(|| {
        repaired = true;
        UNKNOWN_AGE_RANGE.to_string()
    });

    let record = ProfileRecord {
        display_name: stored.name,
        gender_label: stored.gender,
        life_stage: stored.life_stage,
        age_range,
        timestamp,
        vector_id: stored.vector_id,
        user_id,
    };
    (record, repaired)
}

/// Read the ledger at `path`. A missing file is an empty ledger.
///
/// Records that needed repair are written back before returning, so the file on disk
/// matches what the caller sees.
pub fn load(path: &Path) -> Result<(Vec<ProfileRecord>, LoadReport), PersistenceError> {
    let (records, report) = read(path)?;
    if report.repaired > 0 {
        info!("Repaired {} ledger records in {}, rewriting", report.repaired, path.display());
        save(&records, path)?;
    }
    Ok((records, report))
}

/// Parse and repair the ledger at `path` without touching the file.
///
/// Callers that must validate the records before anything is rewritten use this and
/// [`save`] separately.
pub fn read(path: &Path) -> Result<(Vec<ProfileRecord>, LoadReport), PersistenceError> {
    let Some(bytes) = persistence::read_if_exists(path)? else {
        return Ok((Vec::new(), LoadReport::default()));
    };

    let entries = match serde_json::from_slice::<Value>(&bytes)? {
        Value::Array(entries) => entries,
        other => {
            return Err(PersistenceError::InvalidFormat(format!(
                "{}: expected a JSON array of records, found {}",
                path.display(),
                json_kind(&other)
            )))
        }
    };

    let mut report = LoadReport::default();
    let mut records = Vec::with_capacity(entries.len());

    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<StoredRecord>(entry) {
            Ok(stored) => {
                let (record, repaired) = repair(stored);
                if repaired {
                    report.repaired += 1;
                }
                records.push(record);
            }
            Err(e) => {
                warn!("Dropping malformed ledger entry {} in {}: {}", position, path.display(), e);
                report.dropped += 1;
            }
        }
    }

    if report.dropped > 0 {
        warn!("Dropped {} malformed entries from {}", report.dropped, path.display());
    }

    Ok((records, report))
}

/// Overwrite the ledger at `path` with `records`.
pub fn save(records: &[ProfileRecord], path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(records)?;
    persistence::write_atomic(path, &json)
}

/// Append without persisting.
pub fn append(mut records: Vec<ProfileRecord>, record: ProfileRecord) -> Vec<ProfileRecord> {
    records.push(record);
    records
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
