//! # Profile Module
//!
//! The neurochemical profile model: the five canonical axes, the clamped level set that
//! produces a store vector, and the partial record a caller hands to
//! [`crate::ProfileStore::add_profile`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{NeuroTwinError, NeuroTwinResult};
use crate::VECTOR_DIMENSION;

/// Length of the hex prefix used as a user id.
pub const USER_ID_LEN: usize = 8;

/// The vector axes, in the order they appear in every stored vector.
///
/// The order is part of the on-disk format. Reordering it makes every persisted
/// distance meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Dopamine,
    Serotonin,
    Oxytocin,
    #[serde(rename = "GABA")]
    Gaba,
    Cortisol,
}

impl Dimension {
    pub const ALL: [Dimension; VECTOR_DIMENSION] = [
        Dimension::Dopamine,
        Dimension::Serotonin,
        Dimension::Oxytocin,
        Dimension::Gaba,
        Dimension::Cortisol,
    ];

    pub fn position(self) -> usize {
        match self {
            Dimension::Dopamine => 0,
            Dimension::Serotonin => 1,
            Dimension::Oxytocin => 2,
            Dimension::Gaba => 3,
            Dimension::Cortisol => 4,
        }
    }
}

/// Simulated neurotransmitter levels for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Neurotransmitters {
    pub dopamine: f64,
    pub serotonin: f64,
    pub oxytocin: f64,
    #[serde(rename = "GABA")]
    pub gaba: f64,
    pub cortisol: f64,
}

impl Neurotransmitters {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Dopamine => self.dopamine,
            Dimension::Serotonin => self.serotonin,
            Dimension::Oxytocin => self.oxytocin,
            Dimension::Gaba => self.gaba,
            Dimension::Cortisol => self.cortisol,
        }
    }

    /// Every level pulled into `[0.0, 1.0]`. NaN becomes 0.
    pub fn clamped(&self) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            dopamine: clamp(self.dopamine),
            serotonin: clamp(self.serotonin),
            oxytocin: clamp(self.oxytocin),
            gaba: clamp(self.gaba),
            cortisol: clamp(self.cortisol),
        }
    }

    pub fn to_vector(&self) -> [f64; VECTOR_DIMENSION] {
        Dimension::ALL.map(|d| self.get(d))
    }

    /// Inverse of [`Neurotransmitters::to_vector`].
    pub fn from_vector(values: [f64; VECTOR_DIMENSION]) -> Self {
        Self {
            dopamine: values[Dimension::Dopamine.position()],
            serotonin: values[Dimension::Serotonin.position()],
            oxytocin: values[Dimension::Oxytocin.position()],
            gaba: values[Dimension::Gaba.position()],
            cortisol: values[Dimension::Cortisol.position()],
        }
    }
}

/// Short deterministic id for a display name: the first 8 hex digits of its SHA-256.
///
/// Two people with the same display name get the same id. Nothing here tries to tell
/// them apart.
pub fn user_id_for(display_name: &str) -> String {
    let digest = Sha256::digest(display_name.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(USER_ID_LEN);
    id
}

pub fn life_stage_for_age(age: u32) -> &'static str {
    match age {
        0..=12 => "child",
        13..=17 => "teen",
        18..=29 => "young_adult",
        30..=49 => "adult",
        _ => "senior",
    }
}

/// Parse an ISO-8601 timestamp. Strings without an offset, as older ledgers hold them,
/// are taken as UTC.
pub fn parse_timestamp(s: &str) -> NeuroTwinResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| NeuroTwinError::InvalidArgument(format!("invalid timestamp '{}': {}", s, e)))
}

/// A profile record before the store assigns its `vector_id` and `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub display_name: String,
    pub gender_label: String,
    pub life_stage: String,
    pub age_range: String,
    /// Commit time is used when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewProfile {
    pub fn new(
        display_name: impl Into<String>,
        gender_label: impl Into<String>,
        life_stage: impl Into<String>,
        age_range: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            gender_label: gender_label.into(),
            life_stage: life_stage.into(),
            age_range: age_range.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
