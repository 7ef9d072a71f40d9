//! # Profile Store
//!
//! The vector index and the metadata ledger behind one lock. This is the only type that
//! touches the two store files.
//!
//! # Thread Safety
//!
//! State sits in a `RwLock`. [`ProfileStore::add_profile`] holds the write lock for the
//! whole assign-id, append, persist sequence, so ids are handed out gap-free and in call
//! order. [`ProfileStore::find_similar`] takes the read lock; searches run concurrently
//! and always see index and ledger at the same length.
//!
//! # Commit Protocol
//!
//! Each add rewrites the index file and then the ledger file, both via write-then-rename.
//! The ledger rename is the commit point. If the process dies between the two, the index
//! on disk is one vector ahead of the ledger, and [`ProfileStore::open`] trims that
//! uncommitted tail, unless the ledger load dropped malformed entries: then the extra
//! vectors may be committed profiles and open fails instead. Ledger repairs are only
//! written back once the ledger is known to line up with the index. A failed write rolls
//! the in-memory state back before the lock is released.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::{NeuroTwinError, NeuroTwinResult, ToLockError};
use crate::index::flat::FlatL2Index;
use crate::ledger::{self, LoadReport, ProfileRecord};
use crate::persistence::PersistenceError;
use crate::profile::NewProfile;
use crate::{VectorIndex, VECTOR_DIMENSION};

/// Exact-match metadata filters, ANDed together. Keys are record field names.
pub type Filters = BTreeMap<String, String>;

/// A stored profile returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileMatch {
    #[serde(flatten)]
    pub record: ProfileRecord,
    /// L2 distance to the query vector
    pub distance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub vector_count: usize,
    pub record_count: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Debug)]
struct StoreState {
    index: FlatL2Index,
    ledger: Vec<ProfileRecord>,
}

pub struct ProfileStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
    load_report: LoadReport,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("index_path", &self.config.index_path)
            .field("metadata_path", &self.config.metadata_path)
            .finish()
    }
}

fn check_dimension(values: &[f64]) -> NeuroTwinResult<()> {
    if values.len() != VECTOR_DIMENSION {
        return Err(NeuroTwinError::DimensionMismatch {
            expected: VECTOR_DIMENSION,
            actual: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(NeuroTwinError::InvalidArgument(
            "vector components must be finite".to_string(),
        ));
    }
    Ok(())
}

fn check_filters(filters: &Filters) -> NeuroTwinResult<()> {
    for key in filters.keys() {
        if key.is_empty() {
            return Err(NeuroTwinError::InvalidArgument("filter key must not be empty".to_string()));
        }
        if !ProfileRecord::is_known_field(key) {
            return Err(NeuroTwinError::InvalidArgument(format!(
                "unknown filter key '{}'",
                key
            )));
        }
    }
    Ok(())
}

fn matches_filters(record: &ProfileRecord, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(key, expected)| record.field(key).as_deref() == Some(expected.as_str()))
}

impl StoreState {
    fn persist(&self, config: &StoreConfig) -> Result<(), PersistenceError> {
        self.index.persist(&config.index_path)?;
        ledger::save(&self.ledger, &config.metadata_path)
    }

    fn commit(
        &mut self,
        config: &StoreConfig,
        values: &[f64],
        profile: NewProfile,
    ) -> NeuroTwinResult<ProfileRecord> {
        let committed = self.ledger.len();
        let record = ProfileRecord::from_new(profile, committed as u64);

        let position = self.index.append(values)?;
        debug_assert_eq!(position, committed);
        self.ledger = ledger::append(std::mem::take(&mut self.ledger), record.clone());

        if let Err(e) = self.persist(config) {
            self.rollback(config, committed);
            return Err(e.into());
        }

        Ok(record)
    }

    fn rollback(&mut self, config: &StoreConfig, len: usize) {
        self.index.truncate(len);
        self.ledger.truncate(len);
        // The index file may already hold the staged vector. Open trims it anyway.
        if let Err(e) = self.index.persist(&config.index_path) {
            warn!(
                "Could not restore {} after failed commit: {}",
                config.index_path.display(),
                e
            );
        }
    }
}

impl ProfileStore {
    /// Open the store described by `config`, creating it empty when neither file exists.
    pub fn open(config: StoreConfig) -> NeuroTwinResult<Self> {
        config.validate()?;

        let mut index = FlatL2Index::open(&config.index_path)?;
        // Nothing is rewritten until the ledger is known to line up with the index.
        let (records, load_report) = ledger::read(&config.metadata_path)?;

        if let Some((position, record)) = records
            .iter()
            .enumerate()
            .find(|(position, record)| record.vector_id != *position as u64)
        {
            return Err(NeuroTwinError::InconsistentStore(format!(
                "ledger entry {} in {} has vector_id {}",
                position,
                config.metadata_path.display(),
                record.vector_id
            )));
        }

        if records.len() > index.len() {
            return Err(NeuroTwinError::InconsistentStore(format!(
                "{} holds {} records but {} holds only {} vectors",
                config.metadata_path.display(),
                records.len(),
                config.index_path.display(),
                index.len()
            )));
        }

        if index.len() > records.len() && load_report.dropped > 0 {
            return Err(NeuroTwinError::InconsistentStore(format!(
                "{} holds {} vectors but {} dropped {} malformed entries",
                config.index_path.display(),
                index.len(),
                config.metadata_path.display(),
                load_report.dropped
            )));
        }

        if load_report.repaired > 0 {
            info!(
                "Repaired {} ledger records in {}, rewriting",
                load_report.repaired,
                config.metadata_path.display()
            );
            ledger::save(&records, &config.metadata_path)?;
        }

        if index.len() > records.len() {
            warn!(
                "Discarding {} uncommitted vectors from {}",
                index.len() - records.len(),
                config.index_path.display()
            );
            index.truncate(records.len());
            index.persist(&config.index_path)?;
        }

        info!(
            "Opened profile store with {} profiles ({}, {})",
            records.len(),
            config.index_path.display(),
            config.metadata_path.display()
        );

        Ok(Self {
            config,
            state: RwLock::new(StoreState { index, ledger: records }),
            load_report,
        })
    }

    /// Store a profile vector with its metadata and return the committed record.
    ///
    /// The record's `vector_id` is the number of profiles stored before this call. Both
    /// files are durable when this returns `Ok`. On error nothing is stored.
    pub fn add_profile(&self, values: &[f64], profile: NewProfile) -> NeuroTwinResult<ProfileRecord> {
        check_dimension(values)?;

        let mut state = self.state.write().to_lock_error("add_profile")?;
        let record = state.commit(&self.config, values, profile)?;

        debug!(
            "Committed profile {} (user {}) at position {}",
            record.display_name, record.user_id, record.vector_id
        );
        Ok(record)
    }

    /// The `k` nearest stored profiles to `query`, nearest first, then narrowed by
    /// `filters`.
    ///
    /// Filtering happens after the `k` nearest are chosen, so fewer than `k` matches can
    /// come back even when more matching profiles exist further away.
    pub fn find_similar(
        &self,
        query: &[f64],
        k: usize,
        filters: &Filters,
    ) -> NeuroTwinResult<Vec<ProfileMatch>> {
        if k == 0 {
            return Err(NeuroTwinError::InvalidArgument("k must be positive".to_string()));
        }
        check_dimension(query)?;
        check_filters(filters)?;

        let state = self.state.read().to_lock_error("find_similar")?;
        let matches: Vec<ProfileMatch> = state
            .index
            .search(query, k)
            .into_iter()
            .filter_map(|hit| {
                state.ledger.get(hit.position).map(|record| ProfileMatch {
                    record: record.clone(),
                    distance: hit.distance,
                })
            })
            .filter(|m| matches_filters(&m.record, filters))
            .collect();

        debug!("find_similar k={} filters={:?} -> {} matches", k, filters, matches.len());
        Ok(matches)
    }

    pub fn get(&self, vector_id: u64) -> NeuroTwinResult<Option<ProfileRecord>> {
        let state = self.state.read().to_lock_error("get")?;
        Ok(usize::try_from(vector_id)
            .ok()
            .and_then(|position| state.ledger.get(position))
            .cloned())
    }

    /// The stored vector for `vector_id`, in canonical dimension order.
    pub fn vector(&self, vector_id: u64) -> NeuroTwinResult<Option<Vec<f64>>> {
        let state = self.state.read().to_lock_error("vector")?;
        Ok(usize::try_from(vector_id)
            .ok()
            .and_then(|position| state.index.get_vector(position))
            .map(<[f64]>::to_vec))
    }

    /// Snapshot of every record, in insertion order.
    pub fn records(&self) -> NeuroTwinResult<Vec<ProfileRecord>> {
        let state = self.state.read().to_lock_error("records")?;
        Ok(state.ledger.clone())
    }

    pub fn len(&self) -> NeuroTwinResult<usize> {
        let state = self.state.read().to_lock_error("len")?;
        Ok(state.ledger.len())
    }

    pub fn is_empty(&self) -> NeuroTwinResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn info(&self) -> NeuroTwinResult<StoreInfo> {
        let state = self.state.read().to_lock_error("info")?;
        Ok(StoreInfo {
            vector_count: state.index.len(),
            record_count: state.ledger.len(),
            dimension: state.index.dimension(),
            index_path: self.config.index_path.clone(),
            metadata_path: self.config.metadata_path.clone(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// What the ledger load at open time dropped or repaired.
    pub fn load_report(&self) -> LoadReport {
        self.load_report
    }

    /// Release the store. Every committed profile is already on disk.
    pub fn close(self) {
        debug!("Closing profile store at {}", self.config.metadata_path.display());
    }
}
