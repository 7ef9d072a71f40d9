//! # neurotwin
//!
//! An append-only similarity store for neurochemical profile vectors.
//!
//! Each profile is a 5-dimensional vector (dopamine, serotonin, oxytocin, GABA, cortisol)
//! paired with a metadata record. Vectors live in an exact L2 [`FlatL2Index`], records in
//! a JSON metadata ledger, and the [`ProfileStore`] keeps the two aligned on disk.
//!
//! ```rust,no_run
//! use neurotwin::{Filters, NewProfile, ProfileStore, StoreConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ProfileStore::open(StoreConfig::in_dir("vector_store"))?;
//! let record = store.add_profile(
//!     &[0.6, 0.5, 0.4, 0.7, 0.3],
//!     NewProfile::new("Ada Lovelace", "female", "adult", "25-40"),
//! )?;
//! let matches = store.find_similar(&[0.6, 0.5, 0.4, 0.7, 0.3], 5, &Filters::new())?;
//! assert_eq!(matches[0].record.vector_id, record.vector_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod index;
pub mod ledger;
pub mod persistence;
pub mod profile;
pub mod store;

pub use config::StoreConfig;
pub use errors::{NeuroTwinError, NeuroTwinResult};
pub use index::flat::FlatL2Index;
pub use ledger::{LoadReport, ProfileRecord};
pub use persistence::PersistenceError;
pub use profile::{
    life_stage_for_age, parse_timestamp, user_id_for, Dimension, NewProfile, Neurotransmitters,
};
pub use store::{Filters, ProfileMatch, ProfileStore, StoreInfo};

/// Number of components in every neurochemical vector.
pub const VECTOR_DIMENSION: usize = 5;

/// A single nearest-neighbor hit: the vector's position in the index and its L2 distance
/// to the query.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SearchResult {
    pub position: usize,
    pub distance: f64,
}

/// Append-only vector index addressed by insertion position.
pub trait VectorIndex {
    fn append(&mut self, values: &[f64]) -> NeuroTwinResult<usize>;
    fn search(&self, query: &[f64], k: usize) -> Vec<SearchResult>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn get_vector(&self, position: usize) -> Option<&[f64]>;
    fn dimension(&self) -> usize;
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical_vectors() {
        let a = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(euclidean_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_known_value() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_euclidean_distance_is_symmetric() {
        let a = vec![1.0, 0.5, 0.0];
        let b = vec![0.2, 0.9, 0.4];
        assert!((euclidean_distance(&a, &b) - euclidean_distance(&b, &a)).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "Vectors must have the same length")]
    fn test_euclidean_distance_length_mismatch_panics() {
        euclidean_distance(&[1.0, 2.0], &[1.0]);
    }
}
