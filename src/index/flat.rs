//! # Flat L2 Index
//!
//! Stores vectors contiguously in insertion order and answers nearest-neighbor queries
//! by exhaustive Euclidean distance.
//!
//! ## Performance Characteristics
//!
//! - **Search Complexity**: O(n log n) - every vector is scored, then sorted
//! - **Insert Complexity**: O(1) amortized - append to end of buffer
//! - **Accuracy**: exact
//!
//! Profiles are small (5 dimensions) and arrive one per request, so a flat scan is the
//! right trade-off here.
//!
//! # Examples
//!
//! ```rust
//! use neurotwin::{FlatL2Index, VectorIndex};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = FlatL2Index::new(5);
//! let position = index.append(&[0.5, 0.5, 0.5, 0.5, 0.5])?;
//! assert_eq!(position, 0);
//! let results = index.search(&[0.5, 0.5, 0.5, 0.5, 0.4], 3);
//! assert_eq!(results[0].position, 0);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tracing::debug;

use crate::errors::{NeuroTwinError, NeuroTwinResult};
use crate::persistence::{self, IndexFile, PersistenceError};
use crate::{euclidean_distance, SearchResult, VectorIndex, VECTOR_DIMENSION};

/// Exact L2 index over fixed-dimension vectors, addressed by insertion position.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    /// Dimension of vectors stored in this index
    dim: usize,
    /// `len() * dim` values, vector after vector
    data: Vec<f64>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    /// Load the index at `path`, or start an empty one when the file does not exist.
    ///
    /// A file that exists but does not decode as a [`VECTOR_DIMENSION`]-wide index is
    /// reported as [`NeuroTwinError::CorruptIndex`].
    pub fn open(path: &Path) -> NeuroTwinResult<Self> {
        let Some(bytes) = persistence::read_if_exists(path)? else {
            debug!("No index at {}, starting empty", path.display());
            return Ok(Self::new(VECTOR_DIMENSION));
        };

        let file = persistence::decode_index(&bytes).map_err(|e| match e {
            PersistenceError::Io(io) => NeuroTwinError::PersistenceError(PersistenceError::Io(io)),
            other => NeuroTwinError::CorruptIndex(format!("{}: {}", path.display(), other)),
        })?;

        if file.dimension as usize != VECTOR_DIMENSION {
            return Err(NeuroTwinError::CorruptIndex(format!(
                "{}: expected dimension {}, found {}",
                path.display(),
                VECTOR_DIMENSION,
                file.dimension
            )));
        }

        debug!("Loaded {} vectors from {}", file.count, path.display());
        Ok(Self {
            dim: file.dimension as usize,
            data: file.values,
        })
    }

    /// Write the whole index to `path`.
    pub fn persist(&self, path: &Path) -> Result<(), PersistenceError> {
        let bytes = persistence::encode_index(&IndexFile::new(self.dim, self.data.clone()))?;
        persistence::write_atomic(path, &bytes)
    }

    /// Drop every vector at position `len` and beyond.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dim);
    }
}

impl VectorIndex for FlatL2Index {
    fn append(&mut self, values: &[f64]) -> NeuroTwinResult<usize> {
        if values.len() != self.dim {
            return Err(NeuroTwinError::DimensionMismatch {
                expected: self.dim,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(NeuroTwinError::InvalidArgument(
                "vector components must be finite".to_string(),
            ));
        }
        let position = self.len();
        self.data.extend_from_slice(values);
        Ok(position)
    }

    fn search(&self, query: &[f64], k: usize) -> Vec<SearchResult> {
        if k == 0 || self.dim == 0 || query.len() != self.dim {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, values)| SearchResult {
                position,
                distance: euclidean_distance(values, query),
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        results.truncate(k);
        results
    }

    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn get_vector(&self, position: usize) -> Option<&[f64]> {
        let start = position.checked_mul(self.dim)?;
        let end = start.checked_add(self.dim)?;
        self.data.get(start..end)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
