//! # Index Module
//!
//! Vector index implementations behind the [`crate::VectorIndex`] trait.
//!
//! ### FlatL2Index
//! - **Complexity**: O(n) scan per search, O(1) insert
//! - **Distance**: Euclidean (L2), ascending
//! - **Use Case**: the profile store; exact, deterministic results with position
//!   tie-breaking

pub mod flat;
