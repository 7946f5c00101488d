//! caloreco-algorithms: Calorimeter reconstruction stages.
//!
//! This crate provides the reconstruction chain:
//! - **Island clustering** - connected components of adjacent hits, with
//!   splitting at local energy maxima
//! - **Truth clustering** - hits grouped by the particle that produced them
//! - **Cluster building** - centroid-of-gravity energy, position and shape
//! - **Matching** - charged particles plus neutrals synthesized from clusters
//!
#![warn(missing_docs)]

mod cog;
mod island;
mod matching;
mod processing;
mod truth;
mod union_find;

pub use cog::{ClusterBuilder, TruthAttribution};
pub use island::IslandClustering;
pub use matching::{ClusterMatcher, DuplicatePolicy, MatchConfig, MatchingResults};
pub use processing::{DetectorConfig, Reconstruction, ReconstructionConfig};
pub use truth::TruthClustering;

// Re-export the clustering trait
pub use caloreco_core::clustering::{ClusteringInput, ProtoClustering};
