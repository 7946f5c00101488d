//! caloreco-core: Core types for calorimeter reconstruction.
//!
//! This crate provides the data model (hits, proto-clusters, clusters,
//! truth and reconstructed particles, associations), the lookup tables
//! over it, and the configuration of the reconstruction stages.
//!

pub mod cluster;
pub mod clustering;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hit;
pub mod index;
pub mod particle;
pub mod reco;
pub mod truth;
pub mod units;
pub mod vector;

pub use cluster::{Cluster, ClusterAssociation, ClusterCollection};
pub use clustering::{ClusteringInput, DistanceMetric, IslandConfig, ProtoCluster, ProtoClustering};
pub use error::{Error, Result};
pub use event::{DetectorHits, DetectorOutput, Event, EventOutput};
pub use geometry::{ConstantTable, GeometryService};
pub use hit::{CellId, Contribution, Hit, McId, SimHit};
pub use index::{HitIndex, TruthGroup};
pub use particle::{ClusterRef, ParticleAssociation, ReconstructedParticle};
pub use reco::{CogConfig, EnergyWeight};
pub use truth::{TruthParticle, TruthTable, GENERATOR_STATUS_FINAL_STATE};
pub use vector::Vector3;
