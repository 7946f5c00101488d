//! Reconstructed clusters and their truth associations.

use crate::hit::McId;
use crate::vector::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A reconstructed calorimeter cluster.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Corrected energy, always positive.
    pub energy: f64,
    /// Energy uncertainty (not estimated yet, zero).
    pub energy_error: f64,
    /// Weighted centroid.
    pub position: Vector3,
    /// Polar angle of the centroid direction.
    pub intrinsic_theta: f64,
    /// Azimuth of the centroid direction.
    pub intrinsic_phi: f64,
    /// Energy-weighted mean hit time.
    pub time: f64,
    /// Energy-weighted spread of hit times.
    pub time_error: f64,
    /// Number of contributing hits.
    pub n_hits: usize,
    /// RMS distance of the hits from the centroid, `sqrt(Σ|Δ|²/(n-1))`.
    pub radius: f64,
    /// Position-weighted RMS distance of the hits from the centroid.
    pub dispersion: f64,
    /// Indices of the contributing hits.
    pub hits: Vec<usize>,
    /// Weighted energy each hit contributes, parallel to `hits`.
    pub hit_contributions: Vec<f64>,
    /// Index of the proto-cluster this cluster was built from.
    pub proto_cluster: usize,
}

impl Cluster {
    /// Pseudorapidity of the centroid.
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.position.eta()
    }
}

/// Relation between a cluster and the truth particle it is attributed to.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterAssociation {
    /// Index of the cluster in its collection.
    pub rec: usize,
    /// Attributed truth particle.
    pub sim: McId,
    /// Fraction of the cluster's raw energy deposited by that particle.
    pub weight: f64,
}

/// Clusters of one detector together with their truth associations.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterCollection {
    /// Clusters in proto-cluster order.
    pub clusters: Vec<Cluster>,
    /// Associations; `rec` indexes into `clusters`.
    pub associations: Vec<ClusterAssociation>,
}

impl ClusterCollection {
    /// Returns the number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns true if there are no clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// First association of the cluster at `index`.
    #[must_use]
    pub fn association_for(&self, index: usize) -> Option<&ClusterAssociation> {
        self.associations.iter().find(|assoc| assoc.rec == index)
    }

    /// Sum of all cluster energies.
    #[must_use]
    pub fn total_energy(&self) -> f64 {
        self.clusters.iter().map(|c| c.energy).sum()
    }
}
