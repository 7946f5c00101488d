//! Reconstructed particles and their truth associations.

use crate::hit::McId;
use crate::vector::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference to a cluster in one of the event's cluster collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterRef {
    /// Position of the collection in the matcher input.
    pub collection: usize,
    /// Index of the cluster within that collection.
    pub index: usize,
}

/// A reconstructed particle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconstructedParticle {
    /// PDG hypothesis (0 when unidentified).
    pub pdg: i32,
    /// Electric charge.
    pub charge: f64,
    /// Energy.
    pub energy: f64,
    /// Mass hypothesis.
    pub mass: f64,
    /// Three-momentum.
    pub momentum: Vector3,
    /// Reference point (vertex).
    pub reference_point: Vector3,
    /// True for particles that came out of tracking, false for neutrals
    /// synthesized from clusters.
    pub from_tracking: bool,
    /// Confidence in the particle hypothesis.
    pub goodness_of_pid: f64,
    /// Clusters attached to the particle.
    pub clusters: Vec<ClusterRef>,
}

impl ReconstructedParticle {
    /// A charged particle from tracking with the given momentum and mass.
    #[must_use]
    pub fn charged(pdg: i32, charge: f64, momentum: Vector3, mass: f64) -> Self {
        Self {
            pdg,
            charge,
            energy: (momentum.dot(&momentum) + mass * mass).sqrt(),
            mass,
            momentum,
            reference_point: Vector3::ZERO,
            from_tracking: true,
            goodness_of_pid: 0.0,
            clusters: Vec::new(),
        }
    }

    /// Momentum magnitude.
    #[must_use]
    pub fn p(&self) -> f64 {
        self.momentum.magnitude()
    }
}

/// Relation between a reconstructed particle and a truth particle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleAssociation {
    /// Index of the reconstructed particle in its collection.
    pub rec: usize,
    /// Associated truth particle.
    pub sim: McId,
    /// Association weight.
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_charged_particle() {
        let p = ReconstructedParticle::charged(-11, -1.0, Vector3::new(0.0, 3.0, 4.0), 0.000_511);
        assert!(p.from_tracking);
        assert_relative_eq!(p.p(), 5.0);
        assert!(p.energy > p.p());
        assert!(p.clusters.is_empty());
    }
}
