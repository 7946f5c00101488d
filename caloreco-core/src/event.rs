//! Per-event input and output containers.

use crate::cluster::ClusterCollection;
use crate::clustering::ProtoCluster;
use crate::hit::{Hit, SimHit};
use crate::particle::{ParticleAssociation, ReconstructedParticle};
use crate::truth::TruthParticle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hit collections of one detector.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorHits {
    /// Detector name, matched against the configured detectors.
    pub detector: String,
    /// Reconstructed hits.
    pub hits: Vec<Hit>,
    /// Truth-level hits, when available.
    pub sim_hits: Option<Vec<SimHit>>,
}

impl DetectorHits {
    /// Reconstructed hits without truth hits.
    #[must_use]
    pub fn new(detector: impl Into<String>, hits: Vec<Hit>) -> Self {
        Self {
            detector: detector.into(),
            hits,
            sim_hits: None,
        }
    }

    /// Attaches truth hits.
    #[must_use]
    pub fn with_sim_hits(mut self, sim_hits: Vec<SimHit>) -> Self {
        self.sim_hits = Some(sim_hits);
        self
    }
}

/// Everything the reconstruction consumes for one event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Event {
    /// Event number.
    pub number: u64,
    /// Per-detector hit collections.
    pub detectors: Vec<DetectorHits>,
    /// Truth particles.
    pub truth_particles: Vec<TruthParticle>,
    /// Charged particles from tracking.
    pub charged_particles: Vec<ReconstructedParticle>,
    /// Truth associations of the charged particles.
    pub charged_associations: Vec<ParticleAssociation>,
}

impl Event {
    /// Hits of the named detector.
    #[must_use]
    pub fn detector(&self, name: &str) -> Option<&DetectorHits> {
        self.detectors.iter().find(|d| d.detector == name)
    }
}

/// Reconstruction output of one detector.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorOutput {
    /// Detector name.
    pub detector: String,
    /// Island proto-clusters.
    pub proto_clusters: Vec<ProtoCluster>,
    /// Clusters built from the island proto-clusters.
    pub clusters: ClusterCollection,
    /// Clusters built from truth-seeded proto-clusters, when configured.
    pub truth_clusters: Option<ClusterCollection>,
}

/// Reconstruction output of one event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventOutput {
    /// Event number.
    pub number: u64,
    /// Per-detector outputs, in configuration order.
    pub detectors: Vec<DetectorOutput>,
    /// Charged particles followed by synthesized neutrals.
    pub particles: Vec<ReconstructedParticle>,
    /// Truth associations of `particles`.
    pub associations: Vec<ParticleAssociation>,
}
