//! Cluster-to-truth matching and neutral particle synthesis.
//!
//! Charged particles from tracking pass through unchanged. Every neutral,
//! final-state truth particle that left a cluster but has no charged track
//! attributed to it becomes a neutral reconstructed particle built from
//! that cluster.

use caloreco_core::{
    Cluster, ClusterAssociation, ClusterCollection, ClusterRef, Error, McId, ParticleAssociation,
    ReconstructedParticle, Result, TruthParticle, TruthTable, Vector3,
};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace, warn};

/// Which cluster a truth particle keeps when several are attributed to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// The cluster indexed last wins.
    #[default]
    LastIndexed,
    /// The more energetic cluster wins.
    HighestEnergy,
}

/// Configuration for [`ClusterMatcher`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    /// Resolution of truth particles with several clusters.
    pub duplicate_policy: DuplicatePolicy,
}

impl MatchConfig {
    /// Sets the duplicate policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Final particle list of one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingResults {
    /// Charged particles in input order, then neutrals in truth order.
    pub particles: Vec<ReconstructedParticle>,
    /// Truth associations; `rec` indexes into `particles`.
    pub associations: Vec<ParticleAssociation>,
}

#[derive(Debug, Clone, Copy)]
struct IndexedCluster<'a> {
    reference: ClusterRef,
    cluster: &'a Cluster,
    weight: f64,
}

/// Matches clusters to truth particles and synthesizes neutrals.
#[derive(Debug, Clone, Default)]
pub struct ClusterMatcher {
    config: MatchConfig,
}

impl ClusterMatcher {
    /// Creates a matcher.
    #[must_use]
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Runs the matching.
    ///
    /// `clusters[i]` and `cluster_associations[i]` describe the same
    /// collection; `ClusterRef::collection` is `i`.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if the cluster and association
    /// collection lists differ in length.
    #[instrument(
        name = "matcher.execute",
        skip_all,
        fields(truth = truth.len(), charged = charged.len(), collections = clusters.len())
    )]
    pub fn execute(
        &self,
        truth: &[TruthParticle],
        charged: &[ReconstructedParticle],
        charged_associations: &[ParticleAssociation],
        clusters: &[&[Cluster]],
        cluster_associations: &[&[ClusterAssociation]],
    ) -> Result<MatchingResults> {
        if clusters.len() != cluster_associations.len() {
            return Err(Error::LengthMismatch {
                what: "cluster association collections",
                expected: clusters.len(),
                actual: cluster_associations.len(),
            });
        }

        let table = TruthTable::new(truth);
        let indexed = self.index_clusters(&table, clusters, cluster_associations);

        let mut results = MatchingResults {
            particles: charged.to_vec(),
            associations: charged_associations.to_vec(),
        };

        let mut tracked: HashSet<McId> = HashSet::with_capacity(charged_associations.len());
        for assoc in charged_associations {
            if !table.contains(assoc.sim) {
                warn!(mc_id = %assoc.sim, "charged association references unknown truth particle");
            }
            tracked.insert(assoc.sim);
        }

        for particle in table.particles() {
            if !particle.is_neutral() || !particle.is_final_state() {
                continue;
            }
            let Some(found) = indexed.get(&particle.mc_id) else {
                trace!(mc_id = %particle.mc_id, "no cluster for neutral truth particle");
                continue;
            };
            if tracked.contains(&particle.mc_id) {
                trace!(mc_id = %particle.mc_id, "truth particle already has a charged track");
                continue;
            }
            let Some(neutral) = reconstruct_neutral(particle, found) else {
                continue;
            };
            results.associations.push(ParticleAssociation {
                rec: results.particles.len(),
                sim: particle.mc_id,
                weight: 1.0,
            });
            results.particles.push(neutral);
        }

        debug!(
            particles = results.particles.len(),
            neutrals = results.particles.len() - charged.len(),
            "matching done"
        );
        Ok(results)
    }

    /// Runs the matching over cluster collections that carry their own
    /// associations.
    ///
    /// # Errors
    /// Never fails in practice; see [`ClusterMatcher::execute`].
    pub fn execute_collections(
        &self,
        truth: &[TruthParticle],
        charged: &[ReconstructedParticle],
        charged_associations: &[ParticleAssociation],
        collections: &[&ClusterCollection],
    ) -> Result<MatchingResults> {
        let clusters: Vec<&[Cluster]> = collections.iter().map(|c| c.clusters.as_slice()).collect();
        let associations: Vec<&[ClusterAssociation]> = collections
            .iter()
            .map(|c| c.associations.as_slice())
            .collect();
        self.execute(truth, charged, charged_associations, &clusters, &associations)
    }

    fn index_clusters<'a>(
        &self,
        table: &TruthTable<'_>,
        clusters: &[&'a [Cluster]],
        cluster_associations: &[&[ClusterAssociation]],
    ) -> HashMap<McId, IndexedCluster<'a>> {
        let mut indexed: HashMap<McId, IndexedCluster<'a>> = HashMap::new();

        for (collection, (&collection_clusters, &associations)) in
            clusters.iter().zip(cluster_associations).enumerate()
        {
            let mut first_association: Vec<Option<&ClusterAssociation>> =
                vec![None; collection_clusters.len()];
            for assoc in associations {
                match first_association.get_mut(assoc.rec) {
                    Some(slot) => {
                        slot.get_or_insert(assoc);
                    }
                    None => warn!(
                        collection,
                        rec = assoc.rec,
                        "cluster association points past the end of its collection"
                    ),
                }
            }

            for (index, (cluster, assoc)) in
                collection_clusters.iter().zip(&first_association).enumerate()
            {
                let Some(assoc) = assoc else {
                    trace!(collection, index, "cluster without truth association");
                    continue;
                };
                if let Err(err) = table.resolve(assoc.sim) {
                    warn!(collection, index, %err, "skipping cluster association");
                    continue;
                }

                let candidate = IndexedCluster {
                    reference: ClusterRef { collection, index },
                    cluster,
                    weight: assoc.weight,
                };
                match indexed.entry(assoc.sim) {
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                    Entry::Occupied(mut slot) => {
                        let replace = match self.config.duplicate_policy {
                            DuplicatePolicy::LastIndexed => true,
                            DuplicatePolicy::HighestEnergy => {
                                candidate.cluster.energy > slot.get().cluster.energy
                            }
                        };
                        debug!(
                            mc_id = %assoc.sim,
                            replace,
                            "truth particle has several clusters"
                        );
                        if replace {
                            slot.insert(candidate);
                        }
                    }
                }
            }
        }
        indexed
    }
}

fn reconstruct_neutral(
    particle: &TruthParticle,
    found: &IndexedCluster<'_>,
) -> Option<ReconstructedParticle> {
    let mass = particle.mass;
    if !mass.is_finite() || mass < 0.0 {
        debug!(mc_id = %particle.mc_id, mass, "unusable mass hypothesis, no neutral");
        return None;
    }
    let Some(direction) = found.cluster.position.unit() else {
        debug!(mc_id = %particle.mc_id, "cluster position gives no direction, no neutral");
        return None;
    };

    let energy = found.cluster.energy;
    let p = if energy < mass {
        0.0
    } else {
        (energy * energy - mass * mass).sqrt()
    };

    Some(ReconstructedParticle {
        pdg: particle.pdg,
        charge: 0.0,
        energy,
        mass,
        momentum: direction * p,
        reference_point: Vector3::ZERO,
        from_tracking: false,
        goodness_of_pid: found.weight,
        clusters: vec![found.reference],
    })
}
