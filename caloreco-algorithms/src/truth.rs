//! Truth-seeded proto-clustering.
//!
//! Every hit is attributed to the leading particle of its truth hit and
//! all hits of one particle form one proto-cluster. No geometry is used.

use caloreco_core::{ClusteringInput, Error, HitIndex, ProtoCluster, ProtoClustering, Result};
use tracing::{debug, instrument};

/// Groups hits by the truth particle that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruthClustering;

impl TruthClustering {
    /// Creates a truth-seeded clusterer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProtoClustering for TruthClustering {
    #[instrument(name = "truth.cluster", skip_all, fields(hits = input.hits.len()))]
    fn cluster(&self, input: &ClusteringInput<'_>) -> Result<Vec<ProtoCluster>> {
        let hits = input.hits;
        let sim_hits = input
            .sim_hits
            .ok_or_else(|| Error::config("truth-seeded clustering requires truth hits"))?;
        if sim_hits.len() != hits.len() {
            return Err(Error::LengthMismatch {
                what: "truth hits per reconstructed hit",
                expected: hits.len(),
                actual: sim_hits.len(),
            });
        }

        let mut index = HitIndex::new(hits);
        let (truth_of, orphans) = index.sim_truth(hits, sim_hits);
        if let Some(&orphan) = orphans.first() {
            return Err(Error::config(format!(
                "truth hit in cell {} has no reconstructed counterpart",
                sim_hits[orphan].cell_id
            )));
        }
        index.regroup(&truth_of)?;
        for &idx in index.untruthed() {
            debug!(cell = %hits[idx].cell_id, "hit has no truth particle, dropped");
        }

        let protos: Vec<ProtoCluster> = index
            .truth_groups()
            .iter()
            .map(|group| {
                ProtoCluster::unweighted(
                    group
                        .hits
                        .iter()
                        .copied()
                        .filter(|&idx| hits[idx].has_energy())
                        .collect(),
                )
            })
            .filter(|proto| !proto.is_empty())
            .collect();

        debug!(proto_clusters = protos.len(), "truth clustering done");
        Ok(protos)
    }

    fn name(&self) -> &'static str {
        "truth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caloreco_core::{Hit, SimHit, Vector3};

    fn hit(cell: u64, x: f64, energy: f64) -> Hit {
        Hit::new(cell, Vector3::new(x, 0.0, 10.0), energy, 0.0)
    }

    fn sim(cell: u64, particle: i32) -> SimHit {
        SimHit::new(cell, Vector3::ZERO, 0.1, particle)
    }

    #[test]
    fn test_groups_by_leading_particle() {
        let hits = vec![hit(1, 0.0, 0.1), hit(2, 50.0, 0.2), hit(3, 1.0, 0.3)];
        let sims = vec![sim(3, 7), sim(1, 7), sim(2, 4)];
        let protos = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits).with_sim_hits(&sims))
            .unwrap();
        assert_eq!(
            protos,
            vec![
                ProtoCluster::unweighted(vec![0, 2]),
                ProtoCluster::unweighted(vec![1]),
            ]
        );
    }

    #[test]
    fn test_missing_truth_hits_is_config_error() {
        let hits = vec![hit(1, 0.0, 0.1)];
        let err = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_cardinality_mismatch_is_config_error() {
        let hits = vec![hit(1, 0.0, 0.1), hit(2, 0.0, 0.1)];
        let sims = vec![sim(1, 3)];
        let err = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits).with_sim_hits(&sims))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_unknown_cell_is_config_error() {
        let hits = vec![hit(1, 0.0, 0.1)];
        let sims = vec![sim(9, 3)];
        let err = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits).with_sim_hits(&sims))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_falls_back_to_hit_truth_and_drops_untruthed() {
        let hits = vec![hit(1, 0.0, 0.1).with_truth(5), hit(2, 0.0, 0.1), hit(3, 0.0, 0.1)];
        let mut empty_a = sim(1, 0);
        empty_a.contributions.clear();
        let mut empty_b = sim(2, 0);
        empty_b.contributions.clear();
        let sims = vec![empty_a, empty_b, sim(3, 5)];
        let protos = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits).with_sim_hits(&sims))
            .unwrap();
        assert_eq!(protos, vec![ProtoCluster::unweighted(vec![0, 2])]);
    }

    #[test]
    fn test_non_positive_energy_excluded() {
        let hits = vec![hit(1, 0.0, 0.0), hit(2, 0.0, 0.4), hit(3, 0.0, -1.0)];
        let sims = vec![sim(1, 1), sim(2, 1), sim(3, 2)];
        let protos = TruthClustering::new()
            .cluster(&ClusteringInput::new(&hits).with_sim_hits(&sims))
            .unwrap();
        assert_eq!(protos, vec![ProtoCluster::unweighted(vec![1])]);
    }
}
