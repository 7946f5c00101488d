//! Island clustering with optional splitting at local energy maxima.
//!
//! Hits are connected when they are neighbours: within the configured
//! per-component limits in the same sector, or within `sectorDist` across
//! sectors. Connected components (islands) become proto-clusters. With
//! splitting enabled, an island holding several local maxima is shared
//! between them with exponential energy-profile weights.

use crate::union_find::UnionFind;
use caloreco_core::units::GEV;
use caloreco_core::{
    ClusteringInput, DistanceMetric, Hit, IslandConfig, ProtoCluster, ProtoClustering, Result,
};
use tracing::{debug, instrument, trace, warn};

/// Split weights below this fraction are dropped before renormalising.
const MIN_SPLIT_FRACTION: f64 = 0.02;
/// Hits whose final split weight does not exceed this are left out.
const MIN_SPLIT_WEIGHT: f64 = 1e-6;

/// Island clustering over a single detector's hits.
#[derive(Debug, Clone)]
pub struct IslandClustering {
    config: IslandConfig,
    metric: DistanceMetric,
    limits: [f64; 2],
}

impl IslandClustering {
    /// Creates an island clusterer.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate, in
    /// particular unless exactly one neighbour metric is set.
    pub fn new(config: IslandConfig) -> Result<Self> {
        config.validate()?;
        let (metric, limits) = config.neighbour()?;
        Ok(Self {
            config,
            metric,
            limits,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    /// Returns the neighbour metric in use.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns true if `a` and `b` are neighbours.
    #[must_use]
    pub fn is_neighbour(&self, a: &Hit, b: &Hit) -> bool {
        if a.sector != b.sector {
            return (a.position - b.position).magnitude() <= self.config.sector_dist;
        }

        let scale = if self.config.energy_scaled_dist {
            let energy = a.energy.max(b.energy) / GEV;
            if energy > 0.0 {
                energy.sqrt().recip()
            } else {
                1.0
            }
        } else {
            1.0
        };

        let delta = self.metric.delta(a, b);
        delta
            .iter()
            .zip(self.limits)
            .all(|(d, limit)| d.abs() <= limit * scale)
    }

    fn participates(&self, hit: &Hit) -> bool {
        hit.has_energy() && hit.energy >= self.config.min_cluster_hit_edep
    }

    /// True when a metric in use divides by the cell dimensions.
    fn needs_cell_dimension(&self) -> bool {
        self.metric == DistanceMetric::DimScaledLocalDistXY
            || (self.config.split_cluster
                && self.config.transverse_energy_profile_metric
                    == DistanceMetric::DimScaledLocalDistXY)
    }

    fn islands(&self, hits: &[Hit]) -> Vec<Vec<usize>> {
        let mut members: Vec<usize> = (0..hits.len())
            .filter(|&i| self.participates(&hits[i]))
            .collect();
        if self.needs_cell_dimension() {
            let before = members.len();
            members.retain(|&i| has_cell_dimension(&hits[i]));
            let rejected = before - members.len();
            if rejected > 0 {
                warn!(
                    hits = rejected,
                    metric = %DistanceMetric::DimScaledLocalDistXY,
                    "hits without a positive cell dimension excluded"
                );
            }
        }

        let mut uf = UnionFind::new(hits.len());
        for (pos, &i) in members.iter().enumerate() {
            for &j in &members[pos + 1..] {
                if self.is_neighbour(&hits[i], &hits[j]) {
                    uf.union(i, j);
                }
            }
        }
        uf.components(&members)
    }

    /// Hits of `island` at or above the seed threshold with no strictly
    /// more energetic neighbour in the island.
    fn local_maxima(&self, island: &[usize], hits: &[Hit]) -> Vec<usize> {
        island
            .iter()
            .copied()
            .filter(|&i| {
                let hit = &hits[i];
                hit.energy >= self.config.min_cluster_center_edep
                    && !island.iter().any(|&j| {
                        j != i && hits[j].energy > hit.energy && self.is_neighbour(hit, &hits[j])
                    })
            })
            .collect()
    }

    fn split(&self, island: &[usize], maxima: &[usize], hits: &[Hit]) -> Vec<ProtoCluster> {
        let metric = self.config.transverse_energy_profile_metric;
        let scale = self.config.transverse_energy_profile_scale;

        let mut protos: Vec<ProtoCluster> = maxima
            .iter()
            .map(|_| ProtoCluster::with_capacity(island.len()))
            .collect();
        let mut weights = vec![0.0; maxima.len()];

        for &idx in island {
            for (weight, &center) in weights.iter_mut().zip(maxima) {
                let dist = metric.magnitude(&hits[center], &hits[idx]);
                let score = (-dist / scale).exp() * hits[center].energy;
                *weight = if score.is_finite() { score } else { 0.0 };
            }

            if !normalize(&mut weights) {
                debug!(cell = %hits[idx].cell_id, "no split weight for hit, dropped");
                continue;
            }
            for weight in &mut weights {
                if *weight < MIN_SPLIT_FRACTION {
                    *weight = 0.0;
                }
            }
            normalize(&mut weights);

            for (proto, &weight) in protos.iter_mut().zip(&weights) {
                if weight > MIN_SPLIT_WEIGHT {
                    proto.push(idx, weight);
                }
            }
        }
        protos
    }
}

fn has_cell_dimension(hit: &Hit) -> bool {
    let dim = hit.dimension;
    dim.x > 0.0 && dim.y > 0.0 && dim.x.is_finite() && dim.y.is_finite()
}

/// Scales `weights` to sum to one. Returns false if the sum is not positive.
fn normalize(weights: &mut [f64]) -> bool {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return false;
    }
    for weight in weights {
        *weight /= sum;
    }
    true
}

impl ProtoClustering for IslandClustering {
    #[instrument(name = "island.cluster", skip_all, fields(hits = input.hits.len()))]
    fn cluster(&self, input: &ClusteringInput<'_>) -> Result<Vec<ProtoCluster>> {
        let hits = input.hits;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let islands = self.islands(hits);
        let mut protos = Vec::with_capacity(islands.len());
        for island in islands {
            if !self.config.split_cluster {
                protos.push(ProtoCluster::unweighted(island));
                continue;
            }
            let maxima = self.local_maxima(&island, hits);
            if maxima.len() > 1 {
                trace!(maxima = maxima.len(), hits = island.len(), "splitting island");
                protos.extend(
                    self.split(&island, &maxima, hits)
                        .into_iter()
                        .filter(|proto| !proto.is_empty()),
                );
            } else {
                protos.push(ProtoCluster::unweighted(island));
            }
        }

        debug!(proto_clusters = protos.len(), "island clustering done");
        Ok(protos)
    }

    fn name(&self) -> &'static str {
        "island"
    }
}
