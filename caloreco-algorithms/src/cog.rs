//! Centroid-of-gravity cluster reconstruction.
//!
//! Turns proto-clusters into clusters: energy corrected by the sampling
//! fraction, a weighted centroid, timing, shape moments and the truth
//! particle that deposited most of the energy.

use caloreco_core::vector::eta_to_theta;
use caloreco_core::{
    Cluster, ClusterAssociation, ClusterCollection, CogConfig, Error, GeometryService, Hit, McId,
    ProtoCluster, Result, Vector3,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Truth particle a cluster is attributed to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruthAttribution {
    /// The attributed particle.
    pub mc_id: McId,
    /// Its share of the cluster's raw energy.
    pub weight: f64,
}

/// Builds clusters from proto-clusters.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    config: CogConfig,
    depth: f64,
}

impl ClusterBuilder {
    /// Creates a builder that needs no geometry.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate or names
    /// a geometry constant (`moduleDimZName`).
    pub fn new(config: CogConfig) -> Result<Self> {
        if let Some(name) = &config.module_dim_z_name {
            return Err(Error::config(format!(
                "moduleDimZName \"{name}\" needs a geometry service"
            )));
        }
        Self::with_geometry(config, &caloreco_core::ConstantTable::new())
    }

    /// Creates a builder, resolving `moduleDimZName` through `geometry`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate or the
    /// named constant is not defined.
    pub fn with_geometry(config: CogConfig, geometry: &dyn GeometryService) -> Result<Self> {
        config.validate()?;
        let depth = match &config.module_dim_z_name {
            Some(name) => geometry.constant(name).ok_or_else(|| {
                Error::config(format!("geometry constant \"{name}\" is not defined"))
            })?,
            None => config.depth_correction,
        };
        if !depth.is_finite() {
            return Err(Error::config(format!("depth correction must be finite, got {depth}")));
        }
        Ok(Self { config, depth })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CogConfig {
        &self.config
    }

    /// Depth correction in effect.
    #[must_use]
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Reconstructs one cluster, attributing it through each hit's own
    /// truth reference.
    ///
    /// Returns `None` for proto-clusters that carry no usable energy or
    /// position weight. Proto-cluster indices outside `hits` are ignored.
    #[must_use]
    pub fn build(
        &self,
        proto: &ProtoCluster,
        hits: &[Hit],
    ) -> Option<(Cluster, Option<TruthAttribution>)> {
        self.build_inner(proto, hits, |idx| hits[idx].truth)
    }

    /// Reconstructs one cluster, attributing it through `truth_of`, the
    /// truth particle of every hit (see [`caloreco_core::HitIndex::sim_truth`]).
    ///
    /// Hits beyond the end of `truth_of` count as having no truth.
    #[must_use]
    pub fn build_with_truth(
        &self,
        proto: &ProtoCluster,
        hits: &[Hit],
        truth_of: &[Option<McId>],
    ) -> Option<(Cluster, Option<TruthAttribution>)> {
        self.build_inner(proto, hits, |idx| truth_of.get(idx).copied().flatten())
    }

    fn build_inner<F>(
        &self,
        proto: &ProtoCluster,
        hits: &[Hit],
        truth_of: F,
    ) -> Option<(Cluster, Option<TruthAttribution>)>
    where
        F: Fn(usize) -> Option<McId>,
    {
        let mut contributions: Vec<(usize, f64)> = Vec::with_capacity(proto.len());
        for (idx, weight) in proto.iter() {
            let Some(hit) = hits.get(idx) else {
                debug!(hit = idx, hits = hits.len(), "proto-cluster hit out of range, ignored");
                continue;
            };
            let energy = hit.energy * weight;
            if energy > 0.0 && energy.is_finite() {
                contributions.push((idx, energy));
            }
        }
        if contributions.is_empty() {
            debug!(hits = proto.len(), "proto-cluster without energy, no cluster");
            return None;
        }

        let raw_energy: f64 = contributions.iter().map(|&(_, e)| e).sum();
        let weights: Vec<f64> = contributions
            .iter()
            .map(|&(_, e)| {
                self.config
                    .energy_weight
                    .weight(e, raw_energy, self.config.log_weight_base)
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 || !total_weight.is_finite() {
            debug!(hits = contributions.len(), "zero position weight, no cluster");
            return None;
        }

        let mut position = Vector3::ZERO;
        let mut time = 0.0;
        for (&(idx, energy), &weight) in contributions.iter().zip(&weights) {
            position += hits[idx].position * weight;
            time += hits[idx].time * energy;
        }
        position = position / total_weight;
        time /= raw_energy;

        let time_spread: f64 = contributions
            .iter()
            .map(|&(idx, energy)| energy * (hits[idx].time - time).powi(2))
            .sum();

        if self.config.enable_eta_bounds {
            position = bound_eta(position, &contributions, hits);
        }
        if self.depth != 0.0 {
            if let Some(direction) = position.unit() {
                position += direction * self.depth;
            }
        }

        let n_hits = contributions.len();
        let mut radius_sum = 0.0;
        let mut dispersion_sum = 0.0;
        for (&(idx, _), &weight) in contributions.iter().zip(&weights) {
            let delta = hits[idx].position - position;
            let d2 = delta.dot(&delta);
            radius_sum += d2;
            dispersion_sum += weight * d2;
        }
        let radius = if n_hits > 1 {
            #[allow(clippy::cast_precision_loss)]
            let dof = (n_hits - 1) as f64;
            (radius_sum / dof).sqrt()
        } else {
            0.0
        };

        let cluster = Cluster {
            energy: raw_energy / self.config.samp_frac,
            energy_error: 0.0,
            position,
            intrinsic_theta: position.theta(),
            intrinsic_phi: position.phi(),
            time,
            time_error: (time_spread / raw_energy).sqrt(),
            n_hits,
            radius,
            dispersion: (dispersion_sum / total_weight).sqrt(),
            hits: contributions.iter().map(|&(idx, _)| idx).collect(),
            hit_contributions: contributions.iter().map(|&(_, e)| e).collect(),
            proto_cluster: 0,
        };

        let truth = attribute(&contributions, truth_of, raw_energy);
        Some((cluster, truth))
    }

    /// Reconstructs every proto-cluster and indexes the associations,
    /// attributing through each hit's own truth reference.
    #[must_use]
    #[instrument(name = "cog.build_all", skip_all, fields(proto_clusters = protos.len()))]
    pub fn build_all(&self, protos: &[ProtoCluster], hits: &[Hit]) -> ClusterCollection {
        collect_clusters(protos, |proto| self.build(proto, hits))
    }

    /// Like [`ClusterBuilder::build_all`], attributing through `truth_of`.
    #[must_use]
    #[instrument(name = "cog.build_all", skip_all, fields(proto_clusters = protos.len()))]
    pub fn build_all_with_truth(
        &self,
        protos: &[ProtoCluster],
        hits: &[Hit],
        truth_of: &[Option<McId>],
    ) -> ClusterCollection {
        collect_clusters(protos, |proto| self.build_with_truth(proto, hits, truth_of))
    }
}

/// Assigns proto-cluster indices and association indices in build order.
fn collect_clusters<F>(protos: &[ProtoCluster], build: F) -> ClusterCollection
where
    F: Fn(&ProtoCluster) -> Option<(Cluster, Option<TruthAttribution>)>,
{
    let mut collection = ClusterCollection::default();
    for (proto_idx, proto) in protos.iter().enumerate() {
        let Some((mut cluster, truth)) = build(proto) else {
            continue;
        };
        cluster.proto_cluster = proto_idx;
        if let Some(truth) = truth {
            collection.associations.push(ClusterAssociation {
                rec: collection.clusters.len(),
                sim: truth.mc_id,
                weight: truth.weight,
            });
        }
        collection.clusters.push(cluster);
    }
    debug!(
        clusters = collection.len(),
        associations = collection.associations.len(),
        "clusters built"
    );
    collection
}

/// Clips the centroid pseudorapidity to the range spanned by the hits,
/// keeping its distance from the origin and its azimuth.
fn bound_eta(position: Vector3, contributions: &[(usize, f64)], hits: &[Hit]) -> Vector3 {
    let (min_eta, max_eta) = contributions
        .iter()
        .map(|&(idx, _)| hits[idx].eta())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), eta| {
            (lo.min(eta), hi.max(eta))
        });
    let eta = position.eta();
    let bounded = if eta > max_eta {
        max_eta
    } else if eta < min_eta {
        min_eta
    } else {
        return position;
    };
    Vector3::from_spherical(position.magnitude(), eta_to_theta(bounded), position.phi())
}

/// Truth particle with the largest summed contribution; ties go to the
/// smaller id.
fn attribute<F>(
    contributions: &[(usize, f64)],
    truth_of: F,
    raw_energy: f64,
) -> Option<TruthAttribution>
where
    F: Fn(usize) -> Option<McId>,
{
    let mut per_particle: BTreeMap<McId, f64> = BTreeMap::new();
    for &(idx, energy) in contributions {
        if let Some(mc_id) = truth_of(idx) {
            *per_particle.entry(mc_id).or_insert(0.0) += energy;
        }
    }

    let mut best: Option<(McId, f64)> = None;
    for (mc_id, energy) in per_particle {
        let better = match best {
            Some((_, top)) => energy > top,
            None => true,
        };
        if better {
            best = Some((mc_id, energy));
        }
    }
    best.map(|(mc_id, energy)| TruthAttribution {
        mc_id,
        weight: energy / raw_energy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use caloreco_core::units::{CM, MEV};
    use caloreco_core::{ConstantTable, EnergyWeight};

    fn scenario_hits() -> Vec<Hit> {
        vec![
            Hit::new(1, Vector3::new(0.0, 0.0, 10.0), 100.0 * MEV, 1.0),
            Hit::new(2, Vector3::new(1.0 * CM, 0.0, 10.0), 5.0 * MEV, 2.0),
            Hit::new(3, Vector3::new(0.0, 1.0 * CM, 10.0), 5.0 * MEV, 3.0),
        ]
    }

    fn builder(config: CogConfig) -> ClusterBuilder {
        ClusterBuilder::new(config).unwrap()
    }

    #[test]
    fn test_log_weighted_centroid() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![0, 1, 2]);
        let (cluster, truth) = builder(CogConfig::new()).build(&proto, &hits).unwrap();

        assert_relative_eq!(cluster.energy, 110.0 * MEV, epsilon = 1e-12);
        assert_eq!(cluster.n_hits, 3);
        assert!(truth.is_none());

        // log weights: 3.6 + ln(100/110) for the seed, 3.6 + ln(5/110) for the others
        let w_seed = 3.6 + (100.0_f64 / 110.0).ln();
        let w_side = 3.6 + (5.0_f64 / 110.0).ln();
        let expected = w_side / (w_seed + 2.0 * w_side);
        assert_relative_eq!(cluster.position.x, expected, epsilon = 1e-12);
        assert_relative_eq!(cluster.position.y, expected, epsilon = 1e-12);
        assert_relative_eq!(cluster.position.z, 10.0, epsilon = 1e-12);
        assert!(cluster.position.x < 1.0 / 3.0);
    }

    #[test]
    fn test_sampling_fraction_scales_energy() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![0, 1, 2]);
        let (cluster, _) = builder(CogConfig::new().with_samp_frac(0.5))
            .build(&proto, &hits)
            .unwrap();
        assert_relative_eq!(cluster.energy, 220.0 * MEV, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_weighted_time() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![0, 1, 2]);
        let (cluster, _) = builder(CogConfig::new()).build(&proto, &hits).unwrap();
        let mean = (100.0 * 1.0 + 5.0 * 2.0 + 5.0 * 3.0) / 110.0;
        assert_relative_eq!(cluster.time, mean, epsilon = 1e-12);
        let spread = ((100.0 * (1.0 - mean).powi(2)
            + 5.0 * (2.0 - mean).powi(2)
            + 5.0 * (3.0 - mean).powi(2))
            / 110.0)
            .sqrt();
        assert_relative_eq!(cluster.time_error, spread, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_proportional_and_constant_weights() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![0, 1, 2]);

        let (linear, _) = builder(CogConfig::new().with_energy_weight(EnergyWeight::None))
            .build(&proto, &hits)
            .unwrap();
        assert_relative_eq!(linear.position.x, 5.0 / 110.0, epsilon = 1e-12);

        let (constant, _) = builder(CogConfig::new().with_energy_weight(EnergyWeight::Constant))
            .build(&proto, &hits)
            .unwrap();
        assert_relative_eq!(constant.position.x, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(constant.position.y, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_position_weight_is_filtered() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![1, 2]);
        // ln(1/2) + 0.5 < 0 for both hits
        let config = CogConfig::new().with_log_weight_base(0.5);
        assert!(builder(config).build(&proto, &hits).is_none());
    }

    #[test]
    fn test_empty_and_zero_energy_are_filtered() {
        let mut hits = scenario_hits();
        hits[0].energy = 0.0;
        let b = builder(CogConfig::new());
        assert!(b.build(&ProtoCluster::new(), &hits).is_none());
        assert!(b.build(&ProtoCluster::unweighted(vec![0]), &hits).is_none());
    }

    #[test]
    fn test_split_weights_scale_contributions() {
        let hits = scenario_hits();
        let proto: ProtoCluster = [(0, 0.5), (1, 1.0)].into_iter().collect();
        let (cluster, _) = builder(CogConfig::new()).build(&proto, &hits).unwrap();
        assert_relative_eq!(cluster.energy, 55.0 * MEV, epsilon = 1e-12);
        assert_relative_eq!(cluster.hit_contributions[0], 50.0 * MEV, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_moments() {
        let hits = vec![
            Hit::new(1, Vector3::new(-1.0, 0.0, 10.0), 1.0, 0.0),
            Hit::new(2, Vector3::new(1.0, 0.0, 10.0), 1.0, 0.0),
        ];
        let proto = ProtoCluster::unweighted(vec![0, 1]);
        let (cluster, _) = builder(CogConfig::new()).build(&proto, &hits).unwrap();
        assert_relative_eq!(cluster.position.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(cluster.radius, 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(cluster.dispersion, 1.0, epsilon = 1e-12);

        let (single, _) = builder(CogConfig::new())
            .build(&ProtoCluster::unweighted(vec![0]), &hits)
            .unwrap();
        assert_eq!(single.radius, 0.0);
    }

    #[test]
    fn test_depth_correction_along_direction() {
        let hits = vec![Hit::new(1, Vector3::new(0.0, 3.0, 4.0), 1.0, 0.0)];
        let proto = ProtoCluster::unweighted(vec![0]);
        let (cluster, _) = builder(CogConfig::new().with_depth_correction(5.0))
            .build(&proto, &hits)
            .unwrap();
        assert_relative_eq!(cluster.position.y, 6.0, epsilon = 1e-12);
        assert_relative_eq!(cluster.position.z, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_depth_from_geometry() {
        let geometry = ConstantTable::new().with("EcalEndcapN_dimZ", 20.0);
        let config = CogConfig::new().with_module_dim_z_name("EcalEndcapN_dimZ");
        let b = ClusterBuilder::with_geometry(config.clone(), &geometry).unwrap();
        assert_relative_eq!(b.depth(), 20.0);

        assert!(ClusterBuilder::with_geometry(config.clone(), &ConstantTable::new())
            .unwrap_err()
            .is_config());
        assert!(ClusterBuilder::new(config).unwrap_err().is_config());
    }

    #[test]
    fn test_eta_bounds_clip_centroid() {
        // hits mirrored across the beam axis put the centroid on the axis
        let hits = vec![
            Hit::new(1, Vector3::new(10.0, 0.0, 100.0), 1.0, 0.0),
            Hit::new(2, Vector3::new(-10.0, 0.0, 100.0), 1.0, 0.0),
        ];
        let proto = ProtoCluster::unweighted(vec![0, 1]);
        let unbounded = builder(CogConfig::new().with_energy_weight(EnergyWeight::Constant))
            .build(&proto, &hits)
            .unwrap()
            .0;
        assert!(unbounded.eta() > hits[0].eta());

        let bounded = builder(
            CogConfig::new()
                .with_energy_weight(EnergyWeight::Constant)
                .with_eta_bounds(true),
        )
        .build(&proto, &hits)
        .unwrap()
        .0;
        assert_relative_eq!(bounded.eta(), hits[0].eta(), epsilon = 1e-9);
        assert_relative_eq!(
            bounded.position.magnitude(),
            unbounded.position.magnitude(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_truth_attribution_by_largest_share() {
        let hits = vec![
            Hit::new(1, Vector3::new(0.0, 0.0, 10.0), 0.6, 0.0).with_truth(9),
            Hit::new(2, Vector3::new(1.0, 0.0, 10.0), 0.3, 0.0).with_truth(2),
            Hit::new(3, Vector3::new(2.0, 0.0, 10.0), 0.3, 0.0).with_truth(2),
            Hit::new(4, Vector3::new(3.0, 0.0, 10.0), 0.1, 0.0),
        ];
        let proto = ProtoCluster::unweighted(vec![0, 1, 2, 3]);
        let (_, truth) = builder(CogConfig::new()).build(&proto, &hits).unwrap();
        let truth = truth.unwrap();
        // tie between 9 (0.6) and 2 (0.3 + 0.3) goes to the smaller id
        assert_eq!(truth.mc_id, McId(2));
        assert_relative_eq!(truth.weight, 0.6 / 1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_build_all_indexes_associations() {
        let hits = vec![
            Hit::new(1, Vector3::new(0.0, 0.0, 10.0), 0.0, 0.0).with_truth(1),
            Hit::new(2, Vector3::new(1.0, 0.0, 10.0), 0.5, 0.0),
            Hit::new(3, Vector3::new(2.0, 0.0, 10.0), 0.3, 0.0).with_truth(4),
        ];
        let protos = vec![
            ProtoCluster::unweighted(vec![0]),
            ProtoCluster::unweighted(vec![1]),
            ProtoCluster::unweighted(vec![2]),
        ];
        let collection = builder(CogConfig::new()).build_all(&protos, &hits);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.clusters[0].proto_cluster, 1);
        assert_eq!(collection.clusters[1].proto_cluster, 2);
        assert_eq!(
            collection.associations,
            vec![ClusterAssociation {
                rec: 1,
                sim: McId(4),
                weight: 1.0
            }]
        );
    }

    #[test]
    fn test_truth_from_per_hit_slice() {
        let hits = vec![
            Hit::new(1, Vector3::new(0.0, 0.0, 10.0), 0.7, 0.0).with_truth(9),
            Hit::new(2, Vector3::new(1.0, 0.0, 10.0), 0.3, 0.0),
        ];
        let protos = vec![ProtoCluster::unweighted(vec![0, 1])];
        let b = builder(CogConfig::new());

        let collection = b.build_all_with_truth(&protos, &hits, &[None, Some(McId(4))]);
        assert_eq!(collection.associations.len(), collection.len());
        assert_eq!(collection.associations[0].sim, McId(4));
        assert_relative_eq!(collection.associations[0].weight, 0.3, epsilon = 1e-12);

        // a short slice leaves the remaining hits without truth
        let (_, truth) = b.build_with_truth(&protos[0], &hits, &[]).unwrap();
        assert!(truth.is_none());
    }

    #[test]
    fn test_out_of_range_hits_are_ignored() {
        let hits = scenario_hits();
        let proto = ProtoCluster::unweighted(vec![0, 7]);
        let (cluster, _) = builder(CogConfig::new()).build(&proto, &hits).unwrap();
        assert_eq!(cluster.hits, vec![0]);
        assert_relative_eq!(cluster.energy, 100.0 * MEV, epsilon = 1e-12);
        assert!(builder(CogConfig::new())
            .build(&ProtoCluster::unweighted(vec![5]), &hits)
            .is_none());
    }
}
