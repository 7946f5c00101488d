//! Proto-cluster types, island clustering configuration and the clustering trait.

use crate::error::{Error, Result};
use crate::hit::{Hit, SimHit};
use crate::units::{CM, MEV};
use crate::vector::wrap_phi;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A weighted group of hits believed to come from one shower.
///
/// Hits are referenced by index into the collection that was clustered.
/// Weights are in [0, 1]; a hit shared between split clusters carries a
/// fractional weight in each.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtoCluster {
    /// Hit indices, in insertion order.
    pub hits: Vec<usize>,
    /// Weight of each hit, parallel to `hits`.
    pub weights: Vec<f64>,
}

impl ProtoCluster {
    /// Creates an empty proto-cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a proto-cluster with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: Vec::with_capacity(capacity),
            weights: Vec::with_capacity(capacity),
        }
    }

    /// Creates a proto-cluster holding every given hit with weight 1.
    #[must_use]
    pub fn unweighted(hits: Vec<usize>) -> Self {
        let weights = vec![1.0; hits.len()];
        Self { hits, weights }
    }

    /// Adds a hit with the given weight.
    pub fn push(&mut self, hit: usize, weight: f64) {
        self.hits.push(hit);
        self.weights.push(weight);
    }

    /// Returns the number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the proto-cluster has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterates over `(hit index, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.hits.iter().copied().zip(self.weights.iter().copied())
    }

    /// Sum of weighted hit energies.
    #[must_use]
    pub fn weighted_energy(&self, hits: &[Hit]) -> f64 {
        self.iter().map(|(idx, w)| hits[idx].energy * w).sum()
    }
}

impl FromIterator<(usize, f64)> for ProtoCluster {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        let mut cluster = Self::new();
        for (hit, weight) in iter {
            cluster.push(hit, weight);
        }
        cluster
    }
}

/// Two-component distance between a pair of hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceMetric {
    /// Local x and y.
    #[cfg_attr(feature = "serde", serde(rename = "localDistXY"))]
    LocalDistXY,
    /// Local x and z.
    #[cfg_attr(feature = "serde", serde(rename = "localDistXZ"))]
    LocalDistXZ,
    /// Local y and z.
    #[cfg_attr(feature = "serde", serde(rename = "localDistYZ"))]
    LocalDistYZ,
    /// Local x and y in units of the mean cell size of the pair.
    #[cfg_attr(feature = "serde", serde(rename = "dimScaledLocalDistXY"))]
    DimScaledLocalDistXY,
    /// Global transverse radius and azimuth.
    #[cfg_attr(feature = "serde", serde(rename = "globalDistRPhi"))]
    GlobalDistRPhi,
    /// Global pseudorapidity and azimuth.
    #[cfg_attr(feature = "serde", serde(rename = "globalDistEtaPhi"))]
    GlobalDistEtaPhi,
}

impl DistanceMetric {
    /// All metrics, in configuration order.
    pub const ALL: [Self; 6] = [
        Self::LocalDistXY,
        Self::LocalDistXZ,
        Self::LocalDistYZ,
        Self::DimScaledLocalDistXY,
        Self::GlobalDistRPhi,
        Self::GlobalDistEtaPhi,
    ];

    /// Configuration name of the metric.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::LocalDistXY => "localDistXY",
            Self::LocalDistXZ => "localDistXZ",
            Self::LocalDistYZ => "localDistYZ",
            Self::DimScaledLocalDistXY => "dimScaledLocalDistXY",
            Self::GlobalDistRPhi => "globalDistRPhi",
            Self::GlobalDistEtaPhi => "globalDistEtaPhi",
        }
    }

    /// Signed per-component distance from `b` to `a`.
    #[must_use]
    pub fn delta(self, a: &Hit, b: &Hit) -> [f64; 2] {
        match self {
            Self::LocalDistXY => [a.local.x - b.local.x, a.local.y - b.local.y],
            Self::LocalDistXZ => [a.local.x - b.local.x, a.local.z - b.local.z],
            Self::LocalDistYZ => [a.local.y - b.local.y, a.local.z - b.local.z],
            Self::DimScaledLocalDistXY => {
                let dim = a.dimension + b.dimension;
                [
                    2.0 * (a.local.x - b.local.x) / dim.x,
                    2.0 * (a.local.y - b.local.y) / dim.y,
                ]
            }
            Self::GlobalDistRPhi => [
                a.position.magnitude_transverse() - b.position.magnitude_transverse(),
                wrap_phi(a.position.phi() - b.position.phi()),
            ],
            Self::GlobalDistEtaPhi => [
                a.position.eta() - b.position.eta(),
                wrap_phi(a.position.phi() - b.position.phi()),
            ],
        }
    }

    /// Euclidean magnitude of [`DistanceMetric::delta`].
    #[must_use]
    pub fn magnitude(self, a: &Hit, b: &Hit) -> f64 {
        let [d0, d1] = self.delta(a, b);
        d0.hypot(d1)
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.name() == s)
            .ok_or_else(|| Error::config(format!("unknown distance metric \"{s}\"")))
    }
}

/// Configuration for island clustering.
///
/// Exactly one of the neighbour-distance fields must be set; its metric
/// decides adjacency between hits of the same sector. When deserialized,
/// only the neighbour fields present in the input are set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct IslandConfig {
    /// Maximum global distance between adjacent hits of different sectors.
    pub sector_dist: f64,
    /// Neighbour limits for [`DistanceMetric::LocalDistXY`].
    #[cfg_attr(feature = "serde", serde(rename = "localDistXY", default))]
    pub local_dist_xy: Option<[f64; 2]>,
    /// Neighbour limits for [`DistanceMetric::LocalDistXZ`].
    #[cfg_attr(feature = "serde", serde(rename = "localDistXZ", default))]
    pub local_dist_xz: Option<[f64; 2]>,
    /// Neighbour limits for [`DistanceMetric::LocalDistYZ`].
    #[cfg_attr(feature = "serde", serde(rename = "localDistYZ", default))]
    pub local_dist_yz: Option<[f64; 2]>,
    /// Neighbour limits for [`DistanceMetric::DimScaledLocalDistXY`].
    #[cfg_attr(feature = "serde", serde(rename = "dimScaledLocalDistXY", default))]
    pub dim_scaled_local_dist_xy: Option<[f64; 2]>,
    /// Neighbour limits for [`DistanceMetric::GlobalDistRPhi`].
    #[cfg_attr(feature = "serde", serde(rename = "globalDistRPhi", default))]
    pub global_dist_r_phi: Option<[f64; 2]>,
    /// Neighbour limits for [`DistanceMetric::GlobalDistEtaPhi`].
    #[cfg_attr(feature = "serde", serde(rename = "globalDistEtaPhi", default))]
    pub global_dist_eta_phi: Option<[f64; 2]>,
    /// Divide the neighbour limits of a pair by `sqrt(E / GeV)` of its
    /// more energetic hit.
    pub energy_scaled_dist: bool,
    /// Split islands with several local maxima.
    pub split_cluster: bool,
    /// Hits below this energy do not take part in clustering.
    pub min_cluster_hit_edep: f64,
    /// Hits below this energy never seed a split.
    pub min_cluster_center_edep: f64,
    /// Distance used for the split weights.
    pub transverse_energy_profile_metric: DistanceMetric,
    /// Length scale of the exponential split profile.
    pub transverse_energy_profile_scale: f64,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            sector_dist: 5.0 * CM,
            local_dist_xy: Some([2.0 * CM, 2.0 * CM]),
            local_dist_xz: None,
            local_dist_yz: None,
            dim_scaled_local_dist_xy: None,
            global_dist_r_phi: None,
            global_dist_eta_phi: None,
            energy_scaled_dist: false,
            split_cluster: false,
            min_cluster_hit_edep: 0.0,
            min_cluster_center_edep: 0.0,
            transverse_energy_profile_metric: DistanceMetric::GlobalDistEtaPhi,
            transverse_energy_profile_scale: 1.0,
        }
    }
}

impl IslandConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backward hadronic endcap: 15 cm local grid, splitting on.
    #[must_use]
    pub fn hcal_endcap_n() -> Self {
        Self {
            sector_dist: 5.0 * CM,
            split_cluster: true,
            min_cluster_hit_edep: 0.0,
            min_cluster_center_edep: 30.0 * MEV,
            ..Self::default()
        }
        .with_neighbour(DistanceMetric::LocalDistXY, [15.0 * CM, 15.0 * CM])
    }

    /// Far-forward B0 electromagnetic calorimeter: cell-size scaled grid, no splitting.
    #[must_use]
    pub fn b0_ecal() -> Self {
        Self {
            sector_dist: 5.0 * CM,
            split_cluster: false,
            min_cluster_hit_edep: 1.0 * MEV,
            min_cluster_center_edep: 30.0 * MEV,
            ..Self::default()
        }
        .with_neighbour(DistanceMetric::DimScaledLocalDistXY, [1.8, 1.8])
    }

    /// Backward electromagnetic endcap: cell-size scaled grid, splitting on.
    #[must_use]
    pub fn ecal_endcap_n() -> Self {
        Self {
            sector_dist: 5.0 * CM,
            split_cluster: true,
            min_cluster_hit_edep: 1.0 * MEV,
            min_cluster_center_edep: 30.0 * MEV,
            transverse_energy_profile_scale: 0.08,
            ..Self::default()
        }
        .with_neighbour(DistanceMetric::DimScaledLocalDistXY, [1.8, 1.8])
    }

    /// Replaces the neighbour criterion with the given metric and limits.
    #[must_use]
    pub fn with_neighbour(mut self, metric: DistanceMetric, limits: [f64; 2]) -> Self {
        self.local_dist_xy = None;
        self.local_dist_xz = None;
        self.local_dist_yz = None;
        self.dim_scaled_local_dist_xy = None;
        self.global_dist_r_phi = None;
        self.global_dist_eta_phi = None;
        *self.limits_mut(metric) = Some(limits);
        self
    }

    /// Sets the cross-sector distance.
    #[must_use]
    pub fn with_sector_dist(mut self, dist: f64) -> Self {
        self.sector_dist = dist;
        self
    }

    /// Enables or disables splitting.
    #[must_use]
    pub fn with_split_cluster(mut self, split: bool) -> Self {
        self.split_cluster = split;
        self
    }

    /// Enables or disables energy-scaled neighbour limits.
    #[must_use]
    pub fn with_energy_scaled_dist(mut self, scaled: bool) -> Self {
        self.energy_scaled_dist = scaled;
        self
    }

    /// Sets the minimum participating hit energy.
    #[must_use]
    pub fn with_min_cluster_hit_edep(mut self, edep: f64) -> Self {
        self.min_cluster_hit_edep = edep;
        self
    }

    /// Sets the minimum seed energy.
    #[must_use]
    pub fn with_min_cluster_center_edep(mut self, edep: f64) -> Self {
        self.min_cluster_center_edep = edep;
        self
    }

    /// Sets the split profile metric and scale.
    #[must_use]
    pub fn with_transverse_energy_profile(mut self, metric: DistanceMetric, scale: f64) -> Self {
        self.transverse_energy_profile_metric = metric;
        self.transverse_energy_profile_scale = scale;
        self
    }

    fn limits_mut(&mut self, metric: DistanceMetric) -> &mut Option<[f64; 2]> {
        match metric {
            DistanceMetric::LocalDistXY => &mut self.local_dist_xy,
            DistanceMetric::LocalDistXZ => &mut self.local_dist_xz,
            DistanceMetric::LocalDistYZ => &mut self.local_dist_yz,
            DistanceMetric::DimScaledLocalDistXY => &mut self.dim_scaled_local_dist_xy,
            DistanceMetric::GlobalDistRPhi => &mut self.global_dist_r_phi,
            DistanceMetric::GlobalDistEtaPhi => &mut self.global_dist_eta_phi,
        }
    }

    fn limits(&self, metric: DistanceMetric) -> Option<[f64; 2]> {
        match metric {
            DistanceMetric::LocalDistXY => self.local_dist_xy,
            DistanceMetric::LocalDistXZ => self.local_dist_xz,
            DistanceMetric::LocalDistYZ => self.local_dist_yz,
            DistanceMetric::DimScaledLocalDistXY => self.dim_scaled_local_dist_xy,
            DistanceMetric::GlobalDistRPhi => self.global_dist_r_phi,
            DistanceMetric::GlobalDistEtaPhi => self.global_dist_eta_phi,
        }
    }

    /// The configured neighbour metric and its limits.
    ///
    /// # Errors
    /// Returns [`Error::Config`] unless exactly one neighbour metric is set.
    pub fn neighbour(&self) -> Result<(DistanceMetric, [f64; 2])> {
        let mut configured = DistanceMetric::ALL
            .into_iter()
            .filter_map(|metric| self.limits(metric).map(|limits| (metric, limits)));
        match (configured.next(), configured.next()) {
            (Some(found), None) => Ok(found),
            (None, _) => Err(Error::config("no neighbour distance metric configured")),
            (Some((first, _)), Some((second, _))) => Err(Error::config(format!(
                "several neighbour distance metrics configured ({first}, {second}, ...), exactly one is allowed"
            ))),
        }
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let (metric, limits) = self.neighbour()?;
        if limits.iter().any(|l| !l.is_finite() || *l < 0.0) {
            return Err(Error::config(format!(
                "{metric} limits must be finite and non-negative, got {limits:?}"
            )));
        }
        if !self.sector_dist.is_finite() || self.sector_dist < 0.0 {
            return Err(Error::config(format!(
                "sectorDist must be finite and non-negative, got {}",
                self.sector_dist
            )));
        }
        if !self.transverse_energy_profile_scale.is_finite()
            || self.transverse_energy_profile_scale <= 0.0
        {
            return Err(Error::config(format!(
                "transverseEnergyProfileScale must be positive, got {}",
                self.transverse_energy_profile_scale
            )));
        }
        if self.min_cluster_hit_edep.is_nan() || self.min_cluster_center_edep.is_nan() {
            return Err(Error::config("energy thresholds must not be NaN"));
        }
        Ok(())
    }
}

/// Inputs handed to a proto-clustering algorithm for one detector.
#[derive(Debug, Clone, Copy)]
pub struct ClusteringInput<'a> {
    /// Reconstructed hits.
    pub hits: &'a [Hit],
    /// Truth-level hits, if the caller has them.
    pub sim_hits: Option<&'a [SimHit]>,
}

impl<'a> ClusteringInput<'a> {
    /// Input without truth hits.
    #[must_use]
    pub fn new(hits: &'a [Hit]) -> Self {
        Self {
            hits,
            sim_hits: None,
        }
    }

    /// Attaches truth hits.
    #[must_use]
    pub fn with_sim_hits(mut self, sim_hits: &'a [SimHit]) -> Self {
        self.sim_hits = Some(sim_hits);
        self
    }
}

/// Trait for proto-clustering algorithms.
///
/// Implementations are immutable once constructed and shared across event
/// threads.
pub trait ProtoClustering: Send + Sync {
    /// Groups the input hits into proto-clusters.
    ///
    /// # Errors
    /// Only structural input problems are errors; sparse data never is.
    fn cluster(&self, input: &ClusteringInput<'_>) -> Result<Vec<ProtoCluster>>;

    /// Returns the name of the algorithm.
    fn name(&self) -> &'static str;
}
