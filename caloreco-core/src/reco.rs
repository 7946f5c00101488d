//! Centroid-of-gravity cluster reconstruction configuration.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How hit positions are weighted in the centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EnergyWeight {
    /// Proportional to the weighted hit energy.
    #[cfg_attr(feature = "serde", serde(alias = "linear"))]
    None,
    /// `max(0, base + ln(E_hit / E_total))`.
    #[default]
    Log,
    /// Every hit counts equally.
    Constant,
}

impl EnergyWeight {
    /// Configuration name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Log => "log",
            Self::Constant => "constant",
        }
    }

    /// Position weight of a hit contributing `energy` to a cluster of raw
    /// energy `total`.
    #[inline]
    #[must_use]
    pub fn weight(self, energy: f64, total: f64, log_base: f64) -> f64 {
        match self {
            Self::None => energy,
            Self::Log => (log_base + (energy / total).ln()).max(0.0),
            Self::Constant => 1.0,
        }
    }
}

impl fmt::Display for EnergyWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnergyWeight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "linear" => Ok(Self::None),
            "log" => Ok(Self::Log),
            "constant" => Ok(Self::Constant),
            other => Err(Error::config(format!("unknown energy weight \"{other}\""))),
        }
    }
}

/// Configuration for centroid-of-gravity cluster reconstruction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct CogConfig {
    /// Position weighting scheme.
    pub energy_weight: EnergyWeight,
    /// Sampling fraction; cluster energy is the raw sum divided by it.
    pub samp_frac: f64,
    /// Offset of the logarithmic weight (default: 3.6).
    pub log_weight_base: f64,
    /// Shift of the centroid along the direction from the origin.
    pub depth_correction: f64,
    /// Geometry constant holding the module depth; overrides
    /// `depth_correction` when set.
    pub module_dim_z_name: Option<String>,
    /// Clip the centroid pseudorapidity to the range of the contributing hits.
    pub enable_eta_bounds: bool,
}

impl Default for CogConfig {
    fn default() -> Self {
        Self {
            energy_weight: EnergyWeight::Log,
            samp_frac: 1.0,
            log_weight_base: 3.6,
            depth_correction: 0.0,
            module_dim_z_name: None,
            enable_eta_bounds: false,
        }
    }
}

impl CogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hadronic endcap clusters.
    #[must_use]
    pub fn hcal_endcap_n() -> Self {
        Self::default().with_log_weight_base(6.2)
    }

    /// B0 island clusters.
    #[must_use]
    pub fn b0_ecal() -> Self {
        Self::default().with_log_weight_base(3.6)
    }

    /// Clusters built from truth-seeded proto-clusters.
    #[must_use]
    pub fn truth_clusters() -> Self {
        Self::default().with_log_weight_base(6.2)
    }

    /// Backward electromagnetic endcap clusters.
    #[must_use]
    pub fn ecal_endcap_n() -> Self {
        Self::default().with_log_weight_base(4.6)
    }

    /// Set the weighting scheme.
    #[must_use]
    pub fn with_energy_weight(mut self, weight: EnergyWeight) -> Self {
        self.energy_weight = weight;
        self
    }

    /// Set the sampling fraction.
    #[must_use]
    pub fn with_samp_frac(mut self, samp_frac: f64) -> Self {
        self.samp_frac = samp_frac;
        self
    }

    /// Set the logarithmic weight offset.
    #[must_use]
    pub fn with_log_weight_base(mut self, base: f64) -> Self {
        self.log_weight_base = base;
        self
    }

    /// Set the depth correction.
    #[must_use]
    pub fn with_depth_correction(mut self, depth: f64) -> Self {
        self.depth_correction = depth;
        self
    }

    /// Take the depth correction from a geometry constant.
    #[must_use]
    pub fn with_module_dim_z_name(mut self, name: impl Into<String>) -> Self {
        self.module_dim_z_name = Some(name.into());
        self
    }

    /// Enable or disable the eta constraint.
    #[must_use]
    pub fn with_eta_bounds(mut self, enable: bool) -> Self {
        self.enable_eta_bounds = enable;
        self
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !(self.samp_frac > 0.0 && self.samp_frac <= 1.0) {
            return Err(Error::config(format!(
                "samplingFraction must be in (0, 1], got {}",
                self.samp_frac
            )));
        }
        if !self.log_weight_base.is_finite() {
            return Err(Error::config(format!(
                "logWeightBase must be finite, got {}",
                self.log_weight_base
            )));
        }
        if !self.depth_correction.is_finite() {
            return Err(Error::config(format!(
                "depthCorrection must be finite, got {}",
                self.depth_correction
            )));
        }
        if self
            .module_dim_z_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(Error::config("moduleDimZName must not be blank"));
        }
        Ok(())
    }
}
