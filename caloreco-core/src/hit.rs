//! Calorimeter hit types.

use crate::vector::Vector3;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Detector-local readout cell identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CellId(pub u64);

impl CellId {
    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Per-event identifier of a truth (simulated) particle.
///
/// This is a weak reference: it names a row of the event's truth table and
/// owns nothing. Resolve it with [`crate::TruthTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct McId(pub i32);

impl fmt::Display for McId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reconstructed calorimeter hit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Hit {
    /// Readout cell.
    pub cell_id: CellId,
    /// Global position of the cell centre.
    pub position: Vector3,
    /// Position in the module's local frame.
    pub local: Vector3,
    /// Cell dimensions in the local frame.
    pub dimension: Vector3,
    /// Logical sector the cell belongs to.
    pub sector: i32,
    /// Layer number.
    pub layer: i32,
    /// Deposited energy.
    pub energy: f64,
    /// Hit time.
    pub time: f64,
    /// Hit time uncertainty.
    pub time_error: f64,
    /// Originating truth particle, if known.
    pub truth: Option<McId>,
}

impl Default for Hit {
    fn default() -> Self {
        Self {
            cell_id: CellId::default(),
            position: Vector3::ZERO,
            local: Vector3::ZERO,
            dimension: Vector3::ZERO,
            sector: 0,
            layer: 0,
            energy: 0.0,
            time: 0.0,
            time_error: 0.0,
            truth: None,
        }
    }
}

impl Hit {
    /// Creates a hit whose local frame coincides with the global one.
    #[must_use]
    pub fn new(cell_id: u64, position: Vector3, energy: f64, time: f64) -> Self {
        Self {
            cell_id: CellId(cell_id),
            position,
            local: position,
            energy,
            time,
            ..Self::default()
        }
    }

    /// Sets the local position.
    #[must_use]
    pub fn with_local(mut self, local: Vector3) -> Self {
        self.local = local;
        self
    }

    /// Sets the cell dimensions.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Vector3) -> Self {
        self.dimension = dimension;
        self
    }

    /// Sets the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: i32) -> Self {
        self.sector = sector;
        self
    }

    /// Sets the layer.
    #[must_use]
    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Sets the originating truth particle.
    #[must_use]
    pub fn with_truth(mut self, mc_id: i32) -> Self {
        self.truth = Some(McId(mc_id));
        self
    }

    /// Pseudorapidity of the hit position.
    #[inline]
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.position.eta()
    }

    /// True if the hit carries a positive, finite energy.
    #[inline]
    #[must_use]
    pub fn has_energy(&self) -> bool {
        self.energy > 0.0 && self.energy.is_finite()
    }
}

/// One particle's share of a truth-level hit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contribution {
    /// Contributing truth particle.
    pub particle: McId,
    /// Energy deposited by that particle.
    pub energy: f64,
    /// Time of the deposit.
    pub time: f64,
}

/// A truth-level (simulated) calorimeter hit.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimHit {
    /// Readout cell.
    pub cell_id: CellId,
    /// Total deposited energy.
    pub energy: f64,
    /// Global position.
    pub position: Vector3,
    /// Per-particle contributions, leading contribution first.
    pub contributions: Vec<Contribution>,
}

impl SimHit {
    /// Creates a truth hit with a single contributing particle.
    #[must_use]
    pub fn new(cell_id: u64, position: Vector3, energy: f64, particle: i32) -> Self {
        Self {
            cell_id: CellId(cell_id),
            energy,
            position,
            contributions: vec![Contribution {
                particle: McId(particle),
                energy,
                time: 0.0,
            }],
        }
    }

    /// The particle of the leading contribution.
    #[inline]
    #[must_use]
    pub fn leading_particle(&self) -> Option<McId> {
        self.contributions.first().map(|c| c.particle)
    }
}
