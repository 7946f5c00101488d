//! Truth particles and the per-event truth table.

use crate::error::{Error, Result};
use crate::hit::McId;
use crate::vector::Vector3;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Generator status of a stable final-state particle.
pub const GENERATOR_STATUS_FINAL_STATE: i32 = 1;

/// A simulated particle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TruthParticle {
    /// Stable per-event identifier.
    pub mc_id: McId,
    /// PDG particle code.
    pub pdg: i32,
    /// Generator status code.
    pub generator_status: i32,
    /// Electric charge in units of e.
    pub charge: f64,
    /// Rest mass.
    pub mass: f64,
    /// Three-momentum.
    pub momentum: Vector3,
    /// Production vertex.
    pub vertex: Vector3,
}

impl TruthParticle {
    /// Creates a final-state particle produced at the origin.
    #[must_use]
    pub fn new(mc_id: i32, pdg: i32, charge: f64, mass: f64, momentum: Vector3) -> Self {
        Self {
            mc_id: McId(mc_id),
            pdg,
            generator_status: GENERATOR_STATUS_FINAL_STATE,
            charge,
            mass,
            momentum,
            vertex: Vector3::ZERO,
        }
    }

    /// Sets the generator status.
    #[must_use]
    pub fn with_generator_status(mut self, status: i32) -> Self {
        self.generator_status = status;
        self
    }

    /// Sets the production vertex.
    #[must_use]
    pub fn with_vertex(mut self, vertex: Vector3) -> Self {
        self.vertex = vertex;
        self
    }

    /// Energy from the momentum and mass, `sqrt(p² + m²)`.
    #[must_use]
    pub fn energy(&self) -> f64 {
        (self.momentum.dot(&self.momentum) + self.mass * self.mass).sqrt()
    }

    /// True for particles with zero electric charge.
    #[inline]
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.charge.abs() < f64::EPSILON
    }

    /// True for stable final-state particles.
    #[inline]
    #[must_use]
    pub fn is_final_state(&self) -> bool {
        self.generator_status == GENERATOR_STATUS_FINAL_STATE
    }
}

/// Lookup table from [`McId`] to the event's truth particles.
///
/// Resolution is a bounded-time hash lookup that fails explicitly when the
/// id is absent, so "no truth" (a `None` reference) and "bad id" stay
/// distinguishable.
#[derive(Debug, Clone)]
pub struct TruthTable<'a> {
    particles: &'a [TruthParticle],
    by_id: HashMap<McId, usize>,
}

impl<'a> TruthTable<'a> {
    /// Indexes the given particles. Later duplicates of an id are ignored.
    #[must_use]
    pub fn new(particles: &'a [TruthParticle]) -> Self {
        let mut by_id = HashMap::with_capacity(particles.len());
        for (idx, particle) in particles.iter().enumerate() {
            if let Entry::Vacant(slot) = by_id.entry(particle.mc_id) {
                slot.insert(idx);
            } else {
                tracing::debug!(mc_id = %particle.mc_id, "duplicate truth id, keeping first");
            }
        }
        Self { particles, by_id }
    }

    /// Resolves an id to its particle.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTruthId`] if the id is not in the table.
    pub fn resolve(&self, id: McId) -> Result<&'a TruthParticle> {
        self.by_id
            .get(&id)
            .map(|&idx| &self.particles[idx])
            .ok_or(Error::UnknownTruthId(id))
    }

    /// Position of the particle in the input collection.
    #[must_use]
    pub fn position(&self, id: McId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// True if the id resolves.
    #[must_use]
    pub fn contains(&self, id: McId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Particles in input order.
    #[must_use]
    pub fn particles(&self) -> &'a [TruthParticle] {
        self.particles
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// True if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
