//! Lookup structures over a reconstructed-hit collection.

use crate::hit::{CellId, Hit, McId, SimHit};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Hits sharing one originating truth particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthGroup {
    /// The shared truth particle.
    pub mc_id: McId,
    /// Indices of the hits, ascending.
    pub hits: Vec<usize>,
}

/// Index over a hit collection by cell identity and by truth particle.
///
/// Everything is expressed as indices into the slice the index was built
/// from; the index borrows nothing and can outlive that borrow.
#[derive(Debug, Clone, Default)]
pub struct HitIndex {
    by_cell: HashMap<CellId, usize>,
    duplicate_cells: usize,
    by_truth: HashMap<McId, usize>,
    truth_groups: Vec<TruthGroup>,
    untruthed: Vec<usize>,
}

impl HitIndex {
    /// Indexes hits using each hit's own truth reference.
    #[must_use]
    pub fn new(hits: &[Hit]) -> Self {
        let truth: Vec<Option<McId>> = hits.iter().map(|hit| hit.truth).collect();
        Self::build(hits, &truth)
    }

    /// Indexes hits with an externally supplied truth reference per hit.
    ///
    /// # Errors
    /// Returns [`crate::Error::LengthMismatch`] if `truth_of` is not
    /// index-aligned with `hits`.
    pub fn with_truth(hits: &[Hit], truth_of: &[Option<McId>]) -> crate::Result<Self> {
        if hits.len() != truth_of.len() {
            return Err(crate::Error::LengthMismatch {
                what: "per-hit truth references",
                expected: hits.len(),
                actual: truth_of.len(),
            });
        }
        Ok(Self::build(hits, truth_of))
    }

    fn build(hits: &[Hit], truth_of: &[Option<McId>]) -> Self {
        let mut by_cell = HashMap::with_capacity(hits.len());
        let mut duplicate_cells = 0;
        for (idx, hit) in hits.iter().enumerate() {
            match by_cell.entry(hit.cell_id) {
                Entry::Vacant(slot) => {
                    slot.insert(idx);
                }
                Entry::Occupied(_) => duplicate_cells += 1,
            }
        }

        if duplicate_cells > 0 {
            tracing::debug!(
                duplicates = duplicate_cells,
                "hit collection repeats cell ids, first occurrence indexed"
            );
        }

        let mut index = Self {
            by_cell,
            duplicate_cells,
            ..Self::default()
        };
        index.group_truth(truth_of);
        index
    }

    fn group_truth(&mut self, truth_of: &[Option<McId>]) {
        self.by_truth.clear();
        self.truth_groups.clear();
        self.untruthed.clear();

        for (idx, truth) in truth_of.iter().enumerate() {
            let Some(mc_id) = *truth else {
                self.untruthed.push(idx);
                continue;
            };
            match self.by_truth.entry(mc_id) {
                Entry::Occupied(slot) => self.truth_groups[*slot.get()].hits.push(idx),
                Entry::Vacant(slot) => {
                    slot.insert(self.truth_groups.len());
                    self.truth_groups.push(TruthGroup {
                        mc_id,
                        hits: vec![idx],
                    });
                }
            }
        }
    }

    /// Regroups the indexed hits by an externally supplied truth reference
    /// per hit, keeping the cell lookup.
    ///
    /// # Errors
    /// Returns [`crate::Error::LengthMismatch`] if `truth_of` does not hold
    /// one entry per indexed hit.
    pub fn regroup(&mut self, truth_of: &[Option<McId>]) -> crate::Result<()> {
        let indexed = self.by_cell.len() + self.duplicate_cells;
        if truth_of.len() != indexed {
            return Err(crate::Error::LengthMismatch {
                what: "per-hit truth references",
                expected: indexed,
                actual: truth_of.len(),
            });
        }
        self.group_truth(truth_of);
        Ok(())
    }

    /// Truth particle of every hit as recorded by the truth hits.
    ///
    /// A hit takes the leading particle of the truth hit in its cell; a hit
    /// without one keeps its own reference. The second vector lists the
    /// truth hits whose cell holds no indexed hit.
    #[must_use]
    pub fn sim_truth(
        &self,
        hits: &[Hit],
        sim_hits: &[SimHit],
    ) -> (Vec<Option<McId>>, Vec<usize>) {
        let mut truth_of: Vec<Option<McId>> = hits.iter().map(|hit| hit.truth).collect();
        let mut orphans = Vec::new();
        for (sim_idx, sim) in sim_hits.iter().enumerate() {
            match self.find_cell(sim.cell_id) {
                Some(idx) if idx < truth_of.len() => {
                    if let Some(particle) = sim.leading_particle() {
                        truth_of[idx] = Some(particle);
                    }
                }
                _ => orphans.push(sim_idx),
            }
        }
        (truth_of, orphans)
    }

    /// Index of the first hit in the given cell.
    #[must_use]
    pub fn find_cell(&self, cell_id: CellId) -> Option<usize> {
        self.by_cell.get(&cell_id).copied()
    }

    /// Number of hits whose cell id had already been seen.
    #[must_use]
    pub fn duplicate_cells(&self) -> usize {
        self.duplicate_cells
    }

    /// Truth groups in order of first appearance.
    #[must_use]
    pub fn truth_groups(&self) -> &[TruthGroup] {
        &self.truth_groups
    }

    /// Hits referencing the given truth particle.
    #[must_use]
    pub fn hits_for(&self, mc_id: McId) -> &[usize] {
        self.by_truth
            .get(&mc_id)
            .map_or(&[][..], |&group| self.truth_groups[group].hits.as_slice())
    }

    /// Hits without any truth reference.
    #[must_use]
    pub fn untruthed(&self) -> &[usize] {
        &self.untruthed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector3;

    fn hit(cell: u64, truth: Option<i32>) -> Hit {
        let hit = Hit::new(cell, Vector3::ZERO, 1.0, 0.0);
        match truth {
            Some(id) => hit.with_truth(id),
            None => hit,
        }
    }

    #[test]
    fn test_lookup_by_cell() {
        let hits = vec![hit(10, None), hit(11, None), hit(10, None)];
        let index = HitIndex::new(&hits);
        assert_eq!(index.find_cell(CellId(10)), Some(0));
        assert_eq!(index.find_cell(CellId(11)), Some(1));
        assert_eq!(index.find_cell(CellId(12)), None);
        assert_eq!(index.duplicate_cells(), 1);
    }

    #[test]
    fn test_truth_groups_keep_first_appearance_order() {
        let hits = vec![
            hit(1, Some(7)),
            hit(2, Some(3)),
            hit(3, None),
            hit(4, Some(7)),
        ];
        let index = HitIndex::new(&hits);
        let ids: Vec<McId> = index.truth_groups().iter().map(|g| g.mc_id).collect();
        assert_eq!(ids, vec![McId(7), McId(3)]);
        assert_eq!(index.hits_for(McId(7)), &[0, 3]);
        assert_eq!(index.hits_for(McId(3)), &[1]);
        assert!(index.hits_for(McId(99)).is_empty());
        assert_eq!(index.untruthed(), &[2]);
    }

    #[test]
    fn test_with_truth_overrides_hit_references() {
        let hits = vec![hit(1, Some(7)), hit(2, None)];
        let index = HitIndex::with_truth(&hits, &[None, Some(McId(5))]).unwrap();
        assert_eq!(index.untruthed(), &[0]);
        assert_eq!(index.hits_for(McId(5)), &[1]);
    }

    #[test]
    fn test_with_truth_length_mismatch() {
        let hits = vec![hit(1, None)];
        let err = HitIndex::with_truth(&hits, &[]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_sim_truth_prefers_leading_particle() {
        let hits = vec![hit(1, Some(7)), hit(2, Some(8)), hit(3, None)];
        let mut empty = SimHit::new(2, Vector3::ZERO, 0.1, 0);
        empty.contributions.clear();
        let sims = vec![
            SimHit::new(3, Vector3::ZERO, 0.1, 4),
            SimHit::new(1, Vector3::ZERO, 0.1, 5),
            empty,
            SimHit::new(9, Vector3::ZERO, 0.1, 6),
        ];
        let index = HitIndex::new(&hits);
        let (truth_of, orphans) = index.sim_truth(&hits, &sims);
        assert_eq!(truth_of, vec![Some(McId(5)), Some(McId(8)), Some(McId(4))]);
        assert_eq!(orphans, vec![3]);
    }

    #[test]
    fn test_regroup_keeps_cells() {
        let hits = vec![hit(1, Some(7)), hit(2, None)];
        let mut index = HitIndex::new(&hits);
        index.regroup(&[Some(McId(2)), Some(McId(2))]).unwrap();
        assert_eq!(index.hits_for(McId(2)), &[0, 1]);
        assert!(index.hits_for(McId(7)).is_empty());
        assert!(index.untruthed().is_empty());
        assert_eq!(index.find_cell(CellId(2)), Some(1));
        assert!(index.regroup(&[None]).unwrap_err().is_config());
    }
}
