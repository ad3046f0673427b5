use super::AtomicStructure;
use crate::core::error::StructureError;
use crate::core::models::ids::ResidueId;
use crate::core::tracking::{ChangeReason, EntityKey};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, instrument, trace};

impl AtomicStructure {
    /// For every residue with alternate locations, the alt-loc id with the largest summed
    /// occupancy over the residue's atoms. Ties go to the lexicographically smallest id.
    ///
    /// Results are listed in residue order.
    pub fn best_alt_locs(&self) -> Vec<(ResidueId, char)> {
        self.residues()
            .filter_map(|(rid, residue)| {
                let mut totals: BTreeMap<char, f32> = BTreeMap::new();
                for atom in residue.atoms().iter().filter_map(|&a| self.atom(a)) {
                    for (&id, record) in atom.alt_locs() {
                        *totals.entry(id).or_default() += record.occupancy;
                    }
                }
                let mut best: Option<(char, f32)> = None;
                for (id, total) in totals {
                    if best.is_none_or(|(_, max)| total > max) {
                        best = Some((id, total));
                    }
                }
                best.map(|(id, _)| (rid, id))
            })
            .collect()
    }

    /// Switches every residue with alternate locations to its best alt loc.
    #[instrument(skip_all, fields(structure = %self.name))]
    pub fn use_best_alt_locs(&mut self) -> Result<(), StructureError> {
        let best = self.best_alt_locs();
        debug!(residues = best.len(), "Applying best alt locs");
        for (rid, alt_loc) in best {
            self.set_residue_alt_loc(rid, alt_loc)?;
        }
        Ok(())
    }

    /// Selects alt loc `alt_loc` in a residue and in every residue reachable from it through
    /// bonds between atoms with identical alt-loc id sets.
    ///
    /// A space, or the residue's current alt loc, is a no-op. Fails if no atom of the residue
    /// has the requested alt loc.
    pub fn set_residue_alt_loc(
        &mut self,
        residue: ResidueId,
        alt_loc: char,
    ) -> Result<(), StructureError> {
        self.residue_checked(residue)?;
        let mut pending = VecDeque::from([residue]);

        while let Some(rid) = pending.pop_front() {
            let r = self.residue_checked(rid)?;
            if alt_loc == ' ' || r.alt_loc() == alt_loc {
                continue;
            }
            let members = r.atoms().to_vec();

            let mut switched = false;
            for aid in members {
                let atom = self.atom_checked(aid)?;
                if !atom.has_alt_loc(alt_loc) {
                    continue;
                }
                for neighbor in self.neighbors(aid) {
                    let Some(other) = self.atom(neighbor) else {
                        continue;
                    };
                    match other.residue() {
                        Some(nr) if nr != rid && other.same_alt_locs(atom) => {
                            if !pending.contains(&nr) {
                                pending.push_back(nr);
                            }
                        }
                        _ => {}
                    }
                }
                let coord = self
                    .graph
                    .vertex_mut(aid)
                    .and_then(|a| a.switch_alt_loc(alt_loc));
                if let Some(coord) = coord {
                    self.store_coord(aid, coord)?;
                    self.track_modified(self.atom_key(aid), ChangeReason::AltLoc);
                    switched = true;
                }
            }

            if !switched {
                return Err(StructureError::InvalidAltLoc {
                    residue: self.residue_label(rid),
                    alt_loc,
                });
            }
            self.residues[rid].set_alt_loc_raw(alt_loc);
            self.track_modified(EntityKey::Residue(self.id, rid), ChangeReason::AltLoc);
            trace!(residue = %self.residue_label(rid), %alt_loc, "Switched alt loc");
        }
        Ok(())
    }
}
