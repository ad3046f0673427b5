use super::AtomicStructure;
use crate::core::error::StructureError;
use crate::core::models::atom::Atom;
use crate::core::models::coordset::CoordSet;
use crate::core::models::element::Element;
use crate::core::models::ids::{AtomId, AtomRef};
use crate::core::models::residue::Residue;
use crate::core::models::topology::{Bond, take_endpoint_indices};
use crate::core::session::{
    CURRENT_SESSION_VERSION, SessionData, SessionError, SessionLayout, int_to_char, int_to_usize,
    layout_for, take_ints, take_string,
};
use crate::core::tracking::{ChangeTracker, EntityKey, SharedChangeTracker};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructureSlot {
    NumAtoms,
    NumBonds,
    NumResidues,
    NumCoordSets,
    ActiveCoordSet,
    NumGroups,
}

static STRUCTURE_LAYOUTS: &[SessionLayout<StructureSlot>] = &[SessionLayout {
    min_version: 1,
    max_version: CURRENT_SESSION_VERSION,
    ints: &[
        StructureSlot::NumAtoms,
        StructureSlot::NumBonds,
        StructureSlot::NumResidues,
        StructureSlot::NumCoordSets,
        StructureSlot::ActiveCoordSet,
        StructureSlot::NumGroups,
    ],
    num_floats: 0,
}];

#[derive(Debug, Default)]
struct Counts {
    atoms: usize,
    bonds: usize,
    residues: usize,
    coord_sets: usize,
    active: Option<usize>,
    groups: usize,
}

impl Counts {
    /// Rejects a header announcing more entities than the buffers can hold, before anything is
    /// reserved for them.
    fn check_fits(
        &self,
        version: u32,
        ints: &[i32],
        strings: &[String],
    ) -> Result<(), SessionError> {
        let min_ints = [
            (self.atoms, 1 + Atom::session_num_ints(version)?),
            (self.bonds, 2 + Bond::session_num_ints(version)?),
            (self.residues, 2 + Residue::session_num_ints(version)?),
            (self.coord_sets, CoordSet::session_num_ints(version)?),
        ]
        .iter()
        .fold(0usize, |sum, &(n, width)| {
            sum.saturating_add(n.saturating_mul(width))
        });
        if min_ints > ints.len() {
            return Err(SessionError::Truncated {
                what: "structure ints",
            });
        }
        let min_strings = self
            .atoms
            .saturating_add(self.residues.saturating_mul(3))
            .saturating_add(self.groups);
        if min_strings > strings.len() {
            return Err(SessionError::Truncated {
                what: "structure strings",
            });
        }
        Ok(())
    }
}

impl AtomicStructure {
    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(STRUCTURE_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(STRUCTURE_LAYOUTS, version)?.num_floats)
    }

    /// Snapshots the whole structure at the current session version.
    ///
    /// The header is followed by atoms, bonds, residues, coordinate sets and pseudobond groups.
    /// Cross references are written as atom indices; names go to the string buffer.
    pub fn session_save(&self) -> SessionData {
        let mut data = SessionData {
            version: CURRENT_SESSION_VERSION,
            ..SessionData::default()
        };
        let (ints, floats, strings) = (&mut data.ints, &mut data.floats, &mut data.strings);
        let index_of = |a: AtomId| self.atom_index(a).unwrap_or_default();

        for slot in STRUCTURE_LAYOUTS[0].ints {
            ints.push(match slot {
                StructureSlot::NumAtoms => self.num_atoms() as i32,
                StructureSlot::NumBonds => self.num_bonds() as i32,
                StructureSlot::NumResidues => self.num_residues() as i32,
                StructureSlot::NumCoordSets => self.num_coord_sets() as i32,
                StructureSlot::ActiveCoordSet => self.active_coord_set.map_or(-1, |i| i as i32),
                StructureSlot::NumGroups => self.pb_manager.num_groups() as i32,
            });
        }
        strings.push(self.name.clone());

        for (_, atom) in self.atoms() {
            strings.push(atom.name().to_string());
            ints.push(i32::from(atom.element().number()));
            atom.session_save(ints, floats);
        }
        for (_, bond) in self.bonds() {
            let [a, b] = bond.atoms();
            ints.extend([index_of(a) as i32, index_of(b) as i32]);
            bond.session_save(ints, floats);
        }
        for (_, residue) in self.residues() {
            strings.extend([
                residue.name().to_string(),
                residue.chain_id().to_string(),
                residue.mmcif_chain_id().to_string(),
            ]);
            ints.extend([residue.number(), residue.insertion_code() as i32]);
            residue.session_save(ints, floats, index_of);
        }
        for cs in &self.coord_sets {
            cs.session_save(ints, floats);
        }
        for group in self.pb_manager.groups() {
            strings.push(group.name().to_string());
            group.session_save(ints, floats, |r: AtomRef| {
                (r.structure == self.id)
                    .then(|| self.atom_index(r.atom))
                    .flatten()
            });
        }
        data
    }

    /// Rebuilds a structure from a snapshot, reporting to the thread's shared change tracker.
    pub fn session_restore(data: &SessionData) -> Result<Self, StructureError> {
        Self::session_restore_with(data, ChangeTracker::shared())
    }

    #[instrument(skip_all, fields(version = data.version))]
    pub fn session_restore_with(
        data: &SessionData,
        tracker: SharedChangeTracker,
    ) -> Result<Self, StructureError> {
        let version = data.version;
        let layout = layout_for(STRUCTURE_LAYOUTS, version)?;
        let (mut ints, mut floats, mut strings): (&[i32], &[f32], &[String]) =
            (&data.ints, &data.floats, &data.strings);

        let header = take_ints(&mut ints, layout.ints.len(), "structure")?;
        let mut counts = Counts::default();
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                StructureSlot::NumAtoms => counts.atoms = int_to_usize(value, "atom count")?,
                StructureSlot::NumBonds => counts.bonds = int_to_usize(value, "bond count")?,
                StructureSlot::NumResidues => {
                    counts.residues = int_to_usize(value, "residue count")?
                }
                StructureSlot::NumCoordSets => {
                    counts.coord_sets = int_to_usize(value, "coordinate set count")?
                }
                StructureSlot::ActiveCoordSet => {
                    counts.active = match value {
                        -1 => None,
                        v => Some(int_to_usize(v, "active coordinate set")?),
                    }
                }
                StructureSlot::NumGroups => counts.groups = int_to_usize(value, "group count")?,
            }
        }

        let name = take_string(&mut strings, "structure name")?;
        counts.check_fits(version, ints, strings)?;
        let mut s = AtomicStructure::with_tracker(name, tracker);

        let mut atom_ids = Vec::with_capacity(counts.atoms);
        for _ in 0..counts.atoms {
            let atom_name = take_string(&mut strings, "atom name")?;
            let number = take_ints(&mut ints, 1, "atom element")?[0];
            let element = u8::try_from(number)
                .ok()
                .and_then(Element::from_number)
                .ok_or(SessionError::BadValue {
                    field: "atom element",
                    value: i64::from(number),
                })?;
            let aid = s.new_atom(atom_name, element)?;
            if let Some(atom) = s.graph.vertex_mut(aid) {
                atom.session_restore(version, &mut ints, &mut floats)?;
            }
            atom_ids.push(aid);
        }
        let atom_at = |i: usize| {
            atom_ids.get(i).copied().ok_or(SessionError::BadValue {
                field: "atom index",
                value: i as i64,
            })
        };

        for _ in 0..counts.bonds {
            let [a, b] = take_endpoint_indices(&mut ints)?;
            let bid = s.bond_atoms(atom_at(a)?, atom_at(b)?)?;
            if let Some(bond) = s.graph.edge_mut(bid) {
                bond.session_restore(version, &mut ints, &mut floats)?;
            }
        }

        for _ in 0..counts.residues {
            let res_name = take_string(&mut strings, "residue name")?;
            let chain_id = take_string(&mut strings, "chain id")?;
            let mmcif_chain_id = take_string(&mut strings, "mmCIF chain id")?;
            let ident = take_ints(&mut ints, 2, "residue identity")?;
            let insertion_code = int_to_char(ident[1], "insertion code")?;
            let rid = s.new_residue(res_name, chain_id, ident[0], insertion_code, None, true)?;
            let members = s.residues[rid].session_restore(version, &mut ints, &mut floats)?;
            s.residues[rid].set_mmcif_chain_id(mmcif_chain_id);
            if s.residues[rid].ribbon_display() {
                s.ribbon_display_count += 1;
            }
            for index in members {
                s.add_atom_to_residue(rid, atom_at(index)?)?;
            }
        }

        for _ in 0..counts.coord_sets {
            let cs = CoordSet::session_restore(version, &mut ints, &mut floats)?;
            if s.find_coord_set(cs.id()).is_some() {
                return Err(StructureError::DuplicateCoordSet(cs.id()));
            }
            s.track_created(EntityKey::CoordSet(s.id, cs.id()))?;
            s.coord_sets.push(cs);
        }
        if let Some(index) = counts.active {
            let id = s
                .coord_sets
                .get(index)
                .map(CoordSet::id)
                .ok_or(SessionError::BadValue {
                    field: "active coordinate set",
                    value: index as i64,
                })?;
            s.set_active_coord_set(id)?;
        }

        let sid = s.id;
        for _ in 0..counts.groups {
            let group_name = take_string(&mut strings, "pseudobond group name")?;
            if let Some(group) = s.pb_manager.group_for(group_name, true) {
                group.session_restore(version, &mut ints, &mut floats, |i| {
                    atom_ids.get(i).map(|&a| AtomRef::new(sid, a))
                })?;
            }
        }

        debug!(
            atoms = s.num_atoms(),
            bonds = s.num_bonds(),
            residues = s.num_residues(),
            "Restored structure"
        );
        Ok(s)
    }
}
