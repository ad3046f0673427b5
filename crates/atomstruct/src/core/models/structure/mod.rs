//! The atomic structure: owner of atoms, bonds, residues, coordinate sets, pseudobonds and
//! the derived chains.

mod alt_loc;
mod chains;
mod residues;
mod session;
mod templates;

pub use chains::MissingStructure;

use super::atom::{AltLocRecord, Atom, DrawMode};
use super::chain::Chain;
use super::color::Rgba;
use super::coordset::CoordSet;
use super::element::Element;
use super::graph::Graph;
use super::ids::{AtomId, AtomRef, BondId, ResidueId, StructureId};
use super::pseudobond::PseudobondManager;
use super::residue::{Residue, SsType};
use super::topology::{Bond, BondOrder};
use crate::core::error::StructureError;
use crate::core::tracking::{
    ChangeReason, ChangeTracker, DestructionNotifier, EntityKey, SharedChangeTracker,
};
use nalgebra::Point3;
use slotmap::SlotMap;
use std::fmt;
use tracing::{debug, trace, warn};

type AtomGraph = Graph<AtomId, Atom, BondId, Bond>;

/// A molecular model.
///
/// All entities are created through the structure's factories and addressed by handles that
/// stay valid until the entity itself is deleted. Every creation, deletion and tracked change is
/// reported to the structure's [`ChangeTracker`].
///
/// Structures share thread-local singletons through `Rc`, so they are neither `Send` nor
/// `Sync`: all access happens on the thread that created them.
pub struct AtomicStructure {
    id: StructureId,
    name: String,
    graph: AtomGraph,
    residues: SlotMap<ResidueId, Residue>,
    residue_order: Vec<ResidueId>,
    coord_sets: Vec<CoordSet>,
    active_coord_set: Option<usize>,
    pb_manager: PseudobondManager,
    chains: Option<Vec<Chain>>,
    ribbon_display_count: usize,
    tracker: SharedChangeTracker,
}

impl fmt::Debug for AtomicStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicStructure")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("atoms", &self.num_atoms())
            .field("bonds", &self.num_bonds())
            .field("residues", &self.num_residues())
            .field("coord_sets", &self.num_coord_sets())
            .finish_non_exhaustive()
    }
}

impl AtomicStructure {
    /// Creates an empty structure reporting to the thread's shared change tracker.
    pub fn new(name: &str) -> Self {
        Self::with_tracker(name, ChangeTracker::shared())
    }

    pub fn with_tracker(name: &str, tracker: SharedChangeTracker) -> Self {
        let id = StructureId::next();
        // Structure ids are never reused.
        if let Err(e) = tracker.borrow_mut().add_created(EntityKey::Structure(id)) {
            warn!(error = %e, structure = name, "Structure creation not recorded");
        }
        Self {
            id,
            name: name.to_string(),
            graph: Graph::new(),
            residues: SlotMap::with_key(),
            residue_order: Vec::new(),
            coord_sets: Vec::new(),
            active_coord_set: None,
            pb_manager: PseudobondManager::new(tracker.clone()),
            chains: None,
            ribbon_display_count: 0,
            tracker,
        }
    }

    pub fn structure_id(&self) -> StructureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn change_tracker(&self) -> &SharedChangeTracker {
        &self.tracker
    }

    // ---- read access ----

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.graph.vertex(id)
    }

    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        self.graph.edge(id)
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    /// Atom handles in creation order; an atom's position here is its coordinate index.
    pub fn atom_ids(&self) -> &[AtomId] {
        self.graph.vertex_ids()
    }

    pub fn bond_ids(&self) -> &[BondId] {
        self.graph.edge_ids()
    }

    pub fn residue_ids(&self) -> &[ResidueId] {
        &self.residue_order
    }

    pub fn atoms(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.graph.vertices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = (BondId, &Bond)> {
        self.graph.edges()
    }

    pub fn residues(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.residue_order.iter().map(|&id| (id, &self.residues[id]))
    }

    pub fn atom_index(&self, id: AtomId) -> Option<usize> {
        self.graph.vertex_index(id)
    }

    pub fn atom_ref(&self, id: AtomId) -> AtomRef {
        AtomRef::new(self.id, id)
    }

    pub fn num_atoms(&self) -> usize {
        self.graph.num_vertices()
    }

    pub fn num_bonds(&self) -> usize {
        self.graph.num_edges()
    }

    pub fn num_residues(&self) -> usize {
        self.residue_order.len()
    }

    pub fn num_coord_sets(&self) -> usize {
        self.coord_sets.len()
    }

    /// Number of residues whose ribbon is displayed.
    pub fn ribbon_display_count(&self) -> usize {
        self.ribbon_display_count
    }

    pub fn pseudobonds(&self) -> &PseudobondManager {
        &self.pb_manager
    }

    pub fn pseudobonds_mut(&mut self) -> &mut PseudobondManager {
        &mut self.pb_manager
    }

    /// Atoms bonded to `id`, in bond order.
    pub fn neighbors(&self, id: AtomId) -> Vec<AtomId> {
        self.atom(id)
            .map(|atom| {
                atom.bonds()
                    .iter()
                    .filter_map(|&b| self.graph.edge(b)?.other_atom(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn bond_between(&self, a: AtomId, b: AtomId) -> Option<BondId> {
        self.atom(a)?
            .bonds()
            .iter()
            .copied()
            .find(|&bid| self.graph.edge(bid).is_some_and(|bond| bond.connects(a, b)))
    }

    pub fn atoms_bonded(&self, a: AtomId, b: AtomId) -> bool {
        self.bond_between(a, b).is_some()
    }

    // ---- tracking helpers ----

    fn track_created(&self, key: EntityKey) -> Result<(), StructureError> {
        self.tracker.borrow_mut().add_created(key)?;
        Ok(())
    }

    fn track_modified(&self, key: EntityKey, reason: ChangeReason) {
        self.tracker.borrow_mut().add_modified(key, reason);
    }

    fn atom_key(&self, id: AtomId) -> EntityKey {
        EntityKey::Atom(self.id, id)
    }

    fn residue_key(&self, id: ResidueId) -> EntityKey {
        EntityKey::Residue(self.id, id)
    }

    fn bond_key(&self, id: BondId) -> EntityKey {
        EntityKey::Bond(self.id, id)
    }

    pub(crate) fn atom_checked(&self, id: AtomId) -> Result<&Atom, StructureError> {
        self.graph.vertex(id).ok_or(StructureError::AtomNotFound(id))
    }

    pub(crate) fn residue_checked(&self, id: ResidueId) -> Result<&Residue, StructureError> {
        self.residues
            .get(id)
            .ok_or(StructureError::ResidueNotFound(id))
    }

    // ---- factories ----

    /// Creates an atom that belongs to no residue yet; attach it with
    /// [`AtomicStructure::add_atom_to_residue`].
    pub fn new_atom(&mut self, name: &str, element: Element) -> Result<AtomId, StructureError> {
        let id = self.graph.add_vertex(Atom::new(name, element));
        for cs in &mut self.coord_sets {
            cs.push_placeholder();
        }
        self.track_created(self.atom_key(id))?;
        Ok(id)
    }

    /// Bonds two atoms of this structure.
    ///
    /// Atom handles are only meaningful inside the structure that issued them, so both ends
    /// are named by [`AtomRef`]; an atom of another structure is a [`StructureError::ForeignAtom`].
    pub fn new_bond(&mut self, a: AtomRef, b: AtomRef) -> Result<BondId, StructureError> {
        for atom in [a, b] {
            if atom.structure != self.id {
                return Err(StructureError::ForeignAtom { atom });
            }
        }
        self.bond_atoms(a.atom, b.atom)
    }

    /// Bonds two atoms already known to belong to this structure.
    pub(crate) fn bond_atoms(&mut self, a: AtomId, b: AtomId) -> Result<BondId, StructureError> {
        let res_a = self.atom_checked(a)?.residue();
        let res_b = self.atom_checked(b)?.residue();
        if a == b {
            return Err(StructureError::SelfBond(a));
        }
        if self.atoms_bonded(a, b) {
            return Err(StructureError::AlreadyBonded { a, b });
        }
        let id = self
            .graph
            .add_edge(Bond::new(a, b))
            .ok_or_else(|| {
                StructureError::InternalLogic("bond endpoints vanished during creation".to_string())
            })?;
        for atom in [a, b] {
            if let Some(atom) = self.graph.vertex_mut(atom) {
                atom.add_bond(id);
            }
        }
        if res_a != res_b {
            self.invalidate_chains();
        }
        self.track_created(self.bond_key(id))?;
        Ok(id)
    }

    /// Inserts a residue at the end of the residue order, or next to `neighbor`.
    pub fn new_residue(
        &mut self,
        name: &str,
        chain_id: &str,
        number: i32,
        insertion_code: char,
        neighbor: Option<ResidueId>,
        after: bool,
    ) -> Result<ResidueId, StructureError> {
        let position = match neighbor {
            None => self.residue_order.len(),
            Some(n) => {
                let pos = self
                    .residue_order
                    .iter()
                    .position(|&r| r == n)
                    .ok_or(StructureError::ResidueNotFound(n))?;
                if after { pos + 1 } else { pos }
            }
        };
        let id = self
            .residues
            .insert(Residue::new(name, chain_id, number, insertion_code));
        self.residue_order.insert(position, id);
        self.invalidate_chains();
        self.track_created(self.residue_key(id))?;
        Ok(id)
    }

    /// Creates a coordinate set. The id defaults to one past the largest existing id, the size
    /// to the current atom count.
    pub fn new_coord_set(
        &mut self,
        index: Option<i32>,
        size: Option<usize>,
    ) -> Result<i32, StructureError> {
        let id = match index {
            Some(i) if self.find_coord_set(i).is_some() => {
                return Err(StructureError::DuplicateCoordSet(i));
            }
            Some(i) => i,
            None => self
                .coord_sets
                .iter()
                .map(CoordSet::id)
                .max()
                .map_or(0, |max| max + 1),
        };
        let size = size.unwrap_or_else(|| self.num_atoms());
        self.coord_sets.push(CoordSet::new(id, size));
        self.track_created(EntityKey::CoordSet(self.id, id))?;
        Ok(id)
    }

    // ---- residue membership ----

    pub fn add_atom_to_residue(
        &mut self,
        residue: ResidueId,
        atom: AtomId,
    ) -> Result<(), StructureError> {
        self.residue_checked(residue)?;
        let a = self.atom_checked(atom)?;
        if a.residue().is_some() {
            return Err(StructureError::AtomAlreadyInResidue(atom));
        }
        let name = a.name().to_string();
        self.residues[residue].add_atom(&name, atom);
        if let Some(a) = self.graph.vertex_mut(atom) {
            a.set_residue(Some(residue));
        }
        self.invalidate_chains();
        Ok(())
    }

    /// Detaches an atom from its residue without deleting it.
    pub fn remove_atom_from_residue(
        &mut self,
        residue: ResidueId,
        atom: AtomId,
    ) -> Result<(), StructureError> {
        self.residue_checked(residue)?;
        let name = self.atom_checked(atom)?.name().to_string();
        if !self.residues[residue].remove_atom(&name, atom) {
            return Err(StructureError::AtomNotInResidue { atom, residue });
        }
        if let Some(a) = self.graph.vertex_mut(atom) {
            a.set_residue(None);
        }
        self.invalidate_chains();
        Ok(())
    }

    // ---- coordinate sets ----

    pub fn coord_sets(&self) -> &[CoordSet] {
        &self.coord_sets
    }

    pub fn find_coord_set(&self, id: i32) -> Option<&CoordSet> {
        self.coord_sets.iter().find(|cs| cs.id() == id)
    }

    /// Mutable access for readers filling a frame; changes made here are not tracked.
    pub fn find_coord_set_mut(&mut self, id: i32) -> Option<&mut CoordSet> {
        self.coord_sets.iter_mut().find(|cs| cs.id() == id)
    }

    /// Replaces every coordinate of set `id` in one pass. `coords` must hold one point per atom.
    pub fn fill_coord_set(
        &mut self,
        id: i32,
        coords: Vec<Point3<f64>>,
    ) -> Result<(), StructureError> {
        let atoms = self.num_atoms();
        let cs = self
            .coord_sets
            .iter_mut()
            .find(|cs| cs.id() == id)
            .ok_or(StructureError::CoordSetNotFound(id))?;
        if coords.len() != atoms {
            return Err(StructureError::CoordSetSizeMismatch {
                id,
                coords: coords.len(),
                atoms,
            });
        }
        cs.fill(coords);
        self.track_modified(EntityKey::CoordSet(self.id, id), ChangeReason::Coord);
        Ok(())
    }

    pub fn active_coord_set(&self) -> Option<&CoordSet> {
        self.active_coord_set.map(|i| &self.coord_sets[i])
    }

    /// Makes `id` the coordinate set that supplies atom positions.
    pub fn set_active_coord_set(&mut self, id: i32) -> Result<(), StructureError> {
        let index = self
            .coord_sets
            .iter()
            .position(|cs| cs.id() == id)
            .ok_or(StructureError::CoordSetNotFound(id))?;
        let coords = self.coord_sets[index].len();
        if coords != self.num_atoms() {
            return Err(StructureError::CoordSetSizeMismatch {
                id,
                coords,
                atoms: self.num_atoms(),
            });
        }
        if self.active_coord_set != Some(index) {
            self.active_coord_set = Some(index);
            self.track_modified(EntityKey::Structure(self.id), ChangeReason::ActiveCoordSet);
        }
        Ok(())
    }

    /// The atom's position in the active coordinate set.
    pub fn coord(&self, atom: AtomId) -> Option<Point3<f64>> {
        let index = self.graph.vertex_index(atom)?;
        self.active_coord_set()?.get(index).copied()
    }

    /// Index into the active coordinate set, creating and activating a first set if the
    /// structure has none.
    fn active_index_or_create(&mut self) -> Result<usize, StructureError> {
        if let Some(i) = self.active_coord_set {
            return Ok(i);
        }
        if self.coord_sets.is_empty() {
            self.new_coord_set(None, None)?;
        }
        let id = self.coord_sets[0].id();
        self.set_active_coord_set(id)?;
        Ok(0)
    }

    fn store_coord(&mut self, atom: AtomId, coord: Point3<f64>) -> Result<(), StructureError> {
        let index = self
            .graph
            .vertex_index(atom)
            .ok_or(StructureError::AtomNotFound(atom))?;
        let cs = self.active_index_or_create()?;
        if !self.coord_sets[cs].set(index, coord) {
            return Err(StructureError::InternalLogic(format!(
                "atom index {index} outside active coordinate set"
            )));
        }
        self.track_modified(self.atom_key(atom), ChangeReason::Coord);
        Ok(())
    }

    /// Moves an atom in the active coordinate set (and in its current alt loc, if any).
    pub fn set_coord(&mut self, atom: AtomId, coord: Point3<f64>) -> Result<(), StructureError> {
        self.store_coord(atom, coord)?;
        if let Some(a) = self.graph.vertex_mut(atom) {
            let alt = a.alt_loc();
            if alt != ' ' {
                if let Some(record) = a.alt_loc_record_mut(alt) {
                    record.coord = coord;
                }
            }
        }
        Ok(())
    }

    // ---- deletion ----

    /// Deletes an atom together with its bonds and any pseudobonds touching it.
    ///
    /// The atom's residue is kept even if this leaves it empty.
    pub fn delete_atom(&mut self, atom: AtomId) -> Result<(), StructureError> {
        let a = self.atom_checked(atom)?;
        let bonds = a.bonds().to_vec();
        let residue = a.residue();
        let name = a.name().to_string();
        let _notifier = DestructionNotifier::new(&self.tracker, self.atom_key(atom));

        for bond in bonds {
            self.delete_bond(bond)?;
        }
        let atom_ref = self.atom_ref(atom);
        let mut removed = self.pb_manager.remove_atom(atom_ref);
        if let Some(global) = PseudobondManager::try_global() {
            removed += global.borrow_mut().remove_atom(atom_ref);
        }
        if let Some(index) = self.graph.vertex_index(atom) {
            for cs in &mut self.coord_sets {
                cs.remove_index(index);
            }
        }
        if let Some(r) = residue.and_then(|r| self.residues.get_mut(r)) {
            r.remove_atom(&name, atom);
            self.chains = None;
        }
        self.graph.delete_vertex(atom);
        trace!(?atom, pseudobonds = removed, "Deleted atom");
        Ok(())
    }

    /// Removes a bond from both endpoints and from the structure.
    pub fn delete_bond(&mut self, bond: BondId) -> Result<(), StructureError> {
        let endpoints = self
            .graph
            .edge(bond)
            .ok_or(StructureError::BondNotFound(bond))?
            .atoms();
        let _notifier = DestructionNotifier::new(&self.tracker, self.bond_key(bond));

        let mut residues = [None; 2];
        for (slot, atom) in residues.iter_mut().zip(endpoints) {
            if let Some(a) = self.graph.vertex_mut(atom) {
                a.remove_bond(bond);
                *slot = a.residue();
            }
        }
        if residues[0] != residues[1] {
            self.invalidate_chains();
        }
        self.graph.delete_edge(bond);
        Ok(())
    }

    /// Deletes a residue and every atom in it.
    pub fn delete_residue(&mut self, residue: ResidueId) -> Result<(), StructureError> {
        let atoms = self.residue_checked(residue)?.atoms().to_vec();
        let _notifier = DestructionNotifier::new(&self.tracker, self.residue_key(residue));

        for atom in atoms {
            self.delete_atom(atom)?;
        }
        if let Some(r) = self.residues.remove(residue) {
            if r.ribbon_display() {
                self.ribbon_display_count -= 1;
            }
        }
        self.residue_order.retain(|&r| r != residue);
        self.invalidate_chains();
        debug!(?residue, "Deleted residue");
        Ok(())
    }

    // ---- tracked atom state ----

    fn modify_atom(
        &mut self,
        id: AtomId,
        reason: ChangeReason,
        change: impl FnOnce(&mut Atom) -> bool,
    ) -> Result<(), StructureError> {
        let atom = self
            .graph
            .vertex_mut(id)
            .ok_or(StructureError::AtomNotFound(id))?;
        if change(atom) {
            self.track_modified(self.atom_key(id), reason);
        }
        Ok(())
    }

    pub fn set_atom_name(&mut self, id: AtomId, name: &str) -> Result<(), StructureError> {
        let atom = self.atom_checked(id)?;
        let old = atom.name().to_string();
        if old == name {
            return Ok(());
        }
        if let Some(r) = atom.residue().and_then(|r| self.residues.get_mut(r)) {
            r.rename_atom(&old, name, id);
            if chains::is_chain_defining(&old) || chains::is_chain_defining(name) {
                self.invalidate_chains();
            }
        }
        self.modify_atom(id, ChangeReason::Name, |a| {
            a.set_name(name);
            true
        })
    }

    pub fn set_atom_element(&mut self, id: AtomId, element: Element) -> Result<(), StructureError> {
        let atom = self.atom_checked(id)?;
        if atom.element() != element
            && atom.residue().is_some()
            && chains::is_chain_defining(atom.name())
        {
            self.invalidate_chains();
        }
        self.modify_atom(id, ChangeReason::Element, |a| {
            let changed = a.element() != element;
            a.set_element(element);
            changed
        })
    }

    pub fn set_atom_display(&mut self, id: AtomId, display: bool) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Displayed, |a| {
            std::mem::replace(&mut a.display, display) != display
        })
    }

    pub fn set_atom_hide(&mut self, id: AtomId, hide: u32) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Displayed, |a| {
            std::mem::replace(&mut a.hide, hide) != hide
        })
    }

    pub fn set_atom_draw_mode(&mut self, id: AtomId, mode: DrawMode) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Displayed, |a| {
            std::mem::replace(&mut a.draw_mode, mode) != mode
        })
    }

    pub fn set_atom_selected(&mut self, id: AtomId, selected: bool) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Selected, |a| {
            std::mem::replace(&mut a.selected, selected) != selected
        })
    }

    pub fn set_atom_occupancy(&mut self, id: AtomId, occupancy: f32) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Occupancy, |a| {
            std::mem::replace(&mut a.occupancy, occupancy) != occupancy
        })
    }

    pub fn set_atom_bfactor(&mut self, id: AtomId, bfactor: f32) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::BFactor, |a| {
            std::mem::replace(&mut a.bfactor, bfactor) != bfactor
        })
    }

    pub fn set_atom_radius(&mut self, id: AtomId, radius: Option<f32>) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::Radius, |a| {
            std::mem::replace(&mut a.radius, radius) != radius
        })
    }

    /// Stores an alternate location for an atom. The first alt loc an atom receives becomes
    /// its current one.
    pub fn add_alt_loc(
        &mut self,
        id: AtomId,
        alt_loc: char,
        record: AltLocRecord,
    ) -> Result<(), StructureError> {
        let atom = self
            .graph
            .vertex_mut(id)
            .ok_or(StructureError::AtomNotFound(id))?;
        atom.insert_alt_loc(alt_loc, record);
        if atom.alt_loc() == ' ' {
            if let Some(coord) = atom.switch_alt_loc(alt_loc) {
                self.store_coord(id, coord)?;
            }
        }
        self.track_modified(self.atom_key(id), ChangeReason::AltLoc);
        Ok(())
    }

    /// Drops every alternate location of an atom, keeping its current position.
    pub fn clear_alt_locs(&mut self, id: AtomId) -> Result<(), StructureError> {
        self.modify_atom(id, ChangeReason::AltLoc, |a| {
            let had = !a.alt_locs().is_empty();
            a.clear_alt_locs();
            had
        })
    }

    // ---- tracked bond state ----

    fn modify_bond(
        &mut self,
        id: BondId,
        reason: ChangeReason,
        change: impl FnOnce(&mut Bond) -> bool,
    ) -> Result<(), StructureError> {
        let bond = self
            .graph
            .edge_mut(id)
            .ok_or(StructureError::BondNotFound(id))?;
        if change(bond) {
            self.track_modified(self.bond_key(id), reason);
        }
        Ok(())
    }

    pub fn set_bond_order(&mut self, id: BondId, order: BondOrder) -> Result<(), StructureError> {
        self.modify_bond(id, ChangeReason::BondOrder, |b| {
            std::mem::replace(&mut b.order, order) != order
        })
    }

    pub fn set_bond_display(&mut self, id: BondId, display: bool) -> Result<(), StructureError> {
        self.modify_bond(id, ChangeReason::Displayed, |b| {
            std::mem::replace(&mut b.display, display) != display
        })
    }

    pub fn set_bond_color(&mut self, id: BondId, color: Rgba) -> Result<(), StructureError> {
        self.modify_bond(id, ChangeReason::Color, |b| {
            std::mem::replace(&mut b.color, color) != color
        })
    }

    // ---- tracked residue state ----

    fn modify_residue(
        &mut self,
        id: ResidueId,
        reason: ChangeReason,
        change: impl FnOnce(&mut Residue) -> bool,
    ) -> Result<(), StructureError> {
        let residue = self
            .residues
            .get_mut(id)
            .ok_or(StructureError::ResidueNotFound(id))?;
        if change(residue) {
            self.track_modified(self.residue_key(id), reason);
        }
        Ok(())
    }

    /// Selects or deselects a residue's ribbon; reports `selected` only on an actual change.
    pub fn set_ribbon_selected(&mut self, id: ResidueId, selected: bool) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::Selected, |r| {
            let changed = r.ribbon_selected() != selected;
            r.set_ribbon_selected_raw(selected);
            changed
        })
    }

    pub fn set_ribbon_display(&mut self, id: ResidueId, display: bool) -> Result<(), StructureError> {
        let current = self.residue_checked(id)?.ribbon_display();
        if current == display {
            return Ok(());
        }
        if display {
            self.ribbon_display_count += 1;
        } else {
            self.ribbon_display_count -= 1;
        }
        self.modify_residue(id, ChangeReason::Ribbon, |r| {
            r.set_ribbon_display(display);
            true
        })
    }

    pub fn set_ribbon_color(&mut self, id: ResidueId, color: Rgba) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::RibbonColor, |r| {
            let changed = r.ribbon_color() != color;
            r.set_ribbon_color(color);
            changed
        })
    }

    pub fn set_ribbon_adjust(&mut self, id: ResidueId, adjust: f32) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::Ribbon, |r| {
            let changed = r.ribbon_adjust() != adjust;
            r.set_ribbon_adjust(adjust);
            changed
        })
    }

    pub fn set_ribbon_hide_backbone(&mut self, id: ResidueId, hide: bool) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::Ribbon, |r| {
            let changed = r.ribbon_hide_backbone() != hide;
            r.set_ribbon_hide_backbone(hide);
            changed
        })
    }

    pub fn set_ss_type(&mut self, id: ResidueId, ss_type: SsType) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::SecondaryStructure, |r| {
            let changed = r.ss_type() != ss_type;
            r.set_ss_type(ss_type);
            changed
        })
    }

    pub fn set_ss_id(&mut self, id: ResidueId, ss_id: i32) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::SecondaryStructure, |r| {
            let changed = r.ss_id() != ss_id;
            r.set_ss_id(ss_id);
            changed
        })
    }

    pub fn set_is_het(&mut self, id: ResidueId, is_het: bool) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::Het, |r| {
            let changed = r.is_het() != is_het;
            r.set_is_het(is_het);
            changed
        })
    }

    pub fn set_mmcif_chain_id(&mut self, id: ResidueId, chain_id: &str) -> Result<(), StructureError> {
        self.modify_residue(id, ChangeReason::ChainId, |r| {
            let changed = r.mmcif_chain_id() != chain_id;
            r.set_mmcif_chain_id(chain_id);
            changed
        })
    }
}

impl Drop for AtomicStructure {
    fn drop(&mut self) {
        let tracker = self.tracker.clone();
        let _structure = DestructionNotifier::new(&tracker, EntityKey::Structure(self.id));

        let mut doomed: Vec<DestructionNotifier> = Vec::with_capacity(
            self.num_atoms() + self.num_bonds() + self.num_residues() + self.num_coord_sets(),
        );
        doomed.extend(
            self.bond_ids()
                .iter()
                .map(|&b| DestructionNotifier::new(&tracker, self.bond_key(b))),
        );
        doomed.extend(
            self.atom_ids()
                .iter()
                .map(|&a| DestructionNotifier::new(&tracker, self.atom_key(a))),
        );
        doomed.extend(
            self.residue_order
                .iter()
                .map(|&r| DestructionNotifier::new(&tracker, self.residue_key(r))),
        );
        doomed.extend(self.coord_sets.iter().map(|cs| {
            DestructionNotifier::new(&tracker, EntityKey::CoordSet(self.id, cs.id()))
        }));

        self.pb_manager.clear();
        if let Some(global) = PseudobondManager::try_global() {
            if let Ok(mut global) = global.try_borrow_mut() {
                global.remove_structure(self.id);
            }
        }
        drop(doomed);
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::core::models::element::Element;

    pub(crate) fn isolated_structure() -> AtomicStructure {
        AtomicStructure::with_tracker("test", ChangeTracker::new_shared())
    }

    /// Adds a residue and one atom per `(name, element)`, returning the atom handles.
    pub(crate) fn add_residue(
        s: &mut AtomicStructure,
        name: &str,
        chain_id: &str,
        number: i32,
        atoms: &[(&str, Element)],
    ) -> (ResidueId, Vec<AtomId>) {
        let rid = s.new_residue(name, chain_id, number, ' ', None, true).unwrap();
        let ids = atoms
            .iter()
            .map(|&(atom_name, element)| {
                let aid = s.new_atom(atom_name, element).unwrap();
                s.add_atom_to_residue(rid, aid).unwrap();
                aid
            })
            .collect();
        (rid, ids)
    }

    /// A peptide of `n` backbone-only residues with `C(i)-N(i+1)` bonds.
    pub(crate) fn peptide(s: &mut AtomicStructure, chain_id: &str, n: i32) -> Vec<ResidueId> {
        let mut residues = Vec::new();
        let mut prev_c: Option<AtomId> = None;
        for i in 1..=n {
            let (rid, atoms) = add_residue(
                s,
                "GLY",
                chain_id,
                i,
                &[("N", Element::N), ("CA", Element::C), ("C", Element::C)],
            );
            s.bond_atoms(atoms[0], atoms[1]).unwrap();
            s.bond_atoms(atoms[1], atoms[2]).unwrap();
            if let Some(c) = prev_c {
                s.bond_atoms(c, atoms[0]).unwrap();
            }
            prev_c = Some(atoms[2]);
            residues.push(rid);
        }
        residues
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::core::models::pseudobond::METAL_COORDINATION;
    use crate::core::tracking::Category;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_atom_extends_every_coord_set() {
        let mut s = isolated_structure();
        let a = s.new_atom("CA", Element::C).unwrap();
        s.new_coord_set(None, None).unwrap();
        s.new_coord_set(Some(5), None).unwrap();
        let b = s.new_atom("N", Element::N).unwrap();

        assert_eq!(s.num_coord_sets(), 2);
        assert!(s.coord_sets().iter().all(|cs| cs.len() == 2));
        assert_eq!(s.atom_index(a), Some(0));
        assert_eq!(s.atom_index(b), Some(1));
        assert!(s.atom(a).unwrap().residue().is_none());
    }

    #[test]
    fn new_bond_validates_its_endpoints() {
        let mut s = isolated_structure();
        let a = s.new_atom("C", Element::C).unwrap();
        let b = s.new_atom("O", Element::O).unwrap();
        let (ra, rb) = (s.atom_ref(a), s.atom_ref(b));
        let bond = s.new_bond(ra, rb).unwrap();

        assert_eq!(s.atom(a).unwrap().bonds(), &[bond]);
        assert_eq!(s.atom(b).unwrap().bonds(), &[bond]);
        assert!(matches!(s.new_bond(ra, ra), Err(StructureError::SelfBond(_))));
        assert!(matches!(
            s.new_bond(rb, ra),
            Err(StructureError::AlreadyBonded { .. })
        ));
        assert_eq!(s.neighbors(a), [b]);
    }

    #[test]
    fn bonding_atoms_of_another_structure_is_rejected() {
        let mut s1 = isolated_structure();
        let mut s2 = isolated_structure();
        let a = s1.new_atom("C", Element::C).unwrap();
        let b = s2.new_atom("C", Element::C).unwrap();
        let err = s1.new_bond(s1.atom_ref(a), s2.atom_ref(b)).unwrap_err();
        assert!(matches!(err, StructureError::ForeignAtom { atom } if atom == s2.atom_ref(b)));
        assert_eq!(s1.num_bonds(), 0);
    }

    #[test]
    fn foreign_atom_with_a_colliding_handle_does_not_bond_a_local_atom() {
        let mut s1 = isolated_structure();
        let mut s2 = isolated_structure();
        let n1 = s1.new_atom("N", Element::N).unwrap();
        let ca1 = s1.new_atom("CA", Element::C).unwrap();
        s2.new_atom("O", Element::O).unwrap();
        let c2 = s2.new_atom("C", Element::C).unwrap();
        assert_eq!(ca1, c2);

        let err = s1.new_bond(s1.atom_ref(n1), s2.atom_ref(c2)).unwrap_err();
        assert!(matches!(err, StructureError::ForeignAtom { .. }));
        assert!(!s1.atoms_bonded(n1, ca1));
        assert_eq!(s1.num_bonds(), 0);
    }

    #[test]
    fn new_residue_honors_neighbor_placement() {
        let mut s = isolated_structure();
        let r1 = s.new_residue("ALA", "A", 1, ' ', None, true).unwrap();
        let r3 = s.new_residue("GLY", "A", 3, ' ', None, true).unwrap();
        let r2 = s.new_residue("SER", "A", 2, ' ', Some(r3), false).unwrap();
        let r4 = s.new_residue("LYS", "A", 4, ' ', Some(r3), true).unwrap();
        assert_eq!(s.residue_ids(), &[r1, r2, r3, r4]);
    }

    #[test]
    fn residue_membership_is_exclusive() {
        let mut s = isolated_structure();
        let (r1, atoms) = add_residue(&mut s, "ALA", "A", 1, &[("CA", Element::C)]);
        let r2 = s.new_residue("GLY", "A", 2, ' ', None, true).unwrap();
        assert!(matches!(
            s.add_atom_to_residue(r2, atoms[0]),
            Err(StructureError::AtomAlreadyInResidue(_))
        ));
        s.remove_atom_from_residue(r1, atoms[0]).unwrap();
        assert!(s.residue(r1).unwrap().atoms().is_empty());
        s.add_atom_to_residue(r2, atoms[0]).unwrap();
        assert_eq!(s.atom(atoms[0]).unwrap().residue(), Some(r2));
        assert!(matches!(
            s.remove_atom_from_residue(r1, atoms[0]),
            Err(StructureError::AtomNotInResidue { .. })
        ));
    }

    #[test]
    fn coord_set_ids_default_and_duplicates_fail() {
        let mut s = isolated_structure();
        assert_eq!(s.new_coord_set(None, None).unwrap(), 0);
        assert_eq!(s.new_coord_set(Some(4), None).unwrap(), 4);
        assert_eq!(s.new_coord_set(None, None).unwrap(), 5);
        assert!(matches!(
            s.new_coord_set(Some(4), None),
            Err(StructureError::DuplicateCoordSet(4))
        ));
    }

    #[test]
    fn active_coord_set_requires_matching_size_and_is_tracked() {
        let mut s = isolated_structure();
        s.new_atom("CA", Element::C).unwrap();
        s.new_coord_set(Some(1), Some(3)).unwrap();
        s.new_coord_set(Some(2), None).unwrap();
        assert!(matches!(
            s.set_active_coord_set(1),
            Err(StructureError::CoordSetSizeMismatch {
                coords: 3,
                atoms: 1,
                ..
            })
        ));
        assert!(matches!(
            s.set_active_coord_set(9),
            Err(StructureError::CoordSetNotFound(9))
        ));

        s.change_tracker().borrow_mut().clear();
        s.set_active_coord_set(2).unwrap();
        assert_eq!(s.active_coord_set().unwrap().id(), 2);
        let t = s.change_tracker().borrow();
        let structures = t.changes().category(Category::Structure);
        assert!(structures.reasons().contains(&ChangeReason::ActiveCoordSet));
    }

    #[test]
    fn switching_coord_sets_switches_positions() {
        let mut s = isolated_structure();
        let a = s.new_atom("CA", Element::C).unwrap();
        s.set_coord(a, Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(s.num_coord_sets(), 1);

        let frame = s.new_coord_set(None, None).unwrap();
        s.find_coord_set_mut(frame)
            .unwrap()
            .set(0, Point3::new(9.0, 9.0, 9.0));
        assert_eq!(s.coord(a), Some(Point3::new(1.0, 0.0, 0.0)));
        s.set_active_coord_set(frame).unwrap();
        assert_eq!(s.coord(a), Some(Point3::new(9.0, 9.0, 9.0)));
    }

    #[test]
    fn filling_a_coord_set_keeps_one_coordinate_per_atom() {
        let mut s = isolated_structure();
        let a = s.new_atom("CA", Element::C).unwrap();
        s.set_coord(a, Point3::new(1.0, 2.0, 3.0)).unwrap();
        let active = s.active_coord_set().unwrap().id();

        assert!(matches!(
            s.fill_coord_set(active, Vec::new()),
            Err(StructureError::CoordSetSizeMismatch {
                coords: 0,
                atoms: 1,
                ..
            })
        ));
        assert!(matches!(
            s.fill_coord_set(42, vec![Point3::origin()]),
            Err(StructureError::CoordSetNotFound(42))
        ));
        assert_eq!(s.active_coord_set().unwrap().len(), 1);
        assert_eq!(s.coord(a), Some(Point3::new(1.0, 2.0, 3.0)));

        s.change_tracker().borrow_mut().clear();
        s.fill_coord_set(active, vec![Point3::new(4.0, 5.0, 6.0)])
            .unwrap();
        assert_eq!(s.coord(a), Some(Point3::new(4.0, 5.0, 6.0)));
        s.set_coord(a, Point3::origin()).unwrap();
        let t = s.change_tracker().borrow();
        assert!(t
            .changes()
            .category(Category::CoordSet)
            .reasons()
            .contains(&ChangeReason::Coord));
    }

    #[test]
    fn delete_atom_cascades_and_keeps_indices_dense() {
        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(
            &mut s,
            "ALA",
            "A",
            1,
            &[("N", Element::N), ("CA", Element::C), ("C", Element::C)],
        );
        let (n, ca, c) = (atoms[0], atoms[1], atoms[2]);
        s.bond_atoms(n, ca).unwrap();
        s.bond_atoms(ca, c).unwrap();
        s.set_coord(c, Point3::new(3.0, 0.0, 0.0)).unwrap();
        let (n_ref, ca_ref) = (s.atom_ref(n), s.atom_ref(ca));
        s.pseudobonds_mut()
            .group_for(METAL_COORDINATION, false)
            .unwrap()
            .new_pseudobond(n_ref, ca_ref);
        s.change_tracker().borrow_mut().clear();

        s.delete_atom(ca).unwrap();

        assert_eq!(s.num_atoms(), 2);
        assert_eq!(s.num_bonds(), 0);
        assert!(s.atom(n).unwrap().bonds().is_empty());
        assert_eq!(s.residue(rid).unwrap().atoms(), &[n, c]);
        assert_eq!(s.atom_index(c), Some(1));
        assert_eq!(s.active_coord_set().unwrap().len(), 2);
        assert_eq!(s.coord(c), Some(Point3::new(3.0, 0.0, 0.0)));
        assert_eq!(
            s.pseudobonds()
                .group(METAL_COORDINATION)
                .unwrap()
                .num_pseudobonds(),
            0
        );

        let t = s.change_tracker().borrow();
        assert_eq!(t.changes().category(Category::Atom).deleted().len(), 1);
        assert_eq!(t.changes().category(Category::Bond).deleted().len(), 2);
        assert_eq!(t.changes().category(Category::Pseudobond).num_deleted(), 1);
        drop(t);
        assert!(matches!(
            s.delete_atom(ca),
            Err(StructureError::AtomNotFound(_))
        ));
    }

    #[test]
    fn delete_atom_keeps_an_emptied_residue() {
        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(&mut s, "NA", "B", 1, &[("NA", Element::NA)]);
        s.delete_atom(atoms[0]).unwrap();
        assert_eq!(s.num_residues(), 1);
        assert!(s.residue(rid).unwrap().atoms().is_empty());
    }

    #[test]
    fn delete_residue_removes_its_atoms() {
        let mut s = isolated_structure();
        let residues = peptide(&mut s, "A", 3);
        s.set_ribbon_display(residues[1], true).unwrap();
        assert_eq!(s.ribbon_display_count(), 1);

        s.delete_residue(residues[1]).unwrap();
        assert_eq!(s.num_residues(), 2);
        assert_eq!(s.num_atoms(), 6);
        assert_eq!(s.num_bonds(), 4);
        assert_eq!(s.ribbon_display_count(), 0);
        assert!(s.residue(residues[1]).is_none());
    }

    #[test]
    fn every_bond_is_listed_once_by_each_endpoint() {
        let mut s = isolated_structure();
        peptide(&mut s, "A", 4);
        for (bid, bond) in s.bonds() {
            for atom in bond.atoms() {
                let listed = s.atom(atom).unwrap().bonds();
                assert_eq!(listed.iter().filter(|&&b| b == bid).count(), 1);
            }
        }
        for (aid, atom) in s.atoms() {
            let rid = atom.residue().unwrap();
            assert!(s.residue(rid).unwrap().atoms().contains(&aid));
        }
    }

    #[test]
    fn ribbon_selected_is_idempotent() {
        let mut s = isolated_structure();
        let r = s.new_residue("ALA", "A", 1, ' ', None, true).unwrap();
        s.change_tracker().borrow_mut().clear();

        s.set_ribbon_selected(r, false).unwrap();
        assert!(!s.change_tracker().borrow().has_changes());

        s.set_ribbon_selected(r, true).unwrap();
        s.set_ribbon_selected(r, true).unwrap();
        let t = s.change_tracker().borrow();
        let residues = t.changes().category(Category::Residue);
        assert_eq!(residues.modified(), &[EntityKey::Residue(s.structure_id(), r)]);
        assert!(residues
            .reasons_for(&EntityKey::Residue(s.structure_id(), r))
            .unwrap()
            .contains(&ChangeReason::Selected));
    }

    #[test]
    fn tracked_setters_record_reasons() {
        let mut s = isolated_structure();
        let a = s.new_atom("CA", Element::C).unwrap();
        let b = s.new_atom("CB", Element::C).unwrap();
        let bond = s.bond_atoms(a, b).unwrap();
        s.change_tracker().borrow_mut().clear();

        s.set_atom_selected(a, true).unwrap();
        s.set_atom_element(b, Element::SE).unwrap();
        s.set_bond_order(bond, BondOrder::Double).unwrap();
        s.set_atom_display(a, true).unwrap();

        let t = s.change_tracker().borrow();
        let atoms = t.changes().category(Category::Atom);
        assert_eq!(atoms.modified().len(), 2);
        assert!(!atoms.reasons().contains(&ChangeReason::Displayed));
        assert!(t
            .changes()
            .category(Category::Bond)
            .reasons()
            .contains(&ChangeReason::BondOrder));
        drop(t);
        assert_eq!(s.atom(b).unwrap().element(), Element::SE);
        assert_eq!(s.bond(bond).unwrap().order, BondOrder::Double);
    }

    #[test]
    fn renaming_an_atom_updates_residue_lookup() {
        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(&mut s, "ALA", "A", 1, &[("OT1", Element::O)]);
        s.set_atom_name(atoms[0], "O").unwrap();
        let residue = s.residue(rid).unwrap();
        assert_eq!(residue.find_atom("O"), Some(atoms[0]));
        assert!(residue.find_atom("OT1").is_none());
    }

    #[test]
    fn renaming_a_backbone_atom_invalidates_chains() {
        let mut s = isolated_structure();
        let residues = peptide(&mut s, "A", 2);
        assert_eq!(s.num_chains(), 1);

        let cb = s.new_atom("CB", Element::C).unwrap();
        s.add_atom_to_residue(residues[0], cb).unwrap();
        assert_eq!(s.num_chains(), 1);
        s.set_atom_name(cb, "CG").unwrap();
        assert!(s.chains_valid());

        let n = s.residue(residues[1]).unwrap().find_atom("N").unwrap();
        s.set_atom_name(n, "NX").unwrap();
        assert!(!s.chains_valid());
        assert_eq!(s.chains()[0].existing_residues().collect::<Vec<_>>(), [residues[0]]);

        s.set_atom_name(n, "N").unwrap();
        assert_eq!(s.chains()[0].num_existing_residues(), 2);
        let ca = s.residue(residues[0]).unwrap().find_atom("CA").unwrap();
        s.set_atom_element(ca, Element::CA).unwrap();
        assert!(!s.chains_valid());
    }

    #[test]
    fn dropping_a_structure_reports_everything_deleted() {
        let tracker = ChangeTracker::new_shared();
        let sid;
        {
            let mut s = AtomicStructure::with_tracker("doomed", tracker.clone());
            sid = s.structure_id();
            peptide(&mut s, "A", 2);
            s.new_coord_set(None, None).unwrap();
            tracker.borrow_mut().clear();
        }
        let t = tracker.borrow();
        let changes = t.changes();
        assert_eq!(changes.category(Category::Structure).deleted(), &[EntityKey::Structure(sid)]);
        assert_eq!(changes.category(Category::Atom).num_deleted(), 6);
        assert_eq!(changes.category(Category::Bond).num_deleted(), 5);
        assert_eq!(changes.category(Category::Residue).num_deleted(), 2);
        assert_eq!(changes.category(Category::CoordSet).num_deleted(), 1);
    }

    #[test]
    fn dropping_a_structure_clears_its_inter_model_pseudobonds() {
        let global = Rc::new(RefCell::new(PseudobondManager::new(ChangeTracker::new_shared())));
        let previous = PseudobondManager::install_global(global.clone());

        let mut keep = isolated_structure();
        let kept_atom = keep.new_atom("ZN", Element::ZN).unwrap();
        {
            let mut doomed = isolated_structure();
            let atom = doomed.new_atom("O", Element::O).unwrap();
            global
                .borrow_mut()
                .group_for("contacts", true)
                .unwrap()
                .new_pseudobond(keep.atom_ref(kept_atom), doomed.atom_ref(atom));
        }
        assert_eq!(
            global.borrow().group("contacts").unwrap().num_pseudobonds(),
            0
        );
        PseudobondManager::install_global(previous);
    }
}
