use super::destruct::DestructionState;
use crate::core::models::ids::{AtomId, BondId, PseudobondId, ResidueId, StructureId};
use crate::core::models::pseudobond::GroupId;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Handle through which structures share one tracker.
pub type SharedChangeTracker = Rc<RefCell<ChangeTracker>>;

thread_local! {
    static DEFAULT_TRACKER: RefCell<SharedChangeTracker> =
        RefCell::new(Rc::new(RefCell::new(ChangeTracker::new())));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Structure,
    Residue,
    Atom,
    Bond,
    Pseudobond,
    PseudobondGroup,
    CoordSet,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Structure,
        Category::Residue,
        Category::Atom,
        Category::Bond,
        Category::Pseudobond,
        Category::PseudobondGroup,
        Category::CoordSet,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Identity of any tracked entity, qualified by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Structure(StructureId),
    Residue(StructureId, ResidueId),
    Atom(StructureId, AtomId),
    Bond(StructureId, BondId),
    Pseudobond(GroupId, PseudobondId),
    PseudobondGroup(GroupId),
    CoordSet(StructureId, i32),
}

impl EntityKey {
    pub fn category(&self) -> Category {
        match self {
            EntityKey::Structure(_) => Category::Structure,
            EntityKey::Residue(..) => Category::Residue,
            EntityKey::Atom(..) => Category::Atom,
            EntityKey::Bond(..) => Category::Bond,
            EntityKey::Pseudobond(..) => Category::Pseudobond,
            EntityKey::PseudobondGroup(_) => Category::PseudobondGroup,
            EntityKey::CoordSet(..) => Category::CoordSet,
        }
    }
}

/// Why an entity was reported as modified. Observers key their updates on these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeReason {
    Selected,
    Displayed,
    Coord,
    AltLoc,
    ActiveCoordSet,
    Ribbon,
    RibbonColor,
    SecondaryStructure,
    Name,
    Element,
    Occupancy,
    BFactor,
    AtomType,
    BondOrder,
    Color,
    Radius,
    Het,
    ChainId,
}

impl ChangeReason {
    pub fn code(self) -> &'static str {
        match self {
            ChangeReason::Selected => "selected",
            ChangeReason::Displayed => "displayed",
            ChangeReason::Coord => "coord",
            ChangeReason::AltLoc => "alt_loc",
            ChangeReason::ActiveCoordSet => "active_coordset",
            ChangeReason::Ribbon => "ribbon",
            ChangeReason::RibbonColor => "ribbon_color",
            ChangeReason::SecondaryStructure => "secondary_structure",
            ChangeReason::Name => "name",
            ChangeReason::Element => "element",
            ChangeReason::Occupancy => "occupancy",
            ChangeReason::BFactor => "bfactor",
            ChangeReason::AtomType => "atom_type",
            ChangeReason::BondOrder => "order",
            ChangeReason::Color => "color",
            ChangeReason::Radius => "radius",
            ChangeReason::Het => "het",
            ChangeReason::ChainId => "chain_id",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingError {
    #[error("{key:?} was reported as created after being deleted in the same change window")]
    RecreatedAfterDelete { key: EntityKey },
}

/// Created / modified / deleted records of one entity category, in production order.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    created: Vec<EntityKey>,
    created_set: HashSet<EntityKey>,
    modified: Vec<EntityKey>,
    modified_reasons: HashMap<EntityKey, BTreeSet<ChangeReason>>,
    reasons: BTreeSet<ChangeReason>,
    deleted: Vec<EntityKey>,
    deleted_set: HashSet<EntityKey>,
}

impl CategoryChanges {
    pub fn created(&self) -> &[EntityKey] {
        &self.created
    }

    pub fn modified(&self) -> &[EntityKey] {
        &self.modified
    }

    pub fn deleted(&self) -> &[EntityKey] {
        &self.deleted
    }

    pub fn num_deleted(&self) -> usize {
        self.deleted.len()
    }

    /// Every reason recorded in this category, including for entities created in the window.
    pub fn reasons(&self) -> &BTreeSet<ChangeReason> {
        &self.reasons
    }

    pub fn reasons_for(&self, key: &EntityKey) -> Option<&BTreeSet<ChangeReason>> {
        self.modified_reasons.get(key)
    }

    pub fn was_created(&self, key: &EntityKey) -> bool {
        self.created_set.contains(key)
    }

    pub fn was_deleted(&self, key: &EntityKey) -> bool {
        self.deleted_set.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.reasons.is_empty()
    }

    fn add_created(&mut self, key: EntityKey) -> Result<(), TrackingError> {
        if self.deleted_set.contains(&key) {
            return Err(TrackingError::RecreatedAfterDelete { key });
        }
        if self.created_set.insert(key) {
            self.created.push(key);
        }
        Ok(())
    }

    fn add_modified(&mut self, key: EntityKey, reason: ChangeReason) {
        self.reasons.insert(reason);
        if self.created_set.contains(&key) || self.deleted_set.contains(&key) {
            return;
        }
        let reasons = self.modified_reasons.entry(key).or_insert_with(|| {
            self.modified.push(key);
            BTreeSet::new()
        });
        reasons.insert(reason);
    }

    fn add_deleted(&mut self, key: EntityKey) {
        if !self.deleted_set.insert(key) {
            return;
        }
        if self.created_set.remove(&key) {
            self.created.retain(|k| *k != key);
        }
        if self.modified_reasons.remove(&key).is_some() {
            self.modified.retain(|k| *k != key);
        }
        self.deleted.push(key);
    }
}

/// A drained change window.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    categories: [CategoryChanges; 7],
}

impl Changes {
    pub fn category(&self, category: Category) -> &CategoryChanges {
        &self.categories[category.slot()]
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(CategoryChanges::is_empty)
    }
}

/// Records creation, modification and deletion of structure entities between flush points.
///
/// One tracker is normally shared by every structure on the host thread (see
/// [`ChangeTracker::shared`]); tests and embedders can install a fresh one. The tracker only
/// accumulates; draining it with [`ChangeTracker::take_changes`] is up to the observer.
#[derive(Default)]
pub struct ChangeTracker {
    changes: Changes,
    pub(super) destruction: DestructionState,
}

impl fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh tracker in a shareable handle.
    pub fn new_shared() -> SharedChangeTracker {
        Rc::new(RefCell::new(Self::new()))
    }

    /// The tracker structures on this thread use unless given another one.
    pub fn shared() -> SharedChangeTracker {
        DEFAULT_TRACKER.with(|t| t.borrow().clone())
    }

    /// Replaces the thread's default tracker, returning the previous one.
    ///
    /// Structures already created keep the tracker they were built with.
    pub fn install(tracker: SharedChangeTracker) -> SharedChangeTracker {
        DEFAULT_TRACKER.with(|t| t.replace(tracker))
    }

    pub fn add_created(&mut self, key: EntityKey) -> Result<(), TrackingError> {
        self.changes.categories[key.category().slot()].add_created(key)
    }

    pub fn add_modified(&mut self, key: EntityKey, reason: ChangeReason) {
        self.changes.categories[key.category().slot()].add_modified(key, reason);
    }

    pub fn add_deleted(&mut self, key: EntityKey) {
        self.changes.categories[key.category().slot()].add_deleted(key);
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drains the current window.
    pub fn take_changes(&mut self) -> Changes {
        std::mem::take(&mut self.changes)
    }

    pub fn clear(&mut self) {
        self.changes = Changes::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn atom_key(n: u64) -> EntityKey {
        EntityKey::Atom(StructureId::next(), AtomId::from(KeyData::from_ffi(n)))
    }

    #[test]
    fn records_are_kept_per_category_in_order() {
        let mut tracker = ChangeTracker::new();
        let a = atom_key(1);
        let b = atom_key(2);
        let s = EntityKey::Structure(StructureId::next());
        tracker.add_created(a).unwrap();
        tracker.add_created(s).unwrap();
        tracker.add_created(b).unwrap();

        let atoms = tracker.changes().category(Category::Atom);
        assert_eq!(atoms.created(), &[a, b]);
        assert_eq!(
            tracker.changes().category(Category::Structure).created(),
            &[s]
        );
        assert!(tracker.changes().category(Category::Bond).is_empty());
    }

    #[test]
    fn modifications_of_new_entities_fold_into_creation() {
        let mut tracker = ChangeTracker::new();
        let a = atom_key(3);
        tracker.add_created(a).unwrap();
        tracker.add_modified(a, ChangeReason::Coord);

        let atoms = tracker.changes().category(Category::Atom);
        assert!(atoms.modified().is_empty());
        assert!(atoms.reasons().contains(&ChangeReason::Coord));
    }

    #[test]
    fn modification_reasons_accumulate_per_entity() {
        let mut tracker = ChangeTracker::new();
        let a = atom_key(4);
        tracker.add_modified(a, ChangeReason::Selected);
        tracker.add_modified(a, ChangeReason::Coord);
        tracker.add_modified(a, ChangeReason::Selected);

        let atoms = tracker.changes().category(Category::Atom);
        assert_eq!(atoms.modified(), &[a]);
        let reasons: Vec<_> = atoms.reasons_for(&a).unwrap().iter().copied().collect();
        assert_eq!(reasons, [ChangeReason::Selected, ChangeReason::Coord]);
    }

    #[test]
    fn deletion_supersedes_creation_and_modification() {
        let mut tracker = ChangeTracker::new();
        let a = atom_key(5);
        let b = atom_key(6);
        tracker.add_created(a).unwrap();
        tracker.add_modified(b, ChangeReason::Displayed);
        tracker.add_deleted(a);
        tracker.add_deleted(b);
        tracker.add_deleted(b);

        let atoms = tracker.changes().category(Category::Atom);
        assert!(atoms.created().is_empty());
        assert!(atoms.modified().is_empty());
        assert_eq!(atoms.deleted(), &[a, b]);
    }

    #[test]
    fn recreating_a_deleted_key_is_a_logic_error() {
        let mut tracker = ChangeTracker::new();
        let a = atom_key(7);
        tracker.add_deleted(a);
        assert_eq!(
            tracker.add_created(a),
            Err(TrackingError::RecreatedAfterDelete { key: a })
        );
    }

    #[test]
    fn take_changes_drains_the_window() {
        let mut tracker = ChangeTracker::new();
        tracker.add_created(atom_key(8)).unwrap();
        assert!(tracker.has_changes());
        let drained = tracker.take_changes();
        assert_eq!(drained.category(Category::Atom).created().len(), 1);
        assert!(!tracker.has_changes());
    }

    #[test]
    fn installing_a_tracker_replaces_the_thread_default() {
        let fresh = ChangeTracker::new_shared();
        let previous = ChangeTracker::install(fresh.clone());
        assert!(Rc::ptr_eq(&ChangeTracker::shared(), &fresh));
        ChangeTracker::install(previous);
        assert!(!Rc::ptr_eq(&ChangeTracker::shared(), &fresh));
    }

    #[test]
    fn reason_codes() {
        assert_eq!(ChangeReason::Selected.to_string(), "selected");
        assert_eq!(ChangeReason::ActiveCoordSet.code(), "active_coordset");
    }
}
