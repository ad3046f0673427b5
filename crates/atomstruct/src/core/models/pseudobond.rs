use super::color::Rgba;
use super::graph::OrderedArena;
use super::ids::{AtomRef, PseudobondId, StructureId};
use super::topology::take_endpoint_indices;
use crate::core::session::{
    CURRENT_SESSION_VERSION, SessionError, SessionLayout, int_to_usize, layout_for, take_floats,
    take_ints,
};
use crate::core::tracking::{
    ChangeReason, ChangeTracker, DestructionNotifier, EntityKey, SharedChangeTracker,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

pub const METAL_COORDINATION: &str = "metal coordination";
pub const MISSING_STRUCTURE: &str = "missing structure";

/// Group names that every manager resolves, creating the group on first use.
pub const CANONICAL_GROUP_NAMES: [&str; 2] = [METAL_COORDINATION, MISSING_STRUCTURE];

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pseudobond group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    fn next() -> Self {
        Self(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub type SharedPseudobondManager = Rc<RefCell<PseudobondManager>>;

thread_local! {
    static INTER_MODEL: RefCell<SharedPseudobondManager> =
        RefCell::new(Rc::new(RefCell::new(PseudobondManager::new(ChangeTracker::shared()))));
}

/// A drawn connection between two atoms that is not part of the bond graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Pseudobond {
    atoms: [AtomRef; 2],
    pub display: bool,
    pub halfbond: bool,
    pub radius: f32,
    pub color: Rgba,
}

impl Pseudobond {
    fn new(a: AtomRef, b: AtomRef) -> Self {
        Self {
            atoms: [a, b],
            display: true,
            halfbond: false,
            radius: 0.075,
            color: Rgba::new(255, 255, 0, 255),
        }
    }

    pub fn atoms(&self) -> [AtomRef; 2] {
        self.atoms
    }

    pub fn involves(&self, atom: AtomRef) -> bool {
        self.atoms.contains(&atom)
    }

    pub fn involves_structure(&self, structure: StructureId) -> bool {
        self.atoms.iter().any(|a| a.structure == structure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupSlot {
    NumPseudobonds,
    Display,
    Halfbond,
}

static GROUP_LAYOUTS: &[SessionLayout<GroupSlot>] = &[SessionLayout {
    min_version: 1,
    max_version: CURRENT_SESSION_VERSION,
    ints: &[GroupSlot::NumPseudobonds, GroupSlot::Display, GroupSlot::Halfbond],
    num_floats: 1,
}];

/// A named collection of pseudobonds.
///
/// Every pseudobond added or removed is reported to the group's change tracker; dropping the
/// group reports the group and its remaining pseudobonds as deleted.
pub struct PseudobondGroup {
    id: GroupId,
    name: String,
    pseudobonds: OrderedArena<PseudobondId, Pseudobond>,
    pub display: bool,
    pub halfbond: bool,
    pub radius: f32,
    pub color: Rgba,
    tracker: SharedChangeTracker,
}

impl fmt::Debug for PseudobondGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudobondGroup")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("num_pseudobonds", &self.pseudobonds.len())
            .finish_non_exhaustive()
    }
}

impl PseudobondGroup {
    fn new(name: &str, tracker: SharedChangeTracker) -> Self {
        let id = GroupId::next();
        // Group ids are never reused, so this cannot collide with an earlier deletion.
        if let Err(e) = tracker
            .borrow_mut()
            .add_created(EntityKey::PseudobondGroup(id))
        {
            warn!(error = %e, group = name, "Pseudobond group creation not recorded");
        }
        Self {
            id,
            name: name.to_string(),
            pseudobonds: OrderedArena::default(),
            display: true,
            halfbond: false,
            radius: 0.075,
            color: Rgba::new(255, 255, 0, 255),
            tracker,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_pseudobond(&mut self, a: AtomRef, b: AtomRef) -> PseudobondId {
        let id = self.pseudobonds.insert(Pseudobond::new(a, b));
        if let Err(e) = self
            .tracker
            .borrow_mut()
            .add_created(EntityKey::Pseudobond(self.id, id))
        {
            warn!(error = %e, group = %self.name, "Pseudobond creation not recorded");
        }
        id
    }

    pub fn delete_pseudobond(&mut self, id: PseudobondId) -> Option<Pseudobond> {
        let _notifier = self
            .pseudobonds
            .get(id)
            .map(|_| DestructionNotifier::new(&self.tracker, EntityKey::Pseudobond(self.id, id)));
        self.pseudobonds.remove(id)
    }

    pub fn pseudobond(&self, id: PseudobondId) -> Option<&Pseudobond> {
        self.pseudobonds.get(id)
    }

    pub fn pseudobonds(&self) -> impl Iterator<Item = (PseudobondId, &Pseudobond)> {
        self.pseudobonds.iter()
    }

    pub fn num_pseudobonds(&self) -> usize {
        self.pseudobonds.len()
    }

    /// Finds the pseudobond joining `a` and `b` in either direction.
    pub fn find(&self, a: AtomRef, b: AtomRef) -> Option<PseudobondId> {
        self.pseudobonds
            .iter()
            .find(|(_, pb)| pb.atoms == [a, b] || pb.atoms == [b, a])
            .map(|(id, _)| id)
    }

    pub fn set_pseudobond_display(&mut self, id: PseudobondId, display: bool) -> bool {
        let Some(pb) = self.pseudobonds.get_mut(id) else {
            return false;
        };
        if pb.display != display {
            pb.display = display;
            self.tracker
                .borrow_mut()
                .add_modified(EntityKey::Pseudobond(self.id, id), ChangeReason::Displayed);
        }
        true
    }

    /// Deletes every pseudobond matching `pred`, returning how many went.
    pub fn delete_matching(&mut self, pred: impl Fn(&Pseudobond) -> bool) -> usize {
        let doomed: Vec<PseudobondId> = self
            .pseudobonds
            .iter()
            .filter(|(_, pb)| pred(pb))
            .map(|(id, _)| id)
            .collect();
        for &id in &doomed {
            self.delete_pseudobond(id);
        }
        doomed.len()
    }

    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(GROUP_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(GROUP_LAYOUTS, version)?.num_floats)
    }

    /// Writes the group state and every pseudobond whose atoms `atom_index` can name.
    pub fn session_save(
        &self,
        ints: &mut Vec<i32>,
        floats: &mut Vec<f32>,
        atom_index: impl Fn(AtomRef) -> Option<usize>,
    ) {
        let savable: Vec<([usize; 2], &Pseudobond)> = self
            .pseudobonds
            .iter()
            .filter_map(|(_, pb)| Some(([atom_index(pb.atoms[0])?, atom_index(pb.atoms[1])?], pb)))
            .collect();

        self.color.session_save(ints);
        for slot in GROUP_LAYOUTS[0].ints {
            ints.push(match slot {
                GroupSlot::NumPseudobonds => savable.len() as i32,
                GroupSlot::Display => i32::from(self.display),
                GroupSlot::Halfbond => i32::from(self.halfbond),
            });
        }
        floats.push(self.radius);

        for ([a, b], pb) in savable {
            ints.extend([a as i32, b as i32, i32::from(pb.display), i32::from(pb.halfbond)]);
            pb.color.session_save(ints);
            floats.push(pb.radius);
        }
    }

    pub fn session_restore(
        &mut self,
        version: u32,
        ints: &mut &[i32],
        floats: &mut &[f32],
        atom_at: impl Fn(usize) -> Option<AtomRef>,
    ) -> Result<(), SessionError> {
        let layout = layout_for(GROUP_LAYOUTS, version)?;
        self.color = Rgba::session_restore(ints)?;
        let header = take_ints(ints, layout.ints.len(), "pseudobond group")?;
        let mut count = 0;
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                GroupSlot::NumPseudobonds => count = int_to_usize(value, "pseudobond count")?,
                GroupSlot::Display => self.display = value != 0,
                GroupSlot::Halfbond => self.halfbond = value != 0,
            }
        }
        self.radius = take_floats(floats, layout.num_floats, "pseudobond group")?[0];

        for _ in 0..count {
            let [a, b] = take_endpoint_indices(ints)?;
            let flags = take_ints(ints, 2, "pseudobond")?;
            let color = Rgba::session_restore(ints)?;
            let radius = take_floats(floats, 1, "pseudobond")?[0];
            let lookup = |i: usize| {
                atom_at(i).ok_or(SessionError::BadValue {
                    field: "pseudobond atom index",
                    value: i as i64,
                })
            };
            let id = self.new_pseudobond(lookup(a)?, lookup(b)?);
            if let Some(pb) = self.pseudobonds.get_mut(id) {
                pb.display = flags[0] != 0;
                pb.halfbond = flags[1] != 0;
                pb.color = color;
                pb.radius = radius;
            }
        }
        Ok(())
    }
}

impl Drop for PseudobondGroup {
    fn drop(&mut self) {
        let _group = DestructionNotifier::new(&self.tracker, EntityKey::PseudobondGroup(self.id));
        for &id in self.pseudobonds.keys() {
            let _pb = DestructionNotifier::new(&self.tracker, EntityKey::Pseudobond(self.id, id));
        }
    }
}

/// Owns pseudobond groups by name.
///
/// Each structure owns a manager for its intra-model groups. Pseudobonds between different
/// structures live in the thread's inter-model manager, see [`PseudobondManager::global`].
pub struct PseudobondManager {
    groups: Vec<PseudobondGroup>,
    tracker: SharedChangeTracker,
}

impl fmt::Debug for PseudobondManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.groups.iter()).finish()
    }
}

impl PseudobondManager {
    pub fn new(tracker: SharedChangeTracker) -> Self {
        Self {
            groups: Vec::new(),
            tracker,
        }
    }

    /// The inter-model manager of this thread.
    pub fn global() -> SharedPseudobondManager {
        INTER_MODEL.with(|m| m.borrow().clone())
    }

    /// Like [`PseudobondManager::global`], but `None` once the thread is tearing down.
    pub(crate) fn try_global() -> Option<SharedPseudobondManager> {
        INTER_MODEL.try_with(|m| m.borrow().clone()).ok()
    }

    /// Replaces the inter-model manager, returning the previous one.
    pub fn install_global(manager: SharedPseudobondManager) -> SharedPseudobondManager {
        INTER_MODEL.with(|m| m.replace(manager))
    }

    pub fn group(&self, name: &str) -> Option<&PseudobondGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Looks up a group, creating it when asked to or when `name` is a canonical group name.
    pub fn group_for(&mut self, name: &str, create_if_missing: bool) -> Option<&mut PseudobondGroup> {
        match self.groups.iter().position(|g| g.name == name) {
            Some(i) => self.groups.get_mut(i),
            None if create_if_missing || CANONICAL_GROUP_NAMES.contains(&name) => {
                debug!(group = name, "Creating pseudobond group");
                self.groups
                    .push(PseudobondGroup::new(name, Rc::clone(&self.tracker)));
                self.groups.last_mut()
            }
            None => None,
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &PseudobondGroup> {
        self.groups.iter()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn delete_group(&mut self, name: &str) -> bool {
        match self.groups.iter().position(|g| g.name == name) {
            Some(i) => {
                self.groups.remove(i);
                true
            }
            None => false,
        }
    }

    /// Deletes every pseudobond touching `atom`, in any group.
    pub fn remove_atom(&mut self, atom: AtomRef) -> usize {
        self.groups
            .iter_mut()
            .map(|g| g.delete_matching(|pb| pb.involves(atom)))
            .sum()
    }

    /// Deletes every pseudobond with an endpoint in `structure`.
    pub fn remove_structure(&mut self, structure: StructureId) -> usize {
        self.groups
            .iter_mut()
            .map(|g| g.delete_matching(|pb| pb.involves_structure(structure)))
            .sum()
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }
}
