use super::changes::{EntityKey, SharedChangeTracker};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Callback invoked with every entity destroyed by one outermost destruction batch.
pub type DestructionObserver = Box<dyn FnMut(&[EntityKey])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub(crate) struct DestructionState {
    depth: usize,
    in_progress: HashSet<EntityKey>,
    batch: Vec<EntityKey>,
    observers: Vec<(ObserverId, DestructionObserver)>,
    next_observer: u64,
}

impl fmt::Debug for DestructionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructionState")
            .field("depth", &self.depth)
            .field("in_progress", &self.in_progress)
            .field("batch", &self.batch)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl super::ChangeTracker {
    /// Registers a callback fired once per outermost destruction batch.
    pub fn add_destruction_observer(&mut self, observer: DestructionObserver) -> ObserverId {
        let state = &mut self.destruction;
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, observer));
        id
    }

    pub fn remove_destruction_observer(&mut self, id: ObserverId) -> bool {
        let before = self.destruction.observers.len();
        self.destruction.observers.retain(|(oid, _)| *oid != id);
        self.destruction.observers.len() != before
    }

    /// Whether `key` is currently inside a [`DestructionNotifier`] scope.
    pub fn is_being_destroyed(&self, key: &EntityKey) -> bool {
        self.destruction.in_progress.contains(key)
    }

    fn begin_destruction(&mut self, key: EntityKey) {
        self.destruction.depth += 1;
        self.destruction.in_progress.insert(key);
    }

    /// Returns the finished batch when the outermost scope closes.
    fn end_destruction(&mut self, key: EntityKey) -> Option<Vec<EntityKey>> {
        self.destruction.in_progress.remove(&key);
        if !self.changes().category(key.category()).was_deleted(&key) {
            self.destruction.batch.push(key);
        }
        self.add_deleted(key);
        self.destruction.depth = self.destruction.depth.saturating_sub(1);
        (self.destruction.depth == 0).then(|| std::mem::take(&mut self.destruction.batch))
    }
}

/// Scoped guard announcing the destruction of one entity.
///
/// The deletion is recorded when the guard is dropped, so it is reported even when the
/// destroying code returns early or unwinds. Guards nest; observers registered on the tracker
/// see the whole batch once the outermost guard is gone.
pub struct DestructionNotifier {
    tracker: SharedChangeTracker,
    key: EntityKey,
}

impl DestructionNotifier {
    pub fn new(tracker: &SharedChangeTracker, key: EntityKey) -> Self {
        tracker.borrow_mut().begin_destruction(key);
        Self {
            tracker: Rc::clone(tracker),
            key,
        }
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }
}

impl Drop for DestructionNotifier {
    fn drop(&mut self) {
        let batch = match self.tracker.try_borrow_mut() {
            Ok(mut tracker) => tracker.end_destruction(self.key),
            Err(_) => return,
        };
        let Some(batch) = batch.filter(|b| !b.is_empty()) else {
            return;
        };

        // Observers run without the tracker borrowed so they may inspect it.
        let mut observers = match self.tracker.try_borrow_mut() {
            Ok(mut tracker) => std::mem::take(&mut tracker.destruction.observers),
            Err(_) => return,
        };
        for (_, observer) in observers.iter_mut() {
            observer(&batch);
        }
        if let Ok(mut tracker) = self.tracker.try_borrow_mut() {
            let added = std::mem::take(&mut tracker.destruction.observers);
            observers.extend(added);
            tracker.destruction.observers = observers;
        }
    }
}
