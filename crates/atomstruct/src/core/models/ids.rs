use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

new_key_type! {
    pub struct AtomId;
    pub struct BondId;
    pub struct ResidueId;
    pub struct PseudobondId;
}

static NEXT_STRUCTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a structure.
///
/// Used wherever an entity must be named outside its owning structure: change records and
/// pseudobonds that span several models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(u64);

impl StructureId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STRUCTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An atom named across structure boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomRef {
    pub structure: StructureId,
    pub atom: AtomId,
}

impl AtomRef {
    pub fn new(structure: StructureId, atom: AtomId) -> Self {
        Self { structure, atom }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_ids_are_unique_and_increasing() {
        let a = StructureId::next();
        let b = StructureId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(a.to_string(), format!("#{}", a.get()));
    }
}
