//! # Change Tracking
//!
//! Structures report every creation, deletion and significant mutation of their entities to a
//! [`ChangeTracker`]. Renderers and other observers drain the accumulated window between
//! redraws and key their updates on the [`ChangeReason`] codes.
//!
//! Destruction goes through the scoped [`DestructionNotifier`], which records the deletion when
//! it is dropped and therefore also when the destroying code bails out early.

mod changes;
mod destruct;

pub use changes::{
    Category, CategoryChanges, ChangeReason, ChangeTracker, Changes, EntityKey,
    SharedChangeTracker, TrackingError,
};
pub use destruct::{DestructionNotifier, DestructionObserver, ObserverId};
