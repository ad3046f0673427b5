//! # atomstruct
//!
//! An in-memory model of atomic structures as read from mmCIF or PDB files: atoms, bonds,
//! residues, coordinate sets, chains and pseudobonds, with change tracking for renderers and
//! versioned session save/restore.
//!
//! ## Architectural Philosophy
//!
//! - **Ownership flows down.** An [`AtomicStructure`](core::models::structure::AtomicStructure)
//!   owns all of its entities in arenas. Everything else refers to them through copyable
//!   handles, so there are no reference cycles and destruction always starts at the structure.
//!
//! - **Derived data is explicit.** Chains are a cache that mutations invalidate and
//!   [`chains`](core::models::structure::AtomicStructure::chains) rebuilds deterministically.
//!
//! - **Observers are decoupled.** Every creation, deletion and tracked change is recorded in a
//!   [`ChangeTracker`](core::tracking::ChangeTracker) keyed by reason codes; the model never
//!   calls into a renderer.
//!
//! - **The library does not print.** Diagnostics are `tracing` events and spans; the host
//!   decides whether and where they go by installing a subscriber.

pub mod core;
