//! # Core Models Module
//!
//! The entities of an atomic structure and the generic graph they are stored in.
//!
//! ## Overview
//!
//! An [`AtomicStructure`](structure::AtomicStructure) owns everything it contains. Atoms and
//! bonds live in a [`Graph`](graph::Graph) arena, residues in a second arena, and coordinates in
//! columnar [`CoordSet`](coordset::CoordSet)s addressed by atom index. Entities refer to each
//! other only through the copyable handles in [`ids`], so no entity holds a reference into
//! another.
//!
//! ## Key Components
//!
//! - [`structure`] - The owning structure: factories, deletion, chains, alt locs, sessions
//! - [`atom`] - Atom records and their alternate locations
//! - [`residue`] - Residues with name lookup and ribbon state
//! - [`topology`] - Bonds and bond orders
//! - [`coordset`] - One frame of coordinates
//! - [`chain`] - Chains and their one-letter sequences
//! - [`pseudobond`] - Named pseudobond groups and their managers
//! - [`element`] - Chemical elements
//! - [`color`] - RGBA colors shared by ribbons, bonds and pseudobonds
//! - [`graph`] - The vertex/edge arena underlying the structure
//! - [`ids`] - Handle types for every entity
//!
//! ## Usage
//!
//! ```
//! use atomstruct::core::models::element::Element;
//! use atomstruct::core::models::structure::AtomicStructure;
//!
//! let mut s = AtomicStructure::new("demo");
//! let ala = s.new_residue("ALA", "A", 1, ' ', None, true)?;
//! for (name, element) in [("N", Element::N), ("CA", Element::C), ("C", Element::C)] {
//!     let atom = s.new_atom(name, element)?;
//!     s.add_atom_to_residue(ala, atom)?;
//! }
//! assert_eq!(s.residue(ala).unwrap().to_string(), "ALA /A:1");
//! assert!(s.principal_atom(ala).is_some());
//! # Ok::<(), atomstruct::core::error::StructureError>(())
//! ```

pub mod atom;
pub mod chain;
pub mod color;
pub mod coordset;
pub mod element;
pub mod graph;
pub mod ids;
pub mod pseudobond;
pub mod residue;
pub mod structure;
pub mod topology;
