//! # Residue Templates
//!
//! Per-residue atom-type templates and the memoized [`TemplateCache`] that loads them.
//!
//! A template file is a TOML document listing, per atom name, a normal type and an optional
//! ordered list of conditions:
//!
//! ```toml
//! [atoms.OXT]
//! type = "O"
//! conditions = [{ op = "?", operand = "OXT", result = "O-minus" }]
//! ```
//!
//! Evaluation against a residue lives on the structure, see
//! [`AtomicStructure::template_assign`](crate::core::models::structure::AtomicStructure::template_assign).

pub mod template;

pub use template::{
    AtomTemplate, Condition, ResidueTemplate, SharedTemplateCache, TemplateCache, TemplateError,
    TemplateLocator,
};
