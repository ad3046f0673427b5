//! Static name tables shared by the structure model.

pub mod identifiers;
