use crate::core::models::ids::{AtomId, AtomRef, BondId, ResidueId};
use crate::core::session::SessionError;
use crate::core::topology::TemplateError;
use crate::core::tracking::TrackingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("Residue {residue} does not have an alt loc '{alt_loc}'")]
    InvalidAltLoc { residue: String, alt_loc: char },

    #[error("Atom {0:?} is not part of this structure")]
    AtomNotFound(AtomId),

    #[error("Residue {0:?} is not part of this structure")]
    ResidueNotFound(ResidueId),

    #[error("Bond {0:?} is not part of this structure")]
    BondNotFound(BondId),

    #[error("Atom {atom:?} belongs to another structure")]
    ForeignAtom { atom: AtomRef },

    #[error("Cannot bond atom {0:?} to itself")]
    SelfBond(AtomId),

    #[error("Atoms {a:?} and {b:?} are already bonded")]
    AlreadyBonded { a: AtomId, b: AtomId },

    #[error("Atom {0:?} already belongs to a residue")]
    AtomAlreadyInResidue(AtomId),

    #[error("Atom {atom:?} is not in residue {residue:?}")]
    AtomNotInResidue { atom: AtomId, residue: ResidueId },

    #[error("No coordinate set with id {0}")]
    CoordSetNotFound(i32),

    #[error("A coordinate set with id {0} already exists")]
    DuplicateCoordSet(i32),

    #[error("Coordinate set {id} holds {coords} coordinates but the structure has {atoms} atoms")]
    CoordSetSizeMismatch {
        id: i32,
        coords: usize,
        atoms: usize,
    },

    #[error(
        "Chain info for chain '{chain_id}' lists {residues} residues but a sequence of length {sequence}"
    )]
    ChainInfoMismatch {
        chain_id: String,
        residues: usize,
        sequence: usize,
    },

    #[error("Internal logic error: {0}")]
    InternalLogic(String),

    #[error("Template assignment failed: {source}")]
    Template {
        #[from]
        source: TemplateError,
    },

    #[error("Session data error: {source}")]
    Session {
        #[from]
        source: SessionError,
    },

    #[error("Change tracking error: {source}")]
    Tracking {
        #[from]
        source: TrackingError,
    },
}
