use phf::{Map, Set, phf_map, phf_set};

pub static AA_MIN_BACKBONE_NAMES: Set<&'static str> = phf_set! { "C", "CA", "N" };

pub static AA_MAX_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "C", "CA", "N", "O", "OXT", "OT1", "OT2",
};

pub static AA_RIBBON_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "C", "CA", "N", "O", "OXT", "OT1", "OT2",
};

pub static AA_SIDE_CONNECTOR_NAMES: Set<&'static str> = phf_set! { "CA" };

pub static NA_MIN_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "O3'", "C3'", "C4'", "C5'", "O5'", "P",
};

pub static NA_MAX_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "O3'", "C3'", "C4'", "C5'", "O5'", "P", "OP1", "O1P", "OP2", "O2P", "O2'",
    "C2'", "O4'", "C1'", "OP3", "O3P",
};

pub static NA_RIBBON_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "O3'", "C3'", "C4'", "C5'", "O5'", "P", "OP1", "O1P", "OP2", "O2P", "OP3", "O3P",
};

pub static RIBOSE_NAMES: Set<&'static str> = phf_set! {
    "O3'", "C3'", "C4'", "C5'", "O5'", "O2'", "C2'", "O4'", "C1'",
};

/// Nucleic side chains hang off the sugar, so every ribose atom is a connector.
pub static NA_SIDE_CONNECTOR_NAMES: &Set<&'static str> = &RIBOSE_NAMES;

pub static STD_WATER_NAMES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "DOD", "H2O", "D2O", "TIP3",
};

pub static STD_SOLVENT_NAMES: &Set<&'static str> = &STD_WATER_NAMES;

static PROTEIN_ONE_LETTER: Map<&'static str, char> = phf_map! {
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
    "ASX" => 'B', "GLX" => 'Z', "SEC" => 'U', "PYL" => 'O', "UNK" => 'X',
    "MSE" => 'M', "CYX" => 'C', "HSE" => 'H', "HSD" => 'H', "HSP" => 'H',
    "HID" => 'H', "HIE" => 'H', "HIP" => 'H',
};

static NUCLEIC_ONE_LETTER: Map<&'static str, char> = phf_map! {
    "A" => 'A', "C" => 'C', "G" => 'G', "T" => 'T', "U" => 'U', "I" => 'I', "N" => 'N',
    "DA" => 'A', "DC" => 'C', "DG" => 'G', "DT" => 'T', "DU" => 'U', "DI" => 'I', "DN" => 'N',
    "ADE" => 'A', "CYT" => 'C', "GUA" => 'G', "THY" => 'T', "URA" => 'U',
};

/// Letter used for residues whose name is not in either code table.
pub const UNKNOWN_RESIDUE_CHAR: char = 'X';

pub fn is_water(residue_name: &str) -> bool {
    STD_WATER_NAMES.contains(residue_name.trim())
}

pub fn is_solvent(residue_name: &str) -> bool {
    STD_SOLVENT_NAMES.contains(residue_name.trim())
}

pub fn protein_one_letter(residue_name: &str) -> Option<char> {
    PROTEIN_ONE_LETTER.get(residue_name.trim()).copied()
}

pub fn nucleic_one_letter(residue_name: &str) -> Option<char> {
    NUCLEIC_ONE_LETTER.get(residue_name.trim()).copied()
}

/// One-letter code for a residue name, consulting the protein table first.
pub fn one_letter_code(residue_name: &str) -> char {
    protein_one_letter(residue_name)
        .or_else(|| nucleic_one_letter(residue_name))
        .unwrap_or(UNKNOWN_RESIDUE_CHAR)
}
