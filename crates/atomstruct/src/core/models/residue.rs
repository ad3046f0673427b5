use super::color::Rgba;
use super::ids::AtomId;
use crate::core::session::{
    SessionError, SessionLayout, int_to_char, int_to_usize, layout_for, take_floats, take_ints,
};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolymerType {
    #[default]
    None,
    Amino,
    Nucleic,
    Other,
}

/// Secondary-structure assignment of a residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsType {
    #[default]
    Coil,
    Helix,
    Strand,
}

impl SsType {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Coil),
            1 => Some(Self::Helix),
            2 => Some(Self::Strand),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid secondary structure type: '{0}'")]
pub struct ParseSsTypeError(String);

impl FromStr for SsType {
    type Err = ParseSsTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coil" | "c" | "loop" => Ok(SsType::Coil),
            "helix" | "h" => Ok(SsType::Helix),
            "strand" | "e" | "sheet" => Ok(SsType::Strand),
            _ => Err(ParseSsTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResidueSlot {
    AltLoc,
    IsHelix,
    IsHet,
    IsStrand,
    Unused,
    RibbonDisplay,
    RibbonHideBackbone,
    RibbonSelected,
    SsId,
    SsType,
    NumAtoms,
}

use ResidueSlot as R;

static RESIDUE_LAYOUTS: &[SessionLayout<ResidueSlot>] = &[
    SessionLayout {
        min_version: 1,
        max_version: 5,
        ints: &[
            R::AltLoc,
            R::IsHelix,
            R::IsHet,
            R::IsStrand,
            R::Unused,
            R::RibbonDisplay,
            R::RibbonHideBackbone,
            R::RibbonSelected,
            R::SsId,
            R::NumAtoms,
        ],
        num_floats: 1,
    },
    SessionLayout {
        min_version: 6,
        max_version: 9,
        ints: &[
            R::AltLoc,
            R::IsHet,
            R::Unused,
            R::RibbonDisplay,
            R::RibbonHideBackbone,
            R::RibbonSelected,
            R::SsId,
            R::SsType,
            R::NumAtoms,
        ],
        num_floats: 1,
    },
    SessionLayout {
        min_version: 10,
        max_version: crate::core::session::CURRENT_SESSION_VERSION,
        ints: &[
            R::AltLoc,
            R::IsHet,
            R::RibbonDisplay,
            R::RibbonHideBackbone,
            R::RibbonSelected,
            R::SsId,
            R::SsType,
            R::NumAtoms,
        ],
        num_floats: 1,
    },
];

/// A chemical residue: an ordered group of atoms plus residue-level display state.
///
/// Identity within a structure is `(chain_id, number, insertion_code)`. Atoms are owned by the
/// structure; the residue only lists their handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    name: String,
    chain_id: String,
    mmcif_chain_id: String,
    number: i32,
    insertion_code: char,
    is_het: bool,
    polymer_type: PolymerType,
    ss_type: SsType,
    ss_id: i32,
    ribbon_display: bool,
    ribbon_color: Rgba,
    ribbon_adjust: f32,
    ribbon_hide_backbone: bool,
    ribbon_selected: bool,
    alt_loc: char,
    atoms: Vec<AtomId>,
    atom_name_map: HashMap<String, Vec<AtomId>>,
}

impl Residue {
    pub(crate) fn new(name: &str, chain_id: &str, number: i32, insertion_code: char) -> Self {
        Self {
            name: name.to_string(),
            chain_id: chain_id.to_string(),
            mmcif_chain_id: chain_id.to_string(),
            number,
            insertion_code,
            is_het: false,
            polymer_type: PolymerType::None,
            ss_type: SsType::Coil,
            ss_id: -1,
            ribbon_display: false,
            ribbon_color: Rgba::default(),
            ribbon_adjust: -1.0,
            ribbon_hide_backbone: true,
            ribbon_selected: false,
            alt_loc: ' ',
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn mmcif_chain_id(&self) -> &str {
        &self.mmcif_chain_id
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn insertion_code(&self) -> char {
        self.insertion_code
    }

    pub fn is_het(&self) -> bool {
        self.is_het
    }

    pub fn polymer_type(&self) -> PolymerType {
        self.polymer_type
    }

    pub fn ss_type(&self) -> SsType {
        self.ss_type
    }

    pub fn ss_id(&self) -> i32 {
        self.ss_id
    }

    pub fn is_helix(&self) -> bool {
        self.ss_type == SsType::Helix
    }

    pub fn is_strand(&self) -> bool {
        self.ss_type == SsType::Strand
    }

    pub fn ribbon_display(&self) -> bool {
        self.ribbon_display
    }

    pub fn ribbon_color(&self) -> Rgba {
        self.ribbon_color
    }

    pub fn ribbon_adjust(&self) -> f32 {
        self.ribbon_adjust
    }

    pub fn ribbon_hide_backbone(&self) -> bool {
        self.ribbon_hide_backbone
    }

    pub fn ribbon_selected(&self) -> bool {
        self.ribbon_selected
    }

    pub fn alt_loc(&self) -> char {
        self.alt_loc
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn find_atom(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map
            .get(name)
            .and_then(|ids| ids.first())
            .copied()
    }

    pub fn count_atom(&self, name: &str) -> usize {
        self.atom_name_map.get(name).map_or(0, Vec::len)
    }

    /// Name to atom mapping. Of several atoms sharing a name, the first in residue order wins.
    pub fn atoms_map(&self) -> HashMap<&str, AtomId> {
        self.atom_name_map
            .iter()
            .filter_map(|(name, ids)| ids.first().map(|&id| (name.as_str(), id)))
            .collect()
    }

    pub fn is_water(&self) -> bool {
        crate::core::utils::identifiers::is_water(&self.name)
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_default()
            .push(atom_id);
    }

    pub(crate) fn remove_atom(&mut self, atom_name: &str, atom_id: AtomId) -> bool {
        let Some(pos) = self.atoms.iter().position(|&id| id == atom_id) else {
            return false;
        };
        self.atoms.remove(pos);
        if let Some(ids) = self.atom_name_map.get_mut(atom_name) {
            ids.retain(|&id| id != atom_id);
            if ids.is_empty() {
                self.atom_name_map.remove(atom_name);
            }
        }
        true
    }

    pub(crate) fn rename_atom(&mut self, old: &str, new: &str, atom_id: AtomId) {
        if let Some(ids) = self.atom_name_map.get_mut(old) {
            ids.retain(|&id| id != atom_id);
            if ids.is_empty() {
                self.atom_name_map.remove(old);
            }
        }
        // Keep the name index in residue order so the first atom still wins.
        let order = &self.atoms;
        let ids = self.atom_name_map.entry(new.to_string()).or_default();
        ids.push(atom_id);
        ids.sort_by_key(|id| order.iter().position(|o| o == id));
    }

    pub(crate) fn set_alt_loc_raw(&mut self, alt_loc: char) {
        self.alt_loc = alt_loc;
    }

    pub(crate) fn set_polymer_type(&mut self, polymer_type: PolymerType) {
        self.polymer_type = polymer_type;
    }

    pub(crate) fn set_is_het(&mut self, is_het: bool) {
        self.is_het = is_het;
    }

    pub(crate) fn set_mmcif_chain_id(&mut self, chain_id: &str) {
        self.mmcif_chain_id = chain_id.to_string();
    }

    pub(crate) fn set_ss_type(&mut self, ss_type: SsType) {
        self.ss_type = ss_type;
    }

    pub(crate) fn set_ss_id(&mut self, ss_id: i32) {
        self.ss_id = ss_id;
    }

    pub(crate) fn set_ribbon_display(&mut self, display: bool) {
        self.ribbon_display = display;
    }

    pub(crate) fn set_ribbon_color(&mut self, color: Rgba) {
        self.ribbon_color = color;
    }

    pub(crate) fn set_ribbon_adjust(&mut self, adjust: f32) {
        self.ribbon_adjust = adjust;
    }

    pub(crate) fn set_ribbon_hide_backbone(&mut self, hide: bool) {
        self.ribbon_hide_backbone = hide;
    }

    pub(crate) fn set_ribbon_selected_raw(&mut self, selected: bool) {
        self.ribbon_selected = selected;
    }

    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(RESIDUE_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(RESIDUE_LAYOUTS, version)?.num_floats)
    }

    /// Writes ribbon color, header, then one atom index per member atom.
    pub fn session_save(
        &self,
        ints: &mut Vec<i32>,
        floats: &mut Vec<f32>,
        atom_index: impl Fn(AtomId) -> usize,
    ) {
        self.ribbon_color.session_save(ints);
        let current = &RESIDUE_LAYOUTS[RESIDUE_LAYOUTS.len() - 1];
        for slot in current.ints {
            ints.push(match slot {
                R::AltLoc => self.alt_loc as i32,
                R::IsHet => i32::from(self.is_het),
                R::RibbonDisplay => i32::from(self.ribbon_display),
                R::RibbonHideBackbone => i32::from(self.ribbon_hide_backbone),
                R::RibbonSelected => i32::from(self.ribbon_selected),
                R::SsId => self.ss_id,
                R::SsType => self.ss_type as i32,
                R::NumAtoms => self.atoms.len() as i32,
                R::IsHelix => i32::from(self.is_helix()),
                R::IsStrand => i32::from(self.is_strand()),
                R::Unused => 0,
            });
        }
        floats.push(self.ribbon_adjust);
        ints.extend(self.atoms.iter().map(|&a| atom_index(a) as i32));
    }

    /// Restores the residue-level state and returns the saved atom indices in residue order.
    ///
    /// Membership is re-established by the owning structure, which maps the indices back to
    /// atoms.
    pub fn session_restore(
        &mut self,
        version: u32,
        ints: &mut &[i32],
        floats: &mut &[f32],
    ) -> Result<Vec<usize>, SessionError> {
        let layout = layout_for(RESIDUE_LAYOUTS, version)?;
        self.ribbon_color = Rgba::session_restore(ints)?;
        let header = take_ints(ints, layout.ints.len(), "residue")?;

        let mut num_atoms = 0;
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                R::AltLoc => self.alt_loc = int_to_char(value, "residue alt_loc")?,
                R::IsHelix if value != 0 => self.ss_type = SsType::Helix,
                R::IsStrand if value != 0 => self.ss_type = SsType::Strand,
                R::IsHelix | R::IsStrand | R::Unused => {}
                R::IsHet => self.is_het = value != 0,
                R::RibbonDisplay => self.ribbon_display = value != 0,
                R::RibbonHideBackbone => self.ribbon_hide_backbone = value != 0,
                R::RibbonSelected => self.ribbon_selected = value != 0,
                R::SsId => self.ss_id = value,
                R::SsType => {
                    self.ss_type = SsType::from_code(value).ok_or(SessionError::BadValue {
                        field: "ss_type",
                        value: i64::from(value),
                    })?
                }
                R::NumAtoms => num_atoms = int_to_usize(value, "residue atom count")?,
            }
        }
        let f = take_floats(floats, layout.num_floats, "residue")?;
        self.ribbon_adjust = f[0];

        take_ints(ints, num_atoms, "residue atoms")?
            .iter()
            .map(|&i| int_to_usize(i, "atom index"))
            .collect()
    }
}

impl fmt::Display for Residue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.name)?;
        if self.chain_id != " " {
            write!(f, "/{}", self.chain_id)?;
        }
        write!(f, ":{}", self.number)?;
        if self.insertion_code != ' ' {
            write!(f, "{}", self.insertion_code)?;
        }
        Ok(())
    }
}
