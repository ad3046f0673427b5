use super::element::Element;
use super::ids::{BondId, ResidueId};
use crate::core::session::{
    CURRENT_SESSION_VERSION, SessionError, SessionLayout, int_to_char, int_to_usize, layout_for,
    take_floats, take_ints,
};
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::str::FromStr;

/// How an atom is drawn when displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Sphere,
    EndCap,
    Ball,
}

impl DrawMode {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Sphere),
            1 => Some(Self::EndCap),
            2 => Some(Self::Ball),
            _ => None,
        }
    }
}

impl FromStr for DrawMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sphere" => Ok(DrawMode::Sphere),
            "stick" | "endcap" | "end-cap" => Ok(DrawMode::EndCap),
            "ball" => Ok(DrawMode::Ball),
            _ => Err(()),
        }
    }
}

/// One modeled conformation of an atom.
#[derive(Debug, Clone, PartialEq)]
pub struct AltLocRecord {
    pub coord: Point3<f64>,
    pub occupancy: f32,
    pub bfactor: f32,
    pub serial_number: i32,
    /// Element override used while this alt loc is current.
    pub element: Option<Element>,
}

impl AltLocRecord {
    pub fn new(coord: Point3<f64>, occupancy: f32, bfactor: f32) -> Self {
        Self {
            coord,
            occupancy,
            bfactor,
            serial_number: -1,
            element: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomSlot {
    AltLoc,
    SerialNumber,
    Display,
    Selected,
    Hide,
    DrawMode,
    NumAltLocs,
}

static ATOM_LAYOUTS: &[SessionLayout<AtomSlot>] = &[SessionLayout {
    min_version: 1,
    max_version: CURRENT_SESSION_VERSION,
    ints: &[
        AtomSlot::AltLoc,
        AtomSlot::SerialNumber,
        AtomSlot::Display,
        AtomSlot::Selected,
        AtomSlot::Hide,
        AtomSlot::DrawMode,
        AtomSlot::NumAltLocs,
    ],
    num_floats: 3,
}];

const ALT_LOC_INTS: usize = 3;
const ALT_LOC_FLOATS: usize = 5;

/// An atom record. Coordinates live in the owning structure's coordinate sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    name: String,
    element: Element,
    residue: Option<ResidueId>,
    bonds: Vec<BondId>,
    alt_locs: BTreeMap<char, AltLocRecord>,
    alt_loc: char,
    pub serial_number: i32,
    pub occupancy: f32,
    pub bfactor: f32,
    pub display: bool,
    pub selected: bool,
    /// Bit mask of reasons the atom is hidden; zero means visible.
    pub hide: u32,
    pub draw_mode: DrawMode,
    pub radius: Option<f32>,
    computed_type: Option<String>,
}

impl Atom {
    pub(crate) fn new(name: &str, element: Element) -> Self {
        Self {
            name: name.to_string(),
            element,
            residue: None,
            bonds: Vec::new(),
            alt_locs: BTreeMap::new(),
            alt_loc: ' ',
            serial_number: -1,
            occupancy: 1.0,
            bfactor: 0.0,
            display: true,
            selected: false,
            hide: 0,
            draw_mode: DrawMode::default(),
            radius: None,
            computed_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn residue(&self) -> Option<ResidueId> {
        self.residue
    }

    pub fn bonds(&self) -> &[BondId] {
        &self.bonds
    }

    /// The current alt-loc id; a space means the atom has none selected.
    pub fn alt_loc(&self) -> char {
        self.alt_loc
    }

    pub fn alt_locs(&self) -> &BTreeMap<char, AltLocRecord> {
        &self.alt_locs
    }

    pub fn has_alt_loc(&self, alt_loc: char) -> bool {
        self.alt_locs.contains_key(&alt_loc)
    }

    /// Whether both atoms carry exactly the same set of alt-loc ids.
    pub fn same_alt_locs(&self, other: &Atom) -> bool {
        self.alt_locs.keys().eq(other.alt_locs.keys())
    }

    pub fn computed_type(&self) -> Option<&str> {
        self.computed_type.as_deref()
    }

    /// Stores an atom type; the usual target of template-based assignment.
    pub fn set_computed_type(&mut self, atom_type: &str) {
        self.computed_type = Some(atom_type.to_string());
    }

    pub fn visible(&self) -> bool {
        self.display && self.hide == 0
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn set_element(&mut self, element: Element) {
        self.element = element;
    }

    pub(crate) fn set_residue(&mut self, residue: Option<ResidueId>) {
        self.residue = residue;
    }

    pub(crate) fn add_bond(&mut self, bond: BondId) {
        self.bonds.push(bond);
    }

    pub(crate) fn remove_bond(&mut self, bond: BondId) {
        self.bonds.retain(|&b| b != bond);
    }

    pub(crate) fn insert_alt_loc(&mut self, alt_loc: char, record: AltLocRecord) {
        self.alt_locs.insert(alt_loc, record);
    }

    pub(crate) fn alt_loc_record_mut(&mut self, alt_loc: char) -> Option<&mut AltLocRecord> {
        self.alt_locs.get_mut(&alt_loc)
    }

    pub(crate) fn clear_alt_locs(&mut self) {
        self.alt_locs.clear();
        self.alt_loc = ' ';
    }

    /// Makes `alt_loc` current and returns the coordinate the caller must install.
    pub(crate) fn switch_alt_loc(&mut self, alt_loc: char) -> Option<Point3<f64>> {
        let record = self.alt_locs.get(&alt_loc)?;
        let coord = record.coord;
        self.occupancy = record.occupancy;
        self.bfactor = record.bfactor;
        self.serial_number = record.serial_number;
        if let Some(element) = record.element {
            self.element = element;
        }
        self.alt_loc = alt_loc;
        Some(coord)
    }

    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(ATOM_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(ATOM_LAYOUTS, version)?.num_floats)
    }

    /// Writes the header followed by one trailer per alt-loc record.
    ///
    /// Name, element and residue membership are written by the owning structure. Alt-loc
    /// coordinates go through the `f32` float buffer like every other session coordinate.
    pub fn session_save(&self, ints: &mut Vec<i32>, floats: &mut Vec<f32>) {
        for slot in ATOM_LAYOUTS[0].ints {
            ints.push(match slot {
                AtomSlot::AltLoc => self.alt_loc as i32,
                AtomSlot::SerialNumber => self.serial_number,
                AtomSlot::Display => i32::from(self.display),
                AtomSlot::Selected => i32::from(self.selected),
                AtomSlot::Hide => self.hide as i32,
                AtomSlot::DrawMode => self.draw_mode as i32,
                AtomSlot::NumAltLocs => self.alt_locs.len() as i32,
            });
        }
        floats.extend([self.occupancy, self.bfactor, self.radius.unwrap_or(-1.0)]);

        for (&id, record) in &self.alt_locs {
            ints.extend([
                id as i32,
                record.serial_number,
                record.element.map_or(-1, |e| i32::from(e.number())),
            ]);
            floats.extend([
                record.coord.x as f32,
                record.coord.y as f32,
                record.coord.z as f32,
                record.occupancy,
                record.bfactor,
            ]);
        }
    }

    pub fn session_restore(
        &mut self,
        version: u32,
        ints: &mut &[i32],
        floats: &mut &[f32],
    ) -> Result<(), SessionError> {
        let layout = layout_for(ATOM_LAYOUTS, version)?;
        let header = take_ints(ints, layout.ints.len(), "atom")?;
        let mut num_alt_locs = 0;
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                AtomSlot::AltLoc => self.alt_loc = int_to_char(value, "atom alt_loc")?,
                AtomSlot::SerialNumber => self.serial_number = value,
                AtomSlot::Display => self.display = value != 0,
                AtomSlot::Selected => self.selected = value != 0,
                AtomSlot::Hide => self.hide = value as u32,
                AtomSlot::DrawMode => {
                    self.draw_mode = DrawMode::from_code(value).ok_or(SessionError::BadValue {
                        field: "draw mode",
                        value: i64::from(value),
                    })?
                }
                AtomSlot::NumAltLocs => num_alt_locs = int_to_usize(value, "alt loc count")?,
            }
        }
        let f = take_floats(floats, layout.num_floats, "atom")?;
        self.occupancy = f[0];
        self.bfactor = f[1];
        self.radius = (f[2] >= 0.0).then_some(f[2]);

        self.alt_locs.clear();
        for _ in 0..num_alt_locs {
            let i = take_ints(ints, ALT_LOC_INTS, "alt loc")?;
            let f = take_floats(floats, ALT_LOC_FLOATS, "alt loc")?;
            let element = match i[2] {
                -1 => None,
                n => Some(
                    u8::try_from(n)
                        .ok()
                        .and_then(Element::from_number)
                        .ok_or(SessionError::BadValue {
                            field: "alt loc element",
                            value: i64::from(n),
                        })?,
                ),
            };
            self.alt_locs.insert(
                int_to_char(i[0], "alt loc id")?,
                AltLocRecord {
                    coord: Point3::new(f64::from(f[0]), f64::from(f[1]), f64::from(f[2])),
                    occupancy: f[3],
                    bfactor: f[4],
                    serial_number: i[1],
                    element,
                },
            );
        }
        Ok(())
    }
}
