use super::color::Rgba;
use super::graph::Edge;
use super::ids::AtomId;
use crate::core::session::{
    SessionError, SessionLayout, int_to_usize, layout_for, take_floats, take_ints,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Aromatic),
            _ => None,
        }
    }

    fn code(self) -> i32 {
        self as i32 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BondSlot {
    Order,
    Display,
    Halfbond,
}

static BOND_LAYOUTS: &[SessionLayout<BondSlot>] = &[SessionLayout {
    min_version: 1,
    max_version: crate::core::session::CURRENT_SESSION_VERSION,
    ints: &[BondSlot::Order, BondSlot::Display, BondSlot::Halfbond],
    num_floats: 1,
}];

/// A chemical bond between two distinct atoms of one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    atoms: [AtomId; 2],
    pub order: BondOrder,
    pub display: bool,
    pub halfbond: bool,
    pub radius: f32,
    pub color: Rgba,
}

impl Bond {
    pub(crate) fn new(atom1: AtomId, atom2: AtomId) -> Self {
        Self {
            atoms: [atom1, atom2],
            order: BondOrder::default(),
            display: true,
            halfbond: true,
            radius: 0.2,
            color: Rgba::new(255, 255, 255, 255),
        }
    }

    pub fn atoms(&self) -> [AtomId; 2] {
        self.atoms
    }

    /// The endpoint opposite `atom`, if `atom` is an endpoint.
    pub fn other_atom(&self, atom: AtomId) -> Option<AtomId> {
        match self.atoms {
            [a, b] if a == atom => Some(b),
            [a, b] if b == atom => Some(a),
            _ => None,
        }
    }

    pub fn connects(&self, a: AtomId, b: AtomId) -> bool {
        self.atoms == [a, b] || self.atoms == [b, a]
    }

    /// Integer header width for `version`, without the embedded color.
    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(BOND_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(BOND_LAYOUTS, version)?.num_floats)
    }

    /// Writes the bond's own state. Endpoints are written by the owning structure.
    pub fn session_save(&self, ints: &mut Vec<i32>, floats: &mut Vec<f32>) {
        self.color.session_save(ints);
        for slot in BOND_LAYOUTS[0].ints {
            ints.push(match slot {
                BondSlot::Order => self.order.code(),
                BondSlot::Display => i32::from(self.display),
                BondSlot::Halfbond => i32::from(self.halfbond),
            });
        }
        floats.push(self.radius);
    }

    pub fn session_restore(
        &mut self,
        version: u32,
        ints: &mut &[i32],
        floats: &mut &[f32],
    ) -> Result<(), SessionError> {
        let layout = layout_for(BOND_LAYOUTS, version)?;
        self.color = Rgba::session_restore(ints)?;
        let header = take_ints(ints, layout.ints.len(), "bond")?;
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                BondSlot::Order => {
                    self.order = BondOrder::from_code(value).ok_or(SessionError::BadValue {
                        field: "bond order",
                        value: i64::from(value),
                    })?
                }
                BondSlot::Display => self.display = value != 0,
                BondSlot::Halfbond => self.halfbond = value != 0,
            }
        }
        let f = take_floats(floats, layout.num_floats, "bond")?;
        self.radius = f[0];
        Ok(())
    }
}

impl Edge<AtomId> for Bond {
    fn endpoints(&self) -> [AtomId; 2] {
        self.atoms
    }
}

/// Reads a pair of atom indices written ahead of a bond or pseudobond.
pub(crate) fn take_endpoint_indices(ints: &mut &[i32]) -> Result<[usize; 2], SessionError> {
    let raw = take_ints(ints, 2, "bond endpoints")?;
    Ok([
        int_to_usize(raw[0], "atom index")?,
        int_to_usize(raw[1], "atom index")?,
    ])
}
