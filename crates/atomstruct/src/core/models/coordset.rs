use crate::core::session::{
    CURRENT_SESSION_VERSION, SessionError, SessionLayout, int_to_usize, layout_for, take_floats,
    take_ints,
};
use nalgebra::Point3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordSetSlot {
    Id,
    NumCoords,
}

static COORDSET_LAYOUTS: &[SessionLayout<CoordSetSlot>] = &[SessionLayout {
    min_version: 1,
    max_version: CURRENT_SESSION_VERSION,
    ints: &[CoordSetSlot::Id, CoordSetSlot::NumCoords],
    num_floats: 0,
}];

/// One frame of coordinates, indexed by atom position in the owning structure.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordSet {
    id: i32,
    coords: Vec<Point3<f64>>,
}

impl CoordSet {
    pub(crate) fn new(id: i32, size: usize) -> Self {
        Self {
            id,
            coords: vec![Point3::origin(); size],
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point3<f64>> {
        self.coords.get(index)
    }

    /// Overwrites the coordinate at `index`. Returns `false` when the index is past the end.
    pub fn set(&mut self, index: usize, coord: Point3<f64>) -> bool {
        match self.coords.get_mut(index) {
            Some(slot) => {
                *slot = coord;
                true
            }
            None => false,
        }
    }

    /// Replaces the whole frame. Callers keep the length equal to the structure's atom count.
    pub(crate) fn fill(&mut self, coords: Vec<Point3<f64>>) {
        self.coords = coords;
    }

    pub(crate) fn push_placeholder(&mut self) {
        self.coords.push(Point3::origin());
    }

    pub(crate) fn remove_index(&mut self, index: usize) {
        if index < self.coords.len() {
            self.coords.remove(index);
        }
    }

    pub fn session_num_ints(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(COORDSET_LAYOUTS, version)?.ints.len())
    }

    pub fn session_num_floats(version: u32) -> Result<usize, SessionError> {
        Ok(layout_for(COORDSET_LAYOUTS, version)?.num_floats)
    }

    /// Writes the header and then three floats per coordinate.
    ///
    /// Session floats are `f32`, so a restored frame equals the saved one to single precision.
    pub fn session_save(&self, ints: &mut Vec<i32>, floats: &mut Vec<f32>) {
        for slot in COORDSET_LAYOUTS[0].ints {
            ints.push(match slot {
                CoordSetSlot::Id => self.id,
                CoordSetSlot::NumCoords => self.coords.len() as i32,
            });
        }
        for c in &self.coords {
            floats.extend([c.x as f32, c.y as f32, c.z as f32]);
        }
    }

    pub fn session_restore(
        version: u32,
        ints: &mut &[i32],
        floats: &mut &[f32],
    ) -> Result<Self, SessionError> {
        let layout = layout_for(COORDSET_LAYOUTS, version)?;
        let header = take_ints(ints, layout.ints.len(), "coordset")?;
        let (mut id, mut n) = (0, 0);
        for (slot, &value) in layout.ints.iter().zip(header) {
            match slot {
                CoordSetSlot::Id => id = value,
                CoordSetSlot::NumCoords => n = int_to_usize(value, "coordinate count")?,
            }
        }
        take_floats(floats, layout.num_floats, "coordset")?;
        let raw = take_floats(floats, 3 * n, "coordinates")?;
        let coords = raw
            .chunks_exact(3)
            .map(|c| Point3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2])))
            .collect();
        Ok(Self { id, coords })
    }
}
