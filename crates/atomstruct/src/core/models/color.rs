use crate::core::session::{SessionError, take_ints};
use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const SESSION_NUM_INTS: usize = 4;

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub fn r(self) -> u8 {
        self.0[0]
    }

    pub fn g(self) -> u8 {
        self.0[1]
    }

    pub fn b(self) -> u8 {
        self.0[2]
    }

    pub fn a(self) -> u8 {
        self.0[3]
    }

    pub fn session_save(&self, ints: &mut Vec<i32>) {
        ints.extend(self.0.iter().map(|&c| i32::from(c)));
    }

    pub fn session_restore(ints: &mut &[i32]) -> Result<Self, SessionError> {
        let raw = take_ints(ints, Self::SESSION_NUM_INTS, "color")?;
        let mut rgba = [0u8; 4];
        for (dst, &src) in rgba.iter_mut().zip(raw) {
            *dst = u8::try_from(src).map_err(|_| SessionError::BadValue {
                field: "color",
                value: i64::from(src),
            })?;
        }
        Ok(Self(rgba))
    }
}

/// Olive, the ribbon color a residue starts with.
impl Default for Rgba {
    fn default() -> Self {
        Self::new(160, 160, 0, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_olive_and_opaque() {
        let c = Rgba::default();
        assert_eq!((c.r(), c.g(), c.b(), c.a()), (160, 160, 0, 255));
    }

    #[test]
    fn session_restore_reads_four_channels() {
        let mut ints = Vec::new();
        Rgba::new(1, 2, 3, 4).session_save(&mut ints);
        ints.push(99);
        let mut buf: &[i32] = &ints;
        assert_eq!(Rgba::session_restore(&mut buf).unwrap(), Rgba::new(1, 2, 3, 4));
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn session_restore_rejects_out_of_range_channels() {
        let data = [0, 300, 0, 0];
        let mut buf: &[i32] = &data;
        assert_eq!(
            Rgba::session_restore(&mut buf).unwrap_err(),
            SessionError::BadValue {
                field: "color",
                value: 300
            }
        );
    }
}
