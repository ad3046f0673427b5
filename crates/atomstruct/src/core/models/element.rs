use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Symbol and standard atomic mass for every entry of the intern table, indexed by atomic
/// number. Entry 0 is the lone-pair pseudo-element.
static ELEMENT_TABLE: [(&str, f64); 119] = [
    ("LP", 0.0),
    ("H", 1.008),
    ("He", 4.0026),
    ("Li", 6.94),
    ("Be", 9.0122),
    ("B", 10.81),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998),
    ("Ne", 20.18),
    ("Na", 22.99),
    ("Mg", 24.305),
    ("Al", 26.982),
    ("Si", 28.085),
    ("P", 30.974),
    ("S", 32.06),
    ("Cl", 35.45),
    ("Ar", 39.948),
    ("K", 39.098),
    ("Ca", 40.078),
    ("Sc", 44.956),
    ("Ti", 47.867),
    ("V", 50.942),
    ("Cr", 51.996),
    ("Mn", 54.938),
    ("Fe", 55.845),
    ("Co", 58.933),
    ("Ni", 58.693),
    ("Cu", 63.546),
    ("Zn", 65.38),
    ("Ga", 69.723),
    ("Ge", 72.63),
    ("As", 74.922),
    ("Se", 78.971),
    ("Br", 79.904),
    ("Kr", 83.798),
    ("Rb", 85.468),
    ("Sr", 87.62),
    ("Y", 88.906),
    ("Zr", 91.224),
    ("Nb", 92.906),
    ("Mo", 95.96),
    ("Tc", 98.0),
    ("Ru", 101.07),
    ("Rh", 102.91),
    ("Pd", 106.42),
    ("Ag", 107.87),
    ("Cd", 112.41),
    ("In", 114.82),
    ("Sn", 118.71),
    ("Sb", 121.76),
    ("Te", 127.6),
    ("I", 126.9),
    ("Xe", 131.29),
    ("Cs", 132.91),
    ("Ba", 137.33),
    ("La", 138.91),
    ("Ce", 140.12),
    ("Pr", 140.91),
    ("Nd", 144.24),
    ("Pm", 145.0),
    ("Sm", 150.36),
    ("Eu", 151.96),
    ("Gd", 157.25),
    ("Tb", 158.93),
    ("Dy", 162.5),
    ("Ho", 164.93),
    ("Er", 167.26),
    ("Tm", 168.93),
    ("Yb", 173.05),
    ("Lu", 174.97),
    ("Hf", 178.49),
    ("Ta", 180.95),
    ("W", 183.84),
    ("Re", 186.21),
    ("Os", 190.23),
    ("Ir", 192.22),
    ("Pt", 195.08),
    ("Au", 196.97),
    ("Hg", 200.59),
    ("Tl", 204.38),
    ("Pb", 207.2),
    ("Bi", 208.98),
    ("Po", 209.0),
    ("At", 210.0),
    ("Rn", 222.0),
    ("Fr", 223.0),
    ("Ra", 226.0),
    ("Ac", 227.0),
    ("Th", 232.04),
    ("Pa", 231.04),
    ("U", 238.03),
    ("Np", 237.0),
    ("Pu", 244.0),
    ("Am", 243.0),
    ("Cm", 247.0),
    ("Bk", 247.0),
    ("Cf", 251.0),
    ("Es", 252.0),
    ("Fm", 257.0),
    ("Md", 258.0),
    ("No", 259.0),
    ("Lr", 262.0),
    ("Rf", 267.0),
    ("Db", 270.0),
    ("Sg", 271.0),
    ("Bh", 270.0),
    ("Hs", 277.0),
    ("Mt", 276.0),
    ("Ds", 281.0),
    ("Rg", 280.0),
    ("Cn", 285.0),
    ("Nh", 284.0),
    ("Fl", 289.0),
    ("Mc", 288.0),
    ("Lv", 293.0),
    ("Ts", 294.0),
    ("Og", 294.0),
];

// Upper-cased symbols so that lookups are case-insensitive. Deuterium and tritium intern to
// hydrogen.
static SYMBOL_TO_NUMBER: Map<&'static str, u8> = phf_map! {
    "LP" => 0, "H" => 1, "D" => 1, "T" => 1, "HE" => 2, "LI" => 3, "BE" => 4, "B" => 5,
    "C" => 6, "N" => 7, "O" => 8, "F" => 9, "NE" => 10, "NA" => 11, "MG" => 12, "AL" => 13,
    "SI" => 14, "P" => 15, "S" => 16, "CL" => 17, "AR" => 18, "K" => 19, "CA" => 20,
    "SC" => 21, "TI" => 22, "V" => 23, "CR" => 24, "MN" => 25, "FE" => 26, "CO" => 27,
    "NI" => 28, "CU" => 29, "ZN" => 30, "GA" => 31, "GE" => 32, "AS" => 33, "SE" => 34,
    "BR" => 35, "KR" => 36, "RB" => 37, "SR" => 38, "Y" => 39, "ZR" => 40, "NB" => 41,
    "MO" => 42, "TC" => 43, "RU" => 44, "RH" => 45, "PD" => 46, "AG" => 47, "CD" => 48,
    "IN" => 49, "SN" => 50, "SB" => 51, "TE" => 52, "I" => 53, "XE" => 54, "CS" => 55,
    "BA" => 56, "LA" => 57, "CE" => 58, "PR" => 59, "ND" => 60, "PM" => 61, "SM" => 62,
    "EU" => 63, "GD" => 64, "TB" => 65, "DY" => 66, "HO" => 67, "ER" => 68, "TM" => 69,
    "YB" => 70, "LU" => 71, "HF" => 72, "TA" => 73, "W" => 74, "RE" => 75, "OS" => 76,
    "IR" => 77, "PT" => 78, "AU" => 79, "HG" => 80, "TL" => 81, "PB" => 82, "BI" => 83,
    "PO" => 84, "AT" => 85, "RN" => 86, "FR" => 87, "RA" => 88, "AC" => 89, "TH" => 90,
    "PA" => 91, "U" => 92, "NP" => 93, "PU" => 94, "AM" => 95, "CM" => 96, "BK" => 97,
    "CF" => 98, "ES" => 99, "FM" => 100, "MD" => 101, "NO" => 102, "LR" => 103, "RF" => 104,
    "DB" => 105, "SG" => 106, "BH" => 107, "HS" => 108, "MT" => 109, "DS" => 110,
    "RG" => 111, "CN" => 112, "NH" => 113, "FL" => 114, "MC" => 115, "LV" => 116,
    "TS" => 117, "OG" => 118,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element symbol: '{0}'")]
pub struct ParseElementError(String);

/// A chemical element.
///
/// `Element` is an interned value: it is a one-byte handle into a static table, so there is
/// exactly one canonical instance per symbol and equality is identity on that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Element(u8);

impl Element {
    pub const LP: Element = Element(0);
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const NA: Element = Element(11);
    pub const MG: Element = Element(12);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const K: Element = Element(19);
    pub const CA: Element = Element(20);
    pub const MN: Element = Element(25);
    pub const FE: Element = Element(26);
    pub const CO: Element = Element(27);
    pub const NI: Element = Element(28);
    pub const CU: Element = Element(29);
    pub const ZN: Element = Element(30);
    pub const SE: Element = Element(34);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Looks up the canonical element for an atomic number.
    pub fn from_number(number: u8) -> Option<Self> {
        ((number as usize) < ELEMENT_TABLE.len()).then_some(Self(number))
    }

    /// Looks up the canonical element for a symbol, ignoring case and surrounding whitespace.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOL_TO_NUMBER
            .get(symbol.trim().to_ascii_uppercase().as_str())
            .map(|&n| Self(n))
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn symbol(self) -> &'static str {
        ELEMENT_TABLE[self.0 as usize].0
    }

    #[inline]
    pub fn mass(self) -> f64 {
        ELEMENT_TABLE[self.0 as usize].1
    }

    pub fn is_metal(self) -> bool {
        matches!(
            self.0,
            3 | 4 | 11..=13 | 19..=31 | 37..=50 | 55..=84 | 87..=118
        )
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s).ok_or_else(|| ParseElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_intern_to_the_same_instance() {
        assert_eq!(Element::from_symbol("C"), Some(Element::C));
        assert_eq!(Element::from_symbol(" c "), Some(Element::C));
        assert_eq!("Fe".parse::<Element>().unwrap(), Element::FE);
        assert_eq!(Element::from_symbol("D"), Some(Element::H));
    }

    #[test]
    fn table_entries_are_consistent_with_symbol_map() {
        for number in 0..=118u8 {
            let element = Element::from_number(number).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
        }
        assert!(Element::from_number(119).is_none());
    }

    #[test]
    fn exposes_number_symbol_and_mass() {
        assert_eq!(Element::P.number(), 15);
        assert_eq!(Element::P.symbol(), "P");
        assert!((Element::O.mass() - 15.999).abs() < 1e-9);
        assert_eq!(Element::CL.to_string(), "Cl");
    }

    #[test]
    fn unknown_symbols_fail_to_parse() {
        assert!("Xx".parse::<Element>().is_err());
        assert!(Element::from_symbol("").is_none());
    }

    #[test]
    fn metal_classification() {
        assert!(Element::ZN.is_metal());
        assert!(Element::NA.is_metal());
        assert!(!Element::C.is_metal());
        assert!(!Element::SE.is_metal());
    }
}
