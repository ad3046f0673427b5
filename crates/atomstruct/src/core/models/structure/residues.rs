use super::AtomicStructure;
use crate::core::models::element::Element;
use crate::core::models::ids::{AtomId, BondId, ResidueId};
use crate::core::models::residue::Residue;

impl AtomicStructure {
    /// First residue matching `(chain_id, number, insertion_code)` and, if given, `name`.
    pub fn find_residue(
        &self,
        chain_id: &str,
        number: i32,
        insertion_code: char,
        name: Option<&str>,
    ) -> Option<ResidueId> {
        self.residues()
            .find(|(_, r)| {
                r.chain_id() == chain_id
                    && r.number() == number
                    && r.insertion_code() == insertion_code
                    && name.is_none_or(|n| r.name() == n)
            })
            .map(|(id, _)| id)
    }

    /// The atom that traces the residue in a chain depiction, if the residue has one.
    ///
    /// Amino acids use a carbon `CA` (accompanied by `N` and `C`, or alone), nucleotides use
    /// `C4'` (with `C3'`, `C5'` and `O5'`), and a residue made of a lone phosphorus `P` uses
    /// that atom.
    pub fn principal_atom(&self, residue: ResidueId) -> Option<AtomId> {
        let r = self.residue(residue)?;
        if let Some(ca) = r.find_atom("CA") {
            let is_carbon = self.atom(ca)?.element() == Element::C;
            let backbone = r.find_atom("N").is_some() && r.find_atom("C").is_some();
            return (is_carbon && (backbone || r.num_atoms() == 1)).then_some(ca);
        }
        if let Some(c4) = r.find_atom("C4'") {
            let sugar = ["C3'", "C5'", "O5'"]
                .iter()
                .all(|name| r.find_atom(name).is_some());
            return sugar.then_some(c4);
        }
        let p = r.find_atom("P")?;
        (r.num_atoms() == 1 && self.atom(p)?.element() == Element::P).then_some(p)
    }

    /// Bonds with one endpoint in each residue, in the first residue's atom order.
    pub fn bonds_between(&self, r1: ResidueId, r2: ResidueId, just_first: bool) -> Vec<BondId> {
        let (Some(first), Some(_)) = (self.residue(r1), self.residue(r2)) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for &aid in first.atoms() {
            let Some(atom) = self.atom(aid) else {
                continue;
            };
            for &bid in atom.bonds() {
                let other = self
                    .bond(bid)
                    .and_then(|b| b.other_atom(aid))
                    .and_then(|o| self.atom(o));
                if other.is_some_and(|o| o.residue() == Some(r2)) {
                    found.push(bid);
                    if just_first {
                        return found;
                    }
                }
            }
        }
        found
    }

    /// Human-readable label of a residue, as used in error messages.
    pub(crate) fn residue_label(&self, residue: ResidueId) -> String {
        self.residue(residue)
            .map_or_else(|| format!("{residue:?}"), Residue::to_string)
    }
}
