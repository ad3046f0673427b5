use super::ids::ResidueId;
use super::residue::PolymerType;
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder written into a sequence where a residue is missing.
pub const GAP_CHAR: char = '-';

/// A named one-letter sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    name: String,
    contents: Vec<char>,
}

impl Sequence {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: Vec::new(),
        }
    }

    pub fn from_str_with_name(name: &str, contents: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: contents.chars().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn characters(&self) -> &[char] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn push(&mut self, c: char) {
        self.contents.push(c);
    }

    /// The sequence with gap placeholders removed.
    pub fn ungapped(&self) -> String {
        self.contents.iter().filter(|&&c| c != GAP_CHAR).collect()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.contents.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

/// A polymer run of one chain: residue slots aligned with the chain's sequence.
///
/// A `None` slot is a residue known from the sequence but absent from the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    chain_id: String,
    polymer_type: PolymerType,
    residues: Vec<Option<ResidueId>>,
    sequence: Sequence,
}

impl Chain {
    pub(crate) fn new(chain_id: &str, polymer_type: PolymerType) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            polymer_type,
            residues: Vec::new(),
            sequence: Sequence::new(chain_id),
        }
    }

    pub(crate) fn from_parts(
        chain_id: &str,
        polymer_type: PolymerType,
        residues: Vec<Option<ResidueId>>,
        sequence: &str,
    ) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            polymer_type,
            residues,
            sequence: Sequence::from_str_with_name(chain_id, sequence),
        }
    }

    pub(crate) fn push(&mut self, residue: Option<ResidueId>, code: char) {
        self.residues.push(residue);
        self.sequence.push(code);
    }

    pub(crate) fn push_gaps(&mut self, n: usize) {
        for _ in 0..n {
            self.push(None, GAP_CHAR);
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn polymer_type(&self) -> PolymerType {
        self.polymer_type
    }

    pub fn residues(&self) -> &[Option<ResidueId>] {
        &self.residues
    }

    /// Residues actually present, in chain order.
    pub fn existing_residues(&self) -> impl Iterator<Item = ResidueId> + '_ {
        self.residues.iter().flatten().copied()
    }

    pub fn num_existing_residues(&self) -> usize {
        self.residues.iter().filter(|r| r.is_some()).count()
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Pairs every slot with its one-letter code.
    pub fn entries(&self) -> impl Iterator<Item = (Option<ResidueId>, char)> + '_ {
        self.residues
            .iter()
            .copied()
            .zip(self.sequence.characters().iter().copied())
    }
}

/// Chain layout supplied by a file reader for one chain id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChainHint {
    pub residues: Vec<Option<ResidueId>>,
    pub sequence: String,
}

/// Reader-supplied chains, keyed by chain id.
pub type ChainInfo = BTreeMap<String, ChainHint>;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_residue_id(n: u64) -> ResidueId {
        ResidueId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn pushes_keep_residues_and_sequence_aligned() {
        let (r1, r2) = (dummy_residue_id(1), dummy_residue_id(2));
        let mut chain = Chain::new("A", PolymerType::Amino);
        chain.push(Some(r1), 'G');
        chain.push_gaps(2);
        chain.push(Some(r2), 'W');

        assert_eq!(chain.len(), 4);
        assert_eq!(chain.sequence().to_string(), "G--W");
        assert_eq!(chain.sequence().ungapped(), "GW");
        assert_eq!(chain.sequence().name(), "A");
        assert_eq!(chain.num_existing_residues(), 2);
        assert_eq!(chain.existing_residues().collect::<Vec<_>>(), [r1, r2]);
        let entries: Vec<_> = chain.entries().collect();
        assert_eq!(entries[1], (None, GAP_CHAR));
        assert_eq!(entries[3], (Some(r2), 'W'));
    }

    #[test]
    fn from_parts_uses_the_given_sequence() {
        let r = dummy_residue_id(3);
        let chain = Chain::from_parts("B", PolymerType::Nucleic, vec![None, Some(r)], "AU");
        assert_eq!(chain.chain_id(), "B");
        assert_eq!(chain.polymer_type(), PolymerType::Nucleic);
        assert_eq!(chain.sequence().characters(), &['A', 'U']);
    }
}
