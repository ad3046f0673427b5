use super::AtomicStructure;
use crate::core::error::StructureError;
use crate::core::models::chain::{Chain, ChainInfo};
use crate::core::models::ids::ResidueId;
use crate::core::models::pseudobond::MISSING_STRUCTURE;
use crate::core::models::residue::{PolymerType, Residue};
use crate::core::utils::identifiers::{
    AA_MIN_BACKBONE_NAMES, NA_MIN_BACKBONE_NAMES, UNKNOWN_RESIDUE_CHAR, nucleic_one_letter,
    one_letter_code, protein_one_letter,
};
use itertools::Itertools;
use phf::Set;
use tracing::{debug, instrument};

/// Whether gaps recorded as `missing structure` pseudobonds join polymer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingStructure {
    #[default]
    Ignore,
    Connect,
}

fn has_all(residue: &Residue, names: &Set<&'static str>) -> bool {
    names.iter().all(|name| residue.find_atom(name).is_some())
}

/// Whether an atom name takes part in polymer linking or classification.
pub(super) fn is_chain_defining(atom_name: &str) -> bool {
    AA_MIN_BACKBONE_NAMES.contains(atom_name) || NA_MIN_BACKBONE_NAMES.contains(atom_name)
}

fn residue_polymer_type(residue: &Residue) -> PolymerType {
    if protein_one_letter(residue.name()).is_some() || has_all(residue, &AA_MIN_BACKBONE_NAMES) {
        PolymerType::Amino
    } else if nucleic_one_letter(residue.name()).is_some()
        || has_all(residue, &NA_MIN_BACKBONE_NAMES)
    {
        PolymerType::Nucleic
    } else {
        PolymerType::Other
    }
}

fn sequence_char(residue: &Residue, polymer_type: PolymerType) -> char {
    match polymer_type {
        PolymerType::Amino => protein_one_letter(residue.name()).unwrap_or(UNKNOWN_RESIDUE_CHAR),
        PolymerType::Nucleic => nucleic_one_letter(residue.name()).unwrap_or(UNKNOWN_RESIDUE_CHAR),
        PolymerType::None | PolymerType::Other => one_letter_code(residue.name()),
    }
}

impl AtomicStructure {
    /// Whether a backbone bond `C(i)-N(i+1)` or `O3'(i)-P(i+1)` joins two residues.
    fn backbone_linked(&self, r1: &Residue, r2: &Residue) -> bool {
        [("C", "N"), ("O3'", "P")].iter().any(|&(from, to)| {
            match (r1.find_atom(from), r2.find_atom(to)) {
                (Some(a), Some(b)) => self.atoms_bonded(a, b),
                _ => false,
            }
        })
    }

    fn gap_linked(&self, r1: &Residue, r2: &Residue) -> bool {
        let Some(group) = self.pseudobonds().group(MISSING_STRUCTURE) else {
            return false;
        };
        group.pseudobonds().any(|(_, pb)| {
            let [a, b] = pb.atoms();
            if a.structure != self.id || b.structure != self.id {
                return false;
            }
            let (a, b) = (a.atom, b.atom);
            (r1.atoms().contains(&a) && r2.atoms().contains(&b))
                || (r1.atoms().contains(&b) && r2.atoms().contains(&a))
        })
    }

    /// Maximal runs of consecutive same-chain residues joined by backbone bonds.
    pub fn polymers(&self) -> Vec<Vec<ResidueId>> {
        self.polymers_with(MissingStructure::Ignore)
    }

    /// Like [`AtomicStructure::polymers`]; with [`MissingStructure::Connect`], residues on
    /// either side of a `missing structure` pseudobond are also considered joined.
    ///
    /// A run of a single residue is reported only if that residue carries the minimal amino or
    /// nucleic backbone.
    pub fn polymers_with(&self, missing: MissingStructure) -> Vec<Vec<ResidueId>> {
        let mut runs: Vec<Vec<ResidueId>> = Vec::new();
        let mut current: Vec<ResidueId> = Vec::new();
        for &rid in &self.residue_order {
            if let Some(&prev) = current.last() {
                let (r1, r2) = (&self.residues[prev], &self.residues[rid]);
                let linked = r1.chain_id() == r2.chain_id()
                    && (self.backbone_linked(r1, r2)
                        || (missing == MissingStructure::Connect && self.gap_linked(r1, r2)));
                if !linked {
                    runs.push(std::mem::take(&mut current));
                }
            }
            current.push(rid);
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs.retain(|run| {
            run.len() > 1
                || run.first().is_some_and(|&r| {
                    let residue = &self.residues[r];
                    has_all(residue, &AA_MIN_BACKBONE_NAMES)
                        || has_all(residue, &NA_MIN_BACKBONE_NAMES)
                })
        });
        runs
    }

    /// Rebuilds the chain list, from reader-supplied hints if given and from the polymer runs
    /// otherwise. Residue polymer types are updated to match.
    #[instrument(skip_all, fields(structure = %self.name, hinted = chain_info.is_some()))]
    pub fn make_chains(&mut self, chain_info: Option<&ChainInfo>) -> Result<(), StructureError> {
        let chains = match chain_info {
            Some(info) => self.chains_from_info(info)?,
            None => self.chains_from_polymers(),
        };
        debug!(num_chains = chains.len(), "Built chains");
        self.install_chains(chains);
        Ok(())
    }

    fn install_chains(&mut self, chains: Vec<Chain>) {
        for residue in self.residues.values_mut() {
            residue.set_polymer_type(PolymerType::None);
        }
        for chain in &chains {
            for rid in chain.existing_residues() {
                self.residues[rid].set_polymer_type(chain.polymer_type());
            }
        }
        self.chains = Some(chains);
    }

    fn chains_from_polymers(&self) -> Vec<Chain> {
        let runs = self.polymers_with(MissingStructure::Connect);
        let by_chain = runs
            .into_iter()
            .into_group_map_by(|run| self.residues[run[0]].chain_id().to_string());
        let order = self
            .residue_order
            .iter()
            .map(|&r| self.residues[r].chain_id())
            .unique()
            .filter(|id| by_chain.contains_key(*id));

        order
            .map(|chain_id| {
                let runs = &by_chain[chain_id];
                let polymer_type = self.classify(runs.iter().flatten().copied());
                let mut chain = Chain::new(chain_id, polymer_type);
                let mut last_number: Option<i32> = None;
                for run in runs {
                    for &rid in run {
                        let residue = &self.residues[rid];
                        if let Some(prev) = last_number.filter(|_| rid == run[0]) {
                            let gap = residue.number().saturating_sub(prev).saturating_sub(1);
                            chain.push_gaps(usize::try_from(gap).unwrap_or(0));
                        }
                        chain.push(Some(rid), sequence_char(residue, polymer_type));
                        last_number = Some(residue.number());
                    }
                }
                chain
            })
            .collect()
    }

    fn chains_from_info(&self, info: &ChainInfo) -> Result<Vec<Chain>, StructureError> {
        info.iter()
            .map(|(chain_id, hint)| {
                let sequence_len = hint.sequence.chars().count();
                if hint.residues.len() != sequence_len {
                    return Err(StructureError::ChainInfoMismatch {
                        chain_id: chain_id.clone(),
                        residues: hint.residues.len(),
                        sequence: sequence_len,
                    });
                }
                if let Some(&missing) = hint
                    .residues
                    .iter()
                    .flatten()
                    .find(|&&r| !self.residues.contains_key(r))
                {
                    return Err(StructureError::ResidueNotFound(missing));
                }
                let polymer_type = self.classify(hint.residues.iter().flatten().copied());
                Ok(Chain::from_parts(
                    chain_id,
                    polymer_type,
                    hint.residues.clone(),
                    &hint.sequence,
                ))
            })
            .collect()
    }

    /// The dominant residue kind of a chain; amino acids win ties.
    fn classify(&self, residues: impl Iterator<Item = ResidueId>) -> PolymerType {
        let counts = residues
            .map(|r| residue_polymer_type(&self.residues[r]))
            .counts();
        let amino = counts.get(&PolymerType::Amino).copied().unwrap_or(0);
        let nucleic = counts.get(&PolymerType::Nucleic).copied().unwrap_or(0);
        match (amino, nucleic) {
            (0, 0) => PolymerType::Other,
            (a, n) if a >= n => PolymerType::Amino,
            _ => PolymerType::Nucleic,
        }
    }

    /// The chain list, rebuilt from the polymer runs if it is stale.
    pub fn chains(&mut self) -> &[Chain] {
        if self.chains.is_none() {
            let chains = self.chains_from_polymers();
            self.install_chains(chains);
        }
        self.chains.as_deref().unwrap_or_default()
    }

    /// The chain list if it is current, without rebuilding.
    pub fn cached_chains(&self) -> Option<&[Chain]> {
        self.chains.as_deref()
    }

    pub fn num_chains(&mut self) -> usize {
        self.chains().len()
    }

    pub fn invalidate_chains(&mut self) {
        self.chains = None;
    }

    pub fn chains_valid(&self) -> bool {
        self.chains.is_some()
    }
}
