//! Substructure search via VF2 subgraph isomorphism.
//!
//! The pattern matches when an injective mapping of pattern atoms onto target
//! atoms exists that preserves atomic numbers and bond orders (aromatic bonds
//! only match aromatic bonds). The haystack must have gone through property
//! perception so that aromaticity is comparable.

use crate::molecule::{BondOrder, Molecule};

/// A mapping from pattern atoms to target atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstructureMatch {
    /// Pairs of (pattern_atom_idx, target_atom_idx).
    pub atom_mapping: Vec<(usize, usize)>,
}

/// Check whether `target` contains `pattern` as a substructure.
pub fn has_substructure(target: &Molecule, pattern: &Molecule) -> bool {
    let mut state = Vf2State::new(target, pattern);
    state.search(true);
    !state.matches.is_empty()
}

/// Find all substructure matches of `pattern` in `target`.
pub fn find_substructure_matches(target: &Molecule, pattern: &Molecule) -> Vec<SubstructureMatch> {
    let mut state = Vf2State::new(target, pattern);
    state.search(false);
    state.matches
}

struct Vf2State<'a> {
    target: &'a Molecule,
    pattern: &'a Molecule,
    /// target atom -> mapped pattern atom
    mapped_target: Vec<Option<usize>>,
    /// pattern atom -> mapped target atom
    mapped_pattern: Vec<Option<usize>>,
    matches: Vec<SubstructureMatch>,
}

impl<'a> Vf2State<'a> {
    fn new(target: &'a Molecule, pattern: &'a Molecule) -> Self {
        Vf2State {
            target,
            pattern,
            mapped_target: vec![None; target.atom_count()],
            mapped_pattern: vec![None; pattern.atom_count()],
            matches: Vec::new(),
        }
    }

    fn search(&mut self, early_exit: bool) {
        if self.pattern.atom_count() == 0 {
            return;
        }
        if self.pattern.atom_count() > self.target.atom_count()
            || self.pattern.bond_count() > self.target.bond_count()
            || !self.element_counts_fit()
        {
            return;
        }
        self.extend(0, early_exit);
    }

    /// Cheap rejection: the pattern cannot need more atoms of any element
    /// than the target has.
    fn element_counts_fit(&self) -> bool {
        let mut need = [0u16; 119];
        let mut have = [0u16; 119];
        for atom in &self.pattern.atoms {
            need[atom.atomic_number as usize] += 1;
        }
        for atom in &self.target.atoms {
            have[atom.atomic_number as usize] += 1;
        }
        need.iter().zip(have.iter()).all(|(n, h)| n <= h)
    }

    fn extend(&mut self, depth: usize, early_exit: bool) {
        if depth == self.pattern.atom_count() {
            let mapping = self
                .mapped_pattern
                .iter()
                .enumerate()
                .filter_map(|(p, t)| t.map(|t| (p, t)))
                .collect();
            self.matches.push(SubstructureMatch { atom_mapping: mapping });
            return;
        }

        // Pattern atoms are matched in index order; the SMILES parse order
        // keeps consecutive atoms adjacent, which keeps the candidate sets
        // small.
        let pattern_atom = depth;
        for target_atom in self.candidates(pattern_atom) {
            if self.mapped_target[target_atom].is_some() {
                continue;
            }
            if !self.feasible(pattern_atom, target_atom) {
                continue;
            }

            self.mapped_pattern[pattern_atom] = Some(target_atom);
            self.mapped_target[target_atom] = Some(pattern_atom);
            self.extend(depth + 1, early_exit);
            self.mapped_pattern[pattern_atom] = None;
            self.mapped_target[target_atom] = None;

            if early_exit && !self.matches.is_empty() {
                return;
            }
        }
    }

    /// Candidate target atoms: the intersection of the unmapped neighborhoods
    /// of all already-mapped pattern neighbors, or every unmapped target atom
    /// when no neighbor is mapped yet.
    fn candidates(&self, pattern_atom: usize) -> Vec<usize> {
        let mut candidates: Option<Vec<usize>> = None;

        for &(p_neighbor, _) in &self.pattern.adjacency[pattern_atom] {
            let Some(t_mapped) = self.mapped_pattern[p_neighbor] else {
                continue;
            };
            let neighborhood: Vec<usize> = self.target.adjacency[t_mapped]
                .iter()
                .map(|&(nb, _)| nb)
                .filter(|&nb| self.mapped_target[nb].is_none())
                .collect();

            candidates = Some(match candidates {
                None => neighborhood,
                Some(existing) => existing
                    .into_iter()
                    .filter(|nb| neighborhood.contains(nb))
                    .collect(),
            });
        }

        candidates.unwrap_or_else(|| {
            (0..self.target.atom_count())
                .filter(|&i| self.mapped_target[i].is_none())
                .collect()
        })
    }

    fn feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        let p_atom = &self.pattern.atoms[pattern_atom];
        let t_atom = &self.target.atoms[target_atom];

        if p_atom.atomic_number != t_atom.atomic_number {
            return false;
        }
        // The target atom must have room for every pattern bond
        if self.target.degree(target_atom) < self.pattern.degree(pattern_atom) {
            return false;
        }

        // Every bond back into the mapped core must exist in the target with
        // a compatible order
        for &(p_neighbor, p_bond_idx) in &self.pattern.adjacency[pattern_atom] {
            let Some(t_mapped) = self.mapped_pattern[p_neighbor] else {
                continue;
            };
            match self.target.bond_between(target_atom, t_mapped) {
                None => return false,
                Some(t_bond) => {
                    let p_bond = &self.pattern.bonds[p_bond_idx];
                    if !bond_compatible(p_bond.order, t_bond.order) {
                        return false;
                    }
                }
            }
        }

        true
    }
}

/// Pattern bonds must match target bonds exactly; aromatic only matches
/// aromatic.
fn bond_compatible(pattern: BondOrder, target: BondOrder) -> bool {
    pattern == target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn mol(smi: &str) -> Molecule {
        parse_smiles(smi, true).unwrap()
    }

    #[test]
    fn benzene_in_phenol() {
        let phenol = mol("Oc1ccccc1");
        let benzene = mol("c1ccccc1");
        assert!(has_substructure(&phenol, &benzene));
        assert!(!find_substructure_matches(&phenol, &benzene).is_empty());
    }

    #[test]
    fn no_benzene_in_cyclohexane() {
        let cyclohexane = mol("C1CCCCC1");
        let benzene = mol("c1ccccc1");
        assert!(!has_substructure(&cyclohexane, &benzene));
    }

    #[test]
    fn ethanol_contains_ethanol_but_not_reverse_with_propanol() {
        let ethanol = mol("CCO");
        let propanol = mol("CCCO");
        assert!(has_substructure(&propanol, &ethanol));
        assert!(!has_substructure(&ethanol, &propanol));
    }

    #[test]
    fn carbonyl_pattern() {
        let acetic = mol("CC(=O)O");
        let carbonyl = mol("C=O");
        assert!(has_substructure(&acetic, &carbonyl));
        let ether = mol("COC");
        assert!(!has_substructure(&ether, &carbonyl));
    }

    #[test]
    fn multiple_matches_in_naphthalene() {
        let naphthalene = mol("c1ccc2ccccc2c1");
        let benzene = mol("c1ccccc1");
        let matches = find_substructure_matches(&naphthalene, &benzene);
        assert!(matches.len() >= 2, "got {} matches", matches.len());
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let ethanol = mol("CCO");
        let empty = crate::molecule::Molecule::new("".into(), vec![], vec![]);
        assert!(!has_substructure(&ethanol, &empty));
    }

    #[test]
    fn mapping_is_injective_and_complete() {
        let toluene = mol("Cc1ccccc1");
        let benzene = mol("c1ccccc1");
        let matches = find_substructure_matches(&toluene, &benzene);
        for m in &matches {
            assert_eq!(m.atom_mapping.len(), benzene.atom_count());
            let mut targets: Vec<usize> = m.atom_mapping.iter().map(|&(_, t)| t).collect();
            targets.sort_unstable();
            targets.dedup();
            assert_eq!(targets.len(), benzene.atom_count());
        }
    }
}
