//! Canonical SMILES generation.
//!
//! Produces a deterministic canonical SMILES via Morgan-style invariant
//! refinement followed by a rank-ordered DFS. Equality of canonical SMILES is
//! the engine's definition of "same molecule": parsing the output and
//! canonicalizing again yields the same string.

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};

/// Generate a canonical SMILES string for the given molecule.
///
/// The molecule is expected to have gone through property perception; the
/// ranks incorporate implicit hydrogen counts and aromaticity.
pub fn canonical_smiles(mol: &Molecule) -> String {
    let n = mol.atom_count();
    if n == 0 {
        return String::new();
    }

    let ranks = canonical_ranks(mol);
    let mut writer = CanonicalWriter {
        mol,
        ranks: &ranks,
        visited: vec![false; n],
        closures: assign_ring_closures(mol, &ranks),
        out: String::new(),
    };

    // One DFS per connected component, lowest-ranked unvisited atom first
    loop {
        let start = (0..n)
            .filter(|&i| !writer.visited[i])
            .min_by_key(|&i| ranks[i]);
        let Some(start) = start else { break };
        if !writer.out.is_empty() {
            writer.out.push('.');
        }
        writer.walk(start, None);
    }

    writer.out
}

/// Compute canonical atom ranks by iterative invariant refinement.
fn canonical_ranks(mol: &Molecule) -> Vec<u64> {
    let n = mol.atom_count();

    // Seed invariants: pack the local atom environment into one u64
    let mut invariants: Vec<u64> = (0..n)
        .map(|i| {
            let atom = &mol.atoms[i];
            (atom.atomic_number as u64) << 40
                | (mol.degree(i) as u64) << 32
                | (atom.implicit_hydrogens as u64) << 24
                | ((atom.formal_charge as i64 + 128) as u64) << 16
                | (atom.isotope.unwrap_or(0) as u64) << 8
                | atom.is_aromatic as u64
        })
        .collect();

    // Refine by folding in sorted neighbor invariants until the partition
    // stops getting finer
    let mut prev_classes = distinct_count(&invariants);
    for _ in 0..n {
        let refined: Vec<u64> = (0..n)
            .map(|i| {
                let mut neighbor_invs: Vec<u64> = mol.adjacency[i]
                    .iter()
                    .map(|&(nb, bi)| {
                        invariants[nb]
                            .wrapping_mul(31)
                            .wrapping_add(mol.bonds[bi].order.code() as u64)
                    })
                    .collect();
                neighbor_invs.sort_unstable();

                let mut h = invariants[i].wrapping_mul(1000003);
                for nv in &neighbor_invs {
                    h = h.wrapping_mul(1000003).wrapping_add(*nv);
                }
                h
            })
            .collect();

        let classes = distinct_count(&refined);
        invariants = refined;
        if classes <= prev_classes {
            break;
        }
        prev_classes = classes;
    }

    // Dense ranks from the final invariants
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| invariants[i]);
    let mut ranks = vec![0u64; n];
    let mut rank = 0u64;
    for w in 0..order.len() {
        if w > 0 && invariants[order[w]] != invariants[order[w - 1]] {
            rank += 1;
        }
        ranks[order[w]] = rank;
    }
    ranks
}

fn distinct_count(values: &[u64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Ring-closure digits each atom must emit: (digit, bond order, opens_here).
type ClosureList = Vec<Vec<(usize, BondOrder, bool)>>;

/// Walk the molecule once in canonical order and assign a ring-closure digit
/// to every back-edge, recording at which atoms the digit is written.
fn assign_ring_closures(mol: &Molecule, ranks: &[u64]) -> ClosureList {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut bond_used = vec![false; mol.bond_count()];
    let mut closures: ClosureList = vec![Vec::new(); n];
    let mut next_digit = 1usize;

    loop {
        let start = (0..n)
            .filter(|&i| !visited[i])
            .min_by_key(|&i| ranks[i]);
        let Some(start) = start else { break };
        closure_dfs(
            mol,
            start,
            None,
            ranks,
            &mut visited,
            &mut bond_used,
            &mut closures,
            &mut next_digit,
        );
    }

    closures
}

#[allow(clippy::too_many_arguments)]
fn closure_dfs(
    mol: &Molecule,
    atom: usize,
    from: Option<usize>,
    ranks: &[u64],
    visited: &mut [bool],
    bond_used: &mut [bool],
    closures: &mut ClosureList,
    next_digit: &mut usize,
) {
    visited[atom] = true;

    let mut neighbors: Vec<(usize, usize)> = mol.adjacency[atom]
        .iter()
        .copied()
        .filter(|&(nb, _)| Some(nb) != from)
        .collect();
    neighbors.sort_by_key(|&(nb, _)| ranks[nb]);

    for (nb, bi) in neighbors {
        if visited[nb] {
            // Back-edge: this bond becomes a ring closure digit
            if !bond_used[bi] {
                bond_used[bi] = true;
                let digit = *next_digit;
                *next_digit += 1;
                let order = mol.bonds[bi].order;
                closures[nb].push((digit, order, true));
                closures[atom].push((digit, order, false));
            }
        } else {
            closure_dfs(mol, nb, Some(atom), ranks, visited, bond_used, closures, next_digit);
        }
    }
}

struct CanonicalWriter<'a> {
    mol: &'a Molecule,
    ranks: &'a [u64],
    visited: Vec<bool>,
    closures: ClosureList,
    out: String,
}

impl CanonicalWriter<'_> {
    fn walk(&mut self, atom: usize, from: Option<usize>) {
        self.visited[atom] = true;
        self.write_atom(atom);

        let mut digits = self.closures[atom].clone();
        digits.sort_by_key(|&(d, _, _)| d);
        for (digit, order, opens_here) in digits {
            if opens_here {
                self.write_ring_bond_symbol(order);
            }
            self.write_ring_digit(digit);
        }

        let mut neighbors: Vec<(usize, usize)> = self.mol.adjacency[atom]
            .iter()
            .copied()
            .filter(|&(nb, _)| Some(nb) != from)
            .collect();
        neighbors.sort_by_key(|&(nb, _)| self.ranks[nb]);

        // Tree edges: earlier branches may consume neighbors, so re-check
        // visited at every step
        for i in 0..neighbors.len() {
            let (nb, bi) = neighbors[i];
            if self.visited[nb] {
                continue;
            }
            let has_more = neighbors[i + 1..].iter().any(|&(m, _)| !self.visited[m]);
            if has_more {
                self.out.push('(');
                self.write_bond_symbol(bi);
                self.walk(nb, Some(atom));
                self.out.push(')');
            } else {
                self.write_bond_symbol(bi);
                self.walk(nb, Some(atom));
            }
        }
    }

    fn write_ring_digit(&mut self, digit: usize) {
        if digit < 10 {
            self.out.push((b'0' + digit as u8) as char);
        } else {
            self.out.push('%');
            self.out.push_str(&digit.to_string());
        }
    }

    /// Ring-closure bond symbol, written at the opening atom only.
    fn write_ring_bond_symbol(&mut self, order: BondOrder) {
        match order {
            BondOrder::Single | BondOrder::Aromatic => {}
            BondOrder::Double => self.out.push('='),
            BondOrder::Triple => self.out.push('#'),
        }
    }

    fn write_bond_symbol(&mut self, bond_idx: usize) {
        let bond = &self.mol.bonds[bond_idx];
        match bond.order {
            BondOrder::Single => {}
            BondOrder::Double => self.out.push('='),
            BondOrder::Triple => self.out.push('#'),
            BondOrder::Aromatic => {
                // Implicit between two aromatic atoms, explicit otherwise
                if !bond.is_aromatic {
                    self.out.push(':');
                }
            }
        }
    }

    fn write_atom(&mut self, atom_idx: usize) {
        let atom = &self.mol.atoms[atom_idx];
        let Some(elem) = element_by_number(atom.atomic_number) else {
            self.out.push('*');
            return;
        };

        // Aromatic heteroatoms carrying hydrogens must spell them out
        // ([nH] in pyrrole); otherwise the organic subset is written bare.
        let needs_bracket = atom.formal_charge != 0
            || atom.isotope.is_some()
            || !organic_subset(atom.atomic_number, atom.is_aromatic)
            || (atom.is_aromatic && atom.atomic_number != 6 && atom.implicit_hydrogens > 0);

        if !needs_bracket {
            self.write_symbol(elem.symbol, atom.is_aromatic);
            return;
        }

        self.out.push('[');
        if let Some(iso) = atom.isotope {
            self.out.push_str(&iso.to_string());
        }
        self.write_symbol(elem.symbol, atom.is_aromatic);
        if atom.implicit_hydrogens > 0 {
            self.out.push('H');
            if atom.implicit_hydrogens > 1 {
                self.out.push_str(&atom.implicit_hydrogens.to_string());
            }
        }
        if atom.formal_charge > 0 {
            self.out.push('+');
            if atom.formal_charge > 1 {
                self.out.push_str(&atom.formal_charge.to_string());
            }
        } else if atom.formal_charge < 0 {
            self.out.push('-');
            if atom.formal_charge < -1 {
                self.out.push_str(&atom.formal_charge.abs().to_string());
            }
        }
        self.out.push(']');
    }

    fn write_symbol(&mut self, symbol: &str, aromatic: bool) {
        if aromatic {
            for c in symbol.chars() {
                self.out.push(c.to_ascii_lowercase());
            }
        } else {
            self.out.push_str(symbol);
        }
    }
}

/// Atoms writable without brackets.
fn organic_subset(atomic_number: u8, is_aromatic: bool) -> bool {
    if is_aromatic {
        matches!(atomic_number, 5 | 6 | 7 | 8 | 15 | 16)
    } else {
        matches!(atomic_number, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }
}
