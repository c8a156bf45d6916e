//! Property perception: implicit hydrogens, ring membership, aromaticity.
//!
//! Both parse paths (SMILES and MOL block) funnel through
//! [`update_property_cache`] so that the same logical molecule produces the
//! same canonical SMILES and the same fingerprint regardless of the input
//! format. Substructure matching requires the haystack molecule to have gone
//! through this perception pass.

use chemdex_core::{ChemdexError, Result};

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};
use crate::ring;

/// Run full property perception on a molecule:
///
/// 1. aromatize Kekulé rings (alternating 6-rings, donor 5-rings),
/// 2. assign implicit hydrogens to atoms without an explicit count,
/// 3. validate valences.
///
/// Idempotent: running it on an already-perceived molecule changes nothing.
pub fn update_property_cache(mol: &mut Molecule) -> Result<()> {
    aromatize_rings(mol);
    assign_implicit_hydrogens(mol);
    check_valences(mol)
}

/// Assign implicit hydrogen counts from default valences.
///
/// Atoms with `hydrogens_fixed` (bracket SMILES atoms) keep their explicit
/// count. Aromatic atoms reserve one valence unit for the pi system and count
/// each ring bond as a single sigma bond.
pub fn assign_implicit_hydrogens(mol: &mut Molecule) {
    for i in 0..mol.atoms.len() {
        if mol.atoms[i].hydrogens_fixed {
            continue;
        }
        let (atomic_number, charge, aromatic) = {
            let atom = &mol.atoms[i];
            (atom.atomic_number, atom.formal_charge, atom.is_aromatic)
        };
        let Some(target) = charged_valence(atomic_number, charge) else {
            mol.atoms[i].implicit_hydrogens = 0;
            continue;
        };

        let (available, used) = if aromatic {
            (target.saturating_sub(1), mol.degree(i))
        } else {
            (target, mol.bond_order_sum(i))
        };
        mol.atoms[i].implicit_hydrogens = available.saturating_sub(used) as u8;
    }
}

/// Default valence adjusted for formal charge, for the implicit-H elements.
/// Other elements get no implicit hydrogens.
fn charged_valence(atomic_number: u8, charge: i8) -> Option<usize> {
    let base = match atomic_number {
        5 => 3,           // B
        6 => 4,           // C
        7 | 15 => 3,      // N, P
        8 | 16 => 2,      // O, S
        9 | 17 | 35 | 53 => 1, // halogens
        _ => return None,
    };
    let adjusted: i32 = match atomic_number {
        // Cations and anions of carbon both drop to three bonds
        6 => base - charge.unsigned_abs() as i32,
        // Protonation adds a bond, deprotonation removes one
        7 | 8 | 15 | 16 => base + charge as i32,
        _ => base,
    };
    (adjusted >= 0).then_some(adjusted as usize)
}

/// Detect aromatic rings in Kekulé-form input and normalize them: ring atoms
/// become aromatic and endocyclic ring bonds become `BondOrder::Aromatic`.
///
/// Recognized patterns, deliberately conservative:
/// - 6-rings of B/C/N/O/P/S where every atom is already aromatic or carries an
///   endocyclic double bond (benzene, pyridine, fused naphthalene rings);
/// - 5-rings with exactly one lone-pair donor (N/O/S, all-single ring bonds)
///   and four atoms carrying endocyclic double or aromatic bonds (pyrrole,
///   furan, thiophene).
fn aromatize_rings(mol: &mut Molecule) {
    let rings = ring::find_sssr(mol);

    // Fused systems need more than one sweep: in Kekulé naphthalene the
    // second ring only qualifies once the shared bond of the first has been
    // rewritten to aromatic.
    let mut remaining: Vec<&Vec<usize>> = rings.iter().collect();
    loop {
        let before = remaining.len();
        let mut deferred: Vec<&Vec<usize>> = Vec::new();
        for ring_atoms in remaining {
            if ring_qualifies(mol, ring_atoms) {
                apply_aromaticity(mol, ring_atoms);
            } else {
                deferred.push(ring_atoms);
            }
        }
        // Converged: a full pass either cleared the list or deferred all of it
        if deferred.is_empty() || deferred.len() == before {
            break;
        }
        remaining = deferred;
    }
}

fn ring_qualifies(mol: &Molecule, ring_atoms: &[usize]) -> bool {
    match ring_atoms.len() {
        6 => ring_atoms.iter().all(|&a| {
            aromatic_subset(mol.atoms[a].atomic_number)
                && (mol.atoms[a].is_aromatic || has_endocyclic_pi_bond(mol, a, ring_atoms))
        }),
        5 => {
            let donors: Vec<usize> = ring_atoms
                .iter()
                .copied()
                .filter(|&a| is_lone_pair_donor(mol, a, ring_atoms))
                .collect();
            donors.len() == 1
                && ring_atoms.iter().all(|&a| {
                    aromatic_subset(mol.atoms[a].atomic_number)
                        && (donors.contains(&a)
                            || mol.atoms[a].is_aromatic
                            || has_endocyclic_pi_bond(mol, a, ring_atoms))
                })
        }
        _ => false,
    }
}

fn apply_aromaticity(mol: &mut Molecule, ring_atoms: &[usize]) {
    // Lone-pair donors keep their Kekulé hydrogen count (pyrrole N-H): the
    // aromatic H formula would steal a valence unit for the pi system that
    // their lone pair already provides.
    for &a in ring_atoms {
        let (atomic_number, charge, aromatic, fixed) = {
            let atom = &mol.atoms[a];
            (atom.atomic_number, atom.formal_charge, atom.is_aromatic, atom.hydrogens_fixed)
        };
        if !aromatic && !fixed && is_lone_pair_donor(mol, a, ring_atoms) {
            if let Some(target) = charged_valence(atomic_number, charge) {
                let used = mol.bond_order_sum(a);
                mol.atoms[a].implicit_hydrogens = target.saturating_sub(used) as u8;
                mol.atoms[a].hydrogens_fixed = true;
            }
        }
    }
    for &a in ring_atoms {
        mol.atoms[a].is_aromatic = true;
    }
    for i in 0..ring_atoms.len() {
        let a = ring_atoms[i];
        let b = ring_atoms[(i + 1) % ring_atoms.len()];
        if let Some(bi) = bond_index_between(mol, a, b) {
            mol.bonds[bi].order = BondOrder::Aromatic;
            mol.bonds[bi].is_aromatic = true;
        }
    }
}

fn aromatic_subset(atomic_number: u8) -> bool {
    matches!(atomic_number, 5 | 6 | 7 | 8 | 15 | 16)
}

/// Does this ring atom carry a double or aromatic bond to another ring atom?
fn has_endocyclic_pi_bond(mol: &Molecule, atom: usize, ring_atoms: &[usize]) -> bool {
    mol.adjacency[atom].iter().any(|&(n, bi)| {
        ring_atoms.contains(&n)
            && matches!(mol.bonds[bi].order, BondOrder::Double | BondOrder::Aromatic)
    })
}

/// A 5-ring heteroatom that contributes a lone pair: N/O/S with only single
/// bonds inside the ring and no double bond anywhere.
fn is_lone_pair_donor(mol: &Molecule, atom: usize, ring_atoms: &[usize]) -> bool {
    if !matches!(mol.atoms[atom].atomic_number, 7 | 8 | 16) {
        return false;
    }
    let no_pi_anywhere = mol.adjacency[atom]
        .iter()
        .all(|&(_, bi)| !matches!(mol.bonds[bi].order, BondOrder::Double | BondOrder::Triple));
    no_pi_anywhere && !has_endocyclic_pi_bond(mol, atom, ring_atoms)
}

fn bond_index_between(mol: &Molecule, a: usize, b: usize) -> Option<usize> {
    mol.adjacency[a].iter().find(|&&(n, _)| n == b).map(|&(_, bi)| bi)
}

/// Reject atoms whose explicit bonds exceed what the element can carry.
fn check_valences(mol: &Molecule) -> Result<()> {
    for (i, atom) in mol.atoms.iter().enumerate() {
        let Some(elem) = element_by_number(atom.atomic_number) else {
            return Err(ChemdexError::Sanitize(format!(
                "atom {i} has unsupported atomic number {}",
                atom.atomic_number
            )));
        };
        let limit = elem.max_bonds as usize + atom.formal_charge.unsigned_abs() as usize;
        let used = mol.bond_order_sum(i);
        if limit > 0 && used > limit {
            return Err(ChemdexError::Sanitize(format!(
                "valence {used} on atom {i} ({}) exceeds maximum {limit}",
                elem.symbol
            )));
        }
    }
    Ok(())
}
