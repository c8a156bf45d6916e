//! Molecular graph representation.

use chemdex_core::{Annotated, ContentAddressable, Summarizable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    /// Stable single-byte code used by hashing and canonical ordering.
    pub fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
    /// True when the hydrogen count was given explicitly (bracket atoms);
    /// perception must not overwrite it.
    pub hydrogens_fixed: bool,
}

impl MolAtom {
    /// A neutral, non-aromatic atom of the given element with hydrogens left
    /// for perception to fill in.
    pub fn of_element(atomic_number: u8) -> Self {
        MolAtom {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
            hydrogens_fixed: false,
        }
    }
}

/// A bond between two atoms, referenced by index into `Molecule::atoms`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub is_aromatic: bool,
}

impl Bond {
    /// The atom on the other end of this bond.
    pub fn other(&self, atom_idx: usize) -> usize {
        if self.atom1 == atom_idx {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    #[serde(skip)]
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut mol = Molecule {
            name,
            atoms,
            bonds,
            adjacency: Vec::new(),
        };
        mol.rebuild_adjacency();
        mol
    }

    /// Rebuild the adjacency list; required after deserialization.
    pub fn rebuild_adjacency(&mut self) {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for (bi, bond) in self.bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        self.adjacency = adjacency;
    }

    /// Number of graph nodes (explicit atoms).
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of bonds.
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.atomic_number != 1).count()
    }

    /// Neighbor atom indices for a given atom.
    pub fn neighbors(&self, atom_idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom_idx].iter().map(|&(n, _)| n)
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Find the bond between two atoms, if any.
    pub fn bond_between(&self, a1: usize, a2: usize) -> Option<&Bond> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| &self.bonds[bi])
    }

    /// Sum of bond orders at an atom, rounded to an integer valence.
    pub fn bond_order_sum(&self, atom_idx: usize) -> usize {
        let v: f64 = self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum();
        v.round() as usize
    }

    /// Total hydrogen count (implicit + explicit H atoms).
    pub fn total_hydrogen_count(&self) -> usize {
        let explicit = self.atoms.iter().filter(|a| a.atomic_number == 1).count();
        let implicit: usize = self.atoms.iter().map(|a| a.implicit_hydrogens as usize).sum();
        explicit + implicit
    }
}

impl Annotated for Molecule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} atoms, {} bonds",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.atom_count(),
            self.bond_count()
        )
    }
}

impl ContentAddressable for Molecule {
    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let mut sorted_atoms: Vec<_> = self.atoms.iter().collect();
        sorted_atoms.sort_by_key(|a| {
            (a.atomic_number, a.formal_charge, a.isotope, a.is_aromatic, a.implicit_hydrogens)
        });
        for atom in &sorted_atoms {
            hasher.update([atom.atomic_number]);
            hasher.update(atom.formal_charge.to_le_bytes());
            hasher.update(atom.implicit_hydrogens.to_le_bytes());
            if let Some(iso) = atom.isotope {
                hasher.update(iso.to_le_bytes());
            }
            hasher.update([atom.is_aromatic as u8]);
        }
        let mut sorted_bonds: Vec<_> = self.bonds.iter().collect();
        sorted_bonds.sort_by_key(|b| {
            let (a, c) = if b.atom1 <= b.atom2 { (b.atom1, b.atom2) } else { (b.atom2, b.atom1) };
            (a, c, b.order.code())
        });
        for bond in &sorted_bonds {
            let (lo, hi) = if bond.atom1 <= bond.atom2 {
                (bond.atom1, bond.atom2)
            } else {
                (bond.atom2, bond.atom1)
            };
            hasher.update(lo.to_le_bytes());
            hasher.update(hi.to_le_bytes());
            hasher.update([bond.order.code()]);
        }
        hex::encode(hasher.finalize())
    }
}
