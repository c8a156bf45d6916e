//! Molecular fingerprints.
//!
//! Two algorithms:
//!
//! - [`linear_fingerprint`] — the screening fingerprint. Bits encode atom
//!   labels and labelled linear paths, so every feature of a substructure is
//!   also a feature of any molecule containing it: for S ⊆ M,
//!   bits(query(S)) ⊆ bits(structure(M)). Structure-side fingerprints may add
//!   whole-molecule bits that query fingerprints never emit.
//! - [`morgan_fingerprint`] — ECFP-style circular fingerprint for similarity
//!   work. Environment hashes include degree, so it carries no containment
//!   guarantee and must not back the screening index.

use chemdex_core::ContentAddressable;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::molecule::Molecule;
use crate::ring;

/// Feature class: one bit per distinct atom label.
pub const CLASS_ATOMS: u32 = 0b001;
/// Feature class: one bit per distinct labelled linear path.
pub const CLASS_PATHS: u32 = 0b010;
/// Feature class: whole-molecule bits (atom/bond/ring count buckets).
/// Never emitted for query fingerprints — counts are not preserved under
/// substructure containment screening.
pub const CLASS_GLOBALS: u32 = 0b100;
/// All feature classes.
pub const CLASS_DEFAULT: u32 = CLASS_ATOMS | CLASS_PATHS | CLASS_GLOBALS;

/// A fixed-size bit vector fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    bits: Vec<u64>,
    nbits: usize,
}

impl Fingerprint {
    /// Create an empty fingerprint of the given width.
    pub fn new(nbits: usize) -> Self {
        let nwords = nbits.div_ceil(64);
        Fingerprint {
            bits: vec![0u64; nwords],
            nbits,
        }
    }

    /// Set the bit at `pos` (modulo the width).
    pub fn set_bit(&mut self, pos: usize) {
        let pos = pos % self.nbits;
        self.bits[pos / 64] |= 1u64 << (pos % 64);
    }

    /// Read the bit at `pos` (modulo the width).
    pub fn get_bit(&self, pos: usize) -> bool {
        let pos = pos % self.nbits;
        (self.bits[pos / 64] >> (pos % 64)) & 1 == 1
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    /// Width in bits.
    pub fn nbits(&self) -> usize {
        self.nbits
    }

    /// Indices of all set bits, ascending.
    pub fn set_bits(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.count_ones() as usize);
        for (w, &word) in self.bits.iter().enumerate() {
            let mut word = word;
            while word != 0 {
                let b = word.trailing_zeros() as usize;
                out.push(w * 64 + b);
                word &= word - 1;
            }
        }
        out
    }

    /// True if every set bit of `self` is also set in `other`.
    pub fn is_subset_of(&self, other: &Fingerprint) -> bool {
        self.nbits == other.nbits
            && self
                .bits
                .iter()
                .zip(other.bits.iter())
                .all(|(a, b)| a & !b == 0)
    }
}

impl ContentAddressable for Fingerprint {
    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for word in &self.bits {
            hasher.update(word.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Tanimoto similarity coefficient between two fingerprints of equal width.
///
/// Returns 1.0 for identical fingerprints, 0.0 for disjoint ones.
pub fn tanimoto_similarity(fp1: &Fingerprint, fp2: &Fingerprint) -> f64 {
    assert_eq!(fp1.nbits, fp2.nbits, "fingerprints must have the same size");

    let mut and_count = 0u32;
    let mut or_count = 0u32;
    for (w1, w2) in fp1.bits.iter().zip(fp2.bits.iter()) {
        and_count += (w1 & w2).count_ones();
        or_count += (w1 | w2).count_ones();
    }
    if or_count == 0 {
        return 1.0;
    }
    and_count as f64 / or_count as f64
}

/// The leading bit span reserved for atom-class bits: the bit index of an
/// atom feature is the atomic number itself, so element absence screens
/// exactly instead of depending on hash placement. Hashed features fold into
/// the remaining span.
const ATOM_BIT_SPAN: usize = 119;

/// Compute the linear (path-based) screening fingerprint.
///
/// `max_path_len` is the maximum path length in bonds (5 matches typical
/// screening setups). `bit_flags` selects feature classes; `query_mode`
/// additionally suppresses the non-monotone [`CLASS_GLOBALS`] class so the
/// containment invariant holds for query fingerprints.
pub fn linear_fingerprint(
    mol: &Molecule,
    nbits: usize,
    max_path_len: usize,
    bit_flags: u32,
    query_mode: bool,
) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    let n = mol.atom_count();
    if n == 0 {
        return fp;
    }

    if bit_flags & CLASS_ATOMS != 0 {
        for atom in &mol.atoms {
            fp.set_bit(atom.atomic_number as usize % nbits);
        }
    }

    if bit_flags & CLASS_PATHS != 0 {
        let mut on_path = vec![false; n];
        let mut labels: Vec<u64> = Vec::with_capacity(2 * max_path_len + 1);
        for start in 0..n {
            labels.push(mol.atoms[start].atomic_number as u64);
            on_path[start] = true;
            grow_paths(mol, start, max_path_len, &mut on_path, &mut labels, &mut fp, nbits);
            on_path[start] = false;
            labels.pop();
        }
    }

    if bit_flags & CLASS_GLOBALS != 0 && !query_mode {
        let heavy = mol.heavy_atom_count() as u64;
        let bonds = mol.bond_count() as u64;
        let rings = ring::find_sssr(mol).len() as u64;
        fp.set_bit(fold(feature_hash(CLASS_GLOBALS, &[1, heavy.min(64)]), nbits));
        fp.set_bit(fold(feature_hash(CLASS_GLOBALS, &[2, bonds.min(64)]), nbits));
        fp.set_bit(fold(feature_hash(CLASS_GLOBALS, &[3, rings.min(16)]), nbits));
    }

    fp
}

/// DFS over simple paths, emitting one bit per path in direction-independent
/// form.
fn grow_paths(
    mol: &Molecule,
    current: usize,
    remaining: usize,
    on_path: &mut [bool],
    labels: &mut Vec<u64>,
    fp: &mut Fingerprint,
    nbits: usize,
) {
    if remaining == 0 {
        return;
    }
    for &(nb, bi) in &mol.adjacency[current] {
        if on_path[nb] {
            continue;
        }
        labels.push(mol.bonds[bi].order.code() as u64);
        labels.push(mol.atoms[nb].atomic_number as u64);

        fp.set_bit(fold(path_hash(labels), nbits));

        on_path[nb] = true;
        grow_paths(mol, nb, remaining - 1, on_path, labels, fp, nbits);
        on_path[nb] = false;

        labels.pop();
        labels.pop();
    }
}

/// Hash a path label sequence, using whichever direction compares smaller so
/// both endpoints produce the same bit.
fn path_hash(labels: &[u64]) -> u64 {
    let forward = labels.iter();
    let backward = labels.iter().rev();
    let use_forward = forward.clone().le(backward.clone());

    let mut h = fnv1a_update(FNV_OFFSET, CLASS_PATHS as u64);
    if use_forward {
        for &l in labels {
            h = fnv1a_update(h, l);
        }
    } else {
        for &l in labels.iter().rev() {
            h = fnv1a_update(h, l);
        }
    }
    h
}

fn feature_hash(class: u32, values: &[u64]) -> u64 {
    let mut h = fnv1a_update(FNV_OFFSET, class as u64);
    for &v in values {
        h = fnv1a_update(h, v);
    }
    h
}

/// Compute a Morgan (ECFP-like) fingerprint.
///
/// `radius` controls the neighborhood size (2 = ECFP4, 3 = ECFP6).
pub fn morgan_fingerprint(mol: &Molecule, radius: usize, nbits: usize) -> Fingerprint {
    let n = mol.atom_count();
    let mut fp = Fingerprint::new(nbits);
    if n == 0 {
        return fp;
    }

    let ring_atoms = ring::ring_atom_flags(mol);

    // Initial invariants: hash of the local atom environment
    let mut identifiers: Vec<u64> = Vec::with_capacity(n);
    for (i, atom) in mol.atoms.iter().enumerate() {
        let mut h = FNV_OFFSET;
        h = fnv1a_update(h, atom.atomic_number as u64);
        h = fnv1a_update(h, mol.degree(i) as u64);
        h = fnv1a_update(h, atom.implicit_hydrogens as u64);
        h = fnv1a_update(h, atom.formal_charge as u64);
        h = fnv1a_update(h, ring_atoms[i] as u64);
        h = fnv1a_update(h, atom.is_aromatic as u64);
        identifiers.push(h);
    }
    for &id in &identifiers {
        fp.set_bit(id as usize % nbits);
    }

    // Expand the environment one bond per round
    for _ in 0..radius {
        let mut next = Vec::with_capacity(n);
        for i in 0..n {
            let mut neighbor_ids: Vec<(u64, u8)> = mol.adjacency[i]
                .iter()
                .map(|&(nb, bi)| (identifiers[nb], mol.bonds[bi].order.code()))
                .collect();
            neighbor_ids.sort_unstable();

            let mut h = fnv1a_update(FNV_OFFSET, identifiers[i]);
            for (nid, border) in &neighbor_ids {
                h = fnv1a_update(h, *nid);
                h = fnv1a_update(h, *border as u64);
            }
            next.push(h);
            fp.set_bit(h as usize % nbits);
        }
        identifiers = next;
    }

    fp
}

// FNV-1a for deterministic hashing
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_update(hash: u64, value: u64) -> u64 {
    let mut h = hash;
    for &b in &value.to_le_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Fold a hashed feature into the span above the reserved atom bits (or the
/// whole width when the fingerprint is too narrow to reserve one).
fn fold(hash: u64, nbits: usize) -> usize {
    if nbits > ATOM_BIT_SPAN {
        ATOM_BIT_SPAN + (hash as usize) % (nbits - ATOM_BIT_SPAN)
    } else {
        (hash as usize) % nbits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn mol(smi: &str) -> Molecule {
        parse_smiles(smi, true).unwrap()
    }

    fn structure_fp(smi: &str) -> Fingerprint {
        linear_fingerprint(&mol(smi), 512, 5, CLASS_DEFAULT, false)
    }

    fn query_fp(smi: &str) -> Fingerprint {
        linear_fingerprint(&mol(smi), 512, 5, CLASS_DEFAULT, true)
    }

    #[test]
    fn bit_operations() {
        let mut fp = Fingerprint::new(128);
        assert!(!fp.get_bit(42));
        fp.set_bit(42);
        assert!(fp.get_bit(42));
        assert_eq!(fp.count_ones(), 1);
        fp.set_bit(100);
        assert_eq!(fp.count_ones(), 2);
        assert_eq!(fp.set_bits(), vec![42, 100]);
    }

    #[test]
    fn subset_relation() {
        let mut a = Fingerprint::new(64);
        let mut b = Fingerprint::new(64);
        a.set_bit(3);
        b.set_bit(3);
        b.set_bit(7);
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
        assert!(a.is_subset_of(&a));
    }

    #[test]
    fn linear_fp_is_deterministic() {
        let fp1 = structure_fp("CC(=O)Oc1ccccc1C(=O)O");
        let fp2 = structure_fp("CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.content_hash(), fp2.content_hash());
    }

    #[test]
    fn substructure_queries_are_bit_subsets() {
        let cases = [
            ("CC", "CCO"),
            ("CCO", "CCCO"),
            ("c1ccccc1", "Cc1ccccc1"),
            ("c1ccccc1", "CC(=O)Oc1ccccc1C(=O)O"),
            ("C=O", "CC(=O)O"),
            ("C", "CC(C)C"),
        ];
        for (sub, sup) in cases {
            assert!(
                query_fp(sub).is_subset_of(&structure_fp(sup)),
                "query bits of '{sub}' should be contained in structure bits of '{sup}'"
            );
        }
    }

    #[test]
    fn non_substructures_are_screened_out() {
        // Ethanol has an oxygen atom bit that benzene lacks
        assert!(!query_fp("CCO").is_subset_of(&structure_fp("c1ccccc1")));
        // Aromatic paths never show up in cyclohexane
        assert!(!query_fp("c1ccccc1").is_subset_of(&structure_fp("C1CCCCC1")));
    }

    #[test]
    fn query_fp_skips_global_bits() {
        let q = query_fp("CCO");
        let s = structure_fp("CCO");
        assert!(q.is_subset_of(&s));
        assert!(q.count_ones() < s.count_ones());
    }

    #[test]
    fn path_direction_does_not_matter() {
        // The same molecule entered from both ends gives identical bits
        let a = query_fp("CCN");
        let b = query_fp("NCC");
        assert_eq!(a, b);
    }

    #[test]
    fn morgan_deterministic_and_tanimoto() {
        let ethanol = mol("CCO");
        let fp1 = morgan_fingerprint(&ethanol, 2, 2048);
        let fp2 = morgan_fingerprint(&ethanol, 2, 2048);
        assert_eq!(fp1, fp2);
        assert!((tanimoto_similarity(&fp1, &fp2) - 1.0).abs() < 1e-10);

        let propanol = mol("CCCO");
        let fp3 = morgan_fingerprint(&propanol, 2, 2048);
        let sim = tanimoto_similarity(&fp1, &fp3);
        assert!(sim > 0.0 && sim < 1.0, "tanimoto = {sim}");
    }

    #[test]
    fn empty_molecule_fingerprint() {
        let empty = Molecule::new("".into(), vec![], vec![]);
        let fp = linear_fingerprint(&empty, 512, 5, CLASS_DEFAULT, false);
        assert_eq!(fp.count_ones(), 0);
    }
}
