//! Ring detection via smallest set of smallest rings (SSSR).

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Find the smallest set of smallest rings (SSSR) in a molecule.
///
/// Returns one `Vec<usize>` of atom indices per ring, rings sorted by size.
pub(crate) fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    if n == 0 || mol.bond_count() == 0 {
        return Vec::new();
    }

    // Ring count by the cycle rank: bonds - atoms + components
    let expected =
        mol.bond_count() as isize - n as isize + connected_components(mol) as isize;
    if expected <= 0 {
        return Vec::new();
    }

    let in_ring = ring_atom_flags(mol);
    if !in_ring.iter().any(|&r| r) {
        return Vec::new();
    }

    // The shortest cycle through each ring bond, found by BFS with the bond
    // itself excluded
    let mut rings: Vec<Vec<usize>> = Vec::new();
    for (bi, bond) in mol.bonds.iter().enumerate() {
        if !in_ring[bond.atom1] || !in_ring[bond.atom2] {
            continue;
        }
        if let Some(mut ring) = shortest_path_avoiding(mol, bond.atom1, bond.atom2, bi, &in_ring) {
            normalize_ring(&mut ring);
            if !rings.contains(&ring) {
                rings.push(ring);
            }
        }
    }

    rings.sort_by_key(|r| r.len());
    rings.truncate(expected as usize);
    rings
}

/// Per-atom ring membership, computed by iteratively pruning terminal atoms.
pub(crate) fn ring_atom_flags(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut degree: Vec<usize> = (0..n).map(|i| mol.adjacency[i].len()).collect();

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();
    let mut pruned = vec![false; n];
    while let Some(atom) = queue.pop_front() {
        if pruned[atom] {
            continue;
        }
        pruned[atom] = true;
        for &(nb, _) in &mol.adjacency[atom] {
            if !pruned[nb] {
                degree[nb] -= 1;
                if degree[nb] <= 1 {
                    queue.push_back(nb);
                }
            }
        }
    }

    pruned.iter().map(|&p| !p).collect()
}

fn connected_components(mol: &Molecule) -> usize {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = 0;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        while let Some(curr) = queue.pop_front() {
            for &(nb, _) in &mol.adjacency[curr] {
                if !visited[nb] {
                    visited[nb] = true;
                    queue.push_back(nb);
                }
            }
        }
    }

    components
}

/// BFS from `start` to `end` avoiding one bond, restricted to ring atoms.
fn shortest_path_avoiding(
    mol: &Molecule,
    start: usize,
    end: usize,
    excluded_bond: usize,
    in_ring: &[bool],
) -> Option<Vec<usize>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut parent = vec![usize::MAX; n];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(curr) = queue.pop_front() {
        if curr == end {
            let mut path = Vec::new();
            let mut node = end;
            while node != start {
                path.push(node);
                node = parent[node];
            }
            path.push(start);
            path.reverse();
            return Some(path);
        }
        for &(nb, bi) in &mol.adjacency[curr] {
            if bi == excluded_bond || visited[nb] || !in_ring[nb] {
                continue;
            }
            visited[nb] = true;
            parent[nb] = curr;
            queue.push_back(nb);
        }
    }

    None
}

/// Rotate/flip a ring so it starts at its smallest index and runs in the
/// direction with the lexicographically smaller second element.
fn normalize_ring(ring: &mut Vec<usize>) {
    if ring.is_empty() {
        return;
    }
    let min_pos = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| v)
        .map(|(i, _)| i)
        .unwrap_or(0);
    ring.rotate_left(min_pos);

    let n = ring.len();
    if n > 2 && ring[n - 1] < ring[1] {
        ring[1..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn benzene_one_ring() {
        let mol = parse_smiles("c1ccccc1", true).unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
    }

    #[test]
    fn naphthalene_two_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1", true).unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 2);
        for ring in &rings {
            assert_eq!(ring.len(), 6);
        }
    }

    #[test]
    fn acyclic_no_rings() {
        let mol = parse_smiles("CCCC", true).unwrap();
        assert!(find_sssr(&mol).is_empty());
        assert!(ring_atom_flags(&mol).iter().all(|&r| !r));
    }

    #[test]
    fn spiro_rings_found() {
        // Spiro[4.5]decane: two rings sharing one atom
        let mol = parse_smiles("C1CCC2(CC1)CCCC2", true).unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn ring_flags_mark_only_cycle_atoms() {
        // Toluene: methyl carbon is not in the ring
        let mol = parse_smiles("Cc1ccccc1", true).unwrap();
        let flags = ring_atom_flags(&mol);
        assert_eq!(flags.iter().filter(|&&f| f).count(), 6);
        assert!(!flags[0]);
    }
}
