//! MOL V2000 connection-table parsing and writing.
//!
//! Parses the molecule block of an SD record: header (3 lines), counts line,
//! atom block (fixed-width columns), bond block and `M  CHG` property lines
//! up to `M  END`. The returned graph is raw; callers run property perception
//! before canonicalization or matching.

use chemdex_core::{ChemdexError, Result};

use crate::element::{element_by_number, element_by_symbol};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};

/// Parse a MOL V2000 block into a `Molecule`.
pub fn parse_mol_v2000(input: &str) -> Result<Molecule> {
    let lines: Vec<&str> = input.lines().collect();

    if lines.len() < 4 {
        return Err(ChemdexError::Parse("MOL block too short".into()));
    }

    // Header: line 0 = molecule name, 1 = program/timestamp, 2 = comment
    let name = lines[0].trim().to_string();

    // Counts line: aaabbblllfffcccsssxxxrrrpppiiimmmvvvvvv
    let counts = lines[3];
    if counts.len() < 6 {
        return Err(ChemdexError::Parse("counts line too short".into()));
    }
    let num_atoms: usize = counts[0..3]
        .trim()
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid atom count".into()))?;
    let num_bonds: usize = counts[3..6]
        .trim()
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid bond count".into()))?;

    let atom_start = 4;
    let bond_start = atom_start + num_atoms;
    if lines.len() < bond_start + num_bonds {
        return Err(ChemdexError::Parse("MOL block truncated".into()));
    }

    let mut atoms = Vec::with_capacity(num_atoms);
    for line in &lines[atom_start..bond_start] {
        atoms.push(parse_atom_line(line)?);
    }

    let mut bonds = Vec::with_capacity(num_bonds);
    for line in &lines[bond_start..bond_start + num_bonds] {
        let bond = parse_bond_line(line)?;
        if bond.atom1 >= num_atoms || bond.atom2 >= num_atoms {
            return Err(ChemdexError::Parse(format!(
                "bond references atom beyond count {num_atoms}"
            )));
        }
        bonds.push(bond);
    }

    // Property lines up to M  END; M  CHG overrides the atom-line charges
    for line in &lines[bond_start + num_bonds..] {
        if line.starts_with("M  END") {
            break;
        }
        if line.starts_with("M  CHG") {
            apply_charge_line(line, &mut atoms)?;
        }
    }

    Ok(Molecule::new(name, atoms, bonds))
}

/// V2000 atom line: coordinates in columns 0..30, symbol in 31..34, optional
/// old-style charge code in 36..39.
fn parse_atom_line(line: &str) -> Result<MolAtom> {
    if line.len() < 34 {
        return Err(ChemdexError::Parse(format!("atom line too short: '{line}'")));
    }

    let symbol = line[31..34].trim();
    let elem = element_by_symbol(symbol).ok_or_else(|| {
        ChemdexError::Parse(format!("unknown element '{symbol}' in MOL atom block"))
    })?;

    // Old-style charge code: 0=none, 1=+3, 2=+2, 3=+1, 4=radical, 5=-1, 6=-2, 7=-3
    let charge = if line.len() >= 39 {
        match line[36..39].trim().parse::<u8>() {
            Ok(1) => 3,
            Ok(2) => 2,
            Ok(3) => 1,
            Ok(5) => -1,
            Ok(6) => -2,
            Ok(7) => -3,
            _ => 0,
        }
    } else {
        0
    };

    let mut atom = MolAtom::of_element(elem.atomic_number);
    atom.formal_charge = charge;
    Ok(atom)
}

/// V2000 bond line: atom indices in columns 0..3 and 3..6 (1-based), bond
/// type in 6..9.
fn parse_bond_line(line: &str) -> Result<Bond> {
    if line.len() < 9 {
        return Err(ChemdexError::Parse(format!("bond line too short: '{line}'")));
    }

    let a1: usize = line[0..3]
        .trim()
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid bond atom1".into()))?;
    let a2: usize = line[3..6]
        .trim()
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid bond atom2".into()))?;
    let bond_type: u8 = line[6..9]
        .trim()
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid bond type".into()))?;

    if a1 == 0 || a2 == 0 {
        return Err(ChemdexError::Parse("bond atom indices must be >= 1".into()));
    }

    let order = match bond_type {
        2 => BondOrder::Double,
        3 => BondOrder::Triple,
        4 => BondOrder::Aromatic,
        _ => BondOrder::Single,
    };

    Ok(Bond {
        atom1: a1 - 1,
        atom2: a2 - 1,
        order,
        is_aromatic: bond_type == 4,
    })
}

/// `M  CHG  n  aaa vvv  aaa vvv ...`
fn apply_charge_line(line: &str, atoms: &mut [MolAtom]) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Ok(());
    }
    let count: usize = parts[2]
        .parse()
        .map_err(|_| ChemdexError::Parse("invalid charge count".into()))?;

    for i in 0..count {
        let idx_pos = 3 + i * 2;
        let val_pos = 4 + i * 2;
        if val_pos >= parts.len() {
            break;
        }
        let atom_idx: usize = parts[idx_pos]
            .parse::<usize>()
            .map_err(|_| ChemdexError::Parse("invalid charge atom index".into()))?;
        let charge: i8 = parts[val_pos]
            .parse()
            .map_err(|_| ChemdexError::Parse("invalid charge value".into()))?;
        if atom_idx >= 1 && atom_idx <= atoms.len() {
            atoms[atom_idx - 1].formal_charge = charge;
        }
    }
    Ok(())
}

/// Write a molecule as a MOL V2000 block (zeroed coordinates, charges as
/// `M  CHG` lines). Used to build SD fixtures and to re-export records.
pub fn write_mol_v2000(mol: &Molecule) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&mol.name);
    out.push('\n');
    out.push_str("  chemdex\n");
    out.push('\n');
    out.push_str(&format!(
        "{:>3}{:>3}  0  0  0  0  0  0  0  0  0999 V2000\n",
        mol.atom_count(),
        mol.bond_count()
    ));

    for atom in &mol.atoms {
        let symbol = element_by_number(atom.atomic_number)
            .map(|e| e.symbol)
            .unwrap_or("*");
        out.push_str(&format!(
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0\n",
            0.0, 0.0, 0.0, symbol
        ));
    }

    for bond in &mol.bonds {
        let bond_type = match bond.order {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        };
        out.push_str(&format!(
            "{:>3}{:>3}{:>3}  0\n",
            bond.atom1 + 1,
            bond.atom2 + 1,
            bond_type
        ));
    }

    let charged: Vec<(usize, i8)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, a.formal_charge))
        .collect();
    if !charged.is_empty() {
        out.push_str(&format!("M  CHG{:>3}", charged.len()));
        for (idx, chg) in charged {
            out.push_str(&format!("{idx:>4}{chg:>4}"));
        }
        out.push('\n');
    }

    out.push_str("M  END\n");
    out
}
