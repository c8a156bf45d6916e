//! SMILES string parser.
//!
//! Accepts the organic subset, bracket atoms (isotope, charge, explicit
//! hydrogen counts), branches, ring closures (including `%nn`), aromatic
//! lowercase atoms and disconnected fragments. Stereo markers (`@`, `/`, `\`)
//! are consumed and discarded; stereochemistry is out of scope for the search
//! engine.

use std::collections::BTreeMap;

use chemdex_core::{ChemdexError, Result};

use crate::element::element_by_symbol;
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};
use crate::perception;

/// Parse a SMILES string into a `Molecule`.
///
/// With `sanitize` set, the molecule additionally goes through full property
/// perception (valence check, ring perception, aromatization). Without it,
/// only implicit hydrogens are assigned — the fast path for SMILES that are
/// already canonical.
pub fn parse_smiles(smiles: &str, sanitize: bool) -> Result<Molecule> {
    parse_smiles_named(smiles, "", sanitize)
}

/// Parse a SMILES string into a `Molecule` with a given name.
pub fn parse_smiles_named(smiles: &str, name: &str, sanitize: bool) -> Result<Molecule> {
    let mut parser = SmilesParser::new(smiles);
    parser.run()?;
    parser.check_balanced()?;

    let mut mol = Molecule::new(name.to_string(), parser.atoms, parser.bonds);
    if sanitize {
        perception::update_property_cache(&mut mol)?;
    } else {
        perception::assign_implicit_hydrogens(&mut mol);
    }
    Ok(mol)
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<MolAtom>,
    bonds: Vec<Bond>,
    /// ring_openings[number] = (atom_idx, bond order given at the opening)
    ring_openings: BTreeMap<u16, (usize, Option<BondOrder>)>,
    /// Branch return points
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            ring_openings: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn fail(&self, msg: impl Into<String>) -> ChemdexError {
        ChemdexError::Parse(format!("{} at position {}", msg.into(), self.pos))
    }

    fn run(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.bump();
                    match self.prev_atom {
                        Some(prev) => self.stack.push(prev),
                        None => return Err(self.fail("branch without preceding atom")),
                    }
                }
                b')' => {
                    self.bump();
                    self.prev_atom = self.stack.pop();
                    if self.prev_atom.is_none() {
                        return Err(self.fail("unmatched ')'"));
                    }
                    self.pending_bond = None;
                }
                b'-' => {
                    self.bump();
                    self.pending_bond = Some(BondOrder::Single);
                }
                b'=' => {
                    self.bump();
                    self.pending_bond = Some(BondOrder::Double);
                }
                b'#' => {
                    self.bump();
                    self.pending_bond = Some(BondOrder::Triple);
                }
                b':' => {
                    self.bump();
                    self.pending_bond = Some(BondOrder::Aromatic);
                }
                b'/' | b'\\' => {
                    // Directional single bonds; stereo is discarded
                    self.bump();
                    self.pending_bond = Some(BondOrder::Single);
                }
                b'%' => {
                    self.bump();
                    let num = self.two_digit_ring_number()?;
                    self.ring_bond(num)?;
                }
                b'[' => self.bracket_atom()?,
                b'0'..=b'9' => {
                    self.bump();
                    self.ring_bond((ch - b'0') as u16)?;
                }
                b'.' => {
                    self.bump();
                    self.prev_atom = None;
                    self.pending_bond = None;
                }
                _ if is_organic_start(ch) => self.organic_atom()?,
                _ => {
                    return Err(self.fail(format!("unexpected character '{}'", ch as char)));
                }
            }
        }
        Ok(())
    }

    /// An atom of the organic subset, written without brackets.
    fn organic_atom(&mut self) -> Result<()> {
        let ch = self.bump().unwrap();
        let aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase();

        // Two-letter symbols allowed outside brackets: Cl, Br (and Si/Se,
        // which some writers emit unbracketed)
        let symbol: String = match (upper, self.peek()) {
            (b'C', Some(b'l')) if !aromatic => {
                self.bump();
                "Cl".into()
            }
            (b'B', Some(b'r')) if !aromatic => {
                self.bump();
                "Br".into()
            }
            (b'S', Some(b'i')) if !aromatic => {
                self.bump();
                "Si".into()
            }
            (b'S', Some(b'e')) if !aromatic => {
                self.bump();
                "Se".into()
            }
            _ => (upper as char).to_string(),
        };

        if !matches!(symbol.as_str(), "B" | "C" | "N" | "O" | "P" | "S" | "F" | "Cl" | "Br" | "I" | "Si" | "Se") {
            return Err(self.fail(format!("'{symbol}' is not an organic subset atom")));
        }
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| self.fail(format!("unknown element '{symbol}'")))?;

        let mut atom = MolAtom::of_element(elem.atomic_number);
        atom.is_aromatic = aromatic;
        self.push_atom(atom);
        Ok(())
    }

    /// A bracket atom: `[isotope? symbol chiral? Hcount? charge?]`.
    fn bracket_atom(&mut self) -> Result<()> {
        self.bump(); // consume '['

        let isotope = self.number();

        let first = self
            .bump()
            .ok_or_else(|| self.fail("unterminated bracket atom"))?;
        if !first.is_ascii_alphabetic() {
            return Err(self.fail("expected element symbol in bracket atom"));
        }
        let aromatic = first.is_ascii_lowercase();
        let upper = first.to_ascii_uppercase();

        // Greedily try the two-letter symbol
        let symbol = match self.peek() {
            Some(next) if next.is_ascii_lowercase() => {
                let two = format!("{}{}", upper as char, next as char);
                if element_by_symbol(&two).is_some() {
                    self.bump();
                    two
                } else {
                    (upper as char).to_string()
                }
            }
            _ => (upper as char).to_string(),
        };
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| self.fail(format!("unknown element '{symbol}'")))?;

        // Chirality markers are consumed and dropped
        while self.peek() == Some(b'@') {
            self.bump();
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.bump();
            hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.bump();
                    d - b'0'
                }
                _ => 1,
            };
        }

        let charge = self.charge()?;

        if self.bump() != Some(b']') {
            return Err(self.fail("expected ']' to close bracket atom"));
        }

        let atom = MolAtom {
            atomic_number: elem.atomic_number,
            formal_charge: charge,
            isotope: isotope.map(|n| n as u16),
            is_aromatic: aromatic,
            implicit_hydrogens: hydrogens,
            hydrogens_fixed: true,
        };
        self.push_atom(atom);
        Ok(())
    }

    /// `+`, `-`, `++`, `+2`, `-3`, ...
    fn charge(&mut self) -> Result<i8> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let symbol = self.bump().unwrap();

        if let Some(d) = self.peek() {
            if d.is_ascii_digit() {
                self.bump();
                return Ok(sign * (d - b'0') as i8);
            }
        }
        // Repeated +/- symbols
        let mut magnitude: i8 = 1;
        while self.peek() == Some(symbol) {
            self.bump();
            magnitude += 1;
        }
        Ok(sign * magnitude)
    }

    fn number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut seen = false;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.bump();
            n = n * 10 + (ch - b'0') as u32;
            seen = true;
        }
        seen.then_some(n)
    }

    fn two_digit_ring_number(&mut self) -> Result<u16> {
        let d1 = self.bump().ok_or_else(|| self.fail("expected digit after '%'"))?;
        let d2 = self.bump().ok_or_else(|| self.fail("expected second digit after '%'"))?;
        if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
            return Err(self.fail("invalid ring closure number after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    /// Open or close a ring closure bond for the given number.
    fn ring_bond(&mut self, number: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.fail("ring closure without preceding atom"))?;

        if let Some((open_atom, open_order)) = self.ring_openings.remove(&number) {
            if open_atom == current {
                return Err(self.fail(format!("ring closure {number} bonds an atom to itself")));
            }
            let both_aromatic =
                self.atoms[open_atom].is_aromatic && self.atoms[current].is_aromatic;
            let order = match self.pending_bond.take().or(open_order) {
                Some(order) => order,
                None if both_aromatic => BondOrder::Aromatic,
                None => BondOrder::Single,
            };
            self.bonds.push(Bond {
                atom1: open_atom,
                atom2: current,
                order,
                is_aromatic: both_aromatic && order == BondOrder::Aromatic,
            });
        } else {
            self.ring_openings
                .insert(number, (current, self.pending_bond.take()));
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: MolAtom) {
        let atom_idx = self.atoms.len();
        self.atoms.push(atom);

        if let Some(prev) = self.prev_atom {
            let both_aromatic = self.atoms[prev].is_aromatic && self.atoms[atom_idx].is_aromatic;
            let order = match self.pending_bond.take() {
                Some(order) => order,
                None if both_aromatic => BondOrder::Aromatic,
                None => BondOrder::Single,
            };
            self.bonds.push(Bond {
                atom1: prev,
                atom2: atom_idx,
                order,
                is_aromatic: both_aromatic && order == BondOrder::Aromatic,
            });
        }
        self.pending_bond = None;
        self.prev_atom = Some(atom_idx);
    }

    fn check_balanced(&self) -> Result<()> {
        if !self.ring_openings.is_empty() {
            let open: Vec<_> = self.ring_openings.keys().collect();
            return Err(ChemdexError::Parse(format!(
                "unmatched ring closure(s): {open:?}"
            )));
        }
        if !self.stack.is_empty() {
            return Err(ChemdexError::Parse(format!(
                "{} unmatched '(' in SMILES",
                self.stack.len()
            )));
        }
        Ok(())
    }
}

fn is_organic_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_methane() {
        let mol = parse_smiles("C", true).unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(mol.atoms[0].atomic_number, 6);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_ethanol() {
        let mol = parse_smiles("CCO", true).unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[2].implicit_hydrogens, 1);
    }

    #[test]
    fn parse_benzene() {
        let mol = parse_smiles("c1ccccc1", true).unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        for atom in &mol.atoms {
            assert!(atom.is_aromatic);
            assert_eq!(atom.implicit_hydrogens, 1);
        }
        for bond in &mol.bonds {
            assert_eq!(bond.order, BondOrder::Aromatic);
        }
    }

    #[test]
    fn parse_branching() {
        let mol = parse_smiles("CC(C)C", true).unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_count(), 3);
        assert_eq!(mol.degree(1), 3);
    }

    #[test]
    fn parse_double_and_triple_bonds() {
        let ethene = parse_smiles("C=C", true).unwrap();
        assert_eq!(ethene.bonds[0].order, BondOrder::Double);
        assert_eq!(ethene.atoms[0].implicit_hydrogens, 2);

        let hcn = parse_smiles("C#N", true).unwrap();
        assert_eq!(hcn.bonds[0].order, BondOrder::Triple);
        assert_eq!(hcn.atoms[0].implicit_hydrogens, 1);
        assert_eq!(hcn.atoms[1].implicit_hydrogens, 0);
    }

    #[test]
    fn parse_bracket_atom() {
        let mol = parse_smiles("[NH4+]", true).unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atoms[0].atomic_number, 7);
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
        assert!(mol.atoms[0].hydrogens_fixed);
    }

    #[test]
    fn parse_isotope_and_multi_charge() {
        let mol = parse_smiles("[13CH4]", true).unwrap();
        assert_eq!(mol.atoms[0].isotope, Some(13));

        let double_minus = parse_smiles("[O-2]", true).unwrap();
        assert_eq!(double_minus.atoms[0].formal_charge, -2);

        let repeated = parse_smiles("[Fe++]", true).unwrap();
        assert_eq!(repeated.atoms[0].formal_charge, 2);
    }

    #[test]
    fn parse_two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCCCCCCC%10", true).unwrap();
        assert_eq!(mol.atom_count(), 10);
        assert_eq!(mol.bond_count(), 10);
    }

    #[test]
    fn parse_disconnected_fragments() {
        let mol = parse_smiles("C.O", true).unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 0);
    }

    #[test]
    fn stereo_markers_are_tolerated() {
        let mol = parse_smiles("C/C=C/C", true).unwrap();
        assert_eq!(mol.atom_count(), 4);
        let chiral = parse_smiles("N[C@@H](C)C(=O)O", true).unwrap();
        assert_eq!(chiral.atom_count(), 6);
    }

    #[test]
    fn invalid_smiles_error() {
        assert!(parse_smiles("C(", true).is_err());
        assert!(parse_smiles("C1CC", true).is_err()); // unmatched ring closure
        assert!(parse_smiles("[", true).is_err());
        assert!(parse_smiles("(C)", true).is_err()); // branch without atom
        assert!(parse_smiles("C)", true).is_err());
        assert!(parse_smiles("1CC1", true).is_err()); // closure before any atom
    }

    #[test]
    fn unsanitized_parse_keeps_aromatic_flags() {
        let mol = parse_smiles("c1ccccc1", false).unwrap();
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
        assert_eq!(mol.atoms[0].implicit_hydrogens, 1);
    }
}
