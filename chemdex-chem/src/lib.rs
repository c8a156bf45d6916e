//! Chemistry primitives for the chemdex chemical search engine.
//!
//! Provides the molecular graph representation, SMILES and MOL V2000 parsing,
//! property perception (implicit hydrogens, rings, aromaticity), canonical
//! SMILES generation, VF2 substructure matching and the fingerprint
//! algorithms that back the screening index.
//!
//! # Example
//!
//! ```
//! use chemdex_chem::{parse_smiles, canonical_smiles, has_substructure, linear_fingerprint};
//!
//! // Different SMILES for ethanol produce the same canonical form
//! let mol1 = parse_smiles("OCC", true).unwrap();
//! let mol2 = parse_smiles("CCO", true).unwrap();
//! assert_eq!(canonical_smiles(&mol1), canonical_smiles(&mol2));
//!
//! // Ethanol contains ethane as a substructure
//! let ethane = parse_smiles("CC", true).unwrap();
//! assert!(has_substructure(&mol1, &ethane));
//!
//! // Query fingerprint bits of a substructure are a subset of the
//! // structure fingerprint bits of the containing molecule
//! let fp_q = linear_fingerprint(&ethane, 512, 5, chemdex_chem::fingerprint::CLASS_DEFAULT, true);
//! let fp_s = linear_fingerprint(&mol1, 512, 5, chemdex_chem::fingerprint::CLASS_DEFAULT, false);
//! assert!(fp_q.is_subset_of(&fp_s));
//! ```

pub mod canon;
pub mod element;
pub mod fingerprint;
pub mod molblock;
pub mod molecule;
pub mod perception;
pub mod smiles;
pub mod substructure;

mod ring;

pub use canon::canonical_smiles;
pub use element::{element_by_number, element_by_symbol, Element};
pub use fingerprint::{linear_fingerprint, morgan_fingerprint, tanimoto_similarity, Fingerprint};
pub use molblock::{parse_mol_v2000, write_mol_v2000};
pub use molecule::{Bond, BondOrder, MolAtom, Molecule};
pub use perception::update_property_cache;
pub use smiles::{parse_smiles, parse_smiles_named};
pub use substructure::{find_substructure_matches, has_substructure, SubstructureMatch};
