//! The chemdex chemical search engine.
//!
//! [`ChemicalIndex`] is the single entry point: it ingests SD files, keeps a
//! persistent inverted index of canonicalized molecules with their screening
//! fingerprints, and answers free-text, name, exact-structure,
//! fingerprint-screen and substructure queries.
//!
//! ```no_run
//! use chemdex_index::Analyzer;
//! use chemdex_search::{ChemicalIndex, IndexOptions};
//!
//! # fn main() -> chemdex_core::Result<()> {
//! let index = ChemicalIndex::open("./index", Analyzer::standard(), IndexOptions::default())?;
//! index.add_molecule_from_smiles("A1", "CCO", &["ethanol".into()], &[])?;
//!
//! let hits = index.search_exact("OCC", 10)?.expect("index is live");
//! let pks = index.primary_keys_for_hits(&hits);
//! assert_eq!(pks, vec!["A1"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod facade;
pub mod results;
pub mod sdf;

pub use config::IndexOptions;
pub use facade::{
    ChemicalIndex, IndexListener, IngestSummary, FIELD_FP, FIELD_NAME, FIELD_PK, FIELD_SMILES,
};
pub use sdf::{SdfParser, SdfRecord};
