//! Persistent inverted index for the chemdex search engine.
//!
//! A term-indexed document store with an explicit writer/searcher lifecycle:
//! at most one of the two is open against a storage directory at any time,
//! and transitions between them are the public API. Queries are term and
//! boolean combinations scored by idf-weighted coordination.

pub mod analysis;
pub mod collector;
pub mod document;
pub mod query;
pub mod store;

pub use analysis::Analyzer;
pub use collector::{ScoreDoc, SubstructureHitQueue, TopDocs};
pub use document::{DocId, Document, Field};
pub use query::{parse_multi_field, Occur, Query};
pub use store::IndexStore;
