//! Chemistry toolkit layer for the chemdex search engine.
//!
//! Wraps the pure-graph chemistry of `chemdex-chem` behind the resource
//! discipline the index requires:
//!
//! - [`binding::Toolkit`] — a handle table over molecules, mirroring a native
//!   toolkit boundary: handles are owned resources and are reclaimed through
//!   the tracker, never implicitly.
//! - [`tracker::CleanupTracker`] — wave-scoped registration of
//!   `(handle, release_fn)` pairs with batch cleanup and a quarantine mode
//!   for allocations that may still be aliased by in-flight readers.
//! - [`fingerprint::FingerprintEngine`] — structure and query fingerprints
//!   driven by typed settings, with the process-wide Avalon serialization
//!   lock and wave-scoped temporaries.

pub mod binding;
pub mod fingerprint;
pub mod tracker;

pub use binding::{activate, MolHandle, Toolkit};
pub use fingerprint::{FingerprintEngine, FingerprintKind, FingerprintSettings};
pub use tracker::{CleanupTracker, WaveGuard, DEFAULT_WAVE};
