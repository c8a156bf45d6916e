//! Toolkit binding: molecule handles over the chemistry layer.
//!
//! The index never owns molecule graphs directly. It parses through a
//! [`Toolkit`], receives opaque [`MolHandle`]s backed by a handle table, and
//! returns them through the [`CleanupTracker`](crate::tracker::CleanupTracker)
//! — mirroring the ownership model of a native chemistry library, where
//! nothing is reclaimed until it is explicitly released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use chemdex_core::{ChemdexError, Result};
use chemdex_chem::fingerprint::{linear_fingerprint, morgan_fingerprint};
use chemdex_chem::{
    canonical_smiles, has_substructure, molblock, perception, smiles, Fingerprint, Molecule,
};

use crate::fingerprint::{FingerprintKind, FingerprintSettings};
use crate::tracker::CleanupTracker;

/// One-shot toolkit activation flag; a failure is sticky for the process.
static ACTIVATION: OnceLock<bool> = OnceLock::new();

/// Serializes every Avalon-kind fingerprint computation in the process.
static AVALON_LOCK: Mutex<()> = Mutex::new(());

/// Activate the chemistry toolkit. Runs a parser/canonicalizer self-test the
/// first time it is called; later calls return the recorded outcome without
/// retrying. Facade construction fails when this returns `false`.
pub fn activate() -> bool {
    *ACTIVATION.get_or_init(|| {
        let probe = smiles::parse_smiles("c1ccccc1", true)
            .map(|mol| canonical_smiles(&mol))
            .unwrap_or_default();
        let ok = !probe.is_empty();
        debug!(ok, "toolkit activation");
        ok
    })
}

/// An opaque, owned reference to a molecule in the toolkit's handle table.
///
/// Handles are `Copy` identifiers, not guards: the caller is responsible for
/// registering every handle with the cleanup tracker so it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MolHandle(u64);

impl MolHandle {
    /// The raw handle id, used as the tracker registration key.
    pub fn id(self) -> u64 {
        self.0
    }
}

struct MolTable {
    mols: Mutex<HashMap<u64, Arc<Molecule>>>,
    next_id: AtomicU64,
}

impl MolTable {
    fn insert(&self, mol: Molecule) -> MolHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.mols.lock().insert(id, Arc::new(mol));
        MolHandle(id)
    }

    fn get(&self, handle: MolHandle) -> Result<Arc<Molecule>> {
        self.mols
            .lock()
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| ChemdexError::Toolkit(format!("stale molecule handle {}", handle.0)))
    }

    fn release(&self, id: u64) {
        self.mols.lock().remove(&id);
    }
}

/// The toolkit boundary: parsing, canonicalization, matching and fingerprint
/// primitives over handle-managed molecules.
pub struct Toolkit {
    table: Arc<MolTable>,
    tracker: CleanupTracker,
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolkit {
    pub fn new() -> Self {
        Self::with_tracker(CleanupTracker::new())
    }

    pub fn with_tracker(tracker: CleanupTracker) -> Self {
        Toolkit {
            table: Arc::new(MolTable {
                mols: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
            tracker,
        }
    }

    /// The cleanup tracker owning every handle this toolkit hands out.
    pub fn tracker(&self) -> &CleanupTracker {
        &self.tracker
    }

    /// Register `handle` for cleanup under `wave`.
    pub fn mark_for_cleanup(&self, handle: MolHandle, wave: u64) {
        let table = Arc::clone(&self.table);
        self.tracker
            .mark(handle.id(), wave, false, move || table.release(handle.id()));
    }

    /// Register `handle` under `wave`, removing it from any other wave first.
    pub fn mark_for_cleanup_moving(&self, handle: MolHandle, wave: u64) {
        let table = Arc::clone(&self.table);
        self.tracker
            .mark(handle.id(), wave, true, move || table.release(handle.id()));
    }

    /// Parse a SMILES string. With `sanitize`, the molecule goes through full
    /// property perception; without it, only implicit hydrogens are assigned
    /// (the fast path for already-canonical SMILES).
    pub fn parse_smiles(&self, text: &str, sanitize: bool) -> Result<MolHandle> {
        let mol = smiles::parse_smiles(text, sanitize)?;
        Ok(self.table.insert(mol))
    }

    /// Parse a MOL block and run full property perception on it.
    pub fn parse_molblock(&self, text: &str) -> Result<MolHandle> {
        let mut mol = molblock::parse_mol_v2000(text)?;
        perception::update_property_cache(&mut mol)?;
        Ok(self.table.insert(mol))
    }

    /// Canonical SMILES for a handle.
    pub fn to_canonical_smiles(&self, handle: MolHandle) -> Result<String> {
        Ok(canonical_smiles(&*self.table.get(handle)?))
    }

    /// Run ring/aromaticity/hydrogen perception on a handle in place.
    /// Required on a haystack molecule before substructure matching.
    pub fn update_property_cache(&self, handle: MolHandle) -> Result<()> {
        let mut mols = self.table.mols.lock();
        let entry = mols
            .get_mut(&handle.0)
            .ok_or_else(|| ChemdexError::Toolkit(format!("stale molecule handle {}", handle.0)))?;
        perception::update_property_cache(Arc::make_mut(entry))
    }

    /// Atom-level substructure test: does `haystack` contain `needle`?
    pub fn has_substructure_match(
        &self,
        haystack: MolHandle,
        needle: MolHandle,
    ) -> Result<bool> {
        let haystack = self.table.get(haystack)?;
        let needle = self.table.get(needle)?;
        Ok(has_substructure(&haystack, &needle))
    }

    /// Number of atoms behind a handle.
    pub fn atom_count(&self, handle: MolHandle) -> Result<usize> {
        Ok(self.table.get(handle)?.atom_count())
    }

    /// Read-only access to the molecule behind a handle.
    pub fn molecule(&self, handle: MolHandle) -> Result<Arc<Molecule>> {
        self.table.get(handle)
    }

    /// Stable binary serialization of a molecule.
    pub fn to_binary(&self, handle: MolHandle) -> Result<Vec<u8>> {
        bincode::serialize(&*self.table.get(handle)?)
            .map_err(|e| ChemdexError::Toolkit(format!("molecule serialization failed: {e}")))
    }

    /// Rebuild a molecule from its binary form. The returned handle is owned
    /// by the caller like any other.
    pub fn from_binary(&self, bytes: &[u8]) -> Result<MolHandle> {
        let mut mol: Molecule = bincode::deserialize(bytes)
            .map_err(|e| ChemdexError::Toolkit(format!("molecule deserialization failed: {e}")))?;
        mol.rebuild_adjacency();
        Ok(self.table.insert(mol))
    }

    /// Avalon-kind screening fingerprint straight from a SMILES string.
    /// All Avalon computations in the process are serialized by one lock.
    pub fn avalon_fingerprint(
        &self,
        smiles_text: &str,
        width: usize,
        query_flag: bool,
        bit_flags: u32,
    ) -> Result<Fingerprint> {
        let mol = smiles::parse_smiles(smiles_text, true)?;
        let _serialized = AVALON_LOCK.lock();
        Ok(linear_fingerprint(&mol, width, 5, bit_flags, query_flag))
    }

    /// Fingerprint of any configured kind for an existing handle. Avalon-kind
    /// requests detour through canonical SMILES and the shared lock; other
    /// kinds may run in parallel.
    pub fn generic_fingerprint(
        &self,
        handle: MolHandle,
        settings: &FingerprintSettings,
    ) -> Result<Fingerprint> {
        let mol = self.table.get(handle)?;
        match settings.kind {
            FingerprintKind::Avalon => {
                let _serialized = AVALON_LOCK.lock();
                Ok(linear_fingerprint(
                    &mol,
                    settings.num_bits,
                    settings.path_length,
                    settings.avalon_bit_flags,
                    settings.avalon_query_flag != 0,
                ))
            }
            FingerprintKind::Morgan => {
                Ok(morgan_fingerprint(&mol, settings.morgan_radius, settings.num_bits))
            }
        }
    }

    /// Release a handle immediately, outside the tracker.
    pub fn release(&self, handle: MolHandle) {
        self.table.release(handle.id());
    }

    /// Number of live handles, used by lifecycle tests.
    pub fn live_handles(&self) -> usize {
        self.table.mols.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::WaveGuard;

    #[test]
    fn activation_is_idempotent() {
        assert!(activate());
        assert!(activate());
    }

    #[test]
    fn parse_and_canonicalize() {
        let toolkit = Toolkit::new();
        let a = toolkit.parse_smiles("OCC", true).unwrap();
        let b = toolkit.parse_smiles("CCO", true).unwrap();
        assert_eq!(
            toolkit.to_canonical_smiles(a).unwrap(),
            toolkit.to_canonical_smiles(b).unwrap()
        );
        toolkit.release(a);
        toolkit.release(b);
        assert_eq!(toolkit.live_handles(), 0);
    }

    #[test]
    fn stale_handle_is_an_error() {
        let toolkit = Toolkit::new();
        let h = toolkit.parse_smiles("C", true).unwrap();
        toolkit.release(h);
        assert!(toolkit.to_canonical_smiles(h).is_err());
        assert!(toolkit.atom_count(h).is_err());
    }

    #[test]
    fn molblock_and_smiles_agree_on_canonical_form() {
        let toolkit = Toolkit::new();
        let from_smiles = toolkit.parse_smiles("CCO", true).unwrap();
        let mol = toolkit.molecule(from_smiles).unwrap();
        let block = chemdex_chem::molblock::write_mol_v2000(&mol);
        let from_block = toolkit.parse_molblock(&block).unwrap();
        assert_eq!(
            toolkit.to_canonical_smiles(from_smiles).unwrap(),
            toolkit.to_canonical_smiles(from_block).unwrap()
        );
    }

    #[test]
    fn substructure_match_through_handles() {
        let toolkit = Toolkit::new();
        let phenol = toolkit.parse_smiles("Oc1ccccc1", false).unwrap();
        toolkit.update_property_cache(phenol).unwrap();
        let benzene = toolkit.parse_smiles("c1ccccc1", true).unwrap();
        assert!(toolkit.has_substructure_match(phenol, benzene).unwrap());
        assert!(!toolkit.has_substructure_match(benzene, phenol).unwrap());
    }

    #[test]
    fn binary_roundtrip() {
        let toolkit = Toolkit::new();
        let h = toolkit.parse_smiles("CC(=O)O", true).unwrap();
        let bytes = toolkit.to_binary(h).unwrap();
        let back = toolkit.from_binary(&bytes).unwrap();
        assert_eq!(
            toolkit.to_canonical_smiles(h).unwrap(),
            toolkit.to_canonical_smiles(back).unwrap()
        );
    }

    #[test]
    fn handles_release_through_wave_guard() {
        let toolkit = Toolkit::new();
        {
            let guard = WaveGuard::new(toolkit.tracker());
            let h = toolkit.parse_smiles("CCO", true).unwrap();
            toolkit.mark_for_cleanup(h, guard.wave());
            assert_eq!(toolkit.live_handles(), 1);
        }
        assert_eq!(toolkit.live_handles(), 0);
        assert_eq!(toolkit.tracker().tracked_count(), 0);
    }

    #[test]
    fn avalon_fingerprint_subset_via_binding() {
        let toolkit = Toolkit::new();
        let q = toolkit
            .avalon_fingerprint("CCO", 512, true, chemdex_chem::fingerprint::CLASS_DEFAULT)
            .unwrap();
        let s = toolkit
            .avalon_fingerprint("CCCO", 512, false, chemdex_chem::fingerprint::CLASS_DEFAULT)
            .unwrap();
        assert!(q.is_subset_of(&s));
    }
}
