//! Fingerprint engine: typed settings and the structure/query split.
//!
//! The engine is constructed with two settings values — one for indexing,
//! one for querying — and is the single producer of fingerprints for the
//! index. For the Avalon kind the pair must satisfy the screening invariant:
//! for any substructure pair S ⊆ M, bits(query_fp(S)) ⊆ bits(structure_fp(M)).
//! Changing either settings value invalidates every previously built index.

use std::sync::Arc;

use chemdex_core::{ChemdexError, Result};
use chemdex_chem::Fingerprint;

use crate::binding::{MolHandle, Toolkit};
use crate::tracker::WaveGuard;

/// Fingerprint algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    /// Path-feature screening fingerprint; subset-safe, serialized by the
    /// process-wide lock.
    Avalon,
    /// ECFP-style circular fingerprint; similarity only, no containment
    /// guarantee.
    Morgan,
}

impl FingerprintKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "avalon" => Ok(FingerprintKind::Avalon),
            "morgan" => Ok(FingerprintKind::Morgan),
            other => Err(ChemdexError::InvalidInput(format!(
                "unknown fingerprint kind '{other}'"
            ))),
        }
    }
}

/// Settings for one fingerprint flavour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSettings {
    pub kind: FingerprintKind,
    /// Bit vector width.
    pub num_bits: usize,
    /// 1 for query fingerprints, 0 for structure fingerprints.
    pub avalon_query_flag: u8,
    /// Feature-class mask for the Avalon kind.
    pub avalon_bit_flags: u32,
    /// Maximum path length in bonds for the Avalon kind.
    pub path_length: usize,
    /// Neighborhood radius for the Morgan kind.
    pub morgan_radius: usize,
}

impl FingerprintSettings {
    /// Defaults for indexed structure fingerprints.
    pub fn structure_defaults() -> Self {
        FingerprintSettings {
            kind: FingerprintKind::Avalon,
            num_bits: 512,
            avalon_query_flag: 0,
            avalon_bit_flags: chemdex_chem::fingerprint::CLASS_DEFAULT,
            path_length: 5,
            morgan_radius: 2,
        }
    }

    /// Defaults for query fingerprints: same features, query flag set.
    pub fn query_defaults() -> Self {
        FingerprintSettings {
            avalon_query_flag: 1,
            ..Self::structure_defaults()
        }
    }
}

/// Produces structure and query fingerprints according to the configured
/// settings pair.
pub struct FingerprintEngine {
    toolkit: Arc<Toolkit>,
    structure_settings: FingerprintSettings,
    query_settings: FingerprintSettings,
}

impl FingerprintEngine {
    pub fn new(
        toolkit: Arc<Toolkit>,
        structure_settings: FingerprintSettings,
        query_settings: FingerprintSettings,
    ) -> Self {
        FingerprintEngine {
            toolkit,
            structure_settings,
            query_settings,
        }
    }

    pub fn with_defaults(toolkit: Arc<Toolkit>) -> Self {
        Self::new(
            toolkit,
            FingerprintSettings::structure_defaults(),
            FingerprintSettings::query_defaults(),
        )
    }

    pub fn structure_settings(&self) -> &FingerprintSettings {
        &self.structure_settings
    }

    pub fn query_settings(&self) -> &FingerprintSettings {
        &self.query_settings
    }

    /// Structure fingerprint for an existing handle.
    pub fn structure_fp(&self, handle: MolHandle) -> Result<Fingerprint> {
        self.toolkit.generic_fingerprint(handle, &self.structure_settings)
    }

    /// Structure fingerprint from a SMILES string. With `is_canonical`, the
    /// parse skips sanitization (the canonical form already carries perceived
    /// aromaticity).
    pub fn structure_fp_from_smiles(
        &self,
        smiles: &str,
        is_canonical: bool,
    ) -> Result<Fingerprint> {
        self.compute(smiles, is_canonical, &self.structure_settings)
    }

    /// Query fingerprint from a SMILES string.
    pub fn query_fp(&self, smiles: &str, is_canonical: bool) -> Result<Fingerprint> {
        self.compute(smiles, is_canonical, &self.query_settings)
    }

    /// Parse under a fresh wave, fingerprint, release on every exit path.
    fn compute(
        &self,
        smiles: &str,
        is_canonical: bool,
        settings: &FingerprintSettings,
    ) -> Result<Fingerprint> {
        let guard = WaveGuard::new(self.toolkit.tracker());
        let handle = self.toolkit.parse_smiles(smiles, !is_canonical)?;
        self.toolkit.mark_for_cleanup(handle, guard.wave());
        self.toolkit.generic_fingerprint(handle, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FingerprintEngine {
        FingerprintEngine::with_defaults(Arc::new(Toolkit::new()))
    }

    #[test]
    fn settings_defaults() {
        let s = FingerprintSettings::structure_defaults();
        assert_eq!(s.kind, FingerprintKind::Avalon);
        assert_eq!(s.num_bits, 512);
        assert_eq!(s.avalon_query_flag, 0);

        let q = FingerprintSettings::query_defaults();
        assert_eq!(q.avalon_query_flag, 1);
        assert_eq!(q.num_bits, s.num_bits);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(FingerprintKind::parse("avalon").unwrap(), FingerprintKind::Avalon);
        assert_eq!(FingerprintKind::parse("morgan").unwrap(), FingerprintKind::Morgan);
        assert!(FingerprintKind::parse("maccs").is_err());
    }

    #[test]
    fn query_bits_are_subset_of_structure_bits() {
        let engine = engine();
        let q = engine.query_fp("c1ccccc1", false).unwrap();
        let s = engine
            .structure_fp_from_smiles("CC(=O)Oc1ccccc1C(=O)O", false)
            .unwrap();
        assert!(q.is_subset_of(&s));
    }

    #[test]
    fn canonical_fast_path_matches_sanitized_path() {
        let engine = engine();
        let toolkit = Arc::new(Toolkit::new());
        let h = toolkit.parse_smiles("c1ccc(O)cc1", true).unwrap();
        let canon = toolkit.to_canonical_smiles(h).unwrap();

        let fast = engine.structure_fp_from_smiles(&canon, true).unwrap();
        let slow = engine.structure_fp_from_smiles(&canon, false).unwrap();
        assert_eq!(fast, slow);
    }

    #[test]
    fn handle_and_smiles_paths_agree() {
        let engine = engine();
        let toolkit = Arc::new(Toolkit::new());
        let handle_engine = FingerprintEngine::with_defaults(Arc::clone(&toolkit));

        let h = toolkit.parse_smiles("CCO", true).unwrap();
        let canon = toolkit.to_canonical_smiles(h).unwrap();
        let from_handle = handle_engine.structure_fp(h).unwrap();
        let from_smiles = engine.structure_fp_from_smiles(&canon, true).unwrap();
        assert_eq!(from_handle, from_smiles);
    }

    #[test]
    fn temporaries_are_released() {
        let toolkit = Arc::new(Toolkit::new());
        let engine = FingerprintEngine::with_defaults(Arc::clone(&toolkit));
        engine.query_fp("CCO", false).unwrap();
        engine.structure_fp_from_smiles("CCN", false).unwrap();
        assert_eq!(toolkit.live_handles(), 0);
        assert_eq!(toolkit.tracker().tracked_count(), 0);

        // A parse failure must not leak either
        assert!(engine.query_fp("C(", false).is_err());
        assert_eq!(toolkit.live_handles(), 0);
    }
}
