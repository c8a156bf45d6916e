//! Typed configuration for the chemical index.
//!
//! The facade is configured through a map of recognized option keys (the
//! file-format parser that produces such maps lives outside the core).
//! Unknown keys and unparsable values are rejected.

use std::collections::HashMap;

use chemdex_core::{ChemdexError, Result};
use chemdex_toolkit::{FingerprintKind, FingerprintSettings};

/// Recognized options with their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// `fingerprint.kind` — fingerprint algorithm for the screening index.
    pub fingerprint_kind: FingerprintKind,
    /// `fingerprint.width` — bit vector width.
    pub fingerprint_width: usize,
    /// `fingerprint.avalon_bit_flags` — feature-class selector.
    pub avalon_bit_flags: u32,
    /// `query.avalon_query_flag` — 1 for query fingerprints, 0 for structure.
    pub avalon_query_flag: u8,
    /// `ingest.consecutive_error_limit` — abort threshold for an ingest run.
    pub consecutive_error_limit: usize,
    /// `cleanup.quarantine_delay_ms` — delay before quarantined resources are
    /// swept.
    pub quarantine_delay_ms: u64,
    /// `substructure.candidate_cap` — overrides the default screening cap of
    /// `min(10 × max_hits, 100000)`.
    pub candidate_cap: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            fingerprint_kind: FingerprintKind::Avalon,
            fingerprint_width: 512,
            avalon_bit_flags: default_bit_flags(),
            avalon_query_flag: 1,
            consecutive_error_limit: 100,
            quarantine_delay_ms: 60_000,
            candidate_cap: None,
        }
    }
}

fn default_bit_flags() -> u32 {
    FingerprintSettings::structure_defaults().avalon_bit_flags
}

impl IndexOptions {
    /// Build options from a key/value map, applying defaults for absent keys.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut options = IndexOptions::default();
        for (key, value) in map {
            match key.as_str() {
                "fingerprint.kind" => {
                    options.fingerprint_kind = FingerprintKind::parse(value)?;
                }
                "fingerprint.width" => {
                    options.fingerprint_width = parse_number(key, value)?;
                }
                "fingerprint.avalon_bit_flags" => {
                    options.avalon_bit_flags = parse_number(key, value)?;
                }
                "query.avalon_query_flag" => {
                    options.avalon_query_flag = parse_number(key, value)?;
                }
                "ingest.consecutive_error_limit" => {
                    options.consecutive_error_limit = parse_number(key, value)?;
                }
                "cleanup.quarantine_delay_ms" => {
                    options.quarantine_delay_ms = parse_number(key, value)?;
                }
                "substructure.candidate_cap" => {
                    options.candidate_cap = Some(parse_number(key, value)?);
                }
                other => {
                    return Err(ChemdexError::InvalidInput(format!(
                        "unrecognized option '{other}'"
                    )));
                }
            }
        }
        Ok(options)
    }

    /// Settings for indexed structure fingerprints.
    pub fn structure_settings(&self) -> FingerprintSettings {
        FingerprintSettings {
            kind: self.fingerprint_kind,
            num_bits: self.fingerprint_width,
            avalon_query_flag: 0,
            avalon_bit_flags: self.avalon_bit_flags,
            ..FingerprintSettings::structure_defaults()
        }
    }

    /// Settings for query fingerprints.
    pub fn query_settings(&self) -> FingerprintSettings {
        FingerprintSettings {
            avalon_query_flag: self.avalon_query_flag,
            ..self.structure_settings()
        }
    }

    /// The candidate-stage cap for a substructure search.
    pub fn substructure_candidate_cap(&self, max_hits: usize) -> usize {
        self.candidate_cap
            .unwrap_or_else(|| (max_hits.saturating_mul(10)).min(100_000))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ChemdexError::InvalidInput(format!("invalid value '{value}' for option '{key}'"))
    })
}
