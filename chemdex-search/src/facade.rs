//! The chemical index facade.
//!
//! Ties the toolkit, fingerprint engine and index store together: SD-file
//! ingestion (parse, canonicalize, fingerprint, write, notify) and the five
//! search modes. Construction fails when the chemistry toolkit cannot be
//! activated; after `shutdown()` every search returns `None`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use chemdex_core::{ChemdexError, Result};
use chemdex_index::{
    parse_multi_field, Analyzer, Document, IndexStore, Occur, Query, SubstructureHitQueue,
    TopDocs,
};
use chemdex_toolkit::{
    activate, CleanupTracker, FingerprintEngine, Toolkit, WaveGuard,
};

use crate::config::IndexOptions;
use crate::results;
use crate::sdf::{SdfParser, SdfRecord, PROP_LINE_NUMBER};

/// Field name of the primary key for indexed molecules.
pub const FIELD_PK: &str = "pk";
/// Field name of the canonical SMILES.
pub const FIELD_SMILES: &str = "smiles";
/// Field name of the fingerprint bit tokens.
pub const FIELD_FP: &str = "fp";
/// Field name of molecule names (synonyms).
pub const FIELD_NAME: &str = "name";

/// Receives a notification for every molecule written to the index.
pub trait IndexListener: Send + Sync {
    fn on_molecule_added(&self, pk: &str, canonical_smiles: &str);
}

/// Outcome of one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub records_read: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub total_errors: usize,
    pub last_error: Option<String>,
}

enum RecordOutcome {
    Indexed,
    Skipped,
}

/// The single entry point to the chemical search engine.
pub struct ChemicalIndex {
    store: IndexStore,
    toolkit: Arc<Toolkit>,
    engine: FingerprintEngine,
    analyzer: Analyzer,
    options: IndexOptions,
    listeners: Mutex<Vec<Arc<dyn IndexListener>>>,
    ingest_lock: Mutex<()>,
}

impl ChemicalIndex {
    /// Open an index in `dir` with a default toolkit and a fingerprint
    /// engine derived from `options`. Fails if the chemistry toolkit cannot
    /// be activated.
    pub fn open(
        dir: impl Into<PathBuf>,
        analyzer: Analyzer,
        options: IndexOptions,
    ) -> Result<Self> {
        let tracker =
            CleanupTracker::with_quarantine_delay(Duration::from_millis(options.quarantine_delay_ms));
        let toolkit = Arc::new(Toolkit::with_tracker(tracker));
        let engine = FingerprintEngine::new(
            Arc::clone(&toolkit),
            options.structure_settings(),
            options.query_settings(),
        );
        Self::with_engine(dir, analyzer, toolkit, engine, options)
    }

    /// Open an index with an explicit toolkit and fingerprint engine.
    pub fn with_engine(
        dir: impl Into<PathBuf>,
        analyzer: Analyzer,
        toolkit: Arc<Toolkit>,
        engine: FingerprintEngine,
        options: IndexOptions,
    ) -> Result<Self> {
        if !activate() {
            return Err(ChemdexError::Toolkit(
                "chemistry toolkit could not be activated".into(),
            ));
        }
        let dir = dir.into();
        Self::prepare_index_directory(&dir)?;
        Ok(ChemicalIndex {
            store: IndexStore::open(dir)?,
            toolkit,
            engine,
            analyzer,
            options,
            listeners: Mutex::new(Vec::new()),
            ingest_lock: Mutex::new(()),
        })
    }

    /// Ensure `path` exists, is a directory and is writable.
    pub fn prepare_index_directory(path: &Path) -> Result<()> {
        if path.exists() && !path.is_dir() {
            return Err(ChemdexError::InvalidInput(format!(
                "'{}' is not a directory",
                path.display()
            )));
        }
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    // ---- listeners --------------------------------------------------------

    /// Add a listener, if it was not registered before.
    pub fn add_listener(&self, listener: Arc<dyn IndexListener>) {
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&self, listener: &Arc<dyn IndexListener>) {
        self.listeners.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Notify listeners synchronously, in registration order. A listener
    /// failure is logged and never aborts the ingest.
    fn notify_molecule_added(&self, pk: &str, canonical_smiles: &str) {
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| {
                listener.on_molecule_added(pk, canonical_smiles)
            }));
            if result.is_err() {
                error!(pk, "index listener failed");
            }
        }
    }

    // ---- ingestion --------------------------------------------------------

    /// Ingest an SD file. Gzip compression is detected by the `.gz`/`.zip`
    /// suffix; the dataset name attached to records is the file name.
    pub fn ingest_file(
        &self,
        path: &Path,
        primary_key_field: &str,
        skip_until_pk: Option<&str>,
        skip_pks: Option<&HashSet<String>>,
    ) -> Result<IngestSummary> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dataset")
            .to_string();
        let file = File::open(path)?;

        let reader: Box<dyn Read> = if file_name.ends_with(".gz") || file_name.ends_with(".zip") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        self.ingest_stream(
            BufReader::new(reader),
            Some(&file_name),
            primary_key_field,
            skip_until_pk,
            skip_pks,
        )
    }

    /// Ingest a stream of SD records.
    ///
    /// Per record: read the primary key from `primary_key_field`, skip until
    /// `skip_until_pk` arms the run, skip keys in `skip_pks`, parse the
    /// molblock, canonicalize, fingerprint, replace any existing document
    /// with the same key, then notify listeners. Recoverable per-record
    /// errors are counted; when more than the configured limit fail in a row
    /// the ingest aborts. Stream and index IO errors abort immediately.
    pub fn ingest_stream(
        &self,
        input: impl BufRead,
        dataset_name: Option<&str>,
        primary_key_field: &str,
        skip_until_pk: Option<&str>,
        skip_pks: Option<&HashSet<String>>,
    ) -> Result<IngestSummary> {
        let _one_ingest_at_a_time = self.ingest_lock.lock();

        let mut parser = SdfParser::new(input, dataset_name);
        let mut summary = IngestSummary::default();
        let mut consecutive_errors = 0usize;
        let mut armed = skip_until_pk.is_none();

        while let Some(record) = parser.next_record()? {
            summary.records_read += 1;

            match self.ingest_record(&record, primary_key_field, &mut armed, skip_until_pk, skip_pks)
            {
                Ok(RecordOutcome::Indexed) => {
                    summary.indexed += 1;
                    consecutive_errors = 0;
                }
                Ok(RecordOutcome::Skipped) => {
                    summary.skipped += 1;
                    consecutive_errors = 0;
                }
                Err(err) if is_fatal(&err) => return Err(err),
                Err(err) => {
                    summary.total_errors += 1;
                    consecutive_errors += 1;
                    warn!(record = summary.records_read, error = %err, "record could not be indexed");
                    summary.last_error = Some(err.to_string());

                    if consecutive_errors > self.options.consecutive_error_limit {
                        return Err(ChemdexError::TooManyErrors(err.to_string()));
                    }
                }
            }
        }

        self.store.commit()?;
        if summary.total_errors > 0 {
            warn!(
                errors = summary.total_errors,
                "molecules could not be added due to errors"
            );
        }
        Ok(summary)
    }

    fn ingest_record(
        &self,
        record: &SdfRecord,
        primary_key_field: &str,
        armed: &mut bool,
        skip_until_pk: Option<&str>,
        skip_pks: Option<&HashSet<String>>,
    ) -> Result<RecordOutcome> {
        let Some(pk) = record.get(primary_key_field) else {
            let line = record.get(PROP_LINE_NUMBER).unwrap_or("?");
            return Err(ChemdexError::InvalidInput(format!(
                "primary key field '{primary_key_field}' not found at line {line}"
            )));
        };

        if !*armed {
            if skip_until_pk == Some(pk) {
                *armed = true;
            }
            return Ok(RecordOutcome::Skipped);
        }
        if skip_pks.is_some_and(|set| set.contains(pk)) {
            return Ok(RecordOutcome::Skipped);
        }

        let Some(structure) = record.structure() else {
            warn!(pk, "no structure found for record, ignoring");
            return Ok(RecordOutcome::Skipped);
        };

        let pk = pk.to_string();
        self.add_molecule_from_molblock(&pk, structure, &[], record.properties())?;
        Ok(RecordOutcome::Indexed)
    }

    /// Index one molecule given as a MOL block. Replaces any existing
    /// document with the same primary key.
    pub fn add_molecule_from_molblock(
        &self,
        pk: &str,
        molblock: &str,
        names: &[String],
        properties: &[(String, String)],
    ) -> Result<()> {
        let canonical = {
            let guard = WaveGuard::new(self.toolkit.tracker());
            let handle = self.toolkit.parse_molblock(molblock)?;
            self.toolkit.mark_for_cleanup(handle, guard.wave());
            self.toolkit.to_canonical_smiles(handle)?
            // the handle is released here; fingerprinting reparses the
            // canonical SMILES
        };
        self.add_molecule(pk, &canonical, names, properties)
    }

    /// Index one molecule given as SMILES. Replaces any existing document
    /// with the same primary key.
    pub fn add_molecule_from_smiles(
        &self,
        pk: &str,
        smiles: &str,
        names: &[String],
        properties: &[(String, String)],
    ) -> Result<()> {
        let canonical = {
            let guard = WaveGuard::new(self.toolkit.tracker());
            let handle = self.toolkit.parse_smiles(smiles, true)?;
            self.toolkit.mark_for_cleanup(handle, guard.wave());
            self.toolkit.to_canonical_smiles(handle)?
        };
        self.add_molecule(pk, &canonical, names, properties)
    }

    fn add_molecule(
        &self,
        pk: &str,
        canonical_smiles: &str,
        names: &[String],
        properties: &[(String, String)],
    ) -> Result<()> {
        if pk.is_empty() {
            return Err(ChemdexError::InvalidInput("primary key must not be empty".into()));
        }
        if canonical_smiles.trim().is_empty() {
            return Err(ChemdexError::Parse(format!(
                "canonical SMILES could not be created for '{pk}'"
            )));
        }

        let fingerprint = self.engine.structure_fp_from_smiles(canonical_smiles, true)?;

        // Delete-before-add keeps the primary key unique
        self.store.delete_by_term(FIELD_PK, pk)?;

        let mut doc = Document::new();
        doc.add_keyword(FIELD_PK, pk);
        doc.add_keyword(FIELD_SMILES, canonical_smiles);
        for bit in fingerprint.set_bits() {
            doc.add_indexed_only(FIELD_FP, &bit.to_string());
        }
        for name in names {
            doc.add_keyword(FIELD_NAME, name);
        }
        for (key, value) in properties {
            doc.add_keyword(key, value);
        }
        self.store.add_document(doc)?;

        debug!(pk, smiles = canonical_smiles, "molecule indexed");
        self.notify_molecule_added(pk, canonical_smiles);
        Ok(())
    }

    // ---- search -----------------------------------------------------------

    /// Free-text search across every indexed field, using the configured
    /// analyzer. Query parse errors surface unchanged.
    pub fn search_free(&self, text: &str, max_hits: usize) -> Result<Option<TopDocs>> {
        map_shutdown((|| {
            let fields = self.store.indexed_field_names()?;
            let query = parse_multi_field(text, &fields, &self.analyzer)?;
            self.store.search(&query, max_hits)
        })())
    }

    /// Search by registered name or primary key.
    pub fn search_by_name(&self, name: &str, max_hits: usize) -> Result<Option<TopDocs>> {
        let query = Query::boolean(vec![
            (Occur::Should, Query::term(FIELD_NAME, name)),
            (Occur::Should, Query::term(FIELD_PK, name)),
        ]);
        map_shutdown(self.store.search(&query, max_hits))
    }

    /// Fetch the document for one primary key, if present.
    pub fn search_by_pk(&self, pk: &str) -> Result<Option<Document>> {
        let result = (|| {
            let hits = self.store.search(&Query::term(FIELD_PK, pk), 1)?;
            match hits.score_docs.first() {
                Some(score_doc) => Ok(Some(self.store.get_document(score_doc.doc)?)),
                None => Ok(None),
            }
        })();
        match result {
            Ok(doc) => Ok(doc),
            Err(ChemdexError::Shutdown) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Exact-structure search: canonicalize, then term-query the `smiles`
    /// field.
    pub fn search_exact(&self, smiles: &str, max_hits: usize) -> Result<Option<TopDocs>> {
        // Shut down is a cheap signal; don't canonicalize just to discard it
        if self.store.is_shutdown() {
            return Ok(None);
        }
        let canonical = {
            let guard = WaveGuard::new(self.toolkit.tracker());
            let handle = self.toolkit.parse_smiles(smiles, true)?;
            self.toolkit.mark_for_cleanup(handle, guard.wave());
            self.toolkit.to_canonical_smiles(handle)?
        };
        map_shutdown(self.store.search(&Query::term(FIELD_SMILES, &canonical), max_hits))
    }

    /// Fingerprint screen: molecules whose stored fingerprint covers every
    /// set bit of the query fingerprint.
    pub fn search_by_fp(&self, smiles: &str, max_hits: usize) -> Result<Option<TopDocs>> {
        // Skip the fingerprint computation on a shut-down index
        if self.store.is_shutdown() {
            return Ok(None);
        }
        let fingerprint = self.engine.query_fp(smiles, false)?;
        let query = Query::all_terms(
            FIELD_FP,
            fingerprint.set_bits().into_iter().map(|bit| bit.to_string()),
        );
        map_shutdown(self.store.search(&query, max_hits))
    }

    /// Substructure search: fingerprint screening for candidates, then
    /// atom-level verification in relevance order, stopping at `max_hits`
    /// survivors.
    pub fn search_substructure(&self, smiles: &str, max_hits: usize) -> Result<Option<TopDocs>> {
        if self.store.is_shutdown() {
            return Ok(None);
        }
        let candidate_cap = self.options.substructure_candidate_cap(max_hits);
        let Some(candidates) = self.search_by_fp(smiles, candidate_cap)? else {
            return Ok(None);
        };

        map_shutdown(self.verify_candidates(smiles, max_hits, &candidates))
    }

    fn verify_candidates(
        &self,
        smiles: &str,
        max_hits: usize,
        candidates: &TopDocs,
    ) -> Result<TopDocs> {
        let mut queue = SubstructureHitQueue::with_sentinels(max_hits);
        let mut survivors = 0usize;
        let mut toolkit_errors = 0usize;

        if !candidates.is_empty() {
            let query_wave = WaveGuard::new(self.toolkit.tracker());
            let query_mol = self.toolkit.parse_smiles(smiles, true)?;
            self.toolkit.mark_for_cleanup(query_mol, query_wave.wave());

            for score_doc in &candidates.score_docs {
                if survivors >= max_hits {
                    break;
                }
                let doc = self.store.get_document(score_doc.doc)?;
                let Some(stored_smiles) = doc.get(FIELD_SMILES) else {
                    continue;
                };

                // Stored SMILES are canonical; skip sanitization and only
                // refresh the property cache before matching
                let candidate_wave = WaveGuard::new(self.toolkit.tracker());
                let verdict = (|| -> Result<bool> {
                    let candidate = self.toolkit.parse_smiles(stored_smiles, false)?;
                    self.toolkit.mark_for_cleanup(candidate, candidate_wave.wave());
                    self.toolkit.update_property_cache(candidate)?;
                    self.toolkit.has_substructure_match(candidate, query_mol)
                })();
                drop(candidate_wave);

                match verdict {
                    Ok(true) => {
                        survivors += 1;
                        queue.collect(score_doc.doc, score_doc.score);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        toolkit_errors += 1;
                        debug!(doc = score_doc.doc.0, error = %err, "candidate failed verification");
                    }
                }
            }
        }

        if toolkit_errors > 0 {
            warn!(errors = toolkit_errors, "molecules failed substructure verification");
        }
        Ok(queue.into_top_docs(survivors))
    }

    // ---- accessors and lifecycle ------------------------------------------

    /// Resolve a collector's hits to primary keys, preserving order.
    pub fn primary_keys_for_hits(&self, top_docs: &TopDocs) -> Vec<String> {
        results::primary_keys_for_hits(&self.store, Some(top_docs))
    }

    /// Number of indexed molecules.
    pub fn indexed_molecule_count(&self) -> Result<usize> {
        self.store.num_docs()
    }

    /// The toolkit backing this index.
    pub fn toolkit(&self) -> &Arc<Toolkit> {
        &self.toolkit
    }

    /// Commit and close writer/searcher; both reopen on demand.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    /// Terminal shutdown: commits, closes, releases tracked resources and
    /// refuses every later operation.
    pub fn shutdown(&self) -> Result<()> {
        self.store.shutdown()?;
        self.toolkit.tracker().cleanup_all();
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.store.is_shutdown()
    }
}

/// Lifecycle mapping: a shut-down store yields `None`, everything else
/// propagates.
fn map_shutdown<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ChemdexError::Shutdown) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Errors that abort an ingest immediately instead of counting against the
/// consecutive-error budget.
fn is_fatal(err: &ChemdexError) -> bool {
    matches!(
        err,
        ChemdexError::Io(_)
            | ChemdexError::Index(_)
            | ChemdexError::Shutdown
            | ChemdexError::NoIndexYet
            | ChemdexError::TooManyErrors(_)
    )
}
