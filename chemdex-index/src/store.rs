//! The persistent index store.
//!
//! Exactly one of {writer, searcher} is open against a storage directory at
//! any time. The store is a state machine — `Closed`, `Writing`, `Searching`,
//! `Shutdown` — and every public operation drives the transition it needs:
//! write operations close the searcher and open the writer, read operations
//! commit and close the writer and open the searcher. `Shutdown` is terminal.
//!
//! Persistence is one bincode-encoded generation file per directory,
//! replaced atomically on commit (temp file + rename). The writer loads the
//! previous generation at open, so delete-before-add replacement survives
//! restarts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chemdex_core::{ChemdexError, Result};

use crate::collector::{ScoreDoc, TopDocs};
use crate::document::{DocId, Document};
use crate::query::{Occur, Query};

const GENERATION_FILE: &str = "segments.bin";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Generation {
    docs: Vec<Document>,
}

struct Writer {
    /// Live documents; deletions leave `None` slots until commit compacts.
    docs: Vec<Option<Document>>,
    dirty: bool,
}

struct Searcher {
    docs: Vec<Document>,
    /// (field, term) -> ascending doc ids
    postings: HashMap<(String, String), Vec<u32>>,
}

enum State {
    Closed,
    Writing(Writer),
    Searching(Searcher),
    Shutdown,
}

/// A term-indexed document store bound to one directory.
pub struct IndexStore {
    dir: PathBuf,
    state: Mutex<State>,
}

impl IndexStore {
    /// Bind a store to `dir`, creating the directory if needed. No files are
    /// touched until the first writer commit.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(IndexStore {
            dir,
            state: Mutex::new(State::Closed),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    // ---- write operations -------------------------------------------------

    /// Delete every live document with an indexed `field` term equal to
    /// `value`.
    pub fn delete_by_term(&self, field: &str, value: &str) -> Result<usize> {
        let mut state = self.state.lock();
        let writer = self.writer(&mut state)?;
        let mut deleted = 0;
        for slot in writer.docs.iter_mut() {
            let matches = slot.as_ref().is_some_and(|doc| {
                doc.fields
                    .iter()
                    .any(|f| f.indexed && f.name == field && f.value == value)
            });
            if matches {
                *slot = None;
                deleted += 1;
            }
        }
        if deleted > 0 {
            writer.dirty = true;
        }
        Ok(deleted)
    }

    /// Append a document.
    pub fn add_document(&self, doc: Document) -> Result<()> {
        let mut state = self.state.lock();
        let writer = self.writer(&mut state)?;
        writer.docs.push(Some(doc));
        writer.dirty = true;
        Ok(())
    }

    /// Persist the writer's documents. A no-op when nothing changed.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Writing(writer) => Self::commit_writer(&self.dir, writer),
            State::Shutdown => Err(ChemdexError::Shutdown),
            _ => Ok(()),
        }
    }

    // ---- read operations --------------------------------------------------

    /// Run a query, returning at most `max_hits` ordered hits.
    pub fn search(&self, query: &Query, max_hits: usize) -> Result<TopDocs> {
        let mut state = self.state.lock();
        let searcher = self.searcher(&mut state)?;

        let mut matched: Vec<(u32, f32)> = evaluate(searcher, query).into_iter().collect();
        let total_hits = matched.len();
        // Score descending, doc id ascending on ties
        matched.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        matched.truncate(max_hits);

        Ok(TopDocs {
            total_hits,
            score_docs: matched
                .into_iter()
                .map(|(doc, score)| ScoreDoc { doc: DocId(doc), score })
                .collect(),
        })
    }

    /// Fetch the stored fields of a document.
    pub fn get_document(&self, doc_id: DocId) -> Result<Document> {
        let mut state = self.state.lock();
        let searcher = self.searcher(&mut state)?;
        searcher
            .docs
            .get(doc_id.0 as usize)
            .map(Document::stored_view)
            .ok_or_else(|| ChemdexError::Index(format!("no document with id {}", doc_id.0)))
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> Result<usize> {
        let mut state = self.state.lock();
        Ok(self.searcher(&mut state)?.docs.len())
    }

    /// The union of all indexed field names across live documents.
    pub fn indexed_field_names(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        let searcher = self.searcher(&mut state)?;
        let mut names: Vec<String> = searcher
            .postings
            .keys()
            .map(|(field, _)| field.clone())
            .collect();
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    // ---- lifecycle --------------------------------------------------------

    /// Commit and close whichever side is open. The store can be reopened on
    /// demand afterwards.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let State::Writing(writer) = &mut *state {
            Self::commit_writer(&self.dir, writer)?;
        }
        if !matches!(*state, State::Shutdown) {
            *state = State::Closed;
        }
        Ok(())
    }

    /// Close and refuse all further operations. Terminal.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let State::Writing(writer) = &mut *state {
            Self::commit_writer(&self.dir, writer)?;
        }
        *state = State::Shutdown;
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(*self.state.lock(), State::Shutdown)
    }

    // ---- state transitions ------------------------------------------------

    /// Transition into `Writing` and hand out the writer.
    fn writer<'a>(&self, state: &'a mut State) -> Result<&'a mut Writer> {
        match state {
            State::Shutdown => return Err(ChemdexError::Shutdown),
            State::Writing(_) => {}
            State::Searching(_) | State::Closed => {
                debug!(dir = %self.dir.display(), "opening index writer");
                let docs = match Self::load_generation(&self.dir)? {
                    Some(generation) => generation.docs.into_iter().map(Some).collect(),
                    None => Vec::new(),
                };
                *state = State::Writing(Writer { docs, dirty: false });
            }
        }
        match state {
            State::Writing(writer) => Ok(writer),
            _ => unreachable!("state forced to Writing above"),
        }
    }

    /// Transition into `Searching` (committing a live writer first) and hand
    /// out the searcher.
    fn searcher<'a>(&self, state: &'a mut State) -> Result<&'a Searcher> {
        match state {
            State::Shutdown => return Err(ChemdexError::Shutdown),
            State::Searching(_) => {}
            State::Writing(writer) => {
                Self::commit_writer(&self.dir, writer)?;
                debug!(dir = %self.dir.display(), "switching index writer to searcher");
                *state = State::Searching(Self::open_searcher(&self.dir)?);
            }
            State::Closed => {
                debug!(dir = %self.dir.display(), "opening index searcher");
                *state = State::Searching(Self::open_searcher(&self.dir)?);
            }
        }
        match state {
            State::Searching(searcher) => Ok(searcher),
            _ => unreachable!("state forced to Searching above"),
        }
    }

    fn open_searcher(dir: &Path) -> Result<Searcher> {
        let generation = Self::load_generation(dir)?.ok_or(ChemdexError::NoIndexYet)?;
        let mut postings: HashMap<(String, String), Vec<u32>> = HashMap::new();
        for (id, doc) in generation.docs.iter().enumerate() {
            for field in doc.fields.iter().filter(|f| f.indexed) {
                postings
                    .entry((field.name.clone(), field.value.clone()))
                    .or_default()
                    .push(id as u32);
            }
        }
        // A document may repeat a term (multi-valued fields)
        for ids in postings.values_mut() {
            ids.dedup();
        }
        Ok(Searcher {
            docs: generation.docs,
            postings,
        })
    }

    fn load_generation(dir: &Path) -> Result<Option<Generation>> {
        let path = dir.join(GENERATION_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let generation = bincode::deserialize(&bytes)
            .map_err(|e| ChemdexError::Index(format!("corrupt index file: {e}")))?;
        Ok(Some(generation))
    }

    fn commit_writer(dir: &Path, writer: &mut Writer) -> Result<()> {
        if !writer.dirty {
            return Ok(());
        }
        writer.docs.retain(Option::is_some);
        let generation = Generation {
            docs: writer.docs.iter().flatten().cloned().collect(),
        };
        let bytes = bincode::serialize(&generation)
            .map_err(|e| ChemdexError::Index(format!("index serialization failed: {e}")))?;

        let tmp = dir.join(format!("{GENERATION_FILE}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, dir.join(GENERATION_FILE))?;
        writer.dirty = false;
        debug!(dir = %dir.display(), docs = generation.docs.len(), "index committed");
        Ok(())
    }
}

/// Evaluate a query against the searcher, returning doc -> score.
fn evaluate(searcher: &Searcher, query: &Query) -> HashMap<u32, f32> {
    match query {
        Query::Term { field, value } => {
            let Some(ids) = searcher.postings.get(&(field.clone(), value.clone())) else {
                return HashMap::new();
            };
            let score = idf(searcher.docs.len(), ids.len());
            ids.iter().map(|&id| (id, score)).collect()
        }
        Query::Boolean { clauses } => {
            let mut must: Option<HashMap<u32, f32>> = None;
            let mut should: HashMap<u32, f32> = HashMap::new();

            for (occur, sub) in clauses {
                let sub_result = evaluate(searcher, sub);
                match occur {
                    Occur::Must => {
                        must = Some(match must {
                            None => sub_result,
                            Some(acc) => acc
                                .into_iter()
                                .filter_map(|(id, score)| {
                                    sub_result.get(&id).map(|s| (id, score + s))
                                })
                                .collect(),
                        });
                    }
                    Occur::Should => {
                        for (id, score) in sub_result {
                            *should.entry(id).or_insert(0.0) += score;
                        }
                    }
                }
            }

            match must {
                // Optional clauses only add to the score of required matches
                Some(mut required) => {
                    for (id, score) in required.iter_mut() {
                        if let Some(extra) = should.get(id) {
                            *score += extra;
                        }
                    }
                    required
                }
                None => should,
            }
        }
    }
}

/// Inverse document frequency, kept strictly positive.
fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    ((num_docs as f32 + 1.0) / (doc_freq as f32 + 1.0)).ln() + 1.0
}
