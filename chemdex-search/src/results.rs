//! Search-result adapter: hit collectors to primary-key lists.

use tracing::warn;

use chemdex_index::{IndexStore, TopDocs};

use crate::facade::FIELD_PK;

/// Resolve the hits of a collector to primary-key strings, preserving the
/// collector's order. Documents without a `pk` field are skipped silently;
/// an absent collector yields an empty list, never an option.
pub fn primary_keys_for_hits(store: &IndexStore, top_docs: Option<&TopDocs>) -> Vec<String> {
    let Some(top_docs) = top_docs else {
        return Vec::new();
    };

    let mut pks = Vec::with_capacity(top_docs.len());
    for score_doc in &top_docs.score_docs {
        match store.get_document(score_doc.doc) {
            Ok(doc) => {
                if let Some(pk) = doc.get(FIELD_PK) {
                    pks.push(pk.to_string());
                }
            }
            Err(err) => {
                warn!(doc = score_doc.doc.0, error = %err, "hit document could not be loaded");
            }
        }
    }
    pks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemdex_index::{DocId, Document, Query, ScoreDoc};
    use tempfile::tempdir;

    #[test]
    fn resolves_in_collector_order_and_skips_missing_pk() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();

        let mut a = Document::new();
        a.add_keyword(FIELD_PK, "A");
        a.add_keyword("k", "x");
        store.add_document(a).unwrap();

        let mut no_pk = Document::new();
        no_pk.add_keyword("k", "x");
        store.add_document(no_pk).unwrap();

        let mut b = Document::new();
        b.add_keyword(FIELD_PK, "B");
        b.add_keyword("k", "x");
        store.add_document(b).unwrap();

        let hits = store.search(&Query::term("k", "x"), 10).unwrap();
        assert_eq!(hits.len(), 3);
        let pks = primary_keys_for_hits(&store, Some(&hits));
        assert_eq!(pks, vec!["A", "B"]);
    }

    #[test]
    fn absent_or_empty_collector_yields_empty_list() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        assert!(primary_keys_for_hits(&store, None).is_empty());

        let empty = TopDocs::default();
        assert!(primary_keys_for_hits(&store, Some(&empty)).is_empty());
    }

    #[test]
    fn stale_doc_ids_are_skipped_with_a_warning() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        let mut a = Document::new();
        a.add_keyword(FIELD_PK, "A");
        store.add_document(a).unwrap();

        let fabricated = TopDocs {
            total_hits: 2,
            score_docs: vec![
                ScoreDoc { doc: DocId(0), score: 1.0 },
                ScoreDoc { doc: DocId(99), score: 0.5 },
            ],
        };
        let pks = primary_keys_for_hits(&store, Some(&fabricated));
        assert_eq!(pks, vec!["A"]);
    }
}
