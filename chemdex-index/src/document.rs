//! Documents and fields.
//!
//! Every field value is a string; fields are never tokenized. The `stored`
//! flag controls whether the value is returned by document fetches, the
//! `indexed` flag whether it produces a postings term. Fingerprint bit
//! tokens are indexed-only; everything else the facade writes is stored.

use serde::{Deserialize, Serialize};

/// Position of a live document within the searcher's document list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocId(pub u32);

impl DocId {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// One named value of a document. Multi-valued fields (synonym names) repeat
/// the field name across entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub stored: bool,
    pub indexed: bool,
}

/// A flat, ordered list of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn add_field(&mut self, name: &str, value: &str, stored: bool, indexed: bool) {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.to_string(),
            stored,
            indexed,
        });
    }

    /// Stored and indexed, the common case for identifier fields.
    pub fn add_keyword(&mut self, name: &str, value: &str) {
        self.add_field(name, value, true, true);
    }

    /// Indexed but not stored (fingerprint bit tokens).
    pub fn add_indexed_only(&mut self, name: &str, value: &str) {
        self.add_field(name, value, false, true);
    }

    /// First value of a field, stored or not.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// All values of a field, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }

    /// The distinct field names in this document.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// A copy containing only the stored fields — what a document fetch
    /// through the searcher returns.
    pub fn stored_view(&self) -> Document {
        Document {
            fields: self.fields.iter().filter(|f| f.stored).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_access() {
        let mut doc = Document::new();
        doc.add_keyword("pk", "MOL-1");
        doc.add_keyword("name", "aspirin");
        doc.add_keyword("name", "acetylsalicylic acid");
        doc.add_indexed_only("fp", "42");

        assert_eq!(doc.get("pk"), Some("MOL-1"));
        assert_eq!(doc.get_all("name").len(), 2);
        assert_eq!(doc.get("missing"), None);
        assert_eq!(doc.field_names(), vec!["fp", "name", "pk"]);
    }

    #[test]
    fn stored_view_drops_indexed_only_fields() {
        let mut doc = Document::new();
        doc.add_keyword("pk", "MOL-1");
        doc.add_indexed_only("fp", "42");
        doc.add_indexed_only("fp", "117");

        let view = doc.stored_view();
        assert_eq!(view.get("pk"), Some("MOL-1"));
        assert!(view.get("fp").is_none());
        assert_eq!(view.fields.len(), 1);
    }
}
