//! Query AST and multi-field parsing.

use chemdex_core::{ChemdexError, Result};

use crate::analysis::Analyzer;

/// How a clause participates in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match.
    Must,
    /// The clause may match; at least one `Should` must match when no `Must`
    /// clause is present.
    Should,
}

/// A search query over indexed terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Exact term match on one field.
    Term { field: String, value: String },
    /// Boolean combination of sub-queries.
    Boolean { clauses: Vec<(Occur, Query)> },
}

impl Query {
    pub fn term(field: &str, value: &str) -> Self {
        Query::Term {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn boolean(clauses: Vec<(Occur, Query)>) -> Self {
        Query::Boolean { clauses }
    }

    /// An all-MUST conjunction of term queries on one field, one per value.
    pub fn all_terms(field: &str, values: impl IntoIterator<Item = String>) -> Self {
        Query::Boolean {
            clauses: values
                .into_iter()
                .map(|v| (Occur::Must, Query::term(field, &v)))
                .collect(),
        }
    }

    /// Number of leaf term clauses.
    pub fn term_count(&self) -> usize {
        match self {
            Query::Term { .. } => 1,
            Query::Boolean { clauses } => clauses.iter().map(|(_, q)| q.term_count()).sum(),
        }
    }
}

/// Parse a free-text query across several fields.
///
/// Plain words become per-field `Should` term clauses after analysis;
/// `field:value` parts restrict to one field. An input that analyzes to
/// nothing is a parse error, surfaced to the caller unchanged.
pub fn parse_multi_field(text: &str, fields: &[String], analyzer: &Analyzer) -> Result<Query> {
    let mut clauses: Vec<(Occur, Query)> = Vec::new();

    for part in text.split_whitespace() {
        match part.split_once(':') {
            Some((field, raw_value)) if !field.is_empty() && !raw_value.is_empty() => {
                for token in analyzer.analyze(raw_value) {
                    clauses.push((Occur::Should, Query::term(field, &token)));
                }
            }
            _ => {
                for token in analyzer.analyze(part) {
                    for field in fields {
                        clauses.push((Occur::Should, Query::term(field, &token)));
                    }
                }
            }
        }
    }

    if clauses.is_empty() {
        return Err(ChemdexError::Parse(format!(
            "query '{text}' contains no searchable terms"
        )));
    }
    Ok(Query::Boolean { clauses })
}
