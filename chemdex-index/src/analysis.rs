//! Lexical analysis for parsed free-text queries.
//!
//! Indexed fields are never analyzed; the pipeline here only normalizes the
//! query side of a free-text search.

/// Splits text into tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Splits on any non-alphanumeric character, dropping empty tokens.
pub struct StandardTokenizer;

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Token-to-token rewriting applied after tokenization.
pub trait TokenFilter: Send + Sync {
    fn apply(&self, tokens: Vec<String>) -> Vec<String>;
}

/// Lowercases every token.
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn apply(&self, tokens: Vec<String>) -> Vec<String> {
        tokens.into_iter().map(|t| t.to_lowercase()).collect()
    }
}

/// Text analysis pipeline: one tokenizer, then filters in order.
pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    filters: Vec<Box<dyn TokenFilter>>,
}

impl Analyzer {
    pub fn new(tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// The default pipeline: standard tokenizer + lowercase.
    pub fn standard() -> Self {
        Analyzer::new(Box::new(StandardTokenizer)).add_filter(Box::new(LowercaseFilter))
    }

    /// Keyword pipeline: the whole input as one unmodified token.
    pub fn keyword() -> Self {
        struct KeywordTokenizer;
        impl Tokenizer for KeywordTokenizer {
            fn tokenize(&self, text: &str) -> Vec<String> {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
        }
        Analyzer::new(Box::new(KeywordTokenizer))
    }

    pub fn analyze(&self, text: &str) -> Vec<String> {
        let mut tokens = self.tokenizer.tokenize(text);
        for filter in &self.filters {
            tokens = filter.apply(tokens);
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_lowercases_and_splits() {
        let analyzer = Analyzer::standard();
        assert_eq!(
            analyzer.analyze("Aspirin, 50mg (oral)"),
            vec!["aspirin", "50mg", "oral"]
        );
    }

    #[test]
    fn hyphenated_identifiers_stay_whole() {
        let analyzer = Analyzer::standard();
        assert_eq!(analyzer.analyze("CHEMBL-25"), vec!["chembl-25"]);
    }

    #[test]
    fn keyword_pipeline_is_verbatim() {
        let analyzer = Analyzer::keyword();
        assert_eq!(analyzer.analyze("  Acetylsalicylic Acid "), vec!["Acetylsalicylic Acid"]);
        assert!(analyzer.analyze("   ").is_empty());
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let analyzer = Analyzer::standard();
        assert!(analyzer.analyze("").is_empty());
        assert!(analyzer.analyze("...").is_empty());
    }
}
