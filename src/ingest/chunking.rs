//! Token-window chunking of transcripts.

use crate::error::{Result, VidseekError};
use regex::Regex;

/// Splits text into word and punctuation tokens and groups them into windows.
pub struct Tokenizer {
    token_regex: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        // Words (with inner apostrophes/hyphens), numbers, or single punctuation marks
        let token_regex = Regex::new(r"\w+(?:['\-]\w+)*|[^\w\s]")
            .map_err(|e| VidseekError::Ingest(format!("Invalid tokenizer pattern: {}", e)))?;
        Ok(Self { token_regex })
    }

    /// Tokens of `text` in order.
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.token_regex.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Windows of at most `window` tokens joined by single spaces.
    /// Windows that are blank after joining are dropped.
    pub fn chunk(&self, text: &str, window: usize) -> Vec<String> {
        let tokens = self.tokenize(text);
        tokens
            .chunks(window.max(1))
            .map(|tokens| tokens.join(" "))
            .filter(|chunk| !chunk.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_punctuation() {
        let tokenizer = Tokenizer::new().unwrap();
        assert_eq!(
            tokenizer.tokenize("Hello, world! It's a well-known API."),
            vec!["Hello", ",", "world", "!", "It's", "a", "well-known", "API", "."]
        );
        assert!(tokenizer.tokenize("   \n\t").is_empty());
    }

    #[test]
    fn test_chunk_windows() {
        let tokenizer = Tokenizer::new().unwrap();
        let chunks = tokenizer.chunk("one two three four five", 2);
        assert_eq!(chunks, vec!["one two", "three four", "five"]);

        let whole = tokenizer.chunk("Risk, governance.", 6000);
        assert_eq!(whole, vec!["Risk , governance ."]);

        assert!(tokenizer.chunk("", 10).is_empty());
    }
}
