//! Token estimation
//!
//! The index uses token counts to decide whether a non-code file is worth
//! embedding and records the count in chunk metadata. No model tokenizer is
//! bundled, so counts are estimates.

/// Token estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenEstimator {
    /// 4 characters per token, good for prose
    #[default]
    CharBased,
    /// Punctuation and operators counted as their own tokens
    CodeAware,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    estimator: TokenEstimator,
}

impl TokenCounter {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Estimate the token count of `text`
    pub fn count(&self, text: &str) -> usize {
        match self.estimator {
            TokenEstimator::CharBased => text.chars().count().div_ceil(4),
            TokenEstimator::CodeAware => count_code_aware(text),
        }
    }
}

fn count_code_aware(text: &str) -> usize {
    let mut tokens = 0;
    let mut word_len = 0usize;

    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            word_len += 1;
            continue;
        }
        tokens += word_tokens(word_len);
        word_len = 0;
        if !ch.is_whitespace() {
            tokens += 1;
        }
    }
    tokens += word_tokens(word_len);
    tokens
}

/// Short identifiers are one token, longer ones roughly four chars each
fn word_tokens(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => len.div_ceil(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_based_counting() {
        let counter = TokenCounter::new(TokenEstimator::CharBased);
        assert_eq!(counter.count("hello"), 2);
        assert_eq!(counter.count("hi"), 1);
        assert_eq!(counter.count("hello world"), 3);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn test_code_aware_counting() {
        let counter = TokenCounter::new(TokenEstimator::CodeAware);
        // fn, main, (, ), {, }
        assert_eq!(counter.count("fn main() {}"), 6);

        let complex = r#"
            pub fn calculate(&self, value: i32) -> Result<i32, Error> {
                Ok(value * 2)
            }
        "#;
        assert!(counter.count(complex) > counter.count("fn main() {}"));
    }
}
